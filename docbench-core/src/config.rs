use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{ResultExt, ensure};

use crate::{
    analysis::matcher::{MatchMethod, MatcherConfig, MatcherConfigBuilder},
    consts::DEFAULT_MATCH_METHOD,
    error::{ConfigSnafu, EvalError, IoReadSnafu, JsonSnafu, MissingTaskConfigSnafu, TomlSnafu},
    layout::category::ContentRule,
};

/// One task block of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Registry name of the task; defaults to the key of the block.
    #[serde(default)]
    pub task: Option<String>,
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Category to content overrides for this task.
    #[serde(default)]
    pub categories: BTreeMap<String, ContentRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub dataset_name: String,
    pub ground_truth: GroundTruthSource,
    #[serde(default)]
    pub prediction: Option<PredictionSource>,
    /// Older configs put the match method next to the sources.
    #[serde(default)]
    pub match_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthSource {
    pub data_path: PathBuf,
    /// File carrying `page_info.page_attribute` for per-page breakdowns.
    #[serde(default)]
    pub page_info: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionSource {
    #[serde(default)]
    pub data_path: Option<PathBuf>,
    #[serde(default)]
    pub match_method: Option<String>,
    #[serde(default)]
    pub iou_threshold: Option<f32>,
}

impl DatasetConfig {
    pub fn prediction_path(&self) -> Option<&Path> {
        self.prediction.as_ref()?.data_path.as_deref()
    }

    /// The configured match method name, falling back to `quick_match`.
    pub fn match_method_name(&self) -> &str {
        self.prediction
            .as_ref()
            .and_then(|prediction| prediction.match_method.as_deref())
            .or(self.match_method.as_deref())
            .unwrap_or(DEFAULT_MATCH_METHOD)
    }

    pub fn matcher_config(&self, task: &str) -> Result<MatcherConfig, EvalError> {
        let method: MatchMethod = self
            .match_method_name()
            .parse()
            .map_err(|message| EvalError::Config {
                task: task.to_string(),
                message,
            })?;

        let mut builder = MatcherConfigBuilder::default();
        builder.method(method);
        if let Some(threshold) = self
            .prediction
            .as_ref()
            .and_then(|prediction| prediction.iou_threshold)
        {
            ensure!(
                (0.0..=1.0).contains(&threshold),
                ConfigSnafu {
                    task,
                    message: format!("iou_threshold {threshold} is outside [0, 1]"),
                }
            );
            builder.iou_threshold(threshold);
        }
        builder.build().map_err(|err| EvalError::Config {
            task: task.to_string(),
            message: err.to_string(),
        })
    }

    /// Identifier of the task's result artifact.
    ///
    /// With a prediction file it is the file name plus the match method
    /// (`bar_pred.json_quick_match`); otherwise the ground-truth file name up
    /// to its first dot (`baz`). Derived from configuration only.
    pub fn save_name(&self) -> String {
        match self.prediction_path() {
            Some(pred_path) => format!("{}_{}", basename(pred_path), self.match_method_name()),
            None => {
                let name = basename(&self.ground_truth.data_path);
                name.split('.').next().unwrap_or_default().to_string()
            }
        }
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// A task block as declared, before it is parsed.
#[derive(Debug, Clone)]
pub struct TaskEntry {
    pub name: String,
    pub raw: Value,
}

impl TaskEntry {
    /// Parses the block. An absent, null or empty block is reported as
    /// `No config for task <name>`.
    pub fn parse(&self) -> Result<TaskConfig, EvalError> {
        let is_empty = match &self.raw {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::String(text) => text.is_empty(),
            _ => false,
        };
        ensure!(!is_empty, MissingTaskConfigSnafu { task: &self.name });

        serde_json::from_value(self.raw.clone()).map_err(|err| EvalError::Config {
            task: self.name.clone(),
            message: err.to_string(),
        })
    }
}

/// The evaluation configuration: task blocks in declaration order.
#[derive(Debug, Clone, Default)]
pub struct EvalConfig {
    pub tasks: Vec<TaskEntry>,
}

impl EvalConfig {
    /// Reads a configuration file; `.toml` files are parsed as TOML, anything
    /// else as JSON.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, EvalError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).context(IoReadSnafu { path: &display })?;

        let value: Value = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content).context(TomlSnafu { path: &display })?,
            _ => serde_json::from_str(&content).context(JsonSnafu { path: &display })?,
        };
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, EvalError> {
        let Value::Object(map) = value else {
            return ConfigSnafu {
                task: "*",
                message: "configuration must map task names to task blocks",
            }
            .fail();
        };
        let tasks = map
            .into_iter()
            .map(|(name, raw)| TaskEntry { name, raw })
            .collect();
        Ok(Self { tasks })
    }
}
