use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use serde_json::Value;
use snafu::{ResultExt, ensure};
use tracing::*;

use crate::{
    config::DatasetConfig,
    error::{EvalError, IoReadSnafu, JsonSnafu, SchemaSnafu},
    layout::page::{Sample, SampleKey},
    registry::Registry,
};

pub mod canonical;

pub use canonical::CanonicalDataset;

/// A ground-truth sample and the prediction sample with the same identity key.
#[derive(Debug, Clone)]
pub struct SamplePair {
    pub gt: Sample,
    pub pred: Sample,
}

impl SamplePair {
    pub fn key(&self) -> SampleKey {
        self.gt.key()
    }
}

/// Output of a dataset load.
#[derive(Debug, Clone, Default)]
pub struct LoadedDataset {
    /// Pairs in ground-truth order.
    pub pairs: Vec<SamplePair>,
    /// Ground-truth samples left out because no prediction was found.
    pub skipped: Vec<SampleKey>,
}

/// Produces paired canonical samples for one task.
pub trait Dataset {
    fn name(&self) -> &str;

    fn load(&self, config: &DatasetConfig) -> Result<LoadedDataset, EvalError>;
}

fn canonical() -> Box<dyn Dataset> {
    Box::new(CanonicalDataset)
}

pub fn register(registry: &mut Registry<dyn Dataset>) -> Result<(), EvalError> {
    registry.register("canonical", canonical)?;
    registry.register("omnidoc", canonical)?;
    Ok(())
}

/// Reads the raw records of a file: a JSON array, or one record per line for
/// `.jsonl` files.
pub(crate) fn read_records(path: &Path) -> Result<Vec<Value>, EvalError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).context(IoReadSnafu { path: &display })?;

    if path.extension().is_some_and(|ext| ext == "jsonl") {
        return content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line))
            .collect::<Result<_, _>>()
            .context(JsonSnafu { path: &display });
    }
    match serde_json::from_str::<Value>(&content).context(JsonSnafu { path: &display })? {
        Value::Array(records) => Ok(records),
        _ => SchemaSnafu {
            path: &display,
            message: "top level must be an array of samples",
        }
        .fail(),
    }
}

/// Reads a canonical file: a JSON array of samples, or one sample per line
/// for `.jsonl` files.
///
/// Every record must carry `layout_dets` and `page_info`, and identity keys
/// must be unique within the file.
pub fn read_samples(path: &Path) -> Result<Vec<Sample>, EvalError> {
    let display = path.display().to_string();
    let records = read_records(path)?;

    let mut seen = HashSet::new();
    let mut samples = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        for field in ["layout_dets", "page_info"] {
            ensure!(
                record.get(field).is_some(),
                SchemaSnafu {
                    path: &display,
                    message: format!("record {index} has no `{field}`"),
                }
            );
        }
        let sample: Sample = serde_json::from_value(record).map_err(|err| EvalError::Schema {
            path: display.clone(),
            message: format!("record {index}: {err}"),
        })?;

        let key = sample.key();
        ensure!(
            seen.insert(key.clone()),
            SchemaSnafu {
                path: &display,
                message: format!("duplicate sample `{key}`"),
            }
        );
        check_page_bounds(&sample);
        samples.push(sample);
    }

    debug!("Read {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

/// Folds samples that share an identity key into one, keeping the first
/// sample's page info and appending the later `layout_dets`.
pub fn merge_samples<I>(samples: I) -> Vec<Sample>
where
    I: IntoIterator<Item = Sample>,
{
    let mut index: HashMap<SampleKey, usize> = HashMap::new();
    let mut merged: Vec<Sample> = Vec::new();
    for sample in samples {
        match index.get(&sample.key()) {
            Some(&at) => {
                debug!("Merging elements of `{}`", sample.key());
                merged[at].layout_dets.extend(sample.layout_dets);
            }
            None => {
                index.insert(sample.key(), merged.len());
                merged.push(sample);
            }
        }
    }
    merged
}

/// Warns when annotated content reaches beyond the declared page size.
fn check_page_bounds(sample: &Sample) {
    let Some(page) = sample.page_info.page_bbox() else {
        return;
    };
    let extent = sample.content_extent();
    if !extent.is_unset() && !page.contains(&extent) {
        warn!(
            "Sample `{}`: elements span {:?}, beyond the {}x{} page",
            sample.key(),
            extent.ltrb(),
            page.max.x,
            page.max.y
        );
    }
}
