use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::EvalError;

/// Lifecycle of one evaluation task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Loaded,
    Matched,
    Scored,
    Reported,
    Failed(String),
}

impl TaskState {
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskState::Failed(_))
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => f.write_str("pending"),
            TaskState::Loaded => f.write_str("loaded"),
            TaskState::Matched => f.write_str("matched"),
            TaskState::Scored => f.write_str("scored"),
            TaskState::Reported => f.write_str("reported"),
            TaskState::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

/// Scores of one category (or one category within a page-attribute group).
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryReport {
    pub gt: usize,
    pub pred: usize,
    /// Metric name to the object the metric returned.
    pub metrics: BTreeMap<String, Map<String, Value>>,
    /// Metric name to the error that metric raised on this category.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: String,
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_method: Option<String>,
    pub samples: usize,
    pub skipped: Vec<String>,
    pub categories: BTreeMap<String, CategoryReport>,
    /// `page_attribute` label (`language: english`) to per-category scores.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, BTreeMap<String, CategoryReport>>,
}

impl TaskReport {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            state: TaskState::Pending,
            save_name: None,
            match_method: None,
            samples: 0,
            skipped: Vec::new(),
            categories: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }

    /// Report of a task that stopped before producing scores.
    pub fn failed(task: impl Into<String>, err: &EvalError) -> Self {
        let mut report = Self::new(task);
        report.state = TaskState::Failed(err.to_string());
        report
    }

    /// Number of (metric, category) scorings that failed, groups included.
    pub fn failure_count(&self) -> usize {
        self.categories
            .values()
            .chain(self.groups.values().flat_map(BTreeMap::values))
            .map(|category| category.failures.len())
            .sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} [{}]: {}, {} samples, {} skipped, {} categories, {} metric failures",
            self.task,
            self.save_name.as_deref().unwrap_or("-"),
            self.state,
            self.samples,
            self.skipped.len(),
            self.categories.len(),
            self.failure_count()
        )
    }
}
