use serde_json::{Map, Value};

use crate::{
    analysis::matcher::MatchSet, error::EvalError, layout::element::ContentKind,
    registry::Registry,
};

pub mod detection;
pub mod text;

pub use detection::Detection;
pub use text::{EditDistance, ExactMatch};

/// What a metric sees of one category.
#[derive(Debug, Clone, Copy)]
pub struct MetricInput<'a> {
    pub category: &'a str,
    /// Content payload the category is scored on; `None` for visual categories.
    pub content: Option<ContentKind>,
    pub matches: &'a MatchSet,
}

/// Scores one category's matching outcome.
///
/// An `Err` is recorded against that category only; the orchestrator keeps
/// scoring the remaining categories and metrics.
pub trait Metric {
    fn name(&self) -> &str;

    fn score(&self, input: &MetricInput<'_>) -> Result<Map<String, Value>, EvalError>;
}

fn detection() -> Box<dyn Metric> {
    Box::new(Detection)
}

fn edit_dist() -> Box<dyn Metric> {
    Box::new(EditDistance)
}

fn exact_match() -> Box<dyn Metric> {
    Box::new(ExactMatch)
}

pub fn register(registry: &mut Registry<dyn Metric>) -> Result<(), EvalError> {
    registry.register("Detection", detection)?;
    registry.register("Edit_dist", edit_dist)?;
    registry.register("Exact_match", exact_match)?;
    Ok(())
}

/// A ratio that is `0` instead of NaN when the denominator is empty.
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
