use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};
use snafu::OptionExt;

use crate::{
    error::{EvalError, MetricSnafu},
    layout::element::ContentKind,
    metrics::{Metric, MetricInput},
};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Collapses whitespace runs to one space and trims both ends.
pub fn normalize(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Levenshtein distance divided by the longer length; `0` for two empty strings.
pub fn normalized_edit_distance(gt: &str, pred: &str) -> f64 {
    1.0 - strsim::normalized_levenshtein(gt, pred)
}

fn content_kind(metric: &str, input: &MetricInput<'_>) -> Result<ContentKind, EvalError> {
    input.content.context(MetricSnafu {
        metric,
        category: input.category,
        message: "category has no text, html or latex content to score",
    })
}

/// Normalized ground-truth and predicted content of every pair.
fn paired_contents(kind: ContentKind, input: &MetricInput<'_>) -> Vec<(String, String)> {
    input
        .matches
        .paired
        .iter()
        .map(|pair| {
            let gt = pair.gt.content(kind).unwrap_or_default();
            let pred = pair.pred.predicted(kind).unwrap_or_default();
            (normalize(gt), normalize(pred))
        })
        .collect()
}

/// Mean normalized edit distance; unmatched ground truth counts as distance 1.
#[derive(Debug, Default)]
pub struct EditDistance;

impl Metric for EditDistance {
    fn name(&self) -> &str {
        "Edit_dist"
    }

    fn score(&self, input: &MetricInput<'_>) -> Result<Map<String, Value>, EvalError> {
        let kind = content_kind(self.name(), input)?;
        let pairs = paired_contents(kind, input);
        let unmatched = input.matches.unmatched_gt.len();

        let total = pairs
            .iter()
            .map(|(gt, pred)| normalized_edit_distance(gt, pred))
            .sum::<f64>()
            + unmatched as f64;
        let count = pairs.len() + unmatched;

        let mut scores = Map::new();
        scores.insert(
            "edit_dist".into(),
            json!((count > 0).then(|| total / count as f64)),
        );
        scores.insert("count".into(), json!(count));
        scores.insert("unmatched_gt".into(), json!(unmatched));
        Ok(scores)
    }
}

/// Share of pairs whose normalized content is identical.
#[derive(Debug, Default)]
pub struct ExactMatch;

impl Metric for ExactMatch {
    fn name(&self) -> &str {
        "Exact_match"
    }

    fn score(&self, input: &MetricInput<'_>) -> Result<Map<String, Value>, EvalError> {
        let kind = content_kind(self.name(), input)?;
        let pairs = paired_contents(kind, input);
        let exact = pairs.iter().filter(|(gt, pred)| gt == pred).count();

        let mut scores = Map::new();
        scores.insert(
            "exact_match".into(),
            json!((!pairs.is_empty()).then(|| exact as f64 / pairs.len() as f64)),
        );
        scores.insert("count".into(), json!(pairs.len()));
        Ok(scores)
    }
}
