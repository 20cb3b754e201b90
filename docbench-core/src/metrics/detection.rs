use serde_json::{Map, Value, json};

use crate::{
    error::EvalError,
    metrics::{Metric, MetricInput, ratio},
};

/// Element-level detection quality: how many ground-truth elements found a
/// counterpart, and how many predictions were spurious.
#[derive(Debug, Default)]
pub struct Detection;

impl Metric for Detection {
    fn name(&self) -> &str {
        "Detection"
    }

    fn score(&self, input: &MetricInput<'_>) -> Result<Map<String, Value>, EvalError> {
        let matches = input.matches;
        let paired = matches.paired.len() as f64;
        let precision = ratio(paired, matches.pred_count() as f64);
        let recall = ratio(paired, matches.gt_count() as f64);
        let f1 = ratio(2.0 * precision * recall, precision + recall);

        let ious: Vec<f32> = matches.paired.iter().filter_map(|pair| pair.iou).collect();
        let mean_iou = (!ious.is_empty())
            .then(|| ious.iter().map(|iou| *iou as f64).sum::<f64>() / ious.len() as f64);

        let mut scores = Map::new();
        scores.insert("paired".into(), json!(matches.paired.len()));
        scores.insert("unmatched_gt".into(), json!(matches.unmatched_gt.len()));
        scores.insert("unmatched_pred".into(), json!(matches.unmatched_pred.len()));
        scores.insert("precision".into(), json!(precision));
        scores.insert("recall".into(), json!(recall));
        scores.insert("f1".into(), json!(f1));
        scores.insert("mean_iou".into(), json!(mean_iou));
        Ok(scores)
    }
}
