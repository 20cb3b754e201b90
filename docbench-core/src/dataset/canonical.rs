use std::{collections::HashMap, path::Path};

use serde_json::{Map, Value};
use snafu::ResultExt;
use tracing::*;

use crate::{
    config::DatasetConfig,
    dataset::{Dataset, LoadedDataset, SamplePair, read_records, read_samples},
    error::{EvalError, JsonSnafu},
    layout::{
        field::Field,
        page::{PageInfo, Sample, SampleKey},
    },
};

/// Loader for files already in the canonical schema.
///
/// Without a prediction file, predictions are read from the `pred` field of
/// the ground-truth elements and every sample is paired with itself.
#[derive(Debug, Default)]
pub struct CanonicalDataset;

impl Dataset for CanonicalDataset {
    fn name(&self) -> &str {
        "canonical"
    }

    fn load(&self, config: &DatasetConfig) -> Result<LoadedDataset, EvalError> {
        let mut gt_samples = read_samples(&config.ground_truth.data_path)?;
        info!(
            "Loaded {} ground-truth samples from {}",
            gt_samples.len(),
            config.ground_truth.data_path.display()
        );

        if let Some(page_info) = &config.ground_truth.page_info {
            let attributes = read_page_attributes(page_info)?;
            let merged = merge_page_attributes(&mut gt_samples, &attributes);
            info!(
                "Merged page attributes from {} into {} samples",
                page_info.display(),
                merged
            );
        }

        let Some(pred_path) = config.prediction_path() else {
            let pairs = gt_samples
                .into_iter()
                .map(|gt| SamplePair {
                    pred: gt.clone(),
                    gt,
                })
                .collect();
            return Ok(LoadedDataset {
                pairs,
                skipped: Vec::new(),
            });
        };

        let pred_samples = read_samples(pred_path)?;
        info!(
            "Loaded {} prediction samples from {}",
            pred_samples.len(),
            pred_path.display()
        );
        Ok(pair_samples(gt_samples, pred_samples))
    }
}

/// Pairs every ground-truth sample with the prediction of the same key.
///
/// A ground truth without prediction is logged and skipped; it never aborts
/// the load.
pub fn pair_samples(gt_samples: Vec<Sample>, pred_samples: Vec<Sample>) -> LoadedDataset {
    let mut predictions: HashMap<SampleKey, Sample> = pred_samples
        .into_iter()
        .map(|sample| (sample.key(), sample))
        .collect();

    let mut loaded = LoadedDataset::default();
    for gt in gt_samples {
        let key = gt.key();
        match predictions.remove(&key) {
            Some(pred) => loaded.pairs.push(SamplePair { gt, pred }),
            None => {
                warn!("{}", EvalError::MatchingWarning { key: key.to_string() });
                loaded.skipped.push(key);
            }
        }
    }

    if !predictions.is_empty() {
        debug!(
            "{} prediction samples have no ground truth and are ignored",
            predictions.len()
        );
    }
    loaded
}

/// Reads `page_info.page_attribute` of every record in a page-info file, JSON
/// array or `.jsonl`.
///
/// Records only need `page_info`; canonical files work as they are.
fn read_page_attributes(path: &Path) -> Result<HashMap<SampleKey, Map<String, Value>>, EvalError> {
    let display = path.display().to_string();
    let records = read_records(path)?;

    let mut attributes = HashMap::new();
    for record in records {
        let Some(page_info) = record.get("page_info") else {
            continue;
        };
        let page_info: PageInfo =
            serde_json::from_value(page_info.clone()).context(JsonSnafu { path: &display })?;
        let key = SampleKey::new(&page_info.image_path, page_info.page_no.get().copied());
        if let Some(page_attribute) = page_info.page_attribute.into_option() {
            attributes.insert(key, page_attribute);
        }
    }
    Ok(attributes)
}

/// Adds page attributes to the matching samples; attributes a sample already
/// carries are kept. Returns how many samples were touched.
fn merge_page_attributes(
    samples: &mut [Sample],
    attributes: &HashMap<SampleKey, Map<String, Value>>,
) -> usize {
    let mut merged = 0;
    for sample in samples.iter_mut() {
        let Some(extra) = attributes.get(&sample.key()) else {
            continue;
        };
        let mut current = sample
            .page_info
            .page_attribute
            .get()
            .cloned()
            .unwrap_or_default();
        for (key, value) in extra {
            current.entry(key.clone()).or_insert_with(|| value.clone());
        }
        sample.page_info.page_attribute = Field::Set(current);
        merged += 1;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::element::{ContentKind, Element};

    fn sample(image_path: &str) -> Sample {
        Sample::new(
            PageInfo::new(image_path),
            vec![Element::new("text_block").with_content(ContentKind::Text, image_path)],
        )
    }

    #[test]
    fn test_pair_samples_skips_missing_prediction() {
        let loaded = pair_samples(
            vec![sample("a.png"), sample("b.png"), sample("c.png")],
            vec![sample("c.png"), sample("a.png"), sample("z.png")],
        );
        let keys: Vec<_> = loaded.pairs.iter().map(|p| p.key().to_string()).collect();
        assert_eq!(keys, ["a.png", "c.png"]);
        assert_eq!(loaded.skipped, vec![SampleKey::new("b.png", None)]);
    }

    #[test]
    fn test_read_page_attributes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_info.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"page_info\": {\"image_path\": \"a.png\", \"page_attribute\": {\"language\": \"english\"}}}\n",
                "{\"page_info\": {\"image_path\": \"b.png\", \"page_no\": 2, \"page_attribute\": -1}}\n",
                "{\"note\": \"no page_info\"}\n",
            ),
        )
        .unwrap();

        let attributes = read_page_attributes(&path).unwrap();
        assert_eq!(attributes.len(), 1);
        assert_eq!(
            attributes[&SampleKey::new("a.png", None)]["language"],
            Value::from("english")
        );
    }

    #[test]
    fn test_merge_page_attributes_keeps_existing() {
        let mut samples = vec![sample("a.png"), sample("b.png")];
        let mut own = Map::new();
        own.insert("language".into(), Value::from("chinese"));
        samples[0].page_info.page_attribute = Field::Set(own);

        let mut from_file = Map::new();
        from_file.insert("language".into(), Value::from("english"));
        from_file.insert("layout".into(), Value::from("single_column"));
        let attributes = HashMap::from([(SampleKey::new("a.png", None), from_file)]);

        assert_eq!(merge_page_attributes(&mut samples, &attributes), 1);
        let merged = samples[0].page_info.page_attribute.get().unwrap();
        assert_eq!(merged["language"], Value::from("chinese"));
        assert_eq!(merged["layout"], Value::from("single_column"));
        assert!(samples[1].page_info.page_attribute.get().is_none());
    }
}
