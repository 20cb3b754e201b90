use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    analysis::bbox::Bbox,
    layout::{element::Element, field::Field},
};

/// Page-level metadata of a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub image_path: String,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub page_no: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub width: Field<f64>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub height: Field<f64>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub page_attribute: Field<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PageInfo {
    pub fn new(image_path: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            page_no: Field::Unset,
            width: Field::Unset,
            height: Field::Unset,
            page_attribute: Field::Absent,
            extra: Map::new(),
        }
    }

    /// The page as a box anchored at the origin, when both dimensions are known.
    pub fn page_bbox(&self) -> Option<Bbox> {
        let (width, height) = (*self.width.get()?, *self.height.get()?);
        (width > 0.0 && height > 0.0).then(|| {
            Bbox::new(glam::Vec2::ZERO, glam::Vec2::new(width as f32, height as f32))
        })
    }
}

/// Cross-element annotations of a sample. `relation` is opaque to the evaluator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extra {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub relation: Field<Vec<Value>>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// One document page in the canonical schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub layout_dets: Vec<Element>,
    pub page_info: PageInfo,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub extra: Field<Extra>,
}

impl Sample {
    pub fn new(page_info: PageInfo, layout_dets: Vec<Element>) -> Self {
        Self {
            layout_dets,
            page_info,
            extra: Field::Set(Extra {
                relation: Field::Set(Vec::new()),
                rest: Map::new(),
            }),
        }
    }

    pub fn key(&self) -> SampleKey {
        SampleKey::new(&self.page_info.image_path, self.page_info.page_no.get().copied())
    }

    /// Tight box around every element with usable geometry, or [`Bbox::UNSET`].
    pub fn content_extent(&self) -> Bbox {
        Bbox::union_all(
            self.layout_dets
                .iter()
                .filter(|element| !element.is_degenerate())
                .filter_map(|element| element.bbox().ok()),
        )
    }

    /// Page attributes as `key: value` labels, used to partition reports.
    pub fn attribute_labels(&self) -> Vec<String> {
        let Some(attributes) = self.page_info.page_attribute.get() else {
            return Vec::new();
        };
        attributes
            .iter()
            .filter_map(|(key, value)| match value {
                Value::String(value) => Some(format!("{key}: {value}")),
                Value::Bool(value) => Some(format!("{key}: {value}")),
                Value::Number(value) if value.as_i64() != Some(-1) => {
                    Some(format!("{key}: {value}"))
                }
                _ => None,
            })
            .collect()
    }
}

/// Identity of a sample within one evaluation run: the image path, plus the
/// page number when the source is multi-page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleKey(String);

impl SampleKey {
    pub fn new(image_path: &str, page_no: Option<i64>) -> Self {
        match page_no {
            Some(page_no) => Self(format!("{image_path}#{page_no}")),
            None => Self(image_path.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
