use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    analysis::bbox::{Bbox, is_degenerate_poly},
    consts::{POLY_LEN, UNSET},
    error::EvalError,
    layout::field::Field,
};

/// Which content payload of an element a task scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Html,
    Latex,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Text, ContentKind::Html, ContentKind::Latex];

    pub const fn name(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Html => "html",
            ContentKind::Latex => "latex",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One annotated or predicted region of a page.
///
/// Keys the evaluator does not know about (`line_with_spans`,
/// `table_edit_status`, ...) are kept in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub category_type: String,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub poly: Field<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub ignore: Field<bool>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub order: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub anno_id: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub text: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub html: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub latex: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub attribute: Field<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub pred: Field<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Element {
    /// A fresh element with degenerate geometry and every optional field unset.
    pub fn new(category_type: impl Into<String>) -> Self {
        Self {
            category_type: category_type.into(),
            poly: Field::Set(vec![UNSET as f64; POLY_LEN]),
            ignore: Field::Set(false),
            order: Field::Unset,
            anno_id: Field::Unset,
            text: Field::Absent,
            html: Field::Absent,
            latex: Field::Absent,
            attribute: Field::Unset,
            pred: Field::Unset,
            extra: Map::new(),
        }
    }

    pub fn with_poly(mut self, poly: impl Into<Vec<f64>>) -> Self {
        self.poly = Field::Set(poly.into());
        self
    }

    pub fn with_anno_id(mut self, anno_id: i64) -> Self {
        self.anno_id = Field::Set(anno_id);
        self
    }

    pub fn with_content(mut self, kind: ContentKind, content: impl Into<String>) -> Self {
        *self.content_field_mut(kind) = Field::Set(content.into());
        self
    }

    pub fn with_pred(mut self, pred: impl Into<String>) -> Self {
        self.pred = Field::Set(pred.into());
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignore = Field::Set(true);
        self
    }

    pub fn is_ignored(&self) -> bool {
        self.ignore.get().copied().unwrap_or(false)
    }

    pub fn anno_id(&self) -> Option<i64> {
        self.anno_id.get().copied()
    }

    /// The quadrilateral, empty when the record has none.
    pub fn poly(&self) -> &[f64] {
        self.poly.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_degenerate(&self) -> bool {
        is_degenerate_poly(self.poly())
    }

    pub fn bbox(&self) -> Result<Bbox, EvalError> {
        Bbox::from_poly(self.poly())
    }

    pub fn content(&self, kind: ContentKind) -> Option<&str> {
        self.content_field(kind).get().map(String::as_str)
    }

    /// The first content payload that is set, in `text`, `html`, `latex` order.
    pub fn content_kind(&self) -> Option<ContentKind> {
        ContentKind::ALL
            .into_iter()
            .find(|kind| self.content_field(*kind).is_set())
    }

    /// Predicted content to score against the ground truth's `kind` payload.
    ///
    /// Inference writes its output into `pred`; a prediction file produced by a
    /// converter carries it in the regular content field instead.
    pub fn predicted(&self, kind: ContentKind) -> Option<&str> {
        self.pred
            .get()
            .map(String::as_str)
            .or_else(|| self.content(kind))
    }

    fn content_field(&self, kind: ContentKind) -> &Field<String> {
        match kind {
            ContentKind::Text => &self.text,
            ContentKind::Html => &self.html,
            ContentKind::Latex => &self.latex,
        }
    }

    fn content_field_mut(&mut self, kind: ContentKind) -> &mut Field<String> {
        match kind {
            ContentKind::Text => &mut self.text,
            ContentKind::Html => &mut self.html,
            ContentKind::Latex => &mut self.latex,
        }
    }
}
