use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::layout::element::{ContentKind, Element};

/// What a category is scored on, as written in a task's `categories` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentRule {
    Text,
    Html,
    Latex,
    /// Geometry only; the category carries no scorable content.
    None,
}

impl ContentRule {
    pub fn kind(self) -> Option<ContentKind> {
        match self {
            ContentRule::Text => Some(ContentKind::Text),
            ContentRule::Html => Some(ContentKind::Html),
            ContentRule::Latex => Some(ContentKind::Latex),
            ContentRule::None => None,
        }
    }
}

const TEXT_CATEGORIES: &[&str] = &[
    "text_block",
    "title",
    "header",
    "footer",
    "page_number",
    "page_footnote",
    "figure_caption",
    "figure_footnote",
    "table_caption",
    "table_footnote",
    "equation_caption",
    "code_txt",
    "reference",
    "text_mask",
];

const LATEX_CATEGORIES: &[&str] = &[
    "equation_inline",
    "equation_isolated",
    "equation_semantic",
    "interline_equation",
];

const HTML_CATEGORIES: &[&str] = &["table"];

const VISUAL_CATEGORIES: &[&str] = &["figure", "abandon", "table_mask", "need_mask"];

/// Maps the open set of `category_type` strings to the content they are scored on.
///
/// New categories need no code change: an unknown category falls back to
/// whichever content payload the element itself carries, and a task config can
/// pin it explicitly through its `categories` block.
#[derive(Debug, Clone)]
pub struct CategoryProfiles {
    rules: HashMap<String, ContentRule>,
}

impl Default for CategoryProfiles {
    fn default() -> Self {
        let groups = [
            (TEXT_CATEGORIES, ContentRule::Text),
            (LATEX_CATEGORIES, ContentRule::Latex),
            (HTML_CATEGORIES, ContentRule::Html),
            (VISUAL_CATEGORIES, ContentRule::None),
        ];
        let rules = groups
            .into_iter()
            .flat_map(|(names, rule)| names.iter().map(move |name| (name.to_string(), rule)))
            .collect();
        Self { rules }
    }
}

impl CategoryProfiles {
    /// Overrides or adds rules; later entries win over the defaults.
    pub fn extend(&mut self, overrides: &BTreeMap<String, ContentRule>) {
        self.rules
            .extend(overrides.iter().map(|(name, rule)| (name.clone(), *rule)));
    }

    pub fn rule(&self, category: &str) -> Option<ContentRule> {
        self.rules.get(category).copied()
    }

    /// The content payload `element` is scored on.
    pub fn content_kind(&self, element: &Element) -> Option<ContentKind> {
        match self.rule(&element.category_type) {
            Some(rule) => rule.kind(),
            None => element.content_kind(),
        }
    }
}
