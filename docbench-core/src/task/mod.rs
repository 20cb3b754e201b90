use crate::{error::EvalError, layout::element::ContentKind, registry::Registry};

pub mod orchestrator;
pub mod report;

pub use orchestrator::{MatchedTask, Orchestrator};
pub use report::{CategoryReport, TaskReport, TaskState};

/// Decides which elements take part in an evaluation and which content
/// payload its metrics read.
pub trait EvalTask {
    fn name(&self) -> &str;

    /// Content payload every category is scored on, or `None` to let each
    /// category use its own profile.
    fn content(&self) -> Option<ContentKind>;

    /// Whether an element scored on `content` is in scope.
    fn accepts(&self, content: Option<ContentKind>) -> bool {
        match self.content() {
            Some(kind) => content == Some(kind),
            None => true,
        }
    }
}

/// Geometry over every category.
#[derive(Debug, Default)]
pub struct LayoutDetection;

impl EvalTask for LayoutDetection {
    fn name(&self) -> &str {
        "layout_detection"
    }

    fn content(&self) -> Option<ContentKind> {
        None
    }
}

/// Content recognition restricted to the categories carrying one payload kind.
#[derive(Debug)]
pub struct Recognition {
    name: &'static str,
    kind: ContentKind,
}

impl Recognition {
    pub const fn new(name: &'static str, kind: ContentKind) -> Self {
        Self { name, kind }
    }
}

impl EvalTask for Recognition {
    fn name(&self) -> &str {
        self.name
    }

    fn content(&self) -> Option<ContentKind> {
        Some(self.kind)
    }
}

fn layout_detection() -> Box<dyn EvalTask> {
    Box::new(LayoutDetection)
}

fn text_recognition() -> Box<dyn EvalTask> {
    Box::new(Recognition::new("text_recognition", ContentKind::Text))
}

fn table_recognition() -> Box<dyn EvalTask> {
    Box::new(Recognition::new("table_recognition", ContentKind::Html))
}

fn formula_recognition() -> Box<dyn EvalTask> {
    Box::new(Recognition::new("formula_recognition", ContentKind::Latex))
}

pub fn register(registry: &mut Registry<dyn EvalTask>) -> Result<(), EvalError> {
    registry.register("layout_detection", layout_detection)?;
    registry.register("text_recognition", text_recognition)?;
    registry.register("table_recognition", table_recognition)?;
    registry.register("formula_recognition", formula_recognition)?;
    Ok(())
}
