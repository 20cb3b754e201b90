pub mod analysis;
pub mod config;
pub mod consts;
pub mod dataset;
pub mod error;
pub mod layout;
pub mod metrics;
pub mod registry;
pub mod task;

// Re-export commonly used types
pub use analysis::{
    bbox::Bbox,
    matcher::{MatchMethod, MatchSet, Matcher, MatcherConfig},
};
pub use config::{EvalConfig, TaskConfig, TaskEntry};
pub use error::EvalError;
pub use layout::{element::Element, field::Field, page::Sample};
pub use registry::Registries;
pub use task::{Orchestrator, TaskReport, TaskState};
