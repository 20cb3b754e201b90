//! Name-keyed factories for datasets, evaluation tasks and metrics.
//!
//! Configuration refers to components by name only. Every built-in module
//! exposes a `register` function; [`Registries::with_builtins`] runs them all
//! and the resulting value is handed to the orchestrator, which can only read
//! from it. Nothing registers itself implicitly, so the set of available
//! components is fixed before the first task runs.

use std::collections::BTreeMap;

use snafu::{OptionExt, ensure};

use crate::{
    dataset::Dataset,
    error::{DuplicateRegistrationSnafu, EvalError, UnknownComponentSnafu},
    metrics::Metric,
    task::EvalTask,
};

/// Builds a fresh component instance.
pub type Factory<T> = fn() -> Box<T>;

pub struct Registry<T: ?Sized> {
    kind: &'static str,
    factories: BTreeMap<String, Factory<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            factories: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, factory: Factory<T>) -> Result<(), EvalError> {
        let name = name.into();
        ensure!(
            !self.factories.contains_key(&name),
            DuplicateRegistrationSnafu {
                kind: self.kind,
                name
            }
        );
        self.factories.insert(name, factory);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Factory<T>, EvalError> {
        self.factories
            .get(name)
            .copied()
            .context(UnknownComponentSnafu {
                kind: self.kind,
                name,
            })
    }

    pub fn create(&self, name: &str) -> Result<Box<T>, EvalError> {
        Ok(self.get(name)?())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl<T: ?Sized> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The three registries an evaluation run resolves its components from.
#[derive(Debug)]
pub struct Registries {
    pub datasets: Registry<dyn Dataset>,
    pub tasks: Registry<dyn EvalTask>,
    pub metrics: Registry<dyn Metric>,
}

impl Registries {
    pub fn empty() -> Self {
        Self {
            datasets: Registry::new("dataset"),
            tasks: Registry::new("task"),
            metrics: Registry::new("metric"),
        }
    }

    /// Registries populated with every component shipped in this crate.
    pub fn with_builtins() -> Result<Self, EvalError> {
        let mut registries = Self::empty();
        crate::dataset::register(&mut registries.datasets)?;
        crate::task::register(&mut registries.tasks)?;
        crate::metrics::register(&mut registries.metrics)?;
        Ok(registries)
    }
}
