//! Name → unit bindings
//!
//! [`TaskRunner`] is the only capability the registrar needs from whatever
//! will invoke units later. [`TaskRegistry`] is the in-memory runner used by
//! the CLI; it rejects a second definition under an existing name rather than
//! overwriting it.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, info};

use crate::task::{invoke, RunContext, TaskError, TaskResult, UnitRef};

/// Errors binding, composing or invoking named units
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A name was defined twice on the same runner
    #[error("Task '{0}' is already defined")]
    DuplicateTask(String),

    /// A name was referenced before (or without) being defined
    #[error("Task '{0}' is not defined")]
    UnknownTask(String),

    /// A recipe with no stages
    #[error("Recipe '{0}' has no stages")]
    EmptyRecipe(String),

    /// A concurrent stage with no members
    #[error("Recipe '{recipe}' has an empty concurrent stage at position {stage}")]
    EmptyStage { recipe: String, stage: usize },

    /// The invoked unit failed
    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Something units can be bound on by name
pub trait TaskRunner {
    /// Bind `unit` under `name`
    fn define_task(&mut self, name: &str, unit: UnitRef) -> Result<(), RegistryError>;

    /// Whether something is already bound under `name`
    fn is_defined(&self, name: &str) -> bool;
}

/// Something units can be resolved from by name
pub trait UnitLookup {
    /// Unit bound under `name`
    fn lookup(&self, name: &str) -> Option<UnitRef>;
}

/// In-memory runner: defines, lists and invokes units by name
#[derive(Default, Clone)]
pub struct TaskRegistry {
    units: BTreeMap<String, UnitRef>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defined names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.units.keys().map(String::as_str).collect()
    }

    /// Unit bound under `name`
    pub fn get(&self, name: &str) -> Option<&UnitRef> {
        self.units.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Invoke the unit bound under `name`.
    ///
    /// Resolves to the first failure encountered anywhere inside the unit,
    /// but only once every member that had already started has finished.
    pub async fn run(&self, name: &str, ctx: &RunContext) -> Result<TaskResult, RegistryError> {
        let unit = self
            .units
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTask(name.to_string()))?;

        info!(name, kind = %unit.kind(), "running");
        let start = Instant::now();
        let result = invoke(unit.as_ref(), ctx).await;
        let settled = ctx.settle().await;
        if settled > 0 {
            debug!(name, settled, "waited for running siblings");
        }
        let outcome = result?;

        Ok(TaskResult {
            name: name.to_string(),
            outcome,
            duration: start.elapsed(),
        })
    }
}

impl TaskRunner for TaskRegistry {
    fn define_task(&mut self, name: &str, unit: UnitRef) -> Result<(), RegistryError> {
        if self.units.contains_key(name) {
            return Err(RegistryError::DuplicateTask(name.to_string()));
        }
        debug!(name, kind = %unit.kind(), "task defined");
        self.units.insert(name.to_string(), unit);
        Ok(())
    }

    fn is_defined(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl UnitLookup for TaskRegistry {
    fn lookup(&self, name: &str) -> Option<UnitRef> {
        self.units.get(name).cloned()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("units", &self.names())
            .finish()
    }
}
