//! Assetline Tasks - build step catalog and orchestration
//!
//! This crate provides the catalog of front-end build steps, series/parallel
//! composition of those steps into recipes, and registration of the whole
//! pipeline on a task runner.

pub mod archive;
pub mod builtin;
pub mod catalog;
pub mod files;
pub mod plan;
pub mod plugin;
pub mod registrar;
pub mod registry;
pub mod reporter;
pub mod scheduler;
pub mod task;

pub use catalog::TaskCatalog;
pub use plan::PlanNode;
pub use registrar::{RegisterError, Registrar, Registration};
pub use registry::{RegistryError, TaskRegistry, TaskRunner, UnitLookup};
pub use reporter::{
    CollectingReporter, FileAction, TaskEvent, TaskReporter, TaskReporterRegistry, TracingReporter,
};
pub use scheduler::{parallel, series, Recipe, RecipeBuilder, Stage};
pub use task::{RunContext, Task, TaskError, TaskOutcome, TaskResult, UnitKind, UnitRef};
