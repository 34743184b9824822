//! Catalog steps the pipeline performs itself

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use assetline_core::config::BuildConfig;

use crate::files;
use crate::reporter::{FileAction, TaskEvent};
use crate::task::{RunContext, Task, TaskError, TaskOutcome};

/// Copies the `resources` globs into the build directory unchanged
pub struct ResourcesTask {
    name: String,
    config: Arc<BuildConfig>,
}

impl ResourcesTask {
    pub fn new(name: impl Into<String>, config: Arc<BuildConfig>) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

#[async_trait]
impl Task for ResourcesTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &RunContext) -> Result<TaskOutcome, TaskError> {
        if self.config.resources.is_empty() {
            return Ok(TaskOutcome::Skipped("no resources configured".to_string()));
        }

        let (task, config) = (self.name.clone(), self.config.clone());
        let count = files::blocking(&self.name, move || {
            files::copy_matching(&task, &config.resources, Path::new(&config.build))
        })
        .await?;
        ctx.report(TaskEvent::Files {
            name: self.name.clone(),
            action: FileAction::Copied,
            count,
        });
        Ok(TaskOutcome::Success)
    }
}

/// Removes the temp directory
pub struct CleanupTask {
    name: String,
    config: Arc<BuildConfig>,
}

impl CleanupTask {
    pub fn new(name: impl Into<String>, config: Arc<BuildConfig>) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

#[async_trait]
impl Task for CleanupTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &RunContext) -> Result<TaskOutcome, TaskError> {
        let (task, temp) = (self.name.clone(), self.config.temp.clone());
        let removed =
            files::blocking(&self.name, move || files::remove_dir(&task, Path::new(&temp))).await?;
        debug!(task = %self.name, temp = %self.config.temp, removed, "temp directory cleaned");
        ctx.report(TaskEvent::Files {
            name: self.name.clone(),
            action: FileAction::Removed,
            count: usize::from(removed),
        });
        Ok(TaskOutcome::Success)
    }
}
