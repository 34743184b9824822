//! The fixed set of build steps, bound to one resolved configuration

use std::sync::Arc;

use assetline_core::config::{join_glob, task_names, BuildConfig};

use crate::archive::ArchiveTask;
use crate::builtin::{CleanupTask, ResourcesTask};
use crate::plugin::PluginTask;
use crate::task::UnitRef;

/// Every catalog task, built once per configuration
pub struct TaskCatalog {
    config: Arc<BuildConfig>,
    tasks: Vec<UnitRef>,
}

impl TaskCatalog {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        let temp = |glob: &str| join_glob(&config.temp, glob);
        let build = |glob: &str| join_glob(&config.build, glob);

        let plugin = |name: &str, clean: Vec<String>| -> UnitRef {
            Arc::new(PluginTask::new(name, config.clone(), clean))
        };

        let tasks: Vec<UnitRef> = vec![
            plugin(task_names::WIREDEP, Vec::new()),
            plugin(
                task_names::STYLES,
                vec![temp("**/*.css"), build("**/*.css")],
            ),
            plugin(task_names::TEMPLATES, vec![temp("**/*.js")]),
            plugin(task_names::INJECT_CSS, Vec::new()),
            plugin(task_names::INJECT_TEMPLATES, Vec::new()),
            plugin(
                task_names::IMAGES,
                vec![build("images/**/*.{jpg,jpeg,gif,png,svg}")],
            ),
            plugin(
                task_names::FONTS,
                vec![build("fonts/**/*.{eot,svg,ttf,woff,woff2}")],
            ),
            plugin(
                task_names::OPTIMIZE,
                vec![build("**/*.js"), build("**/*.html")],
            ),
            plugin(task_names::ASSETS, Vec::new()),
            Arc::new(ResourcesTask::new(task_names::RESOURCES, config.clone())),
            Arc::new(CleanupTask::new(task_names::CLEANUP, config.clone())),
            Arc::new(ArchiveTask::new(task_names::ARCHIVE, config.clone())),
        ];

        Self { config, tasks }
    }

    /// Configuration the tasks were built against
    pub fn config(&self) -> &Arc<BuildConfig> {
        &self.config
    }

    /// Tasks in catalog order
    pub fn tasks(&self) -> &[UnitRef] {
        &self.tasks
    }

    /// Task named `name`
    pub fn get(&self, name: &str) -> Option<UnitRef> {
        self.tasks.iter().find(|t| t.name() == name).cloned()
    }
}
