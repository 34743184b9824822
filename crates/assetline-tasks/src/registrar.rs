//! Registers the catalog and the standard recipes on a runner
//!
//! Composition happens in a private scope first, so every recipe member is
//! resolved (and validated) before anything is defined on the caller's
//! runner. Every name is checked against the runner before the first
//! definition, so a failed registration defines nothing.

use std::sync::Arc;

use tracing::{info, instrument};

use assetline_core::config::{task_names, BuildConfig, BuildOptions};
use assetline_core::ConfigError;

use crate::catalog::TaskCatalog;
use crate::registry::{RegistryError, TaskRegistry, TaskRunner};
use crate::scheduler::{Recipe, RecipeBuilder};
use crate::task::UnitRef;

/// Errors registering the pipeline
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    /// The options did not resolve to a valid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A task or recipe could not be composed or defined
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// What a successful registration defined
#[derive(Debug, Clone)]
pub struct Registration {
    /// Resolved configuration every task was built against
    pub config: Arc<BuildConfig>,
    /// Catalog task names, in catalog order
    pub tasks: Vec<String>,
    /// Recipe names: inject, build, package
    pub recipes: Vec<String>,
}

/// Owns a set of build options and registers the pipeline they describe.
///
/// Registrars share nothing; registering twice on one runner fails on the
/// first duplicate name.
#[derive(Debug, Clone)]
pub struct Registrar {
    options: BuildOptions,
}

impl Registrar {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Resolve the options, build the catalog and define every catalog task
    /// and recipe on `runner`.
    #[instrument(skip_all, fields(root = %self.options.root))]
    pub fn register(&self, runner: &mut dyn TaskRunner) -> Result<Registration, RegisterError> {
        let config = Arc::new(BuildConfig::resolve(self.options.clone())?);
        let catalog = TaskCatalog::new(config.clone());

        let mut scope = TaskRegistry::new();
        for task in catalog.tasks() {
            scope.define_task(task.name(), task.clone())?;
        }

        let recipes = compose_recipes(&mut scope, &config)?;

        let units: Vec<&UnitRef> = catalog.tasks().iter().chain(&recipes).collect();
        if let Some(taken) = units.iter().find(|u| runner.is_defined(u.name())) {
            return Err(RegistryError::DuplicateTask(taken.name().to_string()).into());
        }

        for unit in units {
            runner.define_task(unit.name(), unit.clone())?;
        }

        let registration = Registration {
            tasks: catalog.tasks().iter().map(|t| t.name().to_string()).collect(),
            recipes: recipes.iter().map(|r| r.name().to_string()).collect(),
            config,
        };
        info!(
            tasks = registration.tasks.len(),
            recipes = ?registration.recipes,
            templates = registration.config.template_cache.enabled,
            "pipeline registered"
        );
        Ok(registration)
    }
}

/// Compose `inject`, `build` and `package` in `scope`, defining each there so
/// later recipes can refer to earlier ones by name.
fn compose_recipes(
    scope: &mut TaskRegistry,
    config: &BuildConfig,
) -> Result<Vec<UnitRef>, RegistryError> {
    let names = &config.tasks;

    let inject = if config.template_cache.enabled {
        RecipeBuilder::new(&names.inject, &*scope)
            .concurrently(&[task_names::WIREDEP, task_names::STYLES, task_names::TEMPLATES])
            .then(task_names::INJECT_CSS)
            .then(task_names::INJECT_TEMPLATES)
            .build()?
    } else {
        RecipeBuilder::new(&names.inject, &*scope)
            .concurrently(&[task_names::WIREDEP, task_names::STYLES])
            .then(task_names::INJECT_CSS)
            .build()?
    };
    let inject = define(scope, inject)?;

    let build = RecipeBuilder::new(&names.build, &*scope)
        .concurrently(&[task_names::IMAGES, task_names::FONTS, names.inject.as_str()])
        .then(task_names::OPTIMIZE)
        .then(task_names::ASSETS)
        .then(task_names::RESOURCES)
        .then(task_names::CLEANUP)
        .build()?;
    let build = define(scope, build)?;

    let package = RecipeBuilder::new(&names.package, &*scope)
        .then(&names.build)
        .then(task_names::ARCHIVE)
        .build()?;
    let package = define(scope, package)?;

    Ok(vec![inject, build, package])
}

fn define(scope: &mut TaskRegistry, recipe: Recipe) -> Result<UnitRef, RegistryError> {
    let name = recipe.name().to_string();
    let unit: UnitRef = Arc::new(recipe);
    scope.define_task(&name, unit.clone())?;
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use assetline_core::config::PluginCommand;
    use tempfile::TempDir;

    use crate::plan::PlanNode;
    use crate::reporter::{CollectingReporter, TaskEvent};
    use crate::task::{RunContext, TaskError};

    fn options_in(root: &TempDir) -> BuildOptions {
        BuildOptions {
            root: root.path().to_string_lossy().into_owned(),
            ..Default::default()
        }
    }

    fn registered(options: BuildOptions) -> (TaskRegistry, Registration) {
        let mut registry = TaskRegistry::new();
        let registration = Registrar::new(options).register(&mut registry).unwrap();
        (registry, registration)
    }

    fn index_of(list: &[String], name: &str) -> usize {
        list.iter()
            .position(|n| n == name)
            .unwrap_or_else(|| panic!("{name} never started"))
    }

    #[test]
    fn test_register_defines_catalog_and_recipes() {
        let (registry, registration) = registered(BuildOptions::default());

        assert_eq!(registration.recipes, vec!["inject", "build", "package"]);
        assert_eq!(registration.tasks.len(), 12);
        assert_eq!(registry.len(), 15);
        for name in registration.tasks.iter().chain(&registration.recipes) {
            assert!(registry.contains(name), "{name} not defined");
        }
    }

    #[test]
    fn test_inject_without_template_bundling() {
        let (registry, _) = registered(BuildOptions::default());
        let plan = registry.get("inject").unwrap().plan();

        assert_eq!(plan.tasks(), vec!["wiredep", "styles", "inject:css"]);
        assert!(!plan.contains_task("templates"));
        assert!(!plan.contains_task("inject:templates"));
    }

    #[test]
    fn test_inject_with_template_bundling() {
        let mut options = BuildOptions::default();
        options.template_cache.enabled = true;
        let (registry, _) = registered(options);
        let plan = registry.get("inject").unwrap().plan();

        let stages = plan.stages();
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0].member_names(), vec!["wiredep", "styles", "templates"]);
        assert_eq!(stages[1], &PlanNode::task("inject:css"));
        assert_eq!(stages[2], &PlanNode::task("inject:templates"));
    }

    #[test]
    fn test_build_and_package_shape() {
        let (registry, _) = registered(BuildOptions::default());

        let build = registry.get("build").unwrap().plan();
        let stages = build.stages();
        assert_eq!(stages[0].member_names(), vec!["images", "fonts", "inject"]);
        let rest: Vec<_> = stages[1..].iter().map(|s| s.name().unwrap()).collect();
        assert_eq!(rest, vec!["optimize", "assets", "resources", "cleanup"]);

        let package = registry.get("package").unwrap().plan();
        assert_eq!(
            package.stages().iter().map(|s| s.name().unwrap()).collect::<Vec<_>>(),
            vec!["build", "archive"]
        );
    }

    #[test]
    fn test_custom_recipe_names() {
        let mut options = BuildOptions::default();
        options.tasks.build = "compile".to_string();
        options.tasks.inject = "wire".to_string();
        let (registry, registration) = registered(options);

        assert_eq!(registration.recipes, vec!["wire", "compile", "package"]);
        assert!(!registry.contains("build"));
        assert!(registry.get("compile").unwrap().plan().contains_task("inject:css"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registrar = Registrar::new(BuildOptions::default());
        let mut registry = TaskRegistry::new();
        registrar.register(&mut registry).unwrap();

        let err = registrar.register(&mut registry).unwrap_err();
        assert!(matches!(
            err,
            RegisterError::Registry(RegistryError::DuplicateTask(ref name)) if name == "wiredep"
        ));
    }

    #[test]
    fn test_taken_recipe_name_defines_nothing() {
        let mut registry = TaskRegistry::new();
        let (other, _) = registered(BuildOptions::default());
        registry
            .define_task("build", other.get("cleanup").unwrap().clone())
            .unwrap();

        let err = Registrar::new(BuildOptions::default())
            .register(&mut registry)
            .unwrap_err();

        assert!(matches!(
            err,
            RegisterError::Registry(RegistryError::DuplicateTask(ref name)) if name == "build"
        ));
        assert_eq!(registry.names(), vec!["build"]);
    }

    #[test]
    fn test_runners_are_independent() {
        let registrar = Registrar::new(BuildOptions::default());
        let mut first = TaskRegistry::new();
        let mut second = TaskRegistry::new();

        registrar.register(&mut first).unwrap();
        registrar.register(&mut second).unwrap();

        assert_eq!(first.names(), second.names());
    }

    #[test]
    fn test_invalid_options_name_the_field() {
        let mut options = BuildOptions::default();
        options.temp = options.build.clone();

        let err = Registrar::new(options)
            .register(&mut TaskRegistry::new())
            .unwrap_err();
        match err {
            RegisterError::Config(config) => assert_eq!(config.field(), Some("temp")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_build_dispatch_order() {
        let root = TempDir::new().unwrap();
        let mut options = options_in(&root);
        options.template_cache.enabled = true;
        let (registry, _) = registered(options);

        let reporter = Arc::new(CollectingReporter::default());
        registry
            .run("build", &RunContext::new(reporter.clone()))
            .await
            .unwrap();

        let started = reporter.started_tasks();
        assert_eq!(started.len(), 11);

        let first_stage = [
            "images",
            "fonts",
            "wiredep",
            "styles",
            "templates",
            "inject:css",
            "inject:templates",
        ];
        let optimize = index_of(&started, "optimize");
        for name in first_stage {
            assert!(index_of(&started, name) < optimize, "{name} after optimize");
        }
        for name in ["wiredep", "styles", "templates"] {
            assert!(index_of(&started, name) < index_of(&started, "inject:css"));
        }
        assert!(index_of(&started, "inject:css") < index_of(&started, "inject:templates"));
        assert_eq!(
            &started[optimize..],
            &["optimize", "assets", "resources", "cleanup"]
        );
        assert!(!started.contains(&"archive".to_string()));
    }

    #[tokio::test]
    async fn test_stage_failure_stops_later_stages() {
        let root = TempDir::new().unwrap();
        let mut options = options_in(&root);
        options
            .plugins
            .insert("images".to_string(), PluginCommand::new("exit 7"));
        let (registry, _) = registered(options);

        let reporter = Arc::new(CollectingReporter::default());
        let err = registry
            .run("build", &RunContext::new(reporter.clone()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RegistryError::Task(TaskError::PluginFailed { ref task, code: 7, .. })
                if task == "images"
        ));
        assert!(!reporter.started_tasks().contains(&"optimize".to_string()));
    }

    #[tokio::test]
    async fn test_package_builds_before_archiving() {
        let root = TempDir::new().unwrap();
        let mut options = options_in(&root);
        options.plugins.insert(
            "optimize".to_string(),
            PluginCommand::new(
                r#"mkdir -p "$ASSETLINE_BUILD" && echo ok > "$ASSETLINE_BUILD/index.html""#,
            ),
        );
        let (registry, registration) = registered(options);

        let reporter = Arc::new(CollectingReporter::default());
        registry
            .run("package", &RunContext::new(reporter.clone()))
            .await
            .unwrap();

        let started = reporter.started_tasks();
        assert_eq!(started.last().map(String::as_str), Some("archive"));
        assert!(index_of(&started, "cleanup") < index_of(&started, "archive"));
        assert!(Path::new(&registration.config.package.file).exists());

        let build_done = reporter
            .position(|e| matches!(e, TaskEvent::Completed { name, .. } if name == "build"))
            .unwrap();
        let archive_started = reporter
            .position(|e| matches!(e, TaskEvent::Started { name, .. } if name == "archive"))
            .unwrap();
        assert!(build_done < archive_started);
        assert!(fs::metadata(root.path().join("dist/index.html")).is_ok());
    }
}
