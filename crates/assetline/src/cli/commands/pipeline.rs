//! Loading the configuration and registering the pipeline for a command

use std::path::{Path, PathBuf};

use anyhow::Context;

use assetline_core::config::{join_glob, load_options_or_default, BuildOptions};
use assetline_tasks::{Registrar, Registration, TaskRegistry};

use crate::cli::{output, Cli, OutputFormat};

/// Registered pipeline, ready to run
pub struct Pipeline {
    pub registry: TaskRegistry,
    pub registration: Registration,
    pub config_path: Option<PathBuf>,
}

/// Load options from the working directory (or defaults) and register every
/// task and recipe on a fresh registry.
pub fn load(cli: &Cli) -> anyhow::Result<Pipeline> {
    let cwd = std::env::current_dir()?;
    let (options, config_path) = load_options_or_default(&cwd)?;

    if config_path.is_none() && !cli.quiet && cli.format == OutputFormat::Text {
        output::warning("No configuration file found, using defaults");
    }

    let base = config_path
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(&cwd);
    let options = anchor_root(options, base);

    let mut registry = TaskRegistry::new();
    let registration = Registrar::new(options)
        .register(&mut registry)
        .context("Failed to register the build pipeline")?;

    Ok(Pipeline {
        registry,
        registration,
        config_path,
    })
}

/// Make a relative `root` relative to the directory holding the config file
pub fn anchor_root(mut options: BuildOptions, base: &Path) -> BuildOptions {
    options.root = join_glob(&base.to_string_lossy(), &options.root);
    options
}
