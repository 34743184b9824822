//! Validate command

use clap::Args;
use console::style;
use tracing::info;

use assetline_core::config::{load_options_from_dir, BuildConfig};

use super::pipeline::anchor_root;
use crate::cli::{output, Cli, OutputFormat};

/// Validate the configuration and show resolved paths
#[derive(Debug, Args)]
pub struct ValidateCommand {
    /// Accept a missing configuration file (defaults are validated)
    #[arg(long)]
    pub allow_missing: bool,
}

impl ValidateCommand {
    /// Execute the validate command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(allow_missing = self.allow_missing, "executing validate command");
        let cwd = std::env::current_dir()?;

        let (options, config_path) = match load_options_from_dir(&cwd) {
            Ok((options, path)) => (options, Some(path)),
            Err(err) if self.allow_missing && is_not_found(&err) => {
                (Default::default(), None)
            }
            Err(err) => return Err(err.into()),
        };

        let base = config_path
            .as_deref()
            .and_then(std::path::Path::parent)
            .unwrap_or(&cwd);
        let config = BuildConfig::resolve(anchor_root(options, base))?;

        match cli.format {
            OutputFormat::Json => {
                let report = serde_json::json!({
                    "valid": true,
                    "config_path": config_path.map(|p| p.to_string_lossy().to_string()),
                    "config": config,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            OutputFormat::Text => {
                if cli.quiet {
                    return Ok(());
                }
                println!("{}", output::header("Validation Results"));
                println!();
                match &config_path {
                    Some(path) => {
                        println!("Config: {}", output::path_style().apply_to(path.display()))
                    }
                    None => println!("Config: {}", style("defaults").dim()),
                }
                println!();

                println!("{}", output::header("Resolved paths"));
                for (key, value) in resolved_paths(&config) {
                    println!("{}", output::key_value(key, &value));
                }
                println!();

                println!(
                    "{}",
                    output::key_value(
                        "template bundling",
                        if config.template_cache.enabled { "enabled" } else { "disabled" }
                    )
                );
                let plugins: Vec<&str> = config.plugins.keys().map(String::as_str).collect();
                println!(
                    "{}",
                    output::key_value(
                        "plugins",
                        &if plugins.is_empty() { "none".to_string() } else { plugins.join(", ") }
                    )
                );
                println!();
                println!("{}", style("✓ Configuration is valid").green().bold());
            }
        }

        Ok(())
    }
}

fn is_not_found(err: &assetline_core::AssetlineError) -> bool {
    matches!(
        err,
        assetline_core::AssetlineError::Config(assetline_core::ConfigError::NotFound(_))
    )
}

/// Resolved paths worth showing, in configuration order
fn resolved_paths(config: &BuildConfig) -> Vec<(&'static str, String)> {
    vec![
        ("root", config.root.clone()),
        ("src.root", config.src.root.clone()),
        ("src.index", config.src.index.clone()),
        ("src.js", config.src.js.to_vec().join(", ")),
        ("src.html", config.src.html.to_vec().join(", ")),
        ("src.styles", config.src.styles.to_vec().join(", ")),
        ("temp", config.temp.clone()),
        ("build", config.build.clone()),
        ("assets.fonts", config.assets.fonts.to_vec().join(", ")),
        ("assets.images", config.assets.images.to_vec().join(", ")),
        ("bower.directory", config.bower.directory.clone()),
        ("template bundle", config.template_bundle()),
        ("manifest", config.manifest.clone()),
        ("resources", config.resources.to_vec().join(", ")),
        ("package", config.package.file.clone()),
    ]
}
