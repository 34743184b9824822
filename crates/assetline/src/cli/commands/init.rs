//! Init command

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::info;

use assetline_core::config::defaults::{
    default_config_toml, DEFAULT_CONFIG_TEMPLATE, DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_YAML,
};

use crate::cli::{output, Cli};

/// Write a default Assetline configuration
#[derive(Debug, Args)]
pub struct InitCommand {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    pub force: bool,

    /// Write TOML instead of YAML
    #[arg(long)]
    pub toml: bool,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl InitCommand {
    /// Execute the init command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(force = self.force, toml = self.toml, "executing init command");
        let cwd = std::env::current_dir()?;
        let config_path = self.target(&cwd);

        if config_path.exists() && !self.force {
            anyhow::bail!(
                "Configuration file already exists at {}. Use --force to overwrite.",
                config_path.display()
            );
        }

        let content = if self.toml {
            default_config_toml()?
        } else {
            DEFAULT_CONFIG_TEMPLATE.to_string()
        };
        std::fs::write(&config_path, content)?;

        if !cli.quiet {
            output::success(&format!(
                "Created {}",
                output::path_style().apply_to(config_path.display())
            ));
        }
        Ok(())
    }

    fn target(&self, cwd: &Path) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None if self.toml => cwd.join(DEFAULT_CONFIG_TOML),
            None => cwd.join(DEFAULT_CONFIG_YAML),
        }
    }
}
