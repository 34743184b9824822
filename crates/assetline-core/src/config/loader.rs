//! Configuration loading

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};

use super::defaults::config_file_names;
use super::types::BuildOptions;
use super::validation::validate_options;

/// Load build options from a file
pub fn load_options(path: &Path) -> Result<BuildOptions> {
    let format = if path.extension().is_some_and(|e| e == "toml") {
        "TOML"
    } else {
        "YAML"
    };
    info!(path = %path.display(), format, "loading config");

    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

    let options: BuildOptions = if format == "TOML" {
        toml::from_str(&content).map_err(ConfigError::TomlError)?
    } else if content.trim().is_empty() {
        BuildOptions::default()
    } else {
        serde_yaml::from_str(&content).map_err(ConfigError::YamlError)?
    };

    validate_options(&options)?;
    debug!(path = %path.display(), "config loaded and validated");
    Ok(options)
}

/// Find configuration file in directory or parent directories.
///
/// The first match wins. Parents are walked until the filesystem root.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    debug!(start_dir = %start_dir.display(), "searching for config file");
    let mut current = start_dir.to_path_buf();

    loop {
        for name in config_file_names() {
            let config_path = current.join(name);
            if config_path.exists() {
                info!(path = %config_path.display(), "found config file");
                return Some(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    debug!("no config file found");
    None
}

/// Load build options from directory (searching parent directories)
pub fn load_options_from_dir(dir: &Path) -> Result<(BuildOptions, PathBuf)> {
    let config_path = find_config(dir).ok_or_else(|| ConfigError::NotFound(dir.to_path_buf()))?;

    let options = load_options(&config_path)?;
    Ok((options, config_path))
}

/// Load build options or use defaults when no file exists.
///
/// A file that exists but fails to parse or validate is still an error.
pub fn load_options_or_default(dir: &Path) -> Result<(BuildOptions, Option<PathBuf>)> {
    match find_config(dir) {
        Some(path) => {
            let options = load_options(&path)?;
            Ok((options, Some(path)))
        }
        None => {
            warn!(dir = %dir.display(), "no config found, using defaults");
            Ok((BuildOptions::default(), None))
        }
    }
}
