//! Configuration validation
//!
//! Runs before path resolution so a bad value fails registration with the
//! offending field named, instead of surfacing later as a missing file in
//! some plugin.

use std::collections::HashSet;
use std::path::{Component, Path};

use tracing::debug;

use crate::error::ConfigError;

use super::defaults::{CATALOG_TASKS, PLUGIN_TASKS};
use super::paths::{join_glob, Globs, EXCLUSION_MARKER};
use super::types::BuildOptions;

/// Validate build options
pub fn validate_options(options: &BuildOptions) -> Result<(), ConfigError> {
    debug!("validating configuration");
    validate_paths(options)?;
    validate_globs(options)?;
    validate_recipes(options)?;
    validate_template_cache(options)?;
    validate_plugins(options)?;
    debug!("configuration validation passed");
    Ok(())
}

fn require(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(field, "cannot be empty"));
    }
    Ok(())
}

fn validate_paths(options: &BuildOptions) -> Result<(), ConfigError> {
    require("root", &options.root)?;
    require("src.root", &options.src.root)?;
    require("src.index", &options.src.index)?;
    require("temp", &options.temp)?;
    require("build", &options.build)?;
    require("assets.root", &options.assets.root)?;
    require("bower.directory", &options.bower.directory)?;
    require("manifest", &options.manifest)?;
    require("package.file", &options.package.file)?;

    // cleanup deletes temp, and clean steps delete below build
    let root = join_glob(".", &options.root);
    let temp = join_glob(&options.root, &options.temp);
    let build = join_glob(&options.root, &options.build);
    let protected = [
        ("the project root", root.clone()),
        ("the build directory", build.clone()),
        ("src.root", join_glob(&options.root, &options.src.root)),
        ("assets.root", join_glob(&options.root, &options.assets.root)),
    ];

    for (what, path) in &protected {
        if encloses(&temp, path) {
            return Err(ConfigError::invalid(
                "temp",
                format!("must not be or contain {} ({})", what, path),
            ));
        }
    }
    if encloses(&build, &root) {
        return Err(ConfigError::invalid(
            "build",
            "must not be or contain the project root",
        ));
    }

    Ok(())
}

/// Whether `outer` is `inner` or one of its ancestors, comparing normalized
/// components only.
///
/// A relative path is some `..` steps followed by names. A path with more
/// leading `..` than the other encloses it only when nothing follows them.
/// Absolute and relative paths are never compared.
fn encloses(outer: &str, inner: &str) -> bool {
    let outer: Vec<Component<'_>> = Path::new(outer)
        .components()
        .filter(|c| *c != Component::CurDir)
        .collect();
    let inner: Vec<Component<'_>> = Path::new(inner)
        .components()
        .filter(|c| *c != Component::CurDir)
        .collect();

    let absolute = |parts: &[Component<'_>]| {
        matches!(parts.first(), Some(Component::RootDir | Component::Prefix(_)))
    };
    if absolute(&outer) != absolute(&inner) {
        return false;
    }

    let ups = |parts: &[Component<'_>]| {
        parts
            .iter()
            .take_while(|c| **c == Component::ParentDir)
            .count()
    };
    let (outer_ups, inner_ups) = (ups(&outer), ups(&inner));
    if outer_ups > inner_ups {
        return outer.len() == outer_ups;
    }
    outer_ups == inner_ups && inner.starts_with(&outer)
}

fn validate_glob_list(field: &str, globs: &Globs) -> Result<(), ConfigError> {
    for (i, glob) in globs.iter().enumerate() {
        let bare = glob.strip_prefix(EXCLUSION_MARKER).unwrap_or(glob);
        if bare.trim().is_empty() {
            let field = match globs {
                Globs::One(_) => field.to_string(),
                Globs::Many(_) => format!("{}[{}]", field, i),
            };
            return Err(ConfigError::invalid(field, "glob cannot be empty"));
        }
    }
    Ok(())
}

fn validate_globs(options: &BuildOptions) -> Result<(), ConfigError> {
    validate_glob_list("src.js", &options.src.js)?;
    validate_glob_list("src.html", &options.src.html)?;
    validate_glob_list("src.styles", &options.src.styles)?;
    validate_glob_list("assets.fonts", &options.assets.fonts)?;
    validate_glob_list("assets.images", &options.assets.images)?;
    validate_glob_list("resources", &options.resources)?;
    Ok(())
}

fn validate_recipes(options: &BuildOptions) -> Result<(), ConfigError> {
    let recipes = [
        ("tasks.build", &options.tasks.build),
        ("tasks.inject", &options.tasks.inject),
        ("tasks.package", &options.tasks.package),
    ];

    let mut seen = HashSet::new();
    for (field, name) in recipes {
        require(field, name)?;

        if CATALOG_TASKS.contains(&name.as_str()) {
            return Err(ConfigError::invalid(
                field,
                format!("'{}' is already the name of a build step", name),
            ));
        }

        if !seen.insert(name.as_str()) {
            return Err(ConfigError::invalid(
                field,
                format!("recipe name '{}' is used more than once", name),
            ));
        }
    }

    Ok(())
}

fn validate_template_cache(options: &BuildOptions) -> Result<(), ConfigError> {
    if options.template_cache.enabled {
        require("template_cache.file", &options.template_cache.file)?;
        require(
            "template_cache.options.module",
            &options.template_cache.options.module,
        )?;
    }
    Ok(())
}

fn validate_plugins(options: &BuildOptions) -> Result<(), ConfigError> {
    if !options.plugins.is_empty() {
        debug!(count = options.plugins.len(), "validating plugins");
    }
    for (task, plugin) in &options.plugins {
        let field = format!("plugins.{}", task);

        if !PLUGIN_TASKS.contains(&task.as_str()) {
            let message = if CATALOG_TASKS.contains(&task.as_str()) {
                "is a built-in step and cannot be replaced by a plugin".to_string()
            } else {
                format!("unknown task, expected one of: {}", PLUGIN_TASKS.join(", "))
            };
            return Err(ConfigError::invalid(field, message));
        }

        require(&format!("{}.command", field), &plugin.command)?;
    }

    Ok(())
}
