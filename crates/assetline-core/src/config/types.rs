//! Configuration types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

use super::paths::{join_glob, Globs};
use super::validation::validate_options;

/// Build options as written by the user, before path resolution.
///
/// Every section falls back to its defaults key by key, so a file that only
/// sets `src.root` keeps the default `src.js`, `src.index` and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Names the top-level recipes are registered under
    pub tasks: RecipeNames,

    /// Project root every other path is relative to
    pub root: String,

    /// Application sources
    pub src: SourceOptions,

    /// Scratch directory for intermediate output
    pub temp: String,

    /// Final output directory
    pub build: String,

    /// Fonts and images
    pub assets: AssetsOptions,

    /// Bower dependency wiring
    pub bower: BowerOptions,

    /// HTML template bundling
    pub template_cache: TemplateCacheOptions,

    /// Optimization toggles
    pub optimize: OptimizeOptions,

    /// Revision manifest file name, relative to the build directory
    pub manifest: String,

    /// Files copied into the build directory without processing
    pub resources: Globs,

    /// Build archive
    pub package: PackageOptions,

    /// External plugin commands keyed by task name
    pub plugins: BTreeMap<String, PluginCommand>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            tasks: RecipeNames::default(),
            root: "./".to_string(),
            src: SourceOptions::default(),
            temp: "./.tmp".to_string(),
            build: "./dist".to_string(),
            assets: AssetsOptions::default(),
            bower: BowerOptions::default(),
            template_cache: TemplateCacheOptions::default(),
            optimize: OptimizeOptions::default(),
            manifest: "rev-manifest.json".to_string(),
            resources: Globs::default(),
            package: PackageOptions::default(),
            plugins: BTreeMap::new(),
        }
    }
}

/// Top-level recipe names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeNames {
    /// Full build recipe
    pub build: String,
    /// Inject recipe
    pub inject: String,
    /// Package recipe (runs build first)
    pub package: String,
}

impl Default for RecipeNames {
    fn default() -> Self {
        Self {
            build: "build".to_string(),
            inject: "inject".to_string(),
            package: "package".to_string(),
        }
    }
}

/// Application source locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    /// Source directory, relative to the project root
    pub root: String,
    /// Script globs, relative to the source directory
    pub js: Globs,
    /// Template globs, relative to the source directory
    pub html: Globs,
    /// Stylesheet globs, relative to the source directory
    pub styles: Globs,
    /// Index page, relative to the source directory
    pub index: String,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            root: "src/app".to_string(),
            js: Globs::many(["**/*.js", "!**/*{test,.spec}.js"]),
            html: Globs::from("**/*.html"),
            styles: Globs::from("**/*.css"),
            index: "index.html".to_string(),
        }
    }
}

/// Font and image locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsOptions {
    /// Assets directory, relative to the project root
    pub root: String,
    /// Font globs, relative to the assets directory
    pub fonts: Globs,
    /// Image globs, relative to the assets directory
    pub images: Globs,
}

impl Default for AssetsOptions {
    fn default() -> Self {
        Self {
            root: "src/assets".to_string(),
            fonts: Globs::from("fonts/**/*.*"),
            images: Globs::from("images/**/*.*"),
        }
    }
}

/// Bower dependency wiring options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BowerOptions {
    /// Bower components directory, relative to the project root
    pub directory: String,
    /// Prefix stripped from injected paths (passed to the plugin verbatim)
    pub ignore_path: String,
}

impl Default for BowerOptions {
    fn default() -> Self {
        Self {
            directory: "bower_components".to_string(),
            ignore_path: "../../bower_components".to_string(),
        }
    }
}

/// Template bundling options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateCacheOptions {
    /// Whether templates are bundled and injected
    pub enabled: bool,
    /// Bundle file name, written to the temp directory
    pub file: String,
    /// Options handed to the bundling plugin
    pub options: TemplateModuleOptions,
}

impl Default for TemplateCacheOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            file: "app.templates.js".to_string(),
            options: TemplateModuleOptions::default(),
        }
    }
}

/// Module settings for the generated template bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateModuleOptions {
    pub module: String,
    pub standalone: bool,
    pub module_system: String,
    pub root: String,
}

impl Default for TemplateModuleOptions {
    fn default() -> Self {
        Self {
            module: "app.core".to_string(),
            standalone: false,
            module_system: "IIFE".to_string(),
            root: "/".to_string(),
        }
    }
}

/// Optimization toggles handed to the optimize plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeOptions {
    /// Vendor bundle file name
    pub vendors: String,
    /// Application bundle file name
    pub app: String,
    pub concat: bool,
    pub uglify: bool,
    pub ng_annotate: bool,
    pub rev: bool,
    pub useref: bool,
    /// Glob selecting which optimized files are written
    pub filter: String,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            vendors: "vendors.min.js".to_string(),
            app: "app.min.js".to_string(),
            concat: false,
            uglify: false,
            ng_annotate: false,
            rev: false,
            useref: false,
            filter: "**/*".to_string(),
        }
    }
}

/// Build archive options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageOptions {
    /// Archive path, relative to the project root
    pub file: String,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            file: "package.tar.gz".to_string(),
        }
    }
}

/// External command implementing a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginCommand {
    /// Shell command to execute
    pub command: String,

    /// Extra environment variables
    pub env: BTreeMap<String, String>,
}

impl PluginCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            env: BTreeMap::new(),
        }
    }
}

/// Validated configuration with every path joined onto its base.
///
/// Only produced by [`BuildConfig::resolve`]; shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildConfig {
    pub tasks: RecipeNames,
    pub root: String,
    pub src: SourceOptions,
    pub temp: String,
    pub build: String,
    pub assets: AssetsOptions,
    pub bower: BowerOptions,
    pub template_cache: TemplateCacheOptions,
    pub optimize: OptimizeOptions,
    pub manifest: String,
    pub resources: Globs,
    pub package: PackageOptions,
    pub plugins: BTreeMap<String, PluginCommand>,
}

impl BuildConfig {
    /// Validate `options` and resolve all relative paths.
    pub fn resolve(options: BuildOptions) -> Result<Self, ConfigError> {
        validate_options(&options)?;

        let BuildOptions {
            tasks,
            root,
            src,
            temp,
            build,
            assets,
            bower,
            template_cache,
            optimize,
            manifest,
            resources,
            package,
            plugins,
        } = options;

        let src_root = join_glob(&root, &src.root);
        let src = SourceOptions {
            js: src.js.resolve(&src_root),
            html: src.html.resolve(&src_root),
            styles: src.styles.resolve(&src_root),
            index: join_glob(&src_root, &src.index),
            root: src_root,
        };

        let assets_root = join_glob(&root, &assets.root);
        let assets = AssetsOptions {
            fonts: assets.fonts.resolve(&assets_root),
            images: assets.images.resolve(&assets_root),
            root: assets_root,
        };

        let bower = BowerOptions {
            directory: join_glob(&root, &bower.directory),
            ignore_path: bower.ignore_path,
        };

        let temp = join_glob(&root, &temp);
        let build = join_glob(&root, &build);
        let manifest = join_glob(&build, &manifest);
        let resources = resources.resolve(&root);
        let package = PackageOptions {
            file: join_glob(&root, &package.file),
        };

        debug!(
            root = %root,
            src = %src.root,
            temp = %temp,
            build = %build,
            "configuration resolved"
        );

        Ok(Self {
            tasks,
            root,
            src,
            temp,
            build,
            assets,
            bower,
            template_cache,
            optimize,
            manifest,
            resources,
            package,
            plugins,
        })
    }

    /// Plugin command configured for `task`, if any
    pub fn plugin(&self, task: &str) -> Option<&PluginCommand> {
        self.plugins.get(task)
    }

    /// Path of the template bundle inside the temp directory
    pub fn template_bundle(&self) -> String {
        join_glob(&self.temp, &self.template_cache.file)
    }
}
