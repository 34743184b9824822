//! Default configuration values

use super::types::BuildOptions;

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "assetline.yaml";

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "assetline.toml";

/// Alternative configuration file name
pub const ALT_CONFIG_FILE: &str = ".assetline.yaml";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_YAML,
        DEFAULT_CONFIG_TOML,
        ALT_CONFIG_FILE,
        ".assetline.toml",
    ]
}

/// Names of the build steps in the task catalog
pub mod task_names {
    pub const WIREDEP: &str = "wiredep";
    pub const STYLES: &str = "styles";
    pub const TEMPLATES: &str = "templates";
    pub const INJECT_CSS: &str = "inject:css";
    pub const INJECT_TEMPLATES: &str = "inject:templates";
    pub const IMAGES: &str = "images";
    pub const FONTS: &str = "fonts";
    pub const OPTIMIZE: &str = "optimize";
    pub const ASSETS: &str = "assets";
    pub const RESOURCES: &str = "resources";
    pub const CLEANUP: &str = "cleanup";
    pub const ARCHIVE: &str = "archive";
}

/// Every catalog task, in registration order
pub const CATALOG_TASKS: &[&str] = &[
    task_names::WIREDEP,
    task_names::STYLES,
    task_names::TEMPLATES,
    task_names::INJECT_CSS,
    task_names::INJECT_TEMPLATES,
    task_names::IMAGES,
    task_names::FONTS,
    task_names::OPTIMIZE,
    task_names::ASSETS,
    task_names::RESOURCES,
    task_names::CLEANUP,
    task_names::ARCHIVE,
];

/// Catalog tasks whose work is done by an external plugin command
pub const PLUGIN_TASKS: &[&str] = &[
    task_names::WIREDEP,
    task_names::STYLES,
    task_names::TEMPLATES,
    task_names::INJECT_CSS,
    task_names::INJECT_TEMPLATES,
    task_names::IMAGES,
    task_names::FONTS,
    task_names::OPTIMIZE,
    task_names::ASSETS,
];

/// Generate default configuration TOML
pub fn default_config_toml() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&BuildOptions::default())
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Assetline Configuration

tasks:
  build: build
  inject: inject
  package: package

root: ./

src:
  root: src/app
  js:
    - "**/*.js"
    - "!**/*{test,.spec}.js"
  html: "**/*.html"
  styles: "**/*.css"
  index: index.html

temp: ./.tmp
build: ./dist

assets:
  root: src/assets
  fonts: fonts/**/*.*
  images: images/**/*.*

bower:
  directory: bower_components
  ignore_path: ../../bower_components

template_cache:
  enabled: false
  file: app.templates.js
  options:
    module: app.core
    standalone: false
    module_system: IIFE
    root: /

optimize:
  vendors: vendors.min.js
  app: app.min.js
  concat: false
  uglify: false
  ng_annotate: false
  rev: false
  useref: false
  filter: "**/*"

manifest: rev-manifest.json
resources: []

package:
  file: package.tar.gz

plugins: {}
"#;
