//! Assetline Core - configuration and path resolution for the asset pipeline
//!
//! This crate provides the error types, the typed build configuration with its
//! documented defaults, the configuration loader and the glob path resolver
//! shared by the task catalog and the CLI.

pub mod config;
pub mod error;

pub use config::{BuildConfig, BuildOptions, Globs};
pub use error::{AssetlineError, ConfigError, Result};
