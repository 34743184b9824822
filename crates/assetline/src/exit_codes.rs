//! Exit codes for the CLI

use assetline_core::{AssetlineError, ConfigError};
use assetline_tasks::{RegisterError, RegistryError, TaskError};

/// Success
pub const SUCCESS: u8 = 0;

/// General error
pub const ERROR: u8 = 1;

/// Configuration error
pub const CONFIG_ERROR: u8 = 2;

/// A task or recipe failed while running
pub const TASK_FAILED: u8 = 4;

/// Exit code for an error surfaced by a command
pub fn for_error(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.is::<ConfigError>() {
            return CONFIG_ERROR;
        }
        if let Some(AssetlineError::Config(_)) = cause.downcast_ref::<AssetlineError>() {
            return CONFIG_ERROR;
        }
        if let Some(RegisterError::Config(_)) = cause.downcast_ref::<RegisterError>() {
            return CONFIG_ERROR;
        }
        if let Some(RegistryError::Task(_)) = cause.downcast_ref::<RegistryError>() {
            return TASK_FAILED;
        }
        if cause.is::<TaskError>() {
            return TASK_FAILED;
        }
    }
    ERROR
}
