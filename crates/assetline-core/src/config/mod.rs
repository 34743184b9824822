//! Configuration system for Assetline

pub mod defaults;
mod loader;
pub mod paths;
mod types;
pub mod validation;

pub use defaults::*;
pub use loader::*;
pub use paths::{is_exclusion, join_glob, Globs};
pub use types::*;
pub use validation::*;
