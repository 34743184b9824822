//! CLI commands

mod completions;
mod init;
mod list;
mod pipeline;
mod plan;
mod run;
mod validate;

pub use completions::CompletionsCommand;
pub use init::InitCommand;
pub use list::ListCommand;
pub use plan::PlanCommand;
pub use run::RunCommand;
pub use validate::ValidateCommand;
