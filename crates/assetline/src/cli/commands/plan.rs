//! Plan command - show the composition tree of a unit

use anyhow::Context;
use clap::Args;
use tracing::info;

use super::pipeline;
use crate::cli::{Cli, OutputFormat};

/// Show how a task or recipe is composed
#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Task or recipe to describe
    #[arg(default_value = "build")]
    pub name: String,
}

impl PlanCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(name = %self.name, "executing plan command");
        let pipeline = pipeline::load(cli)?;

        let unit = pipeline
            .registry
            .get(&self.name)
            .with_context(|| format!("Unknown task '{}'", self.name))?;
        let plan = unit.plan();

        match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
            OutputFormat::Text => print!("{}", plan.render()),
        }
        Ok(())
    }
}
