//! List command

use clap::Args;
use tracing::info;

use super::pipeline;
use crate::cli::{output, Cli, OutputFormat};

/// List registered tasks and recipes
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only list recipes
    #[arg(long)]
    pub recipes: bool,
}

impl ListCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(recipes_only = self.recipes, "executing list command");
        let pipeline = pipeline::load(cli)?;
        let registration = &pipeline.registration;

        if cli.format == OutputFormat::Json {
            let tasks: &[String] = if self.recipes { &[] } else { &registration.tasks };
            let listing = serde_json::json!({
                "recipes": registration.recipes,
                "tasks": tasks,
            });
            println!("{}", serde_json::to_string_pretty(&listing)?);
            return Ok(());
        }

        println!("{}", output::header("Recipes"));
        for name in &registration.recipes {
            let members = pipeline
                .registry
                .get(name)
                .map(|unit| unit.plan().tasks().len())
                .unwrap_or_default();
            println!(
                "  {} {}",
                output::recipe_style().apply_to(name),
                console::style(format!("({} task{})", members, output::plural(members))).dim()
            );
        }

        if !self.recipes {
            println!();
            println!("{}", output::header("Tasks"));
            for name in &registration.tasks {
                let plugin = registration
                    .config
                    .plugin(name)
                    .map(|p| p.command.as_str());
                match plugin {
                    Some(command) if cli.verbose => println!(
                        "  {} {}",
                        output::task_style().apply_to(name),
                        console::style(command).dim()
                    ),
                    _ => println!("  {}", output::task_style().apply_to(name)),
                }
            }
        }
        Ok(())
    }
}
