//! Run command - invoke tasks and recipes by name

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use console::style;
use tracing::info;

use assetline_tasks::{
    RunContext, TaskEvent, TaskOutcome, TaskReporter, TaskReporterRegistry, TaskResult,
    TracingReporter, UnitKind,
};

use super::pipeline;
use crate::cli::{output, Cli, OutputFormat};

/// Run tasks or recipes by name
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Tasks or recipes to run, in order (e.g. build, package, styles)
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Show what would run without running it
    #[arg(long)]
    pub dry_run: bool,
}

impl RunCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(names = ?self.names, dry_run = self.dry_run, "executing run command");
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let pipeline = pipeline::load(cli)?;
        let registry = &pipeline.registry;

        // Unknown names fail before anything runs
        let mut units = Vec::with_capacity(self.names.len());
        for name in &self.names {
            let unit = registry.get(name).with_context(|| {
                format!(
                    "Unknown task '{}'. Available: {}",
                    name,
                    registry.names().join(", ")
                )
            })?;
            units.push(unit.clone());
        }

        if self.dry_run {
            match cli.format {
                OutputFormat::Json => {
                    let plans: Vec<_> = units.iter().map(|u| u.plan()).collect();
                    println!("{}", serde_json::to_string_pretty(&plans)?);
                }
                OutputFormat::Text => {
                    for unit in &units {
                        print!("{}", unit.plan().render());
                    }
                    println!("{}", style("[DRY RUN - no tasks will be executed]").yellow().bold());
                }
            }
            return Ok(());
        }

        let mut reporters = TaskReporterRegistry::empty();
        reporters.register(TracingReporter);
        if !cli.quiet && cli.format == OutputFormat::Text {
            reporters.register(ConsoleReporter::new(cli.verbose));
        }
        let ctx = RunContext::new(Arc::new(reporters));

        if !cli.quiet && cli.format == OutputFormat::Text {
            output::info(&format!(
                "Running {} unit{} in {}",
                self.names.len(),
                output::plural(self.names.len()),
                style(&pipeline.registration.config.root).cyan()
            ));
            println!();
        }

        let start = Instant::now();
        let mut results: Vec<TaskResult> = Vec::new();
        let mut failure = None;
        for name in &self.names {
            match registry.run(name, &ctx).await {
                Ok(result) => results.push(result),
                Err(err) => {
                    failure = Some((name.clone(), err));
                    break;
                }
            }
        }

        if cli.format == OutputFormat::Json {
            let summary = serde_json::json!({
                "succeeded": failure.is_none(),
                "duration_ms": start.elapsed().as_millis(),
                "results": results.iter().map(|r| {
                    serde_json::json!({
                        "name": r.name,
                        "outcome": outcome_label(&r.outcome),
                        "duration_ms": r.duration.as_millis(),
                    })
                }).collect::<Vec<_>>(),
                "failed": failure.as_ref().map(|(name, err)| {
                    serde_json::json!({ "name": name, "error": err.to_string() })
                }),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        if let Some((name, err)) = failure {
            return Err(anyhow::Error::new(err).context(format!("'{}' failed", name)));
        }

        if !cli.quiet && cli.format == OutputFormat::Text {
            println!();
            output::success(&format!(
                "Done in {:.1}s",
                start.elapsed().as_secs_f64()
            ));
        }
        Ok(())
    }
}

fn outcome_label(outcome: &TaskOutcome) -> String {
    match outcome {
        TaskOutcome::Success => "success".to_string(),
        TaskOutcome::Skipped(reason) => format!("skipped: {}", reason),
    }
}

/// Console reporter with live output
struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl TaskReporter for ConsoleReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { name, kind } => {
                if *kind == UnitKind::Task || self.verbose {
                    println!(
                        "  {} {} {}",
                        style("▸").dim(),
                        style(name).bold(),
                        if *kind == UnitKind::Task {
                            String::new()
                        } else {
                            style(format!("({})", kind)).dim().to_string()
                        }
                    );
                }
            }
            TaskEvent::Output {
                name,
                line,
                is_stderr,
            } => {
                if self.verbose {
                    if *is_stderr {
                        println!("    {} {}", style(format!("[{}]", name)).red().dim(), line);
                    } else {
                        println!("    {} {}", style(format!("[{}]", name)).dim(), line);
                    }
                }
            }
            TaskEvent::Completed {
                name,
                kind,
                duration,
            } => {
                let label = if *kind == UnitKind::Task {
                    style(name).green()
                } else {
                    style(name).green().bold()
                };
                println!(
                    "  {} {} {}",
                    style("✓").green(),
                    label,
                    style(format!("{:.1}s", duration.as_secs_f64())).dim()
                );
            }
            TaskEvent::Failed {
                name,
                duration,
                error,
                ..
            } => {
                println!(
                    "  {} {} {} {}",
                    style("✗").red(),
                    style(name).red(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim(),
                    style(error).red().dim()
                );
            }
            TaskEvent::Skipped { name, reason } => {
                println!(
                    "  {} {} {}",
                    style("○").yellow(),
                    style(name).yellow(),
                    style(format!("({})", reason)).dim()
                );
            }
            TaskEvent::StageStarted {
                recipe,
                stage,
                members,
            } => {
                if self.verbose {
                    println!(
                        "  {} {} stage {} ({})",
                        style("─").dim(),
                        recipe,
                        stage + 1,
                        members.join(", ")
                    );
                }
            }
            TaskEvent::Files {
                name,
                action,
                count,
            } => {
                if self.verbose {
                    println!(
                        "    {} {} {} file{}",
                        style(format!("[{}]", name)).dim(),
                        action.as_str(),
                        count,
                        output::plural(*count)
                    );
                }
            }
        }
    }
}
