//! Task execution reporting

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::task::UnitKind;

/// Events emitted during task execution
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// A unit is starting
    Started { name: String, kind: UnitKind },
    /// A plugin produced output
    Output {
        name: String,
        line: String,
        is_stderr: bool,
    },
    /// A unit completed successfully
    Completed {
        name: String,
        kind: UnitKind,
        duration: Duration,
    },
    /// A unit had nothing to do
    Skipped { name: String, reason: String },
    /// A unit failed
    Failed {
        name: String,
        kind: UnitKind,
        duration: Duration,
        error: String,
    },
    /// A recipe stage is being dispatched
    StageStarted {
        recipe: String,
        stage: usize,
        members: Vec<String>,
    },
    /// A file-level action taken by a built-in step
    Files {
        name: String,
        action: FileAction,
        count: usize,
    },
}

/// File-level actions reported by built-in steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Cleaned,
    Copied,
    Removed,
    Archived,
}

impl FileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cleaned => "cleaned",
            Self::Copied => "copied",
            Self::Removed => "removed",
            Self::Archived => "archived",
        }
    }
}

/// Trait for reporting task execution progress
pub trait TaskReporter: Send + Sync {
    /// Handle a task event
    fn report(&self, event: &TaskEvent);
}

/// Simple reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl TaskReporter for TracingReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { name, kind } => {
                tracing::info!(%kind, "Starting {}", name);
            }
            TaskEvent::Output {
                name,
                line,
                is_stderr,
            } => {
                if *is_stderr {
                    tracing::warn!("[{}] {}", name, line);
                } else {
                    tracing::debug!("[{}] {}", name, line);
                }
            }
            TaskEvent::Completed {
                name,
                kind,
                duration,
            } => {
                tracing::info!(%kind, "{} completed in {:.1}s", name, duration.as_secs_f64());
            }
            TaskEvent::Skipped { name, reason } => {
                tracing::info!("{} skipped: {}", name, reason);
            }
            TaskEvent::Failed {
                name,
                kind,
                duration,
                error,
            } => {
                tracing::error!(
                    %kind,
                    "{} failed after {:.1}s: {}",
                    name,
                    duration.as_secs_f64(),
                    error
                );
            }
            TaskEvent::StageStarted {
                recipe,
                stage,
                members,
            } => {
                tracing::info!(
                    "{}: stage {} ({})",
                    recipe,
                    stage + 1,
                    members.join(", ")
                );
            }
            TaskEvent::Files {
                name,
                action,
                count,
            } => {
                tracing::debug!("{}: {} {} file(s)", name, action.as_str(), count);
            }
        }
    }
}

/// Reporter that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<TaskEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Names of leaf tasks in the order they started
    pub fn started_tasks(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TaskEvent::Started {
                    name,
                    kind: UnitKind::Task,
                } => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Position of the first event matching `pred`
    pub fn position(&self, pred: impl Fn(&TaskEvent) -> bool) -> Option<usize> {
        self.events().iter().position(pred)
    }
}

impl TaskReporter for CollectingReporter {
    fn report(&self, event: &TaskEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Fan-out over several reporters
pub struct TaskReporterRegistry {
    reporters: Vec<Arc<dyn TaskReporter>>,
}

impl TaskReporterRegistry {
    pub fn new() -> Self {
        Self {
            reporters: vec![Arc::new(TracingReporter)],
        }
    }

    pub fn empty() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    pub fn register<R: TaskReporter + 'static>(&mut self, reporter: R) {
        self.reporters.push(Arc::new(reporter));
    }

    pub fn register_shared(&mut self, reporter: Arc<dyn TaskReporter>) {
        self.reporters.push(reporter);
    }

    pub fn all(&self) -> &[Arc<dyn TaskReporter>] {
        &self.reporters
    }

    /// Broadcast an event to all registered reporters
    pub fn broadcast(&self, event: &TaskEvent) {
        for reporter in &self.reporters {
            reporter.report(event);
        }
    }
}

impl TaskReporter for TaskReporterRegistry {
    fn report(&self, event: &TaskEvent) {
        self.broadcast(event);
    }
}

impl Default for TaskReporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
