//! Task types and the invocation contract shared by every unit

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::debug;

use crate::plan::PlanNode;
use crate::reporter::{TaskEvent, TaskReporter, TracingReporter};

/// Something the scheduler can invoke: a catalog task or a composite.
///
/// Units take no arguments. Everything a task needs is captured when it is
/// constructed; the [`RunContext`] only carries reporting plumbing.
#[async_trait]
pub trait Task: Send + Sync {
    /// Name used in events and plans
    fn name(&self) -> &str;

    /// What kind of unit this is
    fn kind(&self) -> UnitKind {
        UnitKind::Task
    }

    /// Do the work
    async fn run(&self, ctx: &RunContext) -> Result<TaskOutcome, TaskError>;

    /// Describe the unit's structure without running it
    fn plan(&self) -> PlanNode {
        PlanNode::task(self.name())
    }
}

/// Shared handle to a unit
pub type UnitRef = Arc<dyn Task>;

/// Kind of unit, carried on events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// A single catalog task
    Task,
    /// Strict sequence
    Series,
    /// Concurrent group
    Parallel,
    /// Named staged composite
    Recipe,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Series => "series",
            Self::Parallel => "parallel",
            Self::Recipe => "recipe",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a successful unit finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Work was done
    Success,
    /// Nothing to do (e.g. no plugin configured)
    Skipped(String),
}

impl TaskOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Result of invoking a unit by name
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Unit that was invoked
    pub name: String,
    /// How it finished
    pub outcome: TaskOutcome,
    /// How long it took
    pub duration: Duration,
}

/// Errors raised while running a unit
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    /// Plugin command exited unsuccessfully
    #[error("Task '{}' failed: plugin exited with code {}{}", .task, .code, format_stderr(.stderr))]
    PluginFailed {
        task: String,
        code: i32,
        stderr: String,
    },

    /// Plugin command could not be started
    #[error("Task '{task}' could not start its plugin: {reason}")]
    Spawn { task: String, reason: String },

    /// Filesystem error inside a built-in step
    #[error("Task '{task}' failed on {path}: {reason}")]
    Io {
        task: String,
        path: String,
        reason: String,
    },

    /// Glob pattern could not be parsed
    #[error("Task '{task}' has an invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        task: String,
        pattern: String,
        reason: String,
    },

    /// Archiving the build failed
    #[error("Task '{task}' could not package the build: {reason}")]
    Package { task: String, reason: String },

    /// The unit panicked
    #[error("Task '{task}' panicked: {reason}")]
    Panicked { task: String, reason: String },
}

fn format_stderr(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!(": {}", stderr.trim())
    }
}

impl TaskError {
    /// Name of the task that failed
    pub fn task(&self) -> &str {
        match self {
            Self::PluginFailed { task, .. }
            | Self::Spawn { task, .. }
            | Self::Io { task, .. }
            | Self::InvalidPattern { task, .. }
            | Self::Package { task, .. }
            | Self::Panicked { task, .. } => task,
        }
    }

    pub(crate) fn io(task: &str, path: impl fmt::Display, err: std::io::Error) -> Self {
        Self::Io {
            task: task.to_string(),
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Members of a failed parallel group that were still running
pub(crate) type Stragglers = JoinSet<Result<TaskOutcome, TaskError>>;

/// Per-invocation plumbing handed down through composites.
///
/// Clones share one set of stragglers, so a failure anywhere below a
/// top-level invocation leaves its unfinished siblings where
/// [`RunContext::settle`] can wait for them.
#[derive(Clone)]
pub struct RunContext {
    reporter: Arc<dyn TaskReporter>,
    stragglers: Arc<Mutex<Vec<Stragglers>>>,
}

impl RunContext {
    /// Create a context reporting to `reporter`
    pub fn new(reporter: Arc<dyn TaskReporter>) -> Self {
        Self {
            reporter,
            stragglers: Arc::default(),
        }
    }

    /// Keep `members` running until [`RunContext::settle`] is awaited
    pub(crate) fn detach(&self, members: Stragglers) {
        if members.is_empty() {
            return;
        }
        self.stragglers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(members);
    }

    /// Wait for every detached member to finish. Returns how many did.
    ///
    /// Their failures were already reported as events; only the first
    /// failure of a group is returned to the caller.
    pub async fn settle(&self) -> usize {
        let mut settled = 0;
        loop {
            let pending = std::mem::take(
                &mut *self
                    .stragglers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            if pending.is_empty() {
                return settled;
            }
            for mut members in pending {
                while let Some(joined) = members.join_next().await {
                    settled += 1;
                    if let Ok(Err(err)) = joined {
                        debug!(failed = err.task(), "sibling failed after its group");
                    }
                }
            }
        }
    }

    /// Emit an event
    pub fn report(&self, event: TaskEvent) {
        self.reporter.report(&event);
    }

    /// The reporter events go to
    pub fn reporter(&self) -> &Arc<dyn TaskReporter> {
        &self.reporter
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(Arc::new(TracingReporter))
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext").finish_non_exhaustive()
    }
}

/// Run `unit`, bracketing it with started/completed/failed events.
pub async fn invoke(unit: &dyn Task, ctx: &RunContext) -> Result<TaskOutcome, TaskError> {
    let name = unit.name().to_string();
    let kind = unit.kind();
    let start = Instant::now();

    ctx.report(TaskEvent::Started {
        name: name.clone(),
        kind,
    });

    match unit.run(ctx).await {
        Ok(outcome) => {
            let duration = start.elapsed();
            match &outcome {
                TaskOutcome::Skipped(reason) => ctx.report(TaskEvent::Skipped {
                    name,
                    reason: reason.clone(),
                }),
                TaskOutcome::Success => ctx.report(TaskEvent::Completed {
                    name,
                    kind,
                    duration,
                }),
            }
            Ok(outcome)
        }
        Err(err) => {
            ctx.report(TaskEvent::Failed {
                name,
                kind,
                duration: start.elapsed(),
                error: err.to_string(),
            });
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;

    struct Fixed(&'static str, Result<TaskOutcome, TaskError>);

    #[async_trait]
    impl Task for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self, _ctx: &RunContext) -> Result<TaskOutcome, TaskError> {
            self.1.clone()
        }
    }

    #[test]
    fn test_plugin_failed_display() {
        let err = TaskError::PluginFailed {
            task: "styles".to_string(),
            code: 2,
            stderr: "syntax error\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Task 'styles' failed: plugin exited with code 2: syntax error"
        );
        assert_eq!(err.task(), "styles");

        let quiet = TaskError::PluginFailed {
            task: "fonts".to_string(),
            code: 1,
            stderr: String::new(),
        };
        assert_eq!(quiet.to_string(), "Task 'fonts' failed: plugin exited with code 1");
    }

    #[test]
    fn test_default_plan_is_leaf() {
        let unit = Fixed("wiredep", Ok(TaskOutcome::Success));
        assert_eq!(unit.plan(), PlanNode::task("wiredep"));
        assert_eq!(unit.kind(), UnitKind::Task);
    }

    #[tokio::test]
    async fn test_invoke_reports_completion() {
        let reporter = Arc::new(CollectingReporter::default());
        let ctx = RunContext::new(reporter.clone());

        let outcome = invoke(&Fixed("fonts", Ok(TaskOutcome::Success)), &ctx)
            .await
            .unwrap();
        assert_eq!(outcome, TaskOutcome::Success);

        let events = reporter.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], TaskEvent::Started { name, .. } if name == "fonts"));
        assert!(matches!(&events[1], TaskEvent::Completed { name, .. } if name == "fonts"));
    }

    #[tokio::test]
    async fn test_invoke_reports_skip_and_failure() {
        let reporter = Arc::new(CollectingReporter::default());
        let ctx = RunContext::new(reporter.clone());

        invoke(
            &Fixed("assets", Ok(TaskOutcome::Skipped("no plugin".to_string()))),
            &ctx,
        )
        .await
        .unwrap();

        let failing = Fixed(
            "images",
            Err(TaskError::Spawn {
                task: "images".to_string(),
                reason: "not found".to_string(),
            }),
        );
        let err = invoke(&failing, &ctx).await.unwrap_err();
        assert_eq!(err.task(), "images");

        let events = reporter.events();
        assert!(matches!(&events[1], TaskEvent::Skipped { reason, .. } if reason == "no plugin"));
        assert!(matches!(&events[3], TaskEvent::Failed { name, .. } if name == "images"));
    }
}
