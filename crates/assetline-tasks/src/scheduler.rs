//! Series/parallel composition of units
//!
//! - A series runs its units strictly in order and stops at the first failure;
//!   later units never start.
//! - A parallel group dispatches every member at once and succeeds only when
//!   all of them succeed. It fails as soon as one member fails, but members
//!   that are already running are left to finish: nothing is cancelled. The
//!   unfinished members are handed to the [`RunContext`], and
//!   [`RunContext::settle`] waits for them.
//! - A recipe is a named list of stages, each either a single unit or a
//!   concurrent set, run like a series of those stages.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, instrument};

use crate::plan::PlanNode;
use crate::registry::{RegistryError, UnitLookup};
use crate::reporter::TaskEvent;
use crate::task::{invoke, RunContext, Task, TaskError, TaskOutcome, UnitKind, UnitRef};

/// Run `units` one after another, stopping at the first failure
pub async fn run_series(units: &[UnitRef], ctx: &RunContext) -> Result<(), TaskError> {
    for unit in units {
        invoke(unit.as_ref(), ctx).await?;
    }
    Ok(())
}

/// Run `units` concurrently and wait for all of them.
///
/// Returns the first failure as soon as it is observed. Each member runs on
/// its own spawned task, watched by a second task in a [`JoinSet`]. On
/// failure the set of watchers still pending is detached onto `ctx`.
pub async fn run_parallel(
    group: &str,
    units: &[UnitRef],
    ctx: &RunContext,
) -> Result<(), TaskError> {
    let mut watchers = JoinSet::new();

    for unit in units {
        let unit = Arc::clone(unit);
        let member_ctx = ctx.clone();
        let name = unit.name().to_string();

        let member = tokio::spawn(async move { invoke(unit.as_ref(), &member_ctx).await });
        watchers.spawn(async move {
            match member.await {
                Ok(result) => result,
                Err(err) => Err(TaskError::Panicked {
                    task: name,
                    reason: panic_reason(err),
                }),
            }
        });
    }

    while let Some(joined) = watchers.join_next().await {
        let result = joined.unwrap_or_else(|err| {
            Err(TaskError::Panicked {
                task: group.to_string(),
                reason: panic_reason(err),
            })
        });

        if let Err(err) = result {
            debug!(
                group,
                failed = err.task(),
                still_running = watchers.len(),
                "parallel member failed"
            );
            ctx.detach(watchers);
            return Err(err);
        }
    }

    Ok(())
}

fn panic_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Units run strictly in order
pub struct Series {
    name: String,
    units: Vec<UnitRef>,
}

impl Series {
    pub fn new(name: impl Into<String>, units: Vec<UnitRef>) -> Self {
        Self {
            name: name.into(),
            units,
        }
    }
}

#[async_trait]
impl Task for Series {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Series
    }

    async fn run(&self, ctx: &RunContext) -> Result<TaskOutcome, TaskError> {
        run_series(&self.units, ctx).await?;
        Ok(TaskOutcome::Success)
    }

    fn plan(&self) -> PlanNode {
        PlanNode::Series {
            name: Some(self.name.clone()),
            steps: self.units.iter().map(|u| u.plan()).collect(),
        }
    }
}

/// Units run concurrently behind a join barrier
pub struct Parallel {
    name: String,
    units: Vec<UnitRef>,
}

impl Parallel {
    pub fn new(name: impl Into<String>, units: Vec<UnitRef>) -> Self {
        Self {
            name: name.into(),
            units,
        }
    }
}

#[async_trait]
impl Task for Parallel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Parallel
    }

    async fn run(&self, ctx: &RunContext) -> Result<TaskOutcome, TaskError> {
        run_parallel(&self.name, &self.units, ctx).await?;
        Ok(TaskOutcome::Success)
    }

    fn plan(&self) -> PlanNode {
        PlanNode::Parallel {
            name: Some(self.name.clone()),
            members: self.units.iter().map(|u| u.plan()).collect(),
        }
    }
}

/// Compose `units` into a series
pub fn series(name: impl Into<String>, units: Vec<UnitRef>) -> UnitRef {
    Arc::new(Series::new(name, units))
}

/// Compose `units` into a parallel group
pub fn parallel(name: impl Into<String>, units: Vec<UnitRef>) -> UnitRef {
    Arc::new(Parallel::new(name, units))
}

/// One step of a recipe
#[derive(Clone)]
pub enum Stage {
    /// Runs alone
    Single(UnitRef),
    /// Members run concurrently; the stage ends when all succeed
    Concurrent(Vec<UnitRef>),
}

impl Stage {
    /// Names of the units in this stage
    pub fn member_names(&self) -> Vec<String> {
        match self {
            Self::Single(unit) => vec![unit.name().to_string()],
            Self::Concurrent(units) => units.iter().map(|u| u.name().to_string()).collect(),
        }
    }

    fn plan(&self) -> PlanNode {
        match self {
            Self::Single(unit) => unit.plan(),
            Self::Concurrent(units) => PlanNode::Parallel {
                name: None,
                members: units.iter().map(|u| u.plan()).collect(),
            },
        }
    }
}

/// Named, staged composite
pub struct Recipe {
    name: String,
    stages: Vec<Stage>,
}

impl Recipe {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

#[async_trait]
impl Task for Recipe {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Recipe
    }

    async fn run(&self, ctx: &RunContext) -> Result<TaskOutcome, TaskError> {
        for (index, stage) in self.stages.iter().enumerate() {
            ctx.report(TaskEvent::StageStarted {
                recipe: self.name.clone(),
                stage: index,
                members: stage.member_names(),
            });

            match stage {
                Stage::Single(unit) => {
                    invoke(unit.as_ref(), ctx).await?;
                }
                Stage::Concurrent(units) => {
                    let group = format!("{}[{}]", self.name, index);
                    run_parallel(&group, units, ctx).await?;
                }
            }
        }
        Ok(TaskOutcome::Success)
    }

    fn plan(&self) -> PlanNode {
        PlanNode::Series {
            name: Some(self.name.clone()),
            steps: self.stages.iter().map(Stage::plan).collect(),
        }
    }
}

/// Builds a [`Recipe`], resolving member names when each stage is added.
///
/// Only names the lookup already knows can be referenced; the first
/// unresolvable name is reported by [`RecipeBuilder::build`].
pub struct RecipeBuilder<'a> {
    name: String,
    lookup: &'a dyn UnitLookup,
    stages: Vec<Stage>,
    error: Option<RegistryError>,
}

impl<'a> RecipeBuilder<'a> {
    pub fn new(name: impl Into<String>, lookup: &'a dyn UnitLookup) -> Self {
        Self {
            name: name.into(),
            lookup,
            stages: Vec::new(),
            error: None,
        }
    }

    fn resolve(&mut self, name: &str) -> Option<UnitRef> {
        let unit = self.lookup.lookup(name);
        if unit.is_none() && self.error.is_none() {
            self.error = Some(RegistryError::UnknownTask(name.to_string()));
        }
        unit
    }

    /// Add a stage running the unit named `name` alone
    pub fn then(mut self, name: &str) -> Self {
        if let Some(unit) = self.resolve(name) {
            self.stages.push(Stage::Single(unit));
        }
        self
    }

    /// Add a stage running `unit` alone
    pub fn then_unit(mut self, unit: UnitRef) -> Self {
        self.stages.push(Stage::Single(unit));
        self
    }

    /// Add a stage running the units named in `names` concurrently
    pub fn concurrently(mut self, names: &[&str]) -> Self {
        let units: Vec<UnitRef> = names.iter().filter_map(|n| self.resolve(n)).collect();
        if units.len() == names.len() {
            self.stages.push(Stage::Concurrent(units));
        }
        self
    }

    /// Add a stage running `units` concurrently
    pub fn concurrently_units(mut self, units: Vec<UnitRef>) -> Self {
        self.stages.push(Stage::Concurrent(units));
        self
    }

    /// Finish the recipe
    #[instrument(skip_all, fields(recipe = %self.name, stages = self.stages.len()))]
    pub fn build(self) -> Result<Recipe, RegistryError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        if self.stages.is_empty() {
            return Err(RegistryError::EmptyRecipe(self.name));
        }

        if let Some(stage) = self
            .stages
            .iter()
            .position(|s| matches!(s, Stage::Concurrent(units) if units.is_empty()))
        {
            return Err(RegistryError::EmptyStage {
                recipe: self.name,
                stage,
            });
        }

        debug!("recipe composed");
        Ok(Recipe {
            name: self.name,
            stages: self.stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::registry::{TaskRegistry, TaskRunner};
    use crate::reporter::CollectingReporter;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Test unit that logs its start and end and sleeps in between
    struct Timed {
        name: &'static str,
        delay: Duration,
        fail: bool,
        log: Log,
    }

    fn timed(name: &'static str, delay_ms: u64, log: &Log) -> UnitRef {
        Arc::new(Timed {
            name,
            delay: Duration::from_millis(delay_ms),
            fail: false,
            log: log.clone(),
        })
    }

    fn failing(name: &'static str, delay_ms: u64, log: &Log) -> UnitRef {
        Arc::new(Timed {
            name,
            delay: Duration::from_millis(delay_ms),
            fail: true,
            log: log.clone(),
        })
    }

    #[async_trait]
    impl Task for Timed {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, _ctx: &RunContext) -> Result<TaskOutcome, TaskError> {
            self.log.lock().unwrap().push(format!("start:{}", self.name));
            tokio::time::sleep(self.delay).await;
            self.log.lock().unwrap().push(format!("end:{}", self.name));
            if self.fail {
                return Err(TaskError::PluginFailed {
                    task: self.name.to_string(),
                    code: 1,
                    stderr: String::new(),
                });
            }
            Ok(TaskOutcome::Success)
        }
    }

    struct Panics;

    #[async_trait]
    impl Task for Panics {
        fn name(&self) -> &str {
            "panics"
        }

        async fn run(&self, _ctx: &RunContext) -> Result<TaskOutcome, TaskError> {
            panic!("boom");
        }
    }

    /// Flags completion after a delay, so the test can see whether it ran on
    struct SlowSideEffect {
        done: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Task for SlowSideEffect {
        fn name(&self) -> &str {
            "slow"
        }

        async fn run(&self, _ctx: &RunContext) -> Result<TaskOutcome, TaskError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.done.store(true, Ordering::SeqCst);
            Ok(TaskOutcome::Success)
        }
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    fn index_of(log: &[String], entry: &str) -> usize {
        log.iter().position(|e| e == entry).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_series_runs_in_order() {
        let log = Log::default();
        let unit = series(
            "s",
            vec![timed("a", 10, &log), timed("b", 5, &log), timed("c", 1, &log)],
        );

        unit.run(&RunContext::default()).await.unwrap();

        assert_eq!(
            entries(&log),
            vec!["start:a", "end:a", "start:b", "end:b", "start:c", "end:c"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_series_stops_at_first_failure() {
        let log = Log::default();
        let unit = series(
            "s",
            vec![timed("a", 1, &log), failing("b", 1, &log), timed("c", 1, &log)],
        );

        let err = unit.run(&RunContext::default()).await.unwrap_err();

        assert_eq!(err.task(), "b");
        assert!(!entries(&log).contains(&"start:c".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_waits_for_every_member() {
        let log = Log::default();
        let unit = parallel("p", vec![timed("a", 20, &log), timed("b", 5, &log)]);

        unit.run(&RunContext::default()).await.unwrap();

        let log = entries(&log);
        assert_eq!(log.len(), 4);
        // both dispatched before either finished
        assert!(index_of(&log, "start:a") < index_of(&log, "end:b"));
        assert!(index_of(&log, "start:b") < index_of(&log, "end:b"));
        assert!(log.contains(&"end:a".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_failure_leaves_siblings_running() {
        let log = Log::default();
        let done = Arc::new(AtomicBool::new(false));
        let slow: UnitRef = Arc::new(SlowSideEffect { done: done.clone() });
        let unit = parallel("p", vec![failing("a", 5, &log), slow]);

        let err = unit.run(&RunContext::default()).await.unwrap_err();
        assert_eq!(err.task(), "a");
        // failure is reported before the sibling finished
        assert!(!done.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_waits_for_detached_siblings() {
        let log = Log::default();
        let done = Arc::new(AtomicBool::new(false));
        let slow: UnitRef = Arc::new(SlowSideEffect { done: done.clone() });
        let unit = parallel("p", vec![failing("a", 5, &log), slow]);

        let ctx = RunContext::default();
        unit.run(&ctx).await.unwrap_err();
        assert!(!done.load(Ordering::SeqCst));

        assert_eq!(ctx.settle().await, 1);
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(ctx.settle().await, 0);
    }

    #[tokio::test]
    async fn test_parallel_member_panic_is_a_failure() {
        let log = Log::default();
        let unit = parallel("p", vec![timed("a", 1, &log), Arc::new(Panics)]);

        let err = unit.run(&RunContext::default()).await.unwrap_err();
        match err {
            TaskError::Panicked { task, reason } => {
                assert_eq!(task, "panics");
                assert_eq!(reason, "boom");
            }
            other => panic!("expected panic error, got {other:?}"),
        }
    }

    fn registry_with(units: Vec<UnitRef>) -> TaskRegistry {
        let mut registry = TaskRegistry::new();
        for unit in units {
            let name = unit.name().to_string();
            registry.define_task(&name, unit).unwrap();
        }
        registry
    }

    #[tokio::test(start_paused = true)]
    async fn test_recipe_stage_barrier() {
        let log = Log::default();
        let registry = registry_with(vec![
            timed("a", 30, &log),
            timed("b", 5, &log),
            timed("c", 1, &log),
        ]);

        let recipe = RecipeBuilder::new("r", &registry)
            .concurrently(&["a", "b"])
            .then("c")
            .build()
            .unwrap();

        let reporter = Arc::new(CollectingReporter::default());
        recipe
            .run(&RunContext::new(reporter.clone()))
            .await
            .unwrap();

        let log = entries(&log);
        assert!(index_of(&log, "end:a") < index_of(&log, "start:c"));
        assert!(index_of(&log, "end:b") < index_of(&log, "start:c"));

        let stages: Vec<Vec<String>> = reporter
            .events()
            .into_iter()
            .filter_map(|e| match e {
                TaskEvent::StageStarted { members, .. } => Some(members),
                _ => None,
            })
            .collect();
        assert_eq!(stages, vec![vec!["a", "b"], vec!["c"]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recipe_failure_skips_later_stages() {
        let log = Log::default();
        let registry = registry_with(vec![
            failing("a", 5, &log),
            timed("b", 10, &log),
            timed("c", 1, &log),
        ]);

        let recipe = RecipeBuilder::new("r", &registry)
            .concurrently(&["a", "b"])
            .then("c")
            .build()
            .unwrap();

        let err = recipe.run(&RunContext::default()).await.unwrap_err();
        assert_eq!(err.task(), "a");
        assert!(!entries(&log).contains(&"start:c".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recipe_can_run_again() {
        let log = Log::default();
        let registry = registry_with(vec![timed("a", 1, &log)]);
        let recipe = RecipeBuilder::new("r", &registry).then("a").build().unwrap();

        let ctx = RunContext::default();
        recipe.run(&ctx).await.unwrap();
        recipe.run(&ctx).await.unwrap();

        assert_eq!(entries(&log), vec!["start:a", "end:a", "start:a", "end:a"]);
    }

    #[test]
    fn test_builder_rejects_unknown_names() {
        let log = Log::default();
        let registry = registry_with(vec![timed("a", 1, &log)]);

        let err = RecipeBuilder::new("r", &registry)
            .concurrently(&["a", "missing"])
            .then("later")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::UnknownTask(ref n) if n == "missing"));
    }

    #[test]
    fn test_builder_rejects_empty_recipes_and_stages() {
        let registry = TaskRegistry::new();

        let err = RecipeBuilder::new("r", &registry).build().err().unwrap();
        assert!(matches!(err, RegistryError::EmptyRecipe(_)));

        let err = RecipeBuilder::new("r", &registry)
            .concurrently(&[])
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::EmptyStage { stage: 0, .. }));
    }

    #[test]
    fn test_recipe_plan() {
        let log = Log::default();
        let registry = registry_with(vec![
            timed("a", 1, &log),
            timed("b", 1, &log),
            timed("c", 1, &log),
        ]);
        let recipe = RecipeBuilder::new("r", &registry)
            .concurrently(&["a", "b"])
            .then("c")
            .build()
            .unwrap();

        let plan = recipe.plan();
        assert_eq!(plan.name(), Some("r"));
        assert_eq!(plan.tasks(), vec!["a", "b", "c"]);
        assert_eq!(plan.stages()[0].member_names(), vec!["a", "b"]);
        assert_eq!(recipe.stages().len(), 2);
    }

    #[test]
    fn test_nested_plan() {
        let log = Log::default();
        let inner = series("inner", vec![timed("x", 1, &log), timed("y", 1, &log)]);
        let outer = parallel("outer", vec![inner, timed("z", 1, &log)]);

        let plan = outer.plan();
        assert_eq!(plan.member_names(), vec!["inner", "z"]);
        assert_eq!(plan.tasks(), vec!["x", "y", "z"]);
    }
}
