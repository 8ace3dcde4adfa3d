//! The testing engine: the iteration loop around controlled executions.

// Layer 1: Standard library imports
use std::future::Future;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

// Layer 3: Internal module imports
use super::config::{Configuration, StrategyKind};
use super::controlled::{Callbacks, Runtime};
use super::errors::RuntimeError;
use crate::coverage::{CoverageAccumulator, CoverageInfo};
use crate::event::Event;
use crate::monitor::{LivenessChecker, Monitor};
use crate::schedule::Schedule;
use crate::scheduler::{OperationKind, SharedStrategy, StopReason};
use crate::strategy::{
    DfsStrategy, FairStrategy, PctStrategy, ProbabilisticStrategy, RandomStrategy, ReplayStrategy,
    SchedulingStrategy,
};
use crate::util::ActorId;

type MonitorInstaller = Box<dyn Fn(&Runtime) -> Result<(), RuntimeError> + Send + Sync>;
type EntryPoint = Arc<dyn Fn(Runtime) -> BoxFuture<'static, ()> + Send + Sync>;

/// One bug found during exploration, with everything needed to replay it.
#[derive(Debug, Clone)]
pub struct BugReport {
    /// Zero-based iteration that produced the bug.
    pub iteration: u64,
    pub error: RuntimeError,
    /// The recorded schedule in trace-file format.
    pub schedule_text: String,
    pub steps: u64,
}

/// Outcome of a whole testing run.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub iterations_run: u64,
    pub bugs: Vec<BugReport>,
    pub coverage: CoverageInfo,
    pub total_steps: u64,
    pub strategy_exhausted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TestReport {
    pub fn found_bug(&self) -> bool {
        !self.bugs.is_empty()
    }

    pub fn first_bug(&self) -> Option<&BugReport> {
        self.bugs.first()
    }
}

struct IterationOutcome {
    error: Option<RuntimeError>,
    schedule: Schedule,
    steps: u64,
    coverage: CoverageInfo,
}

/// Drives `testing_iterations` controlled executions of a program under a
/// single exploration strategy, collecting bug reports and coverage.
pub struct TestingEngine {
    config: Configuration,
    strategy: SharedStrategy,
    monitor_installers: Vec<MonitorInstaller>,
    callbacks: Callbacks,
    accumulator: CoverageAccumulator,
}

impl TestingEngine {
    pub fn new(config: Configuration) -> Result<Self, RuntimeError> {
        config.validate().map_err(RuntimeError::Configuration)?;
        let strategy = build_strategy(&config)?;
        Ok(Self {
            config,
            strategy: Arc::new(Mutex::new(strategy)),
            monitor_installers: Vec::new(),
            callbacks: Callbacks::default(),
            accumulator: CoverageAccumulator::new(),
        })
    }

    /// Register a monitor type; a fresh instance is created per iteration,
    /// before any actor creation.
    pub fn register_monitor<M: Monitor + Default>(&mut self) -> &mut Self {
        self.register_monitor_with(M::default)
    }

    /// Register a monitor with an explicit per-iteration factory.
    pub fn register_monitor_with<M: Monitor>(
        &mut self,
        factory: impl Fn() -> M + Send + Sync + 'static,
    ) -> &mut Self {
        self.monitor_installers
            .push(Box::new(move |runtime| runtime.register_monitor(factory())));
        self
    }

    /// Install a callback invoked on every failure the runtime detects.
    pub fn on_failure(&mut self, callback: impl Fn(&RuntimeError) + Send + Sync + 'static) -> &mut Self {
        self.callbacks.on_failure = Some(Arc::new(callback));
        self
    }

    /// Install a callback invoked when an event is dropped at a halted actor.
    pub fn on_event_dropped(
        &mut self,
        callback: impl Fn(&ActorId, &dyn Event) + Send + Sync + 'static,
    ) -> &mut Self {
        self.callbacks.on_event_dropped = Some(Arc::new(callback));
        self
    }

    /// Coverage merged across every iteration run so far.
    pub fn coverage(&self) -> CoverageInfo {
        self.accumulator.snapshot()
    }

    /// Explore schedules of the program under test. Stops at the first
    /// bug, at strategy exhaustion, or after `testing_iterations`.
    pub fn run<F, Fut>(&mut self, entry: F) -> Result<TestReport, RuntimeError>
    where
        F: Fn(Runtime) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let started_at = Utc::now();
        let entry: EntryPoint = Arc::new(move |runtime| Box::pin(entry(runtime)));

        let mut bugs = Vec::new();
        let mut iterations_run = 0;
        let mut total_steps = 0;
        let mut strategy_exhausted = false;

        for iteration in 0..self.config.testing_iterations {
            if !self.strategy.lock().prepare_next_iteration() {
                info!(iteration, "strategy exhausted the search space");
                strategy_exhausted = true;
                break;
            }

            let runtime = Runtime::new(
                Arc::clone(&self.strategy),
                self.config.random_seed,
                self.config.step_cap(),
                LivenessChecker::new(
                    self.config.liveness_temperature_threshold,
                    self.config.enable_cycle_detection,
                ),
                self.config.report_activity_coverage,
                self.config.enable_user_defined_state_hashing,
                self.callbacks.clone(),
            );
            for install in &self.monitor_installers {
                install(&runtime)?;
            }

            let outcome = run_iteration(runtime, Arc::clone(&entry))?;
            iterations_run += 1;
            total_steps += outcome.steps;
            debug!(iteration, steps = outcome.steps, "iteration finished");
            if self.config.report_activity_coverage {
                self.accumulator.merge(&outcome.coverage);
            }

            if let Some(error) = outcome.error {
                info!(iteration, %error, "bug found");
                if self.config.scheduling_strategy != StrategyKind::Replay {
                    if let Some(path) = &self.config.schedule_file {
                        if let Err(write_error) = outcome.schedule.write_to(path) {
                            warn!(%write_error, "failed to write schedule trace");
                        }
                    }
                }
                bugs.push(BugReport {
                    iteration,
                    error,
                    schedule_text: outcome.schedule.to_text(),
                    steps: outcome.steps,
                });
                break;
            }
        }

        Ok(TestReport {
            iterations_run,
            bugs,
            coverage: self.accumulator.snapshot(),
            total_steps,
            strategy_exhausted,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// One controlled execution on a fresh single-threaded tokio runtime.
/// Dropping that runtime tears down every operation body still parked on
/// its suspension signal.
fn run_iteration(runtime: Runtime, entry: EntryPoint) -> Result<IterationOutcome, RuntimeError> {
    let executor = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| RuntimeError::Configuration(format!("executor: {e}")))?;

    executor.block_on(async {
        let (_root, signal) = runtime
            .scheduler()
            .create_operation(OperationKind::Task, None);
        let body = entry(runtime.clone());
        let completer = runtime.clone();
        tokio::spawn(async move {
            signal.acquired().await;
            body.await;
            completer.complete_current();
        });

        runtime.scheduler().start();
        runtime.scheduler().wait_until_done().await;

        // A program that quiesced while a monitor is hot is a liveness bug.
        if runtime.scheduler().stop_reason() == Some(StopReason::Quiescence) {
            let hot = runtime.monitors().hot_monitors();
            if let Some(error) = runtime.liveness().at_end(&hot) {
                runtime.fail_and_report(error);
            }
        }
    });

    let outcome = IterationOutcome {
        error: runtime.scheduler().error(),
        schedule: runtime.scheduler().schedule(),
        steps: runtime.scheduler().steps(),
        coverage: runtime.coverage().snapshot(),
    };
    drop(executor);
    Ok(outcome)
}

fn build_strategy(config: &Configuration) -> Result<Box<dyn SchedulingStrategy>, RuntimeError> {
    let seed = config.random_seed;
    Ok(match config.scheduling_strategy {
        StrategyKind::Random => Box::new(FairStrategy::new(
            Box::new(RandomStrategy::new(seed)),
            config.fairness_threshold(),
        )),
        StrategyKind::Dfs => Box::new(DfsStrategy::new()),
        StrategyKind::Prioritization => Box::new(PctStrategy::new(seed, config.strategy_bound)),
        StrategyKind::Probabilistic => Box::new(FairStrategy::new(
            Box::new(ProbabilisticStrategy::new(seed, config.strategy_bound)),
            config.fairness_threshold(),
        )),
        StrategyKind::Replay => {
            let path = config
                .schedule_file
                .as_ref()
                .ok_or_else(|| RuntimeError::Configuration("replay requires a schedule_file".to_string()))?;
            let schedule = Schedule::read_from(path)
                .map_err(|e| RuntimeError::Configuration(format!("schedule: {e}")))?;
            Box::new(ReplayStrategy::new(schedule))
        }
    })
}
