//! Monitor registry: instances, synchronous dispatch, hot-state queries.

// Layer 1: Standard library imports
use std::any::TypeId;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tracing::trace;

// Layer 3: Internal module imports
use super::liveness::HotMonitor;
use super::traits::{Monitor, MonitorContext, MonitorControl};
use crate::actor::table::{Handle, MachineTable, Resolution, Temperature};
use crate::coverage::CoverageCollector;
use crate::event::Event;
use crate::runtime::errors::RuntimeError;
use crate::util::short_type_name;

/// Type-erased monitor instance.
trait MonitorDyn: Send {
    fn execute(
        &mut self,
        action: &'static str,
        event: Option<&dyn Event>,
        ctx: &mut MonitorContext,
    ) -> Result<(), crate::actor::HandlerError>;

    fn hashed_state(&self) -> u64;
}

struct MonitorAdapter<M: Monitor>(M);

impl<M: Monitor> MonitorDyn for MonitorAdapter<M> {
    fn execute(
        &mut self,
        action: &'static str,
        event: Option<&dyn Event>,
        ctx: &mut MonitorContext,
    ) -> Result<(), crate::actor::HandlerError> {
        self.0.execute(action, event, ctx)
    }

    fn hashed_state(&self) -> u64 {
        self.0.hashed_state()
    }
}

struct MonitorHost {
    type_id: TypeId,
    name: String,
    instance: Box<dyn MonitorDyn>,
    table: MachineTable,
    current: &'static str,
}

impl MonitorHost {
    /// Deliver one event and run the monitor to quiescence.
    fn invoke(
        &mut self,
        event: &dyn Event,
        coverage: &CoverageCollector,
    ) -> Result<(), RuntimeError> {
        coverage.event_received(&self.name, event.name());
        let mut ctx = MonitorContext::new(self.name.clone());
        ctx.set_current_state(self.current);

        let resolution = self.table.resolve(&[self.current], event.key());
        match resolution {
            Some(Resolution {
                handle: Handle::Ignore,
                ..
            }) => return Ok(()),
            Some(Resolution {
                handle: Handle::Action(action),
                ..
            }) => self.run_action(action, Some(event), &mut ctx)?,
            Some(Resolution {
                handle: Handle::Goto(target),
                ..
            }) => self.goto(target, Some(event), &mut ctx, coverage)?,
            // Monitors have no inbox to defer into and no stack to push.
            Some(Resolution {
                handle: Handle::Push(_) | Handle::Defer,
                ..
            })
            | None => {
                return Err(RuntimeError::UnhandledEvent {
                    actor: self.name.clone(),
                    event: event.name().to_string(),
                })
            }
        }
        self.drain_pending(event, &mut ctx, coverage)
    }

    fn drain_pending(
        &mut self,
        trigger: &dyn Event,
        ctx: &mut MonitorContext,
        coverage: &CoverageCollector,
    ) -> Result<(), RuntimeError> {
        while let Some(control) = ctx.take_pending() {
            match control {
                MonitorControl::Raise(event) => {
                    match self.table.resolve(&[self.current], event.key()) {
                        Some(Resolution {
                            handle: Handle::Ignore,
                            ..
                        }) => {}
                        Some(Resolution {
                            handle: Handle::Action(action),
                            ..
                        }) => self.run_action(action, Some(&*event), ctx)?,
                        Some(Resolution {
                            handle: Handle::Goto(target),
                            ..
                        }) => self.goto(target, Some(&*event), ctx, coverage)?,
                        _ => {
                            return Err(RuntimeError::UnhandledEvent {
                                actor: self.name.clone(),
                                event: event.name().to_string(),
                            })
                        }
                    }
                }
                MonitorControl::Goto(target) => {
                    self.goto(target, Some(trigger), ctx, coverage)?;
                }
            }
        }
        Ok(())
    }

    fn goto(
        &mut self,
        target: &'static str,
        event: Option<&dyn Event>,
        ctx: &mut MonitorContext,
        coverage: &CoverageCollector,
    ) -> Result<(), RuntimeError> {
        if !self.table.has_state(target) {
            return Err(RuntimeError::InvalidTransition {
                actor: self.name.clone(),
                target: target.to_string(),
            });
        }
        if let Some(exit) = self.table.state(self.current).and_then(|s| s.exit()) {
            ctx.enter_exit_scope();
            self.run_action(exit, None, ctx)?;
            ctx.leave_exit_scope();
        }
        coverage.transition(
            &self.name,
            self.current,
            event.map(Event::name).unwrap_or("entry"),
            target,
        );
        self.current = target;
        ctx.set_current_state(target);
        coverage.state_visited(&self.name, target);
        trace!(monitor = %self.name, state = target, "monitor transition");

        if let Some(entry) = self.table.state(target).and_then(|s| s.entry()) {
            self.run_action(entry, event, ctx)?;
        }
        Ok(())
    }

    fn run_action(
        &mut self,
        action: &'static str,
        event: Option<&dyn Event>,
        ctx: &mut MonitorContext,
    ) -> Result<(), RuntimeError> {
        let result = self.instance.execute(action, event, ctx);
        if let Some(error) = ctx.take_error() {
            return Err(error);
        }
        result.map_err(|e| RuntimeError::HandlerFailure {
            actor: self.name.clone(),
            message: e.message().to_string(),
        })
    }

    fn hot_state(&self) -> Option<&'static str> {
        let state = self.table.state(self.current)?;
        (state.temperature() == Temperature::Hot).then_some(state.name())
    }
}

/// All registered monitors of one controlled execution.
#[derive(Default)]
pub(crate) struct MonitorRegistry {
    hosts: Mutex<Vec<MonitorHost>>,
}

impl MonitorRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a monitor instance and enter its start state.
    pub(crate) fn register<M: Monitor>(
        &self,
        instance: M,
        coverage: &CoverageCollector,
    ) -> Result<(), RuntimeError> {
        let type_id = TypeId::of::<M>();
        let name = short_type_name(std::any::type_name::<M>()).to_string();
        let mut hosts = self.hosts.lock();
        if hosts.iter().any(|h| h.type_id == type_id) {
            return Err(RuntimeError::Configuration(format!(
                "monitor '{name}' is already registered"
            )));
        }
        let table = M::table().map_err(|e| {
            RuntimeError::Configuration(format!("monitor '{name}' table: {e}"))
        })?;

        coverage.machine_created(&name, true);
        let mut host = MonitorHost {
            type_id,
            name,
            instance: Box::new(MonitorAdapter(instance)),
            table,
            current: "",
        };
        // Enter the start state; entry actions run with no triggering event.
        let start = host.table.start_state();
        let mut ctx = MonitorContext::new(host.name.clone());
        coverage.state_visited(&host.name, start);
        host.current = start;
        ctx.set_current_state(start);
        if let Some(entry) = host.table.state(start).and_then(|s| s.entry()) {
            host.run_action(entry, None, &mut ctx)?;
            host.drain_pending(&crate::event::UnitEvent, &mut ctx, coverage)?;
        }
        hosts.push(host);
        Ok(())
    }

    /// Synchronously deliver an event to the monitor of type `type_id`.
    pub(crate) fn invoke(
        &self,
        type_id: TypeId,
        event: &dyn Event,
        coverage: &CoverageCollector,
    ) -> Result<(), RuntimeError> {
        let mut hosts = self.hosts.lock();
        let host = hosts.iter_mut().find(|h| h.type_id == type_id).ok_or_else(|| {
            RuntimeError::Configuration("event delivered to unregistered monitor".to_string())
        })?;
        host.invoke(event, coverage)
    }

    /// Monitors currently residing in hot states.
    pub(crate) fn hot_monitors(&self) -> Vec<HotMonitor> {
        self.hosts
            .lock()
            .iter()
            .filter_map(|h| {
                h.hot_state().map(|state| HotMonitor {
                    monitor: h.name.clone(),
                    state,
                })
            })
            .collect()
    }

    /// Mix monitor states (and user hashes) into the global state hash.
    pub(crate) fn hash_into(&self, hasher: &mut impl std::hash::Hasher, user_hashing: bool) {
        use std::hash::Hash;
        for host in self.hosts.lock().iter() {
            host.name.hash(hasher);
            host.current.hash(hasher);
            if user_hashing {
                host.instance.hashed_state().hash(hasher);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::actor::table::{MachineTable, State};
    use crate::actor::{HandlerResult, TableError};

    #[derive(Debug)]
    struct Request;
    impl Event for Request {}

    #[derive(Debug)]
    struct Response;
    impl Event for Response {}

    struct Progress {
        pending: u32,
    }

    impl Monitor for Progress {
        fn table() -> Result<MachineTable, TableError> {
            MachineTable::builder()
                .state(
                    State::new("Idle")
                        .initial()
                        .cold()
                        .when::<Request>(Handle::goto_state("Waiting")),
                )
                .state(
                    State::new("Waiting")
                        .hot()
                        .on_entry("note_pending")
                        .when::<Request>(Handle::action("note_pending"))
                        .when::<Response>(Handle::action("check_done")),
                )
                .build()
        }

        fn execute(
            &mut self,
            action: &'static str,
            _event: Option<&dyn Event>,
            ctx: &mut MonitorContext,
        ) -> HandlerResult {
            match action {
                "note_pending" => {
                    self.pending += 1;
                    Ok(())
                }
                "check_done" => {
                    self.pending -= 1;
                    if self.pending == 0 {
                        ctx.goto_state("Idle");
                    }
                    Ok(())
                }
                _ => Ok(()),
            }
        }
    }

    fn registry_with_progress() -> (MonitorRegistry, CoverageCollector) {
        let registry = MonitorRegistry::new();
        let coverage = CoverageCollector::new(true);
        registry
            .register(Progress { pending: 0 }, &coverage)
            .unwrap();
        (registry, coverage)
    }

    #[test]
    fn test_monitor_runs_to_quiescence() {
        let (registry, coverage) = registry_with_progress();
        let type_id = TypeId::of::<Progress>();

        registry.invoke(type_id, &Request, &coverage).unwrap();
        assert_eq!(
            registry.hot_monitors(),
            vec![HotMonitor {
                monitor: "Progress".to_string(),
                state: "Waiting",
            }]
        );

        registry.invoke(type_id, &Response, &coverage).unwrap();
        assert!(registry.hot_monitors().is_empty());
    }

    #[test]
    fn test_unhandled_monitor_event_errors() {
        let (registry, coverage) = registry_with_progress();
        let err = registry
            .invoke(TypeId::of::<Progress>(), &Response, &coverage)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::UnhandledEvent { .. }));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let (registry, coverage) = registry_with_progress();
        let err = registry
            .register(Progress { pending: 0 }, &coverage)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Configuration(_)));
    }

    #[test]
    fn test_unregistered_monitor_rejected() {
        let registry = MonitorRegistry::new();
        let coverage = CoverageCollector::new(false);
        let err = registry
            .invoke(TypeId::of::<Progress>(), &Request, &coverage)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Configuration(_)));
    }

    #[test]
    fn test_monitor_coverage_recorded() {
        let (registry, coverage) = registry_with_progress();
        registry
            .invoke(TypeId::of::<Progress>(), &Request, &coverage)
            .unwrap();

        let info = coverage.snapshot();
        let progress = &info.machines["Progress"];
        assert!(progress.is_monitor);
        assert!(progress.states.contains("Waiting"));
        assert!(progress
            .transitions
            .contains(&("Idle".to_string(), "Request".to_string(), "Waiting".to_string())));
    }
}
