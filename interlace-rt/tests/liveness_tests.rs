//! Liveness and Specification-Monitor Integration Tests
//!
//! End-to-end checks of the liveness machinery: hot-state temperature
//! under a fair strategy, end-of-program hot detection, cycle detection,
//! a failure-detector scenario whose injected bug a safety monitor
//! catches on some schedule, and a replicating-storage scenario whose
//! stale data map leaves a repair monitor hot at the end of the program.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

// Layer 1: Standard library imports
use std::collections::BTreeSet;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use interlace_rt::prelude::*;
use interlace_rt::{Event, Handle as On, MachineTable, State};

// ============================================================================
// Shared events and monitors
// ============================================================================

#[derive(Debug)]
struct WorkStarted;
impl Event for WorkStarted {}

#[derive(Debug)]
struct WorkFinished;
impl Event for WorkFinished {}

/// Hot while work is outstanding; cold once it finished.
#[derive(Default)]
struct Progress;

impl Monitor for Progress {
    fn table() -> Result<MachineTable, TableError> {
        MachineTable::builder()
            .state(
                State::new("Idle")
                    .initial()
                    .cold()
                    .when::<WorkStarted>(On::goto_state("Busy")),
            )
            .state(
                State::new("Busy")
                    .hot()
                    .when::<WorkFinished>(On::goto_state("Idle"))
                    .ignore::<WorkStarted>(),
            )
            .build()
    }

    fn execute(
        &mut self,
        _action: &'static str,
        _event: Option<&dyn Event>,
        _ctx: &mut MonitorContext,
    ) -> HandlerResult {
        Ok(())
    }
}

#[derive(Debug)]
struct Tick;
impl Event for Tick {}

/// Spins forever by re-raising `Tick` to itself.
struct Spinner;

#[async_trait]
impl StateMachine for Spinner {
    fn table() -> Result<MachineTable, TableError> {
        MachineTable::builder()
            .state(
                State::new("Spinning")
                    .initial()
                    .on_entry("kick")
                    .when::<Tick>(On::action("kick")),
            )
            .build()
    }

    async fn execute(
        &mut self,
        action: &'static str,
        _event: Option<&dyn Event>,
        ctx: &mut ActorContext,
    ) -> HandlerResult {
        if action == "kick" {
            ctx.raise_event(Tick).await;
        }
        Ok(())
    }
}

// ============================================================================
// TEST GROUP 1: Hot-state temperature
// ============================================================================

#[test]
fn test_liveness_violation_on_endless_hot_state() {
    let config = Configuration::builder()
        .with_testing_iterations(1)
        .with_random_seed(1)
        .with_max_scheduling_steps(5_000)
        .with_liveness_temperature_threshold(100)
        .build()
        .unwrap();
    let mut engine = TestingEngine::new(config).unwrap();
    engine.register_monitor::<Progress>();

    let report = engine
        .run(|rt| async move {
            rt.invoke_monitor::<Progress>(WorkStarted).await;
            rt.create_machine(Spinner).await;
        })
        .unwrap();

    let bug = report.first_bug().expect("expected a liveness violation");
    assert!(
        matches!(bug.error, RuntimeError::LivenessViolation { .. }),
        "got: {}",
        bug.error
    );
    assert!(bug.error.to_string().contains("Progress"));
    assert!(bug.error.to_string().contains("Busy"));
    // Detection must happen within threshold + program prefix, well under
    // the step budget.
    assert!(bug.steps < 5_000);
}

#[test]
fn test_no_violation_when_hot_state_is_left() {
    let config = Configuration::builder()
        .with_testing_iterations(20)
        .with_random_seed(5)
        .with_liveness_temperature_threshold(100)
        .build()
        .unwrap();
    let mut engine = TestingEngine::new(config).unwrap();
    engine.register_monitor::<Progress>();

    let report = engine
        .run(|rt| async move {
            rt.invoke_monitor::<Progress>(WorkStarted).await;
            rt.invoke_monitor::<Progress>(WorkFinished).await;
        })
        .unwrap();
    assert!(!report.found_bug(), "{:?}", report.first_bug());
}

// ============================================================================
// TEST GROUP 2: End of program while hot
// ============================================================================

#[test]
fn test_liveness_end_of_program_reported() {
    let config = Configuration::builder()
        .with_testing_iterations(1)
        .with_random_seed(0)
        .build()
        .unwrap();
    let mut engine = TestingEngine::new(config).unwrap();
    engine.register_monitor::<Progress>();

    let report = engine
        .run(|rt| async move {
            // Work starts but the program quiesces before it finishes.
            rt.invoke_monitor::<Progress>(WorkStarted).await;
        })
        .unwrap();

    let bug = report.first_bug().expect("expected an end-of-program bug");
    assert!(
        matches!(bug.error, RuntimeError::LivenessEndOfProgram { .. }),
        "got: {}",
        bug.error
    );
}

// ============================================================================
// TEST GROUP 3: Cycle detection
// ============================================================================

#[test]
fn test_cycle_detection_finds_state_repetition_while_hot() {
    let config = Configuration::builder()
        .with_testing_iterations(1)
        .with_random_seed(3)
        .with_max_scheduling_steps(5_000)
        .with_cycle_detection(true)
        .build()
        .unwrap();
    let mut engine = TestingEngine::new(config).unwrap();
    engine.register_monitor::<Progress>();

    let report = engine
        .run(|rt| async move {
            rt.invoke_monitor::<Progress>(WorkStarted).await;
            rt.create_machine(Spinner).await;
        })
        .unwrap();

    let bug = report.first_bug().expect("expected a liveness cycle");
    assert!(
        matches!(bug.error, RuntimeError::LivenessCycle { .. }),
        "got: {}",
        bug.error
    );
}

// ============================================================================
// TEST GROUP 4: Failure-detector scenario
// ============================================================================

#[derive(Debug)]
struct PingMsg {
    from: ActorId,
}
impl Event for PingMsg {}

#[derive(Debug)]
struct PongMsg;
impl Event for PongMsg {}

#[derive(Debug)]
struct StartDetector {
    node: ActorId,
}
impl Event for StartDetector {}

#[derive(Debug)]
struct NodeDeclaredDead;
impl Event for NodeDeclaredDead {}

/// Asserts that no live node is ever declared dead. The node in this
/// scenario never halts, so any declaration is a safety violation.
#[derive(Default)]
struct Safety;

impl Monitor for Safety {
    fn table() -> Result<MachineTable, TableError> {
        MachineTable::builder()
            .state(
                State::new("Watching")
                    .initial()
                    .when::<NodeDeclaredDead>(On::action("declared")),
            )
            .build()
    }

    fn execute(
        &mut self,
        action: &'static str,
        _event: Option<&dyn Event>,
        ctx: &mut MonitorContext,
    ) -> HandlerResult {
        if action == "declared" {
            ctx.assert(false, "declared a live node dead");
        }
        Ok(())
    }
}

/// Replies to pings.
struct Node;

#[async_trait]
impl StateMachine for Node {
    fn table() -> Result<MachineTable, TableError> {
        MachineTable::builder()
            .state(
                State::new("Alive")
                    .initial()
                    .when::<PingMsg>(On::action("reply")),
            )
            .build()
    }

    async fn execute(
        &mut self,
        action: &'static str,
        event: Option<&dyn Event>,
        ctx: &mut ActorContext,
    ) -> HandlerResult {
        if action == "reply" {
            let ping = event.and_then(|e| e.downcast_ref::<PingMsg>()).unwrap();
            let from = ping.from.clone();
            ctx.send_event(&from, PongMsg).await;
        }
        Ok(())
    }
}

/// Pings a node and races the reply against a timeout. The injected bug:
/// a timeout is treated as proof of death, though the node may simply not
/// have been scheduled yet.
struct Detector {
    got_reply: bool,
}

#[async_trait]
impl StateMachine for Detector {
    fn table() -> Result<MachineTable, TableError> {
        MachineTable::builder()
            .state(
                State::new("Init")
                    .initial()
                    .when::<StartDetector>(On::action("start"))
                    .when::<PongMsg>(On::action("reply"))
                    .when::<TimerElapsedEvent>(On::action("timeout")),
            )
            .build()
    }

    async fn execute(
        &mut self,
        action: &'static str,
        event: Option<&dyn Event>,
        ctx: &mut ActorContext,
    ) -> HandlerResult {
        match action {
            "start" => {
                let start = event.and_then(|e| e.downcast_ref::<StartDetector>()).unwrap();
                let node = start.node.clone();
                let me = ctx.id().clone();
                ctx.send_event(&node, PingMsg { from: me }).await;
                ctx.start_timer(std::time::Duration::from_millis(10)).await;
                Ok(())
            }
            "reply" => {
                self.got_reply = true;
                Ok(())
            }
            "timeout" => {
                if !self.got_reply {
                    ctx.invoke_monitor::<Safety>(NodeDeclaredDead).await;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[test]
fn test_failure_detector_bug_found_within_iteration_budget() {
    let config = Configuration::builder()
        .with_testing_iterations(200)
        .with_random_seed(0)
        .with_max_scheduling_steps(2_000)
        .build()
        .unwrap();
    let mut engine = TestingEngine::new(config).unwrap();
    engine.register_monitor::<Safety>();

    let report = engine
        .run(|rt| async move {
            let node = rt.create_machine(Node).await;
            let detector = rt.create_machine(Detector { got_reply: false }).await;
            rt.send_event(&detector, StartDetector { node }).await;
        })
        .unwrap();

    let bug = report
        .first_bug()
        .expect("some schedule must fire the timeout before the pong");
    assert_eq!(bug.error.to_string(), "declared a live node dead");
}

// ============================================================================
// TEST GROUP 5: Replicating-storage scenario
// ============================================================================

/// Replicas held by the storage manager; one of them is faulted.
const REPLICA_COUNT: usize = 3;

#[derive(Debug)]
struct StartReplication {
    replicas: Vec<ActorId>,
}
impl Event for StartReplication {}

#[derive(Debug)]
struct StoreData {
    manager: ActorId,
}
impl Event for StoreData {}

#[derive(Debug)]
struct StoreAck {
    replica: ActorId,
}
impl Event for StoreAck {}

#[derive(Debug)]
struct ReplicaLost {
    replica: ActorId,
}
impl Event for ReplicaLost {}

#[derive(Debug)]
struct AuditReplication;
impl Event for AuditReplication {}

#[derive(Debug)]
struct ReplicaFailed;
impl Event for ReplicaFailed {}

#[derive(Debug)]
struct RepairCompleted;
impl Event for RepairCompleted {}

/// Hot from the moment a replica fails until the manager restores the
/// replication factor.
#[derive(Default)]
struct Repair;

impl Monitor for Repair {
    fn table() -> Result<MachineTable, TableError> {
        MachineTable::builder()
            .state(
                State::new("Idle")
                    .initial()
                    .when::<ReplicaFailed>(On::goto_state("Repairing")),
            )
            .state(
                State::new("Repairing")
                    .hot()
                    .ignore::<ReplicaFailed>()
                    .when::<RepairCompleted>(On::goto_state("Repaired")),
            )
            .state(State::new("Repaired").cold().ignore::<ReplicaFailed>())
            .build()
    }

    fn execute(
        &mut self,
        _action: &'static str,
        _event: Option<&dyn Event>,
        _ctx: &mut MonitorContext,
    ) -> HandlerResult {
        Ok(())
    }
}

/// Stores one datum and acknowledges to the manager.
struct Replica;

#[async_trait]
impl StateMachine for Replica {
    fn table() -> Result<MachineTable, TableError> {
        MachineTable::builder()
            .state(
                State::new("Holding")
                    .initial()
                    .when::<StoreData>(On::action("store")),
            )
            .build()
    }

    async fn execute(
        &mut self,
        action: &'static str,
        event: Option<&dyn Event>,
        ctx: &mut ActorContext,
    ) -> HandlerResult {
        if action == "store" {
            let store = event.and_then(|e| e.downcast_ref::<StoreData>()).unwrap();
            let manager = store.manager.clone();
            let me = ctx.id().clone();
            ctx.send_event(&manager, StoreAck { replica: me }).await;
        }
        Ok(())
    }
}

/// Tracks which replicas acknowledged the datum. The injected bug: a lost
/// replica's entry stays in the data map, so an audit can count it toward
/// the replication factor and skip the repair.
struct StorageManager {
    data_map: BTreeSet<u64>,
    failed: Vec<ActorId>,
}

#[async_trait]
impl StateMachine for StorageManager {
    fn table() -> Result<MachineTable, TableError> {
        MachineTable::builder()
            .state(
                State::new("Managing")
                    .initial()
                    .when::<StartReplication>(On::action("replicate"))
                    .when::<StoreAck>(On::action("ack"))
                    .when::<ReplicaLost>(On::action("lost"))
                    .when::<AuditReplication>(On::action("audit")),
            )
            .build()
    }

    async fn execute(
        &mut self,
        action: &'static str,
        event: Option<&dyn Event>,
        ctx: &mut ActorContext,
    ) -> HandlerResult {
        match action {
            "replicate" => {
                let start = event
                    .and_then(|e| e.downcast_ref::<StartReplication>())
                    .unwrap();
                let replicas = start.replicas.clone();
                let me = ctx.id().clone();
                for replica in &replicas {
                    ctx.send_event(replica, StoreData { manager: me.clone() }).await;
                }
                Ok(())
            }
            "ack" => {
                let ack = event.and_then(|e| e.downcast_ref::<StoreAck>()).unwrap();
                self.data_map.insert(ack.replica.value());
                Ok(())
            }
            "lost" => {
                // The lost replica's data-map entry is deliberately kept;
                // an audit counting it believes the data fully replicated.
                let lost = event.and_then(|e| e.downcast_ref::<ReplicaLost>()).unwrap();
                self.failed.push(lost.replica.clone());
                Ok(())
            }
            "audit" => {
                if self.data_map.len() >= REPLICA_COUNT {
                    // Believes the replication factor is intact.
                    return Ok(());
                }
                let me = ctx.id().clone();
                for _lost in &self.failed {
                    let spare = ctx.create_machine(Replica).await;
                    ctx.send_event(&spare, StoreData { manager: me.clone() }).await;
                }
                ctx.invoke_monitor::<Repair>(RepairCompleted).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[test]
fn test_replicating_storage_stale_data_map_is_a_liveness_bug() {
    let config = Configuration::builder()
        .with_testing_iterations(300)
        .with_random_seed(0)
        .with_max_scheduling_steps(2_000)
        .build()
        .unwrap();
    let mut engine = TestingEngine::new(config).unwrap();
    engine.register_monitor::<Repair>();

    let report = engine
        .run(|rt| async move {
            let mut replicas = Vec::new();
            for _ in 0..REPLICA_COUNT {
                replicas.push(rt.create_machine(Replica).await);
            }
            let manager = rt
                .create_machine(StorageManager {
                    data_map: BTreeSet::new(),
                    failed: Vec::new(),
                })
                .await;

            rt.send_event(
                &manager,
                StartReplication {
                    replicas: replicas.clone(),
                },
            )
            .await;

            // Fault one replica; whether its acknowledgment landed in the
            // data map first is a scheduling choice.
            rt.send_event(&replicas[0], HaltEvent).await;
            rt.invoke_monitor::<Repair>(ReplicaFailed).await;
            rt.send_event(
                &manager,
                ReplicaLost {
                    replica: replicas[0].clone(),
                },
            )
            .await;
            rt.send_event(&manager, AuditReplication).await;
        })
        .unwrap();

    let bug = report
        .first_bug()
        .expect("some schedule must audit a data map that still lists the lost replica");
    assert!(
        matches!(bug.error, RuntimeError::LivenessEndOfProgram { .. }),
        "got: {}",
        bug.error
    );
    assert!(bug.error.to_string().contains("Repair"));
    assert!(bug.error.to_string().contains("Repairing"));
}
