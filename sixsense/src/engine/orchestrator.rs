//! Fan-out, fan-in and sequencing of operations across sessions.
//!
//! Every [`WorkflowOrchestrator::execute`] call is a run with its own
//! bookkeeping, so the same workflow template can run any number of
//! times, concurrently or not.
//!
//! Within a run, node uuids identify nodes. A continuation workflow that
//! is listed by several parents (by the same uuid) is a fan-in point: it
//! is decided once every parent has completed, runs only if every parent
//! selected it, and is skipped otherwise. Skipping propagates, so every
//! fan-in point is eventually decided. The graph must be acyclic.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dashmap::{DashMap, DashSet};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, Semaphore};
use uuid::Uuid;

use super::events::EngineEvent;
use crate::error::{Result, WorkflowError};
use crate::logic::{ExpressionResult, ResultStatus, Variables, messages, resolve};
use crate::model::{Operation, OperationResult, ParallelWorkflow, WorkflowPolicy};
use crate::session::{Session, SessionServices};
use crate::transport::ShellConnector;

/// Outcome of one run, keyed by operation uuid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReport {
    pub run_id: Uuid,
    /// Every operation reachable from the root, including skipped ones.
    pub results: HashMap<Uuid, OperationResult>,
    /// Operations that never ran because their workflow was skipped.
    pub skipped: HashSet<Uuid>,
    /// Operations that were asked to stop by a failing sibling.
    pub terminated: HashSet<Uuid>,
}

impl WorkflowReport {
    pub fn result(&self, operation_id: &Uuid) -> Option<&OperationResult> {
        self.results.get(operation_id)
    }

    /// No operation failed.
    pub fn is_success(&self) -> bool {
        self.results.values().all(|r| !r.is_failure())
    }

    pub fn failed(&self) -> impl Iterator<Item = &Uuid> {
        self.results
            .iter()
            .filter(|(_, r)| r.is_failure())
            .map(|(id, _)| id)
    }
}

/// Runs workflows; cheap to clone, clones share workers and collaborators.
#[derive(Clone)]
pub struct WorkflowOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    connector: Arc<dyn ShellConnector>,
    services: SessionServices,
    permits: Arc<Semaphore>,
}

impl WorkflowOrchestrator {
    pub fn new(connector: Arc<dyn ShellConnector>, services: SessionServices) -> Self {
        let permits = Arc::new(Semaphore::new(services.config.max_concurrent_operations));
        Self {
            inner: Arc::new(Inner {
                connector,
                services,
                permits,
            }),
        }
    }

    pub fn services(&self) -> &SessionServices {
        &self.inner.services
    }

    /// Execute `workflow` and everything it sequences, returning once no
    /// operation of the run is left running.
    pub async fn execute(&self, workflow: &ParallelWorkflow) -> Result<WorkflowReport> {
        if self.is_shut_down() {
            return Err(WorkflowError::EngineShutdown.into());
        }

        let run = Arc::new(Run::new(self.inner.clone()));
        run.register(workflow);
        info!(
            "Run {} started with workflow {} ({} operations)",
            run.id,
            workflow.uuid,
            workflow.total_operations()
        );

        run.start_root(workflow.uuid);
        run.wait_idle().await;

        let report = run.report();
        info!(
            "Run {} finished: {} operations, {} failed, {} skipped",
            run.id,
            report.results.len(),
            report.failed().count(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Stop accepting work. Operations waiting for a worker fail.
    pub fn shutdown(&self) {
        self.inner.permits.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.permits.is_closed()
    }
}

struct WorkflowState {
    workflow: Arc<ParallelWorkflow>,
    completed: AtomicUsize,
    failed: AtomicBool,
    sequence_started: AtomicBool,
}

#[derive(Default)]
struct FanIn {
    arrived: HashSet<Uuid>,
    rejected: bool,
    decided: bool,
}

/// Bookkeeping of one `execute` call.
struct Run {
    id: Uuid,
    inner: Arc<Inner>,
    workflows: DashMap<Uuid, Arc<WorkflowState>>,
    operations: DashMap<Uuid, Arc<Operation>>,
    /// Operation -> workflow it belongs to.
    owners: DashMap<Uuid, Uuid>,
    /// Continuation workflow -> nodes that list it.
    parents: DashMap<Uuid, HashSet<Uuid>>,
    arrivals: DashMap<Uuid, FanIn>,
    results: DashMap<Uuid, OperationResult>,
    sessions: DashMap<Uuid, Arc<Session>>,
    terminated: DashSet<Uuid>,
    skipped: DashSet<Uuid>,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl Run {
    fn new(inner: Arc<Inner>) -> Self {
        Self {
            id: Uuid::new_v4(),
            inner,
            workflows: DashMap::new(),
            operations: DashMap::new(),
            owners: DashMap::new(),
            parents: DashMap::new(),
            arrivals: DashMap::new(),
            results: DashMap::new(),
            sessions: DashMap::new(),
            terminated: DashSet::new(),
            skipped: DashSet::new(),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    /// Index the graph below `root`: workflows, operations, owners and
    /// the parents of every continuation.
    fn register(&self, root: &ParallelWorkflow) {
        let mut visited = HashSet::new();
        let mut pending = vec![root];

        while let Some(workflow) = pending.pop() {
            if !visited.insert(workflow.uuid) {
                continue;
            }
            self.workflows.insert(
                workflow.uuid,
                Arc::new(WorkflowState {
                    workflow: Arc::new(workflow.clone()),
                    completed: AtomicUsize::new(0),
                    failed: AtomicBool::new(false),
                    sequence_started: AtomicBool::new(false),
                }),
            );

            for operation in &workflow.parallel_operations {
                if self.owners.insert(operation.uuid, workflow.uuid).is_some() {
                    warn!(
                        "Run {}: operation {} appears more than once",
                        self.id, operation.uuid
                    );
                }
                self.operations
                    .insert(operation.uuid, Arc::new(operation.clone()));
                for continuation in operation.continuations() {
                    self.add_parent(continuation.uuid, operation.uuid);
                    pending.push(continuation);
                }
            }
            for continuation in workflow.continuations() {
                self.add_parent(continuation.uuid, workflow.uuid);
                pending.push(continuation);
            }
        }
    }

    fn add_parent(&self, workflow_id: Uuid, parent_id: Uuid) {
        self.parents.entry(workflow_id).or_default().insert(parent_id);
    }

    fn workflow(&self, workflow_id: &Uuid) -> Option<Arc<WorkflowState>> {
        self.workflows.get(workflow_id).map(|state| Arc::clone(state.value()))
    }

    fn start_root(self: &Arc<Self>, workflow_id: Uuid) {
        let Some(state) = self.workflow(&workflow_id) else {
            return;
        };
        let variables: Variables = state.workflow.dynamic_fields.clone().into_iter().collect();
        if resolve("", &variables, &state.workflow.execution_condition).resolved {
            self.execute_workflow(&state);
        } else {
            debug!("Run {}: root workflow {} skipped", self.id, workflow_id);
            self.skip_workflow(&state);
        }
    }

    /// A parent of `workflow_id` completed; decide the workflow once every
    /// parent has.
    fn arrive(self: &Arc<Self>, workflow_id: Uuid, parent_id: Uuid, selected: bool) {
        let expected = self.parents.get(&workflow_id).map_or(1, |p| p.len());
        let decision = {
            let mut fan_in = self.arrivals.entry(workflow_id).or_default();
            fan_in.arrived.insert(parent_id);
            fan_in.rejected |= !selected;
            if fan_in.arrived.len() >= expected && !fan_in.decided {
                fan_in.decided = true;
                Some(!fan_in.rejected)
            } else {
                None
            }
        };

        if let Some(selected) = decision {
            self.attempt_to_execute(workflow_id, selected);
        }
    }

    /// Run a continuation whose parents all completed, if they all selected
    /// it and its execution condition holds against their dynamic fields.
    fn attempt_to_execute(self: &Arc<Self>, workflow_id: Uuid, selected: bool) {
        let Some(state) = self.workflow(&workflow_id) else {
            return;
        };
        if !selected {
            debug!("Run {}: workflow {} not selected", self.id, workflow_id);
            self.skip_workflow(&state);
            return;
        }

        let parents: Vec<Uuid> = self
            .parents
            .get(&workflow_id)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default();
        let mut fields = IndexMap::new();
        for parent in parents {
            fields.extend(self.dynamic_fields_of(&parent));
        }
        fields.extend(state.workflow.dynamic_fields.clone());
        let variables: Variables = fields.into_iter().collect();

        if resolve("", &variables, &state.workflow.execution_condition).resolved {
            self.execute_workflow(&state);
        } else {
            debug!(
                "Run {}: workflow {} did not match its execution conditions",
                self.id, workflow_id
            );
            self.skip_workflow(&state);
        }
    }

    fn dynamic_fields_of(&self, node_id: &Uuid) -> IndexMap<String, String> {
        if let Some(state) = self.workflows.get(node_id) {
            return state.workflow.dynamic_fields.clone();
        }
        self.operations
            .get(node_id)
            .map(|operation| operation.dynamic_fields.clone())
            .unwrap_or_default()
    }

    fn execute_workflow(self: &Arc<Self>, state: &Arc<WorkflowState>) {
        let workflow = state.workflow.clone();
        debug!(
            "Run {}: executing workflow {} ({} operations)",
            self.id,
            workflow.uuid,
            workflow.total_operations()
        );

        if workflow.parallel_operations.is_empty() {
            if !state.sequence_started.swap(true, Ordering::SeqCst) {
                self.fire_continuations(
                    workflow.uuid,
                    &workflow.sequence_upon_success,
                    &workflow.sequence_upon_failure,
                    ResultStatus::Success,
                );
            }
            return;
        }

        for operation in &workflow.parallel_operations {
            let template = self
                .operations
                .get(&operation.uuid)
                .map(|o| Arc::clone(o.value()));
            if let Some(template) = template {
                self.spawn_operation(template);
            }
        }
    }

    /// Mark every operation of the workflow skipped and pass the skip on.
    fn skip_workflow(self: &Arc<Self>, state: &Arc<WorkflowState>) {
        if state.sequence_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let workflow = state.workflow.clone();

        for operation in &workflow.parallel_operations {
            self.results
                .insert(operation.uuid, OperationResult::new(ExpressionResult::skip()));
            self.skipped.insert(operation.uuid);
            self.fire_continuations(
                operation.uuid,
                &operation.sequence_upon_success,
                &operation.sequence_upon_failure,
                ResultStatus::Skip,
            );
        }
        self.fire_continuations(
            workflow.uuid,
            &workflow.sequence_upon_success,
            &workflow.sequence_upon_failure,
            ResultStatus::Skip,
        );
    }

    /// Tell each continuation of `parent_id` whether `status` selected it.
    fn fire_continuations(
        self: &Arc<Self>,
        parent_id: Uuid,
        upon_success: &[ParallelWorkflow],
        upon_failure: &[ParallelWorkflow],
        status: ResultStatus,
    ) {
        let mut edges: IndexMap<Uuid, bool> = IndexMap::new();
        for continuation in upon_success {
            *edges.entry(continuation.uuid).or_default() |= status == ResultStatus::Success;
        }
        for continuation in upon_failure {
            *edges.entry(continuation.uuid).or_default() |= status == ResultStatus::Failure;
        }

        for (workflow_id, selected) in edges {
            self.arrive(workflow_id, parent_id, selected);
        }
    }

    fn spawn_operation(self: &Arc<Self>, operation: Arc<Operation>) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let run = self.clone();
        tokio::spawn(async move {
            let result = run.run_operation(&operation).await;
            run.results.insert(operation.uuid, result.clone());
            run.notify_operation_outcome(&operation, &result);

            if run.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                run.idle.notify_waiters();
            }
        });
    }

    async fn run_operation(&self, operation: &Operation) -> OperationResult {
        let Ok(_permit) = self.inner.permits.clone().acquire_owned().await else {
            return OperationResult::new(ExpressionResult::execution_error(
                WorkflowError::EngineShutdown.to_string(),
            ));
        };
        if self.terminated.contains(&operation.uuid) {
            return terminated();
        }

        let services = self.inner.services.clone();
        let session = match Session::open(
            self.inner.connector.as_ref(),
            &operation.channel_names,
            operation.uuid,
            services.clone(),
        )
        .await
        {
            Ok(session) => Arc::new(session),
            Err(e) => {
                let message = format!(
                    "Failed to open a session for operation {}: {}",
                    operation.operation_name, e
                );
                warn!("{}", message);
                services.events.emit(EngineEvent::ExecutionAnomaly {
                    session_id: None,
                    message: message.clone(),
                });
                return OperationResult::new(ExpressionResult::execution_error(message));
            }
        };

        self.sessions.insert(operation.uuid, session.clone());
        if self.terminated.contains(&operation.uuid) {
            session.terminate();
        }

        let result = session.execute_operation(operation).await;

        self.sessions.remove(&operation.uuid);
        if let Err(e) = session.close().await {
            warn!("Session {} did not close cleanly: {}", session.short_id(), e);
        }
        result
    }

    /// Operations always sequence eagerly; then their workflow hears of it.
    fn notify_operation_outcome(self: &Arc<Self>, operation: &Operation, result: &OperationResult) {
        debug!(
            "Run {}: operation {} finished: {}",
            self.id, operation.operation_name, result.expression_result
        );
        // A skipped operation did not fail.
        let status = if result.is_failure() {
            ResultStatus::Failure
        } else {
            ResultStatus::Success
        };
        self.fire_continuations(
            operation.uuid,
            &operation.sequence_upon_success,
            &operation.sequence_upon_failure,
            status,
        );

        let owner = self.owners.get(&operation.uuid).map(|owner| *owner.value());
        if let Some(workflow_id) = owner {
            self.notify_workflow_outcome(workflow_id, operation.uuid, result);
        }
    }

    fn notify_workflow_outcome(
        self: &Arc<Self>,
        workflow_id: Uuid,
        operation_id: Uuid,
        result: &OperationResult,
    ) {
        let Some(state) = self.workflow(&workflow_id) else {
            return;
        };
        let workflow = state.workflow.clone();

        let failed = result.is_failure();
        if failed {
            state.failed.store(true, Ordering::SeqCst);
        }
        let completed = state.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let all_completed = completed >= workflow.total_operations();
        let eager = workflow.has_policy(WorkflowPolicy::SelfSequenceEager);

        if (eager || all_completed) && !state.sequence_started.swap(true, Ordering::SeqCst) {
            let status = if eager {
                if failed {
                    ResultStatus::Failure
                } else {
                    ResultStatus::Success
                }
            } else if state.failed.load(Ordering::SeqCst) {
                ResultStatus::Failure
            } else {
                ResultStatus::Success
            };
            debug!(
                "Run {}: workflow {} sequences upon {:?} ({}/{} completed)",
                self.id,
                workflow_id,
                status,
                completed,
                workflow.total_operations()
            );
            self.fire_continuations(
                workflow_id,
                &workflow.sequence_upon_success,
                &workflow.sequence_upon_failure,
                status,
            );
        }

        if failed && workflow.has_policy(WorkflowPolicy::OperationsDependent) {
            self.terminate_siblings(&workflow, operation_id);
        }
    }

    /// Fail fast: stop every sibling that has not completed yet.
    fn terminate_siblings(&self, workflow: &ParallelWorkflow, failed_id: Uuid) {
        for sibling in &workflow.parallel_operations {
            if sibling.uuid == failed_id || self.results.contains_key(&sibling.uuid) {
                continue;
            }
            if self.terminated.insert(sibling.uuid) {
                debug!(
                    "Run {}: terminating operation {} after {} failed",
                    self.id, sibling.operation_name, failed_id
                );
            }
            let session = self.sessions.get(&sibling.uuid).map(|s| Arc::clone(s.value()));
            if let Some(session) = session {
                session.terminate();
            }
        }
    }

    async fn wait_idle(&self) {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            idle.await;
        }
    }

    fn report(&self) -> WorkflowReport {
        WorkflowReport {
            run_id: self.id,
            results: self
                .results
                .iter()
                .map(|entry| (*entry.key(), entry.value().clone()))
                .collect(),
            skipped: self.skipped.iter().map(|id| *id).collect(),
            terminated: self.terminated.iter().map(|id| *id).collect(),
        }
    }
}

fn terminated() -> OperationResult {
    OperationResult::new(ExpressionResult::new(
        false,
        ResultStatus::Failure,
        messages::OPERATION_TERMINATED,
    ))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::engine::EngineConfig;
    use crate::logic::{BinaryRelation, ExecutionCondition, ExpectedOutcome, LogicalExpression};
    use crate::model::Command;
    use crate::session::test_support::{FakeConnector, Harness, harness};

    fn orchestrator(harness: &Harness) -> (WorkflowOrchestrator, Arc<FakeConnector>) {
        let connector = Arc::new(FakeConnector::new());
        let orchestrator = WorkflowOrchestrator::new(connector.clone(), harness.services.clone());
        (orchestrator, connector)
    }

    /// An operation running `text` that succeeds when the output contains `want`.
    fn op(name: &str, text: &str, want: &str) -> Operation {
        let command = Command::new("LOCAL", text)
            .with_minimal_seconds_to_response(1)
            .with_seconds_to_timeout(600)
            .with_expected_outcome(LogicalExpression::of(ExpectedOutcome::new(
                BinaryRelation::Contains,
                want,
            )));
        Operation::new(name, command).add_channel("LOCAL")
    }

    fn sent(harness: &Harness, text: &str) -> usize {
        harness
            .sink
            .events()
            .into_iter()
            .filter(|event| matches!(event, EngineEvent::InputSent { input, .. } if input == text))
            .count()
    }

    fn dependent_workflow(policy: WorkflowPolicy) -> (ParallelWorkflow, [Uuid; 5]) {
        let failing = op("failing", "fail", "ok");
        let first = op("first", "hang", "never");
        let second = op("second", "hang", "never");
        let recovery = op("recovery", "echo recovered", "recovered");
        let unexpected = op("unexpected", "echo unexpected", "unexpected");
        let ids = [
            failing.uuid,
            first.uuid,
            second.uuid,
            recovery.uuid,
            unexpected.uuid,
        ];

        let workflow = ParallelWorkflow::new()
            .with_policy(WorkflowPolicy::OperationsDependent)
            .with_policy(policy)
            .add_operation(failing)
            .add_operation(first)
            .add_operation(second)
            .add_failure_sequence(ParallelWorkflow::new().add_operation(recovery))
            .add_success_sequence(ParallelWorkflow::new().add_operation(unexpected));
        (workflow, ids)
    }

    async fn assert_fail_fast(policy: WorkflowPolicy) {
        let harness = harness(EngineConfig::default());
        let (orchestrator, _) = orchestrator(&harness);
        let (workflow, [failing, first, second, recovery, unexpected]) =
            dependent_workflow(policy);

        let start = Instant::now();
        let report = orchestrator.execute(&workflow).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(60));

        assert!(report.result(&failing).unwrap().is_failure());
        for sibling in [first, second] {
            let result = report.result(&sibling).unwrap();
            assert!(result.is_failure());
            assert_eq!(
                result.expression_result.message,
                crate::logic::messages::OPERATION_TERMINATED
            );
            assert!(report.terminated.contains(&sibling));
        }

        assert!(report.result(&recovery).unwrap().is_success());
        assert_eq!(sent(&harness, "echo recovered"), 1);
        assert!(report.skipped.contains(&unexpected));
        assert_eq!(sent(&harness, "echo unexpected"), 0);
        assert!(!report.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependent_failure_terminates_siblings_lazily() {
        assert_fail_fast(WorkflowPolicy::SelfSequenceLazy).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependent_failure_terminates_siblings_eagerly() {
        assert_fail_fast(WorkflowPolicy::SelfSequenceEager).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_failure_leaves_siblings_alone() {
        let harness = harness(EngineConfig::default());
        let (orchestrator, _) = orchestrator(&harness);
        let failing = op("failing", "fail", "ok");
        let passing = op("passing", "echo fine", "fine");
        let (failing_id, passing_id) = (failing.uuid, passing.uuid);
        let workflow = ParallelWorkflow::new()
            .add_operation(failing)
            .add_operation(passing);

        let report = orchestrator.execute(&workflow).await.unwrap();
        assert!(report.result(&failing_id).unwrap().is_failure());
        assert!(report.result(&passing_id).unwrap().is_success());
        assert!(report.terminated.is_empty());
        assert_eq!(report.failed().count(), 1);
    }

    fn joined() -> (ParallelWorkflow, Uuid) {
        let joined = op("joined", "echo joined", "joined");
        let id = joined.uuid;
        let workflow = ParallelWorkflow::new()
            .with_execution_condition(LogicalExpression::of(ExecutionCondition::new(
                "$var.site",
                BinaryRelation::Equals,
                "lab",
            )))
            .add_operation(joined);
        (workflow, id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_in_runs_once_after_every_parent() {
        let harness = harness(EngineConfig::default());
        let (orchestrator, _) = orchestrator(&harness);
        let (continuation, joined_id) = joined();

        let workflow = ParallelWorkflow::new()
            .add_operation(
                op("a", "echo a", "a")
                    .with_dynamic_field("var.site", "lab")
                    .add_success_sequence(continuation.clone()),
            )
            .add_operation(op("b", "echo b", "b").add_success_sequence(continuation));

        let report = orchestrator.execute(&workflow).await.unwrap();
        assert!(report.result(&joined_id).unwrap().is_success());
        assert_eq!(sent(&harness, "echo joined"), 1);
        assert!(report.is_success());
        assert_eq!(report.results.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_in_is_skipped_when_a_parent_fails() {
        let harness = harness(EngineConfig::default());
        let (orchestrator, _) = orchestrator(&harness);
        let (continuation, joined_id) = joined();

        let workflow = ParallelWorkflow::new()
            .add_operation(
                op("a", "echo a", "a")
                    .with_dynamic_field("var.site", "lab")
                    .add_success_sequence(continuation.clone()),
            )
            .add_operation(op("b", "fail", "ok").add_success_sequence(continuation));

        let report = orchestrator.execute(&workflow).await.unwrap();
        assert!(report.skipped.contains(&joined_id));
        assert!(report.result(&joined_id).unwrap().expression_result.is_skip());
        assert_eq!(sent(&harness, "echo joined"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuation_condition_sees_parent_fields() {
        let harness = harness(EngineConfig::default());
        let (orchestrator, _) = orchestrator(&harness);
        let (continuation, joined_id) = joined();

        let workflow = ParallelWorkflow::new().add_operation(
            op("a", "echo a", "a")
                .with_dynamic_field("var.site", "prod")
                .add_success_sequence(continuation),
        );

        let report = orchestrator.execute(&workflow).await.unwrap();
        assert!(report.skipped.contains(&joined_id));
        assert_eq!(sent(&harness, "echo joined"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_root_sequences_upon_success() {
        let harness = harness(EngineConfig::default());
        let (orchestrator, _) = orchestrator(&harness);
        let after = op("after", "echo after", "after");
        let after_id = after.uuid;
        let workflow = ParallelWorkflow::new()
            .add_success_sequence(ParallelWorkflow::new().add_operation(after));

        let report = orchestrator.execute(&workflow).await.unwrap();
        assert!(report.result(&after_id).unwrap().is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmet_root_condition_skips_everything() {
        let harness = harness(EngineConfig::default());
        let (orchestrator, connector) = orchestrator(&harness);
        let never = op("never", "echo never", "never");
        let never_id = never.uuid;
        let workflow = ParallelWorkflow::new()
            .with_dynamic_field("var.go", "no")
            .with_execution_condition(LogicalExpression::of(ExecutionCondition::new(
                "$var.go",
                BinaryRelation::Equals,
                "yes",
            )))
            .add_operation(never);

        let report = orchestrator.execute(&workflow).await.unwrap();
        assert!(report.skipped.contains(&never_id));
        assert_eq!(connector.opened(), 0);
        assert!(report.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_beyond_the_limit_wait_their_turn() {
        let config = EngineConfig {
            max_concurrent_operations: 1,
            ..Default::default()
        };
        let harness = harness(config);
        let (orchestrator, connector) = orchestrator(&harness);
        let workflow = ParallelWorkflow::new()
            .add_operation(op("one", "echo one", "one"))
            .add_operation(op("two", "echo two", "two"));

        let report = orchestrator.execute(&workflow).await.unwrap();
        assert!(report.is_success());
        assert_eq!(connector.opened(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_runs() {
        let harness = harness(EngineConfig::default());
        let (orchestrator, _) = orchestrator(&harness);
        orchestrator.shutdown();
        assert!(orchestrator.is_shut_down());
        let err = orchestrator.execute(&ParallelWorkflow::new()).await.unwrap_err();
        assert!(err.to_string().contains("shut down"));
    }
}
