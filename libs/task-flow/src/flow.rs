use std::collections::HashMap;

use array_protocol::ArrayError;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};

/// Shared mutable result map threaded through a `TaskFlow` run (spec §3,
/// "Task Flow"). Single-owner: the flow that created it is the only thing
/// that ever mutates it (spec §5).
#[derive(Debug, Default, Clone)]
pub struct FlowState {
    values: HashMap<String, Value>,
}

impl FlowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn merge(&mut self, delta: HashMap<String, Value>) {
        self.values.extend(delta);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn into_map(self) -> HashMap<String, Value> {
        self.values
    }
}

/// One step of a task flow (spec §3, "Task" + §9 re-architecture hint: a
/// small `Step` trait rather than captured-closure callbacks).
///
/// `forward` returns the delta to merge into `FlowState` on success.
/// `compensate` is only ever invoked for a step whose `forward` completed
/// without error, and is best-effort: it logs and continues on error rather
/// than propagating (spec §4.C).
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn forward(&self, state: &mut FlowState) -> Result<(), ArrayError>;

    async fn compensate(&self, _state: &FlowState) -> Result<(), ArrayError> {
        Ok(())
    }

    /// Whether this step has a meaningful compensator. Steps with none
    /// (spec §4.E.1 step 2: "Create-Replication-Pair (no revert...)") skip
    /// the revert call entirely rather than invoking a no-op.
    fn has_compensator(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Pending,
    Running,
    Committed,
    Reverted,
}

struct Entry {
    step: Box<dyn Step>,
    completed: bool,
}

/// Ordered list of named steps with a shared `FlowState` (spec §3/§4.C).
pub struct TaskFlow {
    entries: Vec<Entry>,
    state: FlowState,
    run_state: RunState,
}

impl TaskFlow {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            state: FlowState::new(),
            run_state: RunState::Pending,
        }
    }

    /// Appends a step. Only callable before `run` (spec §4.C contract).
    pub fn add_step(&mut self, step: Box<dyn Step>) {
        assert_eq!(
            self.run_state,
            RunState::Pending,
            "add_step called after run() started"
        );
        self.entries.push(Entry {
            step,
            completed: false,
        });
    }

    /// Seeds the flow's result map, e.g. with the resolved intent, before
    /// the first step runs.
    pub fn seed(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.state.insert(key, value);
    }

    /// Runs every step forward in order. Returns the first error
    /// encountered without running any compensator — the caller decides
    /// whether/when to call `revert` (spec §4.C).
    pub async fn run(&mut self) -> Result<&FlowState, ArrayError> {
        self.run_state = RunState::Running;
        for entry in &mut self.entries {
            debug!(step = entry.step.name(), "running forward step");
            match entry.step.forward(&mut self.state).await {
                Ok(()) => {
                    entry.completed = true;
                }
                Err(e) => {
                    error!(step = entry.step.name(), error = %e, "forward step failed");
                    return Err(e);
                }
            }
        }
        self.run_state = RunState::Committed;
        Ok(&self.state)
    }

    /// Unwinds compensators of completed steps in reverse order. Logs and
    /// continues past compensator errors rather than stopping (spec §4.C:
    /// "compensators are best-effort cleanup").
    pub async fn revert(&mut self) {
        for entry in self.entries.iter().rev() {
            if !entry.completed || !entry.step.has_compensator() {
                continue;
            }
            debug!(step = entry.step.name(), "reverting step");
            if let Err(e) = entry.step.compensate(&self.state).await {
                warn!(
                    step = entry.step.name(),
                    error = %e,
                    "compensator failed; continuing revert"
                );
            }
        }
        self.run_state = RunState::Reverted;
    }

    pub fn result(&self) -> &FlowState {
        &self.state
    }
}

impl Default for TaskFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// A closure-backed `Step`, used by the `Transaction` builder below and by
/// orchestrator call sites that don't need a dedicated named type.
pub struct ClosureStep<F, C> {
    name: String,
    forward: F,
    compensate: Option<C>,
}

#[async_trait]
impl<F, Ff, C, Cf> Step for ClosureStep<F, C>
where
    F: Fn(&mut FlowState) -> Ff + Send + Sync,
    Ff: std::future::Future<Output = Result<(), ArrayError>> + Send,
    C: Fn(&FlowState) -> Cf + Send + Sync,
    Cf: std::future::Future<Output = Result<(), ArrayError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn forward(&self, state: &mut FlowState) -> Result<(), ArrayError> {
        (self.forward)(state).await
    }

    async fn compensate(&self, state: &FlowState) -> Result<(), ArrayError> {
        match &self.compensate {
            Some(c) => c(state).await,
            None => Ok(()),
        }
    }

    fn has_compensator(&self) -> bool {
        self.compensate.is_some()
    }
}

/// Stand-alone sibling of `TaskFlow` with a fluent pair-builder, as named in
/// spec §4.C ("A stand-alone sibling type `Transaction`... semantically
/// identical"). Reuses the same `Step` machinery via `ClosureStep`.
pub struct Transaction {
    flow: TaskFlow,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            flow: TaskFlow::new(),
        }
    }

    /// Registers a forward/compensator pair in a single call.
    pub fn step<F, Ff, C, Cf>(mut self, name: impl Into<String>, forward: F, compensate: C) -> Self
    where
        F: Fn(&mut FlowState) -> Ff + Send + Sync + 'static,
        Ff: std::future::Future<Output = Result<(), ArrayError>> + Send + 'static,
        C: Fn(&FlowState) -> Cf + Send + Sync + 'static,
        Cf: std::future::Future<Output = Result<(), ArrayError>> + Send + 'static,
    {
        self.flow.add_step(Box::new(ClosureStep {
            name: name.into(),
            forward,
            compensate: Some(compensate),
        }));
        self
    }

    pub async fn run(&mut self) -> Result<&FlowState, ArrayError> {
        self.flow.run().await
    }

    pub async fn revert(&mut self) {
        self.flow.revert().await
    }

    pub fn result(&self) -> &FlowState {
        self.flow.result()
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct RecordingStep {
        name: &'static str,
        fail: bool,
        forward_log: Arc<std::sync::Mutex<Vec<&'static str>>>,
        compensate_log: Arc<std::sync::Mutex<Vec<&'static str>>>,
        has_compensator: bool,
    }

    #[async_trait]
    impl Step for RecordingStep {
        fn name(&self) -> &str {
            self.name
        }

        async fn forward(&self, state: &mut FlowState) -> Result<(), ArrayError> {
            self.forward_log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(ArrayError::Server {
                    code: 1,
                    op: self.name.into(),
                });
            }
            state.insert(self.name, self.name);
            Ok(())
        }

        async fn compensate(&self, _state: &FlowState) -> Result<(), ArrayError> {
            self.compensate_log.lock().unwrap().push(self.name);
            Ok(())
        }

        fn has_compensator(&self) -> bool {
            self.has_compensator
        }
    }

    #[tokio::test]
    async fn runs_steps_in_order_and_merges_deltas() {
        let forward_log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let compensate_log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut flow = TaskFlow::new();
        for name in ["a", "b", "c"] {
            flow.add_step(Box::new(RecordingStep {
                name,
                fail: false,
                forward_log: forward_log.clone(),
                compensate_log: compensate_log.clone(),
                has_compensator: true,
            }));
        }
        let result = flow.run().await.unwrap();
        assert_eq!(result.get_str("a"), Some("a"));
        assert_eq!(result.get_str("c"), Some("c"));
        assert_eq!(*forward_log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn revert_unwinds_completed_steps_in_reverse_order() {
        let forward_log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let compensate_log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut flow = TaskFlow::new();
        for (name, fail) in [("a", false), ("b", false), ("c", true)] {
            flow.add_step(Box::new(RecordingStep {
                name,
                fail,
                forward_log: forward_log.clone(),
                compensate_log: compensate_log.clone(),
                has_compensator: true,
            }));
        }
        let err = flow.run().await.unwrap_err();
        assert!(matches!(err, ArrayError::Server { .. }));
        flow.revert().await;
        // "c" never completed forward, so its compensator never runs.
        assert_eq!(*compensate_log.lock().unwrap(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn steps_without_compensator_are_skipped_on_revert() {
        let forward_log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let compensate_log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut flow = TaskFlow::new();
        flow.add_step(Box::new(RecordingStep {
            name: "no-revert",
            fail: false,
            forward_log: forward_log.clone(),
            compensate_log: compensate_log.clone(),
            has_compensator: false,
        }));
        flow.add_step(Box::new(RecordingStep {
            name: "boom",
            fail: true,
            forward_log,
            compensate_log: compensate_log.clone(),
            has_compensator: true,
        }));
        let _ = flow.run().await.unwrap_err();
        flow.revert().await;
        assert!(compensate_log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn compensator_error_does_not_block_earlier_compensators() {
        struct FailingCompensate {
            log: Arc<std::sync::Mutex<Vec<&'static str>>>,
        }

        #[async_trait]
        impl Step for FailingCompensate {
            fn name(&self) -> &str {
                "failing"
            }
            async fn forward(&self, _state: &mut FlowState) -> Result<(), ArrayError> {
                Ok(())
            }
            async fn compensate(&self, _state: &FlowState) -> Result<(), ArrayError> {
                self.log.lock().unwrap().push("failing");
                Err(ArrayError::Server {
                    code: 2,
                    op: "compensate".into(),
                })
            }
        }

        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut flow = TaskFlow::new();
        flow.add_step(Box::new(RecordingStep {
            name: "first",
            fail: false,
            forward_log: Arc::new(std::sync::Mutex::new(Vec::new())),
            compensate_log: log.clone(),
            has_compensator: true,
        }));
        flow.add_step(Box::new(FailingCompensate { log: log.clone() }));
        flow.add_step(Box::new(RecordingStep {
            name: "last",
            fail: true,
            forward_log: Arc::new(std::sync::Mutex::new(Vec::new())),
            compensate_log: log.clone(),
            has_compensator: true,
        }));
        let _ = flow.run().await.unwrap_err();
        flow.revert().await;
        assert_eq!(*log.lock().unwrap(), vec!["failing", "first"]);
        let _ = AtomicUsize::new(0); // keep import used across cfg variants
    }

    #[tokio::test]
    async fn transaction_builder_runs_and_reverts() {
        let mut tx = Transaction::new().step(
            "create",
            |state: &mut FlowState| {
                state.insert("id", "abc");
                async { Ok(()) }
            },
            |_state: &FlowState| async { Ok(()) },
        );
        let result = tx.run().await.unwrap();
        assert_eq!(result.get_str("id"), Some("abc"));
    }
}
