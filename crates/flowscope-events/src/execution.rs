//! Execution identity and the run model behind it.
//!
//! A [`FlowExecution`] is the identity of one running pipeline instance. The
//! engine owns its lifecycle; this crate only observes it and attaches
//! ephemeral metadata, so equality and hashing are by identity (the shared
//! allocation), and [`WeakExecution`] handles never keep an execution alive.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, Weak};

use flowscope_types::Result;

use crate::graph::{FlowGraph, FlowNode};

// ---------------------------------------------------------------------------
// Run model
// ---------------------------------------------------------------------------

/// A handle to the run backing an execution: job identity plus the
/// engine-held pending-input state used for pause detection.
///
/// Cloning yields another handle to the **same** run.
#[derive(Clone)]
pub struct RunHandle {
    inner: Arc<RunInner>,
}

struct RunInner {
    job_name: String,
    run_id: String,
    /// Id of the step node currently awaiting external input, if any.
    pending_input: Mutex<Option<String>>,
}

impl RunHandle {
    pub fn new(job_name: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RunInner {
                job_name: job_name.into(),
                run_id: run_id.into(),
                pending_input: Mutex::new(None),
            }),
        }
    }

    /// The job's full name, e.g. `"folder/project"`.
    pub fn job_name(&self) -> &str {
        &self.inner.job_name
    }

    pub fn run_id(&self) -> &str {
        &self.inner.run_id
    }

    /// Mark a step node as awaiting external input.
    pub fn set_pending_input(&self, node_id: impl Into<String>) {
        *lock(&self.inner.pending_input) = Some(node_id.into());
    }

    /// Clear the pending-input state (the step received its input).
    pub fn clear_pending_input(&self) {
        *lock(&self.inner.pending_input) = None;
    }

    /// True iff `node_id` matches the run's currently pending input step.
    pub fn is_paused_for_input(&self, node_id: &str) -> bool {
        lock(&self.inner.pending_input).as_deref() == Some(node_id)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What an execution's owner resolves to.
#[derive(Clone)]
pub enum Executable {
    Run(RunHandle),
    /// A non-run executable. Expected for some executions and not an error;
    /// run-identity fields are simply omitted from messages.
    Other,
}

/// Seam to the engine: resolves the executable backing an execution. The
/// resolution may involve engine I/O and is allowed to fail.
pub trait ExecutionOwner: Send + Sync {
    fn executable(&self) -> Result<Executable>;
}

impl ExecutionOwner for RunHandle {
    fn executable(&self) -> Result<Executable> {
        Ok(Executable::Run(self.clone()))
    }
}

// ---------------------------------------------------------------------------
// FlowExecution
// ---------------------------------------------------------------------------

/// Identity handle for one running pipeline instance. Holds the observed
/// flow graph and the owner used for run resolution.
///
/// Cloning yields another handle to the **same** execution.
#[derive(Clone)]
pub struct FlowExecution {
    inner: Arc<ExecutionInner>,
}

struct ExecutionInner {
    graph: RwLock<FlowGraph>,
    owner: Box<dyn ExecutionOwner>,
}

impl FlowExecution {
    pub fn new(owner: impl ExecutionOwner + 'static) -> Self {
        Self {
            inner: Arc::new(ExecutionInner {
                graph: RwLock::new(FlowGraph::new()),
                owner: Box::new(owner),
            }),
        }
    }

    /// Convenience constructor for an execution backed directly by a run.
    pub fn for_run(run: RunHandle) -> Self {
        Self::new(run)
    }

    /// Stable identity token, usable as a map key.
    pub fn id(&self) -> ExecutionId {
        ExecutionId(Arc::as_ptr(&self.inner) as usize)
    }

    /// Resolve the executable backing this execution via the owner.
    pub fn executable(&self) -> Result<Executable> {
        self.inner.owner.executable()
    }

    /// Read access to the flow graph. The guard covers a whole context walk,
    /// so concurrent appends elsewhere never tear a resolution.
    pub fn graph(&self) -> RwLockReadGuard<'_, FlowGraph> {
        self.inner
            .graph
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a newly appended node, as reported by the engine.
    pub fn append_node(&self, node: FlowNode) {
        self.inner
            .graph
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .append(node);
    }

    /// A handle that does not keep this execution alive.
    pub fn downgrade(&self) -> WeakExecution {
        WeakExecution(Arc::downgrade(&self.inner))
    }
}

impl PartialEq for FlowExecution {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for FlowExecution {}

impl fmt::Debug for FlowExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowExecution")
            .field("id", &self.id())
            .finish()
    }
}

impl Hash for FlowExecution {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

/// Identity token for a [`FlowExecution`]. Only meaningful while the
/// execution is alive; see [`WeakExecution`] for liveness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionId(usize);

/// Non-owning handle to a [`FlowExecution`].
#[derive(Clone)]
pub struct WeakExecution(Weak<ExecutionInner>);

impl WeakExecution {
    pub fn upgrade(&self) -> Option<FlowExecution> {
        self.0.upgrade().map(|inner| FlowExecution { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use flowscope_types::FlowscopeError;

    #[test]
    fn clones_share_identity() {
        let exec = FlowExecution::for_run(RunHandle::new("proj", "1"));
        let other = exec.clone();
        assert_eq!(exec, other);
        assert_eq!(exec.id(), other.id());
    }

    #[test]
    fn distinct_executions_differ() {
        let a = FlowExecution::for_run(RunHandle::new("proj", "1"));
        let b = FlowExecution::for_run(RunHandle::new("proj", "1"));
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn run_owner_resolves_to_run() {
        let exec = FlowExecution::for_run(RunHandle::new("folder/proj", "42"));
        match exec.executable().unwrap() {
            Executable::Run(run) => {
                assert_eq!(run.job_name(), "folder/proj");
                assert_eq!(run.run_id(), "42");
            }
            Executable::Other => panic!("expected a run"),
        }
    }

    #[test]
    fn failing_owner_surfaces_error() {
        struct BrokenOwner;
        impl ExecutionOwner for BrokenOwner {
            fn executable(&self) -> Result<Executable> {
                Err(FlowscopeError::RunResolve("engine unavailable".into()))
            }
        }

        let exec = FlowExecution::new(BrokenOwner);
        assert!(exec.executable().is_err());
    }

    #[test]
    fn pending_input_round_trip() {
        let run = RunHandle::new("proj", "1");
        assert!(!run.is_paused_for_input("7"));

        run.set_pending_input("7");
        assert!(run.is_paused_for_input("7"));
        assert!(!run.is_paused_for_input("8"));

        run.clear_pending_input();
        assert!(!run.is_paused_for_input("7"));
    }

    #[test]
    fn cloned_run_shares_pending_input_state() {
        let run = RunHandle::new("proj", "1");
        let other = run.clone();
        other.set_pending_input("3");
        assert!(run.is_paused_for_input("3"));
    }

    #[test]
    fn weak_handle_does_not_keep_execution_alive() {
        let exec = FlowExecution::for_run(RunHandle::new("proj", "1"));
        let weak = exec.downgrade();
        assert!(weak.is_alive());
        assert!(weak.upgrade().is_some());

        drop(exec);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn append_node_is_visible_through_graph() {
        let exec = FlowExecution::for_run(RunHandle::new("proj", "1"));
        exec.append_node(FlowNode::new("2", "Build", NodeKind::StageMarker));

        let graph = exec.graph();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.node("2").unwrap().display_name, "Build");
    }
}
