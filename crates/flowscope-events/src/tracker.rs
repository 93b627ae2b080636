//! Per-execution stage context with weak retention.
//!
//! The tracker is the only shared mutable state in the core: a process-wide
//! side table from execution identity to the most recently observed stage
//! marker's name and id. Entries hold a [`WeakExecution`], so the table never
//! keeps an execution alive; dead entries are pruned on mutation and treated
//! as absent on lookup.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::execution::{ExecutionId, FlowExecution, WeakExecution};

pub struct StageTracker {
    entries: Mutex<HashMap<ExecutionId, StageEntry>>,
}

struct StageEntry {
    execution: WeakExecution,
    name: String,
    id: String,
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record the stage marker just observed for `execution`, overwriting any
    /// previous stage.
    pub fn record(&self, execution: &FlowExecution, name: impl Into<String>, id: impl Into<String>) {
        let mut entries = self.lock();
        entries.retain(|_, entry| entry.execution.is_alive());
        entries.insert(
            execution.id(),
            StageEntry {
                execution: execution.downgrade(),
                name: name.into(),
                id: id.into(),
            },
        );
    }

    /// Display name of the current stage, or `None` if no stage marker has
    /// been observed for this execution.
    pub fn current_name(&self, execution: &FlowExecution) -> Option<String> {
        self.lookup(execution, |entry| entry.name.clone())
    }

    /// Node id of the current stage marker.
    pub fn current_id(&self, execution: &FlowExecution) -> Option<String> {
        self.lookup(execution, |entry| entry.id.clone())
    }

    /// Number of live executions with a recorded stage. Diagnostic only.
    pub fn tracked(&self) -> usize {
        self.lock()
            .values()
            .filter(|entry| entry.execution.is_alive())
            .count()
    }

    fn lookup<T>(&self, execution: &FlowExecution, read: impl FnOnce(&StageEntry) -> T) -> Option<T> {
        let entries = self.lock();
        let entry = entries.get(&execution.id())?;
        // An ExecutionId can be reused after its execution dies. The entry
        // must still refer to this exact execution to count.
        match entry.execution.upgrade() {
            Some(live) if live == *execution => Some(read(entry)),
            _ => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ExecutionId, StageEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::RunHandle;
    use std::sync::Arc;

    fn execution() -> FlowExecution {
        FlowExecution::for_run(RunHandle::new("proj", "1"))
    }

    #[test]
    fn absent_until_first_stage() {
        let tracker = StageTracker::new();
        let exec = execution();
        assert_eq!(tracker.current_name(&exec), None);
        assert_eq!(tracker.current_id(&exec), None);
    }

    #[test]
    fn record_and_read_back() {
        let tracker = StageTracker::new();
        let exec = execution();

        tracker.record(&exec, "Build", "2");
        assert_eq!(tracker.current_name(&exec), Some("Build".into()));
        assert_eq!(tracker.current_id(&exec), Some("2".into()));
    }

    #[test]
    fn later_stage_overwrites_earlier() {
        let tracker = StageTracker::new();
        let exec = execution();

        tracker.record(&exec, "Build", "2");
        tracker.record(&exec, "Deploy", "9");
        assert_eq!(tracker.current_name(&exec), Some("Deploy".into()));
        assert_eq!(tracker.current_id(&exec), Some("9".into()));
    }

    #[test]
    fn executions_do_not_cross_contaminate() {
        let tracker = StageTracker::new();
        let a = execution();
        let b = execution();

        tracker.record(&a, "Build", "2");
        assert_eq!(tracker.current_name(&b), None);

        tracker.record(&b, "Test", "7");
        assert_eq!(tracker.current_name(&a), Some("Build".into()));
        assert_eq!(tracker.current_name(&b), Some("Test".into()));
    }

    #[test]
    fn entry_dies_with_its_execution() {
        let tracker = StageTracker::new();
        let a = execution();
        let b = execution();

        tracker.record(&a, "Build", "2");
        tracker.record(&b, "Build", "2");
        assert_eq!(tracker.tracked(), 2);

        drop(a);
        assert_eq!(tracker.tracked(), 1);

        // The next mutation prunes the dead entry from the table.
        tracker.record(&b, "Deploy", "9");
        assert_eq!(tracker.tracked(), 1);
    }

    #[test]
    fn concurrent_access_from_multiple_threads() {
        let tracker = Arc::new(StageTracker::new());
        let a = execution();
        let b = execution();

        let mut handles = Vec::new();
        for (exec, name, id) in [(a.clone(), "StageA", "1"), (b.clone(), "StageB", "2")] {
            let tracker = Arc::clone(&tracker);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1_000 {
                    tracker.record(&exec, name, id);
                    assert_eq!(tracker.current_name(&exec), Some(name.into()));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.current_id(&a), Some("1".into()));
        assert_eq!(tracker.current_id(&b), Some("2".into()));
    }
}
