//! Execution-graph observation for pipeline runs.
//!
//! This crate watches the append-only flow graph of a running pipeline and
//! publishes a normalized stream of lifecycle events (start/stage/step/
//! block/end, pause/resume) to a message bus, so consumers can react to
//! progress without polling or re-parsing the graph:
//! - classification of each appended node into a semantic event,
//! - structural context reconstruction (enclosing block path, current stage),
//! - best-effort publishing that never destabilizes the engine.

pub mod bus;
pub mod execution;
pub mod graph;
pub mod listener;
pub mod resolver;
pub mod tracker;

pub use bus::{BroadcastBus, MessageBus};
pub use execution::{
    Executable, ExecutionId, ExecutionOwner, FlowExecution, RunHandle, WeakExecution,
};
pub use graph::{FlowGraph, FlowNode, NodeKind};
pub use listener::{ExecutionListener, GraphListener, InputStepListener, PipelineEventListener};
pub use resolver::{branch_for, enclosing_block, to_path};
pub use tracker::StageTracker;
