//! The event classifier and emitter.
//!
//! Listens to raw graph-mutation notifications from running executions,
//! classifies each newly appended node, reconstructs its structural context
//! via the resolver and the stage tracker, and publishes a normalized message
//! to the bus. Publishing is best-effort: a failure is logged and dropped,
//! and never propagates back into the engine.

use std::sync::Arc;

use tracing::{error, warn};

use flowscope_types::{EventProp, JobEvent, Message, PipelineEvent};

use crate::bus::MessageBus;
use crate::execution::{Executable, FlowExecution, RunHandle};
use crate::graph::{FlowNode, NodeKind};
use crate::resolver::{branch_for, to_path};
use crate::tracker::StageTracker;

// ---------------------------------------------------------------------------
// Engine-facing listener seams
// ---------------------------------------------------------------------------

/// Receives a notification for every node the engine appends to an
/// execution's flow graph.
pub trait GraphListener: Send + Sync {
    fn on_new_head(&self, execution: &FlowExecution, node_id: &str);
}

/// Receives a notification when an execution starts running.
pub trait ExecutionListener: Send + Sync {
    fn on_running(&self, execution: &FlowExecution);
}

/// Receives a notification when a paused-for-input step gets its input and
/// continues.
pub trait InputStepListener: Send + Sync {
    fn on_step_resumed(&self, run: &RunHandle);
}

// ---------------------------------------------------------------------------
// PipelineEventListener
// ---------------------------------------------------------------------------

/// The primary listener: classifies flow nodes and publishes pipeline
/// lifecycle events.
pub struct PipelineEventListener {
    tracker: StageTracker,
    bus: Arc<dyn MessageBus>,
}

impl PipelineEventListener {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self {
            tracker: StageTracker::new(),
            bus,
        }
    }

    /// The run backing `execution`, if it has one. Resolution failures are
    /// tolerated: identity fields are simply omitted downstream.
    fn run_for(execution: &FlowExecution) -> Option<RunHandle> {
        match execution.executable() {
            Ok(Executable::Run(run)) => Some(run),
            Ok(Executable::Other) => None,
            Err(err) => {
                warn!(%err, "could not resolve the executable backing an execution");
                None
            }
        }
    }

    /// An execution-level message: event name plus run identity only.
    fn execution_message(&self, event: PipelineEvent, execution: &FlowExecution) -> Message {
        let mut message = Message::pipeline(event);
        if let Some(run) = Self::run_for(execution) {
            message = message
                .set(EventProp::PipelineJobName, run.job_name())
                .set(EventProp::PipelineRunId, run.run_id());
        }
        message
    }

    /// A node-derived message: execution-level fields plus node id, context
    /// path, current stage, step name, and (for atomic steps) pause state.
    fn node_message(
        &self,
        event: PipelineEvent,
        execution: &FlowExecution,
        node: &FlowNode,
        branch: &[String],
    ) -> Message {
        let mut message = self
            .execution_message(event, execution)
            .set(EventProp::PipelineStepFlownodeId, &node.id)
            .set(EventProp::PipelineContext, to_path(branch));

        if let Some(name) = self.tracker.current_name(execution) {
            message = message.set(EventProp::PipelineStepStageName, name);
        }
        if let Some(id) = self.tracker.current_id(execution) {
            message = message.set(EventProp::PipelineStepStageId, id);
        }
        if let Some(function) = &node.step_function {
            message = message.set(EventProp::PipelineStepName, function);
        }

        if matches!(node.kind, NodeKind::AtomicStep) {
            if let Some(run) = Self::run_for(execution) {
                let paused = run.is_paused_for_input(&node.id);
                if paused {
                    // Run-level pause notification, independent of the
                    // primary event's own flag.
                    self.publish_job_event(JobEvent::JobRunPaused, &run);
                }
                message = message.set(EventProp::PipelineStepIsPaused, paused.to_string());
            }
        }
        message
    }

    fn publish_event(&self, message: Message) {
        if let Err(err) = self.bus.publish(message) {
            error!(%err, "unexpected error publishing pipeline flow-node event");
        }
    }

    fn publish_job_event(&self, event: JobEvent, run: &RunHandle) {
        let message = Message::job(event)
            .set(EventProp::PipelineJobName, run.job_name())
            .set(EventProp::PipelineRunId, run.run_id());
        if let Err(err) = self.bus.publish(message) {
            warn!(%err, event = event.as_str(), "error publishing run lifecycle event");
        }
    }
}

impl GraphListener for PipelineEventListener {
    fn on_new_head(&self, execution: &FlowExecution, node_id: &str) {
        let graph = execution.graph();
        let Some(node) = graph.node(node_id) else {
            warn!(node_id, "notified about a node missing from the execution graph");
            return;
        };

        match &node.kind {
            NodeKind::StageMarker => {
                let branch = branch_for(&graph, node);
                // Recorded before the message is built, so the stage event
                // carries its own stage name and id.
                self.tracker.record(execution, &node.display_name, &node.id);
                self.publish_event(self.node_message(
                    PipelineEvent::PipelineStage,
                    execution,
                    node,
                    &branch,
                ));
            }
            NodeKind::BlockStart { body_invocation } => {
                if *body_invocation {
                    let mut branch = branch_for(&graph, node);
                    branch.push(node.id.clone());
                    self.publish_event(self.node_message(
                        PipelineEvent::PipelineBlockStart,
                        execution,
                        node,
                        &branch,
                    ));
                }
            }
            NodeKind::AtomicStep => {
                let branch = branch_for(&graph, node);
                self.publish_event(self.node_message(
                    PipelineEvent::PipelineStep,
                    execution,
                    node,
                    &branch,
                ));
            }
            NodeKind::BlockEnd {
                start_id,
                body_invocation,
            } => {
                if *body_invocation {
                    let Some(start) = graph.node(start_id) else {
                        warn!(
                            node_id = %node.id,
                            start_id = %start_id,
                            "block end without a matching start node"
                        );
                        return;
                    };
                    // A block end's context is its start node's path with the
                    // start's own id as the innermost element.
                    let mut branch = branch_for(&graph, start);
                    branch.push(start.id.clone());
                    self.publish_event(self.node_message(
                        PipelineEvent::PipelineBlockEnd,
                        execution,
                        node,
                        &branch,
                    ));
                }
            }
            NodeKind::FlowEnd => {
                self.publish_event(self.execution_message(PipelineEvent::PipelineEnd, execution));
            }
        }
    }
}

impl ExecutionListener for PipelineEventListener {
    fn on_running(&self, execution: &FlowExecution) {
        self.publish_event(self.execution_message(PipelineEvent::PipelineStart, execution));
    }
}

impl InputStepListener for PipelineEventListener {
    fn on_step_resumed(&self, run: &RunHandle) {
        self.publish_job_event(JobEvent::JobRunUnpaused, run);
    }
}
