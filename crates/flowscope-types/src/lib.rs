//! Shared types, errors, and the event message model for Flowscope.
//!
//! This crate provides the foundational types used by the event-derivation
//! core:
//! - `FlowscopeError` — unified error taxonomy
//! - `Message` — the outbound bus record (channel + event + properties)
//! - `PipelineEvent` / `JobEvent` / `EventProp` — the wire-name contract

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unified error type for all Flowscope subsystems.
#[derive(Debug, thiserror::Error)]
pub enum FlowscopeError {
    #[error("failed to publish to channel '{channel}': {message}")]
    Publish { channel: String, message: String },

    #[error("failed to resolve the executable backing an execution: {0}")]
    RunResolve(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// A convenience alias for `Result<T, FlowscopeError>`.
pub type Result<T> = std::result::Result<T, FlowscopeError>;

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Channel carrying pipeline lifecycle events derived from the flow graph.
pub const PIPELINE_EVENT_CHANNEL: &str = "pipeline";

/// Channel carrying run-level lifecycle events (owned by the job-lifecycle
/// subsystem; Flowscope only publishes pause/unpause notifications onto it).
pub const JOB_CHANNEL: &str = "job";

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Events published on [`PIPELINE_EVENT_CHANNEL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEvent {
    PipelineStart,
    PipelineStage,
    PipelineBlockStart,
    PipelineStep,
    PipelineBlockEnd,
    PipelineEnd,
}

impl PipelineEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineEvent::PipelineStart => "pipeline_start",
            PipelineEvent::PipelineStage => "pipeline_stage",
            PipelineEvent::PipelineBlockStart => "pipeline_block_start",
            PipelineEvent::PipelineStep => "pipeline_step",
            PipelineEvent::PipelineBlockEnd => "pipeline_block_end",
            PipelineEvent::PipelineEnd => "pipeline_end",
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events published on [`JOB_CHANNEL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEvent {
    JobRunPaused,
    JobRunUnpaused,
}

impl JobEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobEvent::JobRunPaused => "job_run_paused",
            JobEvent::JobRunUnpaused => "job_run_unpaused",
        }
    }
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Property keys
// ---------------------------------------------------------------------------

/// The fixed property-key set for pipeline event messages. A key that is
/// absent from a message means "not applicable", never the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventProp {
    PipelineJobName,
    PipelineRunId,
    PipelineStepFlownodeId,
    PipelineContext,
    PipelineStepStageName,
    PipelineStepStageId,
    PipelineStepName,
    PipelineStepIsPaused,
}

impl EventProp {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventProp::PipelineJobName => "pipeline_job_name",
            EventProp::PipelineRunId => "pipeline_run_id",
            EventProp::PipelineStepFlownodeId => "pipeline_step_flownode_id",
            EventProp::PipelineContext => "pipeline_context",
            EventProp::PipelineStepStageName => "pipeline_step_stage_name",
            EventProp::PipelineStepStageId => "pipeline_step_stage_id",
            EventProp::PipelineStepName => "pipeline_step_name",
            EventProp::PipelineStepIsPaused => "pipeline_step_is_paused",
        }
    }
}

impl fmt::Display for EventProp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// An outbound bus record: channel name, event name, and a string property
/// map, stamped with a unique event id and a publish timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub channel: String,
    pub event: String,
    pub event_uuid: uuid::Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    props: BTreeMap<String, String>,
}

impl Message {
    /// Create a message with a fresh event id and the current timestamp.
    pub fn new(channel: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            event: event.into(),
            event_uuid: uuid::Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            props: BTreeMap::new(),
        }
    }

    /// Create a message addressed to the pipeline event channel.
    pub fn pipeline(event: PipelineEvent) -> Self {
        Self::new(PIPELINE_EVENT_CHANNEL, event.as_str())
    }

    /// Create a message addressed to the job lifecycle channel.
    pub fn job(event: JobEvent) -> Self {
        Self::new(JOB_CHANNEL, event.as_str())
    }

    /// Set a property, builder style.
    pub fn set(mut self, key: EventProp, value: impl Into<String>) -> Self {
        self.props.insert(key.as_str().to_string(), value.into());
        self
    }

    /// Read a property. `None` means the property is not applicable.
    pub fn get(&self, key: EventProp) -> Option<&str> {
        self.props.get(key.as_str()).map(String::as_str)
    }

    /// All properties set on this message.
    pub fn props(&self) -> &BTreeMap<String, String> {
        &self.props
    }
}
