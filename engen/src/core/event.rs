//! Workflow event type for lifecycle and gate events.

use super::{ReviewStatus, Score, StageId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// An event emitted while a workflow runs.
///
/// Events are consumed by event sinks for logging, monitoring, or
/// building an audit view of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    /// The event type (e.g., "gate.escalated").
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred (ISO 8601).
    pub timestamp: String,

    /// The event payload data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl WorkflowEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: crate::utils::iso_timestamp(),
            data: HashMap::new(),
        }
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns the data as a JSON object.
    #[must_use]
    pub fn data_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.data.clone().into_iter().collect())
    }

    fn for_stage(event_type: &str, run_id: Uuid, stage: StageId) -> Self {
        Self::new(event_type)
            .add_data("run_id", serde_json::json!(run_id.to_string()))
            .add_data("stage", serde_json::json!(stage.as_str()))
            .add_data("stage_id", serde_json::json!(stage.ordinal()))
    }

    /// Creates a "workflow.started" event.
    #[must_use]
    pub fn workflow_started(run_id: Uuid) -> Self {
        Self::new("workflow.started").add_data("run_id", serde_json::json!(run_id.to_string()))
    }

    /// Creates a "workflow.completed" event.
    #[must_use]
    pub fn workflow_completed(run_id: Uuid, duration_ms: f64) -> Self {
        Self::new("workflow.completed")
            .add_data("run_id", serde_json::json!(run_id.to_string()))
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates a "workflow.halted" event.
    #[must_use]
    pub fn workflow_halted(run_id: Uuid, stage: StageId, reason: &str) -> Self {
        Self::for_stage("workflow.halted", run_id, stage)
            .add_data("reason", serde_json::json!(reason))
    }

    /// Creates a "stage.started" event.
    #[must_use]
    pub fn stage_started(run_id: Uuid, stage: StageId) -> Self {
        Self::for_stage("stage.started", run_id, stage)
    }

    /// Creates a "stage.processed" event.
    #[must_use]
    pub fn stage_processed(run_id: Uuid, stage: StageId, score: Score, duration_ms: f64) -> Self {
        Self::for_stage("stage.processed", run_id, stage)
            .add_data("score", serde_json::json!(score.value()))
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates a "stage.failed" event.
    #[must_use]
    pub fn stage_failed(run_id: Uuid, stage: StageId, error: &str) -> Self {
        Self::for_stage("stage.failed", run_id, stage).add_data("error", serde_json::json!(error))
    }

    /// Creates a "stage.committed" event.
    #[must_use]
    pub fn stage_committed(run_id: Uuid, stage: StageId, status: ReviewStatus) -> Self {
        Self::for_stage("stage.committed", run_id, stage)
            .add_data("status", serde_json::json!(status.to_string()))
    }

    /// Creates a "gate.auto_approved" event.
    #[must_use]
    pub fn gate_auto_approved(
        run_id: Uuid,
        stage: StageId,
        score: Score,
        threshold: Score,
    ) -> Self {
        Self::for_stage("gate.auto_approved", run_id, stage)
            .add_data("score", serde_json::json!(score.value()))
            .add_data("threshold", serde_json::json!(threshold.value()))
    }

    /// Creates a "gate.escalated" event.
    #[must_use]
    pub fn gate_escalated(
        run_id: Uuid,
        stage: StageId,
        score: Score,
        threshold: Score,
        session_id: Uuid,
    ) -> Self {
        Self::for_stage("gate.escalated", run_id, stage)
            .add_data("score", serde_json::json!(score.value()))
            .add_data("threshold", serde_json::json!(threshold.value()))
            .add_data("session_id", serde_json::json!(session_id.to_string()))
    }

    /// Creates a "review.approved" or "review.rejected" event.
    #[must_use]
    pub fn review_resolved(
        run_id: Uuid,
        stage: StageId,
        approved: bool,
        reviewer_id: &str,
    ) -> Self {
        let event_type = if approved {
            "review.approved"
        } else {
            "review.rejected"
        };
        Self::for_stage(event_type, run_id, stage)
            .add_data("reviewer_id", serde_json::json!(reviewer_id))
    }
}
