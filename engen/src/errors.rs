//! Error types for the engen workflow.
//!
//! Rejection by a reviewer is a workflow outcome, not an error. The types
//! here cover everything that stops a run without a verdict: invalid
//! inputs, broken gate invariants, processor and service failures, and
//! review sessions that never resolve.

use crate::core::StageId;
use crate::gate::{GatePhase, GateSignal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for engen operations.
#[derive(Debug, Error)]
pub enum EngenError {
    /// The workflow was assembled incorrectly.
    #[error("{0}")]
    Validation(#[from] WorkflowValidationError),

    /// A gate invariant was violated.
    #[error("{0}")]
    Gate(#[from] GateError),

    /// A stage processor failed.
    #[error("{0}")]
    Processor(#[from] ProcessorError),

    /// A review session did not produce a decision.
    #[error("{0}")]
    Review(#[from] ReviewError),

    /// An external service handle failed.
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// Configuration could not be loaded or is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by the gate decision and the per-stage state machine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GateError {
    /// A score or threshold fell outside 0..=100 or was not a number.
    #[error("Invalid score {0}: must be within 0..=100")]
    InvalidScore(f64),

    /// A stage ordinal outside 1..=5.
    #[error("Invalid stage ordinal {0}: must be within 1..=5")]
    InvalidStage(u8),

    /// A stage name that does not belong to the pipeline.
    #[error("Unknown stage name '{0}'")]
    UnknownStage(String),

    /// The gate phase does not accept the signal.
    #[error("Invalid gate transition: {signal} while {from}")]
    InvalidTransition {
        /// The phase the gate was in.
        from: GatePhase,
        /// The rejected signal.
        signal: GateSignal,
    },

    /// The stage result has already left pending review.
    #[error("Result for stage {stage} is sealed")]
    ResultSealed {
        /// The sealed stage.
        stage: StageId,
    },

    /// A slot was written out of order.
    #[error("Out-of-order commit: expected stage {expected}, got {got}")]
    OutOfOrder {
        /// The stage the workflow is positioned at.
        expected: StageId,
        /// The stage that was offered.
        got: StageId,
    },

    /// The predecessor stage has not been approved.
    #[error("Stage {stage} cannot run: predecessor is not approved")]
    PredecessorNotApproved {
        /// The stage that attempted to run.
        stage: StageId,
    },

    /// A pending result was offered for commit.
    #[error("Stage {stage} result is still pending review")]
    StillPending {
        /// The unresolved stage.
        stage: StageId,
    },

    /// The workflow has been halted or completed; no more commits.
    #[error("Workflow is no longer running")]
    WorkflowClosed,
}

/// Error raised when a workflow is assembled incorrectly.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct WorkflowValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<StageId>,
}

impl WorkflowValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<StageId>) -> Self {
        self.stages = stages;
        self
    }
}

/// Error raised when a stage processor cannot produce output.
#[derive(Debug, Clone, Error)]
#[error("Stage {stage} failed: {message}")]
pub struct ProcessorError {
    /// The stage that failed.
    pub stage: StageId,
    /// What went wrong.
    pub message: String,
}

impl ProcessorError {
    /// Creates a new processor error.
    #[must_use]
    pub fn new(stage: StageId, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    /// Wraps a service failure that happened during processing.
    #[must_use]
    pub fn from_service(stage: StageId, err: &ServiceError) -> Self {
        Self::new(stage, err.to_string())
    }
}

/// Errors from the human review seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ReviewError {
    /// No decision arrived before the configured timeout.
    #[error("Review timed out")]
    TimedOut,

    /// The session was cancelled before a decision arrived.
    #[error("Review cancelled")]
    Cancelled,

    /// The session id is not pending.
    #[error("Unknown review session")]
    UnknownSession,
}

/// Broad category of a [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceErrorKind {
    /// The backend failed.
    #[default]
    Failed,
    /// The requested key does not exist.
    NotFound,
}

/// Error raised by an external service handle.
#[derive(Debug, Clone, Error)]
#[error("Service '{service}' error: {message}")]
pub struct ServiceError {
    /// Name of the service (e.g. "object_store").
    pub service: String,
    /// The error message.
    pub message: String,
    /// What went wrong.
    pub kind: ServiceErrorKind,
}

impl ServiceError {
    /// Creates a new service error.
    #[must_use]
    pub fn new(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            message: message.into(),
            kind: ServiceErrorKind::Failed,
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(service: impl Into<String>, key: &str) -> Self {
        Self {
            kind: ServiceErrorKind::NotFound,
            ..Self::new(service, format!("'{key}' not found"))
        }
    }

    /// Returns true if the key does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ServiceErrorKind::NotFound
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config document could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("Failed to parse {field}: {error}")]
    Env {
        /// The variable name.
        field: String,
        /// The parse failure.
        error: String,
    },

    /// A value is out of range or refers to an unknown stage.
    #[error("Configuration validation failed: {0}")]
    Invalid(String),
}

impl From<GateError> for ConfigError {
    fn from(err: GateError) -> Self {
        Self::Invalid(err.to_string())
    }
}

impl EngenError {
    /// Converts to a dictionary representation for event payloads.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let kind = match self {
            Self::Validation(_) => "validation",
            Self::Gate(_) => "gate",
            Self::Processor(_) => "processor",
            Self::Review(_) => "review",
            Self::Service(_) => "service",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
        };
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(kind));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Self::Processor(err) = self {
            map.insert("stage".to_string(), serde_json::json!(err.stage.ordinal()));
        }
        map
    }
}
