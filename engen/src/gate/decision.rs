//! The approve-or-escalate decision.

use crate::core::Score;
use crate::errors::GateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of comparing a score against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// The score met the threshold; advance without review.
    AutoApprove,
    /// The score fell short; a human must decide.
    Escalate,
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoApprove => write!(f, "auto_approve"),
            Self::Escalate => write!(f, "escalate"),
        }
    }
}

/// Decides whether a stage result advances on its own.
///
/// `score >= threshold` auto-approves; the boundary is inclusive.
#[must_use]
pub fn decide(score: Score, threshold: Score) -> GateDecision {
    if score >= threshold {
        GateDecision::AutoApprove
    } else {
        GateDecision::Escalate
    }
}

/// Validates raw numbers and then decides.
pub fn decide_raw(score: f64, threshold: f64) -> Result<GateDecision, GateError> {
    Ok(decide(Score::new(score)?, Score::new(threshold)?))
}
