//! Per-stage gate state machine.
//!
//! ```text
//! Pending --AutoApprove--> AutoApproved
//! Pending --Escalate-----> AwaitingHuman --HumanApprove--> Approved
//!                                         --HumanReject---> Rejected
//! ```

use super::GateDecision;
use crate::core::{ReviewStatus, StageId};
use crate::errors::GateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a stage's gate currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePhase {
    /// Waiting for a decision.
    #[default]
    Pending,
    /// Score met the threshold.
    AutoApproved,
    /// Escalated; suspended until a human decides.
    AwaitingHuman,
    /// A human approved.
    Approved,
    /// A human rejected.
    Rejected,
}

impl fmt::Display for GatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::AutoApproved => write!(f, "auto_approved"),
            Self::AwaitingHuman => write!(f, "awaiting_human"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Inputs that move a gate between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateSignal {
    /// The decision auto-approved.
    AutoApprove,
    /// The decision escalated.
    Escalate,
    /// The reviewer approved.
    HumanApprove,
    /// The reviewer rejected.
    HumanReject,
}

impl fmt::Display for GateSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoApprove => write!(f, "auto_approve"),
            Self::Escalate => write!(f, "escalate"),
            Self::HumanApprove => write!(f, "human_approve"),
            Self::HumanReject => write!(f, "human_reject"),
        }
    }
}

impl From<GateDecision> for GateSignal {
    fn from(decision: GateDecision) -> Self {
        match decision {
            GateDecision::AutoApprove => Self::AutoApprove,
            GateDecision::Escalate => Self::Escalate,
        }
    }
}

impl GatePhase {
    /// Applies a signal, returning the next phase.
    pub fn apply(self, signal: GateSignal) -> Result<Self, GateError> {
        match (self, signal) {
            (Self::Pending, GateSignal::AutoApprove) => Ok(Self::AutoApproved),
            (Self::Pending, GateSignal::Escalate) => Ok(Self::AwaitingHuman),
            (Self::AwaitingHuman, GateSignal::HumanApprove) => Ok(Self::Approved),
            (Self::AwaitingHuman, GateSignal::HumanReject) => Ok(Self::Rejected),
            (from, signal) => Err(GateError::InvalidTransition { from, signal }),
        }
    }

    /// Returns true if no further signal is accepted.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AutoApproved | Self::Approved | Self::Rejected)
    }

    /// Returns true while the gate waits on a human.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::AwaitingHuman)
    }

    /// Maps the phase onto the status recorded on a stage result.
    #[must_use]
    pub fn review_status(&self) -> ReviewStatus {
        match self {
            Self::Pending | Self::AwaitingHuman => ReviewStatus::PendingReview,
            Self::AutoApproved => ReviewStatus::AutoApproved,
            Self::Approved => ReviewStatus::HumanApproved,
            Self::Rejected => ReviewStatus::Rejected,
        }
    }
}

/// The gate guarding a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageGate {
    stage: StageId,
    phase: GatePhase,
}

impl StageGate {
    /// Creates a gate in the pending phase.
    #[must_use]
    pub fn new(stage: StageId) -> Self {
        Self {
            stage,
            phase: GatePhase::Pending,
        }
    }

    /// Returns the stage this gate guards.
    #[must_use]
    pub fn stage(&self) -> StageId {
        self.stage
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    /// Feeds a signal into the gate.
    pub fn signal(&mut self, signal: GateSignal) -> Result<GatePhase, GateError> {
        self.phase = self.phase.apply(signal)?;
        Ok(self.phase)
    }

    /// Applies the approve-or-escalate decision.
    pub fn apply_decision(&mut self, decision: GateDecision) -> Result<GatePhase, GateError> {
        self.signal(decision.into())
    }

    /// Resolves a suspended gate with a human verdict.
    pub fn resolve(&mut self, approved: bool) -> Result<GatePhase, GateError> {
        self.signal(if approved {
            GateSignal::HumanApprove
        } else {
            GateSignal::HumanReject
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PHASES: [GatePhase; 5] = [
        GatePhase::Pending,
        GatePhase::AutoApproved,
        GatePhase::AwaitingHuman,
        GatePhase::Approved,
        GatePhase::Rejected,
    ];

    const ALL_SIGNALS: [GateSignal; 4] = [
        GateSignal::AutoApprove,
        GateSignal::Escalate,
        GateSignal::HumanApprove,
        GateSignal::HumanReject,
    ];

    #[test]
    fn test_auto_approve_path() {
        let mut gate = StageGate::new(StageId::DiagramValidation);
        assert_eq!(
            gate.apply_decision(GateDecision::AutoApprove).unwrap(),
            GatePhase::AutoApproved
        );
        assert!(gate.phase().is_terminal());
        assert_eq!(gate.phase().review_status(), ReviewStatus::AutoApproved);
    }

    #[test]
    fn test_escalate_then_approve() {
        let mut gate = StageGate::new(StageId::DocumentGeneration);
        gate.apply_decision(GateDecision::Escalate).unwrap();
        assert!(gate.phase().is_suspended());
        assert_eq!(gate.phase().review_status(), ReviewStatus::PendingReview);

        assert_eq!(gate.resolve(true).unwrap(), GatePhase::Approved);
        assert_eq!(gate.phase().review_status(), ReviewStatus::HumanApproved);
    }

    #[test]
    fn test_escalate_then_reject() {
        let mut gate = StageGate::new(StageId::DocumentGeneration);
        gate.apply_decision(GateDecision::Escalate).unwrap();
        assert_eq!(gate.resolve(false).unwrap(), GatePhase::Rejected);
        assert_eq!(gate.phase().review_status(), ReviewStatus::Rejected);
    }

    #[test]
    fn test_human_verdict_requires_escalation() {
        let mut gate = StageGate::new(StageId::ArtifactGeneration);
        let err = gate.resolve(true).unwrap_err();
        assert_eq!(
            err,
            GateError::InvalidTransition {
                from: GatePhase::Pending,
                signal: GateSignal::HumanApprove,
            }
        );
        assert_eq!(gate.phase(), GatePhase::Pending);
    }

    #[test]
    fn test_terminal_phases_accept_nothing() {
        for phase in ALL_PHASES.into_iter().filter(GatePhase::is_terminal) {
            for signal in ALL_SIGNALS {
                assert!(phase.apply(signal).is_err(), "{phase} accepted {signal}");
            }
        }
    }

    #[test]
    fn test_exactly_four_valid_transitions() {
        let valid = ALL_PHASES
            .iter()
            .flat_map(|p| ALL_SIGNALS.iter().map(move |s| p.apply(*s)))
            .filter(Result::is_ok)
            .count();
        assert_eq!(valid, 4);
    }
}
