//! Review status of a stage result and run status of a workflow.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The review status of a stage result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Result produced, gate not yet resolved.
    #[default]
    PendingReview,
    /// Score met the threshold.
    AutoApproved,
    /// A human reviewer approved the result.
    HumanApproved,
    /// A human reviewer rejected the result.
    Rejected,
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingReview => write!(f, "pending_review"),
            Self::AutoApproved => write!(f, "auto_approved"),
            Self::HumanApproved => write!(f, "human_approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl ReviewStatus {
    /// Returns true once the status has left pending review.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        !matches!(self, Self::PendingReview)
    }

    /// Returns true if the next stage may run.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::AutoApproved | Self::HumanApproved)
    }

    /// Returns true if the workflow must halt.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

/// The status of a whole workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Stages remain to be processed.
    #[default]
    Running,
    /// All five stages were approved.
    Completed,
    /// A stage was rejected or the run aborted.
    Halted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Halted => write!(f, "halted"),
        }
    }
}

impl RunStatus {
    /// Returns true if the run can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Halted)
    }
}
