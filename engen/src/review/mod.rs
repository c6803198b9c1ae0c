//! Human review of escalated stage results.
//!
//! When the gate escalates, the controller builds a [`ReviewRequest`] and
//! suspends on a [`Reviewer`] until it returns a [`ReviewDecision`].
//! [`ReviewDesk`] is the interactive implementation: reviews arrive
//! through its `approve`/`reject` calls from whatever surface the
//! deployment provides.

mod desk;
mod ledger;
mod reviewers;

pub use desk::ReviewDesk;
pub use ledger::{AuditRecord, ReviewAnalytics, ReviewLedger, ReviewerStats, AUDIT_BUCKET};
pub use reviewers::{AutoReviewer, ScriptedReviewer};

use crate::core::{Score, StageId};
use crate::errors::ReviewError;
use crate::stages::StageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A stage result waiting on a human.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// The review session.
    pub session_id: Uuid,
    /// The workflow run.
    pub run_id: Uuid,
    /// The escalated stage.
    pub stage_id: StageId,
    /// The stage output under review.
    pub payload: serde_json::Value,
    /// The score that fell short.
    pub score: Score,
    /// When the session opened.
    pub requested_at: DateTime<Utc>,
}

impl ReviewRequest {
    /// Opens a session for a pending result.
    #[must_use]
    pub fn for_result(run_id: Uuid, result: &StageResult) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            run_id,
            stage_id: result.stage_id,
            payload: result.payload.clone(),
            score: result.score,
            requested_at: Utc::now(),
        }
    }
}

/// A reviewer's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The result may advance.
    Approve,
    /// The run stops here.
    Reject,
}

impl Verdict {
    /// Returns true for [`Verdict::Approve`].
    #[must_use]
    pub fn is_approve(self) -> bool {
        self == Self::Approve
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// What a reviewer decided and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecision {
    /// Approve or reject.
    pub verdict: Verdict,
    /// Who decided.
    pub reviewer_id: String,
    /// Free-form comments.
    #[serde(default)]
    pub comments: String,
}

impl ReviewDecision {
    /// Creates an approval.
    #[must_use]
    pub fn approve(reviewer_id: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Approve,
            reviewer_id: reviewer_id.into(),
            comments: String::new(),
        }
    }

    /// Creates a rejection.
    #[must_use]
    pub fn reject(reviewer_id: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Reject,
            reviewer_id: reviewer_id.into(),
            comments: String::new(),
        }
    }

    /// Attaches comments.
    #[must_use]
    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = comments.into();
        self
    }
}

/// Resolves escalated results.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Waits for a decision on the request.
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewDecision, ReviewError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_builders() {
        let decision = ReviewDecision::reject("ana").with_comments("missing auth layer");
        assert_eq!(decision.verdict, Verdict::Reject);
        assert!(!decision.verdict.is_approve());
        assert_eq!(decision.comments, "missing auth layer");
        assert_eq!(Verdict::Approve.to_string(), "approve");
    }

    #[test]
    fn test_request_copies_result() {
        let result = StageResult::pending(
            StageId::ComponentSpecification,
            serde_json::json!({"components": ["api"]}),
            Score::new(61.0).unwrap(),
            Utc::now(),
        );
        let run_id = Uuid::new_v4();
        let request = ReviewRequest::for_result(run_id, &result);
        assert_eq!(request.run_id, run_id);
        assert_eq!(request.stage_id, StageId::ComponentSpecification);
        assert_eq!(request.score.value(), 61.0);
        assert_eq!(request.payload, result.payload);
    }

    #[tokio::test]
    async fn test_mock_reviewer() {
        let mut reviewer = MockReviewer::new();
        reviewer
            .expect_review()
            .times(1)
            .returning(|_| Err(ReviewError::TimedOut));
        let result = StageResult::pending(
            StageId::DocumentGeneration,
            serde_json::Value::Null,
            Score::new(10.0).unwrap(),
            Utc::now(),
        );
        let request = ReviewRequest::for_result(Uuid::new_v4(), &result);
        assert_eq!(reviewer.review(&request).await, Err(ReviewError::TimedOut));
    }
}
