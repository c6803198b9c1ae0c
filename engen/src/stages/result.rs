//! The recorded result of one stage.

use crate::core::{ReviewStatus, Score, StageId};
use crate::errors::GateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who resolved an escalated result, and what they said.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewNote {
    /// The review session.
    pub session_id: Uuid,
    /// The reviewer.
    pub reviewer_id: String,
    /// Free-form comments.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comments: String,
}

/// Output of a stage plus the gate's verdict on it.
///
/// Created in [`ReviewStatus::PendingReview`]. The status changes exactly
/// once, through [`StageResult::seal`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Which stage produced the result.
    pub stage_id: StageId,
    /// Opaque stage output.
    pub payload: serde_json::Value,
    /// Quality/confidence score.
    pub score: Score,
    status: ReviewStatus,
    /// When processing started.
    pub started_at: DateTime<Utc>,
    /// When processing finished.
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    review: Option<ReviewNote>,
}

impl StageResult {
    /// Creates a result awaiting the gate.
    #[must_use]
    pub fn pending(
        stage_id: StageId,
        payload: serde_json::Value,
        score: Score,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stage_id,
            payload,
            score,
            status: ReviewStatus::PendingReview,
            started_at,
            finished_at: Utc::now(),
            review: None,
        }
    }

    /// Returns the review status.
    #[must_use]
    pub fn status(&self) -> ReviewStatus {
        self.status
    }

    /// Returns the reviewer's note, if a human resolved the result.
    #[must_use]
    pub fn review(&self) -> Option<&ReviewNote> {
        self.review.as_ref()
    }

    /// Records the gate outcome.
    ///
    /// Fails if the result was already sealed or if `status` is
    /// [`ReviewStatus::PendingReview`].
    pub fn seal(
        &mut self,
        status: ReviewStatus,
        review: Option<ReviewNote>,
    ) -> Result<(), GateError> {
        if self.status.is_sealed() {
            return Err(GateError::ResultSealed {
                stage: self.stage_id,
            });
        }
        if !status.is_sealed() {
            return Err(GateError::StillPending {
                stage: self.stage_id,
            });
        }
        self.status = status;
        self.review = review;
        Ok(())
    }

    /// Returns the processing time in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_ms(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> StageResult {
        StageResult::pending(
            StageId::DocumentGeneration,
            serde_json::json!({"doc_path": "docs/a.md"}),
            Score::new(72.0).unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_result_is_pending() {
        let result = pending();
        assert_eq!(result.status(), ReviewStatus::PendingReview);
        assert!(result.review().is_none());
        assert!(result.duration_ms() >= 0.0);
    }

    #[test]
    fn test_seal_once() {
        let mut result = pending();
        let note = ReviewNote {
            session_id: Uuid::new_v4(),
            reviewer_id: "ana".into(),
            comments: "fine".into(),
        };
        result
            .seal(ReviewStatus::HumanApproved, Some(note.clone()))
            .unwrap();
        assert_eq!(result.status(), ReviewStatus::HumanApproved);
        assert_eq!(result.review(), Some(&note));

        let err = result.seal(ReviewStatus::Rejected, None).unwrap_err();
        assert_eq!(
            err,
            GateError::ResultSealed {
                stage: StageId::DocumentGeneration
            }
        );
        assert_eq!(result.status(), ReviewStatus::HumanApproved);
    }

    #[test]
    fn test_seal_requires_resolved_status() {
        let mut result = pending();
        assert!(matches!(
            result.seal(ReviewStatus::PendingReview, None),
            Err(GateError::StillPending { .. })
        ));
    }

    #[test]
    fn test_serialization_keeps_status() {
        let mut result = pending();
        result.seal(ReviewStatus::AutoApproved, None).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], serde_json::json!("auto_approved"));
        assert_eq!(json["stage_id"], serde_json::json!("document_generation"));
        assert!(json.get("review").is_none());

        let back: StageResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.status(), ReviewStatus::AutoApproved);
    }
}
