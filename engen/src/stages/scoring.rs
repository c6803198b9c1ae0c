//! Pluggable scoring of stage payloads.
//!
//! How good a stage's output is depends on the deployment; processors
//! only report measurable facts in their payload and a [`Scorer`] turns
//! that payload into a [`Score`].

use crate::core::{Score, StageId};
use crate::errors::ProcessorError;
use std::fmt::Debug;

/// Payload field the built-in processors report their quality in.
pub const QUALITY_POINTER: &str = "/quality";

/// Maps a stage payload onto a score.
pub trait Scorer: Send + Sync + Debug {
    /// Scores a payload.
    fn score(&self, stage: StageId, payload: &serde_json::Value) -> Result<Score, ProcessorError>;
}

/// Reads the score from a numeric field addressed by a JSON pointer.
#[derive(Debug, Clone)]
pub struct PayloadFieldScorer {
    pointer: String,
}

impl Default for PayloadFieldScorer {
    fn default() -> Self {
        Self::new(QUALITY_POINTER)
    }
}

impl PayloadFieldScorer {
    /// Creates a scorer reading the given pointer (e.g. "/validation/score").
    #[must_use]
    pub fn new(pointer: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
        }
    }
}

impl Scorer for PayloadFieldScorer {
    fn score(&self, stage: StageId, payload: &serde_json::Value) -> Result<Score, ProcessorError> {
        let raw = payload
            .pointer(&self.pointer)
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| {
                ProcessorError::new(stage, format!("payload has no numeric '{}'", self.pointer))
            })?;
        Score::new(raw).map_err(|e| ProcessorError::new(stage, e.to_string()))
    }
}

/// Gives every payload the same score.
#[derive(Debug, Clone, Copy)]
pub struct FixedScorer(pub Score);

impl Scorer for FixedScorer {
    fn score(
        &self,
        _stage: StageId,
        _payload: &serde_json::Value,
    ) -> Result<Score, ProcessorError> {
        Ok(self.0)
    }
}

/// Scores with a closure.
pub struct FnScorer<F>
where
    F: Fn(StageId, &serde_json::Value) -> f64 + Send + Sync,
{
    func: F,
}

impl<F> FnScorer<F>
where
    F: Fn(StageId, &serde_json::Value) -> f64 + Send + Sync,
{
    /// Creates a closure scorer.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnScorer<F>
where
    F: Fn(StageId, &serde_json::Value) -> f64 + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnScorer").finish_non_exhaustive()
    }
}

impl<F> Scorer for FnScorer<F>
where
    F: Fn(StageId, &serde_json::Value) -> f64 + Send + Sync,
{
    fn score(&self, stage: StageId, payload: &serde_json::Value) -> Result<Score, ProcessorError> {
        Score::new((self.func)(stage, payload))
            .map_err(|e| ProcessorError::new(stage, e.to_string()))
    }
}

/// Percentage of `passed` out of `total`, or 0 when there is nothing to check.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ratio_quality(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 * 100.0 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_field_scorer() {
        let scorer = PayloadFieldScorer::new("/validation/score");
        let payload = serde_json::json!({"validation": {"score": 85}});
        assert_eq!(
            scorer.score(StageId::DiagramValidation, &payload).unwrap().value(),
            85.0
        );
    }

    #[test]
    fn test_payload_field_scorer_missing_or_out_of_range() {
        let scorer = PayloadFieldScorer::default();
        assert!(scorer
            .score(StageId::DocumentGeneration, &serde_json::json!({}))
            .is_err());
        assert!(scorer
            .score(StageId::DocumentGeneration, &serde_json::json!({"quality": 140}))
            .is_err());
        assert!(scorer
            .score(StageId::DocumentGeneration, &serde_json::json!({"quality": "high"}))
            .is_err());
    }

    #[test]
    fn test_fixed_and_fn_scorers() {
        let fixed = FixedScorer(Score::new(42.0).unwrap());
        assert_eq!(
            fixed.score(StageId::ArtifactGeneration, &serde_json::Value::Null).unwrap().value(),
            42.0
        );

        let by_stage = FnScorer::new(|stage, _| f64::from(stage.ordinal()) * 10.0);
        assert_eq!(
            by_stage.score(StageId::HumanVerification, &serde_json::Value::Null).unwrap().value(),
            50.0
        );
    }

    #[test]
    fn test_ratio_quality() {
        assert_eq!(ratio_quality(0, 0), 0.0);
        assert_eq!(ratio_quality(3, 4), 75.0);
        assert_eq!(ratio_quality(4, 4), 100.0);
    }
}
