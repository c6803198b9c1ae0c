//! Per-stage thresholds and review requirements.

use super::{decide, GateDecision};
use crate::core::{Score, StageId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Threshold used when neither config nor caller supplies one.
pub const DEFAULT_THRESHOLD: f64 = 80.0;

/// The result of evaluating one stage against the policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateEvaluation {
    /// The stage evaluated.
    pub stage: StageId,
    /// The score offered.
    pub score: Score,
    /// The threshold applied.
    pub threshold: Score,
    /// What the gate does.
    pub decision: GateDecision,
    /// True when the score passed but the stage always goes to review.
    pub forced_review: bool,
}

/// Gate policy for a workflow run.
#[derive(Debug, Clone, PartialEq)]
pub struct GatePolicy {
    default_threshold: Score,
    thresholds: HashMap<StageId, Score>,
    always_review: HashSet<StageId>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            default_threshold: Score::new(DEFAULT_THRESHOLD).unwrap_or(Score::MAX),
            thresholds: HashMap::new(),
            always_review: HashSet::new(),
        }
    }
}

impl GatePolicy {
    /// Creates a policy with the default threshold for every stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy with one threshold for every stage.
    #[must_use]
    pub fn uniform(threshold: Score) -> Self {
        Self {
            default_threshold: threshold,
            ..Self::default()
        }
    }

    /// Overrides the threshold for one stage.
    #[must_use]
    pub fn with_threshold(mut self, stage: StageId, threshold: Score) -> Self {
        self.thresholds.insert(stage, threshold);
        self
    }

    /// Sends a stage to human review even when its score passes.
    #[must_use]
    pub fn with_always_review(mut self, stage: StageId) -> Self {
        self.always_review.insert(stage);
        self
    }

    /// Returns the fallback threshold.
    #[must_use]
    pub fn default_threshold(&self) -> Score {
        self.default_threshold
    }

    /// Returns the threshold that applies to a stage.
    #[must_use]
    pub fn threshold_for(&self, stage: StageId) -> Score {
        self.thresholds
            .get(&stage)
            .copied()
            .unwrap_or(self.default_threshold)
    }

    /// Returns true if the stage always goes to human review.
    #[must_use]
    pub fn requires_review(&self, stage: StageId) -> bool {
        self.always_review.contains(&stage)
    }

    /// Evaluates a stage's score.
    #[must_use]
    pub fn evaluate(&self, stage: StageId, score: Score) -> GateEvaluation {
        let threshold = self.threshold_for(stage);
        let raw = decide(score, threshold);
        let forced_review = raw == GateDecision::AutoApprove && self.requires_review(stage);
        GateEvaluation {
            stage,
            score,
            threshold,
            decision: if forced_review {
                GateDecision::Escalate
            } else {
                raw
            },
            forced_review,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: f64) -> Score {
        Score::new(v).unwrap()
    }

    #[test]
    fn test_default_threshold_is_80() {
        let policy = GatePolicy::new();
        for stage in StageId::ALL {
            assert_eq!(policy.threshold_for(stage), s(80.0));
        }
    }

    #[test]
    fn test_stage_override() {
        let policy = GatePolicy::new().with_threshold(StageId::ArtifactGeneration, s(95.0));
        assert_eq!(policy.threshold_for(StageId::ArtifactGeneration), s(95.0));
        assert_eq!(policy.threshold_for(StageId::DocumentGeneration), s(80.0));

        let eval = policy.evaluate(StageId::ArtifactGeneration, s(90.0));
        assert_eq!(eval.decision, GateDecision::Escalate);
        assert_eq!(eval.threshold, s(95.0));
    }

    #[test]
    fn test_evaluate_matches_decide() {
        let policy = GatePolicy::uniform(s(80.0));
        let stage = StageId::DiagramValidation;
        assert_eq!(policy.evaluate(stage, s(85.0)).decision, GateDecision::AutoApprove);
        assert_eq!(policy.evaluate(stage, s(80.0)).decision, GateDecision::AutoApprove);
        assert_eq!(policy.evaluate(stage, s(79.0)).decision, GateDecision::Escalate);
    }

    #[test]
    fn test_always_review_forces_escalation() {
        let policy = GatePolicy::new().with_always_review(StageId::HumanVerification);
        let eval = policy.evaluate(StageId::HumanVerification, s(100.0));
        assert_eq!(eval.decision, GateDecision::Escalate);
        assert!(eval.forced_review);

        let eval = policy.evaluate(StageId::HumanVerification, s(10.0));
        assert_eq!(eval.decision, GateDecision::Escalate);
        assert!(!eval.forced_review);
    }
}
