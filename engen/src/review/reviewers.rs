//! Non-interactive reviewers.

use super::{ReviewDecision, ReviewRequest, Reviewer, Verdict};
use crate::core::StageId;
use crate::errors::ReviewError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Gives every escalated result the same verdict.
#[derive(Debug, Clone)]
pub struct AutoReviewer {
    verdict: Verdict,
    reviewer_id: String,
}

impl AutoReviewer {
    /// Approves everything.
    #[must_use]
    pub fn approving() -> Self {
        Self {
            verdict: Verdict::Approve,
            reviewer_id: "auto-reviewer".to_string(),
        }
    }

    /// Rejects everything.
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            verdict: Verdict::Reject,
            reviewer_id: "auto-reviewer".to_string(),
        }
    }

    /// Sets the reviewer id recorded on decisions.
    #[must_use]
    pub fn with_reviewer_id(mut self, reviewer_id: impl Into<String>) -> Self {
        self.reviewer_id = reviewer_id.into();
        self
    }
}

#[async_trait]
impl Reviewer for AutoReviewer {
    async fn review(&self, _request: &ReviewRequest) -> Result<ReviewDecision, ReviewError> {
        Ok(ReviewDecision {
            verdict: self.verdict,
            reviewer_id: self.reviewer_id.clone(),
            comments: String::new(),
        })
    }
}

/// Decides per stage and remembers which stages it was asked about.
#[derive(Debug)]
pub struct ScriptedReviewer {
    verdicts: HashMap<StageId, Verdict>,
    fallback: Verdict,
    seen: RwLock<Vec<StageId>>,
}

impl Default for ScriptedReviewer {
    fn default() -> Self {
        Self {
            verdicts: HashMap::new(),
            fallback: Verdict::Approve,
            seen: RwLock::new(Vec::new()),
        }
    }
}

impl ScriptedReviewer {
    /// Creates a reviewer approving every stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the verdict for one stage.
    #[must_use]
    pub fn with_verdict(mut self, stage: StageId, verdict: Verdict) -> Self {
        self.verdicts.insert(stage, verdict);
        self
    }

    /// Sets the verdict for stages without an explicit one.
    #[must_use]
    pub fn with_fallback(mut self, verdict: Verdict) -> Self {
        self.fallback = verdict;
        self
    }

    /// Stages reviewed so far, in order.
    #[must_use]
    pub fn seen(&self) -> Vec<StageId> {
        self.seen.read().clone()
    }
}

#[async_trait]
impl Reviewer for ScriptedReviewer {
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewDecision, ReviewError> {
        self.seen.write().push(request.stage_id);
        let verdict = self
            .verdicts
            .get(&request.stage_id)
            .copied()
            .unwrap_or(self.fallback);
        Ok(ReviewDecision {
            verdict,
            reviewer_id: "scripted-reviewer".to_string(),
            comments: format!("scripted {verdict} for {}", request.stage_id),
        })
    }
}
