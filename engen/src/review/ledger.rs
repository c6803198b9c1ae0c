//! Audit trail of completed reviews.

use super::{ReviewDecision, ReviewRequest, Verdict};
use crate::core::{Score, StageId};
use crate::errors::ServiceError;
use crate::services::ObjectStore;
use crate::utils::{iso_timestamp, payload_digest};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Bucket that receives persisted audit records.
pub const AUDIT_BUCKET: &str = "audit-trails";

/// One completed review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Review session.
    pub session_id: Uuid,
    /// Workflow run.
    pub run_id: Uuid,
    /// Reviewed stage.
    pub stage_id: StageId,
    /// The verdict.
    pub verdict: Verdict,
    /// Who decided.
    pub reviewer_id: String,
    /// Reviewer comments.
    pub comments: String,
    /// Score under review.
    pub score: Score,
    /// Time from session open to decision.
    pub review_duration_ms: i64,
    /// SHA-256 of the reviewed payload.
    pub context_hash: String,
    /// When the record was written.
    pub timestamp: String,
}

impl AuditRecord {
    /// Object path of the persisted record.
    #[must_use]
    pub fn object_path(&self) -> String {
        format!("{}_decision.json", self.session_id)
    }
}

/// Per-reviewer figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewerStats {
    /// Reviews decided.
    pub reviews: usize,
    /// Approvals.
    pub approved: usize,
    /// Rejections.
    pub rejected: usize,
    /// Mean review duration.
    pub average_review_ms: f64,
}

/// Aggregate figures over the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewAnalytics {
    /// Completed reviews.
    pub total_reviews: usize,
    /// Approvals.
    pub approved: usize,
    /// Rejections.
    pub rejected: usize,
    /// `approved / total_reviews`, 0 when empty.
    pub approval_rate: f64,
    /// Mean review duration.
    pub average_review_ms: f64,
    /// Gate decisions noted.
    pub gate_evaluations: usize,
    /// Gate decisions that went to review.
    pub escalations: usize,
    /// `escalations / gate_evaluations`, 0 when none were noted.
    pub escalation_rate: f64,
    /// Breakdown by reviewer id.
    pub reviewer_performance: BTreeMap<String, ReviewerStats>,
}

#[derive(Debug, Default)]
struct GateTally {
    evaluations: usize,
    escalations: usize,
}

/// Append-only review ledger shared by a controller's runs.
///
/// With a store attached, [`ReviewLedger::persist`] also writes each
/// record to [`AUDIT_BUCKET`].
#[derive(Default)]
pub struct ReviewLedger {
    records: RwLock<Vec<AuditRecord>>,
    gates: RwLock<GateTally>,
    store: Option<Arc<dyn ObjectStore>>,
}

impl ReviewLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persists records to `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Notes one gate decision for the escalation rate.
    pub fn note_gate(&self, escalated: bool) {
        let mut gates = self.gates.write();
        gates.evaluations += 1;
        if escalated {
            gates.escalations += 1;
        }
    }

    /// Writes a record to the audit bucket. Does nothing without a store.
    pub async fn persist(&self, record: &AuditRecord) -> Result<(), ServiceError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let body = serde_json::to_vec_pretty(record)
            .map_err(|e| ServiceError::new("audit_trail", e.to_string()))?;
        store.write(AUDIT_BUCKET, &record.object_path(), body).await?;
        debug!(session = %record.session_id, "Audit record persisted");
        Ok(())
    }

    /// Records a decision and returns the stored entry.
    pub fn record(&self, request: &ReviewRequest, decision: &ReviewDecision) -> AuditRecord {
        let record = AuditRecord {
            session_id: request.session_id,
            run_id: request.run_id,
            stage_id: request.stage_id,
            verdict: decision.verdict,
            reviewer_id: decision.reviewer_id.clone(),
            comments: decision.comments.clone(),
            score: request.score,
            review_duration_ms: (Utc::now() - request.requested_at).num_milliseconds(),
            context_hash: payload_digest(&request.payload),
            timestamp: iso_timestamp(),
        };
        self.records.write().push(record.clone());
        record
    }

    /// Returns every record in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().clone()
    }

    /// Returns the records of one run.
    #[must_use]
    pub fn records_for_run(&self, run_id: Uuid) -> Vec<AuditRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Computes aggregate figures.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn analytics(&self) -> ReviewAnalytics {
        let records = self.records.read();
        let gates = self.gates.read();
        let mut analytics = ReviewAnalytics {
            gate_evaluations: gates.evaluations,
            escalations: gates.escalations,
            escalation_rate: ratio(gates.escalations, gates.evaluations),
            ..ReviewAnalytics::default()
        };
        let total = records.len();
        if total == 0 {
            return analytics;
        }

        let mut durations: BTreeMap<&str, i64> = BTreeMap::new();
        for record in records.iter() {
            let stats = analytics
                .reviewer_performance
                .entry(record.reviewer_id.clone())
                .or_default();
            stats.reviews += 1;
            if record.verdict.is_approve() {
                stats.approved += 1;
            } else {
                stats.rejected += 1;
            }
            *durations.entry(&record.reviewer_id).or_default() += record.review_duration_ms;
        }
        for (reviewer, stats) in &mut analytics.reviewer_performance {
            let spent = durations.get(reviewer.as_str()).copied().unwrap_or_default();
            stats.average_review_ms = spent as f64 / stats.reviews as f64;
        }

        let approved = records.iter().filter(|r| r.verdict.is_approve()).count();
        let duration: i64 = records.iter().map(|r| r.review_duration_ms).sum();
        analytics.total_reviews = total;
        analytics.approved = approved;
        analytics.rejected = total - approved;
        analytics.approval_rate = ratio(approved, total);
        analytics.average_review_ms = duration as f64 / total as f64;
        analytics
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

impl std::fmt::Debug for ReviewLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewLedger")
            .field("records", &self.len())
            .field("persistent", &self.store.is_some())
            .finish_non_exhaustive()
    }
}
