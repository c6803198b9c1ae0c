//! Sequential workflow controller.

use super::{WorkflowBuilder, WorkflowState};
use crate::core::{ReviewStatus, RunStatus, StageId, WorkflowEvent};
use crate::errors::{EngenError, GateError};
use crate::events::EventSink;
use crate::gate::{GatePolicy, StageGate};
use crate::review::{ReviewLedger, ReviewRequest, Reviewer};
use crate::stages::{ReviewNote, StageInput, StageProcessor, StageResult};
use crate::utils::generate_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    /// Every stage was approved.
    Completed,
    /// A reviewer rejected a stage; later stages never ran.
    Rejected {
        /// The rejected stage.
        stage: StageId,
    },
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    /// The run id.
    pub run_id: Uuid,
    /// Final state.
    pub state: WorkflowState,
    /// How the run ended.
    pub outcome: WorkflowOutcome,
    /// Records produced by processors after approval, e.g. a pull request URL.
    pub follow_ups: BTreeMap<StageId, serde_json::Value>,
    /// Wall-clock duration.
    pub duration_ms: f64,
}

impl WorkflowReport {
    /// Returns true if every stage was approved.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.outcome == WorkflowOutcome::Completed
    }
}

/// Runs the five stages in order, gating each one.
pub struct WorkflowController {
    processors: Vec<Arc<dyn StageProcessor>>,
    policy: GatePolicy,
    reviewer: Arc<dyn Reviewer>,
    ledger: Arc<ReviewLedger>,
    event_sink: Arc<dyn EventSink>,
}

impl WorkflowController {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    pub(super) fn new(
        processors: Vec<Arc<dyn StageProcessor>>,
        policy: GatePolicy,
        reviewer: Arc<dyn Reviewer>,
        ledger: Arc<ReviewLedger>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            processors,
            policy,
            reviewer,
            ledger,
            event_sink,
        }
    }

    /// Returns the gate policy.
    #[must_use]
    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Returns the review ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<ReviewLedger> {
        &self.ledger
    }

    /// Returns the processor names in stage order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Creates a fresh state for a new run.
    #[must_use]
    pub fn new_state(&self) -> WorkflowState {
        WorkflowState::new(generate_id())
    }

    /// Runs a new workflow from a trigger payload.
    ///
    /// # Errors
    ///
    /// Returns an error if a processor or the reviewer fails. Rejection is
    /// an outcome, not an error.
    pub async fn run(&self, trigger: serde_json::Value) -> Result<WorkflowReport, EngenError> {
        let mut state = self.new_state();
        self.run_in(&mut state, trigger).await
    }

    /// Runs a workflow on caller-owned state.
    ///
    /// On error the state is left [`RunStatus::Halted`] with no result
    /// committed for the failing stage.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::WorkflowClosed`] if `state` already finished,
    /// otherwise see [`WorkflowController::run`].
    pub async fn run_in(
        &self,
        state: &mut WorkflowState,
        trigger: serde_json::Value,
    ) -> Result<WorkflowReport, EngenError> {
        let run_id = state.run_id();
        if state.status().is_terminal() {
            warn!(
                run_id = %run_id,
                status = %state.status(),
                "Refusing to rerun a finished workflow"
            );
            return Err(GateError::WorkflowClosed.into());
        }
        let clock = Instant::now();
        let mut payload = trigger;
        let mut follow_ups = BTreeMap::new();

        info!(run_id = %run_id, "Workflow started");
        self.event_sink
            .emit(WorkflowEvent::workflow_started(run_id))
            .await;

        while !state.status().is_terminal() {
            let stage = state.current_stage();
            state.ensure_can_run(stage)?;
            let processor = &self.processors[stage.index()];

            match self.run_stage(processor.as_ref(), run_id, stage, payload).await {
                Ok(result) => {
                    let status = result.status();
                    if status.is_approved() {
                        match processor.on_approved(&result).await {
                            Ok(Some(record)) => {
                                follow_ups.insert(stage, record);
                            }
                            Ok(None) => {}
                            Err(e) => return Err(self.abort(state, stage, e.into()).await),
                        }
                    }
                    payload = result.payload.clone();
                    state.commit(result)?;
                    info!(run_id = %run_id, stage = %stage, status = %status, "Stage committed");
                    self.event_sink
                        .emit(WorkflowEvent::stage_committed(run_id, stage, status))
                        .await;

                    if status.is_rejected() {
                        warn!(run_id = %run_id, stage = %stage, "Workflow halted by rejection");
                        self.event_sink
                            .emit(WorkflowEvent::workflow_halted(run_id, stage, "rejected"))
                            .await;
                        return Ok(WorkflowReport {
                            run_id,
                            state: state.clone(),
                            outcome: WorkflowOutcome::Rejected { stage },
                            follow_ups,
                            duration_ms: elapsed_ms(clock),
                        });
                    }
                }
                Err(e) => return Err(self.abort(state, stage, e).await),
            }
        }

        if state.status() != RunStatus::Completed {
            return Err(GateError::WorkflowClosed.into());
        }

        let duration_ms = elapsed_ms(clock);
        info!(run_id = %run_id, duration_ms, "Workflow completed");
        self.event_sink
            .emit(WorkflowEvent::workflow_completed(run_id, duration_ms))
            .await;
        Ok(WorkflowReport {
            run_id,
            state: state.clone(),
            outcome: WorkflowOutcome::Completed,
            follow_ups,
            duration_ms,
        })
    }

    /// Processes one stage and resolves its gate, returning the sealed result.
    async fn run_stage(
        &self,
        processor: &dyn StageProcessor,
        run_id: Uuid,
        stage: StageId,
        payload: serde_json::Value,
    ) -> Result<StageResult, EngenError> {
        self.event_sink
            .emit(WorkflowEvent::stage_started(run_id, stage))
            .await;
        debug!(run_id = %run_id, stage = %stage, processor = processor.name(), "Stage started");

        let input = StageInput::new(run_id, stage, payload);
        let mut result = processor.run(&input).await?;
        self.event_sink
            .emit(WorkflowEvent::stage_processed(
                run_id,
                stage,
                result.score,
                result.duration_ms(),
            ))
            .await;

        let evaluation = self.policy.evaluate(stage, result.score);
        let mut gate = StageGate::new(stage);
        gate.apply_decision(evaluation.decision)?;
        self.ledger.note_gate(gate.phase().is_suspended());

        if !gate.phase().is_suspended() {
            info!(
                run_id = %run_id,
                stage = %stage,
                score = %result.score,
                threshold = %evaluation.threshold,
                "Gate auto-approved"
            );
            self.event_sink
                .emit(WorkflowEvent::gate_auto_approved(
                    run_id,
                    stage,
                    result.score,
                    evaluation.threshold,
                ))
                .await;
            result.seal(ReviewStatus::AutoApproved, None)?;
            return Ok(result);
        }

        let request = ReviewRequest::for_result(run_id, &result);
        warn!(
            run_id = %run_id,
            stage = %stage,
            score = %result.score,
            threshold = %evaluation.threshold,
            forced = evaluation.forced_review,
            session = %request.session_id,
            "Gate escalated to human review"
        );
        self.event_sink
            .emit(WorkflowEvent::gate_escalated(
                run_id,
                stage,
                result.score,
                evaluation.threshold,
                request.session_id,
            ))
            .await;

        let decision = self.reviewer.review(&request).await?;
        let record = self.ledger.record(&request, &decision);
        self.ledger.persist(&record).await?;
        let approved = decision.verdict.is_approve();
        gate.resolve(approved)?;
        if approved {
            info!(
                run_id = %run_id,
                stage = %stage,
                reviewer = %decision.reviewer_id,
                "Review approved"
            );
        } else {
            warn!(
                run_id = %run_id,
                stage = %stage,
                reviewer = %decision.reviewer_id,
                "Review rejected"
            );
        }
        self.event_sink
            .emit(WorkflowEvent::review_resolved(
                run_id,
                stage,
                approved,
                &decision.reviewer_id,
            ))
            .await;

        result.seal(
            gate.phase().review_status(),
            Some(ReviewNote {
                session_id: request.session_id,
                reviewer_id: decision.reviewer_id,
                comments: decision.comments,
            }),
        )?;
        Ok(result)
    }

    async fn abort(
        &self,
        state: &mut WorkflowState,
        stage: StageId,
        error: EngenError,
    ) -> EngenError {
        let reason = error.to_string();
        warn!(
            run_id = %state.run_id(),
            stage = %stage,
            error = %reason,
            "Stage failed, halting workflow"
        );
        state.halt();
        self.event_sink
            .emit(WorkflowEvent::stage_failed(state.run_id(), stage, &reason))
            .await;
        self.event_sink
            .emit(WorkflowEvent::workflow_halted(state.run_id(), stage, &reason))
            .await;
        error
    }
}

#[allow(clippy::cast_precision_loss)]
fn elapsed_ms(clock: Instant) -> f64 {
    clock.elapsed().as_micros() as f64 / 1000.0
}

impl std::fmt::Debug for WorkflowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowController")
            .field("stages", &self.stage_names())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
