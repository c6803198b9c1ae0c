//! Workflow state: five ordered result slots and a current-stage pointer.

use crate::core::{RunStatus, StageId};
use crate::errors::GateError;
use crate::stages::StageResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State of one workflow run.
///
/// Slots are committed strictly in order. A slot is written once, only
/// for the current stage, and only after every earlier slot was approved.
/// Committing a rejected result halts the run for good.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    run_id: Uuid,
    slots: [Option<StageResult>; StageId::COUNT],
    current_stage: StageId,
    status: RunStatus,
    started_at: DateTime<Utc>,
}

impl WorkflowState {
    /// Creates an empty state positioned at stage 1.
    #[must_use]
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            slots: Default::default(),
            current_stage: StageId::DiagramValidation,
            status: RunStatus::Running,
            started_at: Utc::now(),
        }
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the stage that runs next (or ran last once the run ends).
    #[must_use]
    pub fn current_stage(&self) -> StageId {
        self.current_stage
    }

    /// Returns the run status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Returns when the run started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns a stage's committed result.
    #[must_use]
    pub fn slot(&self, stage: StageId) -> Option<&StageResult> {
        self.slots[stage.index()].as_ref()
    }

    /// Returns the committed results in stage order.
    pub fn results(&self) -> impl Iterator<Item = &StageResult> {
        self.slots.iter().flatten()
    }

    /// Returns the number of committed slots.
    #[must_use]
    pub fn committed_count(&self) -> usize {
        self.results().count()
    }

    /// Checks that `stage` may run now.
    pub fn ensure_can_run(&self, stage: StageId) -> Result<(), GateError> {
        if self.status.is_terminal() {
            return Err(GateError::WorkflowClosed);
        }
        if stage != self.current_stage {
            return Err(GateError::OutOfOrder {
                expected: self.current_stage,
                got: stage,
            });
        }
        if let Some(previous) = stage.previous() {
            let approved = self
                .slot(previous)
                .is_some_and(|r| r.status().is_approved());
            if !approved {
                return Err(GateError::PredecessorNotApproved { stage });
            }
        }
        if self.slot(stage).is_some() {
            return Err(GateError::ResultSealed { stage });
        }
        Ok(())
    }

    /// Commits a sealed result for the current stage and moves the pointer.
    pub fn commit(&mut self, result: StageResult) -> Result<(), GateError> {
        let stage = result.stage_id;
        self.ensure_can_run(stage)?;
        let status = result.status();
        if !status.is_sealed() {
            return Err(GateError::StillPending { stage });
        }

        self.slots[stage.index()] = Some(result);
        if status.is_rejected() {
            self.status = RunStatus::Halted;
        } else if let Some(next) = stage.next() {
            self.current_stage = next;
        } else {
            self.status = RunStatus::Completed;
        }
        Ok(())
    }

    /// Stops the run without committing the current stage.
    pub fn halt(&mut self) {
        if !self.status.is_terminal() {
            self.status = RunStatus::Halted;
        }
    }

    /// Returns true if `stage` can still run in this workflow.
    #[must_use]
    pub fn is_reachable(&self, stage: StageId) -> bool {
        !self.status.is_terminal() && stage >= self.current_stage && self.slot(stage).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ReviewStatus, Score};

    fn sealed(stage: StageId, status: ReviewStatus) -> StageResult {
        let mut result = pending(stage);
        result.seal(status, None).unwrap();
        result
    }

    fn pending(stage: StageId) -> StageResult {
        StageResult::pending(stage, serde_json::json!({}), Score::new(90.0).unwrap(), Utc::now())
    }

    #[test]
    fn test_starts_at_stage_one() {
        let state = WorkflowState::new(Uuid::new_v4());
        assert_eq!(state.current_stage(), StageId::DiagramValidation);
        assert_eq!(state.status(), RunStatus::Running);
        assert_eq!(state.committed_count(), 0);
        assert!(state.ensure_can_run(StageId::DiagramValidation).is_ok());
    }

    #[test]
    fn test_commit_advances_through_all_stages() {
        let mut state = WorkflowState::new(Uuid::new_v4());
        for stage in StageId::ALL {
            state.commit(sealed(stage, ReviewStatus::AutoApproved)).unwrap();
        }
        assert_eq!(state.status(), RunStatus::Completed);
        assert_eq!(state.committed_count(), 5);
        assert_eq!(
            state.commit(sealed(StageId::HumanVerification, ReviewStatus::AutoApproved)),
            Err(GateError::WorkflowClosed)
        );
    }

    #[test]
    fn test_pending_result_is_not_committed() {
        let mut state = WorkflowState::new(Uuid::new_v4());
        assert_eq!(
            state.commit(pending(StageId::DiagramValidation)),
            Err(GateError::StillPending {
                stage: StageId::DiagramValidation
            })
        );
        assert_eq!(state.current_stage(), StageId::DiagramValidation);
        assert!(state.slot(StageId::DiagramValidation).is_none());
    }

    #[test]
    fn test_out_of_order_commit() {
        let mut state = WorkflowState::new(Uuid::new_v4());
        assert_eq!(
            state.commit(sealed(StageId::DocumentGeneration, ReviewStatus::AutoApproved)),
            Err(GateError::OutOfOrder {
                expected: StageId::DiagramValidation,
                got: StageId::DocumentGeneration,
            })
        );
    }

    #[test]
    fn test_rejection_halts_and_blocks_later_stages() {
        let mut state = WorkflowState::new(Uuid::new_v4());
        state
            .commit(sealed(StageId::DiagramValidation, ReviewStatus::HumanApproved))
            .unwrap();
        state
            .commit(sealed(StageId::DocumentGeneration, ReviewStatus::Rejected))
            .unwrap();

        assert_eq!(state.status(), RunStatus::Halted);
        assert_eq!(state.current_stage(), StageId::DocumentGeneration);
        for stage in &StageId::ALL[2..] {
            assert!(!state.is_reachable(*stage));
            assert_eq!(state.ensure_can_run(*stage), Err(GateError::WorkflowClosed));
        }
    }

    #[test]
    fn test_halt_without_commit() {
        let mut state = WorkflowState::new(Uuid::new_v4());
        state.halt();
        assert_eq!(state.status(), RunStatus::Halted);
        assert!(state.slot(StageId::DiagramValidation).is_none());
    }
}
