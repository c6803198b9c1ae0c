//! Test assertions for workflow state.

use crate::core::{ReviewStatus, StageId};
use crate::workflow::WorkflowState;

/// Asserts that a stage was committed with the expected status.
pub fn assert_stage_status(state: &WorkflowState, stage: StageId, expected: ReviewStatus) {
    let actual = state.slot(stage).map(crate::stages::StageResult::status);
    assert_eq!(
        actual,
        Some(expected),
        "Expected stage {stage} to be {expected}, got {actual:?}"
    );
}

/// Asserts exactly which stages have committed results.
pub fn assert_stages_committed(state: &WorkflowState, expected: &[StageId]) {
    let actual: Vec<StageId> = state.results().map(|r| r.stage_id).collect();
    assert_eq!(actual, expected, "Unexpected committed stages");
}

/// Asserts which stages can still run.
pub fn assert_reachable_stages(state: &WorkflowState, expected: &[StageId]) {
    let actual: Vec<StageId> = StageId::ALL
        .into_iter()
        .filter(|stage| state.is_reachable(*stage))
        .collect();
    assert_eq!(actual, expected, "Unexpected reachable stages");
}
