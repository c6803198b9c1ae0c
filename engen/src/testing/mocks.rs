//! Mock stage processors for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::core::{Score, StageId};
use crate::errors::ProcessorError;
use crate::stages::{StageInput, StageOutput, StageProcessor, StageResult};

/// A processor that records its inputs and returns a configurable score.
///
/// The output payload is `{ "stage": <name>, "input": <input payload> }`,
/// so each stage's input shows what the previous stage handed over.
#[derive(Debug)]
pub struct MockProcessor {
    stage_id: StageId,
    score: Mutex<Score>,
    inputs: Mutex<Vec<serde_json::Value>>,
    approvals: Mutex<usize>,
}

impl MockProcessor {
    /// Creates a mock returning `score`.
    #[must_use]
    pub fn new(stage_id: StageId, score: Score) -> Self {
        Self {
            stage_id,
            score: Mutex::new(score),
            inputs: Mutex::new(Vec::new()),
            approvals: Mutex::new(0),
        }
    }

    /// Creates a mock that always scores 100.
    #[must_use]
    pub fn passing(stage_id: StageId) -> Self {
        Self::new(stage_id, Score::MAX)
    }

    /// Creates a mock that always scores 0.
    #[must_use]
    pub fn failing_score(stage_id: StageId) -> Self {
        Self::new(stage_id, Score::MIN)
    }

    /// Changes the returned score.
    pub fn set_score(&self, score: Score) {
        *self.score.lock() = score;
    }

    /// Returns the number of times the processor ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Returns every payload the processor received.
    #[must_use]
    pub fn recorded_inputs(&self) -> Vec<serde_json::Value> {
        self.inputs.lock().clone()
    }

    /// Returns how often `on_approved` fired.
    #[must_use]
    pub fn approval_count(&self) -> usize {
        *self.approvals.lock()
    }
}

#[async_trait]
impl StageProcessor for MockProcessor {
    fn stage_id(&self) -> StageId {
        self.stage_id
    }

    async fn process(&self, input: &StageInput) -> Result<StageOutput, ProcessorError> {
        self.inputs.lock().push(input.payload.clone());
        Ok(StageOutput::new(
            serde_json::json!({
                "stage": self.stage_id.as_str(),
                "input": input.payload,
            }),
            *self.score.lock(),
        ))
    }

    async fn on_approved(
        &self,
        _result: &StageResult,
    ) -> Result<Option<serde_json::Value>, ProcessorError> {
        *self.approvals.lock() += 1;
        Ok(None)
    }
}

/// A processor that always fails.
#[derive(Debug)]
pub struct FailingProcessor {
    stage_id: StageId,
    error: String,
}

impl FailingProcessor {
    /// Creates a new failing processor.
    #[must_use]
    pub fn new(stage_id: StageId, error: impl Into<String>) -> Self {
        Self {
            stage_id,
            error: error.into(),
        }
    }
}

#[async_trait]
impl StageProcessor for FailingProcessor {
    fn stage_id(&self) -> StageId {
        self.stage_id
    }

    async fn process(&self, _input: &StageInput) -> Result<StageOutput, ProcessorError> {
        Err(ProcessorError::new(self.stage_id, self.error.clone()))
    }
}

/// One mock per stage, scored in stage order.
///
/// # Panics
///
/// Panics if a score is outside `0..=100`.
#[must_use]
pub fn mock_processors(scores: [f64; StageId::COUNT]) -> Vec<Arc<MockProcessor>> {
    StageId::ALL
        .into_iter()
        .zip(scores)
        .map(|(stage, score)| {
            let score = Score::new(score).unwrap_or_else(|e| panic!("bad mock score: {e}"));
            Arc::new(MockProcessor::new(stage, score))
        })
        .collect()
}
