//! Stage processors.
//!
//! Each of the five pipeline stages is an independent [`StageProcessor`].
//! The controller composes them; no processor knows about the others.

mod artifacts;
mod diagram;
mod document;
mod result;
pub mod scoring;
mod specification;
mod verification;

pub use artifacts::{ArtifactBundle, ArtifactGenerator, ArtifactKind, ARTIFACTS_BUCKET};
pub use diagram::DiagramValidator;
pub use document::{assemble_document, DocumentGenerator, DocumentSection, DOCS_BUCKET};
pub use result::{ReviewNote, StageResult};
pub use scoring::{FixedScorer, FnScorer, PayloadFieldScorer, Scorer};
pub use specification::{pattern_id_from_doc_path, ComponentSpecifier, ExtractedSpec};
pub use verification::{bundle_files, DeploymentVerifier, PATTERN_REPO};

use crate::core::{Score, StageId};
use crate::errors::ProcessorError;
use crate::services::Services;
use async_trait::async_trait;
use chrono::Utc;
use std::fmt::Debug;
use std::sync::Arc;
use uuid::Uuid;

/// What a stage receives.
#[derive(Debug, Clone)]
pub struct StageInput {
    /// The workflow run.
    pub run_id: Uuid,
    /// The stage being run.
    pub stage_id: StageId,
    /// The approved payload of the previous stage, or the trigger for stage 1.
    pub payload: serde_json::Value,
}

impl StageInput {
    /// Creates a stage input.
    #[must_use]
    pub fn new(run_id: Uuid, stage_id: StageId, payload: serde_json::Value) -> Self {
        Self {
            run_id,
            stage_id,
            payload,
        }
    }

    /// Reads a required string field from the payload.
    pub fn str_field(&self, key: &str) -> Result<&str, ProcessorError> {
        self.payload
            .get(key)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ProcessorError::new(self.stage_id, format!("input is missing '{key}'")))
    }
}

/// What a stage produces before the gate runs.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
    /// Opaque output handed to the next stage once approved.
    pub payload: serde_json::Value,
    /// Quality/confidence score.
    pub score: Score,
}

impl StageOutput {
    /// Creates a stage output.
    #[must_use]
    pub fn new(payload: serde_json::Value, score: Score) -> Self {
        Self { payload, score }
    }
}

/// A pipeline stage.
#[async_trait]
pub trait StageProcessor: Send + Sync + Debug {
    /// Returns which stage this processor implements.
    fn stage_id(&self) -> StageId;

    /// Returns a display name.
    fn name(&self) -> &str {
        self.stage_id().as_str()
    }

    /// Produces the stage's output.
    async fn process(&self, input: &StageInput) -> Result<StageOutput, ProcessorError>;

    /// Runs the processor and wraps its output in a pending [`StageResult`].
    async fn run(&self, input: &StageInput) -> Result<StageResult, ProcessorError> {
        let started_at = Utc::now();
        let output = self.process(input).await?;
        Ok(StageResult::pending(
            self.stage_id(),
            output.payload,
            output.score,
            started_at,
        ))
    }

    /// Called once the stage's result is committed as approved.
    ///
    /// Returns an optional follow-up record for the run report.
    async fn on_approved(
        &self,
        _result: &StageResult,
    ) -> Result<Option<serde_json::Value>, ProcessorError> {
        Ok(None)
    }
}

/// The five built-in processors, scored by one shared scorer.
#[must_use]
pub fn standard_processors(
    services: &Services,
    scorer: Arc<dyn Scorer>,
) -> Vec<Arc<dyn StageProcessor>> {
    vec![
        Arc::new(DiagramValidator::new(services.clone(), scorer.clone())),
        Arc::new(DocumentGenerator::new(services.clone(), scorer.clone())),
        Arc::new(ComponentSpecifier::new(services.clone(), scorer.clone())),
        Arc::new(ArtifactGenerator::new(services.clone(), scorer.clone())),
        Arc::new(DeploymentVerifier::new(services.clone(), scorer)),
    ]
}

/// A processor built from a closure.
pub struct FnProcessor<F>
where
    F: Fn(&StageInput) -> Result<StageOutput, ProcessorError> + Send + Sync,
{
    stage_id: StageId,
    func: F,
}

impl<F> FnProcessor<F>
where
    F: Fn(&StageInput) -> Result<StageOutput, ProcessorError> + Send + Sync,
{
    /// Creates a closure-backed processor.
    pub fn new(stage_id: StageId, func: F) -> Self {
        Self { stage_id, func }
    }
}

impl<F> Debug for FnProcessor<F>
where
    F: Fn(&StageInput) -> Result<StageOutput, ProcessorError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProcessor")
            .field("stage_id", &self.stage_id)
            .finish()
    }
}

#[async_trait]
impl<F> StageProcessor for FnProcessor<F>
where
    F: Fn(&StageInput) -> Result<StageOutput, ProcessorError> + Send + Sync,
{
    fn stage_id(&self) -> StageId {
        self.stage_id
    }

    async fn process(&self, input: &StageInput) -> Result<StageOutput, ProcessorError> {
        (self.func)(input)
    }
}
