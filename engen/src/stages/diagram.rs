//! Stage 1: validate an uploaded diagram against the reference patterns.

use super::{Scorer, StageInput, StageOutput, StageProcessor};
use crate::core::StageId;
use crate::errors::ProcessorError;
use crate::services::{Services, TextRequest};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const REFERENCE_BUCKET: &str = "reference-patterns";
const REFERENCE_PATTERN_COUNT: usize = 65;
const OUTPUT_BUCKET: &str = "engen-diagrams";
const DEFAULT_VALIDATION_PROMPT: &str =
    "Compare the diagram with the reference architecture patterns and rate how closely it matches.";
const DEFAULT_DESCRIPTION_PROMPT: &str =
    "Describe the architecture pattern shown in the diagram. Validation: {validation}";

/// Validates diagrams with the vision model and describes them.
///
/// Input payload: `{ "bucket": .., "name": .. }` naming the upload.
/// Output payload: `{ diagram, validation, description, quality }`.
#[derive(Debug)]
pub struct DiagramValidator {
    services: Services,
    scorer: Arc<dyn Scorer>,
}

impl DiagramValidator {
    /// Creates the processor.
    #[must_use]
    pub fn new(services: Services, scorer: Arc<dyn Scorer>) -> Self {
        Self { services, scorer }
    }

    async fn prompt(&self, name: &str, fallback: &str) -> Result<String, ProcessorError> {
        let stored = self
            .services
            .store
            .read_optional("prompts", name)
            .await
            .map_err(|e| ProcessorError::from_service(self.stage_id(), &e))?;
        Ok(stored.map_or_else(
            || fallback.to_string(),
            |bytes| String::from_utf8_lossy(&bytes).into_owned(),
        ))
    }

    async fn references(&self) -> Result<Vec<Vec<u8>>, ProcessorError> {
        let mut references = Vec::new();
        for i in 1..=REFERENCE_PATTERN_COUNT {
            let image = self
                .services
                .store
                .read_optional(REFERENCE_BUCKET, &format!("pattern_{i}.png"))
                .await
                .map_err(|e| ProcessorError::from_service(self.stage_id(), &e))?;
            references.extend(image);
        }
        Ok(references)
    }
}

#[async_trait]
impl StageProcessor for DiagramValidator {
    fn stage_id(&self) -> StageId {
        StageId::DiagramValidation
    }

    async fn process(&self, input: &StageInput) -> Result<StageOutput, ProcessorError> {
        let stage = self.stage_id();
        let bucket = input.str_field("bucket")?;
        let name = input.str_field("name")?;

        let diagram = self
            .services
            .store
            .read(bucket, name)
            .await
            .map_err(|e| ProcessorError::from_service(stage, &e))?;

        let references = self.references().await?;
        debug!(diagram = %name, references = references.len(), "Validating diagram");

        let prompt = self
            .prompt("diagram_validation_prompt.txt", DEFAULT_VALIDATION_PROMPT)
            .await?;
        let validation = self
            .services
            .vision
            .analyze(&diagram, &prompt, &references)
            .await
            .map_err(|e| ProcessorError::from_service(stage, &e))?;
        let validation = serde_json::to_value(&validation)
            .map_err(|e| ProcessorError::new(stage, e.to_string()))?;

        let template = self
            .prompt("description_prompt.txt", DEFAULT_DESCRIPTION_PROMPT)
            .await?;
        let request = TextRequest::new(
            template.replace("{validation}", &validation.to_string()),
            4096,
        )
        .with_image(diagram);
        let description = self
            .services
            .text
            .generate(&request)
            .await
            .map_err(|e| ProcessorError::from_service(stage, &e))?;

        let mut payload = serde_json::json!({
            "diagram": name,
            "validation": validation,
            "description": description,
        });

        self.services
            .store
            .write(
                OUTPUT_BUCKET,
                &format!("validated/{name}.json"),
                payload.to_string().into_bytes(),
            )
            .await
            .map_err(|e| ProcessorError::from_service(stage, &e))?;

        payload["quality"] = payload["validation"]["score"].clone();
        let score = self.scorer.score(stage, &payload)?;
        Ok(StageOutput::new(payload, score))
    }
}
