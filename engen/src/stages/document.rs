//! Stage 2: generate pattern documentation from a validated diagram.

use super::scoring::ratio_quality;
use super::{Scorer, StageInput, StageOutput, StageProcessor};
use crate::core::StageId;
use crate::errors::ProcessorError;
use crate::services::{Services, TextRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Bucket the assembled documents are written to.
pub const DOCS_BUCKET: &str = "pattern-docs";
const RAG_RESULTS: usize = 3;

/// One section of the generated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSection {
    /// Section id, also the prompt table key.
    pub id: String,
    /// Heading text.
    pub title: String,
}

impl DocumentSection {
    fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
        }
    }

    /// The sections used when no template is stored.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("overview", "Overview"),
            Self::new("architecture", "Architecture"),
            Self::new("components", "Components"),
            Self::new("deployment", "Deployment"),
        ]
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SectionTemplate {
    List(Vec<DocumentSection>),
    Wrapped { sections: Vec<DocumentSection> },
}

/// Writes one markdown document per validated diagram.
///
/// Output payload: `{ diagram, doc_path, sections, quality }` where
/// quality is the share of sections that came back non-empty.
#[derive(Debug)]
pub struct DocumentGenerator {
    services: Services,
    scorer: Arc<dyn Scorer>,
}

impl DocumentGenerator {
    /// Creates the processor.
    #[must_use]
    pub fn new(services: Services, scorer: Arc<dyn Scorer>) -> Self {
        Self { services, scorer }
    }

    async fn sections(&self) -> Result<Vec<DocumentSection>, ProcessorError> {
        let stored = self
            .services
            .store
            .read_optional("templates", "doc_structure.json")
            .await
            .map_err(|e| ProcessorError::from_service(self.stage_id(), &e))?;
        let Some(bytes) = stored else {
            return Ok(DocumentSection::defaults());
        };
        Ok(match serde_json::from_slice::<SectionTemplate>(&bytes) {
            Ok(SectionTemplate::List(sections) | SectionTemplate::Wrapped { sections })
                if !sections.is_empty() =>
            {
                sections
            }
            Ok(_) => DocumentSection::defaults(),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed document template");
                DocumentSection::defaults()
            }
        })
    }

    async fn section_prompt(
        &self,
        section: &DocumentSection,
        description: &str,
        context: &str,
    ) -> Result<String, ProcessorError> {
        let template = self
            .services
            .templates
            .get("doc-sections", &section.id)
            .await
            .map_err(|e| ProcessorError::from_service(self.stage_id(), &e))?;
        Ok(match template {
            Some(t) => t
                .replace("{context}", context)
                .replace("{description}", description),
            None => format!(
                "Generate {} section based on: {description}\nContext: {context}",
                section.id
            ),
        })
    }
}

/// Joins generated sections into one markdown document.
#[must_use]
pub fn assemble_document(sections: &[(DocumentSection, String)]) -> String {
    let mut document = String::from("# Pattern Documentation\n\n");
    for (section, content) in sections {
        document.push_str(&format!("## {}\n\n{content}\n\n", section.title));
    }
    document
}

#[async_trait]
impl StageProcessor for DocumentGenerator {
    fn stage_id(&self) -> StageId {
        StageId::DocumentGeneration
    }

    async fn process(&self, input: &StageInput) -> Result<StageOutput, ProcessorError> {
        let stage = self.stage_id();
        let diagram = input.str_field("diagram")?;
        let description = input.str_field("description")?;

        let sections = self.sections().await?;
        let mut written = Vec::with_capacity(sections.len());
        for section in sections {
            let passages = self
                .services
                .vectors
                .search(description, &section.id, RAG_RESULTS)
                .await
                .map_err(|e| ProcessorError::from_service(stage, &e))?;
            let context = passages.join("\n\n");
            let prompt = self.section_prompt(&section, description, &context).await?;
            let content = self
                .services
                .text
                .generate(&TextRequest::new(prompt, 2048))
                .await
                .map_err(|e| ProcessorError::from_service(stage, &e))?;
            debug!(section = %section.id, bytes = content.len(), "Generated section");
            written.push((section, content));
        }

        let doc_path = format!("docs/{diagram}.md");
        self.services
            .store
            .write(DOCS_BUCKET, &doc_path, assemble_document(&written).into_bytes())
            .await
            .map_err(|e| ProcessorError::from_service(stage, &e))?;

        let filled = written.iter().filter(|(_, c)| !c.trim().is_empty()).count();
        let payload = serde_json::json!({
            "diagram": diagram,
            "doc_path": doc_path,
            "sections": written.iter().map(|(s, _)| s.id.as_str()).collect::<Vec<_>>(),
            "quality": ratio_quality(filled, written.len()),
        });
        let score = self.scorer.score(stage, &payload)?;
        Ok(StageOutput::new(payload, score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::{CannedTextGenerator, MemoryObjectStore, MemoryTemplateTable};
    use crate::stages::PayloadFieldScorer;
    use crate::testing::OutageObjectStore;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn input() -> StageInput {
        StageInput::new(
            Uuid::new_v4(),
            StageId::DocumentGeneration,
            serde_json::json!({"diagram": "shop.png", "description": "A web shop"}),
        )
    }

    #[tokio::test]
    async fn test_generates_default_sections() {
        let store = Arc::new(MemoryObjectStore::new());
        let services = Services::in_memory().with_store(store.clone());
        let processor = DocumentGenerator::new(services, Arc::new(PayloadFieldScorer::default()));

        let output = processor.process(&input()).await.unwrap();
        assert_eq!(output.payload["doc_path"], "docs/shop.png.md");
        assert_eq!(
            output.payload["sections"],
            serde_json::json!(["overview", "architecture", "components", "deployment"])
        );
        assert_eq!(output.score.value(), 100.0);

        let doc = store.text(DOCS_BUCKET, "docs/shop.png.md").unwrap();
        assert!(doc.starts_with("# Pattern Documentation"));
        assert!(doc.contains("## Deployment"));
    }

    #[tokio::test]
    async fn test_uses_stored_structure_and_prompts() {
        let store = Arc::new(MemoryObjectStore::new().with_object(
            "templates",
            "doc_structure.json",
            r#"{"sections": [{"id": "overview", "title": "Overview"}]}"#,
        ));
        let templates = Arc::new(
            MemoryTemplateTable::new().with_row(
                "doc-sections",
                "overview",
                "Summarise {description}",
            ),
        );
        let services = Services::in_memory().with_store(store).with_templates(templates);
        let processor = DocumentGenerator::new(services, Arc::new(PayloadFieldScorer::default()));

        let output = processor.process(&input()).await.unwrap();
        assert_eq!(output.payload["sections"], serde_json::json!(["overview"]));
    }

    #[tokio::test]
    async fn test_empty_generation_lowers_quality() {
        let services = Services::in_memory()
            .with_text(Arc::new(CannedTextGenerator::new().with_text("  ")));
        let processor = DocumentGenerator::new(services, Arc::new(PayloadFieldScorer::default()));
        let output = processor.process(&input()).await.unwrap();
        assert_eq!(output.score.value(), 0.0);
    }

    #[tokio::test]
    async fn test_template_outage_fails_stage() {
        let store =
            OutageObjectStore::new(Arc::new(MemoryObjectStore::new())).with_outage("templates");
        let services = Services::in_memory().with_store(Arc::new(store));
        let processor = DocumentGenerator::new(services, Arc::new(PayloadFieldScorer::default()));

        let err = processor.process(&input()).await.unwrap_err();
        assert_eq!(err.stage, StageId::DocumentGeneration);
        assert!(err.message.contains("templates"));
    }

    #[test]
    fn test_assemble_document() {
        let doc = assemble_document(&[
            (DocumentSection::new("overview", "Overview"), "Intro".to_string()),
            (DocumentSection::new("deployment", "Deployment"), "Steps".to_string()),
        ]);
        assert_eq!(
            doc,
            "# Pattern Documentation\n\n## Overview\n\nIntro\n\n## Deployment\n\nSteps\n\n"
        );
    }
}
