//! Stage 3: extract component specifications and store them in the graph.

use super::document::DOCS_BUCKET;
use super::scoring::ratio_quality;
use super::{Scorer, StageInput, StageOutput, StageProcessor};
use crate::core::StageId;
use crate::errors::ProcessorError;
use crate::services::{ComponentNode, Relationship, Services, TextRequest};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

const EXAMPLE_COUNT: usize = 3;

/// Derives the pattern id from a document path (`docs/<id>.md`).
#[must_use]
pub fn pattern_id_from_doc_path(doc_path: &str) -> String {
    let file = doc_path.rsplit('/').next().unwrap_or(doc_path);
    file.strip_suffix(".md").unwrap_or(file).to_string()
}

/// Components and relationships pulled out of a specification document.
#[derive(Debug, Default, PartialEq)]
pub struct ExtractedSpec {
    /// Components with an id.
    pub components: Vec<ComponentNode>,
    /// Relationships with a source and target.
    pub relationships: Vec<Relationship>,
}

impl ExtractedSpec {
    /// Parses model output, tolerating both map- and list-shaped components.
    ///
    /// Malformed JSON yields an empty spec.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Specification output is not JSON");
                return Self::default();
            }
        };

        let components = match value.get("components") {
            Some(serde_json::Value::Object(map)) => map
                .iter()
                .filter_map(|(key, c)| component_from(c, key))
                .collect(),
            Some(serde_json::Value::Array(list)) => list
                .iter()
                .enumerate()
                .filter_map(|(i, c)| component_from(c, &format!("comp_{i}")))
                .collect(),
            _ => Vec::new(),
        };

        let relationships = value
            .get("relationships")
            .and_then(serde_json::Value::as_array)
            .map(|list| list.iter().filter_map(relationship_from).collect())
            .unwrap_or_default();

        Self {
            components,
            relationships,
        }
    }
}

fn component_from(value: &serde_json::Value, fallback_id: &str) -> Option<ComponentNode> {
    let object = value.as_object()?;
    let id = object
        .get("id")
        .and_then(serde_json::Value::as_str)
        .unwrap_or(fallback_id);
    let kind = object
        .get("type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("service");
    Some(ComponentNode {
        id: id.to_string(),
        kind: kind.to_string(),
        properties: value.clone(),
    })
}

fn relationship_from(value: &serde_json::Value) -> Option<Relationship> {
    let source = value.get("source")?.as_str()?;
    let target = value.get("target")?.as_str()?;
    Some(Relationship {
        source: source.to_string(),
        target: target.to_string(),
        properties: value.clone(),
    })
}

/// Turns documentation into a component graph.
///
/// Output payload: `{ diagram, doc_path, pattern_id, components,
/// relationships, quality }`. Quality counts one check for having any
/// components and one per relationship whose ends both exist.
#[derive(Debug)]
pub struct ComponentSpecifier {
    services: Services,
    scorer: Arc<dyn Scorer>,
}

impl ComponentSpecifier {
    /// Creates the processor.
    #[must_use]
    pub fn new(services: Services, scorer: Arc<dyn Scorer>) -> Self {
        Self { services, scorer }
    }

    async fn optional_text(
        &self,
        bucket: &str,
        path: &str,
    ) -> Result<Option<String>, ProcessorError> {
        let stored = self
            .services
            .store
            .read_optional(bucket, path)
            .await
            .map_err(|e| ProcessorError::from_service(self.stage_id(), &e))?;
        Ok(stored.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn extraction_prompt(&self, content: &str) -> Result<String, ProcessorError> {
        let schema = self
            .optional_text("schemas", "component_spec.json")
            .await?
            .unwrap_or_else(|| "{}".to_string());
        let mut examples = Vec::new();
        for i in 1..=EXAMPLE_COUNT {
            let example = self
                .optional_text("spec-examples", &format!("example_{i}.json"))
                .await?;
            examples.extend(example);
        }
        let examples = format!("[{}]", examples.join(","));

        let template = self
            .optional_text("prompts", "spec_extraction_prompt.txt")
            .await?;
        Ok(match template {
            Some(template) => template
                .replace("{schema}", &schema)
                .replace("{examples}", &examples)
                .replace("{content}", content),
            None => format!(
                "Extract component specifications from the following documentation:\n\
                 Schema: {schema}\nExamples: {examples}\nContent: {content}\n\
                 Please return JSON with components and relationships."
            ),
        })
    }
}

#[async_trait]
impl StageProcessor for ComponentSpecifier {
    fn stage_id(&self) -> StageId {
        StageId::ComponentSpecification
    }

    async fn process(&self, input: &StageInput) -> Result<StageOutput, ProcessorError> {
        let stage = self.stage_id();
        let doc_path = input.str_field("doc_path")?;
        let diagram = input.str_field("diagram")?;
        let pattern_id = pattern_id_from_doc_path(doc_path);

        let content = self
            .services
            .store
            .read(DOCS_BUCKET, doc_path)
            .await
            .map_err(|e| ProcessorError::from_service(stage, &e))?;
        let content = String::from_utf8_lossy(&content);

        let prompt = self.extraction_prompt(&content).await?;
        let raw = self
            .services
            .text
            .generate(&TextRequest::new(prompt, 4096).json())
            .await
            .map_err(|e| ProcessorError::from_service(stage, &e))?;
        let spec = ExtractedSpec::parse(&raw);

        for component in &spec.components {
            self.services
                .graph
                .upsert_component(&pattern_id, component)
                .await
                .map_err(|e| ProcessorError::from_service(stage, &e))?;
        }

        let known: HashSet<&str> = spec.components.iter().map(|c| c.id.as_str()).collect();
        let mut linked = 0;
        for relationship in &spec.relationships {
            if known.contains(relationship.source.as_str())
                && known.contains(relationship.target.as_str())
            {
                self.services
                    .graph
                    .connect(relationship)
                    .await
                    .map_err(|e| ProcessorError::from_service(stage, &e))?;
                linked += 1;
            } else {
                warn!(
                    source = %relationship.source,
                    target = %relationship.target,
                    "Skipping relationship with unknown endpoint"
                );
            }
        }
        debug!(
            pattern = %pattern_id,
            components = spec.components.len(),
            relationships = linked,
            "Stored specification"
        );

        let passed = usize::from(!spec.components.is_empty()) + linked;
        let total = 1 + spec.relationships.len();
        let payload = serde_json::json!({
            "diagram": diagram,
            "doc_path": doc_path,
            "pattern_id": pattern_id,
            "components": spec.components.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            "relationships": linked,
            "quality": ratio_quality(passed, total),
        });
        let score = self.scorer.score(stage, &payload)?;
        Ok(StageOutput::new(payload, score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::{CannedTextGenerator, MemoryGraphStore, MemoryObjectStore};
    use crate::services::GraphStore;
    use crate::stages::PayloadFieldScorer;
    use crate::testing::OutageObjectStore;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn input() -> StageInput {
        StageInput::new(
            Uuid::new_v4(),
            StageId::ComponentSpecification,
            serde_json::json!({"diagram": "shop.png", "doc_path": "docs/shop.png.md"}),
        )
    }

    fn services(json: &str, graph: Arc<MemoryGraphStore>) -> Services {
        let store = MemoryObjectStore::new().with_object(
            DOCS_BUCKET,
            "docs/shop.png.md",
            "# Pattern Documentation",
        );
        Services::in_memory()
            .with_store(Arc::new(store))
            .with_text(Arc::new(CannedTextGenerator::new().with_json(json)))
            .with_graph(graph)
    }

    #[test]
    fn test_pattern_id_from_doc_path() {
        assert_eq!(pattern_id_from_doc_path("docs/shop.png.md"), "shop.png");
        assert_eq!(pattern_id_from_doc_path("plain"), "plain");
    }

    #[test]
    fn test_parse_map_and_list_components() {
        let map = ExtractedSpec::parse(r#"{"components": {"api": {"type": "service"}}}"#);
        assert_eq!(map.components[0].id, "api");

        let list = ExtractedSpec::parse(r#"{"components": [{"type": "db"}, 7, {"id": "web"}]}"#);
        let ids: Vec<&str> = list.components.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["comp_0", "web"]);
        assert_eq!(list.components[0].kind, "db");
    }

    #[test]
    fn test_parse_malformed_is_empty() {
        assert_eq!(ExtractedSpec::parse("not json"), ExtractedSpec::default());
    }

    #[tokio::test]
    async fn test_stores_components_and_links() {
        let graph = Arc::new(MemoryGraphStore::new());
        let json = r#"{"components": [{"id": "api"}, {"id": "db"}],
                       "relationships": [{"source": "api", "target": "db"},
                                         {"source": "api", "target": "cache"}]}"#;
        let processor = ComponentSpecifier::new(
            services(json, graph.clone()),
            Arc::new(PayloadFieldScorer::default()),
        );

        let output = processor.process(&input()).await.unwrap();
        assert_eq!(output.payload["pattern_id"], "shop.png");
        assert_eq!(output.payload["components"], serde_json::json!(["api", "db"]));
        assert_eq!(output.payload["relationships"], 1);
        // components present + one of two links resolved
        assert!((output.score.value() - 200.0 / 3.0).abs() < 1e-9);

        assert_eq!(graph.pattern_components("shop.png").await.unwrap(), vec!["api", "db"]);
        assert_eq!(graph.relationship_count(), 1);
    }

    #[tokio::test]
    async fn test_schema_outage_fails_stage() {
        let inner = Arc::new(MemoryObjectStore::new().with_object(
            DOCS_BUCKET,
            "docs/shop.png.md",
            "# Pattern Documentation",
        ));
        let store = OutageObjectStore::new(inner).with_outage("schemas");
        let graph = Arc::new(MemoryGraphStore::new());
        let services = Services::in_memory()
            .with_store(Arc::new(store))
            .with_graph(graph.clone());
        let processor = ComponentSpecifier::new(services, Arc::new(PayloadFieldScorer::default()));

        let err = processor.process(&input()).await.unwrap_err();
        assert_eq!(err.stage, StageId::ComponentSpecification);
        assert_eq!(graph.relationship_count(), 0);
    }

    #[tokio::test]
    async fn test_no_components_scores_zero() {
        let graph = Arc::new(MemoryGraphStore::new());
        let processor = ComponentSpecifier::new(
            services("garbage", graph),
            Arc::new(PayloadFieldScorer::default()),
        );
        let output = processor.process(&input()).await.unwrap();
        assert_eq!(output.score.value(), 0.0);
    }
}
