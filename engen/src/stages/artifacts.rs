//! Stage 4: generate deployment artifacts for every specified component.

use super::scoring::ratio_quality;
use super::{Scorer, StageInput, StageOutput, StageProcessor};
use crate::core::StageId;
use crate::errors::ProcessorError;
use crate::services::{Services, TextRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bucket the artifact bundles are written to.
pub const ARTIFACTS_BUCKET: &str = "generated-artifacts";
const TEMPLATE_TABLE: &str = "artifacts";

/// Kind of generated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Terraform infrastructure.
    Tf,
    /// Application code.
    Code,
    /// CI/CD pipeline definition.
    Pipeline,
}

impl ArtifactKind {
    /// Every kind, in generation order.
    pub const ALL: [Self; 3] = [Self::Tf, Self::Code, Self::Pipeline];

    /// Returns the bundle key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tf => "tf",
            Self::Code => "code",
            Self::Pipeline => "pipeline",
        }
    }

    /// Returns the template row suffix (`<component type>-<suffix>`).
    #[must_use]
    pub const fn template_suffix(self) -> &'static str {
        match self {
            Self::Tf => "terraform",
            Self::Code => "code",
            Self::Pipeline => "pipeline",
        }
    }

    /// Returns the file name used when the artifact is published.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Tf => "main.tf",
            Self::Code => "main.py",
            Self::Pipeline => "pipeline.yaml",
        }
    }

    /// Checks generated content; returns the reason it is unusable.
    pub fn check(self, content: &str) -> Result<(), String> {
        if content.trim().is_empty() {
            return Err("empty output".to_string());
        }
        if self == Self::Pipeline {
            serde_yaml::from_str::<serde_yaml::Value>(content)
                .map_err(|e| format!("invalid YAML: {e}"))?;
        }
        Ok(())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generated artifacts keyed by component id, then by kind.
pub type ArtifactBundle = BTreeMap<String, BTreeMap<ArtifactKind, String>>;

/// Generates Terraform, code and pipeline files per component.
///
/// Output payload: `{ pattern_id, bundle_path, artifacts, invalid, quality }`.
/// Quality is the share of artifacts passing [`ArtifactKind::check`].
#[derive(Debug)]
pub struct ArtifactGenerator {
    services: Services,
    scorer: Arc<dyn Scorer>,
}

impl ArtifactGenerator {
    /// Creates the processor.
    #[must_use]
    pub fn new(services: Services, scorer: Arc<dyn Scorer>) -> Self {
        Self { services, scorer }
    }

    async fn generate(
        &self,
        component_kind: &str,
        kind: ArtifactKind,
        context: &str,
    ) -> Result<String, ProcessorError> {
        let stage = self.stage_id();
        let key = format!("{component_kind}-{}", kind.template_suffix());
        let template = self
            .services
            .templates
            .get(TEMPLATE_TABLE, &key)
            .await
            .map_err(|e| ProcessorError::from_service(stage, &e))?;
        let prompt = match template {
            Some(t) => t.replace("{context}", context),
            None => {
                debug!(template = %key, "No artifact template, using generic prompt");
                format!(
                    "Generate {} for a {component_kind} component.\nContext: {context}",
                    kind.template_suffix()
                )
            }
        };
        self.services
            .text
            .generate(&TextRequest::new(prompt, 2048))
            .await
            .map_err(|e| ProcessorError::from_service(stage, &e))
    }
}

#[async_trait]
impl StageProcessor for ArtifactGenerator {
    fn stage_id(&self) -> StageId {
        StageId::ArtifactGeneration
    }

    async fn process(&self, input: &StageInput) -> Result<StageOutput, ProcessorError> {
        let stage = self.stage_id();
        let pattern_id = input.str_field("pattern_id")?;

        let components = self
            .services
            .graph
            .pattern_components(pattern_id)
            .await
            .map_err(|e| ProcessorError::from_service(stage, &e))?;

        let mut bundle = ArtifactBundle::new();
        let mut invalid = Vec::new();
        for component in &components {
            let context = self
                .services
                .graph
                .component_context(component)
                .await
                .map_err(|e| ProcessorError::from_service(stage, &e))?;
            let component_kind = context
                .pointer("/component/type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("service")
                .to_string();
            let context = context.to_string();

            let mut files = BTreeMap::new();
            for kind in ArtifactKind::ALL {
                let content = self.generate(&component_kind, kind, &context).await?;
                if let Err(reason) = kind.check(&content) {
                    warn!(
                        component = %component,
                        artifact = %kind,
                        %reason,
                        "Artifact failed validation"
                    );
                    invalid.push(format!("{component}/{kind}"));
                }
                files.insert(kind, content);
            }
            bundle.insert(component.clone(), files);
        }

        let bundle_path = format!("{pattern_id}.json");
        let encoded =
            serde_json::to_vec(&bundle).map_err(|e| ProcessorError::new(stage, e.to_string()))?;
        self.services
            .store
            .write(ARTIFACTS_BUCKET, &bundle_path, encoded)
            .await
            .map_err(|e| ProcessorError::from_service(stage, &e))?;

        let total = components.len() * ArtifactKind::ALL.len();
        let listing: BTreeMap<&str, Vec<ArtifactKind>> = bundle
            .iter()
            .map(|(id, files)| (id.as_str(), files.keys().copied().collect()))
            .collect();
        let payload = serde_json::json!({
            "pattern_id": pattern_id,
            "bundle_path": bundle_path,
            "artifacts": listing,
            "invalid": invalid,
            "quality": ratio_quality(total - invalid.len(), total),
        });
        let score = self.scorer.score(stage, &payload)?;
        Ok(StageOutput::new(payload, score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::{
        CannedTextGenerator, MemoryGraphStore, MemoryObjectStore, MemoryTemplateTable,
    };
    use crate::services::{ComponentNode, GraphStore};
    use crate::stages::PayloadFieldScorer;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    async fn graph_with(ids: &[&str]) -> Arc<MemoryGraphStore> {
        let graph = Arc::new(MemoryGraphStore::new());
        for id in ids {
            let node = ComponentNode {
                id: (*id).to_string(),
                kind: "service".to_string(),
                properties: serde_json::json!({}),
            };
            graph.upsert_component("shop.png", &node).await.unwrap();
        }
        graph
    }

    fn input() -> StageInput {
        StageInput::new(
            Uuid::new_v4(),
            StageId::ArtifactGeneration,
            serde_json::json!({"pattern_id": "shop.png"}),
        )
    }

    #[test]
    fn test_kind_checks() {
        assert!(ArtifactKind::Tf.check("resource \"x\" {}").is_ok());
        assert!(ArtifactKind::Code.check("   ").is_err());
        assert!(ArtifactKind::Pipeline.check("steps:\n  - build").is_ok());
        assert!(ArtifactKind::Pipeline.check("steps: [unclosed").is_err());
    }

    #[tokio::test]
    async fn test_generates_bundle_per_component() {
        let store = Arc::new(MemoryObjectStore::new());
        let services = Services::in_memory()
            .with_store(store.clone())
            .with_graph(graph_with(&["api", "db"]).await);
        let processor = ArtifactGenerator::new(services, Arc::new(PayloadFieldScorer::default()));

        let output = processor.process(&input()).await.unwrap();
        assert_eq!(output.score.value(), 100.0);
        assert_eq!(
            output.payload["artifacts"],
            serde_json::json!({"api": ["tf", "code", "pipeline"], "db": ["tf", "code", "pipeline"]})
        );

        let stored = store.text(ARTIFACTS_BUCKET, "shop.png.json").unwrap();
        let bundle: ArtifactBundle = serde_json::from_str(&stored).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle["api"].len(), 3);
    }

    #[tokio::test]
    async fn test_templates_keyed_by_component_type() {
        let templates = Arc::new(MemoryTemplateTable::new().with_row(
            "artifacts",
            "service-pipeline",
            "steps: [{context}",
        ));
        let text = Arc::new(CannedTextGenerator::new().with_text("steps: [unclosed"));
        let services = Services::in_memory()
            .with_templates(templates)
            .with_text(text)
            .with_graph(graph_with(&["api"]).await);
        let processor = ArtifactGenerator::new(services, Arc::new(PayloadFieldScorer::default()));

        let output = processor.process(&input()).await.unwrap();
        assert_eq!(output.payload["invalid"], serde_json::json!(["api/pipeline"]));
        assert!((output.score.value() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_pattern_without_components_scores_zero() {
        let processor =
            ArtifactGenerator::new(Services::in_memory(), Arc::new(PayloadFieldScorer::default()));
        let output = processor.process(&input()).await.unwrap();
        assert_eq!(output.score.value(), 0.0);
    }
}
