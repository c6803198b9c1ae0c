//! Stage 5: final human verification and deployment of the artifacts.

use super::artifacts::{ArtifactBundle, ARTIFACTS_BUCKET};
use super::{Scorer, StageInput, StageOutput, StageProcessor, StageResult};
use crate::core::StageId;
use crate::errors::ProcessorError;
use crate::services::{PullRequest, Services};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Repository approved patterns are proposed to.
pub const PATTERN_REPO: &str = "engen-patterns";

/// Flattens a bundle into repository file paths.
#[must_use]
pub fn bundle_files(bundle: &ArtifactBundle) -> BTreeMap<String, String> {
    bundle
        .iter()
        .flat_map(|(component, files)| {
            files.iter().map(move |(kind, content)| {
                (format!("{component}/{}", kind.file_name()), content.clone())
            })
        })
        .collect()
}

/// Packages the artifact bundle for sign-off and deploys it once approved.
///
/// `process` only summarizes what would ship; the pull request is opened
/// from [`StageProcessor::on_approved`] so nothing leaves the run before
/// the stage is approved.
#[derive(Debug)]
pub struct DeploymentVerifier {
    services: Services,
    scorer: Arc<dyn Scorer>,
}

impl DeploymentVerifier {
    /// Creates the processor.
    #[must_use]
    pub fn new(services: Services, scorer: Arc<dyn Scorer>) -> Self {
        Self { services, scorer }
    }

    async fn load_bundle(&self, pattern_id: &str) -> Result<ArtifactBundle, ProcessorError> {
        let stage = self.stage_id();
        let raw = self
            .services
            .store
            .read(ARTIFACTS_BUCKET, &format!("{pattern_id}.json"))
            .await
            .map_err(|e| ProcessorError::from_service(stage, &e))?;
        serde_json::from_slice(&raw)
            .map_err(|e| ProcessorError::new(stage, format!("bad artifact bundle: {e}")))
    }
}

#[async_trait]
impl StageProcessor for DeploymentVerifier {
    fn stage_id(&self) -> StageId {
        StageId::HumanVerification
    }

    async fn process(&self, input: &StageInput) -> Result<StageOutput, ProcessorError> {
        let stage = self.stage_id();
        let pattern_id = input.str_field("pattern_id")?;
        let bundle = self.load_bundle(pattern_id).await?;
        let files = bundle_files(&bundle);
        let invalid = input
            .payload
            .get("invalid")
            .and_then(serde_json::Value::as_array)
            .map_or(0, Vec::len);

        let quality = if files.is_empty() || invalid > 0 { 0.0 } else { 100.0 };
        let payload = serde_json::json!({
            "pattern_id": pattern_id,
            "components": bundle.len(),
            "files": files.keys().collect::<Vec<_>>(),
            "quality": quality,
        });
        let score = self.scorer.score(stage, &payload)?;
        Ok(StageOutput::new(payload, score))
    }

    async fn on_approved(
        &self,
        result: &StageResult,
    ) -> Result<Option<serde_json::Value>, ProcessorError> {
        let stage = self.stage_id();
        let pattern_id = result
            .payload
            .get("pattern_id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ProcessorError::new(stage, "approved result has no pattern_id"))?;

        let bundle = self.load_bundle(pattern_id).await?;
        let request = PullRequest {
            repo: PATTERN_REPO.to_string(),
            title: format!("Pattern {pattern_id} Implementation"),
            branch: format!("pattern/{pattern_id}"),
            files: bundle_files(&bundle),
        };
        let url = self
            .services
            .publisher
            .open(&request)
            .await
            .map_err(|e| ProcessorError::from_service(stage, &e))?;
        self.services
            .graph
            .mark_deployed(pattern_id, &url)
            .await
            .map_err(|e| ProcessorError::from_service(stage, &e))?;

        info!(pattern = %pattern_id, pr_url = %url, "Pattern deployed");
        Ok(Some(serde_json::json!({
            "pattern_id": pattern_id,
            "pull_request": url,
        })))
    }
}
