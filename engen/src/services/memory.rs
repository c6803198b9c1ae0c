//! In-memory service implementations for development, demos and tests.

use super::{
    ComponentNode, GraphStore, ObjectStore, PullRequest, PullRequestPublisher, Relationship,
    TemplateTable, TextGenerator, TextRequest, VectorIndex, VisionAnalysis, VisionAnalyzer,
};
use crate::errors::ServiceError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Object store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object.
    #[must_use]
    pub fn with_object(self, bucket: &str, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.objects
            .write()
            .insert((bucket.to_string(), path.to_string()), content.into());
        self
    }

    /// Lists stored objects as `bucket/path`.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .keys()
            .map(|(bucket, path)| format!("{bucket}/{path}"))
            .collect()
    }

    /// Returns an object's content as UTF-8 text.
    #[must_use]
    pub fn text(&self, bucket: &str, path: &str) -> Option<String> {
        self.objects
            .read()
            .get(&(bucket.to_string(), path.to_string()))
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn read(&self, bucket: &str, path: &str) -> Result<Vec<u8>, ServiceError> {
        self.objects
            .read()
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| ServiceError::not_found("object_store", &format!("{bucket}/{path}")))
    }

    async fn write(&self, bucket: &str, path: &str, content: Vec<u8>) -> Result<(), ServiceError> {
        self.objects
            .write()
            .insert((bucket.to_string(), path.to_string()), content);
        Ok(())
    }
}

/// Vision analyzer that reports the same analysis for every image.
#[derive(Debug, Clone)]
pub struct FixedVisionAnalyzer {
    analysis: VisionAnalysis,
}

impl Default for FixedVisionAnalyzer {
    fn default() -> Self {
        Self::new(85.0, 0.9)
    }
}

impl FixedVisionAnalyzer {
    /// Creates an analyzer returning the given score and confidence.
    #[must_use]
    pub fn new(score: f64, confidence: f64) -> Self {
        Self {
            analysis: VisionAnalysis {
                score,
                confidence,
                matches: vec!["pattern_1".to_string(), "pattern_3".to_string()],
            },
        }
    }
}

#[async_trait]
impl VisionAnalyzer for FixedVisionAnalyzer {
    async fn analyze(
        &self,
        image: &[u8],
        _prompt: &str,
        _references: &[Vec<u8>],
    ) -> Result<VisionAnalysis, ServiceError> {
        if image.is_empty() {
            return Err(ServiceError::new("vision", "empty image"));
        }
        Ok(self.analysis.clone())
    }
}

/// Text generator returning canned responses.
#[derive(Debug, Clone)]
pub struct CannedTextGenerator {
    text: String,
    json: String,
}

impl Default for CannedTextGenerator {
    fn default() -> Self {
        Self {
            text: "Generated text content based on the prompt".to_string(),
            json: r#"{"components": [{"id": "comp1", "type": "service"}], "relationships": []}"#
                .to_string(),
        }
    }
}

impl CannedTextGenerator {
    /// Creates a generator with the default responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the plain-text response.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Sets the JSON response.
    #[must_use]
    pub fn with_json(mut self, json: impl Into<String>) -> Self {
        self.json = json.into();
        self
    }
}

#[async_trait]
impl TextGenerator for CannedTextGenerator {
    async fn generate(&self, request: &TextRequest) -> Result<String, ServiceError> {
        if request.json {
            Ok(self.json.clone())
        } else {
            Ok(self.text.clone())
        }
    }
}

/// Vector index returning numbered placeholder passages.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryVectorIndex;

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn search(
        &self,
        _query: &str,
        section: &str,
        limit: usize,
    ) -> Result<Vec<String>, ServiceError> {
        Ok((0..limit).map(|i| format!("{section} result {i}")).collect())
    }
}

/// Template table backed by a map.
#[derive(Debug, Default)]
pub struct MemoryTemplateTable {
    rows: RwLock<HashMap<(String, String), String>>,
}

impl MemoryTemplateTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a row.
    #[must_use]
    pub fn with_row(self, table: &str, key: &str, template: impl Into<String>) -> Self {
        self.rows
            .write()
            .insert((table.to_string(), key.to_string()), template.into());
        self
    }
}

#[async_trait]
impl TemplateTable for MemoryTemplateTable {
    async fn get(&self, table: &str, key: &str) -> Result<Option<String>, ServiceError> {
        Ok(self
            .rows
            .read()
            .get(&(table.to_string(), key.to_string()))
            .cloned())
    }
}

#[derive(Debug, Default)]
struct GraphData {
    patterns: BTreeMap<String, Vec<String>>,
    components: BTreeMap<String, ComponentNode>,
    relationships: Vec<Relationship>,
    deployments: BTreeMap<String, String>,
}

/// Graph store backed by maps.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    data: RwLock<GraphData>,
}

impl MemoryGraphStore {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored relationships.
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.data.read().relationships.len()
    }

    /// Returns the pull request URL a pattern was deployed with.
    #[must_use]
    pub fn deployment(&self, pattern_id: &str) -> Option<String> {
        self.data.read().deployments.get(pattern_id).cloned()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn upsert_component(
        &self,
        pattern_id: &str,
        component: &ComponentNode,
    ) -> Result<(), ServiceError> {
        let mut data = self.data.write();
        let members = data.patterns.entry(pattern_id.to_string()).or_default();
        if !members.contains(&component.id) {
            members.push(component.id.clone());
        }
        data.components
            .insert(component.id.clone(), component.clone());
        Ok(())
    }

    async fn connect(&self, relationship: &Relationship) -> Result<(), ServiceError> {
        let mut data = self.data.write();
        for id in [&relationship.source, &relationship.target] {
            if !data.components.contains_key(id) {
                return Err(ServiceError::not_found("graph", id));
            }
        }
        data.relationships.push(relationship.clone());
        Ok(())
    }

    async fn pattern_components(&self, pattern_id: &str) -> Result<Vec<String>, ServiceError> {
        Ok(self
            .data
            .read()
            .patterns
            .get(pattern_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn component_context(
        &self,
        component_id: &str,
    ) -> Result<serde_json::Value, ServiceError> {
        let data = self.data.read();
        let component = data
            .components
            .get(component_id)
            .ok_or_else(|| ServiceError::not_found("graph", component_id))?;
        let related: Vec<&Relationship> = data
            .relationships
            .iter()
            .filter(|r| r.source == component_id || r.target == component_id)
            .collect();
        Ok(serde_json::json!({
            "component": component,
            "relationships": related,
        }))
    }

    async fn mark_deployed(&self, pattern_id: &str, pr_url: &str) -> Result<(), ServiceError> {
        self.data
            .write()
            .deployments
            .insert(pattern_id.to_string(), pr_url.to_string());
        Ok(())
    }
}

/// Publisher that records pull requests instead of opening them.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    opened: RwLock<Vec<PullRequest>>,
}

impl RecordingPublisher {
    /// Creates an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded pull request.
    #[must_use]
    pub fn opened(&self) -> Vec<PullRequest> {
        self.opened.read().clone()
    }
}

#[async_trait]
impl PullRequestPublisher for RecordingPublisher {
    async fn open(&self, request: &PullRequest) -> Result<String, ServiceError> {
        let mut opened = self.opened.write();
        opened.push(request.clone());
        Ok(format!("memory://{}/pull/{}", request.repo, opened.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_object_store_round_trip() {
        let store = MemoryObjectStore::new();
        assert!(store.read("b", "p").await.is_err());
        assert_eq!(store.read_optional("b", "p").await.unwrap(), None);

        store.write("b", "p", b"hello".to_vec()).await.unwrap();
        assert_eq!(store.read("b", "p").await.unwrap(), b"hello");
        assert_eq!(store.keys(), vec!["b/p"]);
        assert_eq!(store.text("b", "p").as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_vision_rejects_empty_image() {
        let vision = FixedVisionAnalyzer::default();
        assert!(vision.analyze(&[], "", &[]).await.is_err());
        let analysis = vision.analyze(b"png", "", &[]).await.unwrap();
        assert_eq!(analysis.score, 85.0);
    }

    #[tokio::test]
    async fn test_canned_text_switches_on_json() {
        let text = CannedTextGenerator::new().with_text("plain").with_json("{}");
        assert_eq!(text.generate(&TextRequest::new("p", 10)).await.unwrap(), "plain");
        assert_eq!(text.generate(&TextRequest::new("p", 10).json()).await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_graph_links_and_context() {
        let graph = MemoryGraphStore::new();
        let api = ComponentNode {
            id: "api".into(),
            kind: "service".into(),
            properties: serde_json::json!({}),
        };
        let db = ComponentNode {
            id: "db".into(),
            kind: "database".into(),
            properties: serde_json::json!({}),
        };
        graph.upsert_component("p1", &api).await.unwrap();
        graph.upsert_component("p1", &db).await.unwrap();
        graph.upsert_component("p1", &api).await.unwrap();

        let rel = Relationship {
            source: "api".into(),
            target: "db".into(),
            properties: serde_json::Value::Null,
        };
        graph.connect(&rel).await.unwrap();

        assert_eq!(graph.pattern_components("p1").await.unwrap(), vec!["api", "db"]);
        let ctx = graph.component_context("api").await.unwrap();
        assert_eq!(ctx["relationships"].as_array().unwrap().len(), 1);

        let dangling = Relationship {
            source: "api".into(),
            target: "cache".into(),
            properties: serde_json::Value::Null,
        };
        assert!(graph.connect(&dangling).await.is_err());
        assert_eq!(graph.relationship_count(), 1);
    }

    #[tokio::test]
    async fn test_recording_publisher_numbers_requests() {
        let publisher = RecordingPublisher::new();
        let pr = PullRequest {
            repo: "engen-patterns".into(),
            title: "t".into(),
            branch: "b".into(),
            files: BTreeMap::new(),
        };
        assert_eq!(publisher.open(&pr).await.unwrap(), "memory://engen-patterns/pull/1");
        assert_eq!(publisher.open(&pr).await.unwrap(), "memory://engen-patterns/pull/2");
        assert_eq!(publisher.opened().len(), 2);
    }
}
