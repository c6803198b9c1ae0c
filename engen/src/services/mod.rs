//! Service handles for the managed backends the stages talk to.
//!
//! Each backend is a trait so a run can be wired against real clients or
//! the in-memory implementations in [`memory`]. Handles are bundled in
//! [`Services`] and passed to the processors of a single run.

pub mod memory;

use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Blob storage addressed by bucket and path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads an object.
    async fn read(&self, bucket: &str, path: &str) -> Result<Vec<u8>, ServiceError>;

    /// Writes an object, replacing any previous content.
    async fn write(&self, bucket: &str, path: &str, content: Vec<u8>) -> Result<(), ServiceError>;

    /// Reads an object if it exists. Only not-found maps to `None`.
    async fn read_optional(
        &self,
        bucket: &str,
        path: &str,
    ) -> Result<Option<Vec<u8>>, ServiceError> {
        match self.read(bucket, path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// What the vision model reports about a diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionAnalysis {
    /// Similarity to known reference patterns, 0..=100.
    pub score: f64,
    /// Model confidence, 0..=1.
    pub confidence: f64,
    /// Reference patterns the diagram resembles.
    #[serde(default)]
    pub matches: Vec<String>,
}

/// Image analysis against reference diagrams.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// Compares an image with reference images under a prompt.
    async fn analyze(
        &self,
        image: &[u8],
        prompt: &str,
        references: &[Vec<u8>],
    ) -> Result<VisionAnalysis, ServiceError>;
}

/// A text generation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRequest {
    /// The prompt.
    pub prompt: String,
    /// Optional image to ground the answer.
    pub image: Option<Vec<u8>>,
    /// Ask for a JSON response.
    pub json: bool,
    /// Output token budget.
    pub max_tokens: u32,
}

impl TextRequest {
    /// Creates a plain text request.
    #[must_use]
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            ..Self::default()
        }
    }

    /// Attaches an image.
    #[must_use]
    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }

    /// Requests JSON output.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// Large language model text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates text for a request.
    async fn generate(&self, request: &TextRequest) -> Result<String, ServiceError>;
}

/// Retrieval over the pattern documentation corpus.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Returns up to `limit` passages relevant to `query` within a section.
    async fn search(
        &self,
        query: &str,
        section: &str,
        limit: usize,
    ) -> Result<Vec<String>, ServiceError>;
}

/// Key-value table of prompts and code templates.
#[async_trait]
pub trait TemplateTable: Send + Sync {
    /// Looks up a template.
    async fn get(&self, table: &str, key: &str) -> Result<Option<String>, ServiceError>;
}

/// A component extracted from pattern documentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentNode {
    /// Component id.
    pub id: String,
    /// Component type (e.g. "service", "database").
    #[serde(rename = "type", default = "default_component_kind")]
    pub kind: String,
    /// Every other property of the component.
    #[serde(default)]
    pub properties: serde_json::Value,
}

fn default_component_kind() -> String {
    "service".to_string()
}

/// A directed link between two components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Source component id.
    pub source: String,
    /// Target component id.
    pub target: String,
    /// Extra properties.
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// Graph storage for patterns, components and their relationships.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Inserts or updates a component under a pattern.
    async fn upsert_component(
        &self,
        pattern_id: &str,
        component: &ComponentNode,
    ) -> Result<(), ServiceError>;

    /// Links two components.
    async fn connect(&self, relationship: &Relationship) -> Result<(), ServiceError>;

    /// Lists component ids belonging to a pattern.
    async fn pattern_components(&self, pattern_id: &str) -> Result<Vec<String>, ServiceError>;

    /// Returns a component together with its neighbours.
    async fn component_context(&self, component_id: &str)
        -> Result<serde_json::Value, ServiceError>;

    /// Marks a pattern as deployed through a pull request.
    async fn mark_deployed(&self, pattern_id: &str, pr_url: &str) -> Result<(), ServiceError>;
}

/// A pull request to open against the pattern repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Target repository.
    pub repo: String,
    /// Title.
    pub title: String,
    /// Head branch.
    pub branch: String,
    /// Files keyed by path.
    pub files: BTreeMap<String, String>,
}

/// Publishes pull requests.
#[async_trait]
pub trait PullRequestPublisher: Send + Sync {
    /// Opens a pull request and returns its URL.
    async fn open(&self, request: &PullRequest) -> Result<String, ServiceError>;
}

/// Service handles scoped to one workflow run.
#[derive(Clone)]
pub struct Services {
    /// Blob storage.
    pub store: Arc<dyn ObjectStore>,
    /// Vision model.
    pub vision: Arc<dyn VisionAnalyzer>,
    /// Text model.
    pub text: Arc<dyn TextGenerator>,
    /// Documentation retrieval.
    pub vectors: Arc<dyn VectorIndex>,
    /// Prompt and code templates.
    pub templates: Arc<dyn TemplateTable>,
    /// Component graph.
    pub graph: Arc<dyn GraphStore>,
    /// Pull request publishing.
    pub publisher: Arc<dyn PullRequestPublisher>,
}

impl Services {
    /// Wires every handle to its in-memory implementation.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(memory::MemoryObjectStore::new()),
            vision: Arc::new(memory::FixedVisionAnalyzer::default()),
            text: Arc::new(memory::CannedTextGenerator::default()),
            vectors: Arc::new(memory::MemoryVectorIndex),
            templates: Arc::new(memory::MemoryTemplateTable::new()),
            graph: Arc::new(memory::MemoryGraphStore::new()),
            publisher: Arc::new(memory::RecordingPublisher::new()),
        }
    }

    /// Replaces the object store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = store;
        self
    }

    /// Replaces the vision analyzer.
    #[must_use]
    pub fn with_vision(mut self, vision: Arc<dyn VisionAnalyzer>) -> Self {
        self.vision = vision;
        self
    }

    /// Replaces the text generator.
    #[must_use]
    pub fn with_text(mut self, text: Arc<dyn TextGenerator>) -> Self {
        self.text = text;
        self
    }

    /// Replaces the template table.
    #[must_use]
    pub fn with_templates(mut self, templates: Arc<dyn TemplateTable>) -> Self {
        self.templates = templates;
        self
    }

    /// Replaces the graph store.
    #[must_use]
    pub fn with_graph(mut self, graph: Arc<dyn GraphStore>) -> Self {
        self.graph = graph;
        self
    }

    /// Replaces the pull request publisher.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn PullRequestPublisher>) -> Self {
        self.publisher = publisher;
        self
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
