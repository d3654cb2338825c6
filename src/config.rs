//! Configuration loading.
//!
//! Settings come from an optional TOML file, then environment overrides,
//! then validation. Every key has a default, so an absent file yields a
//! usable configuration as long as credentials are available at call time.
//!
//! ```toml
//! [vertex]
//! project = "my-project"
//! location = "us-central1"
//!
//! [rag]
//! chunk_size = 512
//! chunk_overlap = 100
//! top_k = 3
//! distance_threshold = 0.5
//!
//! [server]
//! bind = "127.0.0.1:7331"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub vertex: VertexConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VertexConfig {
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default = "default_location")]
    pub location: String,
    /// Base URL override. Derived from `location` when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Name of the environment variable holding an OAuth access token.
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Delay between polls of a long-running operation. Must be > 0 in a
    /// loaded config; a client built directly may use 0 against a local fake.
    #[serde(default = "default_operation_poll_secs")]
    pub operation_poll_secs: u64,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            project: default_project(),
            location: default_location(),
            endpoint: None,
            access_token_env: default_access_token_env(),
            timeout_secs: default_timeout_secs(),
            operation_poll_secs: default_operation_poll_secs(),
        }
    }
}

impl VertexConfig {
    /// Base URL of the regional Vertex AI API.
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        }
    }

    /// `projects/{project}/locations/{location}`
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.location)
    }
}

fn default_project() -> String {
    "adk-vertexai-rag".to_string()
}
fn default_location() -> String {
    "us-central1".to_string()
}
fn default_access_token_env() -> String {
    "GOOGLE_OAUTH_ACCESS_TOKEN".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_operation_poll_secs() -> u64 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct RagConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_requests_per_min")]
    pub embedding_requests_per_min: u32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            distance_threshold: default_distance_threshold(),
            embedding_model: default_embedding_model(),
            embedding_requests_per_min: default_embedding_requests_per_min(),
        }
    }
}

fn default_chunk_size() -> u32 {
    512
}
fn default_chunk_overlap() -> u32 {
    100
}
fn default_top_k() -> u32 {
    3
}
fn default_distance_threshold() -> f64 {
    0.5
}
fn default_embedding_model() -> String {
    "publishers/google/models/text-embedding-005".to_string()
}
fn default_embedding_requests_per_min() -> u32 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7331".to_string()
}

/// Load configuration from `path` (if it exists) and the process environment.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Taking the lookup as a closure keeps tests away from the process
/// environment.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("GOOGLE_CLOUD_PROJECT") {
        config.vertex.project = v;
    }
    if let Some(v) = lookup("GOOGLE_CLOUD_LOCATION") {
        config.vertex.location = v;
    }
    if let Some(v) = lookup("VERTEX_ENDPOINT") {
        config.vertex.endpoint = Some(v);
    }
    if let Some(v) = lookup("RAG_CHUNK_SIZE") {
        config.rag.chunk_size = parse_env("RAG_CHUNK_SIZE", &v)?;
    }
    if let Some(v) = lookup("RAG_CHUNK_OVERLAP") {
        config.rag.chunk_overlap = parse_env("RAG_CHUNK_OVERLAP", &v)?;
    }
    if let Some(v) = lookup("RAG_TOP_K") {
        config.rag.top_k = parse_env("RAG_TOP_K", &v)?;
    }
    if let Some(v) = lookup("RAG_DISTANCE_THRESHOLD") {
        config.rag.distance_threshold = parse_env("RAG_DISTANCE_THRESHOLD", &v)?;
    }
    if let Some(v) = lookup("RAG_EMBEDDING_MODEL") {
        config.rag.embedding_model = v;
    }
    if let Some(v) = lookup("RAG_EMBEDDING_REQUESTS_PER_MIN") {
        config.rag.embedding_requests_per_min = parse_env("RAG_EMBEDDING_REQUESTS_PER_MIN", &v)?;
    }
    Ok(())
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: '{}'", key, value))
}

pub fn validate(config: &Config) -> Result<()> {
    if config.vertex.project.trim().is_empty() {
        anyhow::bail!("vertex.project must not be empty");
    }
    if config.vertex.location.trim().is_empty() {
        anyhow::bail!("vertex.location must not be empty");
    }
    if config.vertex.timeout_secs == 0 {
        anyhow::bail!("vertex.timeout_secs must be > 0");
    }
    if config.vertex.operation_poll_secs == 0 {
        anyhow::bail!("vertex.operation_poll_secs must be > 0");
    }

    let rag = &config.rag;
    if rag.chunk_size == 0 {
        anyhow::bail!("rag.chunk_size must be > 0");
    }
    if rag.chunk_overlap >= rag.chunk_size {
        anyhow::bail!(
            "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
            rag.chunk_overlap,
            rag.chunk_size
        );
    }
    if rag.top_k < 1 {
        anyhow::bail!("rag.top_k must be >= 1");
    }
    if !rag.distance_threshold.is_finite() || rag.distance_threshold < 0.0 {
        anyhow::bail!("rag.distance_threshold must be a finite value >= 0");
    }
    if rag.embedding_requests_per_min == 0 {
        anyhow::bail!("rag.embedding_requests_per_min must be > 0");
    }
    if rag.embedding_model.trim().is_empty() {
        anyhow::bail!("rag.embedding_model must not be empty");
    }

    Ok(())
}
