//! Vertex AI RAG Engine REST client.
//!
//! Implements [`RagBackend`] over the `v1` REST surface:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list corpora | `GET {parent}/ragCorpora` (paged) |
//! | get corpus | `GET {name}` |
//! | create corpus | `POST {parent}/ragCorpora` (long-running) |
//! | delete corpus | `DELETE {name}` (long-running) |
//! | list files | `GET {corpus}/ragFiles` (paged) |
//! | import files | `POST {corpus}/ragFiles:import` (long-running) |
//! | delete file | `DELETE {file}` (long-running) |
//! | retrieve | `POST {parent}:retrieveContexts` |
//!
//! Long-running operations are polled every `vertex.operation_poll_secs`
//! until `done`.
//!
//! # Authentication
//!
//! A bearer token is read from the environment variable named by
//! `vertex.access_token_env`. When that is unset the client shells out to
//! `gcloud auth print-access-token` and reuses the result for
//! [`GCLOUD_TOKEN_TTL`].

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{PartialImport, RagBackend};
use crate::config::VertexConfig;
use crate::models::{
    CorpusSpec, ImportOutcome, ImportSettings, RagCorpus, RagFile, RetrievalSettings,
    RetrievedContext,
};

/// How long a token minted by `gcloud` is reused.
pub const GCLOUD_TOKEN_TTL: Duration = Duration::from_secs(45 * 60);

const PAGE_SIZE: u32 = 100;
const MAX_OPERATION_POLLS: u32 = 900;

enum TokenSource {
    Static(String),
    Environment {
        var: String,
        cached: Mutex<Option<(String, Instant)>>,
    },
}

pub struct VertexRagClient {
    http: reqwest::Client,
    base_url: String,
    parent: String,
    poll_interval: Duration,
    token: TokenSource,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Operation {
    name: String,
    done: bool,
    error: Option<OperationError>,
    response: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OperationError {
    code: i32,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListCorporaPage {
    rag_corpora: Vec<RagCorpus>,
    next_page_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListFilesPage {
    rag_files: Vec<RagFile>,
    next_page_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RetrieveResponse {
    contexts: Option<ContextGroup>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContextGroup {
    contexts: Vec<RetrievedContext>,
}

/// An import source accepted by `ragFiles:import`.
#[derive(Debug, Clone, PartialEq)]
enum ImportSource {
    Gcs(String),
    DriveFile(String),
    DriveFolder(String),
}

impl VertexRagClient {
    /// Client authenticating through the environment or `gcloud`.
    pub fn new(config: &VertexConfig) -> Result<Self> {
        Self::build(
            config,
            TokenSource::Environment {
                var: config.access_token_env.clone(),
                cached: Mutex::new(None),
            },
        )
    }

    /// Client using a fixed bearer token.
    pub fn with_token(config: &VertexConfig, token: impl Into<String>) -> Result<Self> {
        Self::build(config, TokenSource::Static(token.into()))
    }

    fn build(config: &VertexConfig, token: TokenSource) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            parent: config.parent(),
            poll_interval: Duration::from_secs(config.operation_poll_secs),
            token,
        })
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/v1/{}", self.base_url, resource)
    }

    async fn access_token(&self) -> Result<String> {
        match &self.token {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Environment { var, cached } => {
                if let Ok(token) = std::env::var(var) {
                    if !token.trim().is_empty() {
                        return Ok(token.trim().to_string());
                    }
                }

                let mut cached = cached.lock().await;
                if let Some((token, minted)) = cached.as_ref() {
                    if minted.elapsed() < GCLOUD_TOKEN_TTL {
                        return Ok(token.clone());
                    }
                }

                let token = gcloud_access_token()
                    .await
                    .with_context(|| format!("{} not set and gcloud token lookup failed", var))?;
                *cached = Some((token.clone(), Instant::now()));
                Ok(token)
            }
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let token = self.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .context("Vertex AI request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Vertex AI API error {}: {}", status, body.trim());
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&text).context("Failed to parse Vertex AI response")
    }

    async fn get(&self, resource: &str, query: &[(&str, String)]) -> Result<Value> {
        self.send(self.http.get(self.url(resource)).query(query)).await
    }

    async fn post(&self, resource: &str, body: &Value) -> Result<Value> {
        self.send(self.http.post(self.url(resource)).json(body)).await
    }

    async fn delete(&self, resource: &str) -> Result<Value> {
        self.send(self.http.delete(self.url(resource))).await
    }

    /// Poll a long-running operation until it finishes; returns its `response`.
    async fn wait(&self, initial: Value) -> Result<Value> {
        let mut op: Operation =
            serde_json::from_value(initial).context("Malformed long-running operation")?;

        for _ in 0..MAX_OPERATION_POLLS {
            if op.done {
                if let Some(err) = op.error {
                    bail!(
                        "operation {} failed (code {}): {}",
                        op.name,
                        err.code,
                        err.message
                    );
                }
                return Ok(op.response.unwrap_or(Value::Null));
            }
            if op.name.is_empty() {
                bail!("long-running operation has no name to poll");
            }
            tokio::time::sleep(self.poll_interval).await;
            let name = op.name.clone();
            op = serde_json::from_value(self.get(&name, &[]).await?)
                .context("Malformed long-running operation")?;
        }

        bail!("operation {} did not finish", op.name)
    }

    async fn import_batch(
        &self,
        corpus: &str,
        source: Value,
        settings: &ImportSettings,
    ) -> Result<ImportOutcome> {
        let mut config = json!({
            "ragFileTransformationConfig": {
                "ragFileChunkingConfig": {
                    "fixedLengthChunking": {
                        "chunkSize": settings.chunk_size,
                        "chunkOverlap": settings.chunk_overlap,
                    }
                }
            },
            "maxEmbeddingRequestsPerMin": settings.max_embedding_requests_per_min,
        });
        if let (Some(obj), Value::Object(src)) = (config.as_object_mut(), source) {
            obj.extend(src);
        }

        let op = self
            .post(
                &format!("{}/ragFiles:import", corpus),
                &json!({ "importRagFilesConfig": config }),
            )
            .await?;
        let response = self.wait(op).await?;
        if response.is_null() {
            return Ok(ImportOutcome::default());
        }
        serde_json::from_value(response).context("Malformed import response")
    }
}

/// Mint a token with the local gcloud installation.
async fn gcloud_access_token() -> Result<String> {
    let output = tokio::process::Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .await
        .context("Failed to run gcloud")?;
    if !output.status.success() {
        bail!(
            "gcloud auth print-access-token failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let token = String::from_utf8(output.stdout)?.trim().to_string();
    if token.is_empty() {
        bail!("gcloud returned an empty access token");
    }
    Ok(token)
}

fn classify_import_source(uri: &str) -> Result<ImportSource> {
    if uri.starts_with("gs://") {
        return Ok(ImportSource::Gcs(uri.to_string()));
    }
    if let Some(rest) = uri.split("/file/d/").nth(1) {
        if let Some(id) = rest.split(['/', '?']).next().filter(|s| !s.is_empty()) {
            return Ok(ImportSource::DriveFile(id.to_string()));
        }
    }
    if let Some(rest) = uri.split("/folders/").nth(1) {
        if let Some(id) = rest.split(['/', '?']).next().filter(|s| !s.is_empty()) {
            return Ok(ImportSource::DriveFolder(id.to_string()));
        }
    }
    bail!("unsupported import source: {}", uri)
}

/// Split `uris` into a Cloud Storage source and a Drive source; the import
/// API accepts one source kind per request.
fn import_sources(uris: &[String]) -> Result<Vec<Value>> {
    let mut gcs = Vec::new();
    let mut drive = Vec::new();
    for uri in uris {
        match classify_import_source(uri)? {
            ImportSource::Gcs(u) => gcs.push(u),
            ImportSource::DriveFile(id) => drive.push(json!({
                "resourceId": id,
                "resourceType": "RESOURCE_TYPE_FILE",
            })),
            ImportSource::DriveFolder(id) => drive.push(json!({
                "resourceId": id,
                "resourceType": "RESOURCE_TYPE_FOLDER",
            })),
        }
    }

    let mut sources = Vec::new();
    if !gcs.is_empty() {
        sources.push(json!({ "gcsSource": { "uris": gcs } }));
    }
    if !drive.is_empty() {
        sources.push(json!({ "googleDriveSource": { "resourceIds": drive } }));
    }
    Ok(sources)
}

#[async_trait]
impl RagBackend for VertexRagClient {
    async fn list_corpora(&self) -> Result<Vec<RagCorpus>> {
        let resource = format!("{}/ragCorpora", self.parent);
        let mut corpora = Vec::new();
        let mut page_token = String::new();
        loop {
            let mut query = vec![("pageSize", PAGE_SIZE.to_string())];
            if !page_token.is_empty() {
                query.push(("pageToken", page_token.clone()));
            }
            let page: ListCorporaPage = serde_json::from_value(self.get(&resource, &query).await?)
                .context("Malformed corpus list")?;
            corpora.extend(page.rag_corpora);
            if page.next_page_token.is_empty() {
                break;
            }
            page_token = page.next_page_token;
        }
        Ok(corpora)
    }

    async fn get_corpus(&self, name: &str) -> Result<RagCorpus> {
        serde_json::from_value(self.get(name, &[]).await?).context("Malformed corpus")
    }

    async fn create_corpus(&self, spec: &CorpusSpec) -> Result<RagCorpus> {
        let body = json!({
            "displayName": spec.display_name,
            "vectorDbConfig": {
                "ragEmbeddingModelConfig": {
                    "vertexPredictionEndpoint": {
                        "endpoint": spec.embedding_endpoint,
                    }
                }
            }
        });
        tracing::info!(display_name = %spec.display_name, "creating corpus");
        let op = self.post(&format!("{}/ragCorpora", self.parent), &body).await?;
        let response = self.wait(op).await?;
        if response.is_null() {
            bail!("create corpus operation returned no corpus");
        }
        serde_json::from_value(response).context("Malformed created corpus")
    }

    async fn delete_corpus(&self, name: &str) -> Result<()> {
        tracing::info!(corpus = %name, "deleting corpus");
        let op = self.delete(name).await?;
        self.wait(op).await?;
        Ok(())
    }

    async fn list_files(&self, corpus: &str) -> Result<Vec<RagFile>> {
        let resource = format!("{}/ragFiles", corpus);
        let mut files = Vec::new();
        let mut page_token = String::new();
        loop {
            let mut query = vec![("pageSize", PAGE_SIZE.to_string())];
            if !page_token.is_empty() {
                query.push(("pageToken", page_token.clone()));
            }
            let page: ListFilesPage = serde_json::from_value(self.get(&resource, &query).await?)
                .context("Malformed file list")?;
            files.extend(page.rag_files);
            if page.next_page_token.is_empty() {
                break;
            }
            page_token = page.next_page_token;
        }
        Ok(files)
    }

    async fn import_files(
        &self,
        corpus: &str,
        uris: &[String],
        settings: &ImportSettings,
    ) -> Result<ImportOutcome> {
        tracing::info!(corpus = %corpus, count = uris.len(), "importing files");
        let mut total = ImportOutcome::default();
        for (i, source) in import_sources(uris)?.into_iter().enumerate() {
            match self.import_batch(corpus, source, settings).await {
                Ok(outcome) => total = total.merge(outcome),
                Err(cause) if i > 0 => {
                    tracing::warn!(
                        corpus = %corpus,
                        imported = total.imported,
                        error = %cause,
                        "import stopped part way"
                    );
                    return Err(PartialImport {
                        completed: total,
                        cause,
                    }
                    .into());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        tracing::info!(file = %name, "deleting file");
        let op = self.delete(name).await?;
        self.wait(op).await?;
        Ok(())
    }

    async fn retrieve(
        &self,
        corpus: &str,
        text: &str,
        settings: &RetrievalSettings,
    ) -> Result<Vec<RetrievedContext>> {
        let body = json!({
            "vertexRagStore": {
                "ragResources": [{ "ragCorpus": corpus }]
            },
            "query": {
                "text": text,
                "ragRetrievalConfig": {
                    "topK": settings.top_k,
                    "filter": {
                        "vectorDistanceThreshold": settings.vector_distance_threshold,
                    }
                }
            }
        });
        let response: RetrieveResponse = serde_json::from_value(
            self.post(&format!("{}:retrieveContexts", self.parent), &body).await?,
        )
        .context("Malformed retrieval response")?;
        Ok(response.contexts.map(|g| g.contexts).unwrap_or_default())
    }
}
