//! Remote RAG service abstraction.
//!
//! The [`RagBackend`] trait names every remote operation the tools consume.
//! Chunking, embedding, indexing and search all happen on the service side;
//! implementations only move requests and responses.
//!
//! - [`vertex::VertexRagClient`] talks to the Vertex AI RAG Engine REST API.
//! - [`memory::InMemoryBackend`] keeps corpora in process, for tests and
//!   offline runs.
//!
//! Implementations must be `Send + Sync` so a single instance can be shared
//! across server handlers behind an `Arc`.

pub mod memory;
pub mod vertex;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

use crate::models::{
    CorpusSpec, ImportOutcome, ImportSettings, RagCorpus, RagFile, RetrievalSettings,
    RetrievedContext,
};

#[async_trait]
pub trait RagBackend: Send + Sync {
    /// All corpora in the configured project and location.
    async fn list_corpora(&self) -> Result<Vec<RagCorpus>>;

    async fn get_corpus(&self, name: &str) -> Result<RagCorpus>;

    /// Create a corpus and wait until it is usable.
    async fn create_corpus(&self, spec: &CorpusSpec) -> Result<RagCorpus>;

    async fn delete_corpus(&self, name: &str) -> Result<()>;

    async fn list_files(&self, corpus: &str) -> Result<Vec<RagFile>>;

    /// Import `uris` into `corpus` and wait for the result.
    ///
    /// When the import is split into several requests and a later one
    /// fails, the error wraps a [`PartialImport`] carrying what the earlier
    /// requests already added.
    async fn import_files(
        &self,
        corpus: &str,
        uris: &[String],
        settings: &ImportSettings,
    ) -> Result<ImportOutcome>;

    /// Delete a file by its full resource path (`{corpus}/ragFiles/{id}`).
    async fn delete_file(&self, name: &str) -> Result<()>;

    /// Semantic search over one corpus, in the service's relevance order.
    async fn retrieve(
        &self,
        corpus: &str,
        text: &str,
        settings: &RetrievalSettings,
    ) -> Result<Vec<RetrievedContext>>;
}

/// An import that failed after earlier requests had already added files.
///
/// Travels inside the `anyhow::Error` returned by
/// [`RagBackend::import_files`]; recover it with `downcast_ref`.
#[derive(Debug)]
pub struct PartialImport {
    pub completed: ImportOutcome,
    pub cause: anyhow::Error,
}

impl fmt::Display for PartialImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (after {} file(s) were imported)",
            self.cause, self.completed.imported
        )
    }
}

impl std::error::Error for PartialImport {}
