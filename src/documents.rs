//! Document operations: import, delete, and corpus inspection.
//!
//! Source paths are validated before anything is sent to the service:
//!
//! | Input | Handling |
//! |-------|----------|
//! | `https://drive.google.com/file/d/{ID}/...` | accepted as-is |
//! | `gs://{bucket}/{path}` | accepted as-is |
//! | `https://docs.google.com/{type}/d/{ID}/...` | rewritten to a Drive file link |
//! | anything else | rejected |

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::backend::PartialImport;
use crate::corpus::{corpus_exists, ensure_corpus, EnsureOutcome};
use crate::envelope::OperationResult;
use crate::models::{drive_file_url, FileSummary, ImportSettings};
use crate::resolve::resolve_corpus;
use crate::traits::ToolContext;

static DOC_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/d/([a-zA-Z0-9_-]+)").expect("valid regex"));

/// Classification of one input path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    DriveFile(String),
    CloudStorage(String),
    /// A Docs/Sheets/Slides link rewritten into a Drive file link.
    ConvertedDoc { original: String, converted: String },
    Invalid(String),
}

pub fn classify_source(path: &str) -> SourceKind {
    if path.contains("drive.google.com/file/d/") {
        return SourceKind::DriveFile(path.to_string());
    }
    if path.starts_with("gs://") {
        return SourceKind::CloudStorage(path.to_string());
    }
    if path.contains("docs.google.com") {
        if let Some(id) = DOC_ID.captures(path).and_then(|c| c.get(1)) {
            return SourceKind::ConvertedDoc {
                original: path.to_string(),
                converted: drive_file_url(id.as_str()),
            };
        }
    }
    SourceKind::Invalid(path.to_string())
}

/// Paths split into importable URIs and rejects.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidatedSources {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
    /// original link → rewritten link
    pub conversions: BTreeMap<String, String>,
}

pub fn validate_sources(paths: &[String]) -> ValidatedSources {
    let mut out = ValidatedSources::default();
    for path in paths {
        match classify_source(path) {
            SourceKind::DriveFile(p) | SourceKind::CloudStorage(p) => out.valid.push(p),
            SourceKind::ConvertedDoc {
                original,
                converted,
            } => {
                out.valid.push(converted.clone());
                out.conversions.insert(original, converted);
            }
            SourceKind::Invalid(p) => out.invalid.push(p),
        }
    }
    out
}

/// Import documents into a corpus, creating the corpus if needed.
pub async fn add_data(ctx: &ToolContext, corpus: &str, paths: &[String]) -> OperationResult {
    let sources = validate_sources(paths);

    if sources.valid.is_empty() {
        return OperationResult::error(
            "No valid paths provided. Please provide Google Drive URLs, Google Docs/Sheets/Slides URLs, or GCS paths.",
        )
        .with("invalid_paths", &sources.invalid);
    }

    let corpus_created = match ensure_corpus(ctx, corpus).await {
        Ok(EnsureOutcome::AlreadyExists) => false,
        Ok(EnsureOutcome::Created { .. }) => true,
        Err(e) => {
            return OperationResult::error(format!(
                "Unable to access or create corpus '{}': Error creating corpus: {}",
                corpus, e
            ))
            .with("corpus_name", corpus)
            .with("paths", paths);
        }
    };

    let resource_name = resolve_corpus(ctx, corpus).await.into_resource_name();
    let rag = &ctx.config().rag;
    let settings = ImportSettings {
        chunk_size: rag.chunk_size,
        chunk_overlap: rag.chunk_overlap,
        max_embedding_requests_per_min: rag.embedding_requests_per_min,
    };

    let outcome = match ctx
        .backend()
        .import_files(&resource_name, &sources.valid, &settings)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(partial) = e.downcast_ref::<PartialImport>() {
                return OperationResult::error(format!(
                    "Added {} file(s) to corpus '{}' before the import failed: {}",
                    partial.completed.imported, corpus, partial.cause
                ))
                .with("corpus_name", corpus)
                .with("corpus_created", corpus_created)
                .with("files_added", partial.completed.imported)
                .with("paths", &sources.valid)
                .with("invalid_paths", &sources.invalid)
                .with("conversions", &sources.conversions);
            }
            return OperationResult::error(format!("Error adding data to corpus: {}", e))
                .with("corpus_name", corpus)
                .with("corpus_created", corpus_created)
                .with("files_added", 0)
                .with("paths", paths);
        }
    };

    let creation_msg = if corpus_created {
        format!("Created new corpus '{}' and ", corpus)
    } else {
        String::new()
    };
    let conversion_msg = if sources.conversions.is_empty() {
        ""
    } else {
        " (Converted Google Docs URLs to Drive format)"
    };

    OperationResult::success(format!(
        "{}Successfully added {} file(s) to corpus '{}'{}",
        creation_msg, outcome.imported, corpus, conversion_msg
    ))
    .with("corpus_name", corpus)
    .with("corpus_created", corpus_created)
    .with("files_added", outcome.imported)
    .with("paths", &sources.valid)
    .with("invalid_paths", &sources.invalid)
    .with("conversions", &sources.conversions)
}

pub async fn delete_document(
    ctx: &ToolContext,
    corpus: &str,
    document_id: &str,
) -> OperationResult {
    if !corpus_exists(ctx, corpus).await {
        return OperationResult::error(format!(
            "Corpus '{}' does not exist, so the document cannot be deleted.",
            corpus
        ))
        .with("corpus_name", corpus)
        .with("document_id", document_id);
    }

    let resource_name = resolve_corpus(ctx, corpus).await.into_resource_name();
    let file_name = format!("{}/ragFiles/{}", resource_name, document_id);

    match ctx.backend().delete_file(&file_name).await {
        Ok(()) => OperationResult::success(format!(
            "Successfully deleted document '{}' from corpus '{}'",
            document_id, corpus
        ))
        .with("corpus_name", corpus)
        .with("document_id", document_id),
        Err(e) => OperationResult::error(format!("Error deleting document: {}", e))
            .with("corpus_name", corpus)
            .with("document_id", document_id),
    }
}

pub async fn get_corpus_info(ctx: &ToolContext, corpus: &str) -> OperationResult {
    if !corpus_exists(ctx, corpus).await {
        return OperationResult::error(format!("Corpus '{}' does not exist", corpus))
            .with("corpus_name", corpus);
    }

    let resource_name = resolve_corpus(ctx, corpus).await.into_resource_name();

    let display_name = match ctx.backend().get_corpus(&resource_name).await {
        Ok(c) if !c.display_name.is_empty() => c.display_name,
        Ok(_) => corpus.to_string(),
        Err(e) => {
            tracing::warn!(corpus = %resource_name, error = %e, "could not fetch corpus details");
            corpus.to_string()
        }
    };

    let files = match ctx.backend().list_files(&resource_name).await {
        Ok(files) => files,
        Err(e) => {
            return OperationResult::error(format!(
                "Error retrieving files for corpus '{}': {}",
                corpus, e
            ))
            .with("corpus_name", corpus)
            .with("corpus_resource_name", &resource_name);
        }
    };
    tracing::debug!(corpus = %resource_name, count = files.len(), "listed files");

    let files: Vec<FileSummary> = files.iter().map(FileSummary::from).collect();

    OperationResult::success(format!(
        "Successfully retrieved information for corpus '{}'",
        corpus
    ))
    .with("corpus_name", corpus)
    .with("corpus_resource_name", &resource_name)
    .with("display_name", display_name)
    .with("stats", serde_json::json!({ "file_count": files.len() }))
    .with("files", files)
}
