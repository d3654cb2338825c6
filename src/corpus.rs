//! Corpus lifecycle: existence checks, create-if-absent, delete, list.
//!
//! Existence is cached in the caller's [`SessionState`](crate::session::SessionState)
//! under the identifier exactly as supplied. A cached `true` is trusted
//! without a remote call; a `false` or missing entry triggers a remote
//! lookup.

use anyhow::Result;

use crate::envelope::OperationResult;
use crate::models::{CorpusSpec, CorpusSummary};
use crate::resolve::{resolve_corpus, sanitize_id};
use crate::traits::ToolContext;

/// Outcome of [`ensure_corpus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    AlreadyExists,
    Created {
        resource_name: String,
        display_name: String,
    },
}

/// Whether the corpus exists, consulting the session cache first.
///
/// Remote failures count as "does not exist".
pub async fn corpus_exists(ctx: &ToolContext, corpus: &str) -> bool {
    if ctx.session().corpus_known(corpus) {
        return true;
    }

    let resource_name = resolve_corpus(ctx, corpus).await.into_resource_name();

    match ctx.backend().list_corpora().await {
        Ok(corpora) => {
            let found = corpora
                .iter()
                .any(|c| c.name == resource_name || c.display_name == corpus);
            if found {
                ctx.session().mark_corpus(corpus, true);
            }
            found
        }
        Err(e) => {
            tracing::warn!(corpus = %corpus, error = %e, "existence check failed");
            false
        }
    }
}

/// Fully qualified embedding endpoint for the configured publisher model.
pub fn embedding_endpoint(ctx: &ToolContext) -> String {
    let model = &ctx.config().rag.embedding_model;
    if model.starts_with("projects/") {
        model.clone()
    } else {
        format!("{}/{}", ctx.config().vertex.parent(), model)
    }
}

/// Create the corpus unless it already exists.
pub async fn ensure_corpus(ctx: &ToolContext, corpus: &str) -> Result<EnsureOutcome> {
    if corpus_exists(ctx, corpus).await {
        return Ok(EnsureOutcome::AlreadyExists);
    }

    let spec = CorpusSpec {
        display_name: sanitize_id(corpus),
        embedding_endpoint: embedding_endpoint(ctx),
    };
    let created = ctx.backend().create_corpus(&spec).await?;
    ctx.session().mark_corpus(corpus, true);
    tracing::info!(corpus = %corpus, resource = %created.name, "created corpus");

    Ok(EnsureOutcome::Created {
        resource_name: created.name,
        display_name: created.display_name,
    })
}

pub async fn create_corpus_if_not_exists(ctx: &ToolContext, corpus: &str) -> OperationResult {
    match ensure_corpus(ctx, corpus).await {
        Ok(EnsureOutcome::AlreadyExists) => {
            OperationResult::success(format!("Corpus '{}' already exists", corpus))
                .with("success", true)
                .with("corpus_name", corpus)
                .with("was_created", false)
        }
        Ok(EnsureOutcome::Created {
            resource_name,
            display_name,
        }) => OperationResult::success(format!("Successfully created corpus '{}'", corpus))
            .with("success", true)
            .with("corpus_name", resource_name)
            .with("display_name", display_name)
            .with("was_created", true),
        Err(e) => OperationResult::error(format!("Error creating corpus: {}", e))
            .with("success", false)
            .with("corpus_name", corpus)
            .with("was_created", false),
    }
}

/// Delete a corpus. Nothing is sent to the service unless `confirm` is set.
pub async fn delete_corpus(ctx: &ToolContext, corpus: &str, confirm: bool) -> OperationResult {
    if !confirm {
        return OperationResult::error(
            "Deletion not confirmed. Please set confirm=true to delete the corpus.",
        )
        .with("corpus_name", corpus);
    }

    if !corpus_exists(ctx, corpus).await {
        return OperationResult::error(format!(
            "Corpus '{}' does not exist, so it cannot be deleted.",
            corpus
        ))
        .with("corpus_name", corpus);
    }

    let resource_name = resolve_corpus(ctx, corpus).await.into_resource_name();
    if let Err(e) = ctx.backend().delete_corpus(&resource_name).await {
        return OperationResult::error(format!("Error deleting corpus: {}", e))
            .with("corpus_name", corpus);
    }

    let key = crate::session::corpus_key(corpus);
    if ctx.session().contains(&key) {
        ctx.session().set(&key, false);
    }

    OperationResult::success(format!("Successfully deleted corpus '{}'", corpus))
        .with("corpus_name", corpus)
}

pub async fn list_corpora(ctx: &ToolContext) -> OperationResult {
    match ctx.backend().list_corpora().await {
        Ok(corpora) => {
            let summaries: Vec<CorpusSummary> =
                corpora.into_iter().map(CorpusSummary::from).collect();
            OperationResult::success(format!("Found {} corpus/corpora", summaries.len()))
                .with("count", summaries.len())
                .with("corpora", summaries)
                .with(
                    "note",
                    "Use the 'resource_name' field (not 'display_name') when referencing corpora in other tools",
                )
        }
        Err(e) => OperationResult::error(format!("Error listing corpora: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{BackendOp, InMemoryBackend};
    use crate::config::Config;
    use crate::envelope::Status;
    use crate::session::SessionState;
    use serde_json::json;
    use std::sync::Arc;

    fn context() -> (ToolContext, Arc<InMemoryBackend>) {
        let config = Config::default();
        let backend = Arc::new(InMemoryBackend::new(config.vertex.parent()));
        let ctx = ToolContext::new(
            Arc::new(config),
            backend.clone(),
            Arc::new(SessionState::new()),
        );
        (ctx, backend)
    }

    #[tokio::test]
    async fn exists_caches_positive_lookups() {
        let (ctx, backend) = context();
        backend.insert_corpus("1", "docs");

        assert!(corpus_exists(&ctx, "docs").await);
        let calls = backend.total_calls();
        assert!(corpus_exists(&ctx, "docs").await);
        assert_eq!(backend.total_calls(), calls);
        assert_eq!(ctx.session().get("corpus_exists_docs"), Some(true));
    }

    #[tokio::test]
    async fn negative_lookups_are_not_cached() {
        let (ctx, backend) = context();
        assert!(!corpus_exists(&ctx, "docs").await);
        assert!(!ctx.session().contains("corpus_exists_docs"));

        backend.insert_corpus("1", "docs");
        assert!(corpus_exists(&ctx, "docs").await);
    }

    #[tokio::test]
    async fn exists_fails_closed() {
        let (ctx, backend) = context();
        backend.insert_corpus("1", "docs");
        backend.fail_on(BackendOp::ListCorpora, "503 unavailable");
        assert!(!corpus_exists(&ctx, "docs").await);
    }

    #[tokio::test]
    async fn create_then_exists_is_a_cache_hit() {
        let (ctx, backend) = context();

        let result = create_corpus_if_not_exists(&ctx, "field notes").await;
        assert_eq!(result.status, Status::Success);
        assert_eq!(result.get("was_created"), Some(&json!(true)));
        assert_eq!(result.get("display_name"), Some(&json!("field_notes")));
        assert_eq!(backend.calls(BackendOp::CreateCorpus), 1);

        backend.reset_calls();
        assert!(corpus_exists(&ctx, "field notes").await);
        assert_eq!(backend.total_calls(), 0);

        let again = create_corpus_if_not_exists(&ctx, "field notes").await;
        assert_eq!(again.get("was_created"), Some(&json!(false)));
        assert_eq!(backend.calls(BackendOp::CreateCorpus), 0);
    }

    #[tokio::test]
    async fn create_uses_configured_embedding_model() {
        let (ctx, backend) = context();
        create_corpus_if_not_exists(&ctx, "docs").await;
        let spec = backend.last_corpus_spec().unwrap();
        assert_eq!(
            spec.embedding_endpoint,
            "projects/adk-vertexai-rag/locations/us-central1/publishers/google/models/text-embedding-005"
        );
    }

    #[tokio::test]
    async fn create_failure_is_structured() {
        let (ctx, backend) = context();
        backend.fail_on(BackendOp::CreateCorpus, "quota exceeded");

        let result = create_corpus_if_not_exists(&ctx, "docs").await;
        assert_eq!(result.status, Status::Error);
        assert_eq!(result.get("success"), Some(&json!(false)));
        assert!(result.message.contains("quota exceeded"));
        assert!(!ctx.session().corpus_known("docs"));
    }

    #[tokio::test]
    async fn unconfirmed_delete_makes_no_remote_call() {
        let (ctx, backend) = context();
        backend.insert_corpus("1", "docs");

        let result = delete_corpus(&ctx, "docs", false).await;
        assert_eq!(result.status, Status::Error);
        assert_eq!(backend.total_calls(), 0);
        assert_eq!(backend.corpus_names().len(), 1);
    }

    #[tokio::test]
    async fn delete_flips_session_flag_to_false() {
        let (ctx, backend) = context();
        backend.insert_corpus("1", "docs");
        assert!(corpus_exists(&ctx, "docs").await);

        let result = delete_corpus(&ctx, "docs", true).await;
        assert_eq!(result.status, Status::Success, "{}", result.message);
        assert!(backend.corpus_names().is_empty());
        assert!(ctx.session().contains("corpus_exists_docs"));
        assert_eq!(ctx.session().get("corpus_exists_docs"), Some(false));
    }

    #[tokio::test]
    async fn delete_missing_corpus_is_an_error() {
        let (ctx, backend) = context();
        let result = delete_corpus(&ctx, "ghost", true).await;
        assert_eq!(result.status, Status::Error);
        assert!(result.message.contains("does not exist"));
        assert_eq!(backend.calls(BackendOp::DeleteCorpus), 0);
    }

    #[tokio::test]
    async fn list_reports_every_corpus() {
        let (ctx, backend) = context();
        let a = backend.insert_corpus("1", "alpha");
        backend.insert_corpus("2", "beta");

        let result = list_corpora(&ctx).await;
        assert_eq!(result.status, Status::Success);
        assert_eq!(result.get("count"), Some(&json!(2)));
        assert_eq!(result.get("corpora").unwrap()[0]["resource_name"], json!(a));
        assert_eq!(result.get("corpora").unwrap()[1]["display_name"], json!("beta"));
    }

    #[tokio::test]
    async fn list_failure_is_structured() {
        let (ctx, backend) = context();
        backend.fail_on(BackendOp::ListCorpora, "denied");
        let result = list_corpora(&ctx).await;
        assert_eq!(result.status, Status::Error);
        assert!(result.message.contains("denied"));
    }
}
