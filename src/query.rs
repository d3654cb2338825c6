//! Semantic search over a corpus.

use crate::corpus::{ensure_corpus, EnsureOutcome};
use crate::envelope::OperationResult;
use crate::models::{QueryHit, RetrievalSettings};
use crate::resolve::resolve_corpus;
use crate::traits::ToolContext;

/// Query a corpus, creating it first if it does not exist.
///
/// A freshly created corpus has nothing to search, so no retrieval call is
/// made and a `warning` is returned. Hits keep the service's relevance order.
pub async fn rag_query(ctx: &ToolContext, corpus: &str, query: &str) -> OperationResult {
    match ensure_corpus(ctx, corpus).await {
        Ok(EnsureOutcome::AlreadyExists) => {}
        Ok(EnsureOutcome::Created { .. }) => {
            return OperationResult::warning(format!(
                "Created a new corpus '{}', but it doesn't contain any data yet. Please add data to the corpus before querying.",
                corpus
            ))
            .with("query", query)
            .with("corpus_name", corpus)
            .with("results", Vec::<QueryHit>::new())
            .with("results_count", 0);
        }
        Err(e) => {
            return OperationResult::error(format!(
                "Unable to access or create corpus '{}': Error creating corpus: {}",
                corpus, e
            ))
            .with("query", query)
            .with("corpus_name", corpus);
        }
    }

    let resource_name = resolve_corpus(ctx, corpus).await.into_resource_name();
    let settings = RetrievalSettings {
        top_k: ctx.config().rag.top_k,
        vector_distance_threshold: ctx.config().rag.distance_threshold,
    };

    let contexts = match ctx
        .backend()
        .retrieve(&resource_name, query, &settings)
        .await
    {
        Ok(contexts) => contexts,
        Err(e) => {
            return OperationResult::error(format!("Error querying corpus: {}", e))
                .with("query", query)
                .with("corpus_name", corpus);
        }
    };

    let results: Vec<QueryHit> = contexts.into_iter().map(QueryHit::from).collect();

    if results.is_empty() {
        return OperationResult::warning(format!(
            "No results found in corpus '{}' for query: '{}'",
            corpus, query
        ))
        .with("query", query)
        .with("results", results)
        .with("results_count", 0);
    }

    OperationResult::success(format!("Successfully queried corpus '{}'", corpus))
        .with("query", query)
        .with("results_count", results.len())
        .with("results", results)
}
