//! Corpus name resolution.
//!
//! Agents refer to corpora by display name, by full resource path, or by
//! something in between. [`resolve_corpus`] maps any of these to a
//! canonical `projects/{P}/locations/{L}/ragCorpora/{ID}` path:
//!
//! 1. canonical input is returned unchanged;
//! 2. otherwise the corpus list is searched for a matching display name;
//! 3. otherwise an id is synthesized from the last path segment.
//!
//! Step 3 performs no uniqueness check, so a synthesized id can point at a
//! corpus the caller did not mean.
//!
//! A name that needs sanitizing (`field notes`) creates a corpus with the
//! display name `field_notes` and a service-assigned id. The raw name then
//! matches no display name and resolves to `ragCorpora/field_notes`, so that
//! corpus is unreachable by the name it was created with. Use the resource
//! name from `list_corpora` instead.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::traits::ToolContext;

static CANONICAL_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^projects/[^/]+/locations/[^/]+/ragCorpora/[^/]+$").expect("valid regex")
});

static DISALLOWED_ID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("valid regex"));

/// How a corpus identifier was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The input was already a canonical resource path.
    Canonical(String),
    /// The input matched the display name of an existing corpus.
    DisplayName(String),
    /// Built from configuration and a sanitized id.
    Synthesized(String),
}

impl Resolution {
    pub fn resource_name(&self) -> &str {
        match self {
            Resolution::Canonical(n) | Resolution::DisplayName(n) | Resolution::Synthesized(n) => n,
        }
    }

    pub fn into_resource_name(self) -> String {
        match self {
            Resolution::Canonical(n) | Resolution::DisplayName(n) | Resolution::Synthesized(n) => n,
        }
    }
}

/// Result of searching the corpus list for a display name.
#[derive(Debug)]
pub enum DisplayNameLookup {
    Found(String),
    NotFound,
    Failed(anyhow::Error),
}

pub fn is_canonical(name: &str) -> bool {
    CANONICAL_PATH.is_match(name)
}

/// Replace every character outside `[a-zA-Z0-9_-]` with `_`.
pub fn sanitize_id(raw: &str) -> String {
    DISALLOWED_ID_CHARS.replace_all(raw, "_").into_owned()
}

/// Sanitized id derived from the last `/` segment of `raw`.
pub fn fallback_id(raw: &str) -> String {
    let last = raw.rsplit('/').next().unwrap_or(raw);
    sanitize_id(last)
}

pub fn synthesize_resource_name(parent: &str, raw: &str) -> String {
    format!("{}/ragCorpora/{}", parent, fallback_id(raw))
}

/// Search the remote corpus list for a corpus whose display name is `raw`.
pub async fn lookup_display_name(ctx: &ToolContext, raw: &str) -> DisplayNameLookup {
    match ctx.backend().list_corpora().await {
        Ok(corpora) => corpora
            .into_iter()
            .find(|c| c.display_name == raw)
            .map(|c| DisplayNameLookup::Found(c.name))
            .unwrap_or(DisplayNameLookup::NotFound),
        Err(e) => DisplayNameLookup::Failed(e),
    }
}

pub async fn resolve_corpus(ctx: &ToolContext, raw: &str) -> Resolution {
    if is_canonical(raw) {
        return Resolution::Canonical(raw.to_string());
    }

    match lookup_display_name(ctx, raw).await {
        DisplayNameLookup::Found(name) => {
            tracing::debug!(input = %raw, resource = %name, "resolved corpus by display name");
            return Resolution::DisplayName(name);
        }
        DisplayNameLookup::NotFound => {}
        DisplayNameLookup::Failed(e) => {
            tracing::warn!(
                input = %raw,
                error = %e,
                "corpus list lookup failed, synthesizing name"
            );
        }
    }

    let name = synthesize_resource_name(&ctx.config().vertex.parent(), raw);
    tracing::debug!(input = %raw, resource = %name, "synthesized corpus resource name");
    Resolution::Synthesized(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{BackendOp, InMemoryBackend};
    use crate::config::Config;
    use crate::session::SessionState;
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

    #[test]
    fn canonical_detection() {
        assert!(is_canonical("projects/p/locations/us-central1/ragCorpora/123"));
        assert!(!is_canonical("projects/p/locations/us-central1/ragCorpora/"));
        assert!(!is_canonical("projects/p/ragCorpora/123"));
        assert!(!is_canonical("my docs"));
        assert!(!is_canonical(
            "projects/p/locations/l/ragCorpora/1/ragFiles/2"
        ));
    }

    #[test]
    fn fallback_id_only_has_allowed_characters() {
        let inputs = [
            "my docs!",
            "a/b/c d.e",
            "ünïcode name",
            "trailing/",
            "semi;colon,comma",
            "",
        ];
        for input in inputs {
            let id = fallback_id(input);
            assert!(
                id.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
                "{:?} -> {:?}",
                input,
                id
            );
        }
        assert_eq!(fallback_id("a/b/c d.e"), "c_d_e");
        assert_eq!(fallback_id("keep-this_ok9"), "keep-this_ok9");
    }

    #[tokio::test]
    async fn canonical_input_is_returned_unchanged_without_remote_call() {
        let (ctx, backend) = context();
        for name in [
            "projects/p/locations/l/ragCorpora/1",
            "projects/other/locations/europe-west4/ragCorpora/abc_DEF-9",
        ] {
            let resolved = resolve_corpus(&ctx, name).await;
            assert_eq!(resolved, Resolution::Canonical(name.to_string()));
        }
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn display_name_match_wins() {
        let (ctx, backend) = context();
        let name = backend.insert_corpus("42", "Team Handbook");

        let resolved = resolve_corpus(&ctx, "Team Handbook").await;
        assert_eq!(resolved, Resolution::DisplayName(name));
        assert_eq!(backend.calls(BackendOp::ListCorpora), 1);
    }

    #[tokio::test]
    async fn unknown_name_is_synthesized_from_last_segment() {
        let (ctx, _backend) = context();
        let resolved = resolve_corpus(&ctx, "ragCorpora/my corpus").await;
        assert_eq!(
            resolved,
            Resolution::Synthesized(
                "projects/adk-vertexai-rag/locations/us-central1/ragCorpora/my_corpus".to_string()
            )
        );
    }

    #[tokio::test]
    async fn lookup_failure_falls_through_to_synthesis() {
        let (ctx, backend) = context();
        backend.fail_on(BackendOp::ListCorpora, "unavailable");

        assert!(matches!(
            lookup_display_name(&ctx, "docs").await,
            DisplayNameLookup::Failed(_)
        ));
        let resolved = resolve_corpus(&ctx, "docs").await;
        assert_eq!(
            resolved.resource_name(),
            "projects/adk-vertexai-rag/locations/us-central1/ragCorpora/docs"
        );
    }

    #[tokio::test]
    async fn sanitized_corpus_is_not_found_by_its_raw_name() {
        let (ctx, _backend) = context();
        let created = match crate::corpus::ensure_corpus(&ctx, "field notes").await.unwrap() {
            crate::corpus::EnsureOutcome::Created { resource_name, display_name } => {
                assert_eq!(display_name, "field_notes");
                resource_name
            }
            other => panic!("expected a new corpus, got {:?}", other),
        };

        let resolved = resolve_corpus(&ctx, "field notes").await;
        assert!(matches!(resolved, Resolution::Synthesized(_)));
        assert!(resolved.resource_name().ends_with("/ragCorpora/field_notes"));
        assert_ne!(resolved.resource_name(), created);
    }
}
