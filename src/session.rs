//! Per-session existence cache.
//!
//! A [`SessionState`] maps `corpus_exists_<identifier>` keys to booleans for
//! the lifetime of one agent session. A `true` entry is trusted without
//! re-validation. Entries are overwritten, never removed.
//!
//! [`SessionStore`] hands out one `SessionState` per session id for the
//! HTTP server.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
pub struct SessionState {
    values: RwLock<HashMap<String, bool>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
    }

    pub fn set(&self, key: &str, value: bool) {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `corpus` has been confirmed to exist in this session.
    pub fn corpus_known(&self, corpus: &str) -> bool {
        self.get(&corpus_key(corpus)).unwrap_or(false)
    }

    pub fn mark_corpus(&self, corpus: &str, exists: bool) {
        self.set(&corpus_key(corpus), exists);
    }
}

/// Cache key for a corpus identifier exactly as the caller supplied it.
pub fn corpus_key(corpus: &str) -> String {
    format!("corpus_exists_{}", corpus)
}

/// Session states keyed by session id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionState>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `id`, creating it on first use.
    pub fn session(&self, id: &str) -> Arc<SessionState> {
        if let Some(existing) = self
            .sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
        {
            return existing.clone();
        }
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
