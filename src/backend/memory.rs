//! In-memory [`RagBackend`] for tests and offline runs.
//!
//! Corpora and files live in `HashMap`s behind `std::sync::RwLock`.
//! Retrieval returns whatever contexts were scripted for the corpus with
//! [`InMemoryBackend::set_contexts`]; nothing is embedded.
//!
//! Every trait call is counted per [`BackendOp`] so tests can assert which
//! remote calls an operation made, and any operation can be made to fail
//! with [`InMemoryBackend::fail_on`].

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};

use super::RagBackend;
use crate::models::{
    CorpusSpec, DriveResourceId, FileStatus, GcsSource, GoogleDriveSource, ImportOutcome,
    ImportSettings, RagCorpus, RagFile, RetrievalSettings, RetrievedContext,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    ListCorpora,
    GetCorpus,
    CreateCorpus,
    DeleteCorpus,
    ListFiles,
    ImportFiles,
    DeleteFile,
    Retrieve,
}

struct StoredCorpus {
    corpus: RagCorpus,
    files: Vec<RagFile>,
    contexts: Vec<RetrievedContext>,
}

pub struct InMemoryBackend {
    parent: String,
    /// Insertion order is kept so listings are stable.
    corpora: RwLock<Vec<StoredCorpus>>,
    calls: RwLock<HashMap<BackendOp, usize>>,
    failures: RwLock<HashMap<BackendOp, String>>,
    last_import: RwLock<Option<ImportSettings>>,
    last_retrieval: RwLock<Option<RetrievalSettings>>,
    last_spec: RwLock<Option<CorpusSpec>>,
}

impl InMemoryBackend {
    /// `parent` is `projects/{P}/locations/{L}`.
    pub fn new(parent: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            corpora: RwLock::new(Vec::new()),
            calls: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            last_import: RwLock::new(None),
            last_retrieval: RwLock::new(None),
            last_spec: RwLock::new(None),
        }
    }

    /// Seed a corpus without counting a remote call. Returns its resource name.
    pub fn insert_corpus(&self, id: &str, display_name: &str) -> String {
        let name = format!("{}/ragCorpora/{}", self.parent, id);
        let now = now_rfc3339();
        self.corpora.write().unwrap_or_else(|e| e.into_inner()).push(StoredCorpus {
            corpus: RagCorpus {
                name: name.clone(),
                display_name: display_name.to_string(),
                description: String::new(),
                create_time: now.clone(),
                update_time: now,
            },
            files: Vec::new(),
            contexts: Vec::new(),
        });
        name
    }

    /// Seed a file into an existing corpus without counting a remote call.
    pub fn insert_file(&self, corpus: &str, file: RagFile) {
        let mut corpora = self.corpora.write().unwrap_or_else(|e| e.into_inner());
        if let Some(stored) = corpora.iter_mut().find(|c| c.corpus.name == corpus) {
            stored.files.push(file);
        }
    }

    /// Script the contexts returned by `retrieve` for `corpus`.
    pub fn set_contexts(&self, corpus: &str, contexts: Vec<RetrievedContext>) {
        let mut corpora = self.corpora.write().unwrap_or_else(|e| e.into_inner());
        if let Some(stored) = corpora.iter_mut().find(|c| c.corpus.name == corpus) {
            stored.contexts = contexts;
        }
    }

    /// Make every subsequent call to `op` fail with `message`.
    pub fn fail_on(&self, op: BackendOp, message: &str) {
        self.failures
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(op, message.to_string());
    }

    pub fn clear_failures(&self) {
        self.failures.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn calls(&self, op: BackendOp) -> usize {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).values().sum()
    }

    pub fn reset_calls(&self) {
        self.calls.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn corpus_names(&self) -> Vec<String> {
        self.corpora
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|c| c.corpus.name.clone())
            .collect()
    }

    pub fn files_in(&self, corpus: &str) -> Vec<RagFile> {
        self.corpora
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|c| c.corpus.name == corpus)
            .map(|c| c.files.clone())
            .unwrap_or_default()
    }

    pub fn last_import_settings(&self) -> Option<ImportSettings> {
        *self.last_import.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn last_retrieval_settings(&self) -> Option<RetrievalSettings> {
        *self.last_retrieval.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn last_corpus_spec(&self) -> Option<CorpusSpec> {
        self.last_spec.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, op: BackendOp) -> Result<()> {
        *self.calls.write().unwrap_or_else(|e| e.into_inner()).entry(op).or_insert(0) += 1;
        if let Some(message) = self.failures.read().unwrap_or_else(|e| e.into_inner()).get(&op) {
            bail!("{}", message);
        }
        Ok(())
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn file_for_uri(corpus: &str, uri: &str) -> RagFile {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let now = now_rfc3339();
    let display_name = uri.rsplit('/').find(|s| !s.is_empty()).unwrap_or(uri);

    let (gcs_source, google_drive_source) = if uri.starts_with("gs://") {
        (
            Some(GcsSource {
                uris: vec![uri.to_string()],
            }),
            None,
        )
    } else {
        let resource_id = uri
            .split("/file/d/")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .unwrap_or(uri)
            .to_string();
        (
            None,
            Some(GoogleDriveSource {
                resource_ids: vec![DriveResourceId {
                    resource_id,
                    resource_type: "RESOURCE_TYPE_FILE".to_string(),
                }],
            }),
        )
    };

    RagFile {
        name: format!("{}/ragFiles/{}", corpus, id),
        display_name: display_name.to_string(),
        description: String::new(),
        create_time: now.clone(),
        update_time: now,
        gcs_source,
        google_drive_source,
        mime_type: String::new(),
        file_status: Some(FileStatus {
            state: "ACTIVE".to_string(),
            error_status: String::new(),
        }),
    }
}

#[async_trait]
impl RagBackend for InMemoryBackend {
    async fn list_corpora(&self) -> Result<Vec<RagCorpus>> {
        self.record(BackendOp::ListCorpora)?;
        Ok(self
            .corpora
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|c| c.corpus.clone())
            .collect())
    }

    async fn get_corpus(&self, name: &str) -> Result<RagCorpus> {
        self.record(BackendOp::GetCorpus)?;
        match self
            .corpora
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|c| c.corpus.name == name)
        {
            Some(stored) => Ok(stored.corpus.clone()),
            None => bail!("corpus not found: {}", name),
        }
    }

    async fn create_corpus(&self, spec: &CorpusSpec) -> Result<RagCorpus> {
        self.record(BackendOp::CreateCorpus)?;
        *self.last_spec.write().unwrap_or_else(|e| e.into_inner()) = Some(spec.clone());
        let id = uuid::Uuid::new_v4().simple().to_string();
        let name = self.insert_corpus(&id, &spec.display_name);
        self.get_corpus_unrecorded(&name)
    }

    async fn delete_corpus(&self, name: &str) -> Result<()> {
        self.record(BackendOp::DeleteCorpus)?;
        let mut corpora = self.corpora.write().unwrap_or_else(|e| e.into_inner());
        let before = corpora.len();
        corpora.retain(|c| c.corpus.name != name);
        if corpora.len() == before {
            bail!("corpus not found: {}", name);
        }
        Ok(())
    }

    async fn list_files(&self, corpus: &str) -> Result<Vec<RagFile>> {
        self.record(BackendOp::ListFiles)?;
        match self
            .corpora
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|c| c.corpus.name == corpus)
        {
            Some(stored) => Ok(stored.files.clone()),
            None => bail!("corpus not found: {}", corpus),
        }
    }

    async fn import_files(
        &self,
        corpus: &str,
        uris: &[String],
        settings: &ImportSettings,
    ) -> Result<ImportOutcome> {
        self.record(BackendOp::ImportFiles)?;
        *self.last_import.write().unwrap_or_else(|e| e.into_inner()) = Some(*settings);

        let mut corpora = self.corpora.write().unwrap_or_else(|e| e.into_inner());
        let Some(stored) = corpora.iter_mut().find(|c| c.corpus.name == corpus) else {
            bail!("corpus not found: {}", corpus);
        };

        let mut outcome = ImportOutcome::default();
        for uri in uris {
            if stored.files.iter().any(|f| f.source_uri() == *uri) {
                outcome.skipped += 1;
                continue;
            }
            stored.files.push(file_for_uri(corpus, uri));
            outcome.imported += 1;
        }
        Ok(outcome)
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        self.record(BackendOp::DeleteFile)?;
        let mut corpora = self.corpora.write().unwrap_or_else(|e| e.into_inner());
        for stored in corpora.iter_mut() {
            let before = stored.files.len();
            stored.files.retain(|f| f.name != name);
            if stored.files.len() != before {
                return Ok(());
            }
        }
        bail!("file not found: {}", name)
    }

    async fn retrieve(
        &self,
        corpus: &str,
        _text: &str,
        settings: &RetrievalSettings,
    ) -> Result<Vec<RetrievedContext>> {
        self.record(BackendOp::Retrieve)?;
        *self.last_retrieval.write().unwrap_or_else(|e| e.into_inner()) = Some(*settings);
        match self
            .corpora
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|c| c.corpus.name == corpus)
        {
            Some(stored) => Ok(stored
                .contexts
                .iter()
                .take(settings.top_k as usize)
                .cloned()
                .collect()),
            None => bail!("corpus not found: {}", corpus),
        }
    }
}

impl InMemoryBackend {
    fn get_corpus_unrecorded(&self, name: &str) -> Result<RagCorpus> {
        self.corpora
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|c| c.corpus.name == name)
            .map(|c| c.corpus.clone())
            .ok_or_else(|| anyhow::anyhow!("corpus not found: {}", name))
    }
}
