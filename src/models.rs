//! Data types shared by the backend and the operations.
//!
//! The remote schemas mirror the Vertex AI RAG REST resources. Every field
//! is optional on the wire and defaults when absent, so callers never have
//! to probe for presence.

use serde::{Deserialize, Serialize};

/// A RAG corpus as returned by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RagCorpus {
    /// Canonical resource path.
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub create_time: String,
    pub update_time: String,
}

/// A file ingested into a corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RagFile {
    /// `{corpus}/ragFiles/{id}`
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub create_time: String,
    pub update_time: String,
    pub gcs_source: Option<GcsSource>,
    pub google_drive_source: Option<GoogleDriveSource>,
    pub mime_type: String,
    pub file_status: Option<FileStatus>,
}

impl RagFile {
    /// Last segment of the resource path.
    pub fn file_id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or("")
    }

    /// The location the file was imported from, if the service reported one.
    pub fn source_uri(&self) -> String {
        if let Some(uri) = self.gcs_source.as_ref().and_then(|s| s.uris.first()) {
            return uri.clone();
        }
        if let Some(res) = self
            .google_drive_source
            .as_ref()
            .and_then(|s| s.resource_ids.first())
        {
            return drive_file_url(&res.resource_id);
        }
        String::new()
    }

    pub fn state(&self) -> String {
        self.file_status
            .as_ref()
            .map(|s| s.state.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GcsSource {
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleDriveSource {
    pub resource_ids: Vec<DriveResourceId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriveResourceId {
    pub resource_id: String,
    pub resource_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileStatus {
    pub state: String,
    pub error_status: String,
}

/// One retrieved passage from a semantic search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievedContext {
    pub source_uri: String,
    pub source_display_name: String,
    pub text: String,
    pub score: f64,
}

/// Counts reported by a finished import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportOutcome {
    #[serde(rename = "importedRagFilesCount", with = "int64_string")]
    pub imported: u64,
    #[serde(rename = "failedRagFilesCount", with = "int64_string")]
    pub failed: u64,
    #[serde(rename = "skippedRagFilesCount", with = "int64_string")]
    pub skipped: u64,
}

impl ImportOutcome {
    pub fn merge(self, other: ImportOutcome) -> ImportOutcome {
        ImportOutcome {
            imported: self.imported + other.imported,
            failed: self.failed + other.failed,
            skipped: self.skipped + other.skipped,
        }
    }
}

/// Settings for a new corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusSpec {
    pub display_name: String,
    /// Fully qualified embedding endpoint
    /// (`projects/{P}/locations/{L}/publishers/google/models/{model}`).
    pub embedding_endpoint: String,
}

/// Chunking and throttling for an import.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportSettings {
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub max_embedding_requests_per_min: u32,
}

/// Tuning for a semantic search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalSettings {
    pub top_k: u32,
    pub vector_distance_threshold: f64,
}

/// Row of the `list_corpora` result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusSummary {
    pub resource_name: String,
    pub display_name: String,
    pub create_time: String,
    pub update_time: String,
}

impl From<RagCorpus> for CorpusSummary {
    fn from(c: RagCorpus) -> Self {
        Self {
            resource_name: c.name,
            display_name: c.display_name,
            create_time: c.create_time,
            update_time: c.update_time,
        }
    }
}

/// Row of the `get_corpus_info` file listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub file_id: String,
    pub source_uri: String,
    pub display_name: String,
    pub create_time: String,
    pub update_time: String,
    pub mime_type: String,
    pub state: String,
}

impl From<&RagFile> for FileSummary {
    fn from(f: &RagFile) -> Self {
        Self {
            file_id: f.file_id().to_string(),
            source_uri: f.source_uri(),
            display_name: f.display_name.clone(),
            create_time: f.create_time.clone(),
            update_time: f.update_time.clone(),
            mime_type: f.mime_type.clone(),
            state: f.state(),
        }
    }
}

/// Row of the `rag_query` result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub source_uri: String,
    pub source_name: String,
    pub text: String,
    pub score: f64,
}

impl From<RetrievedContext> for QueryHit {
    fn from(c: RetrievedContext) -> Self {
        Self {
            source_uri: c.source_uri,
            source_name: c.source_display_name,
            text: c.text,
            score: c.score,
        }
    }
}

pub fn drive_file_url(file_id: &str) -> String {
    format!("https://drive.google.com/file/d/{}/view", file_id)
}

/// Google APIs encode int64 as JSON strings; accept either form.
mod int64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Str(String),
        }
        match Raw::deserialize(d)? {
            Raw::Num(n) => Ok(n),
            Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rag_file_defaults_missing_fields() {
        let file: RagFile = serde_json::from_value(json!({
            "name": "projects/p/locations/l/ragCorpora/c/ragFiles/42"
        }))
        .unwrap();
        let summary = FileSummary::from(&file);
        assert_eq!(summary.file_id, "42");
        assert_eq!(summary.source_uri, "");
        assert_eq!(summary.display_name, "");
        assert_eq!(summary.mime_type, "");
        assert_eq!(summary.state, "");
    }

    #[test]
    fn rag_file_source_uri_prefers_gcs_then_drive() {
        let gcs: RagFile = serde_json::from_value(json!({
            "gcsSource": { "uris": ["gs://bucket/a.pdf"] },
            "fileStatus": { "state": "ACTIVE" }
        }))
        .unwrap();
        assert_eq!(gcs.source_uri(), "gs://bucket/a.pdf");
        assert_eq!(gcs.state(), "ACTIVE");

        let drive: RagFile = serde_json::from_value(json!({
            "googleDriveSource": {
                "resourceIds": [{ "resourceId": "XYZ", "resourceType": "RESOURCE_TYPE_FILE" }]
            }
        }))
        .unwrap();
        assert_eq!(
            drive.source_uri(),
            "https://drive.google.com/file/d/XYZ/view"
        );
    }

    #[test]
    fn import_outcome_accepts_string_and_number_counts() {
        let a: ImportOutcome =
            serde_json::from_value(json!({ "importedRagFilesCount": "3" })).unwrap();
        let b: ImportOutcome = serde_json::from_value(json!({
            "importedRagFilesCount": 2,
            "skippedRagFilesCount": "1"
        }))
        .unwrap();
        let total = a.merge(b);
        assert_eq!(total.imported, 5);
        assert_eq!(total.skipped, 1);
        assert_eq!(total.failed, 0);
    }

    #[test]
    fn retrieved_context_maps_to_hit() {
        let ctx: RetrievedContext = serde_json::from_value(json!({
            "sourceUri": "gs://b/doc.txt",
            "sourceDisplayName": "doc.txt",
            "text": "hello",
            "score": 0.12
        }))
        .unwrap();
        let hit = QueryHit::from(ctx);
        assert_eq!(hit.source_name, "doc.txt");
        assert_eq!(hit.score, 0.12);
    }
}
