//! Vertex AI REST client against a local fake of the RAG API.
//!
//! The fake records every request so tests can check paths, query strings,
//! bodies and auth, and answers with the sparse JSON the real service
//! sends (int64 counts as strings, absent fields omitted).

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Json, Router,
};
use rag_corpus::backend::vertex::VertexRagClient;
use rag_corpus::backend::{PartialImport, RagBackend};
use rag_corpus::config::{Config, VertexConfig};
use rag_corpus::documents::add_data;
use rag_corpus::envelope::Status;
use rag_corpus::models::{CorpusSpec, ImportSettings, RetrievalSettings};
use rag_corpus::session::SessionState;
use rag_corpus::traits::ToolContext;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const PARENT: &str = "projects/p/locations/l";

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: String,
    auth: String,
    body: Value,
}

type Log = Arc<Mutex<Vec<Recorded>>>;

async fn start_fake() -> (String, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let handler_log = log.clone();

    let app = Router::new().fallback(
        move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
            let log = handler_log.clone();
            async move {
                let path = uri.path().trim_start_matches("/v1/").to_string();
                let query = uri.query().unwrap_or("").to_string();
                let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                log.lock().unwrap().push(Recorded {
                    method: method.clone(),
                    path: path.clone(),
                    query: query.clone(),
                    auth,
                    body: body.clone(),
                });
                respond(&method, &path, &query, &body)
            }
        },
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), log)
}

fn respond(method: &Method, path: &str, query: &str, body: &Value) -> axum::response::Response {
    let corpora = format!("{}/ragCorpora", PARENT);
    let corpus = format!("{}/ragCorpora/c1", PARENT);

    match (method.as_str(), path) {
        ("GET", p) if p == corpora => {
            if query.contains("pageToken=next") {
                Json(json!({
                    "ragCorpora": [{ "name": format!("{}/ragCorpora/c2", PARENT) }]
                }))
                .into_response()
            } else {
                Json(json!({
                    "ragCorpora": [{
                        "name": corpus,
                        "displayName": "handbook",
                        "createTime": "2024-01-01T00:00:00Z"
                    }],
                    "nextPageToken": "next"
                }))
                .into_response()
            }
        }
        ("POST", p) if p == corpora => Json(json!({
            "name": format!("{}/operations/create-1", PARENT),
            "done": false
        }))
        .into_response(),
        ("GET", p) if p.ends_with("/operations/create-1") => Json(json!({
            "name": p,
            "done": true,
            "response": {
                "@type": "type.googleapis.com/google.cloud.aiplatform.v1.RagCorpus",
                "name": format!("{}/ragCorpora/new", PARENT),
                "displayName": "fresh"
            }
        }))
        .into_response(),
        ("POST", p) if p.ends_with("/ragFiles:import") => {
            let config = &body["importRagFilesConfig"];
            if config["googleDriveSource"]["resourceIds"][0]["resourceId"] == "BROKEN" {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": { "code": 500, "message": "drive boom" } })),
                )
                    .into_response();
            }
            let count = if config.get("gcsSource").is_some() {
                "2"
            } else {
                "1"
            };
            Json(json!({
                "name": format!("{}/operations/import", corpus),
                "done": true,
                "response": { "importedRagFilesCount": count }
            }))
            .into_response()
        }
        ("GET", p) if p == format!("{}/ragFiles", corpus) => Json(json!({
            "ragFiles": [{
                "name": format!("{}/ragFiles/f1", corpus),
                "displayName": "policy.pdf",
                "gcsSource": { "uris": ["gs://bucket/policy.pdf"] },
                "fileStatus": { "state": "ACTIVE" }
            }, {
                "name": format!("{}/ragFiles/f2", corpus),
                "googleDriveSource": {
                    "resourceIds": [{ "resourceId": "DRIVE_9", "resourceType": "RESOURCE_TYPE_FILE" }]
                }
            }]
        }))
        .into_response(),
        ("DELETE", p) if p == format!("{}/ragFiles/f1", corpus) => Json(json!({
            "name": format!("{}/operations/del", corpus),
            "done": true,
            "error": { "code": 9, "message": "file is still importing" }
        }))
        .into_response(),
        ("DELETE", p) if p == corpus => {
            Json(json!({ "name": "op", "done": true })).into_response()
        }
        ("POST", p) if p == format!("{}:retrieveContexts", PARENT) => Json(json!({
            "contexts": {
                "contexts": [
                    { "sourceUri": "gs://bucket/policy.pdf", "text": "Leave is 25 days.", "score": 0.12 },
                    { "text": "orphan passage" }
                ]
            }
        }))
        .into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "code": 404, "message": "not found", "status": "NOT_FOUND" } })),
        )
            .into_response(),
    }
}

fn vertex_config(base: &str) -> VertexConfig {
    VertexConfig {
        project: "p".to_string(),
        location: "l".to_string(),
        endpoint: Some(format!("{}/", base)),
        operation_poll_secs: 0,
        ..VertexConfig::default()
    }
}

fn client(base: &str) -> VertexRagClient {
    VertexRagClient::with_token(&vertex_config(base), "test-token").unwrap()
}

fn import_settings() -> ImportSettings {
    ImportSettings {
        chunk_size: 512,
        chunk_overlap: 100,
        max_embedding_requests_per_min: 1000,
    }
}

#[tokio::test]
async fn list_corpora_follows_pages() {
    let (base, log) = start_fake().await;
    let corpora = client(&base).list_corpora().await.unwrap();

    assert_eq!(corpora.len(), 2);
    assert_eq!(corpora[0].display_name, "handbook");
    assert_eq!(corpora[1].display_name, "");

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert!(log[0].query.contains("pageSize=100"));
    assert!(!log[0].query.contains("pageToken"));
    assert!(log[1].query.contains("pageToken=next"));
    assert_eq!(log[0].auth, "Bearer test-token");
}

#[tokio::test]
async fn create_corpus_polls_the_operation() {
    let (base, log) = start_fake().await;
    let created = client(&base)
        .create_corpus(&CorpusSpec {
            display_name: "fresh".to_string(),
            embedding_endpoint: format!("{}/publishers/google/models/text-embedding-005", PARENT),
        })
        .await
        .unwrap();

    assert_eq!(created.name, format!("{}/ragCorpora/new", PARENT));

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].method, Method::POST);
    assert_eq!(log[0].body["displayName"], "fresh");
    assert_eq!(
        log[0].body["vectorDbConfig"]["ragEmbeddingModelConfig"]["vertexPredictionEndpoint"]
            ["endpoint"],
        "projects/p/locations/l/publishers/google/models/text-embedding-005"
    );
    assert_eq!(log[1].method, Method::GET);
    assert!(log[1].path.ends_with("/operations/create-1"));
}

#[tokio::test]
async fn mixed_import_is_split_by_source_kind() {
    let (base, log) = start_fake().await;
    let corpus = format!("{}/ragCorpora/c1", PARENT);
    let settings = import_settings();
    let uris = vec![
        "gs://bucket/a.pdf".to_string(),
        "https://drive.google.com/file/d/DRIVE_1/view".to_string(),
        "gs://bucket/b.pdf".to_string(),
    ];

    let outcome = client(&base)
        .import_files(&corpus, &uris, &settings)
        .await
        .unwrap();
    assert_eq!(outcome.imported, 3);
    assert_eq!(outcome.failed, 0);

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);

    let gcs = &log[0].body["importRagFilesConfig"];
    assert_eq!(
        gcs["gcsSource"]["uris"],
        json!(["gs://bucket/a.pdf", "gs://bucket/b.pdf"])
    );
    assert_eq!(
        gcs["ragFileTransformationConfig"]["ragFileChunkingConfig"]["fixedLengthChunking"]
            ["chunkSize"],
        512
    );
    assert_eq!(gcs["maxEmbeddingRequestsPerMin"], 1000);

    let drive = &log[1].body["importRagFilesConfig"];
    assert!(drive.get("gcsSource").is_none());
    assert_eq!(
        drive["googleDriveSource"]["resourceIds"][0],
        json!({ "resourceId": "DRIVE_1", "resourceType": "RESOURCE_TYPE_FILE" })
    );
}

#[tokio::test]
async fn files_and_contexts_default_missing_fields() {
    let (base, log) = start_fake().await;
    let client = client(&base);
    let corpus = format!("{}/ragCorpora/c1", PARENT);

    let files = client.list_files(&corpus).await.unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].file_id(), "f1");
    assert_eq!(files[0].source_uri(), "gs://bucket/policy.pdf");
    assert_eq!(files[0].state(), "ACTIVE");
    assert_eq!(files[1].display_name, "");
    assert_eq!(
        files[1].source_uri(),
        "https://drive.google.com/file/d/DRIVE_9/view"
    );

    let contexts = client
        .retrieve(
            &corpus,
            "how much leave?",
            &RetrievalSettings {
                top_k: 3,
                vector_distance_threshold: 0.5,
            },
        )
        .await
        .unwrap();
    assert_eq!(contexts.len(), 2);
    assert_eq!(contexts[0].score, 0.12);
    assert_eq!(contexts[1].source_uri, "");
    assert_eq!(contexts[1].score, 0.0);

    let log = log.lock().unwrap();
    let retrieve = &log.last().unwrap().body;
    assert_eq!(
        retrieve["vertexRagStore"]["ragResources"][0]["ragCorpus"],
        json!(corpus)
    );
    assert_eq!(retrieve["query"]["text"], "how much leave?");
    assert_eq!(retrieve["query"]["ragRetrievalConfig"]["topK"], 3);
    assert_eq!(
        retrieve["query"]["ragRetrievalConfig"]["filter"]["vectorDistanceThreshold"],
        0.5
    );
}

#[tokio::test]
async fn failures_surface_as_errors() {
    let (base, _log) = start_fake().await;
    let client = client(&base);
    let corpus = format!("{}/ragCorpora/c1", PARENT);

    let err = client
        .get_corpus(&format!("{}/ragCorpora/missing", PARENT))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Vertex AI API error 404"), "{}", err);

    let err = client
        .delete_file(&format!("{}/ragFiles/f1", corpus))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("file is still importing"), "{}", err);

    client.delete_corpus(&corpus).await.unwrap();
}

#[tokio::test]
async fn failed_second_batch_keeps_the_first_batch_count() {
    let (base, log) = start_fake().await;
    let corpus = format!("{}/ragCorpora/c1", PARENT);
    let uris = vec![
        "gs://bucket/a.pdf".to_string(),
        "https://drive.google.com/file/d/BROKEN/view".to_string(),
    ];

    let err = client(&base)
        .import_files(&corpus, &uris, &import_settings())
        .await
        .unwrap_err();

    let partial = err.downcast_ref::<PartialImport>().expect("partial import");
    assert_eq!(partial.completed.imported, 2);
    assert!(partial.cause.to_string().contains("drive boom"), "{}", err);
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_first_batch_is_a_plain_error() {
    let (base, _log) = start_fake().await;
    let corpus = format!("{}/ragCorpora/c1", PARENT);
    let uris = vec!["https://drive.google.com/file/d/BROKEN/view".to_string()];

    let err = client(&base)
        .import_files(&corpus, &uris, &import_settings())
        .await
        .unwrap_err();
    assert!(err.downcast_ref::<PartialImport>().is_none());
    assert!(err.to_string().contains("Vertex AI API error 500"), "{}", err);
}

#[tokio::test]
async fn add_data_reports_files_added_before_a_failure() {
    let (base, _log) = start_fake().await;
    let mut config = Config::default();
    config.vertex = vertex_config(&base);
    let backend = Arc::new(VertexRagClient::with_token(&config.vertex, "test-token").unwrap());
    let ctx = ToolContext::new(Arc::new(config), backend, Arc::new(SessionState::new()));

    let paths = vec![
        "gs://bucket/a.pdf".to_string(),
        "https://drive.google.com/file/d/BROKEN/view".to_string(),
    ];
    let result = add_data(&ctx, "handbook", &paths).await;

    assert_eq!(result.status, Status::Error);
    assert_eq!(result.get("files_added"), Some(&json!(2)));
    assert_eq!(result.get("corpus_created"), Some(&json!(false)));
    assert!(result.message.contains("Added 2 file(s)"), "{}", result.message);
    assert!(result.message.contains("drive boom"), "{}", result.message);
}
