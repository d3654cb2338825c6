//! Agent-callable tools.
//!
//! Every corpus operation is wrapped in a [`Tool`] so that agent hosts can
//! discover it (name, description, JSON Schema) and invoke it with JSON
//! parameters. Tools live in a [`ToolRegistry`]; the HTTP server, the MCP
//! bridge and the CLI all dispatch through it.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 ToolRegistry                  │
//! │  list_corpora   get_corpus_info  create_corpus│
//! │  add_data       rag_query                     │
//! │  delete_corpus  delete_document               │
//! └──────────────────────┬────────────────────────┘
//!                        ▼
//!        ToolContext { config, backend, session }
//! ```
//!
//! # Usage
//!
//! ```rust
//! use rag_corpus::traits::ToolRegistry;
//!
//! let tools = ToolRegistry::with_builtins();
//! assert!(tools.find("rag_query").is_some());
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::backend::RagBackend;
use crate::config::Config;
use crate::corpus::{create_corpus_if_not_exists, delete_corpus, list_corpora};
use crate::documents::{add_data, delete_document, get_corpus_info};
use crate::envelope::OperationResult;
use crate::query::rag_query;
use crate::session::SessionState;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A tool that agents can discover and call.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use serde_json::{json, Value};
/// use rag_corpus::traits::{Tool, ToolContext};
///
/// pub struct CorpusCountTool;
///
/// #[async_trait]
/// impl Tool for CorpusCountTool {
///     fn name(&self) -> &str { "corpus_count" }
///     fn description(&self) -> &str { "Count corpora in the project" }
///
///     fn parameters_schema(&self) -> Value {
///         json!({ "type": "object", "properties": {} })
///     }
///
///     async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
///         let corpora = ctx.backend().list_corpora().await?;
///         Ok(json!({ "count": corpora.len() }))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores; also the route segment in
    /// `POST /tools/{name}`.
    fn name(&self) -> &str;

    /// One-line description agents use to decide whether to call the tool.
    fn description(&self) -> &str;

    /// Whether this tool ships with the crate. Defaults to `false`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// Whether the tool changes remote state.
    fn is_mutating(&self) -> bool {
        true
    }

    /// JSON Schema (`type: "object"`) describing the parameters.
    fn parameters_schema(&self) -> Value;

    /// Run the tool.
    ///
    /// Built-in tools report operation failures inside the returned
    /// envelope; `Err` is reserved for unusable parameters.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Everything a tool invocation needs: settings, the remote service, and
/// the caller's session.
///
/// Cloning is cheap; all parts are shared behind `Arc`.
#[derive(Clone)]
pub struct ToolContext {
    config: Arc<Config>,
    backend: Arc<dyn RagBackend>,
    session: Arc<SessionState>,
}

impl ToolContext {
    pub fn new(
        config: Arc<Config>,
        backend: Arc<dyn RagBackend>,
        session: Arc<SessionState>,
    ) -> Self {
        Self {
            config,
            backend,
            session,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &dyn RagBackend {
        self.backend.as_ref()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Same config and backend, different session.
    pub fn with_session(&self, session: Arc<SessionState>) -> Self {
        Self {
            config: self.config.clone(),
            backend: self.backend.clone(),
            session,
        }
    }
}

/// Serializable tool descriptor for `GET /tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            builtin: tool.is_builtin(),
            parameters: tool.parameters_schema(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter helpers
// ═══════════════════════════════════════════════════════════════════════

/// Check `params` against a tool schema and inject declared defaults.
///
/// Supports `required`, primitive `type` checks, `enum`, and string
/// `items` for arrays.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => bail!("parameters must be a JSON object, got {}", json_type_name(other)),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<String> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let mut result = params_obj.clone();

    for req_field in &required {
        if !params_obj.contains_key(req_field) {
            bail!("missing required parameter: {}", req_field);
        }
    }

    for (prop_name, prop_schema) in &properties {
        match params_obj.get(prop_name) {
            Some(value) => {
                if let Some(expected_type) = prop_schema.get("type").and_then(|t| t.as_str()) {
                    if !type_matches(expected_type, value) {
                        bail!(
                            "parameter '{}' must be of type '{}', got {}",
                            prop_name,
                            expected_type,
                            json_type_name(value)
                        );
                    }
                }

                if let (Some(items), Some(item_type)) = (
                    value.as_array(),
                    prop_schema
                        .get("items")
                        .and_then(|i| i.get("type"))
                        .and_then(|t| t.as_str()),
                ) {
                    if let Some(bad) = items.iter().find(|v| !type_matches(item_type, v)) {
                        bail!(
                            "parameter '{}' must contain only {} items, got {}",
                            prop_name,
                            item_type,
                            json_type_name(bad)
                        );
                    }
                }

                if let Some(enum_values) = prop_schema.get("enum").and_then(|e| e.as_array()) {
                    if !enum_values.contains(value) {
                        let allowed: Vec<String> =
                            enum_values.iter().map(|v| v.to_string()).collect();
                        bail!(
                            "parameter '{}' must be one of [{}], got {}",
                            prop_name,
                            allowed.join(", "),
                            value
                        );
                    }
                }
            }
            None => {
                if let Some(default) = prop_schema.get("default") {
                    result.insert(prop_name.clone(), default.clone());
                }
            }
        }
    }

    Ok(Value::Object(result))
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    let value = params[key].as_str().unwrap_or("");
    if value.trim().is_empty() {
        bail!("{} must not be empty", key);
    }
    Ok(value)
}

fn string_list(params: &Value, key: &str) -> Result<Vec<String>> {
    let Some(items) = params[key].as_array() else {
        bail!("{} must be an array of strings", key);
    };
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("{} must contain only strings", key))
        })
        .collect()
}

fn envelope(result: OperationResult) -> Result<Value> {
    Ok(result.to_value())
}

fn corpus_name_schema() -> Value {
    json!({
        "type": "string",
        "description": "Corpus resource name (preferred, from list_corpora) or display name"
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

/// Lists every corpus in the project.
pub struct ListCorporaTool;

#[async_trait]
impl Tool for ListCorporaTool {
    fn name(&self) -> &str {
        "list_corpora"
    }

    fn description(&self) -> &str {
        "List all available RAG corpora with their resource names"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn is_mutating(&self) -> bool {
        false
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        envelope(list_corpora(ctx).await)
    }
}

/// Corpus details and file listing.
pub struct GetCorpusInfoTool;

#[async_trait]
impl Tool for GetCorpusInfoTool {
    fn name(&self) -> &str {
        "get_corpus_info"
    }

    fn description(&self) -> &str {
        "Get details about a corpus, including the files it contains"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn is_mutating(&self) -> bool {
        false
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "corpus_name": corpus_name_schema()
            },
            "required": ["corpus_name"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let corpus = required_str(&params, "corpus_name")?;
        envelope(get_corpus_info(ctx, corpus).await)
    }
}

pub struct CreateCorpusTool;

#[async_trait]
impl Tool for CreateCorpusTool {
    fn name(&self) -> &str {
        "create_corpus"
    }

    fn description(&self) -> &str {
        "Create a RAG corpus unless one with this name already exists"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "corpus_name": corpus_name_schema()
            },
            "required": ["corpus_name"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let corpus = required_str(&params, "corpus_name")?;
        envelope(create_corpus_if_not_exists(ctx, corpus).await)
    }
}

/// Imports documents from Drive, Docs, or Cloud Storage.
pub struct AddDataTool;

#[async_trait]
impl Tool for AddDataTool {
    fn name(&self) -> &str {
        "add_data"
    }

    fn description(&self) -> &str {
        "Add documents from Google Drive, Google Docs/Sheets/Slides, or GCS to a corpus (creating it if needed)"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "corpus_name": corpus_name_schema(),
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Drive file URLs, Docs/Sheets/Slides URLs, or gs:// paths"
                }
            },
            "required": ["corpus_name", "paths"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let corpus = required_str(&params, "corpus_name")?;
        let paths = string_list(&params, "paths")?;
        envelope(add_data(ctx, corpus, &paths).await)
    }
}

pub struct RagQueryTool;

#[async_trait]
impl Tool for RagQueryTool {
    fn name(&self) -> &str {
        "rag_query"
    }

    fn description(&self) -> &str {
        "Search a corpus for passages relevant to a question"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "corpus_name": corpus_name_schema(),
                "query": { "type": "string", "description": "Question or search text" }
            },
            "required": ["corpus_name", "query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let corpus = required_str(&params, "corpus_name")?;
        let query = required_str(&params, "query")?;
        envelope(rag_query(ctx, corpus, query).await)
    }
}

pub struct DeleteCorpusTool;

#[async_trait]
impl Tool for DeleteCorpusTool {
    fn name(&self) -> &str {
        "delete_corpus"
    }

    fn description(&self) -> &str {
        "Delete a corpus and all its documents (requires confirm=true)"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "corpus_name": corpus_name_schema(),
                "confirm": {
                    "type": "boolean",
                    "description": "Must be true to delete",
                    "default": false
                }
            },
            "required": ["corpus_name"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let corpus = required_str(&params, "corpus_name")?;
        let confirm = params["confirm"].as_bool().unwrap_or(false);
        envelope(delete_corpus(ctx, corpus, confirm).await)
    }
}

pub struct DeleteDocumentTool;

#[async_trait]
impl Tool for DeleteDocumentTool {
    fn name(&self) -> &str {
        "delete_document"
    }

    fn description(&self) -> &str {
        "Delete one document from a corpus by its file id (from get_corpus_info)"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "corpus_name": corpus_name_schema(),
                "document_id": { "type": "string", "description": "File id from get_corpus_info" }
            },
            "required": ["corpus_name", "document_id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let corpus = required_str(&params, "corpus_name")?;
        let document_id = required_str(&params, "document_id")?;
        envelope(delete_document(ctx, corpus, document_id).await)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry of built-in and custom tools.
///
/// # Example
///
/// ```rust
/// use rag_corpus::traits::ToolRegistry;
///
/// let mut tools = ToolRegistry::with_builtins();
/// // tools.register(Box::new(MyTool));
/// assert_eq!(tools.len(), 7);
/// ```
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry holding the seven corpus tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ListCorporaTool));
        registry.register(Box::new(GetCorpusInfoTool));
        registry.register(Box::new(CreateCorpusTool));
        registry.register(Box::new(AddDataTool));
        registry.register(Box::new(RagQueryTool));
        registry.register(Box::new(DeleteCorpusTool));
        registry.register(Box::new(DeleteDocumentTool));
        registry
    }

    /// Register a tool. A later registration with the same name shadows
    /// nothing; [`find`](Self::find) returns the first match.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo::from_tool(t.as_ref()))
            .collect()
    }

    /// Validate `params` against the tool's schema and run it.
    pub async fn call(&self, name: &str, params: Value, ctx: &ToolContext) -> Result<Value> {
        let Some(tool) = self.find(name) else {
            bail!("no tool registered with name: {}", name);
        };
        let params = validate_params(&tool.parameters_schema(), &params)?;
        tracing::debug!(tool = %name, "executing tool");
        tool.execute(params, ctx).await
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
