//! # rag-corpus CLI (`ragctl`)
//!
//! Runs a single corpus operation, or starts the tool server.
//!
//! ## Usage
//!
//! ```bash
//! ragctl --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragctl list` | List corpora |
//! | `ragctl info <corpus>` | Corpus details and files |
//! | `ragctl create <corpus>` | Create a corpus if absent |
//! | `ragctl add <corpus> <path>...` | Import documents |
//! | `ragctl query <corpus> "<text>"` | Semantic search |
//! | `ragctl delete <corpus> --confirm` | Delete a corpus |
//! | `ragctl delete-document <corpus> <id>` | Delete one document |
//! | `ragctl tools` | Print tool schemas |
//! | `ragctl serve mcp` | Start the HTTP + MCP tool server |
//!
//! Results go to stdout as JSON; logs go to stderr (`RUST_LOG`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use rag_corpus::backend::vertex::VertexRagClient;
use rag_corpus::backend::RagBackend;
use rag_corpus::config;
use rag_corpus::corpus::{create_corpus_if_not_exists, delete_corpus, list_corpora};
use rag_corpus::documents::{add_data, delete_document, get_corpus_info};
use rag_corpus::envelope::OperationResult;
use rag_corpus::query::rag_query;
use rag_corpus::server;
use rag_corpus::session::SessionState;
use rag_corpus::traits::{ToolContext, ToolRegistry};

/// Manage Vertex AI RAG corpora from the command line or serve them as
/// agent tools.
#[derive(Parser)]
#[command(name = "ragctl", version, about = "Vertex AI RAG corpus tools")]
struct Cli {
    /// Path to configuration file (TOML). Optional; defaults and
    /// environment variables apply when it does not exist.
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all corpora in the project.
    List,

    /// Show a corpus and the files it contains.
    Info { corpus: String },

    /// Create a corpus unless it already exists.
    Create { corpus: String },

    /// Import documents from Drive, Docs/Sheets/Slides, or gs:// paths.
    Add {
        corpus: String,
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Search a corpus.
    Query { corpus: String, text: String },

    /// Delete a corpus and everything in it.
    Delete {
        corpus: String,
        /// Required; without it nothing is deleted.
        #[arg(long)]
        confirm: bool,
    },

    /// Delete one document by file id.
    DeleteDocument { corpus: String, document_id: String },

    /// Print the registered tools and their parameter schemas.
    Tools,

    /// Start a server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// HTTP tool API plus MCP Streamable HTTP at `/mcp`.
    Mcp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let backend: Arc<dyn RagBackend> = Arc::new(VertexRagClient::new(&cfg.vertex)?);
    let ctx = ToolContext::new(
        Arc::new(cfg.clone()),
        backend.clone(),
        Arc::new(SessionState::new()),
    );

    let result: OperationResult = match cli.command {
        Commands::List => list_corpora(&ctx).await,
        Commands::Info { corpus } => get_corpus_info(&ctx, &corpus).await,
        Commands::Create { corpus } => create_corpus_if_not_exists(&ctx, &corpus).await,
        Commands::Add { corpus, paths } => add_data(&ctx, &corpus, &paths).await,
        Commands::Query { corpus, text } => rag_query(&ctx, &corpus, &text).await,
        Commands::Delete { corpus, confirm } => delete_corpus(&ctx, &corpus, confirm).await,
        Commands::DeleteDocument {
            corpus,
            document_id,
        } => delete_document(&ctx, &corpus, &document_id).await,
        Commands::Tools => {
            let infos = ToolRegistry::with_builtins().infos();
            println!("{}", serde_json::to_string_pretty(&infos)?);
            return Ok(());
        }
        Commands::Serve {
            service: ServeService::Mcp,
        } => return server::run_server(cfg, backend).await,
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    if result.is_error() {
        std::process::exit(1);
    }

    Ok(())
}
