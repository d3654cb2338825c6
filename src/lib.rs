//! # rag-corpus
//!
//! Agent tools for managing document corpora in Vertex AI RAG Engine:
//! create or locate a corpus, import documents from Google Drive and Cloud
//! Storage, query it semantically, inspect its files, and delete corpora or
//! single documents.
//!
//! Chunking, embedding, vector search and storage all happen in the managed
//! service. This crate resolves corpus names, caches which corpora are known
//! to exist for the current session, and normalizes every result into one
//! envelope shape.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  ┌───────────────┐
//! │   CLI    │  │ HTTP + MCP    │
//! │ (ragctl) │  │ (serve mcp)   │
//! └────┬─────┘  └──────┬────────┘
//!      └───────┬───────┘
//!              ▼
//!       ┌─────────────┐     ┌──────────────┐
//!       │ ToolRegistry│────▶│ SessionState │
//!       └──────┬──────┘     └──────────────┘
//!              ▼
//!   corpus / documents / query ──▶ resolve
//!              │
//!              ▼
//!       ┌─────────────┐
//!       │ RagBackend  │  Vertex REST │ in-memory
//!       └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragctl list
//! ragctl add handbook https://drive.google.com/file/d/FILE_ID/view
//! ragctl query handbook "what is the leave policy?"
//! ragctl serve mcp
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with env overrides |
//! | [`models`] | Wire types and result rows |
//! | [`envelope`] | `status` / `message` result envelope |
//! | [`session`] | Per-session corpus existence flags |
//! | [`backend`] | Remote RAG service trait and implementations |
//! | [`resolve`] | Corpus name resolution |
//! | [`corpus`] | Create, delete, list corpora |
//! | [`documents`] | Add, delete, inspect documents |
//! | [`query`] | Semantic search |
//! | [`traits`] | `Tool` trait and registry |
//! | [`server`] | HTTP tool API |
//! | [`mcp`] | MCP bridge |

pub mod backend;
pub mod config;
pub mod corpus;
pub mod documents;
pub mod envelope;
pub mod mcp;
pub mod models;
pub mod query;
pub mod resolve;
pub mod server;
pub mod session;
pub mod traits;
