//! Kadabra Conductor
//!
//! LSP session orchestration for AI coding assistants. A tool call such as
//! "find references at file:line:character" becomes a correctly sequenced
//! series of protocol operations against a shared, possibly cold language
//! server, while other calls run against the same server concurrently.
//!
//! # Overview
//!
//! This library provides:
//! - A session layer that starts or reuses one server per language and
//!   workspace root, keeps documents open while they are queried, and
//!   always cleans up after itself
//! - Nine operations: definitions, references, hover, document and
//!   workspace symbols, implementations and the call hierarchy
//! - An LSP client and process-backed transport
//! - An MCP server exposing the operations as tools over stdio
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     stdio      ┌──────────────────────┐
//! │   LLM Client    │◄──────────────►│      MCP Server      │
//! │                 │     (MCP)      │ (kadabra-conductor)  │
//! └─────────────────┘                └──────────┬───────────┘
//!                                               │
//!                                      ┌────────▼────────┐
//!                                      │  Orchestrator   │
//!                                      │ sessions, docs, │
//!                                      │ dispatch, walk  │
//!                                      └────────┬────────┘
//!                                               │ LspTransport
//!                                  ┌────────────▼────────────┐
//!                                  │ rust-analyzer, gopls,   │
//!                                  │ pyright, ... (JSON-RPC) │
//!                                  └─────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`error`] - Error types for the entire application
//! - [`config`] - Languages, servers and timeouts
//! - [`catalog`] - Language lookups by file path
//! - [`workspace`] - Project roots, path normalization, file cache
//! - [`lsp`] - LSP client and transport
//! - [`session`] - The orchestration core
//! - [`mcp`] - MCP server implementation
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kadabra_conductor::{catalog::ConfiguredCatalog, config::ConductorConfig};
//! use kadabra_conductor::lsp::ProcessTransport;
//! use kadabra_conductor::session::{Operation, OperationRequest, Orchestrator, TaskContext};
//! use kadabra_conductor::workspace::ProjectWorkspace;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ConductorConfig::default();
//!     let catalog = Arc::new(ConfiguredCatalog::new(config.languages.clone()));
//!     let transport = Arc::new(ProcessTransport::new(catalog.clone(), config.transport_options()));
//!     let workspace = Arc::new(ProjectWorkspace::with_default_root("."));
//!
//!     let orchestrator = Orchestrator::new(transport, catalog, workspace);
//!     let request = OperationRequest::new(Operation::FindReferences, "src/lib.rs", 3, 8);
//!     let result = orchestrator.execute(&request, &TaskContext::new("main")).await;
//!     println!("{}", result.message);
//! }
//! ```

// Enforce documentation and other quality attributes
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are too strict
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod lsp;
pub mod mcp;
pub mod session;
pub mod workspace;

// Re-export commonly used types at the crate root
pub use error::{Error, Result};
