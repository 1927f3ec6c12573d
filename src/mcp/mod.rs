//! MCP (Model Context Protocol) server module.
//!
//! This module exposes the session orchestrator to LLM applications over
//! stdio.
//!
//! # Architecture
//!
//! - `server`: the [`KadabraConductor`] handler and its tool router
//! - `tools`: tool parameters and structured responses
//!
//! # Usage
//!
//! ```ignore
//! use kadabra_conductor::mcp::KadabraConductor;
//! use rmcp::{ServiceExt, transport::stdio};
//!
//! let server = KadabraConductor::new(orchestrator, workspace);
//! server.serve(stdio()).await?.waiting().await?;
//! ```

pub mod server;
pub mod tools;

pub use server::{DEFAULT_TASK_ID, KadabraConductor};
