//! LSP (Language Server Protocol) client module.
//!
//! This module is the protocol boundary of the crate: everything below it
//! speaks JSON-RPC to a language server process, everything above it talks
//! to the [`LspTransport`] trait.
//!
//! # Architecture
//!
//! - `client`: one language server process and its requests
//! - `transport`: the transport contract consumed by the session layer and
//!   its process-backed implementation
//! - `types`: coordinate translation, URI conversion, call-record decoding
//!
//! # Usage
//!
//! ```ignore
//! use kadabra_conductor::lsp::{LspTransport, ProcessTransport};
//!
//! let transport = ProcessTransport::new(catalog, config.transport_options());
//! let server_id = transport.start_server("rust", &root).await?;
//! let hover = transport.hover(&server_id, &file, position).await?;
//! ```

pub mod client;
pub mod transport;
pub mod types;

use crate::error::LspError;

/// Result type for LSP operations.
pub type LspResult<T> = std::result::Result<T, LspError>;

pub use transport::{LspTransport, ProcessTransport, ServerId};
pub use types::{CallDirection, CallRecord};
