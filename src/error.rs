//! Error types for kadabra-conductor.
//!
//! This module defines the error types used throughout the crate, organized
//! by layer: the protocol boundary ([`LspError`]), the orchestration facade
//! ([`OrchestrationError`]) and a unified [`Error`] for the binary.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised at the language-server protocol boundary.
#[derive(Debug, Error)]
pub enum LspError {
    /// The language server process failed to start.
    #[error("failed to start language server: {0}")]
    ServerStartFailed(String),

    /// The language server process exited, or the id names no running server.
    #[error("language server is not running: {0}")]
    ServerExited(String),

    /// Failed to initialize the language server.
    #[error("language server initialization failed: {0}")]
    InitializationFailed(String),

    /// A request to the language server timed out.
    #[error("language server request timed out after {0:?}")]
    Timeout(Duration),

    /// Failed to send a request or notification to the language server.
    #[error("language server request failed: {0}")]
    RequestFailed(String),

    /// Invalid 1-based editor position.
    #[error("invalid position: line {line}, character {character} (both are 1-based)")]
    InvalidPosition {
        /// The line number.
        line: u32,
        /// The character number.
        character: u32,
    },

    /// Document could not be read or turned into a protocol URI.
    #[error("document not found: {0}")]
    DocumentNotFound(String),
}

/// Failure conditions of a single orchestrated operation.
///
/// The `Display` output is the message handed back to the caller, so each
/// variant states *why* the operation could not run.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// No project root is registered for the calling task.
    #[error("Project root path is not set")]
    ProjectRootUnset,

    /// The requested file does not exist under the project root.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The file's language is unknown or has no language server.
    #[error("No LSP support for {0}")]
    UnsupportedLanguage(String),

    /// The language server binary is missing.
    #[error("{}", not_installed_message(.language, .can_download))]
    ServerNotInstalled {
        /// Language whose server is missing.
        language: String,
        /// Whether the server can be downloaded and installed.
        can_download: bool,
    },

    /// Starting the language server failed.
    #[error("Language server for {language} is unavailable: {reason}")]
    ServerUnavailable {
        /// Language whose server failed to start.
        language: String,
        /// Underlying start failure.
        reason: String,
    },

    /// No protocol language id could be derived for the file.
    #[error("Cannot determine LSP language id for {}", .0.display())]
    MissingLanguageId(PathBuf),

    /// Line or character below 1.
    #[error("Invalid position: line {line}, character {character} (both must be >= 1)")]
    InvalidPosition {
        /// Requested 1-based line.
        line: u32,
        /// Requested 1-based character.
        character: u32,
    },

    /// The underlying protocol or transport call failed.
    #[error("LSP operation failed: {0}")]
    OperationFailed(#[source] LspError),

    /// The dispatched operation exceeded the caller's timeout.
    #[error("LSP operation timed out after {0:?}")]
    Timeout(Duration),

    /// A broken internal contract; the detail is logged, not shown.
    #[error("An unexpected error occurred while running the LSP operation")]
    Unexpected(String),
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn not_installed_message(language: &str, can_download: &bool) -> String {
    if *can_download {
        format!("Language server for {language} is not installed. It can be downloaded and installed.")
    } else {
        format!("Language server for {language} is not available on this system.")
    }
}

impl From<LspError> for OrchestrationError {
    fn from(err: LspError) -> Self {
        match err {
            LspError::InvalidPosition { line, character } => {
                Self::InvalidPosition { line, character }
            }
            LspError::Timeout(duration) => Self::Timeout(duration),
            other => Self::OperationFailed(other),
        }
    }
}

/// A unified error type for the entire application.
#[derive(Debug, Error)]
pub enum Error {
    /// LSP-related error.
    #[error("LSP error: {0}")]
    Lsp(#[from] LspError),

    /// Orchestration failure.
    #[error("orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for kadabra-conductor operations.
pub type Result<T> = std::result::Result<T, Error>;
