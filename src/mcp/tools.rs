//! MCP tool parameters and structured responses.
//!
//! # Available Tools
//!
//! - `lsp` - run one of the nine code-intelligence operations at a position
//! - `set_project_root` - choose the project the `lsp` tool resolves paths in
//! - `lsp_status` - list running language servers and open documents

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::session::{Operation, OperationRequest, ServerConnection};

/// Input of the `lsp` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LspToolParams {
    /// The operation to run.
    #[schemars(
        description = "One of: goToDefinition, findReferences, hover, documentSymbol, \
                       workspaceSymbol, goToImplementation, prepareCallHierarchy, \
                       incomingCalls, outgoingCalls"
    )]
    pub operation: Operation,
    /// Path to the file.
    #[schemars(description = "Path to the source file, absolute or relative to the project root")]
    pub file_path: String,
    /// Line number (1-indexed).
    #[schemars(description = "Line number (1-indexed, as shown in editors)")]
    pub line: u32,
    /// Character offset (1-indexed).
    #[schemars(description = "Character offset in the line (1-indexed, as shown in editors)")]
    pub character: u32,
}

impl From<LspToolParams> for OperationRequest {
    fn from(params: LspToolParams) -> Self {
        Self::new(params.operation, params.file_path, params.line, params.character)
    }
}

/// Input of the `set_project_root` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetProjectRootParams {
    /// Directory to use as the project root.
    #[schemars(description = "Directory to use as the project root")]
    pub path: String,
}

/// A document currently open on a language server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenDocument {
    /// Absolute path of the document.
    pub path: String,
    /// Server the document is open on.
    pub server_id: String,
}

/// Response of the `lsp_status` tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Project root of this server's task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_root: Option<String>,
    /// Known server connections.
    pub connections: Vec<ServerConnection>,
    /// Documents held open by in-flight operations.
    pub open_documents: Vec<OpenDocument>,
}
