//! Request and result types of an orchestrated operation.

use lsp_types::{
    CallHierarchyItem, DocumentSymbolResponse, GotoDefinitionResponse, Hover, Location,
    WorkspaceSymbolResponse,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OrchestrationError;
use crate::lsp::CallRecord;

/// The nine supported operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    /// Where the symbol is defined.
    GoToDefinition,
    /// Every usage of the symbol, declaration included.
    FindReferences,
    /// Type signature and docs of the symbol.
    Hover,
    /// Symbols declared in the file.
    DocumentSymbol,
    /// All symbols in the workspace (unfiltered).
    WorkspaceSymbol,
    /// Implementations of the trait/interface.
    GoToImplementation,
    /// Call-hierarchy items at the position.
    PrepareCallHierarchy,
    /// Callers of the function at the position.
    IncomingCalls,
    /// Callees of the function at the position.
    OutgoingCalls,
}

impl Operation {
    /// All operations, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::GoToDefinition,
        Self::FindReferences,
        Self::Hover,
        Self::DocumentSymbol,
        Self::WorkspaceSymbol,
        Self::GoToImplementation,
        Self::PrepareCallHierarchy,
        Self::IncomingCalls,
        Self::OutgoingCalls,
    ];

    /// Wire name, as accepted in requests.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoToDefinition => "goToDefinition",
            Self::FindReferences => "findReferences",
            Self::Hover => "hover",
            Self::DocumentSymbol => "documentSymbol",
            Self::WorkspaceSymbol => "workspaceSymbol",
            Self::GoToImplementation => "goToImplementation",
            Self::PrepareCallHierarchy => "prepareCallHierarchy",
            Self::IncomingCalls => "incomingCalls",
            Self::OutgoingCalls => "outgoingCalls",
        }
    }

    /// Message reported when the server has nothing for this operation.
    pub fn no_results_message(self) -> &'static str {
        match self {
            Self::GoToDefinition => "No definition found",
            Self::FindReferences => "No references found",
            Self::Hover => "No hover information available",
            Self::DocumentSymbol => "No symbols found in document",
            Self::WorkspaceSymbol => "No symbols found in workspace",
            Self::GoToImplementation => "No implementation found",
            Self::PrepareCallHierarchy => "No call hierarchy item found at position",
            Self::IncomingCalls => "No incoming calls found",
            Self::OutgoingCalls => "No outgoing calls found",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation: {s}"))
    }
}

/// One tool-call request, in 1-based editor coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    /// Operation to run.
    pub operation: Operation,
    /// File path, absolute or relative to the project root.
    pub file_path: String,
    /// Line number (1-based).
    pub line: u32,
    /// Character offset in the line (1-based).
    pub character: u32,
}

impl OperationRequest {
    /// Creates a request.
    pub fn new(operation: Operation, file_path: impl Into<String>, line: u32, character: u32) -> Self {
        Self {
            operation,
            file_path: file_path.into(),
            line,
            character,
        }
    }
}

/// Caller identity used to resolve the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    /// Task whose project root applies.
    pub task_id: String,
}

impl TaskContext {
    /// Creates a context for `task_id`.
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }
}

/// Structured outcome of an operation; never an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the operation produced results.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Normalized protocol data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl OperationResult {
    /// A result carrying data.
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// A non-success result; `data` is kept for empty collections.
    pub fn no_results(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data,
        }
    }

    /// A failed result without data.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

impl From<OrchestrationError> for OperationResult {
    fn from(err: OrchestrationError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Normalized data of a dispatched operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationData {
    /// Definitions, references or implementations.
    Locations(Vec<Location>),
    /// Hover contents.
    Hover(Hover),
    /// Symbols of one document.
    DocumentSymbols(DocumentSymbolResponse),
    /// Symbols across the workspace.
    WorkspaceSymbols(WorkspaceSymbolResponse),
    /// Prepared call-hierarchy items.
    CallHierarchyItems(Vec<CallHierarchyItem>),
    /// Incoming or outgoing calls.
    Calls(Vec<CallRecord>),
}

impl OperationData {
    /// Number of entries; a hover counts as one.
    pub fn len(&self) -> usize {
        match self {
            Self::Locations(locations) => locations.len(),
            Self::Hover(_) => 1,
            Self::DocumentSymbols(DocumentSymbolResponse::Flat(symbols)) => symbols.len(),
            Self::DocumentSymbols(DocumentSymbolResponse::Nested(symbols)) => symbols.len(),
            Self::WorkspaceSymbols(WorkspaceSymbolResponse::Flat(symbols)) => symbols.len(),
            Self::WorkspaceSymbols(WorkspaceSymbolResponse::Nested(symbols)) => symbols.len(),
            Self::CallHierarchyItems(items) => items.len(),
            Self::Calls(calls) => calls.len(),
        }
    }

    /// Whether the data is an empty collection.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts definition-style responses to plain locations.
    pub fn from_goto(response: GotoDefinitionResponse) -> Self {
        Self::Locations(match response {
            GotoDefinitionResponse::Scalar(loc) => vec![loc],
            GotoDefinitionResponse::Array(locs) => locs,
            GotoDefinitionResponse::Link(links) => links
                .into_iter()
                .map(|link| Location {
                    uri: link.target_uri,
                    range: link.target_selection_range,
                })
                .collect(),
        })
    }
}
