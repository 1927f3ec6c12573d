//! MCP server implementation for kadabra-conductor.
//!
//! This module contains the `KadabraConductor` struct that exposes the
//! session orchestrator as MCP tools.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::wrapper::Parameters,
    model::{
        CallToolResult, Content, ErrorCode, Implementation, ProtocolVersion, ServerCapabilities,
        ServerInfo,
    },
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use tracing::info;

use crate::session::{OperationRequest, Orchestrator, TaskContext};
use crate::workspace::{ProjectWorkspace, WorkspaceResolver};

use super::tools::{LspToolParams, OpenDocument, SetProjectRootParams, StatusReport};

/// Task id used for every call arriving over this server.
pub const DEFAULT_TASK_ID: &str = "default";

/// MCP server for orchestrated code intelligence.
#[derive(Clone)]
pub struct KadabraConductor {
    orchestrator: Arc<Orchestrator>,
    workspace: Arc<ProjectWorkspace>,
    task_id: String,
    tool_router: ToolRouter<KadabraConductor>,
}

impl KadabraConductor {
    /// Creates a server over `orchestrator`.
    ///
    /// `workspace` must be the resolver the orchestrator was built with, so
    /// `set_project_root` takes effect for later `lsp` calls.
    pub fn new(orchestrator: Arc<Orchestrator>, workspace: Arc<ProjectWorkspace>) -> Self {
        Self {
            orchestrator,
            workspace,
            task_id: DEFAULT_TASK_ID.to_string(),
            tool_router: Self::tool_router(),
        }
    }

    /// Task context of calls made through this server.
    pub fn context(&self) -> TaskContext {
        TaskContext::new(self.task_id.clone())
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(value).map_err(|e| {
        McpError::new(
            ErrorCode::INTERNAL_ERROR,
            format!("failed to serialize response: {e}"),
            None,
        )
    })
}

/// Tool implementations for `KadabraConductor`.
#[tool_router]
impl KadabraConductor {
    /// Runs one code-intelligence operation at a file position.
    #[tool(
        description = "Code intelligence via language servers. Operations: goToDefinition, \
                       findReferences, hover, documentSymbol, workspaceSymbol (all symbols, \
                       filter them yourself), goToImplementation, prepareCallHierarchy, \
                       incomingCalls, outgoingCalls. Line and character are 1-based."
    )]
    pub async fn lsp(
        &self,
        Parameters(params): Parameters<LspToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = OperationRequest::from(params);
        let result = self.orchestrator.execute(&request, &self.context()).await;
        Ok(CallToolResult::success(vec![Content::text(to_json(&result)?)]))
    }

    /// Sets the project root used to resolve relative paths.
    #[tool(description = "Set the project root directory that file paths are resolved against.")]
    pub async fn set_project_root(
        &self,
        Parameters(params): Parameters<SetProjectRootParams>,
    ) -> Result<CallToolResult, McpError> {
        let root = tokio::fs::canonicalize(&params.path).await.map_err(|e| {
            McpError::new(
                ErrorCode::INVALID_PARAMS,
                format!("cannot use {} as project root: {e}", params.path),
                None,
            )
        })?;
        if !root.is_dir() {
            return Err(McpError::new(
                ErrorCode::INVALID_PARAMS,
                format!("{} is not a directory", root.display()),
                None,
            ));
        }

        info!(task_id = %self.task_id, root = %root.display(), "project root set");
        self.workspace.set_task_root(self.task_id.clone(), root.clone()).await;
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Project root set to {}",
            root.display()
        ))]))
    }

    /// Lists language servers and open documents.
    #[tool(description = "List running language servers, their reference counts and open documents.")]
    pub async fn lsp_status(&self) -> Result<CallToolResult, McpError> {
        let project_root = self
            .workspace
            .effective_workspace_root(&self.task_id)
            .await
            .map(|root: PathBuf| root.display().to_string());
        let open_documents = self
            .orchestrator
            .registry()
            .owned_files()
            .await
            .into_iter()
            .map(|(path, server_id)| OpenDocument {
                path: path.display().to_string(),
                server_id: server_id.to_string(),
            })
            .collect();

        let report = StatusReport {
            project_root,
            connections: self.orchestrator.sessions().connections().await,
            open_documents,
        };
        Ok(CallToolResult::success(vec![Content::text(to_json(&report)?)]))
    }
}

#[tool_handler]
impl ServerHandler for KadabraConductor {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "kadabra-conductor".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Code intelligence through language servers shared across calls. Set the \
                 project root once, then use the `lsp` tool with 1-based line/character \
                 positions. Servers start on first use per language and project."
                    .into(),
            ),
        }
    }
}
