//! LSP client implementation.
//!
//! This module provides the client that spawns one language server process
//! and speaks the Language Server Protocol with it over stdio.
//!
//! # Example
//!
//! ```ignore
//! use kadabra_conductor::lsp::client::LspClient;
//!
//! let client = LspClient::builder()
//!     .server_command("rust-analyzer")
//!     .workspace_root("/path/to/project")
//!     .build()
//!     .await?;
//!
//! client.did_open(&file, "rust", &text).await?;
//! let definition = client.goto_definition(&file, Position::new(9, 4)).await?;
//! client.shutdown().await?;
//! ```

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_lsp::ServerSocket;
use async_lsp::concurrency::ConcurrencyLayer;
use async_lsp::panic::CatchUnwindLayer;
use async_lsp::router::Router;
use async_lsp::tracing::TracingLayer;
use lsp_types::notification::{self, Notification};
use lsp_types::request::{self, Request};
use lsp_types::{
    CallHierarchyIncomingCallsParams, CallHierarchyItem, CallHierarchyOutgoingCallsParams,
    CallHierarchyPrepareParams, ClientCapabilities, ClientInfo, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DocumentSymbolClientCapabilities, DocumentSymbolParams,
    DocumentSymbolResponse, DynamicRegistrationClientCapabilities, GotoCapability,
    GotoDefinitionParams, GotoDefinitionResponse, Hover, HoverClientCapabilities, HoverParams,
    InitializeParams, InitializedParams, Location, MarkupKind, PartialResultParams, Position,
    ReferenceContext, ReferenceParams, TextDocumentClientCapabilities, TextDocumentIdentifier,
    TextDocumentItem, TextDocumentPositionParams, TextDocumentSyncClientCapabilities, TraceValue,
    Url, WindowClientCapabilities, WorkDoneProgressParams, WorkspaceClientCapabilities,
    WorkspaceFolder, WorkspaceSymbolClientCapabilities, WorkspaceSymbolParams,
    WorkspaceSymbolResponse,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tracing::{debug, trace};

use crate::error::LspError;

use super::LspResult;
use super::types::path_to_url;

/// `callHierarchy/incomingCalls` with the result left as raw records, so a
/// malformed entry drops one record instead of failing the whole response.
enum RawIncomingCalls {}

impl Request for RawIncomingCalls {
    type Params = CallHierarchyIncomingCallsParams;
    type Result = Option<Vec<Value>>;
    const METHOD: &'static str = request::CallHierarchyIncomingCalls::METHOD;
}

/// `callHierarchy/outgoingCalls` with the result left as raw records.
enum RawOutgoingCalls {}

impl Request for RawOutgoingCalls {
    type Params = CallHierarchyOutgoingCallsParams;
    type Result = Option<Vec<Value>>;
    const METHOD: &'static str = request::CallHierarchyOutgoingCalls::METHOD;
}

/// State for handling server-to-client notifications.
#[derive(Debug, Clone)]
struct ClientState {
    command: String,
}

/// Configuration for building an LSP client.
#[derive(Debug, Clone)]
pub struct LspClientConfig {
    /// Command to start the language server.
    pub server_command: String,
    /// Arguments to pass to the language server.
    pub server_args: Vec<String>,
    /// Root directory of the workspace.
    pub workspace_root: PathBuf,
    /// Timeout for initialization.
    pub init_timeout: Duration,
    /// Timeout for requests.
    pub request_timeout: Duration,
}

impl Default for LspClientConfig {
    fn default() -> Self {
        Self {
            server_command: "rust-analyzer".to_string(),
            server_args: Vec::new(),
            workspace_root: PathBuf::from("."),
            init_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Builder for constructing an LSP client.
#[derive(Debug, Default)]
pub struct LspClientBuilder {
    config: LspClientConfig,
}

impl LspClientBuilder {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server command.
    #[must_use]
    pub fn server_command(mut self, command: impl Into<String>) -> Self {
        self.config.server_command = command.into();
        self
    }

    /// Sets the server arguments.
    #[must_use]
    pub fn server_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.server_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the workspace root.
    #[must_use]
    pub fn workspace_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = path.into();
        self
    }

    /// Sets the initialization timeout.
    #[must_use]
    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.config.init_timeout = timeout;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Builds the LSP client.
    ///
    /// This will spawn the language server process and perform initialization.
    /// ## Errors
    #[allow(clippy::too_many_lines)]
    pub async fn build(self) -> LspResult<LspClient> {
        let workspace_root = self.config.workspace_root.canonicalize().map_err(|e| {
            LspError::InitializationFailed(format!("failed to canonicalize workspace root: {e}"))
        })?;

        let mut cmd = async_process::Command::new(&self.config.server_command);
        cmd.args(&self.config.server_args)
            .current_dir(&workspace_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            LspError::ServerStartFailed(format!(
                "failed to spawn '{}': {}",
                self.config.server_command, e
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LspError::ServerStartFailed("failed to capture stdout".to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LspError::ServerStartFailed("failed to capture stdin".to_string()))?;

        let command = self.config.server_command.clone();
        let (mainloop, server) = async_lsp::MainLoop::new_client(|_client| {
            let mut router = Router::new(ClientState { command });

            router.notification::<notification::Progress>(|_this, _prog| ControlFlow::Continue(()));
            router.notification::<notification::PublishDiagnostics>(|_this, _diag| {
                ControlFlow::Continue(())
            });
            router.notification::<notification::LogMessage>(|this, params| {
                trace!(server = %this.command, message = %params.message, "server log");
                ControlFlow::Continue(())
            });
            router.notification::<notification::ShowMessage>(|this, params| {
                debug!(server = %this.command, message = %params.message, "server message");
                ControlFlow::Continue(())
            });
            router.unhandled_notification(|_this, _notif| ControlFlow::Continue(()));

            ServiceBuilder::new()
                .layer(TracingLayer::default())
                .layer(CatchUnwindLayer::default())
                .layer(ConcurrencyLayer::default())
                .service(router)
        });

        let mainloop_handle = tokio::spawn(async move {
            mainloop.run_buffered(stdout, stdin).await.ok();
        });

        let workspace_uri = Url::from_file_path(&workspace_root).map_err(|()| {
            LspError::InitializationFailed(format!(
                "invalid workspace root path: {}",
                workspace_root.display()
            ))
        })?;

        let init_params = InitializeParams {
            process_id: Some(std::process::id()),
            workspace_folders: Some(vec![WorkspaceFolder {
                uri: workspace_uri,
                name: workspace_root
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("workspace")
                    .to_string(),
            }]),
            initialization_options: None,
            capabilities: ClientCapabilities {
                workspace: Some(WorkspaceClientCapabilities {
                    symbol: Some(WorkspaceSymbolClientCapabilities {
                        dynamic_registration: Some(false),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                text_document: Some(TextDocumentClientCapabilities {
                    synchronization: Some(TextDocumentSyncClientCapabilities {
                        dynamic_registration: Some(false),
                        will_save: Some(false),
                        will_save_wait_until: Some(false),
                        did_save: Some(false),
                    }),
                    hover: Some(HoverClientCapabilities {
                        dynamic_registration: Some(false),
                        content_format: Some(vec![MarkupKind::Markdown, MarkupKind::PlainText]),
                    }),
                    definition: Some(GotoCapability {
                        dynamic_registration: Some(false),
                        link_support: Some(false),
                    }),
                    references: Some(DynamicRegistrationClientCapabilities {
                        dynamic_registration: Some(false),
                    }),
                    document_symbol: Some(DocumentSymbolClientCapabilities {
                        dynamic_registration: Some(false),
                        hierarchical_document_symbol_support: Some(true),
                        ..Default::default()
                    }),
                    implementation: Some(GotoCapability {
                        dynamic_registration: Some(false),
                        link_support: Some(false),
                    }),
                    call_hierarchy: Some(DynamicRegistrationClientCapabilities {
                        dynamic_registration: Some(false),
                    }),
                    ..Default::default()
                }),
                window: Some(WindowClientCapabilities {
                    work_done_progress: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            },
            trace: Some(TraceValue::Off),
            client_info: Some(ClientInfo {
                name: "kadabra-conductor".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            locale: None,
            work_done_progress_params: WorkDoneProgressParams::default(),
            ..Default::default()
        };

        tokio::time::timeout(
            self.config.init_timeout,
            server.request::<request::Initialize>(init_params),
        )
        .await
        .map_err(|_| LspError::Timeout(self.config.init_timeout))?
        .map_err(|e| LspError::InitializationFailed(format!("initialize request failed: {e:?}")))?;

        server
            .notify::<notification::Initialized>(InitializedParams {})
            .map_err(|e| {
                LspError::InitializationFailed(format!("initialized notification failed: {e:?}"))
            })?;

        debug!(
            command = %self.config.server_command,
            workspace_root = %workspace_root.display(),
            "language server initialized"
        );

        Ok(LspClient {
            config: self.config,
            server,
            _mainloop_handle: mainloop_handle,
            open_documents: Arc::new(Mutex::new(HashSet::new())),
            child: Arc::new(Mutex::new(child)),
        })
    }
}

/// LSP client for one language server process.
///
/// Requests go straight to the shared [`ServerSocket`]; nothing is held
/// across a round-trip, so independent requests overlap on the wire.
#[derive(Debug)]
pub struct LspClient {
    /// Configuration used to create this client.
    config: LspClientConfig,
    /// The language server handle for making requests.
    server: ServerSocket,
    /// Handle to the mainloop task.
    _mainloop_handle: tokio::task::JoinHandle<()>,
    /// Set of currently open documents.
    open_documents: Arc<Mutex<HashSet<Url>>>,
    /// The language server process (kill-on-drop).
    child: Arc<Mutex<async_process::Child>>,
}

impl LspClient {
    /// Creates a new builder for constructing an LSP client.
    pub fn builder() -> LspClientBuilder {
        LspClientBuilder::new()
    }

    /// Reports whether the server process is still running.
    pub async fn is_alive(&self) -> bool {
        matches!(self.child.lock().await.try_status(), Ok(None))
    }

    /// Shuts down the language server gracefully.
    /// ## Errors
    pub async fn shutdown(&self) -> LspResult<()> {
        self.request::<request::Shutdown>(()).await?;

        self.server
            .notify::<notification::Exit>(())
            .map_err(|e| LspError::RequestFailed(format!("exit notification failed: {e:?}")))?;

        Ok(())
    }

    /// Opens a document in the language server.
    ///
    /// Sends `textDocument/didOpen` with the given content. Opening a
    /// document that is already open is a no-op.
    /// ## Errors
    pub async fn did_open(&self, path: &Path, language_id: &str, content: &str) -> LspResult<()> {
        let uri = path_to_url(path)?;

        let mut open = self.open_documents.lock().await;
        if open.contains(&uri) {
            debug!(%uri, "document already open");
            return Ok(());
        }

        let params = DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: uri.clone(),
                language_id: language_id.to_string(),
                version: 0,
                text: content.to_string(),
            },
        };

        self.server
            .notify::<notification::DidOpenTextDocument>(params)
            .map_err(|e| LspError::RequestFailed(format!("didOpen notification failed: {e:?}")))?;

        open.insert(uri);
        Ok(())
    }

    /// Closes a document in the language server.
    /// ## Errors
    pub async fn did_close(&self, path: &Path) -> LspResult<()> {
        let uri = path_to_url(path)?;

        let mut open = self.open_documents.lock().await;
        if !open.remove(&uri) {
            debug!(%uri, "document not open, skipping didClose");
            return Ok(());
        }

        let params = DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier { uri },
        };

        self.server
            .notify::<notification::DidCloseTextDocument>(params)
            .map_err(|e| LspError::RequestFailed(format!("didClose notification failed: {e:?}")))?;

        Ok(())
    }

    /// Sends a request bounded by the configured request timeout.
    async fn request<R: Request>(&self, params: R::Params) -> LspResult<R::Result> {
        tokio::time::timeout(self.config.request_timeout, self.server.request::<R>(params))
            .await
            .map_err(|_| LspError::Timeout(self.config.request_timeout))?
            .map_err(|e| LspError::RequestFailed(format!("{} failed: {e:?}", R::METHOD)))
    }

    fn position_params(path: &Path, position: Position) -> LspResult<TextDocumentPositionParams> {
        Ok(TextDocumentPositionParams {
            text_document: TextDocumentIdentifier {
                uri: path_to_url(path)?,
            },
            position,
        })
    }

    // Navigation methods. Positions are 0-based protocol positions.

    /// Gets the definition location(s) for the symbol at the given position.
    /// ## Errors
    pub async fn goto_definition(
        &self,
        path: &Path,
        position: Position,
    ) -> LspResult<Option<GotoDefinitionResponse>> {
        self.request::<request::GotoDefinition>(GotoDefinitionParams {
            text_document_position_params: Self::position_params(path, position)?,
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        })
        .await
    }

    /// Finds all references to the symbol at the given position.
    /// ## Errors
    pub async fn find_references(
        &self,
        path: &Path,
        position: Position,
        include_declaration: bool,
    ) -> LspResult<Option<Vec<Location>>> {
        self.request::<request::References>(ReferenceParams {
            text_document_position: Self::position_params(path, position)?,
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
            context: ReferenceContext {
                include_declaration,
            },
        })
        .await
    }

    /// Gets hover information for the symbol at the given position.
    /// ## Errors
    pub async fn hover(&self, path: &Path, position: Position) -> LspResult<Option<Hover>> {
        self.request::<request::HoverRequest>(HoverParams {
            text_document_position_params: Self::position_params(path, position)?,
            work_done_progress_params: WorkDoneProgressParams::default(),
        })
        .await
    }

    /// Gets all symbols in a document.
    /// ## Errors
    pub async fn document_symbols(&self, path: &Path) -> LspResult<Option<DocumentSymbolResponse>> {
        self.request::<request::DocumentSymbolRequest>(DocumentSymbolParams {
            text_document: TextDocumentIdentifier {
                uri: path_to_url(path)?,
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        })
        .await
    }

    /// Searches for symbols across the workspace.
    /// ## Errors
    pub async fn workspace_symbols(&self, query: &str) -> LspResult<Option<WorkspaceSymbolResponse>> {
        self.request::<request::WorkspaceSymbolRequest>(WorkspaceSymbolParams {
            query: query.to_string(),
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        })
        .await
    }

    /// Gets implementations for the trait/interface at the given position.
    /// ## Errors
    pub async fn implementations(
        &self,
        path: &Path,
        position: Position,
    ) -> LspResult<Option<GotoDefinitionResponse>> {
        self.request::<request::GotoImplementation>(request::GotoImplementationParams {
            text_document_position_params: Self::position_params(path, position)?,
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        })
        .await
    }

    /// Prepares call hierarchy items for the given position.
    /// ## Errors
    pub async fn prepare_call_hierarchy(
        &self,
        path: &Path,
        position: Position,
    ) -> LspResult<Option<Vec<CallHierarchyItem>>> {
        self.request::<request::CallHierarchyPrepare>(CallHierarchyPrepareParams {
            text_document_position_params: Self::position_params(path, position)?,
            work_done_progress_params: WorkDoneProgressParams::default(),
        })
        .await
    }

    /// Gets the raw incoming-call records (callers) of a prepared item.
    /// ## Errors
    pub async fn incoming_calls(&self, item: &CallHierarchyItem) -> LspResult<Option<Vec<Value>>> {
        self.request::<RawIncomingCalls>(CallHierarchyIncomingCallsParams {
            item: item.clone(),
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        })
        .await
    }

    /// Gets the raw outgoing-call records (callees) of a prepared item.
    /// ## Errors
    pub async fn outgoing_calls(&self, item: &CallHierarchyItem) -> LspResult<Option<Vec<Value>>> {
        self.request::<RawOutgoingCalls>(CallHierarchyOutgoingCallsParams {
            item: item.clone(),
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        })
        .await
    }
}
