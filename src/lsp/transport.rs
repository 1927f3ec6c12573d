//! Transport contract between the session layer and language servers.
//!
//! [`LspTransport`] is the narrow interface the orchestration core consumes:
//! start a server, sync documents, drop references, and issue the nine
//! protocol calls. [`ProcessTransport`] implements it with one
//! [`LspClient`] process per started server.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lsp_types::{
    CallHierarchyItem, DocumentSymbolResponse, GotoDefinitionResponse, Hover, Location, Position,
    WorkspaceSymbolResponse,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::catalog::LanguageCatalog;
use crate::error::LspError;

use super::LspResult;
use super::client::LspClient;
use super::types::{CallRecord, decode_call_records};

/// Identifier of a started language server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    /// Wraps a raw id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Protocol client subsystem consumed by the session layer.
///
/// All positions are 0-based. Every method may suspend and may fail.
#[async_trait]
pub trait LspTransport: Send + Sync {
    /// Prepares the subsystem. Must be idempotent.
    async fn initialize(&self) -> LspResult<()> {
        Ok(())
    }

    /// Starts a server for `language` rooted at `workspace_root`; the new
    /// server holds one reference.
    async fn start_server(&self, language: &str, workspace_root: &Path) -> LspResult<ServerId>;

    /// Reports whether `server_id` names a running server.
    async fn is_running(&self, server_id: &ServerId) -> bool;

    /// Sends `textDocument/didOpen`.
    async fn open_document(
        &self,
        server_id: &ServerId,
        path: &Path,
        language_id: &str,
        content: &str,
    ) -> LspResult<()>;

    /// Sends `textDocument/didClose`.
    async fn close_document(&self, server_id: &ServerId, path: &Path) -> LspResult<()>;

    /// Drops one reference. Unknown ids and zero counts are no-ops.
    async fn decrement_ref_count(&self, server_id: &ServerId) -> LspResult<()>;

    /// `textDocument/definition`.
    async fn definition(
        &self,
        server_id: &ServerId,
        path: &Path,
        position: Position,
    ) -> LspResult<Option<GotoDefinitionResponse>>;

    /// `textDocument/references`.
    async fn references(
        &self,
        server_id: &ServerId,
        path: &Path,
        position: Position,
        include_declaration: bool,
    ) -> LspResult<Option<Vec<Location>>>;

    /// `textDocument/hover`.
    async fn hover(
        &self,
        server_id: &ServerId,
        path: &Path,
        position: Position,
    ) -> LspResult<Option<Hover>>;

    /// `textDocument/documentSymbol`.
    async fn document_symbol(
        &self,
        server_id: &ServerId,
        path: &Path,
    ) -> LspResult<Option<DocumentSymbolResponse>>;

    /// `workspace/symbol`.
    async fn workspace_symbol(
        &self,
        server_id: &ServerId,
        query: &str,
    ) -> LspResult<Option<WorkspaceSymbolResponse>>;

    /// `textDocument/implementation`.
    async fn implementation(
        &self,
        server_id: &ServerId,
        path: &Path,
        position: Position,
    ) -> LspResult<Option<GotoDefinitionResponse>>;

    /// `textDocument/prepareCallHierarchy`.
    async fn prepare_call_hierarchy(
        &self,
        server_id: &ServerId,
        path: &Path,
        position: Position,
    ) -> LspResult<Option<Vec<CallHierarchyItem>>>;

    /// `callHierarchy/incomingCalls`, decoded into tagged records; `None`
    /// marks a null or undecodable entry.
    async fn incoming_calls(
        &self,
        server_id: &ServerId,
        item: &CallHierarchyItem,
    ) -> LspResult<Vec<Option<CallRecord>>>;

    /// `callHierarchy/outgoingCalls`, decoded like [`Self::incoming_calls`].
    async fn outgoing_calls(
        &self,
        server_id: &ServerId,
        item: &CallHierarchyItem,
    ) -> LspResult<Vec<Option<CallRecord>>>;
}

/// Timeouts and idle policy for [`ProcessTransport`].
#[derive(Debug, Clone)]
pub struct ProcessTransportOptions {
    /// Timeout for the `initialize` handshake.
    pub init_timeout: Duration,
    /// Timeout for each request.
    pub request_timeout: Duration,
    /// Servers without references are stopped after this long unused.
    pub idle_shutdown: Duration,
    /// How often the idle reaper looks for unused servers.
    pub idle_check_interval: Duration,
}

impl Default for ProcessTransportOptions {
    fn default() -> Self {
        Self {
            init_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            idle_shutdown: Duration::from_secs(300),
            idle_check_interval: Duration::from_millis(500),
        }
    }
}

struct ManagedServer {
    client: Arc<LspClient>,
    language: String,
    ref_count: usize,
    last_used: Instant,
}

type ServerTable = Arc<Mutex<HashMap<ServerId, ManagedServer>>>;

/// [`LspTransport`] backed by language server processes.
pub struct ProcessTransport {
    catalog: Arc<dyn LanguageCatalog>,
    options: ProcessTransportOptions,
    servers: ServerTable,
    next_id: AtomicU64,
    reaper: OnceCell<tokio::task::JoinHandle<()>>,
}

impl ProcessTransport {
    /// Creates a transport that resolves server commands through `catalog`.
    pub fn new(catalog: Arc<dyn LanguageCatalog>, options: ProcessTransportOptions) -> Self {
        Self {
            catalog,
            options,
            servers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            reaper: OnceCell::new(),
        }
    }

    /// Returns the reference count of a running server.
    pub async fn ref_count(&self, server_id: &ServerId) -> Option<usize> {
        self.servers
            .lock()
            .await
            .get(server_id)
            .map(|entry| entry.ref_count)
    }

    /// Stops every server.
    pub async fn shutdown_all(&self) {
        let drained: Vec<(ServerId, ManagedServer)> =
            self.servers.lock().await.drain().collect();
        for (id, entry) in drained {
            info!(server_id = %id, language = %entry.language, "stopping language server");
            if let Err(e) = entry.client.shutdown().await {
                warn!(server_id = %id, error = %e, "language server shutdown failed");
            }
        }
        if let Some(handle) = self.reaper.get() {
            handle.abort();
        }
    }

    /// Looks up the client of a running server and marks it used.
    async fn client(&self, server_id: &ServerId) -> LspResult<Arc<LspClient>> {
        let mut servers = self.servers.lock().await;
        let entry = servers
            .get_mut(server_id)
            .ok_or_else(|| LspError::ServerExited(server_id.to_string()))?;
        entry.last_used = Instant::now();
        Ok(entry.client.clone())
    }

    fn spawn_idle_reaper(&self) -> tokio::task::JoinHandle<()> {
        let servers = self.servers.clone();
        let idle = self.options.idle_shutdown;
        let interval = self.options.idle_check_interval;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let now = Instant::now();
                let expired: Vec<(ServerId, ManagedServer)> = {
                    let mut guard = servers.lock().await;
                    let ids: Vec<ServerId> = guard
                        .iter()
                        .filter(|(_, entry)| {
                            entry.ref_count == 0 && now.duration_since(entry.last_used) >= idle
                        })
                        .map(|(id, _)| id.clone())
                        .collect();
                    ids.into_iter()
                        .filter_map(|id| guard.remove(&id).map(|entry| (id, entry)))
                        .collect()
                };

                for (id, entry) in expired {
                    info!(server_id = %id, language = %entry.language, "idle shutdown: stopping language server");
                    if let Err(e) = entry.client.shutdown().await {
                        warn!(server_id = %id, error = %e, "idle shutdown failed");
                    }
                }
            }
        })
    }
}

#[async_trait]
impl LspTransport for ProcessTransport {
    async fn initialize(&self) -> LspResult<()> {
        self.reaper
            .get_or_init(|| async { self.spawn_idle_reaper() })
            .await;
        Ok(())
    }

    async fn start_server(&self, language: &str, workspace_root: &Path) -> LspResult<ServerId> {
        let command = self.catalog.server_config(language).ok_or_else(|| {
            LspError::ServerStartFailed(format!("no server configured for {language}"))
        })?;

        let client = LspClient::builder()
            .server_command(&command.command)
            .server_args(command.args.clone())
            .workspace_root(workspace_root)
            .init_timeout(self.options.init_timeout)
            .request_timeout(self.options.request_timeout)
            .build()
            .await?;

        let id = ServerId::new(format!(
            "{language}-{}",
            self.next_id.fetch_add(1, Ordering::Relaxed)
        ));
        info!(
            server_id = %id,
            language,
            command = %command.command,
            workspace_root = %workspace_root.display(),
            "started language server"
        );

        self.servers.lock().await.insert(
            id.clone(),
            ManagedServer {
                client: Arc::new(client),
                language: language.to_string(),
                ref_count: 1,
                last_used: Instant::now(),
            },
        );
        Ok(id)
    }

    async fn is_running(&self, server_id: &ServerId) -> bool {
        let client = {
            let servers = self.servers.lock().await;
            match servers.get(server_id) {
                Some(entry) => entry.client.clone(),
                None => return false,
            }
        };
        client.is_alive().await
    }

    async fn open_document(
        &self,
        server_id: &ServerId,
        path: &Path,
        language_id: &str,
        content: &str,
    ) -> LspResult<()> {
        self.client(server_id)
            .await?
            .did_open(path, language_id, content)
            .await
    }

    async fn close_document(&self, server_id: &ServerId, path: &Path) -> LspResult<()> {
        self.client(server_id).await?.did_close(path).await
    }

    async fn decrement_ref_count(&self, server_id: &ServerId) -> LspResult<()> {
        let mut servers = self.servers.lock().await;
        match servers.get_mut(server_id) {
            Some(entry) => {
                entry.ref_count = entry.ref_count.saturating_sub(1);
                entry.last_used = Instant::now();
                debug!(server_id = %server_id, ref_count = entry.ref_count, "released server reference");
            }
            None => debug!(server_id = %server_id, "release of unknown server ignored"),
        }
        Ok(())
    }

    async fn definition(
        &self,
        server_id: &ServerId,
        path: &Path,
        position: Position,
    ) -> LspResult<Option<GotoDefinitionResponse>> {
        self.client(server_id)
            .await?
            .goto_definition(path, position)
            .await
    }

    async fn references(
        &self,
        server_id: &ServerId,
        path: &Path,
        position: Position,
        include_declaration: bool,
    ) -> LspResult<Option<Vec<Location>>> {
        self.client(server_id)
            .await?
            .find_references(path, position, include_declaration)
            .await
    }

    async fn hover(
        &self,
        server_id: &ServerId,
        path: &Path,
        position: Position,
    ) -> LspResult<Option<Hover>> {
        self.client(server_id).await?.hover(path, position).await
    }

    async fn document_symbol(
        &self,
        server_id: &ServerId,
        path: &Path,
    ) -> LspResult<Option<DocumentSymbolResponse>> {
        self.client(server_id).await?.document_symbols(path).await
    }

    async fn workspace_symbol(
        &self,
        server_id: &ServerId,
        query: &str,
    ) -> LspResult<Option<WorkspaceSymbolResponse>> {
        self.client(server_id).await?.workspace_symbols(query).await
    }

    async fn implementation(
        &self,
        server_id: &ServerId,
        path: &Path,
        position: Position,
    ) -> LspResult<Option<GotoDefinitionResponse>> {
        self.client(server_id)
            .await?
            .implementations(path, position)
            .await
    }

    async fn prepare_call_hierarchy(
        &self,
        server_id: &ServerId,
        path: &Path,
        position: Position,
    ) -> LspResult<Option<Vec<CallHierarchyItem>>> {
        self.client(server_id)
            .await?
            .prepare_call_hierarchy(path, position)
            .await
    }

    async fn incoming_calls(
        &self,
        server_id: &ServerId,
        item: &CallHierarchyItem,
    ) -> LspResult<Vec<Option<CallRecord>>> {
        let raw = self.client(server_id).await?.incoming_calls(item).await?;
        Ok(decode_call_records(raw))
    }

    async fn outgoing_calls(
        &self,
        server_id: &ServerId,
        item: &CallHierarchyItem,
    ) -> LspResult<Vec<Option<CallRecord>>> {
        let raw = self.client(server_id).await?.outgoing_calls(item).await?;
        Ok(decode_call_records(raw))
    }
}
