//! Session manager: one language server per `(language, workspace root)`.
//!
//! Acquiring a connection is serialized per key, so two first-time callers
//! for the same pair never both start a server; the second one waits and
//! then reuses what the first one started. Only the caller that started a
//! server gets a lease that releases a reference.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::OrchestrationError;
use crate::lsp::{LspTransport, ServerId};

/// A live server and the references this process holds on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConnection {
    /// Transport id of the server.
    pub server_id: ServerId,
    /// Language the server handles.
    pub language: String,
    /// Directory the server was started in.
    pub workspace_root: PathBuf,
    /// Outstanding references; never negative.
    pub ref_count: usize,
}

type SlotKey = (String, PathBuf);
type Slot = Arc<Mutex<Option<ServerConnection>>>;

/// Owner of the connection table.
#[derive(Clone)]
pub struct SessionManager {
    transport: Arc<dyn LspTransport>,
    slots: Arc<Mutex<HashMap<SlotKey, Slot>>>,
    by_id: Arc<Mutex<HashMap<ServerId, SlotKey>>>,
}

impl SessionManager {
    /// Creates a manager starting servers through `transport`.
    pub fn new(transport: Arc<dyn LspTransport>) -> Self {
        Self {
            transport,
            slots: Arc::new(Mutex::new(HashMap::new())),
            by_id: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn slot(&self, key: &SlotKey) -> Slot {
        self.slots
            .lock()
            .await
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Returns the server for `language` at `workspace_root`, starting one
    /// if no running server exists for the pair.
    ///
    /// ## Errors
    /// [`OrchestrationError::ServerUnavailable`] if the server cannot be
    /// started.
    pub async fn acquire(
        &self,
        language: &str,
        workspace_root: &Path,
    ) -> Result<ServerLease, OrchestrationError> {
        let key = (language.to_string(), workspace_root.to_path_buf());
        let slot = self.slot(&key).await;
        let mut connection = slot.lock().await;

        if let Some(existing) = connection.as_ref() {
            if self.transport.is_running(&existing.server_id).await {
                debug!(server_id = %existing.server_id, language, "reusing language server");
                return Ok(ServerLease::reused(existing.server_id.clone()));
            }
            warn!(
                server_id = %existing.server_id,
                language,
                "language server is no longer running, replacing it"
            );
            self.by_id.lock().await.remove(&existing.server_id);
            *connection = None;
        }

        let server_id = self
            .transport
            .start_server(language, workspace_root)
            .await
            .map_err(|e| OrchestrationError::ServerUnavailable {
                language: language.to_string(),
                reason: e.to_string(),
            })?;
        info!(
            server_id = %server_id,
            language,
            workspace_root = %workspace_root.display(),
            "acquired new language server"
        );

        *connection = Some(ServerConnection {
            server_id: server_id.clone(),
            language: language.to_string(),
            workspace_root: workspace_root.to_path_buf(),
            ref_count: 1,
        });
        self.by_id.lock().await.insert(server_id.clone(), key);

        Ok(ServerLease::started(self.clone(), server_id))
    }

    /// Drops one reference on `server_id`.
    ///
    /// Unknown ids and connections without references are ignored, so a
    /// repeated release never drives a count below zero. Transport failures
    /// are logged.
    pub async fn release(&self, server_id: &ServerId) {
        let Some(key) = self.by_id.lock().await.get(server_id).cloned() else {
            debug!(server_id = %server_id, "release of unknown server ignored");
            return;
        };
        let Some(slot) = self.slots.lock().await.get(&key).cloned() else {
            return;
        };

        {
            let mut connection = slot.lock().await;
            match connection.as_mut() {
                Some(conn) if &conn.server_id == server_id && conn.ref_count > 0 => {
                    conn.ref_count -= 1;
                    debug!(server_id = %server_id, ref_count = conn.ref_count, "released language server");
                }
                _ => {
                    debug!(server_id = %server_id, "server holds no references, release ignored");
                    return;
                }
            }
        }

        if let Err(e) = self.transport.decrement_ref_count(server_id).await {
            warn!(server_id = %server_id, error = %e, "failed to decrement server reference count");
        }
    }

    /// Connection registered for the pair, if any.
    pub async fn connection(&self, language: &str, workspace_root: &Path) -> Option<ServerConnection> {
        let key = (language.to_string(), workspace_root.to_path_buf());
        let slot = self.slots.lock().await.get(&key).cloned()?;
        let connection = slot.lock().await;
        connection.clone()
    }

    /// Snapshot of the live connections, ordered by language and root.
    ///
    /// Connections whose server stopped (e.g. shut down by the transport's
    /// idle reaper) are dropped from the table.
    pub async fn connections(&self) -> Vec<ServerConnection> {
        let slots: Vec<Slot> = self.slots.lock().await.values().cloned().collect();
        let mut connections = Vec::with_capacity(slots.len());
        for slot in slots {
            let mut connection = slot.lock().await;
            let Some(conn) = connection.as_ref() else {
                continue;
            };
            if self.transport.is_running(&conn.server_id).await {
                connections.push(conn.clone());
            } else {
                debug!(server_id = %conn.server_id, language = %conn.language, "dropping stopped language server");
                self.by_id.lock().await.remove(&conn.server_id);
                *connection = None;
            }
        }
        connections.sort_by(|a, b| {
            (&a.language, &a.workspace_root).cmp(&(&b.language, &b.workspace_root))
        });
        connections
    }
}

/// Handle on an acquired server.
///
/// A lease for a started server releases its reference once, through
/// [`ServerLease::release`] or, failing that, when dropped inside a Tokio
/// runtime. A lease for a reused server releases nothing.
#[must_use = "a started server's reference is released by `release`"]
pub struct ServerLease {
    server_id: ServerId,
    manager: Option<SessionManager>,
}

impl ServerLease {
    fn started(manager: SessionManager, server_id: ServerId) -> Self {
        Self {
            server_id,
            manager: Some(manager),
        }
    }

    fn reused(server_id: ServerId) -> Self {
        Self {
            server_id,
            manager: None,
        }
    }

    /// Id of the acquired server.
    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    /// Whether this acquisition started the server.
    pub fn did_start(&self) -> bool {
        self.manager.is_some()
    }

    /// Releases the reference taken by starting the server.
    pub async fn release(mut self) {
        if let Some(manager) = self.manager.take() {
            manager.release(&self.server_id).await;
        }
    }
}

impl std::fmt::Debug for ServerLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLease")
            .field("server_id", &self.server_id)
            .field("did_start", &self.did_start())
            .finish()
    }
}

impl Drop for ServerLease {
    fn drop(&mut self) {
        let Some(manager) = self.manager.take() else {
            return;
        };
        let server_id = self.server_id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(server_id = %server_id, "server lease dropped, releasing in background");
                handle.spawn(async move { manager.release(&server_id).await });
            }
            Err(_) => warn!(server_id = %server_id, "server lease dropped outside a runtime"),
        }
    }
}
