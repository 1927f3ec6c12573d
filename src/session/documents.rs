//! Document synchronizer: keeps a file open on its server while queried.
//!
//! Opening goes through the per-file gate of the [`ConnectionRegistry`]. The
//! first invocation opens the document and records ownership; invocations
//! arriving while it is open attach to it. Every lease detaches once, and
//! the last one closes the document.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{LspError, OrchestrationError};
use crate::lsp::{LspTransport, ServerId};

use super::registry::ConnectionRegistry;

/// Opens and closes documents on behalf of concurrent invocations.
#[derive(Clone)]
pub struct DocumentSynchronizer {
    transport: Arc<dyn LspTransport>,
    registry: Arc<ConnectionRegistry>,
}

impl DocumentSynchronizer {
    /// Creates a synchronizer recording ownership in `registry`.
    pub fn new(transport: Arc<dyn LspTransport>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            transport,
            registry,
        }
    }

    /// The ownership table.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Makes sure `path` is open on `server_id`.
    ///
    /// If the file is already open on that server the caller attaches to
    /// it and `load` is not called. Otherwise `load` supplies the content
    /// and `textDocument/didOpen` is sent with `language_id`.
    ///
    /// ## Errors
    /// Fails if the content cannot be loaded or the server rejects the open;
    /// no ownership is recorded in that case.
    pub async fn open<F, Fut>(
        &self,
        server_id: &ServerId,
        path: &Path,
        language_id: &str,
        load: F,
    ) -> Result<DocumentLease, OrchestrationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::io::Result<Arc<str>>>,
    {
        let _gate = self.registry.gate(path).await;

        if self.registry.retain(path, server_id).await {
            debug!(server_id = %server_id, path = %path.display(), "document already open, attaching");
            return Ok(DocumentLease::new(self.clone(), server_id, path, false));
        }

        let content = load().await.map_err(|e| {
            LspError::DocumentNotFound(format!("failed to read {}: {e}", path.display()))
        })?;
        self.transport
            .open_document(server_id, path, language_id, &content)
            .await?;
        self.registry.record(path, server_id).await;
        debug!(server_id = %server_id, path = %path.display(), language_id, "opened document");

        Ok(DocumentLease::new(self.clone(), server_id, path, true))
    }

    /// Detaches one holder of `path`; the last holder closes the document.
    ///
    /// A failed close is logged and never returned.
    pub async fn close(&self, server_id: &ServerId, path: &Path) {
        let _gate = self.registry.gate(path).await;

        if !self.registry.relinquish(path, server_id).await {
            debug!(server_id = %server_id, path = %path.display(), "document still in use, close deferred");
            return;
        }
        self.registry.forget(path).await;

        match self.transport.close_document(server_id, path).await {
            Ok(()) => debug!(server_id = %server_id, path = %path.display(), "closed document"),
            Err(e) => warn!(
                server_id = %server_id,
                path = %path.display(),
                error = %e,
                "failed to close document"
            ),
        }
    }
}

/// Handle on an open document, detached once by [`DocumentLease::release`]
/// or, if never released, in the background when dropped.
#[must_use = "an open document is detached by `release`"]
pub struct DocumentLease {
    sync: Option<DocumentSynchronizer>,
    server_id: ServerId,
    path: PathBuf,
    opened: bool,
}

impl DocumentLease {
    fn new(sync: DocumentSynchronizer, server_id: &ServerId, path: &Path, opened: bool) -> Self {
        Self {
            sync: Some(sync),
            server_id: server_id.clone(),
            path: path.to_path_buf(),
            opened,
        }
    }

    /// Whether this invocation sent the `didOpen`.
    pub fn opened(&self) -> bool {
        self.opened
    }

    /// Detaches from the document, closing it if no other holder remains.
    pub async fn release(mut self) {
        if let Some(sync) = self.sync.take() {
            sync.close(&self.server_id, &self.path).await;
        }
    }
}

impl std::fmt::Debug for DocumentLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentLease")
            .field("server_id", &self.server_id)
            .field("path", &self.path)
            .field("opened", &self.opened)
            .finish()
    }
}

impl Drop for DocumentLease {
    fn drop(&mut self) {
        let Some(sync) = self.sync.take() else {
            return;
        };
        let server_id = self.server_id.clone();
        let path = std::mem::take(&mut self.path);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { sync.close(&server_id, &path).await });
            }
            Err(_) => warn!(path = %path.display(), "document lease dropped outside a runtime"),
        }
    }
}
