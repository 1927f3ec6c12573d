//! Orchestration facade: the single entry point of an operation.
//!
//! [`Orchestrator::execute`] resolves the file and its language, acquires a
//! server, keeps the document open while the operation runs, and always
//! returns an [`OperationResult`]. Finalization (detaching the document,
//! then releasing a server this invocation started) runs on every path
//! that reached server acquisition, including timeouts and panics inside
//! the dispatched operation.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use lsp_types::Position;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::catalog::LanguageCatalog;
use crate::error::OrchestrationError;
use crate::lsp::{LspTransport, ServerId};
use crate::workspace::WorkspaceResolver;

use super::dispatch::RequestDispatcher;
use super::documents::DocumentSynchronizer;
use super::manager::{ServerLease, SessionManager};
use super::registry::ConnectionRegistry;
use super::request::{Operation, OperationData, OperationRequest, OperationResult, TaskContext};

/// A file resolved far enough to pick its server.
struct Target {
    root: PathBuf,
    /// Path as requested, normalized against `root`.
    requested: PathBuf,
    /// Canonical path: the document's identity on the server.
    path: PathBuf,
    language: String,
    language_id: String,
    position: Position,
}

/// Sequences one operation from request to result.
pub struct Orchestrator {
    transport: Arc<dyn LspTransport>,
    catalog: Arc<dyn LanguageCatalog>,
    workspace: Arc<dyn WorkspaceResolver>,
    sessions: SessionManager,
    documents: DocumentSynchronizer,
    dispatcher: RequestDispatcher,
    request_timeout: Option<Duration>,
    initialized: OnceCell<()>,
}

impl Orchestrator {
    /// Creates an orchestrator over the three collaborators.
    pub fn new(
        transport: Arc<dyn LspTransport>,
        catalog: Arc<dyn LanguageCatalog>,
        workspace: Arc<dyn WorkspaceResolver>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            sessions: SessionManager::new(transport.clone()),
            documents: DocumentSynchronizer::new(transport.clone(), registry),
            dispatcher: RequestDispatcher::new(transport.clone()),
            transport,
            catalog,
            workspace,
            request_timeout: None,
            initialized: OnceCell::new(),
        }
    }

    /// Bounds each dispatched operation by `timeout`.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// The connection table.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// The file ownership table.
    pub fn registry(&self) -> &ConnectionRegistry {
        self.documents.registry()
    }

    /// Runs `request` for the task in `context`.
    ///
    /// Never fails: every error is reported as a non-success result.
    pub async fn execute(&self, request: &OperationRequest, context: &TaskContext) -> OperationResult {
        let started = Instant::now();
        let result = match self.run(request, context).await {
            Ok(result) => result,
            Err(OrchestrationError::Unexpected(detail)) => {
                error!(operation = %request.operation, detail = %detail, "operation failed unexpectedly");
                OrchestrationError::Unexpected(detail).into()
            }
            Err(e) => {
                debug!(operation = %request.operation, error = %e, "operation failed");
                e.into()
            }
        };
        info!(
            operation = %request.operation,
            file = %request.file_path,
            success = result.success,
            elapsed = ?started.elapsed(),
            "operation finished"
        );
        result
    }

    async fn run(
        &self,
        request: &OperationRequest,
        context: &TaskContext,
    ) -> Result<OperationResult, OrchestrationError> {
        let target = self.resolve(request, context).await?;

        let server_root = self
            .catalog
            .find_workspace_root(&target.requested, &target.language, &target.root);
        let server = self.sessions.acquire(&target.language, &server_root).await?;

        let outcome = self.with_server(&server, request.operation, &target).await;
        server.release().await;

        let data = outcome?;
        classify(request, &target, data)
    }

    /// Steps that need no server: root, file, language, position,
    /// availability and protocol language id.
    async fn resolve(
        &self,
        request: &OperationRequest,
        context: &TaskContext,
    ) -> Result<Target, OrchestrationError> {
        let root = self
            .workspace
            .effective_workspace_root(&context.task_id)
            .await
            .ok_or(OrchestrationError::ProjectRootUnset)?;

        let requested = self.workspace.normalize_file_path(&root, &request.file_path);
        if !self.workspace.file_exists(&requested).await {
            return Err(OrchestrationError::FileNotFound(requested));
        }
        let path = self
            .workspace
            .canonicalize(&requested)
            .await
            .map_err(|_| OrchestrationError::FileNotFound(requested.clone()))?;

        let language = match self.catalog.language_for_path(&path) {
            Some(language) if self.catalog.has_lsp_support(&language) => language,
            Some(language) => return Err(OrchestrationError::UnsupportedLanguage(language)),
            None => return Err(OrchestrationError::UnsupportedLanguage(file_kind(&path))),
        };

        let position = RequestDispatcher::translate(request.line, request.character)?;

        self.initialized
            .get_or_try_init(|| self.transport.initialize())
            .await?;

        let status = self.catalog.server_status(&language);
        if !status.available {
            return Err(OrchestrationError::ServerNotInstalled {
                language,
                can_download: status.can_download,
            });
        }

        let language_id = self
            .catalog
            .lsp_language_id_for_path(&path)
            .ok_or_else(|| OrchestrationError::MissingLanguageId(path.clone()))?;

        Ok(Target {
            root,
            requested,
            path,
            language,
            language_id,
            position,
        })
    }

    async fn with_server(
        &self,
        server: &ServerLease,
        operation: Operation,
        target: &Target,
    ) -> Result<Option<OperationData>, OrchestrationError> {
        let server_id = server.server_id();
        let document = self
            .documents
            .open(server_id, &target.path, &target.language_id, || {
                self.workspace.read_file(&target.path)
            })
            .await?;

        let outcome = self
            .dispatch_guarded(operation, server_id, &target.path, target.position)
            .await;
        document.release().await;
        outcome
    }

    async fn dispatch_guarded(
        &self,
        operation: Operation,
        server_id: &ServerId,
        path: &Path,
        position: Position,
    ) -> Result<Option<OperationData>, OrchestrationError> {
        let call = AssertUnwindSafe(self.dispatcher.dispatch(operation, server_id, path, position))
            .catch_unwind();

        let outcome = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| OrchestrationError::Timeout(limit))?,
            None => call.await,
        };

        match outcome {
            Ok(result) => Ok(result?),
            Err(panic) => Err(OrchestrationError::Unexpected(panic_message(panic.as_ref()))),
        }
    }
}

/// Builds the result of a dispatched operation.
fn classify(
    request: &OperationRequest,
    target: &Target,
    data: Option<OperationData>,
) -> Result<OperationResult, OrchestrationError> {
    let operation = request.operation;
    let Some(data) = data else {
        return Ok(OperationResult::no_results(operation.no_results_message(), None));
    };

    let value =
        serde_json::to_value(&data).map_err(|e| OrchestrationError::Unexpected(e.to_string()))?;
    if data.is_empty() {
        return Ok(OperationResult::no_results(
            operation.no_results_message(),
            Some(value),
        ));
    }

    let relative = target
        .requested
        .strip_prefix(&target.root)
        .unwrap_or(&target.requested);
    let location = format!(
        "{}:{}:{}",
        relative.display(),
        request.line,
        request.character
    );
    Ok(OperationResult::success(
        format!("{} at {location}", summary(operation, data.len())),
        value,
    ))
}

fn summary(operation: Operation, count: usize) -> String {
    let noun = match operation {
        Operation::Hover => return "Hover information".to_string(),
        Operation::GoToDefinition => "definition",
        Operation::FindReferences => "reference",
        Operation::DocumentSymbol => "document symbol",
        Operation::WorkspaceSymbol => "workspace symbol",
        Operation::GoToImplementation => "implementation",
        Operation::PrepareCallHierarchy => "call hierarchy item",
        Operation::IncomingCalls => "incoming call",
        Operation::OutgoingCalls => "outgoing call",
    };
    let plural = if count == 1 { "" } else { "s" };
    format!("Found {count} {noun}{plural}")
}

/// Describes a file whose language is unknown, by extension or name.
fn file_kind(path: &Path) -> String {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!(".{ext} files"),
        None => path
            .file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
