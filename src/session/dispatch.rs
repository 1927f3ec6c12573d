//! Request dispatcher: one protocol call per operation.

use std::path::Path;
use std::sync::Arc;

use lsp_types::Position;
use tracing::debug;

use crate::error::OrchestrationError;
use crate::lsp::types::to_lsp_position;
use crate::lsp::{CallDirection, LspResult, LspTransport, ServerId};

use super::hierarchy::CallHierarchyWalker;
use super::request::{Operation, OperationData};

/// Maps [`Operation`]s to transport calls and normalizes their answers.
#[derive(Clone)]
pub struct RequestDispatcher {
    transport: Arc<dyn LspTransport>,
    walker: CallHierarchyWalker,
}

impl RequestDispatcher {
    /// Creates a dispatcher over `transport`.
    pub fn new(transport: Arc<dyn LspTransport>) -> Self {
        Self {
            walker: CallHierarchyWalker::new(transport.clone()),
            transport,
        }
    }

    /// Converts 1-based editor coordinates to a protocol position.
    ///
    /// ## Errors
    /// [`OrchestrationError::InvalidPosition`] if either value is below 1.
    pub fn translate(line: u32, character: u32) -> Result<Position, OrchestrationError> {
        Ok(to_lsp_position(line, character)?)
    }

    /// Runs `operation` against `server_id` at a 0-based `position`.
    ///
    /// `None` means the server answered `null`. `workspaceSymbol` always
    /// queries with an empty string and `findReferences` includes the
    /// declaration.
    ///
    /// ## Errors
    /// Propagates transport failures.
    pub async fn dispatch(
        &self,
        operation: Operation,
        server_id: &ServerId,
        path: &Path,
        position: Position,
    ) -> LspResult<Option<OperationData>> {
        debug!(
            %operation,
            server_id = %server_id,
            path = %path.display(),
            line = position.line,
            character = position.character,
            "dispatching"
        );

        let transport = &self.transport;
        let data = match operation {
            Operation::GoToDefinition => transport
                .definition(server_id, path, position)
                .await?
                .map(OperationData::from_goto),
            Operation::FindReferences => transport
                .references(server_id, path, position, true)
                .await?
                .map(OperationData::Locations),
            Operation::Hover => transport
                .hover(server_id, path, position)
                .await?
                .map(OperationData::Hover),
            Operation::DocumentSymbol => transport
                .document_symbol(server_id, path)
                .await?
                .map(OperationData::DocumentSymbols),
            Operation::WorkspaceSymbol => transport
                .workspace_symbol(server_id, "")
                .await?
                .map(OperationData::WorkspaceSymbols),
            Operation::GoToImplementation => transport
                .implementation(server_id, path, position)
                .await?
                .map(OperationData::from_goto),
            Operation::PrepareCallHierarchy => Some(OperationData::CallHierarchyItems(
                self.walker.prepare(server_id, path, position).await?,
            )),
            Operation::IncomingCalls => Some(OperationData::Calls(
                self.walker
                    .resolve(server_id, path, position, CallDirection::Incoming)
                    .await?,
            )),
            Operation::OutgoingCalls => Some(OperationData::Calls(
                self.walker
                    .resolve(server_id, path, position, CallDirection::Outgoing)
                    .await?,
            )),
        };
        Ok(data)
    }
}
