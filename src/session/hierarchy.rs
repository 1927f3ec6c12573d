//! Call-hierarchy walker.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use lsp_types::{CallHierarchyItem, Position};
use tracing::debug;

use crate::lsp::{CallDirection, CallRecord, LspResult, LspTransport, ServerId};

/// Resolves the callers or callees of the symbol at a position.
#[derive(Clone)]
pub struct CallHierarchyWalker {
    transport: Arc<dyn LspTransport>,
}

impl CallHierarchyWalker {
    /// Creates a walker issuing queries through `transport`.
    pub fn new(transport: Arc<dyn LspTransport>) -> Self {
        Self { transport }
    }

    /// Call-hierarchy items at `position`; a `null` answer is an empty list.
    ///
    /// ## Errors
    /// Propagates the transport error.
    pub async fn prepare(
        &self,
        server_id: &ServerId,
        path: &Path,
        position: Position,
    ) -> LspResult<Vec<CallHierarchyItem>> {
        Ok(self
            .transport
            .prepare_call_hierarchy(server_id, path, position)
            .await?
            .unwrap_or_default())
    }

    /// Incoming or outgoing calls of every item prepared at `position`.
    ///
    /// The per-item queries run concurrently. Gaps and records of the
    /// other direction are dropped.
    ///
    /// ## Errors
    /// The first failing query's error, once every query has finished.
    pub async fn resolve(
        &self,
        server_id: &ServerId,
        path: &Path,
        position: Position,
        direction: CallDirection,
    ) -> LspResult<Vec<CallRecord>> {
        let items = self.prepare(server_id, path, position).await?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let queries = items.iter().map(|item| async move {
            match direction {
                CallDirection::Incoming => self.transport.incoming_calls(server_id, item).await,
                CallDirection::Outgoing => self.transport.outgoing_calls(server_id, item).await,
            }
        });
        let batches = join_all(queries).await;

        let mut received = 0;
        let mut records = Vec::new();
        for batch in batches {
            let batch = batch?;
            received += batch.len();
            records.extend(
                batch
                    .into_iter()
                    .flatten()
                    .filter(|record| record.direction() == direction),
            );
        }

        if records.len() < received {
            debug!(
                server_id = %server_id,
                %direction,
                received,
                kept = records.len(),
                "dropped call records without the expected shape"
            );
        }
        Ok(records)
    }
}
