//! Scripted in-memory transport for unit tests of the session layer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lsp_types::{
    CallHierarchyIncomingCall, CallHierarchyItem, CallHierarchyOutgoingCall,
    DocumentSymbolResponse, GotoDefinitionResponse, Hover, HoverContents, Location, MarkupContent,
    MarkupKind, Position, Range, SymbolKind, Url, WorkspaceSymbolResponse,
};

use crate::error::LspError;
use crate::lsp::{CallRecord, LspResult, LspTransport, ServerId};

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    pub starts: AtomicUsize,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub decrements: AtomicUsize,
    pub fail_start: AtomicBool,
    pub fail_close: AtomicBool,
    pub start_delay: Option<Duration>,
    pub request_delay: Option<Duration>,
    pub stopped: Mutex<Vec<ServerId>>,
    pub references: Mutex<Option<Vec<Location>>>,
    pub hover: Mutex<Option<Hover>>,
    pub prepared: Mutex<Option<Vec<CallHierarchyItem>>>,
    /// Incoming/outgoing records per item name; missing names fail.
    pub calls: Mutex<HashMap<String, Vec<Option<CallRecord>>>>,
    pub workspace_queries: Mutex<Vec<String>>,
    pub include_declaration: Mutex<Vec<bool>>,
}

impl ScriptedTransport {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        if let Some(delay) = self.request_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn calls_for(&self, item: &CallHierarchyItem) -> LspResult<Vec<Option<CallRecord>>> {
        self.calls
            .lock()
            .unwrap()
            .get(&item.name)
            .cloned()
            .ok_or_else(|| LspError::RequestFailed(format!("no calls for {}", item.name)))
    }
}

pub(crate) fn uri(path: &str) -> Url {
    Url::from_file_path(path).unwrap()
}

pub(crate) fn range(line: u32) -> Range {
    Range::new(Position::new(line, 0), Position::new(line, 4))
}

pub(crate) fn item(name: &str) -> CallHierarchyItem {
    CallHierarchyItem {
        name: name.to_string(),
        kind: SymbolKind::FUNCTION,
        tags: None,
        detail: None,
        uri: uri("/p/src/lib.rs"),
        range: range(1),
        selection_range: range(1),
        data: None,
    }
}

pub(crate) fn incoming(from: &str) -> CallRecord {
    CallRecord::Incoming(CallHierarchyIncomingCall {
        from: item(from),
        from_ranges: vec![range(2)],
    })
}

pub(crate) fn outgoing(to: &str) -> CallRecord {
    CallRecord::Outgoing(CallHierarchyOutgoingCall {
        to: item(to),
        from_ranges: vec![range(3)],
    })
}

pub(crate) fn markdown_hover(text: &str) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: text.to_string(),
        }),
        range: None,
    }
}

pub(crate) fn path(p: &str) -> PathBuf {
    PathBuf::from(p)
}

#[async_trait]
impl LspTransport for ScriptedTransport {
    async fn start_server(&self, language: &str, _root: &Path) -> LspResult<ServerId> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(LspError::ServerStartFailed("spawn failed".into()));
        }
        if let Some(delay) = self.start_delay {
            tokio::time::sleep(delay).await;
        }
        let n = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ServerId::new(format!("{language}-{n}")))
    }

    async fn is_running(&self, server_id: &ServerId) -> bool {
        !self.stopped.lock().unwrap().contains(server_id)
    }

    async fn open_document(&self, _: &ServerId, _: &Path, _: &str, _: &str) -> LspResult<()> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close_document(&self, _: &ServerId, _: &Path) -> LspResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(LspError::RequestFailed("close rejected".into()));
        }
        Ok(())
    }

    async fn decrement_ref_count(&self, _: &ServerId) -> LspResult<()> {
        self.decrements.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn definition(
        &self,
        _: &ServerId,
        _: &Path,
        _: Position,
    ) -> LspResult<Option<GotoDefinitionResponse>> {
        self.delay().await;
        Ok(self
            .references
            .lock()
            .unwrap()
            .clone()
            .map(GotoDefinitionResponse::Array))
    }

    async fn references(
        &self,
        _: &ServerId,
        _: &Path,
        _: Position,
        include_declaration: bool,
    ) -> LspResult<Option<Vec<Location>>> {
        self.delay().await;
        self.include_declaration
            .lock()
            .unwrap()
            .push(include_declaration);
        Ok(self.references.lock().unwrap().clone())
    }

    async fn hover(&self, _: &ServerId, _: &Path, _: Position) -> LspResult<Option<Hover>> {
        self.delay().await;
        Ok(self.hover.lock().unwrap().clone())
    }

    async fn document_symbol(
        &self,
        _: &ServerId,
        _: &Path,
    ) -> LspResult<Option<DocumentSymbolResponse>> {
        Ok(Some(DocumentSymbolResponse::Nested(Vec::new())))
    }

    async fn workspace_symbol(
        &self,
        _: &ServerId,
        query: &str,
    ) -> LspResult<Option<WorkspaceSymbolResponse>> {
        self.workspace_queries
            .lock()
            .unwrap()
            .push(query.to_string());
        Ok(Some(WorkspaceSymbolResponse::Flat(Vec::new())))
    }

    async fn implementation(
        &self,
        _: &ServerId,
        _: &Path,
        _: Position,
    ) -> LspResult<Option<GotoDefinitionResponse>> {
        Ok(None)
    }

    async fn prepare_call_hierarchy(
        &self,
        _: &ServerId,
        _: &Path,
        _: Position,
    ) -> LspResult<Option<Vec<CallHierarchyItem>>> {
        self.delay().await;
        Ok(self.prepared.lock().unwrap().clone())
    }

    async fn incoming_calls(
        &self,
        _: &ServerId,
        item: &CallHierarchyItem,
    ) -> LspResult<Vec<Option<CallRecord>>> {
        self.delay().await;
        self.calls_for(item)
    }

    async fn outgoing_calls(
        &self,
        _: &ServerId,
        item: &CallHierarchyItem,
    ) -> LspResult<Vec<Option<CallRecord>>> {
        self.delay().await;
        self.calls_for(item)
    }
}
