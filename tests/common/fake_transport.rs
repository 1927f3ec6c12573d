//! Scripted in-memory `LspTransport`.
//!
//! Counts every lifecycle call, keeps a reference count per started server
//! the way the process transport does, and answers requests from scripted
//! values. Call-hierarchy answers are scripted as raw JSON and decoded the
//! same way the real transport decodes server responses.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kadabra_conductor::error::LspError;
use kadabra_conductor::lsp::types::decode_call_records;
use kadabra_conductor::lsp::{CallRecord, LspResult, LspTransport, ServerId};
use lsp_types::{
    CallHierarchyItem, DocumentSymbolResponse, GotoDefinitionResponse, Hover, HoverContents,
    Location, MarkupContent, MarkupKind, Position, Range, SymbolKind, Url,
    WorkspaceSymbolResponse,
};
use serde_json::{Value, json};

/// Scripted transport with call counters.
#[derive(Default)]
pub struct FakeTransport {
    pub initializations: AtomicUsize,
    pub starts: AtomicUsize,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub decrements: AtomicUsize,
    pub fail_start: AtomicBool,
    pub fail_close: AtomicBool,
    pub fail_requests: AtomicBool,
    pub panic_on_request: AtomicBool,
    pub request_delay: Mutex<Option<Duration>>,
    pub start_delay: Mutex<Option<Duration>>,
    ref_counts: Mutex<HashMap<ServerId, usize>>,
    opened_paths: Mutex<Vec<PathBuf>>,
    pub definition: Mutex<Option<GotoDefinitionResponse>>,
    pub references: Mutex<Option<Vec<Location>>>,
    pub hover: Mutex<Option<Hover>>,
    pub prepared: Mutex<Option<Vec<CallHierarchyItem>>>,
    /// Raw call-hierarchy answers per item name.
    pub raw_calls: Mutex<HashMap<String, Vec<Value>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn decrements(&self) -> usize {
        self.decrements.load(Ordering::SeqCst)
    }

    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    /// Transport-side reference count of a started server.
    pub fn ref_count(&self, server_id: &ServerId) -> Option<usize> {
        self.ref_counts.lock().unwrap().get(server_id).copied()
    }

    /// Paths passed to `open_document`, in order.
    pub fn opened_paths(&self) -> Vec<PathBuf> {
        self.opened_paths.lock().unwrap().clone()
    }

    pub fn set_request_delay(&self, delay: Duration) {
        *self.request_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_start_delay(&self, delay: Duration) {
        *self.start_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_hover(&self, text: &str) {
        *self.hover.lock().unwrap() = Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: text.to_string(),
            }),
            range: None,
        });
    }

    pub fn set_prepared(&self, items: Vec<CallHierarchyItem>) {
        *self.prepared.lock().unwrap() = Some(items);
    }

    pub fn set_raw_calls(&self, item_name: &str, records: Vec<Value>) {
        self.raw_calls
            .lock()
            .unwrap()
            .insert(item_name.to_string(), records);
    }

    async fn request(&self) -> LspResult<()> {
        let delay = *self.request_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        assert!(
            !self.panic_on_request.load(Ordering::SeqCst),
            "scripted transport panic"
        );
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(LspError::RequestFailed("scripted failure".into()));
        }
        Ok(())
    }

    fn decoded_calls(&self, item: &CallHierarchyItem) -> Vec<Option<CallRecord>> {
        let raw = self.raw_calls.lock().unwrap().get(&item.name).cloned();
        decode_call_records(raw)
    }
}

#[async_trait]
impl LspTransport for FakeTransport {
    async fn initialize(&self) -> LspResult<()> {
        self.initializations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn start_server(&self, language: &str, _workspace_root: &Path) -> LspResult<ServerId> {
        let delay = *self.start_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(LspError::ServerStartFailed(format!(
                "{language}-server: not found"
            )));
        }
        let n = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
        let id = ServerId::new(format!("{language}-{n}"));
        self.ref_counts.lock().unwrap().insert(id.clone(), 1);
        Ok(id)
    }

    async fn is_running(&self, server_id: &ServerId) -> bool {
        self.ref_counts.lock().unwrap().contains_key(server_id)
    }

    async fn open_document(
        &self,
        _server_id: &ServerId,
        path: &Path,
        _language_id: &str,
        _content: &str,
    ) -> LspResult<()> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.opened_paths.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn close_document(&self, _server_id: &ServerId, _path: &Path) -> LspResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(LspError::RequestFailed("close rejected".into()));
        }
        Ok(())
    }

    async fn decrement_ref_count(&self, server_id: &ServerId) -> LspResult<()> {
        self.decrements.fetch_add(1, Ordering::SeqCst);
        if let Some(count) = self.ref_counts.lock().unwrap().get_mut(server_id) {
            *count = count.saturating_sub(1);
        }
        Ok(())
    }

    async fn definition(
        &self,
        _server_id: &ServerId,
        _path: &Path,
        _position: Position,
    ) -> LspResult<Option<GotoDefinitionResponse>> {
        self.request().await?;
        Ok(self.definition.lock().unwrap().clone())
    }

    async fn references(
        &self,
        _server_id: &ServerId,
        _path: &Path,
        _position: Position,
        _include_declaration: bool,
    ) -> LspResult<Option<Vec<Location>>> {
        self.request().await?;
        Ok(self.references.lock().unwrap().clone())
    }

    async fn hover(
        &self,
        _server_id: &ServerId,
        _path: &Path,
        _position: Position,
    ) -> LspResult<Option<Hover>> {
        self.request().await?;
        Ok(self.hover.lock().unwrap().clone())
    }

    async fn document_symbol(
        &self,
        _server_id: &ServerId,
        _path: &Path,
    ) -> LspResult<Option<DocumentSymbolResponse>> {
        self.request().await?;
        Ok(None)
    }

    async fn workspace_symbol(
        &self,
        _server_id: &ServerId,
        _query: &str,
    ) -> LspResult<Option<WorkspaceSymbolResponse>> {
        self.request().await?;
        Ok(Some(WorkspaceSymbolResponse::Flat(Vec::new())))
    }

    async fn implementation(
        &self,
        _server_id: &ServerId,
        _path: &Path,
        _position: Position,
    ) -> LspResult<Option<GotoDefinitionResponse>> {
        self.request().await?;
        Ok(None)
    }

    async fn prepare_call_hierarchy(
        &self,
        _server_id: &ServerId,
        _path: &Path,
        _position: Position,
    ) -> LspResult<Option<Vec<CallHierarchyItem>>> {
        self.request().await?;
        Ok(self.prepared.lock().unwrap().clone())
    }

    async fn incoming_calls(
        &self,
        _server_id: &ServerId,
        item: &CallHierarchyItem,
    ) -> LspResult<Vec<Option<CallRecord>>> {
        self.request().await?;
        Ok(self.decoded_calls(item))
    }

    async fn outgoing_calls(
        &self,
        _server_id: &ServerId,
        item: &CallHierarchyItem,
    ) -> LspResult<Vec<Option<CallRecord>>> {
        self.request().await?;
        Ok(self.decoded_calls(item))
    }
}

fn range(line: u32) -> Range {
    Range::new(Position::new(line, 4), Position::new(line, 12))
}

/// A call-hierarchy item for function `name` in `file`.
pub fn call_item(name: &str, file: &Path) -> CallHierarchyItem {
    CallHierarchyItem {
        name: name.to_string(),
        kind: SymbolKind::FUNCTION,
        tags: None,
        detail: None,
        uri: Url::from_file_path(file).unwrap(),
        range: range(0),
        selection_range: range(0),
        data: None,
    }
}

/// Raw `CallHierarchyIncomingCall` JSON.
pub fn raw_incoming(caller: &str, file: &Path) -> Value {
    json!({
        "from": serde_json::to_value(call_item(caller, file)).unwrap(),
        "fromRanges": [range(6)],
    })
}

/// Raw `CallHierarchyOutgoingCall` JSON.
pub fn raw_outgoing(callee: &str, file: &Path) -> Value {
    json!({
        "to": serde_json::to_value(call_item(callee, file)).unwrap(),
        "fromRanges": [range(6)],
    })
}

/// A location in `file` at 0-based `line`.
pub fn location(file: &Path, line: u32) -> Location {
    Location {
        uri: Url::from_file_path(file).unwrap(),
        range: range(line),
    }
}
