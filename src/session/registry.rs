//! Connection registry: which server currently has a file open.
//!
//! Ownership is a lookup relation only; it never keeps a server alive. Each
//! owned file also counts the invocations currently relying on it being
//! open, so the document is closed once, by the last of them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::lsp::ServerId;

#[derive(Debug, Clone)]
struct Ownership {
    server_id: ServerId,
    holders: usize,
}

/// File ownership table shared by concurrent invocations.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    files: Mutex<HashMap<PathBuf, Ownership>>,
    /// Never held across an await point.
    gates: std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Server currently owning `path`, if any.
    pub async fn lookup(&self, path: &Path) -> Option<ServerId> {
        self.files
            .lock()
            .await
            .get(path)
            .map(|own| own.server_id.clone())
    }

    /// Number of invocations holding `path` open.
    pub async fn holders(&self, path: &Path) -> usize {
        self.files
            .lock()
            .await
            .get(path)
            .map_or(0, |own| own.holders)
    }

    /// Serializes open/close decisions for one file.
    ///
    /// The gate entry lives only while some invocation holds or awaits it.
    pub(crate) async fn gate(&self, path: &Path) -> FileGate<'_> {
        let gate = self
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_path_buf())
            .or_default()
            .clone();
        FileGate {
            registry: self,
            path: path.to_path_buf(),
            guard: Some(gate.lock_owned().await),
        }
    }

    /// Records that `server_id` opened `path`, with one holder.
    pub(crate) async fn record(&self, path: &Path, server_id: &ServerId) {
        self.files.lock().await.insert(
            path.to_path_buf(),
            Ownership {
                server_id: server_id.clone(),
                holders: 1,
            },
        );
    }

    /// Adds a holder if `path` is owned by `server_id`.
    pub(crate) async fn retain(&self, path: &Path, server_id: &ServerId) -> bool {
        match self.files.lock().await.get_mut(path) {
            Some(own) if &own.server_id == server_id => {
                own.holders += 1;
                true
            }
            _ => false,
        }
    }

    /// Drops a holder; returns `true` when it was the last one for
    /// `server_id`, leaving the caller to close and forget the file.
    pub(crate) async fn relinquish(&self, path: &Path, server_id: &ServerId) -> bool {
        match self.files.lock().await.get_mut(path) {
            Some(own) if &own.server_id == server_id => {
                own.holders = own.holders.saturating_sub(1);
                own.holders == 0
            }
            _ => false,
        }
    }

    /// Removes the ownership record of `path`.
    pub(crate) async fn forget(&self, path: &Path) {
        self.files.lock().await.remove(path);
    }

    /// Snapshot of owned files.
    pub async fn owned_files(&self) -> Vec<(PathBuf, ServerId)> {
        let mut files: Vec<_> = self
            .files
            .lock()
            .await
            .iter()
            .map(|(path, own)| (path.clone(), own.server_id.clone()))
            .collect();
        files.sort();
        files
    }
}

/// Exclusive access to one file's open/close decisions.
///
/// Dropping it unlocks the gate and removes the gate entry when no other
/// invocation is waiting on it.
pub(crate) struct FileGate<'a> {
    registry: &'a ConnectionRegistry,
    path: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FileGate<'_> {
    fn drop(&mut self) {
        let mut gates = self
            .registry
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.guard.take();
        if gates
            .get(&self.path)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(&self.path);
        }
    }
}
