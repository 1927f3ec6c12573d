//! Workspace collaborator: task project roots, path normalization and a
//! content cache for documents sent to language servers.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

/// Workspace lookups consumed by the session layer.
#[async_trait]
pub trait WorkspaceResolver: Send + Sync {
    /// Project root registered for `task_id`.
    async fn effective_workspace_root(&self, task_id: &str) -> Option<PathBuf>;

    /// Absolute form of `file_path`, interpreted relative to `root`.
    fn normalize_file_path(&self, root: &Path, file_path: &str) -> PathBuf;

    /// Whether `path` is an existing file.
    async fn file_exists(&self, path: &Path) -> bool;

    /// Canonical form of an existing `path`, with symlinks resolved.
    ///
    /// This is the identity a language server sees for the document.
    async fn canonicalize(&self, path: &Path) -> std::io::Result<PathBuf>;

    /// Content of `path`, served from cache while the file is unchanged.
    async fn read_file(&self, path: &Path) -> std::io::Result<Arc<str>>;
}

/// Files kept in the read cache unless configured otherwise.
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

struct CachedFile {
    modified: Option<SystemTime>,
    content: Arc<str>,
    last_read: Instant,
}

/// [`WorkspaceResolver`] over the local file system.
///
/// The read cache holds at most `cache_capacity` files; the least recently
/// read one is evicted first.
pub struct ProjectWorkspace {
    task_roots: RwLock<HashMap<String, PathBuf>>,
    default_root: RwLock<Option<PathBuf>>,
    cache: RwLock<HashMap<PathBuf, CachedFile>>,
    cache_capacity: usize,
}

impl Default for ProjectWorkspace {
    fn default() -> Self {
        Self {
            task_roots: RwLock::default(),
            default_root: RwLock::default(),
            cache: RwLock::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ProjectWorkspace {
    /// Creates a workspace with no roots registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the read cache to `capacity` files; 0 disables caching.
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Creates a workspace whose tasks fall back to `root`.
    pub fn with_default_root(root: impl Into<PathBuf>) -> Self {
        Self {
            default_root: RwLock::new(Some(root.into())),
            ..Self::default()
        }
    }

    /// Registers the project root of a task.
    pub async fn set_task_root(&self, task_id: impl Into<String>, root: impl Into<PathBuf>) {
        self.task_roots
            .write()
            .await
            .insert(task_id.into(), root.into());
    }
}

#[async_trait]
impl WorkspaceResolver for ProjectWorkspace {
    async fn effective_workspace_root(&self, task_id: &str) -> Option<PathBuf> {
        if let Some(root) = self.task_roots.read().await.get(task_id) {
            return Some(root.clone());
        }
        self.default_root.read().await.clone()
    }

    fn normalize_file_path(&self, root: &Path, file_path: &str) -> PathBuf {
        let path = Path::new(file_path);
        if path.is_absolute() {
            normalize_lexically(path)
        } else {
            normalize_lexically(&root.join(path))
        }
    }

    async fn file_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .is_ok_and(|meta| meta.is_file())
    }

    async fn canonicalize(&self, path: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::canonicalize(path).await
    }

    async fn read_file(&self, path: &Path) -> std::io::Result<Arc<str>> {
        let modified = tokio::fs::metadata(path).await?.modified().ok();

        if let Some(cached) = self.cache.write().await.get_mut(path)
            && modified.is_some()
            && cached.modified == modified
        {
            cached.last_read = Instant::now();
            return Ok(cached.content.clone());
        }

        debug!(path = %path.display(), "reading file");
        let content: Arc<str> = tokio::fs::read_to_string(path).await?.into();
        if self.cache_capacity == 0 {
            return Ok(content);
        }

        let mut cache = self.cache.write().await;
        if !cache.contains_key(path) && cache.len() >= self.cache_capacity {
            let oldest = cache
                .iter()
                .min_by_key(|(_, cached)| cached.last_read)
                .map(|(path, _)| path.clone());
            if let Some(oldest) = oldest {
                debug!(path = %oldest.display(), "evicting cached file");
                cache.remove(&oldest);
            }
        }
        cache.insert(
            path.to_path_buf(),
            CachedFile {
                modified,
                content: content.clone(),
                last_read: Instant::now(),
            },
        );
        Ok(content)
    }
}

/// Folds `.` and `..` components without touching the file system.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
