//! Common test helpers and utilities.

#![allow(dead_code)]

pub mod fake_transport;
pub mod temp_workspace;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kadabra_conductor::catalog::{LanguageCatalog, ServerCommand, ServerStatus};
use kadabra_conductor::session::Orchestrator;
use kadabra_conductor::workspace::ProjectWorkspace;

// Re-export for convenience
pub use fake_transport::FakeTransport;
pub use temp_workspace::TestWorkspace;

/// Helper to get the fixture project path
pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample_project")
}

/// Helper to find rust-analyzer executable
pub fn find_rust_analyzer() -> String {
    if let Ok(path) = std::env::var("RUST_ANALYZER_PATH") {
        return path;
    }

    for candidate in ["rust-analyzer", "~/.cargo/bin/rust-analyzer"] {
        if let Ok(output) = std::process::Command::new(candidate)
            .arg("--version")
            .output()
            && output.status.success()
        {
            return candidate.to_string();
        }
    }

    "rust-analyzer".to_string()
}

/// Per-language behavior of [`StubCatalog`].
#[derive(Debug, Clone)]
pub struct StubLanguage {
    pub language_id: Option<String>,
    pub supported: bool,
    pub status: ServerStatus,
}

impl StubLanguage {
    /// An installed, supported language.
    pub fn installed(language_id: &str) -> Self {
        Self {
            language_id: Some(language_id.to_string()),
            supported: true,
            status: ServerStatus {
                available: true,
                can_download: false,
            },
        }
    }
}

/// Catalog keyed by file extension, with per-language knobs.
#[derive(Debug, Clone, Default)]
pub struct StubCatalog {
    extensions: HashMap<String, String>,
    languages: HashMap<String, StubLanguage>,
}

impl StubCatalog {
    /// Rust (`.rs`) installed, Markdown (`.md`) known without a server.
    pub fn new() -> Self {
        Self::default()
            .with("rust", "rs", StubLanguage::installed("rust"))
            .with(
                "markdown",
                "md",
                StubLanguage {
                    supported: false,
                    ..StubLanguage::installed("markdown")
                },
            )
    }

    /// Adds or replaces a language.
    #[must_use]
    pub fn with(mut self, name: &str, extension: &str, language: StubLanguage) -> Self {
        self.extensions
            .insert(extension.to_string(), name.to_string());
        self.languages.insert(name.to_string(), language);
        self
    }
}

impl LanguageCatalog for StubCatalog {
    fn language_for_path(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?;
        self.extensions.get(ext).cloned()
    }

    fn lsp_language_id_for_path(&self, path: &Path) -> Option<String> {
        let language = self.language_for_path(path)?;
        self.languages.get(&language)?.language_id.clone()
    }

    fn has_lsp_support(&self, language: &str) -> bool {
        self.languages.get(language).is_some_and(|l| l.supported)
    }

    fn server_status(&self, language: &str) -> ServerStatus {
        self.languages.get(language).map_or(
            ServerStatus {
                available: false,
                can_download: false,
            },
            |l| l.status,
        )
    }

    fn server_config(&self, language: &str) -> Option<ServerCommand> {
        self.has_lsp_support(language).then(|| ServerCommand {
            command: format!("{language}-server"),
            args: Vec::new(),
        })
    }

    fn find_workspace_root(&self, _path: &Path, _language: &str, fallback_root: &Path) -> PathBuf {
        fallback_root.to_path_buf()
    }
}

/// Orchestrator over a fake transport and a stub catalog, with `workspace`
/// as its resolver.
pub fn orchestrator(
    transport: &Arc<FakeTransport>,
    catalog: StubCatalog,
    workspace: &Arc<ProjectWorkspace>,
) -> Orchestrator {
    Orchestrator::new(transport.clone(), Arc::new(catalog), workspace.clone())
}
