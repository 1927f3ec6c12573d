//! Language catalog: which language a file is, whether it has a language
//! server, where that server's project boundary lies.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{LanguageConfig, ServerSettings};

/// Installation state of a language server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    /// The server binary can be launched.
    pub available: bool,
    /// The server can be downloaded and installed.
    pub can_download: bool,
}

/// Command line used to launch a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    /// Executable name or path.
    pub command: String,
    /// Arguments.
    pub args: Vec<String>,
}

/// Language lookups consumed by the session layer.
pub trait LanguageCatalog: Send + Sync {
    /// Language of a file, from its extension.
    fn language_for_path(&self, path: &Path) -> Option<String>;

    /// Protocol language id to send with `didOpen`.
    fn lsp_language_id_for_path(&self, path: &Path) -> Option<String>;

    /// Whether a language server is configured for `language`.
    fn has_lsp_support(&self, language: &str) -> bool;

    /// Whether the server for `language` is installed or installable.
    fn server_status(&self, language: &str) -> ServerStatus;

    /// Launch command of the server for `language`.
    fn server_config(&self, language: &str) -> Option<ServerCommand>;

    /// Project boundary for `path`, never above `fallback_root`.
    fn find_workspace_root(&self, path: &Path, language: &str, fallback_root: &Path) -> PathBuf;
}

/// [`LanguageCatalog`] built from the configured language table.
#[derive(Debug, Clone)]
pub struct ConfiguredCatalog {
    languages: HashMap<String, LanguageConfig>,
    by_extension: HashMap<String, String>,
}

impl ConfiguredCatalog {
    /// Indexes `languages` by name and extension; the first language
    /// claiming an extension wins.
    pub fn new(languages: Vec<LanguageConfig>) -> Self {
        let mut by_extension = HashMap::new();
        for language in &languages {
            for ext in &language.extensions {
                by_extension
                    .entry(ext.to_ascii_lowercase())
                    .or_insert_with(|| language.name.clone());
            }
        }
        let languages = languages
            .into_iter()
            .map(|language| (language.name.clone(), language))
            .collect();
        Self {
            languages,
            by_extension,
        }
    }

    fn extension(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }

    fn language_of(&self, path: &Path) -> Option<&LanguageConfig> {
        let ext = Self::extension(path)?;
        self.by_extension
            .get(&ext)
            .and_then(|name| self.languages.get(name))
    }

    fn server(&self, language: &str) -> Option<&ServerSettings> {
        self.languages.get(language)?.server.as_ref()
    }
}

impl LanguageCatalog for ConfiguredCatalog {
    fn language_for_path(&self, path: &Path) -> Option<String> {
        self.language_of(path).map(|l| l.name.clone())
    }

    fn lsp_language_id_for_path(&self, path: &Path) -> Option<String> {
        let language = self.language_of(path)?;
        Self::extension(path)
            .and_then(|ext| language.extension_language_ids.get(&ext).cloned())
            .or_else(|| language.language_id.clone())
    }

    fn has_lsp_support(&self, language: &str) -> bool {
        self.server(language).is_some()
    }

    fn server_status(&self, language: &str) -> ServerStatus {
        match self.server(language) {
            Some(server) => ServerStatus {
                available: find_executable(&server.command).is_some(),
                can_download: server.download_url.is_some(),
            },
            None => ServerStatus {
                available: false,
                can_download: false,
            },
        }
    }

    fn server_config(&self, language: &str) -> Option<ServerCommand> {
        self.server(language).map(|server| ServerCommand {
            command: server.command.clone(),
            args: server.args.clone(),
        })
    }

    fn find_workspace_root(&self, path: &Path, language: &str, fallback_root: &Path) -> PathBuf {
        let Some(markers) = self.languages.get(language).map(|l| &l.root_markers) else {
            return fallback_root.to_path_buf();
        };
        if markers.is_empty() || !path.starts_with(fallback_root) {
            return fallback_root.to_path_buf();
        }

        path.ancestors()
            .skip(1)
            .take_while(|dir| dir.starts_with(fallback_root))
            .find(|dir| markers.iter().any(|marker| dir.join(marker).exists()))
            .map_or_else(|| fallback_root.to_path_buf(), Path::to_path_buf)
    }
}

/// Resolves `command` as a path or through `PATH`.
pub fn find_executable(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).find_map(|dir| {
        let full = dir.join(command);
        if full.is_file() {
            return Some(full);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{command}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}
