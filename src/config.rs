//! Configuration for kadabra-conductor.
//!
//! Two concerns live here: the JSON configuration describing languages,
//! their servers and the session timeouts ([`ConductorConfig`]), and the
//! helper that registers kadabra-conductor in a project's `.mcp.json`
//! ([`configure`]).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::lsp::transport::ProcessTransportOptions;

/// Command line of a language server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    /// Executable name or path.
    pub command: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Where the server can be downloaded from, if it can be installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// One language known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageConfig {
    /// Language name, e.g. `rust`.
    pub name: String,
    /// File extensions without the dot.
    pub extensions: Vec<String>,
    /// Protocol language id sent with `didOpen`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_id: Option<String>,
    /// Per-extension protocol language ids overriding `language_id`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extension_language_ids: BTreeMap<String, String>,
    /// Files marking a project boundary for this language.
    #[serde(default)]
    pub root_markers: Vec<String>,
    /// The language server; languages without one have no LSP support.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerSettings>,
}

impl LanguageConfig {
    fn new(name: &str, extensions: &[&str], root_markers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(ToString::to_string).collect(),
            language_id: Some(name.to_string()),
            extension_language_ids: BTreeMap::new(),
            root_markers: root_markers.iter().map(ToString::to_string).collect(),
            server: None,
        }
    }

    fn server(mut self, command: &str, args: &[&str], download_url: Option<&str>) -> Self {
        self.server = Some(ServerSettings {
            command: command.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            download_url: download_url.map(ToString::to_string),
        });
        self
    }

    fn extension_id(mut self, extension: &str, language_id: &str) -> Self {
        self.extension_language_ids
            .insert(extension.to_string(), language_id.to_string());
        self
    }
}

/// Built-in language table.
pub fn default_languages() -> Vec<LanguageConfig> {
    vec![
        LanguageConfig::new("rust", &["rs"], &["Cargo.toml"]).server(
            "rust-analyzer",
            &[],
            Some("https://github.com/rust-lang/rust-analyzer/releases"),
        ),
        LanguageConfig::new("typescript", &["ts", "tsx", "mts", "cts"], &[
            "tsconfig.json",
            "package.json",
        ])
        .extension_id("tsx", "typescriptreact")
        .server(
            "typescript-language-server",
            &["--stdio"],
            Some("https://www.npmjs.com/package/typescript-language-server"),
        ),
        LanguageConfig::new("javascript", &["js", "jsx", "mjs", "cjs"], &[
            "jsconfig.json",
            "package.json",
        ])
        .extension_id("jsx", "javascriptreact")
        .server(
            "typescript-language-server",
            &["--stdio"],
            Some("https://www.npmjs.com/package/typescript-language-server"),
        ),
        LanguageConfig::new("python", &["py", "pyi"], &[
            "pyproject.toml",
            "setup.py",
            "requirements.txt",
        ])
        .server(
            "pyright-langserver",
            &["--stdio"],
            Some("https://www.npmjs.com/package/pyright"),
        ),
        LanguageConfig::new("go", &["go"], &["go.mod"]).server(
            "gopls",
            &[],
            Some("https://pkg.go.dev/golang.org/x/tools/gopls"),
        ),
        LanguageConfig::new("c", &["c", "h"], &[
            "compile_commands.json",
            "CMakeLists.txt",
        ])
        .server("clangd", &[], None),
        LanguageConfig::new("cpp", &["cpp", "cc", "cxx", "hpp", "hh"], &[
            "compile_commands.json",
            "CMakeLists.txt",
        ])
        .server("clangd", &[], None),
        LanguageConfig::new("java", &["java"], &["pom.xml", "build.gradle"]).server(
            "jdtls",
            &[],
            None,
        ),
        LanguageConfig::new("markdown", &["md", "markdown"], &[]),
    ]
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConductorConfig {
    /// Known languages and their servers.
    pub languages: Vec<LanguageConfig>,
    /// Seconds allowed for a server's `initialize` handshake.
    pub init_timeout_secs: u64,
    /// Seconds allowed for one dispatched operation.
    pub request_timeout_secs: u64,
    /// Seconds an unreferenced server may stay idle before it is stopped.
    pub idle_shutdown_secs: u64,
    /// Milliseconds between idle checks.
    pub idle_check_interval_ms: u64,
    /// Files kept in the document read cache.
    pub file_cache_capacity: usize,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            init_timeout_secs: 30,
            request_timeout_secs: 30,
            idle_shutdown_secs: 300,
            idle_check_interval_ms: 500,
            file_cache_capacity: crate::workspace::DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ConductorConfig {
    /// Loads configuration from a JSON file; absent fields keep defaults.
    ///
    /// ## Errors
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Loads `path` if given, otherwise returns the defaults.
    ///
    /// ## Errors
    /// See [`ConductorConfig::load`].
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Timeout applied to each dispatched operation.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Options for the process-backed transport.
    pub fn transport_options(&self) -> ProcessTransportOptions {
        ProcessTransportOptions {
            init_timeout: Duration::from_secs(self.init_timeout_secs),
            request_timeout: self.request_timeout(),
            idle_shutdown: Duration::from_secs(self.idle_shutdown_secs),
            idle_check_interval: Duration::from_millis(self.idle_check_interval_ms),
        }
    }
}

/// Configure kadabra-conductor by creating/updating .mcp.json in current directory
///
/// ## Errors
/// Returns an error if:
/// - File I/O fails
/// - Existing .mcp.json contains invalid JSON
/// - kadabra-conductor is already configured
pub fn configure() -> Result<()> {
    let config_file = Path::new(".mcp.json");

    let config: Value = if config_file.exists() {
        let content = fs::read_to_string(config_file).context("failed to read .mcp.json")?;
        serde_json::from_str(&content).context("failed to parse .mcp.json - invalid JSON")?
    } else {
        json!({})
    };

    let mut root = match config {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let mut servers = match root.remove("mcpServers") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    if servers.contains_key("kadabra-conductor") {
        bail!(
            "kadabra-conductor is already configured in .mcp.json\n\n\
            To reconfigure, first remove the existing entry, then run:\n  \
            kadabra-conductor config"
        );
    }

    servers.insert(
        "kadabra-conductor".to_string(),
        json!({
            "command": "kadabra-conductor",
            "args": ["serve", "--workspace", "."]
        }),
    );
    root.insert("mcpServers".to_string(), Value::Object(servers));

    // Write atomically (temp file + rename)
    let temp_file = config_file.with_extension("tmp");
    let json_str =
        serde_json::to_string_pretty(&Value::Object(root)).context("failed to serialize JSON")?;

    fs::write(&temp_file, json_str).context("failed to write temporary config file")?;
    fs::rename(&temp_file, config_file).context("failed to rename temporary config file")?;

    println!("Created .mcp.json with a kadabra-conductor entry.");
    println!("Restart your MCP client to pick it up.");

    Ok(())
}
