//! Kadabra Conductor - Entry Point
//!
//! Sets up logging, parses arguments, wires the orchestrator to its
//! collaborators and runs the requested command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rmcp::{ServiceExt, transport::stdio};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use kadabra_conductor::catalog::{ConfiguredCatalog, LanguageCatalog};
use kadabra_conductor::config::{self, ConductorConfig};
use kadabra_conductor::lsp::ProcessTransport;
use kadabra_conductor::mcp::{DEFAULT_TASK_ID, KadabraConductor};
use kadabra_conductor::session::{Operation, OperationRequest, Orchestrator, TaskContext};
use kadabra_conductor::workspace::ProjectWorkspace;

/// LSP session orchestration for AI coding assistants.
#[derive(Parser, Debug)]
#[command(name = "kadabra-conductor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project root that relative file paths resolve against.
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// JSON configuration file (languages, servers, timeouts).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server over stdio (default).
    Serve,
    /// Run one operation and print the JSON result.
    Query {
        /// Operation name, e.g. `hover` or `incomingCalls`.
        operation: Operation,
        /// File path, absolute or relative to the workspace.
        file_path: String,
        /// Line number (1-based).
        line: u32,
        /// Character offset (1-based).
        character: u32,
    },
    /// Register kadabra-conductor in `.mcp.json` of the current directory.
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// Parses the log level string into a tracing Level.
    fn parse_log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            other => anyhow::bail!("invalid log level: {other}"),
        }
    }
}

/// Initializes the tracing subscriber; logs go to stderr, stdout carries MCP.
fn init_tracing(level: Level, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "kadabra_conductor={level},tower={level},async_lsp={level}"
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init(),
    }
    .context("failed to initialize tracing subscriber")?;

    Ok(())
}

/// The orchestrator and the collaborators the commands need directly.
struct Runtime {
    transport: Arc<ProcessTransport>,
    workspace: Arc<ProjectWorkspace>,
    orchestrator: Arc<Orchestrator>,
}

impl Runtime {
    fn new(config: &ConductorConfig, root: PathBuf) -> Self {
        let catalog: Arc<dyn LanguageCatalog> =
            Arc::new(ConfiguredCatalog::new(config.languages.clone()));
        let transport = Arc::new(ProcessTransport::new(
            catalog.clone(),
            config.transport_options(),
        ));
        let workspace = Arc::new(
            ProjectWorkspace::with_default_root(root).with_cache_capacity(config.file_cache_capacity),
        );
        let orchestrator = Arc::new(
            Orchestrator::new(transport.clone(), catalog, workspace.clone())
                .with_request_timeout(config.request_timeout()),
        );
        Self {
            transport,
            workspace,
            orchestrator,
        }
    }
}

async fn serve(runtime: &Runtime) -> Result<()> {
    let server = KadabraConductor::new(runtime.orchestrator.clone(), runtime.workspace.clone());

    info!("starting MCP server with stdio transport");
    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server")?;

    info!("MCP server started, waiting for messages");
    service.waiting().await?;
    info!("MCP server shut down gracefully");
    Ok(())
}

async fn query(runtime: &Runtime, request: OperationRequest) -> Result<()> {
    let result = runtime
        .orchestrator
        .execute(&request, &TaskContext::new(DEFAULT_TASK_ID))
        .await;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("failed to serialize result")?
    );
    Ok(())
}

/// Main entry point.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Some(Command::Config)) {
        return config::configure();
    }

    let log_level = cli.parse_log_level()?;
    init_tracing(log_level, cli.log_format)?;

    let config = ConductorConfig::load_or_default(cli.config.as_deref())?;
    let workspace = cli.workspace.canonicalize().with_context(|| {
        format!(
            "failed to canonicalize workspace path: {}",
            cli.workspace.display()
        )
    })?;

    info!(
        workspace = %workspace.display(),
        languages = config.languages.len(),
        "starting kadabra-conductor"
    );
    let runtime = Runtime::new(&config, workspace);

    let outcome = match cli.command {
        Some(Command::Query {
            operation,
            file_path,
            line,
            character,
        }) => query(&runtime, OperationRequest::new(operation, file_path, line, character)).await,
        Some(Command::Serve | Command::Config) | None => serve(&runtime).await,
    };

    runtime.transport.shutdown_all().await;
    outcome
}
