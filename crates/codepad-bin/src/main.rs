use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use codepad_backends::dir_store::DirStore;
use codepad_backends::http_store::HttpStore;
use codepad_backends::sandbox::LocalSandbox;
use codepad_backends::templates::DirTemplates;
use codepad_core::config::WorkspaceConfig;
use codepad_core::events::{EventSink, WorkspaceEvent};
use codepad_core::session::{run_session, WorkspaceCommand};
use codepad_core::workspace::Backends;
use codepad_core::Workspace;
use codepad_platform::store::ProjectStore;

#[derive(Parser, Debug)]
#[command(name = "codepad")]
#[command(about = "Project workspace with debounced sandbox mirroring and auto-save")]
#[command(version)]
struct Cli {
    /// Project to open
    #[arg(long, env = "CODEPAD_PROJECT", global = true)]
    project: Option<String>,

    /// Base URL of the HTTP project store (e.g., https://pad.example.com)
    #[arg(long, env = "CODEPAD_STORE_URL", global = true)]
    store_url: Option<String>,

    /// Directory of the local project store, used when no store URL is set
    #[arg(long, env = "CODEPAD_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Directory the sandbox is mirrored into
    #[arg(long, env = "CODEPAD_SANDBOX_DIR", global = true)]
    sandbox_dir: Option<PathBuf>,

    /// Path to config file
    #[arg(long, env = "CODEPAD_CONFIG_PATH", global = true)]
    config_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CODEPAD_LOG_LEVEL", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a new project in the local store
    Init {
        /// Project id
        id: String,
        /// Template the project is seeded from
        #[arg(long, default_value = "vanilla")]
        template: String,
        /// Display title
        #[arg(long)]
        title: Option<String>,
    },
    /// Rebuild the sandbox directory from the saved project and exit
    Mount,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the event stream, so logs go to stderr
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("codepad v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = cli
        .config_path
        .clone()
        .unwrap_or_else(WorkspaceConfig::default_path);

    let mut config = if config_path.exists() {
        info!("loading config from {}", config_path.display());
        WorkspaceConfig::load(&config_path)?
    } else {
        info!("no config found, using defaults");
        WorkspaceConfig::default()
    };

    // CLI args override config file
    if let Some(project) = cli.project {
        config.project_id = Some(project);
    }
    if let Some(url) = cli.store_url {
        config.store_url = Some(url);
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.sandbox_dir {
        config.sandbox_dir = dir;
    }

    match cli.command {
        Some(Commands::Init {
            id,
            template,
            title,
        }) => run_init(config, &config_path, &id, &template, title).await,
        Some(Commands::Mount) => run_mount(config).await,
        None => run_workspace(config).await,
    }
}

async fn run_init(
    mut config: WorkspaceConfig,
    config_path: &std::path::Path,
    id: &str,
    template: &str,
    title: Option<String>,
) -> Result<()> {
    let store = DirStore::new(&config.data_dir);
    let title = title.unwrap_or_else(|| id.to_string());
    if store.create_project(id, &title, template).await? {
        info!("project {} created in {}", id, config.data_dir.display());
    } else {
        warn!("project {} already exists, left untouched", id);
    }

    if config.project_id.is_none() {
        config.project_id = Some(id.to_string());
        config.save(config_path)?;
        info!("config saved to {}", config_path.display());
    }
    Ok(())
}

async fn run_mount(config: WorkspaceConfig) -> Result<()> {
    let (mut workspace, _events) = open_workspace(&config).await?;
    let failures = workspace.mount_sandbox().await;
    workspace.teardown();
    if failures > 0 {
        anyhow::bail!("{} sandbox entries could not be written", failures);
    }
    info!("sandbox ready at {}", config.sandbox_dir.display());
    Ok(())
}

/// Load the project and serve JSON-lines commands from stdin until EOF or
/// Ctrl+C, printing workspace events to stdout
async fn run_workspace(config: WorkspaceConfig) -> Result<()> {
    let (workspace, mut event_rx) = open_workspace(&config).await?;

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_event(&event);
        }
    });

    let failures = workspace.mount_sandbox().await;
    if failures > 0 {
        warn!("{} sandbox entries could not be written", failures);
    }

    let (cmd_tx, cmd_rx) = mpsc::channel::<WorkspaceCommand>(64);
    let session = tokio::spawn(run_session(workspace, cmd_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("workspace running, reading commands from stdin, press Ctrl+C to stop");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<WorkspaceCommand>(&line) {
                            Ok(command) => {
                                if cmd_tx.send(command).await.is_err() {
                                    error!("session ended unexpectedly");
                                    break;
                                }
                            }
                            Err(e) => warn!("ignoring malformed command: {}", e),
                        }
                    }
                    Ok(None) => {
                        info!("stdin closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        error!("failed to read stdin: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down");
                break;
            }
        }
    }

    drop(cmd_tx);
    let workspace = session.await.context("session task failed")?;
    let unsaved = workspace.buffers().dirty_ids();
    if !unsaved.is_empty() {
        warn!("exiting with {} unsaved buffer(s)", unsaved.len());
    }

    // the printer stops once the workspace's event sink is gone
    drop(workspace);
    if let Err(e) = printer.await {
        error!("event printer failed: {}", e);
    }
    Ok(())
}

async fn open_workspace(
    config: &WorkspaceConfig,
) -> Result<(Workspace, mpsc::UnboundedReceiver<WorkspaceEvent>)> {
    let project_id = config.require_project_id()?.to_string();
    let (events, event_rx) = EventSink::channel();

    let mut workspace = Workspace::new(&project_id, create_backends(config), config, events);
    workspace
        .load()
        .await
        .with_context(|| format!("failed to open project {}", project_id))?;
    Ok((workspace, event_rx))
}

fn create_backends(config: &WorkspaceConfig) -> Backends {
    let store: Arc<dyn ProjectStore> = match &config.store_url {
        Some(url) => {
            info!("using HTTP project store at {}", url);
            Arc::new(HttpStore::new(url))
        }
        None => {
            info!("using local project store at {}", config.data_dir.display());
            Arc::new(DirStore::new(&config.data_dir))
        }
    };
    Backends {
        store,
        templates: Arc::new(DirTemplates::new(&config.templates_dir)),
        sandbox: Arc::new(LocalSandbox::new(&config.sandbox_dir)),
    }
}

fn print_event(event: &WorkspaceEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("failed to encode event: {}", e),
    }
}
