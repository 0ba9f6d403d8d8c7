//! wflang client - Entry Point
//!
//! Stands in for the editor host: sets up logging, parses arguments,
//! activates the language client and deactivates it on Ctrl-C.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use wflang_client::config::{self, ClientConfig, ControllerOptions};
use wflang_client::lsp::selector::{DocumentSelector, WFLANG_EXTENSION, WFLANG_LANGUAGE};
use wflang_client::lsp::{Activation, LaunchMode, LifecycleController};

/// Language client for the wflang language server.
#[derive(Parser, Debug)]
#[command(name = "wflang-client")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the language server binary, relative to the workspace.
    #[arg(long, default_value = config::DEFAULT_SERVER_PATH)]
    server: PathBuf,

    /// Log file the server writes to, relative to the workspace.
    #[arg(long, default_value = config::DEFAULT_LOG_PATH)]
    log_path: PathBuf,

    /// Workspace root directory.
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Use the debug launch profile.
    #[arg(long)]
    debug: bool,

    /// Do not send `$/setTrace` verbose after startup.
    #[arg(long)]
    no_trace_workaround: bool,

    /// Launch without provisioning the log directory first.
    #[arg(long)]
    skip_log_path_check: bool,

    /// File extension of documents forwarded to the server.
    #[arg(long, default_value = WFLANG_EXTENSION)]
    extension: String,

    /// Language identifier of forwarded documents.
    #[arg(long, default_value = WFLANG_LANGUAGE)]
    language: String,

    /// Documents to open once the server is running.
    #[arg(long = "open", value_name = "FILE")]
    open: Vec<PathBuf>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the resolved launch configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

impl Args {
    /// Parses the log level string into a tracing Level.
    fn parse_log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            other => anyhow::bail!("invalid log level: {}", other),
        }
    }

    fn client_config(&self) -> ClientConfig {
        let mode = if self.debug {
            LaunchMode::Debug
        } else {
            LaunchMode::Run
        };
        ClientConfig::builder()
            .server_path(&self.server)
            .log_path(&self.log_path)
            .workspace_root(&self.workspace)
            .launch_mode(mode)
            .build()
    }

    fn controller_options(&self) -> Result<ControllerOptions> {
        let selector = DocumentSelector::for_extension(&self.extension, &self.language)
            .context("invalid document selector")?;
        Ok(ControllerOptions::new(selector)
            .trace_workaround(!self.no_trace_workaround)
            .validate_log_path(!self.skip_log_path_check))
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing(level: Level) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("wflang_client={level},async_lsp={level}"))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    Ok(())
}

fn print_config(config: &ClientConfig, options: &ControllerOptions) -> Result<()> {
    let resolved = json!({
        "clientId": config.client_id,
        "serverOptions": config.transport_profile(),
        "launchMode": config.launch_mode,
        "documentSelector": [options.selector.to_filter()],
        "initializationOptions": config.initialization_options,
        "trace": config.trace,
        "enableTraceWorkaround": options.enable_trace_workaround,
        "validateLogPath": options.validate_log_path,
    });
    let rendered = serde_json::to_string_pretty(&resolved).context("failed to serialize config")?;
    println!("{rendered}");
    Ok(())
}

/// Main entry point.
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.parse_log_level()?;
    init_tracing(log_level)?;

    let config = args.client_config();
    config.validate().context("invalid client configuration")?;
    let options = args.controller_options()?;

    if args.print_config {
        return print_config(&config, &options);
    }

    info!(
        server = %config.resolved_server_path().display(),
        log_path = %config.resolved_log_path().display(),
        "activating wflang client"
    );

    let mut controller = LifecycleController::new(config, options);
    match controller.activate().await.context("failed to activate client")? {
        Activation::Started {
            trace_override_sent,
        } => info!(trace_override_sent, "client activated"),
        Activation::Aborted => anyhow::bail!("activation aborted: log directory unavailable"),
    }

    if let Some(session) = controller.session_mut() {
        for path in &args.open {
            match session.did_open(path).await {
                Ok(true) => info!(path = %path.display(), "opened document"),
                Ok(false) => warn!(path = %path.display(), "document not selected, skipped"),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to open document"),
            }
        }
    }

    info!("client running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    controller
        .deactivate()
        .await
        .context("failed to deactivate client")?;
    info!("client deactivated");

    Ok(())
}
