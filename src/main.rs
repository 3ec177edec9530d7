//! freecad-mcp: MCP server that lets AI agents drive FreeCAD.
//!
//! Talks MCP on stdio and forwards tool calls to the FreeCAD addon's XML-RPC
//! listener.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use freecad_mcp::config;
use freecad_mcp::mcp::server::McpServer;
use freecad_mcp::platform::detect_host;
use freecad_mcp::rpc::{Connector, Endpoint};
use freecad_mcp::tools::Toolbox;

/// MCP server bridging AI agents to FreeCAD.
///
/// Requires the FreeCAD MCP addon with its RPC server started.
#[derive(Parser, Debug)]
#[command(name = "freecad-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,

    /// Never attach screenshots to tool results
    #[arg(long)]
    only_text_feedback: bool,
}

/// Determines the log level from CLI arguments, falling back to the config.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber. stdout is the MCP channel, so logs go to stderr.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(cfg: config::Config, only_text: bool) -> std::io::Result<()> {
    let host = detect_host(cfg.freecad.host.as_deref()).await;
    let endpoint = Endpoint::new(host, cfg.freecad.port);
    let mut connector = Connector::new(
        endpoint.clone(),
        Duration::from_secs(cfg.freecad.timeout_secs),
    );

    // A missing listener is not fatal; every tool call retries the connection.
    match connector.connect().await {
        Ok(_) => info!(%endpoint, "FreeCAD is reachable"),
        Err(e) => warn!(
            %endpoint,
            error = %e,
            "FreeCAD is not reachable yet; start the RPC server from the FreeCAD MCP addon"
        ),
    }

    let toolbox = Toolbox::new(connector, only_text, cfg.contract.clearances());
    let mut server = McpServer::new(toolbox);

    info!(only_text, "MCP server ready, waiting for client connection...");
    server.run().await
}

/// Entry point for the freecad-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nConfig read from: {}", default_path.display());
                    eprintln!("See config/example-config.json for the format");
                }
            }
            return ExitCode::FAILURE;
        }
    };

    init_tracing(get_log_level(args.verbose, args.quiet, &cfg.logging.level));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting freecad-mcp server"
    );

    let only_text = args.only_text_feedback || cfg.feedback.only_text;

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(cfg, only_text)) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
