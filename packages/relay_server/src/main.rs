use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relay_hub::Hub;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use relay_server::config::{FileConfig, RelayConfig, load_config};
use relay_server::metrics::ServerMetrics;
use relay_server::{AppState, build_router};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Real-time chat relay over WebSockets")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (defaults to ./relay.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server in the foreground
    Serve(ServeArgs),

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Parser, Default)]
struct ServeArgs {
    /// Port for the web server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides config)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => run_server(ServeArgs::default(), cli.config).await,
        Some(Commands::Serve(args)) => run_server(args, cli.config).await,
        Some(Commands::Config) => print_config(cli.config),
    }
}

fn load(config_path: Option<&PathBuf>, args: Option<&ServeArgs>) -> Result<(FileConfig, RelayConfig)> {
    let mut fc: FileConfig = load_config(config_path.map(PathBuf::as_path))
        .extract()
        .context("Failed to load configuration")?;

    // CLI flags win over file and env
    if let Some(args) = args {
        if args.host.is_some() {
            fc.server.host = args.host.clone();
        }
        if args.port.is_some() {
            fc.server.port = args.port;
        }
    }

    let config = RelayConfig::from_file(&fc).context("Invalid configuration")?;
    Ok((fc, config))
}

fn print_config(config_path: Option<PathBuf>) -> Result<()> {
    let (fc, _) = load(config_path.as_ref(), None)?;
    let rendered = toml::to_string_pretty(&fc).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}

async fn run_server(args: ServeArgs, config_path: Option<PathBuf>) -> Result<()> {
    // Setup logging
    let default_directive = if args.debug {
        "relay=debug,relay_server=debug,relay_hub=debug,tower_http=debug,info"
    } else {
        "relay=info,relay_server=info,relay_hub=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting chat relay");

    let (_, config) = load(config_path.as_ref(), Some(&args))?;
    info!(
        "Relay config: mailbox={} frames, idle_timeout={:?}, max_frame={}KB",
        config.session.mailbox_capacity,
        config.session.idle_timeout,
        config.server.max_frame_bytes / 1024
    );

    let hub = Hub::spawn(config.hub.clone());

    let app_state = AppState {
        hub: hub.clone(),
        server_config: Arc::new(config.server.clone()),
        session_config: Arc::new(config.session.clone()),
        metrics: Arc::new(ServerMetrics::new()),
    };
    let app = build_router(app_state);

    if !config.server.static_dir.is_dir() {
        warn!(
            "Static directory {} not found, only /ws and health routes will respond",
            config.server.static_dir.display()
        );
    }

    let listener = tokio::net::TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Chat relay listening on http://{}", actual_addr);
    info!("  GET /ws           - chat WebSocket");
    info!("  GET /health       - health check");
    info!("  GET /metrics      - server and hub counters");

    // Create shutdown signal handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    // Run server with graceful shutdown
    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error");

    if let Ok(stats) = hub.stats().await {
        info!(
            members = stats.members,
            delivered = stats.delivered,
            dropped = stats.dropped_full,
            "Hub state at shutdown"
        );
    }

    info!("Shutdown complete");
    server_result
}
