mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::AppConfig;
use plainupnp_core::{SelectionTarget, ServiceController};
use plainupnp_media_server::{AppState, MediaLibrary, MediaServer};
use plainupnp_upnp::{DiscoveryService, SsdpDiscovery};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "plainupnp", version, about = "UPnP/DLNA device discovery, selection and media serving")]
struct Cli {
    /// Config file (defaults to <config_dir>/plainupnp/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address the HTTP server binds to
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Directory with media files to serve
    #[arg(long)]
    media_root: Option<PathBuf>,

    /// Do not search the network for devices
    #[arg(long)]
    no_discovery: bool,
}

impl Cli {
    /// Apply command line overrides on top of the file configuration
    fn apply(self, mut config: AppConfig) -> AppConfig {
        if let Some(bind) = self.bind {
            config.http.bind = bind;
        }
        if let Some(root) = self.media_root {
            config.media.root = Some(root);
        }
        if self.no_discovery {
            config.discovery.enabled = false;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,plainupnp=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting PlainUPnP {}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let file_config = AppConfig::resolve(cli.config.as_deref())?;
    let config = cli.apply(file_config);

    let library = match &config.media.root {
        Some(root) => MediaLibrary::scan(root)?,
        None => {
            tracing::info!("No media root configured, serving nothing");
            MediaLibrary::new()
        }
    };

    let controller = Arc::new(ServiceController::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let discovery_handle = if config.discovery.enabled {
        let ssdp = SsdpDiscovery::new(Duration::from_secs(config.discovery.timeout_secs))?;
        let service = DiscoveryService::new(
            Arc::new(ssdp),
            controller.registry().clone(),
            config.discovery.clone(),
        );
        Some(service.spawn(shutdown_rx))
    } else {
        tracing::info!("Discovery disabled");
        None
    };

    let state = AppState::new(controller.clone(), Arc::new(library), config.http.server_name.clone());
    let mut server = MediaServer::new(config.http.bind, state);
    server.start().await?;

    tracing::info!("Ready on http://{}", server.addr());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down...");

    // A closed channel also ends the discovery loop
    let _ = shutdown_tx.send(true);
    if let Some(handle) = discovery_handle {
        if let Err(e) = handle.await {
            tracing::warn!("Discovery task ended abnormally: {}", e);
        }
    }
    server.stop().await;

    for target in SelectionTarget::ALL {
        if let Some(device) = controller.selected(target) {
            tracing::info!("Last {} selection: {}", target, device.display_string(true));
        }
    }

    Ok(())
}
