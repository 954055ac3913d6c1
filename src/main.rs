use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use voxstream::server::{self, ServerConfig, SessionManager};
use voxstream::Config;

#[derive(Debug, Parser)]
#[command(name = "voxstream-server", about = "Real-time speech-to-text streaming server")]
struct Args {
    /// Config file path without extension, e.g. config/voxstream
    #[arg(long, default_value = "config/voxstream")]
    config: String,

    /// Override the configured HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = Config::load_or_default(&args.config);
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    info!("{} starting", cfg.service.name);
    info!(
        "Engine: {} backend, model {} ({})",
        cfg.engine.backend, cfg.engine.model, cfg.engine.language
    );

    let manager = Arc::new(SessionManager::new(cfg.engine.clone()));

    // Warm the engine up in the background so the API is responsive right
    // away; clients can still stop and restart it over HTTP.
    info!("Scheduling engine initialization in the background");
    manager.start().await;

    let server_cfg = ServerConfig {
        bind: cfg.service.http.bind.clone(),
        port: cfg.service.http.port,
        ..ServerConfig::default()
    };
    let handle = server::start(server_cfg, manager).await?;
    info!("Serving on {}", handle.addr());

    handle.wait().await;
    Ok(())
}
