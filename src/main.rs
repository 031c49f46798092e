use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
mod bridge;
mod config;
mod emoncms;
mod models;
mod mqtt;

use bridge::Bridge;
use emoncms::client::EmonClient;
use mqtt::listener::Listener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Load configuration
    dotenvy::dotenv().ok();
    let cfg = config::Config::from_env()?;
    info!(mqtt_host = %cfg.mqtt_host, emon_url = %cfg.emon_url, "Starting EmonCMS bridge");

    // One HTTP client reused for every post
    let emon = EmonClient::new(&cfg.emon_url, &cfg.api_key)?;
    let bridge = Bridge::new(emon);

    // Connect and subscribe; a failed handshake ends the process
    let mut listener = Listener::connect(&cfg).await?;

    tokio::select! {
        res = listener.run(&bridge) => {
            if let Err(e) = res {
                error!(error = %e, "Listener error");
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
