mod singleton;

use anyhow::Result;
use std::net::SocketAddr;

use fleetdesk_core::config::Preferences;
use fleetdesk_server::serve;
use fleetdesk_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetdesk=info,tower_http=info".into()),
        )
        .init();

    let prefs = Preferences::load()?;
    let data_dir = prefs.data_path();

    // Ensure only one instance owns the store
    let _lock = singleton::acquire_lock(&data_dir)?;

    let state = AppState::open(&data_dir)?;

    let addr = SocketAddr::from(([127, 0, 0, 1], prefs.server_port()));
    tracing::info!(%addr, data_dir = %data_dir.display(), "fleetdesk-server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, state).await?;

    Ok(())
}
