use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use latex_lab::{
    config::Config,
    create_router,
    settings::{ApiSettings, SettingsStorage, SettingsStore},
    utils::init_logger,
    AppState, Workbench,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    let _log_guard = init_logger(&config.logging);
    info!("Configuration loaded: {:?}", config.server);

    // Settings: built-in defaults with the persisted override merged over them
    let storage = SettingsStorage::with_path(config.storage.data_dir.clone());
    let settings = SettingsStore::load(ApiSettings::from(&config.llm), storage).await?;
    info!("Settings loaded from {}", config.storage.data_dir.display());

    // Create shared state
    let workbench = Arc::new(Workbench::new(&config, settings.clone()));
    let state = AppState {
        config: config.clone(),
        settings,
        workbench,
    };

    // Create router
    let app = create_router(state);

    // Start server
    let ip: std::net::IpAddr = config
        .server
        .host
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid HOST '{}': {}", config.server.host, e))?;
    let addr = SocketAddr::from((ip, config.server.port));
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
