//! ISCC Hub Server - standalone entry point for the notary hub's HTTP API.
//!
//! This crate is a thin wrapper around `iscc-hub-api` to provide a runnable
//! binary for deployment without modifying the library crate, the same
//! split the teacher draws between `vex-server` and `vex-api`.

use anyhow::Result;
use iscc_hub_api::{AppState, HubConfig, HubServer, ServerConfig};
use iscc_hub_core::receipt::HubKey;
use iscc_hub_persist::{connect, DbConfig};

#[tokio::main]
async fn main() -> Result<()> {
    iscc_hub_api::server::init_tracing();

    let config = HubConfig::from_env()?;
    tracing::info!(hub_id = config.hub_id, domain = %config.domain, "starting ISCC hub");

    let db_config = DbConfig::file(&config.db_name);
    let pool = connect(&db_config).await?;

    let hub_key = HubKey::new(config.signing_key(), config.domain.clone());
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(config, pool, hub_key);

    let server_config = ServerConfig::from_env(&bind_addr);
    let server = HubServer::new(server_config, app_state);

    server.run().await?;
    Ok(())
}
