//! Application state shared across handlers.

use std::sync::Arc;

use iscc_hub_core::receipt::HubKey;
use iscc_hub_persist::Sequencer;
use sqlx::SqlitePool;

use crate::config::HubConfig;

#[derive(Clone)]
pub struct AppState {
    config: Arc<HubConfig>,
    pool: SqlitePool,
    sequencer: Arc<Sequencer>,
    hub_key: Arc<HubKey>,
}

impl AppState {
    pub fn new(config: HubConfig, pool: SqlitePool, hub_key: HubKey) -> Self {
        let sequencer = Sequencer::new(pool.clone(), config.hub_id, config.realm);
        Self {
            config: Arc::new(config),
            pool,
            sequencer: Arc::new(sequencer),
            hub_key: Arc::new(hub_key),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn hub_key(&self) -> &HubKey {
        &self.hub_key
    }
}
