//! Hub runtime configuration, loaded from the environment variables spec §6
//! fixes: `ISCC_HUB_ID`, `ISCC_HUB_REALM`, `ISCC_HUB_DOMAIN`,
//! `ISCC_HUB_SECKEY`, `ISCC_HUB_DB_NAME`.

use ed25519_dalek::SigningKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub hub_id: u16,
    pub realm: u8,
    pub domain: String,
    pub seckey: [u8; 32],
    pub db_name: String,
    pub bind_addr: String,
}

impl HubConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let hub_id: u16 = env_var("ISCC_HUB_ID")?
            .parse()
            .map_err(|_| ConfigError::Invalid("ISCC_HUB_ID", "must be an integer 0..=4095".into()))?;
        if hub_id > 4095 {
            return Err(ConfigError::Invalid("ISCC_HUB_ID", "must be in 0..=4095".into()));
        }

        let realm: u8 = std::env::var("ISCC_HUB_REALM")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .map_err(|_| ConfigError::Invalid("ISCC_HUB_REALM", "must be 0 or 1".into()))?
            .unwrap_or(0);

        let domain = env_var("ISCC_HUB_DOMAIN")?;

        let seckey_hex = env_var("ISCC_HUB_SECKEY")?;
        let seckey_bytes = hex::decode(&seckey_hex)
            .map_err(|_| ConfigError::Invalid("ISCC_HUB_SECKEY", "must be lowercase hex".into()))?;
        let seckey: [u8; 32] = seckey_bytes
            .try_into()
            .map_err(|_| ConfigError::Invalid("ISCC_HUB_SECKEY", "must decode to 32 bytes".into()))?;

        let db_name = env_var("ISCC_HUB_DB_NAME")?;

        let bind_addr = std::env::var("ISCC_HUB_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        Ok(Self { hub_id, realm, domain, seckey, db_name, bind_addr })
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.seckey)
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}
