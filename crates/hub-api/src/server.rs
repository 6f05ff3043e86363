//! Hub HTTP server with graceful shutdown. Trimmed from the teacher's
//! `vex-api/src/server.rs`: no TLS termination or worker-pool bootstrap —
//! the hub has no job queue, and a notary endpoint sits behind a reverse
//! proxy for TLS rather than terminating it itself.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{middleware, Router};
use tokio::signal;
use tower_http::compression::CompressionLayer;

use crate::error::ApiError;
use crate::middleware::{body_limit_layer, cors_layer, request_id_middleware, timeout_layer, tracing_middleware};
use crate::routes::api_router;
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 8192;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub timeout: Duration,
    pub max_body_size: usize,
}

impl ServerConfig {
    pub fn from_env(bind_addr: &str) -> Self {
        Self {
            addr: bind_addr.parse().unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8080))),
            timeout: Duration::from_secs(30),
            max_body_size: MAX_BODY_BYTES,
        }
    }
}

pub struct HubServer {
    config: ServerConfig,
    app_state: AppState,
}

impl HubServer {
    pub fn new(config: ServerConfig, app_state: AppState) -> Self {
        Self { config, app_state }
    }

    pub fn router(&self) -> Router {
        api_router(self.app_state.clone())
            .layer(CompressionLayer::new())
            .layer(body_limit_layer(self.config.max_body_size))
            .layer(timeout_layer(self.config.timeout))
            .layer(cors_layer())
            .layer(middleware::from_fn(request_id_middleware))
            .layer(middleware::from_fn(tracing_middleware))
    }

    pub async fn run(self) -> Result<(), ApiError> {
        let app = self.router();
        let addr = self.config.addr;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to bind {addr}: {e}")))?;

        tracing::info!("ISCC hub listening on {addr}");

        axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ApiError::Internal(format!("server error: {e}")))?;

        tracing::info!("server shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, starting graceful shutdown"),
        _ = terminate => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }
}

pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,iscc_hub_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_defaults_to_8192_byte_cap() {
        let config = ServerConfig::from_env("0.0.0.0:9090");
        assert_eq!(config.max_body_size, MAX_BODY_BYTES);
        assert_eq!(config.addr.port(), 9090);
    }
}
