//! # ISCC Hub API
//!
//! Axum HTTP surface for the notary hub: `POST /declaration`,
//! `DELETE /declaration/{iscc_id}`, `GET /health`, and
//! `GET /.well-known/did.json`. Tower middleware (CORS, compression,
//! timeout, body-limit, tracing) mirrors the teacher's `vex-api` layering
//! with the auth/rate-limit layers dropped — the hub authenticates each
//! write via its Ed25519 signature rather than a bearer token.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::HubConfig;
pub use error::{ApiError, ApiResult};
pub use server::{HubServer, ServerConfig};
pub use state::AppState;
