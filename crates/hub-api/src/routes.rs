//! HTTP routes for the notary hub (spec §4.G, §6).

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::{routing::get, routing::post, Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::OpenApi;

use iscc_hub_core::error::HubError;
use iscc_hub_core::note::{IsccNote, IsccNoteDelete};
use iscc_hub_core::validate::{validate_create, validate_delete, ValidationPolicy};
use iscc_hub_persist::projection;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const FORCE_HEADER: &str = "x-force-declaration";

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub hub_id: u16,
    pub timestamp: chrono::DateTime<Utc>,
}

#[utoipa::path(get, path = "/health", responses((status = 200, body = HealthResponse)))]
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        hub_id: state.config().hub_id,
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(rename = "verificationMethod")]
    pub verification_method: Vec<VerificationMethod>,
    #[serde(rename = "assertionMethod")]
    pub assertion_method: Vec<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub controller: String,
    #[serde(rename = "publicKeyMultibase")]
    pub public_key_multibase: String,
}

#[utoipa::path(get, path = "/.well-known/did.json", responses((status = 200, body = DidDocument)))]
async fn did_document(State(state): State<AppState>) -> Json<DidDocument> {
    let hub_key = state.hub_key();
    let verification_method_id = hub_key.verification_method();
    Json(DidDocument {
        context: vec!["https://www.w3.org/ns/did/v1".to_string()],
        id: hub_key.issuer_did().to_string(),
        verification_method: vec![VerificationMethod {
            id: verification_method_id.clone(),
            method_type: "Multikey".to_string(),
            controller: hub_key.issuer_did().to_string(),
            public_key_multibase: hub_key.public_key_multibase(),
        }],
        assertion_method: vec![verification_method_id],
    })
}

fn actor_id(pubkey: &[u8; 32]) -> String {
    let mut bytes = vec![0xed, 0x01];
    bytes.extend_from_slice(pubkey);
    format!("z{}", bs58::encode(bytes).into_string())
}

#[utoipa::path(
    post,
    path = "/declaration",
    request_body = String,
    responses((status = 201, description = "Declaration sequenced and receipt issued"))
)]
async fn create_declaration(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> ApiResult<(axum::http::StatusCode, Json<serde_json::Value>)> {
    let policy = ValidationPolicy::strict(state.config().hub_id);
    let note: IsccNote = validate_create(&body, &policy)?;

    let force = headers
        .get(FORCE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let requesting_pubkey = decode_pubkey(&note.signature.pubkey)?;
    let requesting_actor = actor_id(&requesting_pubkey);

    if let Some(existing) = projection::find_duplicate(state.pool(), &note).await? {
        let same_actor = existing.actor == requesting_actor;
        if !(force && same_actor) {
            return Err(ApiError::Hub(HubError::DuplicateDeclaration {
                existing_iscc_id: existing.iscc_id,
                existing_actor: existing.actor,
            }));
        }
    }

    let event = state.sequencer().sequence_create(&note).await?;
    projection::apply_event(state.pool(), &event, &note).await?;

    let receipt = iscc_hub_core::receipt::build_receipt(
        &event,
        state.hub_key(),
        note.signature.controller.as_deref(),
        &note.signature.pubkey,
        &note.iscc_code,
        note.gateway.as_deref(),
    )?;

    Ok((axum::http::StatusCode::CREATED, Json(receipt)))
}

#[utoipa::path(
    delete,
    path = "/declaration/{iscc_id}",
    params(("iscc_id" = String, Path, description = "Canonical ISCC-ID to revoke")),
    responses((status = 200, description = "Declaration revoked and receipt issued"))
)]
async fn delete_declaration(
    State(state): State<AppState>,
    Path(iscc_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let policy = ValidationPolicy::strict(state.config().hub_id);
    let note: IsccNoteDelete = validate_delete(&body, &policy)?;

    if note.iscc_id != iscc_id {
        return Err(ApiError::Hub(HubError::validation_field(
            "path iscc_id does not match signed request body",
            "iscc_id",
        )));
    }

    let requesting_pubkey = decode_pubkey(&note.signature.pubkey)?;
    let requesting_actor = actor_id(&requesting_pubkey);

    let existing = projection::get_declaration(state.pool(), &iscc_id)
        .await?
        .ok_or_else(|| HubError::NotFound {
            resource_type: "declaration".into(),
            resource_id: iscc_id.clone(),
        })?;
    if existing.redacted {
        return Err(ApiError::Hub(HubError::NotFound {
            resource_type: "declaration".into(),
            resource_id: iscc_id.clone(),
        }));
    }
    if existing.actor != requesting_actor {
        return Err(ApiError::Hub(HubError::Unauthorized));
    }

    let event = state.sequencer().sequence_delete(&note).await?;
    projection::apply_event(state.pool(), &event, &declaration_to_note(&existing)).await?;

    let receipt = iscc_hub_core::receipt::build_receipt(
        &event,
        state.hub_key(),
        None,
        &note.signature.pubkey,
        &existing.iscc_code,
        existing.gateway.as_deref(),
    )?;

    Ok(Json(receipt))
}

/// `apply_event`'s CREATE/UPDATE branch needs an `IsccNote` to re-derive the
/// row's fields, but a DELETE event doesn't carry one on the wire; the
/// already-materialized declaration supplies everything the projection's
/// `remove` branch actually reads.
fn declaration_to_note(declaration: &iscc_hub_core::note::IsccDeclaration) -> IsccNote {
    IsccNote {
        iscc_code: declaration.iscc_code.clone(),
        datahash: declaration.datahash.clone(),
        nonce: declaration.nonce.clone(),
        timestamp: declaration.updated_at.to_rfc3339(),
        signature: iscc_hub_core::note::NoteSignature {
            version: "ISCC-SIG v1.0".to_string(),
            pubkey: declaration.actor.clone(),
            proof: String::new(),
            controller: None,
            keyid: None,
        },
        gateway: declaration.gateway.clone(),
        metahash: declaration.metahash.clone(),
        units: None,
    }
}

fn decode_pubkey(multibase: &str) -> ApiResult<[u8; 32]> {
    let rest = multibase
        .strip_prefix('z')
        .ok_or_else(|| HubError::InvalidSignature { message: "pubkey is not multibase".into() })?;
    let bytes = bs58::decode(rest)
        .into_vec()
        .map_err(|e| HubError::InvalidSignature { message: e.to_string() })?;
    if bytes.len() != 34 || bytes[0] != 0xed || bytes[1] != 0x01 {
        return Err(ApiError::Hub(HubError::InvalidSignature {
            message: "pubkey is not a multibase Ed25519 key".into(),
        }));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[2..]);
    Ok(out)
}

#[derive(OpenApi)]
#[openapi(paths(health, did_document, create_declaration, delete_declaration))]
pub struct ApiDoc;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/.well-known/did.json", get(did_document))
        .route("/declaration", post(create_declaration))
        .route("/declaration/{iscc_id}", axum::routing::delete(delete_declaration))
        .with_state(state)
}
