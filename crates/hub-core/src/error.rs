//! Error taxonomy for the notary hub.
//!
//! Mirrors the teacher's `StorageError`/`ApiError` shape (a flat enum with a
//! `Display` message per variant) but carries the `(message, code, field)`
//! triple the hub's HTTP boundary needs to build the wire error body.

use thiserror::Error;

/// Domain-level error produced by validation, sequencing, or projection code.
///
/// No variant here knows about HTTP; `iscc-hub-api::ApiError` maps each one
/// to a status code at the boundary, the same split as the teacher's
/// `vex_persist::StorageError -> vex_api::ApiError` conversion.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("{message}")]
    ValidationFailed {
        message: String,
        field: Option<String>,
    },

    #[error("{message}")]
    InvalidFormat { message: String, field: String },

    #[error("{message}")]
    InvalidLength { message: String, field: String },

    #[error("{message}")]
    InvalidHex { message: String, field: String },

    #[error("{message}")]
    InvalidIscc { message: String },

    #[error("{message}")]
    TimestampOutOfRange { message: String },

    #[error("{message}")]
    NonceMismatch { message: String },

    #[error("{message}")]
    InvalidSignature { message: String },

    #[error("nonce already used")]
    NonceReuse,

    #[error("datahash already declared")]
    DuplicateDeclaration {
        existing_iscc_id: String,
        existing_actor: String,
    },

    #[error("{message}")]
    SequencerError { message: String },

    #[error("{resource_type} not found: {resource_id}")]
    NotFound {
        resource_type: String,
        resource_id: String,
    },

    #[error("pubkey does not match original declaration")]
    Unauthorized,
}

impl HubError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn invalid_format(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
            field: field.into(),
        }
    }

    pub fn invalid_length(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidLength {
            message: message.into(),
            field: field.into(),
        }
    }

    pub fn invalid_hex(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidHex {
            message: message.into(),
            field: field.into(),
        }
    }

    /// The machine-readable code from spec's error taxonomy table.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed { .. } => "validation_failed",
            Self::InvalidFormat { .. } => "invalid_format",
            Self::InvalidLength { .. } => "invalid_length",
            Self::InvalidHex { .. } => "invalid_hex",
            Self::InvalidIscc { .. } => "invalid_iscc",
            Self::TimestampOutOfRange { .. } => "timestamp_out_of_range",
            Self::NonceMismatch { .. } => "nonce_mismatch",
            Self::InvalidSignature { .. } => "invalid_signature",
            Self::NonceReuse => "nonce_reuse",
            Self::DuplicateDeclaration { .. } => "duplicate_declaration",
            Self::SequencerError { .. } => "sequencer_error",
            Self::NotFound { .. } => "not_found",
            Self::Unauthorized => "unauthorized",
        }
    }

    /// The field the error pertains to, if the taxonomy pins one down.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::ValidationFailed { field, .. } => field.as_deref(),
            Self::InvalidFormat { field, .. } => Some(field),
            Self::InvalidLength { field, .. } => Some(field),
            Self::InvalidHex { field, .. } => Some(field),
            Self::InvalidIscc { .. } => Some("iscc_code"),
            Self::TimestampOutOfRange { .. } => Some("timestamp"),
            Self::NonceMismatch { .. } => Some("nonce"),
            Self::DuplicateDeclaration { .. } => Some("datahash"),
            Self::NonceReuse => Some("nonce"),
            _ => None,
        }
    }
}

pub type HubResult<T> = Result<T, HubError>;
