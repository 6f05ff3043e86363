//! Wire and domain types: the client-submitted note, the append-only event,
//! and the materialized declaration row (spec §3).

use serde::{Deserialize, Serialize};

/// Signature block of an `IsccNote`/`IsccNoteDelete`.
///
/// `version` is pinned to `"ISCC-SIG v1.0"`; `pubkey`/`proof` are multibase
/// (z-base58btc) strings. `#[serde(deny_unknown_fields)]` enforces "no other
/// keys permitted" from spec §3 at the deserialization boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoteSignature {
    pub version: String,
    pub pubkey: String,
    pub proof: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyid: Option<String>,
}

/// A client-submitted, signed declaration (spec §3 `IsccNote`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IsccNote {
    pub iscc_code: String,
    pub datahash: String,
    pub nonce: String,
    pub timestamp: String,
    pub signature: NoteSignature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metahash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Vec<String>>,
}

/// A client-submitted, signed deletion request (spec §3 `IsccNoteDelete`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IsccNoteDelete {
    pub iscc_id: String,
    pub nonce: String,
    pub timestamp: String,
    pub signature: NoteSignature,
}

/// Event type discriminant. `Updated` is reserved per spec §9 Open
/// Questions; no code path in this hub emits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum EventType {
    Created = 1,
    Updated = 2,
    Deleted = 3,
}

impl EventType {
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    pub fn from_i16(v: i16) -> Option<Self> {
        match v {
            1 => Some(Self::Created),
            2 => Some(Self::Updated),
            3 => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// An append-only event log row (spec §3 `Event`). `iscc_note` is stored as
/// the already-JCS-canonicalized JSON text, never re-serialized.
#[derive(Debug, Clone)]
pub struct Event {
    pub seq: i64,
    pub event_type: EventType,
    pub iscc_id: [u8; 8],
    pub nonce: [u8; 16],
    pub datahash: Vec<u8>,
    pub pubkey: [u8; 32],
    pub iscc_note: String,
    pub event_time_us: i64,
}

/// The materialized current-state row for one ISCC-ID (spec §3 `IsccDeclaration`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsccDeclaration {
    pub iscc_id: String,
    pub event_seq: i64,
    pub iscc_code: String,
    pub datahash: String,
    pub nonce: String,
    pub actor: String,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub metahash: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub redacted: bool,
}
