//! ISCC-ID codec: a single newtype owning every bit-packing concern, instead
//! of the original source's habit of re-deriving the header and body in each
//! call site. Follows the teacher's `Hash([u8; 32])` pattern in
//! `vex-core/src/merkle.rs` — a fixed-size byte newtype with manual
//! `Display`/`Ord` rather than deriving them over the raw bytes blindly.

use std::cmp::Ordering;
use std::fmt;

use crate::error::HubError;

const MAX_TS_US: u64 = (1u64 << 52) - 1;
const MAX_HUB_ID: u16 = 4095;

const HEADER_REALM_0: [u8; 2] = [0x60, 0x11];
const HEADER_REALM_1: [u8; 2] = [0x61, 0x11];

const BASE32: base32::Alphabet = base32::Alphabet::Rfc4648 { padding: false };

fn header_for_realm(realm: u8) -> Result<[u8; 2], HubError> {
    match realm {
        0 => Ok(HEADER_REALM_0),
        1 => Ok(HEADER_REALM_1),
        other => Err(HubError::validation(format!(
            "unsupported ISCC-ID realm: {other}"
        ))),
    }
}

fn realm_for_header(header: &[u8]) -> Result<u8, HubError> {
    if header == HEADER_REALM_0 {
        Ok(0)
    } else if header == HEADER_REALM_1 {
        Ok(1)
    } else {
        Err(HubError::invalid_format(
            "iscc_id",
            "unrecognized ISCC-ID header",
        ))
    }
}

/// A 64-bit ISCC-ID: 52-bit microsecond timestamp packed with a 12-bit hub id.
///
/// Equality, hashing, and ordering are defined on the 8-byte body alone
/// (timestamp first, then hub id) — the realm is carried only to reproduce
/// the canonical string and is not part of identity, matching the source's
/// `IsccID.__eq__`/`__lt__` which compare `uint_body`.
#[derive(Debug, Clone, Copy)]
pub struct IsccId {
    realm: u8,
    body: [u8; 8],
}

impl IsccId {
    /// Build a fresh ISCC-ID from a sequencer-issued timestamp and hub id.
    pub fn from_timestamp(ts_us: u64, hub_id: u16, realm: u8) -> Result<Self, HubError> {
        header_for_realm(realm)?;
        if ts_us > MAX_TS_US {
            return Err(HubError::validation("timestamp exceeds 52-bit range"));
        }
        if hub_id > MAX_HUB_ID {
            return Err(HubError::validation("hub id exceeds 12-bit range"));
        }
        let packed = (ts_us << 12) | hub_id as u64;
        Ok(Self {
            realm,
            body: packed.to_be_bytes(),
        })
    }

    /// Reconstruct from a raw 8-byte body plus the realm it was issued under.
    pub fn from_body(body: [u8; 8], realm: u8) -> Result<Self, HubError> {
        header_for_realm(realm)?;
        Ok(Self { realm, body })
    }

    /// Parse the 10-byte header+body form.
    pub fn from_header_and_body(bytes: &[u8]) -> Result<Self, HubError> {
        if bytes.len() != 10 {
            return Err(HubError::invalid_length(
                "iscc_id",
                "ISCC-ID bytes must be exactly 10 bytes (2-byte header + 8-byte body)",
            ));
        }
        let realm = realm_for_header(&bytes[..2])?;
        let mut body = [0u8; 8];
        body.copy_from_slice(&bytes[2..]);
        Ok(Self { realm, body })
    }

    /// Parse the canonical `ISCC:...` string form.
    pub fn parse(s: &str) -> Result<Self, HubError> {
        let payload = s
            .strip_prefix("ISCC:")
            .ok_or_else(|| HubError::invalid_format("iscc_id", "missing ISCC: prefix"))?;
        let decoded = base32::decode(BASE32, payload)
            .ok_or_else(|| HubError::invalid_format("iscc_id", "invalid base32 in ISCC-ID"))?;
        Self::from_header_and_body(&decoded)
    }

    pub fn realm(&self) -> u8 {
        self.realm
    }

    /// The raw 8-byte body (timestamp || hub id), as stored in `events.iscc_id`.
    pub fn body(&self) -> [u8; 8] {
        self.body
    }

    fn uint_body(&self) -> u64 {
        u64::from_be_bytes(self.body)
    }

    pub fn timestamp_micros(&self) -> u64 {
        self.uint_body() >> 12
    }

    pub fn hub_id(&self) -> u16 {
        (self.uint_body() & 0xFFF) as u16
    }

    pub fn timestamp_iso(&self) -> String {
        let micros = self.timestamp_micros() as i64;
        let dt = chrono::DateTime::from_timestamp_micros(micros)
            .unwrap_or_else(|| chrono::DateTime::from_timestamp(0, 0).unwrap());
        dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
    }

    /// The full 10-byte header+body encoding.
    pub fn to_header_and_body(&self) -> [u8; 10] {
        let mut out = [0u8; 10];
        out[..2].copy_from_slice(&header_for_realm(self.realm).expect("realm already validated"));
        out[2..].copy_from_slice(&self.body);
        out
    }
}

impl fmt::Display for IsccId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_header_and_body();
        write!(f, "ISCC:{}", base32::encode(BASE32, &bytes))
    }
}

impl PartialEq for IsccId {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body
    }
}
impl Eq for IsccId {}

impl std::hash::Hash for IsccId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.body.hash(state);
    }
}

impl PartialOrd for IsccId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IsccId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uint_body().cmp(&other.uint_body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_via_canonical_string() {
        let id = IsccId::from_timestamp(1_746_171_541_264_773, 0, 0).unwrap();
        let s = id.to_string();
        let parsed = IsccId::parse(&s).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(parsed.timestamp_micros(), 1_746_171_541_264_773);
        assert_eq!(parsed.hub_id(), 0);
    }

    #[test]
    fn canonical_string_has_iscc_prefix_and_reparses() {
        let id = IsccId::from_timestamp(1_746_171_541_264_773, 0, 0).unwrap();
        let s = id.to_string();
        assert!(s.starts_with("ISCC:"));
        assert_eq!(IsccId::parse(&s).unwrap(), id);
    }

    #[test]
    fn roundtrip_via_header_and_body() {
        let id = IsccId::from_timestamp(12345, 42, 1).unwrap();
        let bytes = id.to_header_and_body();
        let parsed = IsccId::from_header_and_body(&bytes).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(parsed.realm(), 1);
    }

    #[test]
    fn rejects_out_of_range_hub_id() {
        assert!(IsccId::from_timestamp(0, 4096, 0).is_err());
    }

    #[test]
    fn rejects_out_of_range_timestamp() {
        assert!(IsccId::from_timestamp(1u64 << 52, 0, 0).is_err());
    }

    #[test]
    fn ordering_is_timestamp_then_hub_id() {
        let a = IsccId::from_timestamp(100, 5, 0).unwrap();
        let b = IsccId::from_timestamp(100, 6, 0).unwrap();
        let c = IsccId::from_timestamp(101, 0, 0).unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn equality_ignores_realm() {
        let a = IsccId::from_timestamp(77, 3, 0).unwrap();
        let b = IsccId::from_body(a.body(), 1).unwrap();
        assert_eq!(a, b);
    }
}
