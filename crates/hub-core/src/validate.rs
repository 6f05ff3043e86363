//! Pure, side-effect-free validation of a signed `IsccNote`/`IsccNoteDelete`
//! (spec §4.B). No database access; every check here is safely parallelizable,
//! matching the spec's requirement that the validator never touch storage.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{HubError, HubResult};
use crate::iscc_codec;
use crate::iscc_id::IsccId;
use crate::note::{IsccNote, IsccNoteDelete, NoteSignature};

const MAX_JSON_BYTES: usize = 8192;
const MAX_STRING_CHARS: usize = 2048;
const DATAHASH_PREFIX: &str = "1e20";
const HASH_LENGTH: usize = 68;
const NONCE_LENGTH: usize = 32;
const SIGNATURE_VERSION: &str = "ISCC-SIG v1.0";
const SUPPORTED_RESOLVER_VARS: [&str; 5] =
    ["iscc_id", "iscc_code", "pubkey", "datahash", "controller"];

/// Policy knobs for one validation call, threaded in by the caller instead
/// of read from global settings (spec §9 "global mutable state -> explicit
/// config object").
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    pub hub_id: u16,
    pub verify_signature: bool,
    pub verify_hub_id: bool,
    pub verify_timestamp: bool,
    pub now: DateTime<Utc>,
}

impl ValidationPolicy {
    pub fn strict(hub_id: u16) -> Self {
        Self {
            hub_id,
            verify_signature: true,
            verify_hub_id: true,
            verify_timestamp: true,
            now: Utc::now(),
        }
    }
}

pub fn validate_create(raw: &[u8], policy: &ValidationPolicy) -> HubResult<IsccNote> {
    let value = parse_and_check_size(raw)?;
    let note: IsccNote = serde_json::from_value(value)
        .map_err(|e| HubError::validation(format!("malformed IsccNote: {e}")))?;

    check_iscc_code(&note.iscc_code)?;
    check_datahash(&note.datahash, "datahash")?;
    check_nonce(&note.nonce, policy)?;
    check_timestamp(&note.timestamp, policy)?;

    if let Some(metahash) = &note.metahash {
        if metahash.is_empty() {
            return Err(HubError::validation_field("metahash must not be empty", "metahash"));
        }
        check_datahash(metahash, "metahash")?;
    }
    if let Some(gateway) = &note.gateway {
        if gateway.is_empty() {
            return Err(HubError::validation_field("gateway must not be empty", "gateway"));
        }
        check_gateway(gateway)?;
    }
    if let Some(units) = &note.units {
        if units.is_empty() {
            return Err(HubError::validation_field("units must not be empty", "units"));
        }
        check_units(units, &note.datahash, &note.iscc_code)?;
    }

    check_signature_structure(&note.signature)?;
    cross_check_datahash_iscc(&note.iscc_code, &note.datahash)?;

    if policy.verify_signature {
        verify_signed_json(&note, &note.signature)?;
    }

    Ok(note)
}

pub fn validate_delete(raw: &[u8], policy: &ValidationPolicy) -> HubResult<IsccNoteDelete> {
    let value = parse_and_check_size(raw)?;
    let note: IsccNoteDelete = serde_json::from_value(value)
        .map_err(|e| HubError::validation(format!("malformed IsccNoteDelete: {e}")))?;

    IsccId::parse(&note.iscc_id)?;
    check_nonce(&note.nonce, policy)?;
    check_timestamp(&note.timestamp, policy)?;
    check_signature_structure(&note.signature)?;

    if policy.verify_signature {
        verify_signed_json(&note, &note.signature)?;
    }

    Ok(note)
}

fn parse_and_check_size(raw: &[u8]) -> HubResult<serde_json::Value> {
    if raw.len() > MAX_JSON_BYTES {
        return Err(HubError::validation("request body exceeds 8192 bytes"));
    }
    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| HubError::validation(format!("invalid JSON: {e}")))?;
    check_string_lengths(&value)?;
    Ok(value)
}

fn check_string_lengths(value: &serde_json::Value) -> HubResult<()> {
    match value {
        serde_json::Value::String(s) => {
            if s.chars().count() > MAX_STRING_CHARS {
                return Err(HubError::validation("a string field exceeds 2048 characters"));
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                check_string_lengths(item)?;
            }
        }
        serde_json::Value::Object(map) => {
            for v in map.values() {
                check_string_lengths(v)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn check_iscc_code(code: &str) -> HubResult<()> {
    let decoded = iscc_codec::decode(code).map_err(|_| HubError::InvalidIscc {
        message: "iscc_code is not a parseable ISCC-CODE".into(),
    })?;
    if decoded.main_type != iscc_codec::MainType::Iscc {
        return Err(HubError::InvalidIscc {
            message: "iscc_code must be a composite ISCC (MainType=ISCC)".into(),
        });
    }
    Ok(())
}

fn check_datahash(value: &str, field: &str) -> HubResult<()> {
    if value != value.to_lowercase() {
        return Err(HubError::invalid_format(field, format!("{field} must be lowercase hex")));
    }
    if value.len() != HASH_LENGTH {
        return Err(HubError::invalid_length(
            field,
            format!("{field} must be exactly {HASH_LENGTH} hex chars"),
        ));
    }
    if !value.starts_with(DATAHASH_PREFIX) {
        return Err(HubError::invalid_format(
            field,
            format!("{field} must start with prefix {DATAHASH_PREFIX}"),
        ));
    }
    hex::decode(value).map_err(|_| HubError::invalid_hex(field, format!("{field} is not valid hex")))?;
    Ok(())
}

fn datahash_digest_bytes(datahash: &str) -> HubResult<Vec<u8>> {
    let raw = hex::decode(datahash)
        .map_err(|_| HubError::invalid_hex("datahash", "datahash is not valid hex"))?;
    Ok(raw[2..].to_vec())
}

fn check_nonce(value: &str, policy: &ValidationPolicy) -> HubResult<()> {
    if value != value.to_lowercase() || value.len() != NONCE_LENGTH {
        return Err(HubError::invalid_format(
            "nonce",
            format!("nonce must be {NONCE_LENGTH} lowercase hex chars"),
        ));
    }
    let bytes =
        hex::decode(value).map_err(|_| HubError::invalid_hex("nonce", "nonce is not valid hex"))?;
    if policy.verify_hub_id {
        let hub_bits = ((bytes[0] as u16) << 4) | (bytes[1] as u16 >> 4);
        if hub_bits != policy.hub_id {
            return Err(HubError::NonceMismatch {
                message: format!(
                    "nonce hub-id bits {hub_bits} do not match configured hub id {}",
                    policy.hub_id
                ),
            });
        }
    }
    Ok(())
}

fn check_timestamp(value: &str, policy: &ValidationPolicy) -> HubResult<DateTime<Utc>> {
    if !value.ends_with('Z') {
        return Err(HubError::invalid_format("timestamp", "timestamp must end with Z"));
    }
    let dot = value
        .find('.')
        .ok_or_else(|| HubError::invalid_format("timestamp", "timestamp must contain fractional seconds"))?;
    let frac = &value[dot + 1..value.len() - 1];
    if frac.len() != 3 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(HubError::invalid_format(
            "timestamp",
            "timestamp fractional part must be exactly 3 digits",
        ));
    }
    let parsed = DateTime::parse_from_rfc3339(value)
        .map_err(|_| HubError::invalid_format("timestamp", "timestamp is not valid RFC 3339"))?
        .with_timezone(&Utc);
    if policy.verify_timestamp {
        let delta = (policy.now - parsed).num_seconds().abs();
        if delta > 600 {
            return Err(HubError::TimestampOutOfRange {
                message: "timestamp is outside +/-10 minutes of hub wall clock".into(),
            });
        }
    }
    Ok(parsed)
}

fn check_gateway(gateway: &str) -> HubResult<()> {
    if gateway.trim() != gateway {
        return Err(HubError::invalid_format("gateway", "gateway must not have surrounding whitespace"));
    }
    let open = gateway.matches('{').count();
    let close = gateway.matches('}').count();
    if open != close {
        return Err(HubError::invalid_format("gateway", "unbalanced braces in gateway template"));
    }
    let vars = extract_template_variables(gateway);
    if !vars.is_empty() {
        let mut unsupported: Vec<&str> = vars
            .iter()
            .filter(|v| !SUPPORTED_RESOLVER_VARS.contains(&v.as_str()))
            .map(|v| v.as_str())
            .collect();
        if !unsupported.is_empty() {
            unsupported.sort_unstable();
            return Err(HubError::invalid_format(
                "gateway",
                format!("unsupported resolver variables: {}", unsupported.join(", ")),
            ));
        }
        return Ok(());
    }
    check_plain_url(gateway)
}

fn extract_template_variables(template: &str) -> Vec<String> {
    let mut vars = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in template.char_indices() {
        if c == '{' {
            start = Some(i + 1);
        } else if c == '}' {
            if let Some(s) = start.take() {
                let mut expr = &template[s..i];
                if let Some(first) = expr.chars().next() {
                    if "+#./;?&".contains(first) {
                        expr = &expr[first.len_utf8()..];
                    }
                }
                for part in expr.split(',') {
                    let name = part.split(':').next().unwrap_or(part).trim_end_matches('*').trim();
                    if !name.is_empty() {
                        vars.push(name.to_string());
                    }
                }
            }
        }
    }
    vars
}

fn check_plain_url(s: &str) -> HubResult<()> {
    let (scheme, rest) = s
        .split_once("://")
        .ok_or_else(|| HubError::invalid_format("gateway", "gateway must be an http(s) URL or URI template"))?;
    if scheme != "http" && scheme != "https" {
        return Err(HubError::invalid_format("gateway", "gateway URL scheme must be http or https"));
    }
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    if authority.is_empty() {
        return Err(HubError::invalid_format("gateway", "gateway URL is missing an authority"));
    }
    Ok(())
}

fn check_units(units: &[String], datahash: &str, iscc_code: &str) -> HubResult<()> {
    if units.len() > 4 {
        return Err(HubError::invalid_length("units", "at most 4 units are permitted"));
    }
    let digest = datahash_digest_bytes(datahash)?;
    let instance_unit = iscc_codec::encode_instance(&digest);
    let mut all: Vec<String> = units.to_vec();
    all.push(instance_unit);
    let composed = iscc_codec::compose(&all)?;
    if composed != iscc_code {
        return Err(HubError::validation_field(
            "units + datahash's Instance-Code do not reconstruct iscc_code",
            "units",
        ));
    }
    Ok(())
}

fn check_signature_structure(sig: &NoteSignature) -> HubResult<()> {
    if sig.version != SIGNATURE_VERSION {
        return Err(HubError::InvalidSignature {
            message: format!("unsupported signature version, expected {SIGNATURE_VERSION}"),
        });
    }
    Ok(())
}

fn cross_check_datahash_iscc(iscc_code: &str, datahash: &str) -> HubResult<()> {
    let decoded = iscc_codec::decode(iscc_code)?;
    let unit_size = match decoded.sub_type {
        iscc_codec::SubType::Wide => 16,
        iscc_codec::SubType::None => 8,
    };
    if decoded.digest.len() < unit_size {
        return Err(HubError::invalid_format(
            "datahash",
            "iscc_code digest is too short to contain an Instance-Code unit",
        ));
    }
    let last_unit = &decoded.digest[decoded.digest.len() - unit_size..];
    let digest = datahash_digest_bytes(datahash)?;
    if digest.len() < unit_size || &digest[..unit_size] != last_unit {
        return Err(HubError::invalid_format(
            "datahash",
            "datahash does not match iscc_code's Instance-Code unit",
        ));
    }
    Ok(())
}

fn decode_multibase(s: &str) -> HubResult<Vec<u8>> {
    let rest = s.strip_prefix('z').ok_or_else(|| HubError::InvalidSignature {
        message: "expected a z-base58btc multibase value".into(),
    })?;
    bs58::decode(rest)
        .into_vec()
        .map_err(|e| HubError::InvalidSignature { message: e.to_string() })
}

fn decode_multibase_ed25519_pubkey(s: &str) -> HubResult<[u8; 32]> {
    let bytes = decode_multibase(s)?;
    if bytes.len() != 34 || bytes[0] != 0xed || bytes[1] != 0x01 {
        return Err(HubError::InvalidSignature {
            message: "pubkey is not a multibase Ed25519 key (0xED01 prefix)".into(),
        });
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[2..]);
    Ok(out)
}

/// Canonicalize `note` with JCS excluding `signature.proof`, then verify the
/// Ed25519 signature over the result. Shared by `IsccNote` and
/// `IsccNoteDelete` since both carry a `signature` field.
fn verify_signed_json<T: Serialize>(note: &T, sig: &NoteSignature) -> HubResult<()> {
    let mut value = serde_json::to_value(note)
        .map_err(|e| HubError::InvalidSignature { message: e.to_string() })?;
    if let Some(obj) = value.get_mut("signature").and_then(|s| s.as_object_mut()) {
        obj.remove("proof");
    }
    let canonical = serde_jcs::to_string(&value)
        .map_err(|e| HubError::InvalidSignature { message: e.to_string() })?;

    let pubkey_bytes = decode_multibase_ed25519_pubkey(&sig.pubkey)?;
    let proof_bytes = decode_multibase(&sig.proof)?;

    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&pubkey_bytes)
        .map_err(|e| HubError::InvalidSignature { message: e.to_string() })?;
    let signature = ed25519_dalek::Signature::from_slice(&proof_bytes)
        .map_err(|e| HubError::InvalidSignature { message: e.to_string() })?;

    verifying_key
        .verify_strict(canonical.as_bytes(), &signature)
        .map_err(|_| HubError::InvalidSignature {
            message: "cryptographic signature verification failed".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::NoteSignature;
    use ed25519_dalek::{Signer, SigningKey};

    fn sign_note(mut note: IsccNote, signing_key: &SigningKey) -> IsccNote {
        note.signature.proof = "zstub".into();
        let mut value = serde_json::to_value(&note).unwrap();
        value
            .get_mut("signature")
            .and_then(|s| s.as_object_mut())
            .unwrap()
            .remove("proof");
        let canonical = serde_jcs::to_string(&value).unwrap();
        let signature = signing_key.sign(canonical.as_bytes());
        note.signature.proof = format!("z{}", bs58::encode(signature.to_bytes()).into_string());
        note
    }

    fn multibase_pubkey(signing_key: &SigningKey) -> String {
        let mut bytes = vec![0xed, 0x01];
        bytes.extend_from_slice(signing_key.verifying_key().as_bytes());
        format!("z{}", bs58::encode(bytes).into_string())
    }

    fn sample_note(signing_key: &SigningKey, datahash: &str, iscc_code: &str) -> IsccNote {
        let note = IsccNote {
            iscc_code: iscc_code.to_string(),
            datahash: datahash.to_string(),
            nonce: "001faa3f18c7b9407a48536a9b00c4cb".to_string(),
            timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            signature: NoteSignature {
                version: SIGNATURE_VERSION.to_string(),
                pubkey: multibase_pubkey(signing_key),
                proof: String::new(),
                controller: None,
                keyid: None,
            },
            gateway: None,
            metahash: None,
            units: None,
        };
        sign_note(note, signing_key)
    }

    fn valid_code_and_hash() -> (String, String) {
        let digest = vec![9u8; 32];
        let instance = iscc_codec::encode_instance(&digest);
        let composed = iscc_codec::compose(&[instance]).unwrap();
        let datahash = format!("{DATAHASH_PREFIX}{}", hex::encode(digest));
        (composed, datahash)
    }

    #[test]
    fn accepts_a_well_formed_signed_note() {
        let signing_key = SigningKey::from_bytes(&[3u8; 32]);
        let (iscc_code, datahash) = valid_code_and_hash();
        let note = sample_note(&signing_key, &datahash, &iscc_code);
        let raw = serde_json::to_vec(&note).unwrap();
        let policy = ValidationPolicy {
            hub_id: 0,
            verify_signature: true,
            verify_hub_id: true,
            verify_timestamp: true,
            now: Utc::now(),
        };
        validate_create(&raw, &policy).unwrap();
    }

    #[test]
    fn rejects_tampered_signature() {
        let signing_key = SigningKey::from_bytes(&[4u8; 32]);
        let (iscc_code, datahash) = valid_code_and_hash();
        let mut note = sample_note(&signing_key, &datahash, &iscc_code);
        note.nonce = "002faa3f18c7b9407a48536a9b00c4cb".into();
        let raw = serde_json::to_vec(&note).unwrap();
        let policy = ValidationPolicy {
            hub_id: 0,
            verify_signature: true,
            verify_hub_id: false,
            verify_timestamp: false,
            now: Utc::now(),
        };
        assert!(matches!(
            validate_create(&raw, &policy),
            Err(HubError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn rejects_nonce_hub_id_mismatch() {
        let signing_key = SigningKey::from_bytes(&[5u8; 32]);
        let (iscc_code, datahash) = valid_code_and_hash();
        let note = sample_note(&signing_key, &datahash, &iscc_code);
        let raw = serde_json::to_vec(&note).unwrap();
        let policy = ValidationPolicy {
            hub_id: 7,
            verify_signature: false,
            verify_hub_id: true,
            verify_timestamp: false,
            now: Utc::now(),
        };
        assert!(matches!(validate_create(&raw, &policy), Err(HubError::NonceMismatch { .. })));
    }

    #[test]
    fn rejects_bad_datahash_length() {
        let signing_key = SigningKey::from_bytes(&[6u8; 32]);
        let (iscc_code, _) = valid_code_and_hash();
        let mut note = sample_note(&signing_key, "1e20deadbeef", &iscc_code);
        note.datahash = "1e20deadbeef".into();
        let raw = serde_json::to_vec(&note).unwrap();
        let policy = ValidationPolicy {
            hub_id: 0,
            verify_signature: false,
            verify_hub_id: false,
            verify_timestamp: false,
            now: Utc::now(),
        };
        assert!(matches!(validate_create(&raw, &policy), Err(HubError::InvalidLength { .. })));
    }

    #[test]
    fn gateway_template_rejects_unsupported_variable() {
        assert!(check_gateway("https://example.com/{unsupported}").is_err());
        assert!(check_gateway("https://example.com/{iscc_id}").is_ok());
        assert!(check_gateway("https://example.com/resolve").is_ok());
        assert!(check_gateway("ftp://example.com").is_err());
    }
}
