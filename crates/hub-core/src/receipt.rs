//! W3C Verifiable Credential receipt builder (spec §4.F).
//!
//! The hub issues one `IsccDeclarationCredential` per sequenced event, signed
//! with the `eddsa-jcs-2022` cryptosuite over the JCS-canonical credential
//! (proof block excluded), the same canonicalize-then-sign shape
//! `validate::verify_signed_json` uses on the way in.

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};

use crate::error::{HubError, HubResult};
use crate::iscc_id::IsccId;
use crate::note::{Event, EventType};

const CREDENTIAL_CONTEXT: &str = "https://www.w3.org/ns/credentials/v2";
const CRYPTOSUITE: &str = "eddsa-jcs-2022";

/// The hub's own signing identity, used to issue receipts.
pub struct HubKey {
    signing_key: SigningKey,
    /// `did:web:<domain>`, e.g. `did:web:hub.iscc.example`.
    issuer_did: String,
}

impl HubKey {
    pub fn new(signing_key: SigningKey, hub_domain: impl Into<String>) -> Self {
        Self {
            signing_key,
            issuer_did: format!("did:web:{}", hub_domain.into()),
        }
    }

    pub fn issuer_did(&self) -> &str {
        &self.issuer_did
    }

    pub fn verification_method(&self) -> String {
        format!("{}#key-1", self.issuer_did)
    }

    /// Multibase (z-base58btc, 0xED01-prefixed) encoding of the hub's public key.
    pub fn public_key_multibase(&self) -> String {
        let mut bytes = vec![0xed, 0x01];
        bytes.extend_from_slice(self.signing_key.verifying_key().as_bytes());
        format!("z{}", bs58::encode(bytes).into_string())
    }
}

/// A controller DID for the credential subject, derived from the signer's
/// pubkey when the note carried no explicit `signature.controller`
/// (spec §9 "subject DID defaults to did:key of the declaring pubkey").
pub fn subject_did(controller: Option<&str>, pubkey_multibase: &str) -> String {
    controller
        .map(|c| c.to_string())
        .unwrap_or_else(|| format!("did:key:{pubkey_multibase}"))
}

/// Build and sign an `IsccDeclarationCredential` for one sequenced event.
pub fn build_receipt(
    event: &Event,
    hub_key: &HubKey,
    controller: Option<&str>,
    pubkey_multibase: &str,
    iscc_code: &str,
    gateway: Option<&str>,
) -> HubResult<Value> {
    let iscc_id = IsccId::from_body(event.iscc_id, 0)?;
    let event_time = DateTime::<Utc>::from_timestamp_micros(event.event_time_us)
        .ok_or_else(|| HubError::validation("event_time_us out of range"))?;

    let credential_type = match event.event_type {
        EventType::Created => "IsccDeclarationCredential",
        EventType::Updated => "IsccDeclarationCredential",
        EventType::Deleted => "IsccDeclarationRevocationCredential",
    };

    let mut subject = json!({
        "id": subject_did(controller, pubkey_multibase),
        "iscc_id": iscc_id.to_string(),
        "iscc_code": iscc_code,
        "datahash": hex::encode(&event.datahash),
    });
    if let Some(gw) = gateway {
        subject["gateway"] = json!(gw);
    }

    let mut credential = json!({
        "@context": [CREDENTIAL_CONTEXT],
        "type": ["VerifiableCredential", credential_type],
        "issuer": hub_key.issuer_did(),
        "validFrom": event_time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "credentialSubject": subject,
    });

    let canonical = serde_jcs::to_string(&credential)
        .map_err(|e| HubError::validation(format!("failed to canonicalize receipt: {e}")))?;
    let signature = hub_key.signing_key.sign(canonical.as_bytes());
    let proof_value = format!("z{}", bs58::encode(signature.to_bytes()).into_string());

    credential["proof"] = json!({
        "type": "DataIntegrityProof",
        "cryptosuite": CRYPTOSUITE,
        "created": Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "verificationMethod": hub_key.verification_method(),
        "proofPurpose": "assertionMethod",
        "proofValue": proof_value,
    });

    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        let id = IsccId::from_timestamp(1_700_000_000_000_000, 1, 0).unwrap();
        Event {
            seq: 1,
            event_type: EventType::Created,
            iscc_id: id.body(),
            nonce: [0u8; 16],
            datahash: vec![9u8; 32],
            pubkey: [1u8; 32],
            iscc_note: "{}".into(),
            event_time_us: 1_700_000_000_000_000,
        }
    }

    #[test]
    fn builds_a_signed_credential() {
        let hub_key = HubKey::new(SigningKey::from_bytes(&[2u8; 32]), "hub.example.org");
        let event = sample_event();
        let credential = build_receipt(
            &event,
            &hub_key,
            None,
            "zstubpubkey",
            "ISCC:AAAAAAAAAAAAAAAA",
            Some("https://example.org/resolve/{iscc_id}"),
        )
        .unwrap();

        assert_eq!(credential["issuer"], json!(hub_key.issuer_did()));
        assert_eq!(credential["proof"]["cryptosuite"], json!(CRYPTOSUITE));
        assert!(credential["credentialSubject"]["id"]
            .as_str()
            .unwrap()
            .starts_with("did:key:"));
    }

    #[test]
    fn delete_events_use_revocation_credential_type() {
        let hub_key = HubKey::new(SigningKey::from_bytes(&[8u8; 32]), "hub.example.org");
        let mut event = sample_event();
        event.event_type = EventType::Deleted;
        let credential = build_receipt(&event, &hub_key, None, "zstub", "ISCC:AAAAAAAAAAAAAAAA", None)
            .unwrap();
        let types: Vec<&str> = credential["type"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(types.contains(&"IsccDeclarationRevocationCredential"));
    }
}
