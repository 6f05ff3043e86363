//! Current-state projection (spec §4.E) and duplicate detection (spec §4.C).
//! Runs after a CREATE/DELETE has already been durably sequenced; failures
//! here never roll back the event log, they only delay when the projection
//! catches up (spec §9 "projection lag is acceptable, event loss is not").

use sqlx::{Row, SqlitePool};

use iscc_hub_core::error::{HubError, HubResult};
use iscc_hub_core::iscc_id::IsccId;
use iscc_hub_core::note::{Event, EventType, IsccDeclaration, IsccNote};

/// An existing live declaration sharing a datahash with an incoming note.
#[derive(Debug, Clone)]
pub struct DuplicateMatch {
    pub iscc_id: String,
    pub actor: String,
}

/// Look up a live (non-redacted) declaration with the same datahash, the
/// check the validator cannot perform on its own since it requires storage
/// access (spec §4.C).
pub async fn find_duplicate(pool: &SqlitePool, note: &IsccNote) -> HubResult<Option<DuplicateMatch>> {
    let row = sqlx::query(
        "SELECT iscc_id, actor FROM declarations WHERE datahash = ? AND redacted = 0 LIMIT 1",
    )
    .bind(&note.datahash)
    .fetch_optional(pool)
    .await
    .map_err(|e| HubError::SequencerError { message: e.to_string() })?;

    Ok(match row {
        Some(r) => Some(DuplicateMatch {
            iscc_id: r.try_get("iscc_id").map_err(|e| HubError::SequencerError { message: e.to_string() })?,
            actor: r.try_get("actor").map_err(|e| HubError::SequencerError { message: e.to_string() })?,
        }),
        None => None,
    })
}

/// Apply a sequenced event to the `declarations` projection.
pub async fn apply_event(pool: &SqlitePool, event: &Event, note: &IsccNote) -> HubResult<()> {
    match event.event_type {
        EventType::Created | EventType::Updated => upsert(pool, event, note).await,
        EventType::Deleted => remove(pool, event).await,
    }
}

async fn upsert(pool: &SqlitePool, event: &Event, note: &IsccNote) -> HubResult<()> {
    let iscc_id = IsccId::from_body(event.iscc_id, 0)?;
    let actor = format!("z{}", bs58::encode(event.pubkey).into_string());
    let updated_at = chrono::DateTime::from_timestamp_micros(event.event_time_us)
        .ok_or_else(|| HubError::SequencerError { message: "event_time_us out of range".into() })?;

    sqlx::query(
        "INSERT INTO declarations (iscc_id, event_seq, iscc_code, datahash, nonce, actor, gateway, metahash, updated_at, redacted)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
         ON CONFLICT(iscc_id) DO UPDATE SET
            event_seq = excluded.event_seq,
            iscc_code = excluded.iscc_code,
            datahash = excluded.datahash,
            nonce = excluded.nonce,
            actor = excluded.actor,
            gateway = excluded.gateway,
            metahash = excluded.metahash,
            updated_at = excluded.updated_at,
            redacted = 0",
    )
    .bind(iscc_id.to_string())
    .bind(event.seq)
    .bind(&note.iscc_code)
    .bind(&note.datahash)
    .bind(hex::encode(event.nonce))
    .bind(&actor)
    .bind(&note.gateway)
    .bind(&note.metahash)
    .bind(updated_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(|e| HubError::SequencerError { message: e.to_string() })?;

    Ok(())
}

async fn remove(pool: &SqlitePool, event: &Event) -> HubResult<()> {
    let iscc_id = IsccId::from_body(event.iscc_id, 0)?;
    sqlx::query("UPDATE declarations SET redacted = 1, event_seq = ? WHERE iscc_id = ?")
        .bind(event.seq)
        .bind(iscc_id.to_string())
        .execute(pool)
        .await
        .map_err(|e| HubError::SequencerError { message: e.to_string() })?;
    Ok(())
}

/// Fetch the current (possibly redacted) declaration for one ISCC-ID.
pub async fn get_declaration(pool: &SqlitePool, iscc_id: &str) -> HubResult<Option<IsccDeclaration>> {
    let row = sqlx::query(
        "SELECT iscc_id, event_seq, iscc_code, datahash, nonce, actor, gateway, metahash, updated_at, redacted
         FROM declarations WHERE iscc_id = ?",
    )
    .bind(iscc_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| HubError::SequencerError { message: e.to_string() })?;

    let Some(row) = row else { return Ok(None) };
    let updated_at: String = row.try_get("updated_at").map_err(|e| HubError::SequencerError { message: e.to_string() })?;
    Ok(Some(IsccDeclaration {
        iscc_id: row.try_get("iscc_id").map_err(|e| HubError::SequencerError { message: e.to_string() })?,
        event_seq: row.try_get("event_seq").map_err(|e| HubError::SequencerError { message: e.to_string() })?,
        iscc_code: row.try_get("iscc_code").map_err(|e| HubError::SequencerError { message: e.to_string() })?,
        datahash: row.try_get("datahash").map_err(|e| HubError::SequencerError { message: e.to_string() })?,
        nonce: row.try_get("nonce").map_err(|e| HubError::SequencerError { message: e.to_string() })?,
        actor: row.try_get("actor").map_err(|e| HubError::SequencerError { message: e.to_string() })?,
        gateway: row.try_get("gateway").map_err(|e| HubError::SequencerError { message: e.to_string() })?,
        metahash: row.try_get("metahash").map_err(|e| HubError::SequencerError { message: e.to_string() })?,
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| HubError::SequencerError { message: e.to_string() })?
            .with_timezone(&chrono::Utc),
        redacted: row.try_get::<i64, _>("redacted").map_err(|e| HubError::SequencerError { message: e.to_string() })? != 0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect, DbConfig};
    use crate::sequencer::Sequencer;
    use ed25519_dalek::{Signer, SigningKey};
    use iscc_hub_core::iscc_codec;
    use iscc_hub_core::note::NoteSignature;

    fn signed_note(signing_key: &SigningKey, seed: u8) -> IsccNote {
        let digest = vec![seed; 32];
        let instance = iscc_codec::encode_instance(&digest);
        let iscc_code = iscc_codec::compose(&[instance]).unwrap();
        let datahash = format!("1e20{}", hex::encode(&digest));
        let mut nonce = vec![0u8; 16];
        nonce[0] = seed;
        let mut note = IsccNote {
            iscc_code,
            datahash,
            nonce: hex::encode(nonce),
            timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            signature: NoteSignature {
                version: "ISCC-SIG v1.0".into(),
                pubkey: {
                    let mut bytes = vec![0xed, 0x01];
                    bytes.extend_from_slice(signing_key.verifying_key().as_bytes());
                    format!("z{}", bs58::encode(bytes).into_string())
                },
                proof: String::new(),
                controller: None,
                keyid: None,
            },
            gateway: None,
            metahash: None,
            units: None,
        };
        let mut value = serde_json::to_value(&note).unwrap();
        value.get_mut("signature").and_then(|s| s.as_object_mut()).unwrap().remove("proof");
        let canonical = serde_jcs::to_string(&value).unwrap();
        let signature = signing_key.sign(canonical.as_bytes());
        note.signature.proof = format!("z{}", bs58::encode(signature.to_bytes()).into_string());
        note
    }

    #[tokio::test]
    async fn upsert_then_lookup_roundtrips() {
        let pool = connect(&DbConfig::memory()).await.unwrap();
        let sequencer = Sequencer::new(pool.clone(), 1, 0);
        let signing_key = SigningKey::from_bytes(&[21u8; 32]);
        let note = signed_note(&signing_key, 1);

        let event = sequencer.sequence_create(&note).await.unwrap();
        apply_event(&pool, &event, &note).await.unwrap();

        let iscc_id = IsccId::from_body(event.iscc_id, 0).unwrap().to_string();
        let declaration = get_declaration(&pool, &iscc_id).await.unwrap().unwrap();
        assert_eq!(declaration.iscc_code, note.iscc_code);
        assert!(!declaration.redacted);
    }

    #[tokio::test]
    async fn detects_duplicate_datahash() {
        let pool = connect(&DbConfig::memory()).await.unwrap();
        let sequencer = Sequencer::new(pool.clone(), 1, 0);
        let signing_key = SigningKey::from_bytes(&[22u8; 32]);
        let note = signed_note(&signing_key, 2);

        let event = sequencer.sequence_create(&note).await.unwrap();
        apply_event(&pool, &event, &note).await.unwrap();

        let duplicate = find_duplicate(&pool, &note).await.unwrap();
        assert!(duplicate.is_some());
    }

    #[tokio::test]
    async fn redacted_declarations_are_not_duplicates() {
        let pool = connect(&DbConfig::memory()).await.unwrap();
        let sequencer = Sequencer::new(pool.clone(), 1, 0);
        let signing_key = SigningKey::from_bytes(&[23u8; 32]);
        let note = signed_note(&signing_key, 3);

        let created = sequencer.sequence_create(&note).await.unwrap();
        apply_event(&pool, &created, &note).await.unwrap();

        let iscc_id = IsccId::from_body(created.iscc_id, 0).unwrap();
        let mut nonce = vec![0u8; 16];
        nonce[0] = 99;
        let mut delete_note = iscc_hub_core::note::IsccNoteDelete {
            iscc_id: iscc_id.to_string(),
            nonce: hex::encode(nonce),
            timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            signature: note.signature.clone(),
        };
        let mut value = serde_json::to_value(&delete_note).unwrap();
        value.get_mut("signature").and_then(|s| s.as_object_mut()).unwrap().remove("proof");
        let canonical = serde_jcs::to_string(&value).unwrap();
        let signature = signing_key.sign(canonical.as_bytes());
        delete_note.signature.proof = format!("z{}", bs58::encode(signature.to_bytes()).into_string());

        let deleted = sequencer.sequence_delete(&delete_note).await.unwrap();
        apply_event(&pool, &deleted, &note).await.unwrap();

        let duplicate = find_duplicate(&pool, &note).await.unwrap();
        assert!(duplicate.is_none());
    }
}
