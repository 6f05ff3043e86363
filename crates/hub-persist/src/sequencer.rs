//! Single-writer sequencer (spec §4.D). Every CREATE/DELETE runs inside one
//! `BEGIN IMMEDIATE` transaction that reads the log tail, assigns the next
//! gap-less `seq`, mints (or reuses) an `IsccId`, and inserts exactly one row
//! before committing. `IMMEDIATE` makes SQLite itself serialize writers;
//! retries here only cover the busy-timeout window expiring under contention.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use sqlx::pool::PoolConnection;
use sqlx::{Row, Sqlite, SqlitePool};

use iscc_hub_core::error::{HubError, HubResult};
use iscc_hub_core::iscc_id::IsccId;
use iscc_hub_core::note::{Event, EventType, IsccNote, IsccNoteDelete};

const MAX_DRIFT_US: i64 = 100_000;
const RETRY_BASE_MS: u64 = 1;
const RETRY_CAP_MS: u64 = 50;
const MAX_ATTEMPTS: u32 = 10;

pub struct Sequencer {
    pool: SqlitePool,
    hub_id: u16,
    realm: u8,
}

/// An exclusive write transaction, opened with `BEGIN IMMEDIATE` rather than
/// the implicit `BEGIN DEFERRED` sqlx's own `Transaction` type issues.
struct WriteTxn {
    conn: PoolConnection<Sqlite>,
}

impl WriteTxn {
    async fn begin(pool: &SqlitePool) -> HubResult<Self> {
        let mut conn = pool
            .acquire()
            .await
            .map_err(|e| HubError::SequencerError { message: e.to_string() })?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| HubError::SequencerError { message: format!("could not acquire write lock: {e}") })?;
        Ok(Self { conn })
    }

    async fn commit(mut self) -> HubResult<()> {
        sqlx::query("COMMIT")
            .execute(&mut *self.conn)
            .await
            .map_err(|e| HubError::SequencerError { message: e.to_string() })
    }

    async fn rollback(mut self) {
        let _ = sqlx::query("ROLLBACK").execute(&mut *self.conn).await;
    }
}

impl Sequencer {
    pub fn new(pool: SqlitePool, hub_id: u16, realm: u8) -> Self {
        Self { pool, hub_id, realm }
    }

    pub async fn sequence_create(&self, note: &IsccNote) -> HubResult<Event> {
        self.with_retry(|| self.sequence_create_once(note)).await
    }

    pub async fn sequence_delete(&self, note: &IsccNoteDelete) -> HubResult<Event> {
        self.with_retry(|| self.sequence_delete_once(note)).await
    }

    async fn with_retry<F, Fut>(&self, f: F) -> HubResult<Event>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = HubResult<Event>>,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(event) => return Ok(event),
                Err(HubError::SequencerError { message })
                    if is_lock_contention(&message) && attempt + 1 < MAX_ATTEMPTS =>
                {
                    attempt += 1;
                    let backoff_ms = (RETRY_BASE_MS * 2u64.pow(attempt)).min(RETRY_CAP_MS);
                    let jitter_ms = rand::rng().random_range(0..=backoff_ms.max(1));
                    tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    async fn sequence_create_once(&self, note: &IsccNote) -> HubResult<Event> {
        let mut txn = WriteTxn::begin(&self.pool).await?;

        let built = async {
            let tail = fetch_tail(&mut txn.conn).await?;
            let event_time_us = next_create_timestamp(tail.as_ref())?;
            let iscc_id = IsccId::from_timestamp(event_time_us as u64, self.hub_id, self.realm)?;

            let datahash = datahash_digest(&note.datahash)?;
            let nonce_bytes = hex::decode(&note.nonce)
                .map_err(|_| HubError::invalid_hex("nonce", "nonce is not valid hex"))?;
            let nonce: [u8; 16] = nonce_bytes
                .try_into()
                .map_err(|_| HubError::invalid_length("nonce", "decoded nonce must be 16 bytes"))?;
            let pubkey = decode_pubkey(&note.signature.pubkey)?;
            let iscc_note_json = serde_jcs::to_string(note)
                .map_err(|e| HubError::SequencerError { message: e.to_string() })?;

            let event = Event {
                seq: 0,
                event_type: EventType::Created,
                iscc_id: iscc_id.body(),
                nonce,
                datahash,
                pubkey,
                iscc_note: iscc_note_json,
                event_time_us,
            };
            let seq = insert_event(&mut txn.conn, &event).await?;
            Ok::<Event, HubError>(Event { seq, ..event })
        }
        .await;

        match built {
            Ok(event) => {
                txn.commit().await?;
                Ok(event)
            }
            Err(e) => {
                txn.rollback().await;
                Err(e)
            }
        }
    }

    async fn sequence_delete_once(&self, note: &IsccNoteDelete) -> HubResult<Event> {
        let mut txn = WriteTxn::begin(&self.pool).await?;

        let built = async {
            let target = IsccId::parse(&note.iscc_id)?;
            let existing = sqlx::query(
                "SELECT datahash, pubkey FROM events WHERE iscc_id = ? AND event_type != ? ORDER BY seq DESC LIMIT 1",
            )
            .bind(target.body().to_vec())
            .bind(EventType::Deleted.as_i16())
            .fetch_optional(&mut *txn.conn)
            .await
            .map_err(|e| HubError::SequencerError { message: e.to_string() })?
            .ok_or_else(|| HubError::NotFound {
                resource_type: "declaration".into(),
                resource_id: note.iscc_id.clone(),
            })?;

            let datahash: Vec<u8> = existing
                .try_get("datahash")
                .map_err(|e| HubError::SequencerError { message: e.to_string() })?;
            let pubkey_bytes: Vec<u8> = existing
                .try_get("pubkey")
                .map_err(|e| HubError::SequencerError { message: e.to_string() })?;
            let pubkey: [u8; 32] = pubkey_bytes.try_into().map_err(|_| HubError::SequencerError {
                message: "stored pubkey is not 32 bytes".into(),
            })?;

            let tail = fetch_tail(&mut txn.conn).await?;
            let event_time_us = next_delete_timestamp(tail.as_ref());

            let nonce_bytes = hex::decode(&note.nonce)
                .map_err(|_| HubError::invalid_hex("nonce", "nonce is not valid hex"))?;
            let nonce: [u8; 16] = nonce_bytes
                .try_into()
                .map_err(|_| HubError::invalid_length("nonce", "decoded nonce must be 16 bytes"))?;
            let iscc_note_json = serde_jcs::to_string(note)
                .map_err(|e| HubError::SequencerError { message: e.to_string() })?;

            let event = Event {
                seq: 0,
                event_type: EventType::Deleted,
                iscc_id: target.body(),
                nonce,
                datahash,
                pubkey,
                iscc_note: iscc_note_json,
                event_time_us,
            };
            let seq = insert_event(&mut txn.conn, &event).await?;
            Ok::<Event, HubError>(Event { seq, ..event })
        }
        .await;

        match built {
            Ok(event) => {
                txn.commit().await?;
                Ok(event)
            }
            Err(e) => {
                txn.rollback().await;
                Err(e)
            }
        }
    }
}

struct TailRow {
    seq: i64,
    event_time_us: i64,
}

async fn fetch_tail(conn: &mut PoolConnection<Sqlite>) -> HubResult<Option<TailRow>> {
    let row = sqlx::query("SELECT seq, event_time_us FROM events ORDER BY seq DESC LIMIT 1")
        .fetch_optional(&mut **conn)
        .await
        .map_err(|e| HubError::SequencerError { message: e.to_string() })?;
    Ok(match row {
        Some(r) => Some(TailRow {
            seq: r
                .try_get("seq")
                .map_err(|e| HubError::SequencerError { message: e.to_string() })?,
            event_time_us: r
                .try_get("event_time_us")
                .map_err(|e| HubError::SequencerError { message: e.to_string() })?,
        }),
        None => None,
    })
}

fn next_create_timestamp(tail: Option<&TailRow>) -> HubResult<i64> {
    let now_us = Utc::now().timestamp_micros();
    let candidate = match tail {
        Some(t) => now_us.max(t.event_time_us + 1),
        None => now_us,
    };
    if candidate - now_us > MAX_DRIFT_US {
        return Err(HubError::SequencerError {
            message: "event log tail is too far ahead of hub wall clock to assign a monotonic timestamp"
                .into(),
        });
    }
    Ok(candidate)
}

fn next_delete_timestamp(tail: Option<&TailRow>) -> i64 {
    let now_us = Utc::now().timestamp_micros();
    match tail {
        Some(t) => now_us.max(t.event_time_us + 1),
        None => now_us,
    }
}

async fn insert_event(conn: &mut PoolConnection<Sqlite>, event: &Event) -> HubResult<i64> {
    let result = sqlx::query(
        "INSERT INTO events (event_type, iscc_id, nonce, datahash, pubkey, iscc_note, event_time_us)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(event.event_type.as_i16())
    .bind(event.iscc_id.to_vec())
    .bind(event.nonce.to_vec())
    .bind(event.datahash.clone())
    .bind(event.pubkey.to_vec())
    .bind(event.iscc_note.clone())
    .bind(event.event_time_us)
    .execute(&mut **conn)
    .await
    .map_err(map_insert_error)?;

    Ok(result.last_insert_rowid())
}

fn map_insert_error(err: sqlx::Error) -> HubError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.message().contains("idx_events_nonce") {
            return HubError::NonceReuse;
        }
    }
    HubError::SequencerError { message: err.to_string() }
}

fn is_lock_contention(message: &str) -> bool {
    message.contains("database is locked") || message.contains("could not acquire write lock")
}

fn datahash_digest(datahash: &str) -> HubResult<Vec<u8>> {
    let raw =
        hex::decode(datahash).map_err(|_| HubError::invalid_hex("datahash", "datahash is not valid hex"))?;
    Ok(raw[2..].to_vec())
}

fn decode_pubkey(multibase: &str) -> HubResult<[u8; 32]> {
    let rest = multibase
        .strip_prefix('z')
        .ok_or_else(|| HubError::InvalidSignature { message: "pubkey is not multibase".into() })?;
    let bytes = bs58::decode(rest)
        .into_vec()
        .map_err(|e| HubError::InvalidSignature { message: e.to_string() })?;
    if bytes.len() != 34 || bytes[0] != 0xed || bytes[1] != 0x01 {
        return Err(HubError::InvalidSignature {
            message: "pubkey is not a multibase Ed25519 key".into(),
        });
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[2..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect, DbConfig};
    use ed25519_dalek::{Signer, SigningKey};
    use iscc_hub_core::iscc_codec;
    use iscc_hub_core::note::NoteSignature;

    fn multibase_pubkey(signing_key: &SigningKey) -> String {
        let mut bytes = vec![0xed, 0x01];
        bytes.extend_from_slice(signing_key.verifying_key().as_bytes());
        format!("z{}", bs58::encode(bytes).into_string())
    }

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
            timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            signature: NoteSignature {
                version: "ISCC-SIG v1.0".into(),
                pubkey: multibase_pubkey(signing_key),
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
    async fn sequences_events_with_increasing_seq_and_timestamp() {
        let pool = connect(&DbConfig::memory()).await.unwrap();
        let sequencer = Sequencer::new(pool, 1, 0);
        let signing_key = SigningKey::from_bytes(&[11u8; 32]);

        let first = sequencer.sequence_create(&signed_note(&signing_key, 1)).await.unwrap();
        let second = sequencer.sequence_create(&signed_note(&signing_key, 2)).await.unwrap();

        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert!(second.event_time_us > first.event_time_us);
    }

    #[tokio::test]
    async fn rejects_a_replayed_nonce() {
        let pool = connect(&DbConfig::memory()).await.unwrap();
        let sequencer = Sequencer::new(pool, 1, 0);
        let signing_key = SigningKey::from_bytes(&[12u8; 32]);
        let note = signed_note(&signing_key, 3);

        sequencer.sequence_create(&note).await.unwrap();
        let err = sequencer.sequence_create(&note).await.unwrap_err();
        assert!(matches!(err, HubError::NonceReuse));
    }

    #[tokio::test]
    async fn delete_reuses_the_create_iscc_id() {
        let pool = connect(&DbConfig::memory()).await.unwrap();
        let sequencer = Sequencer::new(pool, 1, 0);
        let signing_key = SigningKey::from_bytes(&[13u8; 32]);

        let created = sequencer.sequence_create(&signed_note(&signing_key, 4)).await.unwrap();
        let iscc_id = IsccId::from_body(created.iscc_id, 0).unwrap();

        let mut nonce = vec![0u8; 16];
        nonce[0] = 9;
        let mut delete_note = IsccNoteDelete {
            iscc_id: iscc_id.to_string(),
            nonce: hex::encode(nonce),
            timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            signature: NoteSignature {
                version: "ISCC-SIG v1.0".into(),
                pubkey: multibase_pubkey(&signing_key),
                proof: String::new(),
                controller: None,
                keyid: None,
            },
        };
        let mut value = serde_json::to_value(&delete_note).unwrap();
        value.get_mut("signature").and_then(|s| s.as_object_mut()).unwrap().remove("proof");
        let canonical = serde_jcs::to_string(&value).unwrap();
        let signature = signing_key.sign(canonical.as_bytes());
        delete_note.signature.proof = format!("z{}", bs58::encode(signature.to_bytes()).into_string());

        let deleted = sequencer.sequence_delete(&delete_note).await.unwrap();
        assert_eq!(deleted.iscc_id, created.iscc_id);
        assert_eq!(deleted.event_type, EventType::Deleted);
    }
}
