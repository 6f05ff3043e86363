//! Raw event-log reads that don't belong to the sequencer's write path.
//! Used by the operator CLI's `verify` command to replay the log and check
//! spec §8's testable properties (P1 gap-less, P2 monotonic, P3 unique
//! nonce, P4 projection equivalence, P7 authorization, P8 hub-id binding).

use sqlx::{Row, SqlitePool};

use iscc_hub_core::error::{HubError, HubResult};
use iscc_hub_core::note::{Event, EventType};

/// Every event row in `seq` order, oldest first.
pub async fn fetch_all(pool: &SqlitePool) -> HubResult<Vec<Event>> {
    let rows = sqlx::query(
        "SELECT seq, event_type, iscc_id, nonce, datahash, pubkey, iscc_note, event_time_us
         FROM events ORDER BY seq ASC",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| HubError::SequencerError { message: e.to_string() })?;

    rows.into_iter().map(row_to_event).collect()
}

fn row_to_event(row: sqlx::sqlite::SqliteRow) -> HubResult<Event> {
    let map_err = |e: sqlx::Error| HubError::SequencerError { message: e.to_string() };

    let event_type_raw: i64 = row.try_get("event_type").map_err(map_err)?;
    let event_type = EventType::from_i16(event_type_raw as i16).ok_or_else(|| HubError::SequencerError {
        message: format!("unknown event_type {event_type_raw} in stored event"),
    })?;

    let iscc_id_bytes: Vec<u8> = row.try_get("iscc_id").map_err(map_err)?;
    let iscc_id: [u8; 8] = iscc_id_bytes
        .try_into()
        .map_err(|_| HubError::SequencerError { message: "stored iscc_id is not 8 bytes".into() })?;

    let nonce_bytes: Vec<u8> = row.try_get("nonce").map_err(map_err)?;
    let nonce: [u8; 16] = nonce_bytes
        .try_into()
        .map_err(|_| HubError::SequencerError { message: "stored nonce is not 16 bytes".into() })?;

    let pubkey_bytes: Vec<u8> = row.try_get("pubkey").map_err(map_err)?;
    let pubkey: [u8; 32] = pubkey_bytes
        .try_into()
        .map_err(|_| HubError::SequencerError { message: "stored pubkey is not 32 bytes".into() })?;

    Ok(Event {
        seq: row.try_get("seq").map_err(map_err)?,
        event_type,
        iscc_id,
        nonce,
        datahash: row.try_get("datahash").map_err(map_err)?,
        pubkey,
        iscc_note: row.try_get("iscc_note").map_err(map_err)?,
        event_time_us: row.try_get("event_time_us").map_err(map_err)?,
    })
}
