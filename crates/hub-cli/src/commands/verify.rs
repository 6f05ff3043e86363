//! verify command - replay the event log and check spec invariants
//!
//! Grounded in `scripts/db_management.py`'s consistency checks and spec
//! §4.E's "operator tool ... MAY rebuild the projection": rebuilds the
//! current-state projection from the event log in memory and checks it
//! against the stored `declarations` table, plus the gap-less/monotonic/
//! nonce-uniqueness/authorization/hub-id invariants from spec §8.
//!
//! Usage:
//! ```bash
//! iscc-hub verify --db-name hub.db --hub-id 1
//! ```

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use iscc_hub_core::iscc_id::IsccId;
use iscc_hub_core::note::{EventType, IsccNote, IsccNoteDelete};
use iscc_hub_persist::{connect, fetch_all, DbConfig};

use crate::{print_error, print_success};

/// Arguments for the verify command
#[derive(Args)]
pub struct VerifyArgs {
    /// SQLite database file to replay
    #[arg(long, short = 'd', value_name = "FILE", default_value = "hub.db")]
    db_name: String,

    /// Expected hub id (spec §8 P8); skipped if omitted
    #[arg(long)]
    hub_id: Option<u16>,
}

struct Violation {
    property: &'static str,
    detail: String,
}

#[derive(Clone)]
struct ReplayedDeclaration {
    iscc_code: String,
    datahash: String,
    nonce: String,
    actor: String,
    gateway: Option<String>,
    metahash: Option<String>,
    redacted: bool,
}

/// Run the verify command
pub async fn run(args: VerifyArgs) -> Result<()> {
    println!("{}", "ISCC Hub Log Verification".bold().cyan());
    println!("{}", "=".repeat(40).cyan());
    println!();

    let config = DbConfig::file(&args.db_name);
    let pool = connect(&config).await?;
    let events = fetch_all(&pool).await?;

    println!("  {} {}", "Database:".dimmed(), args.db_name);
    println!("  {} {}", "Events:".dimmed(), events.len());
    println!();

    let mut violations = Vec::new();

    // P1: gap-less seq starting at 1.
    for (i, event) in events.iter().enumerate() {
        let expected = i as i64 + 1;
        if event.seq != expected {
            violations.push(Violation {
                property: "P1 gap-less seq",
                detail: format!("expected seq {expected}, found {}", event.seq),
            });
        }
    }

    // P2: monotonic timestamp across CREATE events only.
    let mut last_create_ts: Option<u64> = None;
    for event in &events {
        if event.event_type != EventType::Created {
            continue;
        }
        let id = IsccId::from_body(event.iscc_id, 0)?;
        let ts = id.timestamp_micros();
        if let Some(prev) = last_create_ts {
            if ts <= prev {
                violations.push(Violation {
                    property: "P2 monotonic timestamp",
                    detail: format!("seq {} timestamp {ts} does not exceed previous CREATE's {prev}", event.seq),
                });
            }
        }
        last_create_ts = Some(ts);
    }

    // P3: nonce uniqueness.
    let mut seen_nonces = HashSet::new();
    for event in &events {
        if !seen_nonces.insert(event.nonce) {
            violations.push(Violation {
                property: "P3 nonce uniqueness",
                detail: format!("nonce {} reused at seq {}", hex::encode(event.nonce), event.seq),
            });
        }
    }

    // P7: every DELETE has a prior CREATE with the same iscc_id and pubkey.
    let mut creates: HashMap<[u8; 8], [u8; 32]> = HashMap::new();
    for event in &events {
        match event.event_type {
            EventType::Created | EventType::Updated => {
                creates.insert(event.iscc_id, event.pubkey);
            }
            EventType::Deleted => match creates.get(&event.iscc_id) {
                Some(pubkey) if *pubkey == event.pubkey => {}
                _ => violations.push(Violation {
                    property: "P7 authorization",
                    detail: format!("DELETE at seq {} has no matching CREATE pubkey", event.seq),
                }),
            },
        }
    }

    // P8: hub-id binding.
    if let Some(expected_hub_id) = args.hub_id {
        for event in &events {
            let id = IsccId::from_body(event.iscc_id, 0)?;
            if id.hub_id() != expected_hub_id {
                violations.push(Violation {
                    property: "P8 hub-id binding",
                    detail: format!("seq {} carries hub id {}, expected {expected_hub_id}", event.seq, id.hub_id()),
                });
            }
        }
    }

    // P4: projection equivalence (modulo updated_at).
    let mut replayed: HashMap<String, ReplayedDeclaration> = HashMap::new();
    for event in &events {
        let iscc_id = IsccId::from_body(event.iscc_id, 0)?.to_string();
        match event.event_type {
            EventType::Created | EventType::Updated => {
                let note: IsccNote = serde_json::from_str(&event.iscc_note)?;
                let actor = format!("z{}", bs58::encode(event.pubkey).into_string());
                replayed.insert(
                    iscc_id,
                    ReplayedDeclaration {
                        iscc_code: note.iscc_code,
                        datahash: note.datahash,
                        nonce: hex::encode(event.nonce),
                        actor,
                        gateway: note.gateway,
                        metahash: note.metahash,
                        redacted: false,
                    },
                );
            }
            EventType::Deleted => {
                let _note: IsccNoteDelete = serde_json::from_str(&event.iscc_note)?;
                if let Some(entry) = replayed.get_mut(&iscc_id) {
                    entry.redacted = true;
                }
            }
        }
    }

    for (iscc_id, expected) in &replayed {
        match iscc_hub_persist::get_declaration(&pool, iscc_id).await? {
            Some(actual) => {
                if actual.iscc_code != expected.iscc_code
                    || actual.datahash != expected.datahash
                    || actual.nonce != expected.nonce
                    || actual.actor != expected.actor
                    || actual.gateway != expected.gateway
                    || actual.metahash != expected.metahash
                    || actual.redacted != expected.redacted
                {
                    violations.push(Violation {
                        property: "P4 projection equivalence",
                        detail: format!("{iscc_id} diverges from the replayed event log"),
                    });
                }
            }
            None => violations.push(Violation {
                property: "P4 projection equivalence",
                detail: format!("{iscc_id} present in event log but missing from declarations"),
            }),
        }
    }

    if violations.is_empty() {
        print_success("all checked invariants hold (P1, P2, P3, P4, P7, P8)");
        Ok(())
    } else {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![Cell::new("Property").fg(Color::Cyan), Cell::new("Detail").fg(Color::Cyan)]);
        for v in &violations {
            table.add_row(vec![Cell::new(v.property).fg(Color::Red), Cell::new(&v.detail)]);
        }
        println!("{table}");
        print_error(&format!("{} invariant violation(s) found", violations.len()));
        std::process::exit(1);
    }
}
