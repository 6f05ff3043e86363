//! # ISCC Hub Persist
//!
//! SQLite-backed storage for the notary hub: connection setup (`db`), the
//! single-writer sequencer that appends to the event log (`sequencer`), the
//! current-state projection and duplicate detector built from it
//! (`projection`), and raw log reads for operator tooling (`events`).

pub mod db;
pub mod events;
pub mod projection;
pub mod sequencer;

pub use db::{connect, DbConfig, DbError};
pub use events::fetch_all;
pub use projection::{apply_event, find_duplicate, get_declaration, DuplicateMatch};
pub use sequencer::Sequencer;
