//! # ISCC Hub Core
//!
//! Domain types and pure logic for the ISCC notary hub: the ISCC-ID codec,
//! signed-note validation, and verifiable-credential receipt construction.
//! Nothing in this crate touches storage or the network — the sequencer and
//! HTTP surface live in `iscc-hub-persist`/`iscc-hub-api` and call into
//! these functions.
//!
//! ## Quick Start
//!
//! ```rust
//! use iscc_hub_core::{IsccId, validate::ValidationPolicy};
//!
//! let id = IsccId::from_timestamp(1_746_171_541_264_773, 0, 0).unwrap();
//! assert!(id.to_string().starts_with("ISCC:"));
//! ```

pub mod error;
pub mod iscc_codec;
pub mod iscc_id;
pub mod note;
pub mod receipt;
pub mod validate;

pub use error::{HubError, HubResult};
pub use iscc_id::IsccId;
pub use note::{Event, EventType, IsccDeclaration, IsccNote, IsccNoteDelete, NoteSignature};
pub use receipt::{build_receipt, subject_did, HubKey};
pub use validate::{validate_create, validate_delete, ValidationPolicy};
