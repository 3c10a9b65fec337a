//! Content-addressed entry storage for Rhizome.
//!
//! Entries are immutable blobs keyed by their ENTRY-domain hash. On top of
//! the blobs the store tracks revision lineages: one create action, any
//! number of updates, and at most one terminal delete.
//!
//! # Design Rules
//!
//! 1. Entries are immutable once written; `put_entry` is idempotent.
//! 2. An update must name the lineage's current tip. Losing that race is a
//!    `StaleUpdate`, which the caller resolves by re-reading and retrying.
//! 3. A deleted lineage accepts no further updates or deletes.
//! 4. The store checks lineage shape only. Authorization and content rules
//!    belong to validation.

pub mod error;
pub mod lineage;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use lineage::{Lineage, Revision};
pub use memory::{InMemoryEntryStore, DEFAULT_MAX_ENTRY_BYTES};
pub use traits::{EntryReader, EntryWriter};
