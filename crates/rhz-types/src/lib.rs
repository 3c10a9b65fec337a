//! Foundation types for Rhizome.
//!
//! Rhizome is a content-addressed, append-only entry store with
//! author-authorized mutation and link-based secondary indices. This crate
//! holds the vocabulary every other Rhizome crate speaks.
//!
//! # Key Types
//!
//! - [`Address`]: Content-addressed identifier (BLAKE3 hash)
//! - [`AgentPubKey`]: Public-key identity of a writer; owns one action chain
//! - [`Timestamp`]: Microsecond wall-clock time, monotonic per author
//! - [`Entry`]: Immutable application payload
//! - [`EntryType`]: Named, versioned schema tag supplied by the application
//! - [`LinkType`] / [`LinkTag`]: Typing and secondary filtering for links

pub mod address;
pub mod agent;
pub mod entry;
pub mod error;
pub mod link;
pub mod timestamp;

pub use address::Address;
pub use agent::AgentPubKey;
pub use entry::{Entry, EntryType};
pub use error::TypeError;
pub use link::{LinkTag, LinkType, TagPredicate};
pub use timestamp::Timestamp;
