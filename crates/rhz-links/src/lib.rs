//! Link index for Rhizome.
//!
//! Links are typed, tagged, directed edges from a base address to a target
//! address. They are the only way to build collections ("all active X") and
//! relationships ("X belongs to Y") over content-addressed entries.
//!
//! # Architecture
//!
//! - A link is created by a `CreateLink` action; its [`LinkId`] is that
//!   action's address, so replaying the action is a no-op.
//! - Removing a link appends a `DeleteLink` action. The link record stays
//!   in the index with a tombstone, hidden from live queries.
//! - A [`Path`] is a well-known base address derived from a dotted string
//!   such as `"requests.active"`. Any participant can recompute it.
//!
//! # Modules
//!
//! - [`error`]: Error types for link operations
//! - [`types`]: [`Link`], [`LinkId`], [`LinkRecord`]
//! - [`path`]: [`Path`] anchors and their validation
//! - [`traits`]: [`LinkReader`] / [`LinkWriter`]
//! - [`memory`]: In-memory [`InMemoryLinkIndex`]

pub mod error;
pub mod memory;
pub mod path;
pub mod traits;
pub mod types;

pub use error::{LinkError, LinkResult};
pub use memory::InMemoryLinkIndex;
pub use path::{validate_path, Component, Path, DELIMITER};
pub use traits::{LinkReader, LinkWriter};
pub use types::{Link, LinkId, LinkRecord};
