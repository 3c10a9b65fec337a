//! Error types for link operations.

use rhz_types::Address;
use thiserror::Error;

use crate::types::LinkId;

/// Errors that can occur during link operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("link not found: {0}")]
    LinkNotFound(LinkId),

    /// The link already carries a tombstone from a different action.
    #[error("link {link} was already deleted by {deleted_by}")]
    AlreadyDeleted { link: LinkId, deleted_by: Address },

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("action {address} cannot be applied to the link index: {reason}")]
    InvalidAction { address: Address, reason: String },

    #[error("link index lock poisoned")]
    LockPoisoned,
}

/// Convenience type alias for link operations.
pub type LinkResult<T> = std::result::Result<T, LinkError>;
