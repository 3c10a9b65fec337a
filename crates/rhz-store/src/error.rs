use rhz_types::Address;

/// Errors from entry store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("lineage not found: {0}")]
    LineageNotFound(Address),

    /// The update named a previous action that is no longer the tip.
    #[error("stale update of {original}: expected tip {expected}, actual tip {actual}")]
    StaleUpdate {
        original: Address,
        expected: Address,
        actual: Address,
    },

    #[error("lineage {0} is deleted")]
    LineageDeleted(Address),

    #[error("a different create is already recorded at {0}")]
    DuplicateCreate(Address),

    #[error("entry of {size} bytes exceeds the {max} byte limit")]
    EntryTooLarge { size: usize, max: usize },

    #[error("entry not found: {0}")]
    EntryNotFound(Address),

    #[error("action {address} cannot be recorded here: {reason}")]
    InvalidAction { address: Address, reason: String },

    #[error("entry store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Whether the caller may re-read the lineage and retry.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::StaleUpdate { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
