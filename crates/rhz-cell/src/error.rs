use rhz_chain::ChainError;
use rhz_links::LinkError;
use rhz_store::StoreError;
use rhz_types::TypeError;
use rhz_validate::ValidationError;
use serde::Serialize;
use thiserror::Error;

/// Broad failure classes, for deciding how to react to a [`CellError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Lost a compare-and-swap race. Re-read and retry.
    Concurrency,
    /// Corrupted state or a caller logic error. Report, do not retry.
    Integrity,
    /// The proposal was rejected. Show the reason to the user.
    Validation,
    Storage,
    Configuration,
}

#[derive(Debug, Error)]
pub enum CellError {
    /// A validator rejected the proposal.
    #[error("invalid: {0}")]
    Invalid(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("snapshot is inconsistent: {0}")]
    Snapshot(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dht journal lock poisoned")]
    LockPoisoned,
}

impl CellError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Invalid(_) | Self::Type(_) => ErrorClass::Validation,
            Self::Validation(e) => match e {
                ValidationError::ValidatorFault { .. } => ErrorClass::Validation,
                ValidationError::Store(_) | ValidationError::Link(_) => ErrorClass::Storage,
                ValidationError::Config(_) => ErrorClass::Configuration,
            },
            Self::Chain(e) => match e {
                ChainError::Fork { .. } => ErrorClass::Concurrency,
                ChainError::Hasher(_) | ChainError::LockPoisoned => ErrorClass::Storage,
                _ => ErrorClass::Integrity,
            },
            Self::Store(e) => match e {
                StoreError::StaleUpdate { .. } => ErrorClass::Concurrency,
                StoreError::EntryTooLarge { .. } => ErrorClass::Validation,
                StoreError::LockPoisoned => ErrorClass::Storage,
                _ => ErrorClass::Integrity,
            },
            Self::Link(e) => match e {
                LinkError::InvalidPath { .. } => ErrorClass::Validation,
                LinkError::LockPoisoned => ErrorClass::Storage,
                _ => ErrorClass::Integrity,
            },
            Self::Config(_) => ErrorClass::Configuration,
            Self::Snapshot(_) => ErrorClass::Integrity,
            Self::Serialization(_) | Self::Io(_) | Self::LockPoisoned => ErrorClass::Storage,
        }
    }

    /// Only concurrency losses are worth retrying.
    pub fn is_retriable(&self) -> bool {
        self.class() == ErrorClass::Concurrency
    }
}

pub type CellResult<T> = Result<T, CellError>;
