use rhz_crypto::HasherError;
use rhz_types::{Address, AgentPubKey};

/// Errors produced by chain operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// A concurrent append advanced the author's head first. Retriable.
    #[error("chain fork for {author}: attempted seq {attempted_seq}, head is now at seq {head_seq:?}")]
    Fork {
        author: AgentPubKey,
        attempted_seq: u32,
        head_seq: Option<u32>,
    },

    #[error("action {0} is already committed")]
    AlreadyCommitted(Address),

    /// Broken linkage or tampered content. Fatal; never repaired.
    #[error("chain integrity violation for {author} at seq {seq}: {reason}")]
    Integrity {
        author: AgentPubKey,
        seq: u32,
        reason: String,
    },

    #[error("signature on action {0} does not verify")]
    InvalidSignature(Address),

    #[error("signer {signer} cannot write to the chain of {author}")]
    AuthorMismatch {
        author: AgentPubKey,
        signer: AgentPubKey,
    },

    #[error("chain for {0} already exists")]
    ChainExists(AgentPubKey),

    #[error("hashing error: {0}")]
    Hasher(#[from] HasherError),

    #[error("chain lock poisoned")]
    LockPoisoned,
}

impl ChainError {
    /// Whether the caller may re-read the head and retry.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Fork { .. })
    }
}

/// Result alias for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
