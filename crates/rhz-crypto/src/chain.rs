use rhz_types::Address;

use crate::hasher::HasherError;

/// Trait for records that participate in an append-only hash chain.
pub trait ChainLink {
    /// The record's stored address.
    fn address(&self) -> Address;
    /// The previous record's address (None for genesis).
    fn prev_address(&self) -> Option<Address>;
    /// Position in the chain, starting at 0.
    fn sequence(&self) -> u32;
    /// Address recomputed from the record's content.
    fn computed_address(&self) -> Result<Address, HasherError>;
}

/// Hash chain integrity verifier.
///
/// Verifies that a sequence of records forms a valid chain: sequence numbers
/// run 0, 1, 2, ... without gaps, each record's previous address matches
/// the address of the record before it, and each stored address is the hash
/// of the record's content.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify a chain of records, oldest first, stopping at the first fault.
    pub fn verify_chain(links: &[impl ChainLink]) -> Result<(), LinkageError> {
        for (i, link) in links.iter().enumerate() {
            Self::verify_link(i, link, i.checked_sub(1).map(|p| &links[p]))?;
        }
        Ok(())
    }

    /// Verify one record against its predecessor (`None` at genesis).
    pub fn verify_link<L: ChainLink>(
        index: usize,
        link: &L,
        prev: Option<&L>,
    ) -> Result<(), LinkageError> {
        let expected_seq = prev.map_or(0, |p| p.sequence().saturating_add(1));
        if link.sequence() != expected_seq {
            return Err(LinkageError::SequenceGap {
                index,
                expected: expected_seq,
                actual: link.sequence(),
            });
        }

        match (prev, link.prev_address()) {
            (None, Some(_)) => return Err(LinkageError::GenesisHasPrev),
            (None, None) => {}
            (Some(_), None) => return Err(LinkageError::MissingPrev { index }),
            (Some(p), Some(addr)) if addr != p.address() => {
                return Err(LinkageError::BrokenLink { index })
            }
            (Some(_), Some(_)) => {}
        }

        let computed = link
            .computed_address()
            .map_err(|_| LinkageError::HashMismatch { index })?;
        if computed != link.address() {
            return Err(LinkageError::HashMismatch { index });
        }
        Ok(())
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinkageError {
    #[error("genesis record has a previous address (should be None)")]
    GenesisHasPrev,

    #[error("sequence gap at index {index}: expected {expected}, got {actual}")]
    SequenceGap {
        index: usize,
        expected: u32,
        actual: u32,
    },

    #[error("broken link at index {index}: previous address does not match")]
    BrokenLink { index: usize },

    #[error("missing previous address at index {index}")]
    MissingPrev { index: usize },

    #[error("hash mismatch at index {index}: computed address differs from stored")]
    HashMismatch { index: usize },
}
