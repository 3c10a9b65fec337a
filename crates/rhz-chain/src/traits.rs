use rhz_crypto::AgentSigner;
use rhz_types::{Address, AgentPubKey};

use crate::action::{Action, ActionKind, ActionRecord};
use crate::audit::ChainAuditor;
use crate::error::{ChainError, ChainResult};

/// Write boundary for action chains.
///
/// Appending is split into [`prepare`](ChainWriter::prepare), which reads
/// the current head, and [`commit`](ChainWriter::commit), which succeeds
/// only if the head has not moved since. Anything may happen in between
/// (signing, validation), and a lost race surfaces as [`ChainError::Fork`].
pub trait ChainWriter: Send + Sync {
    /// Build the next action for `author` against the current head.
    fn prepare(&self, author: &AgentPubKey, kind: ActionKind) -> ChainResult<Action>;

    /// Compare-and-swap the author's head to `record`.
    fn commit(&self, record: ActionRecord) -> ChainResult<ActionRecord>;

    /// Prepare, sign, and commit in one call.
    fn append(&self, signer: &dyn AgentSigner, kind: ActionKind) -> ChainResult<ActionRecord> {
        let action = self.prepare(&signer.agent(), kind)?;
        self.commit(ActionRecord::sign(action, signer)?)
    }
}

/// Read boundary for action chains.
pub trait ChainReader: Send + Sync {
    /// Latest action address for an author, or `None` if they never wrote.
    fn head_of(&self, author: &AgentPubKey) -> ChainResult<Option<Address>>;

    fn head_record(&self, author: &AgentPubKey) -> ChainResult<Option<ActionRecord>>;

    fn get_action(&self, address: &Address) -> ChainResult<Option<ActionRecord>>;

    /// The author's whole chain, genesis first.
    fn read_chain(&self, author: &AgentPubKey) -> ChainResult<Vec<ActionRecord>>;

    fn authors(&self) -> ChainResult<Vec<AgentPubKey>>;

    fn chain_len(&self, author: &AgentPubKey) -> ChainResult<u32>;

    /// Walk the chain verifying sequence, linkage, hashes, and signatures.
    /// Returns the first violation found.
    fn validate_chain_integrity(&self, author: &AgentPubKey) -> ChainResult<()> {
        let records = self.read_chain(author)?;
        match ChainAuditor::inspect(author, &records).into_iter().next() {
            None => Ok(()),
            Some(violation) => Err(ChainError::Integrity {
                author: *author,
                seq: violation.seq,
                reason: violation.description,
            }),
        }
    }
}
