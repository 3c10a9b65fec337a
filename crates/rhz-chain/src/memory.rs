use std::collections::HashMap;
use std::sync::RwLock;

use rhz_crypto::HashChainVerifier;
use rhz_types::{Address, AgentPubKey, Timestamp};
use tracing::debug;

use crate::action::{Action, ActionKind, ActionRecord};
use crate::error::{ChainError, ChainResult};
use crate::traits::{ChainReader, ChainWriter};

/// In-memory action chains for tests, local demos, and embedding.
///
/// The lock only makes each commit's compare-and-swap atomic. It is never
/// held between `prepare` and `commit`.
#[derive(Default)]
pub struct InMemoryChain {
    inner: RwLock<ChainState>,
}

#[derive(Default)]
struct ChainState {
    chains: HashMap<AgentPubKey, Vec<ActionRecord>>,
    index: HashMap<Address, (AgentPubKey, usize)>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a previously exported chain for an author with no local
    /// history. The chain must pass a full integrity check.
    pub fn restore_chain(&self, records: Vec<ActionRecord>) -> ChainResult<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let author = *first.author();

        HashChainVerifier::verify_chain(&records).map_err(|e| ChainError::Integrity {
            author,
            seq: 0,
            reason: e.to_string(),
        })?;
        if let Some(bad) = records
            .iter()
            .find(|r| r.author() != &author || !r.verify_signature())
        {
            return Err(ChainError::Integrity {
                author,
                seq: bad.seq(),
                reason: "foreign author or bad signature".into(),
            });
        }

        let mut state = self.inner.write().map_err(|_| ChainError::LockPoisoned)?;
        if state.chains.contains_key(&author) {
            return Err(ChainError::ChainExists(author));
        }
        for (i, record) in records.iter().enumerate() {
            state.index.insert(record.address, (author, i));
        }
        debug!(author = %author, actions = records.len(), "chain restored");
        state.chains.insert(author, records);
        Ok(())
    }

    fn read_state(&self) -> ChainResult<std::sync::RwLockReadGuard<'_, ChainState>> {
        self.inner.read().map_err(|_| ChainError::LockPoisoned)
    }
}

impl ChainWriter for InMemoryChain {
    fn prepare(&self, author: &AgentPubKey, kind: ActionKind) -> ChainResult<Action> {
        let state = self.read_state()?;
        let head = state.chains.get(author).and_then(|c| c.last());
        Ok(Action {
            author: *author,
            seq: head.map_or(0, |h| h.seq() + 1),
            timestamp: Timestamp::next_after(head.map(|h| h.action.timestamp)),
            prev_action: head.map(|h| h.address),
            kind,
        })
    }

    fn commit(&self, record: ActionRecord) -> ChainResult<ActionRecord> {
        let author = *record.author();
        let computed = record.action.address()?;
        if computed != record.address {
            return Err(ChainError::Integrity {
                author,
                seq: record.seq(),
                reason: "action address does not match its content".into(),
            });
        }
        if !record.verify_signature() {
            return Err(ChainError::InvalidSignature(record.address));
        }

        let mut state = self.inner.write().map_err(|_| ChainError::LockPoisoned)?;
        if state.index.contains_key(&record.address) {
            return Err(ChainError::AlreadyCommitted(record.address));
        }

        let chain = state.chains.entry(author).or_default();
        let head = chain.last();
        let expected_seq = head.map_or(0, |h| h.seq() + 1);
        let expected_prev = head.map(|h| h.address);
        if record.seq() != expected_seq || record.action.prev_action != expected_prev {
            return Err(ChainError::Fork {
                author,
                attempted_seq: record.seq(),
                head_seq: head.map(ActionRecord::seq),
            });
        }
        if let Some(h) = head {
            if record.action.timestamp < h.action.timestamp {
                return Err(ChainError::Integrity {
                    author,
                    seq: record.seq(),
                    reason: "timestamp precedes previous action".into(),
                });
            }
        }

        chain.push(record.clone());
        let position = chain.len() - 1;
        state.index.insert(record.address, (author, position));
        debug!(
            author = %author,
            seq = record.seq(),
            kind = record.kind().name(),
            address = %record.address.short_hex(),
            "action appended"
        );
        Ok(record)
    }
}

impl ChainReader for InMemoryChain {
    fn head_of(&self, author: &AgentPubKey) -> ChainResult<Option<Address>> {
        Ok(self.head_record(author)?.map(|r| r.address))
    }

    fn head_record(&self, author: &AgentPubKey) -> ChainResult<Option<ActionRecord>> {
        let state = self.read_state()?;
        Ok(state.chains.get(author).and_then(|c| c.last()).cloned())
    }

    fn get_action(&self, address: &Address) -> ChainResult<Option<ActionRecord>> {
        let state = self.read_state()?;
        Ok(state
            .index
            .get(address)
            .and_then(|(author, i)| state.chains.get(author).and_then(|c| c.get(*i)))
            .cloned())
    }

    fn read_chain(&self, author: &AgentPubKey) -> ChainResult<Vec<ActionRecord>> {
        let state = self.read_state()?;
        Ok(state.chains.get(author).cloned().unwrap_or_default())
    }

    fn authors(&self) -> ChainResult<Vec<AgentPubKey>> {
        let state = self.read_state()?;
        let mut authors: Vec<_> = state
            .chains
            .iter()
            .filter(|(_, c)| !c.is_empty())
            .map(|(a, _)| *a)
            .collect();
        authors.sort();
        Ok(authors)
    }

    fn chain_len(&self, author: &AgentPubKey) -> ChainResult<u32> {
        let state = self.read_state()?;
        Ok(state.chains.get(author).map_or(0, |c| c.len() as u32))
    }
}
