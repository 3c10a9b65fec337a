use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rhz_chain::{
    Action, ActionKind, ActionRecord, AuditReport, ChainAuditor, ChainReader, ChainWriter, InMemoryChain,
};
use rhz_links::{InMemoryLinkIndex, LinkError, LinkId, LinkReader, LinkWriter};
use rhz_store::{EntryReader, EntryWriter, InMemoryEntryStore, Lineage, StoreError};
use rhz_types::{Address, AgentPubKey, Entry};
use rhz_validate::ValidationContext;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::CellConfig;
use crate::error::{CellError, CellResult};
use crate::signal::Signal;

/// Version tag written into every snapshot.
pub const SNAPSHOT_FORMAT: u32 = 1;

/// Everything needed to rebuild a [`Dht`]: entry blobs, every author's
/// signed chain, and the order in which actions were committed.
///
/// Lineages and links are not stored. They are re-derived by replaying the
/// chains in commit order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhtSnapshot {
    pub format: u32,
    pub entries: Vec<Entry>,
    pub chains: Vec<Vec<ActionRecord>>,
    pub order: Vec<Address>,
}

/// What a committed action produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Committed {
    Lineage(Lineage),
    Link(LinkId),
}

/// Shared state for every cell in the process: action chains, the entry
/// store, and the link index.
///
/// Commits are serialized by the journal lock so the tip checks, the chain
/// compare-and-swap, and the index update for one action happen together.
/// Readers never take that lock.
pub struct Dht {
    chain: InMemoryChain,
    entries: InMemoryEntryStore,
    links: InMemoryLinkIndex,
    journal: Mutex<Vec<Address>>,
    signals: broadcast::Sender<Signal>,
}

impl Dht {
    pub fn new(config: &CellConfig) -> Self {
        let (signals, _) = broadcast::channel(config.signal_capacity.max(1));
        Self {
            chain: InMemoryChain::new(),
            entries: InMemoryEntryStore::with_max_entry_bytes(config.max_entry_bytes),
            links: InMemoryLinkIndex::new(),
            journal: Mutex::new(Vec::new()),
            signals,
        }
    }

    pub fn chain(&self) -> &dyn ChainReader {
        &self.chain
    }

    pub fn entries(&self) -> &dyn EntryReader {
        &self.entries
    }

    pub fn links(&self) -> &dyn LinkReader {
        &self.links
    }

    pub fn context(&self) -> ValidationContext<'_> {
        ValidationContext::new(&self.entries, &self.links)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.signals.subscribe()
    }

    /// Number of actions committed, across all authors.
    pub fn action_count(&self) -> CellResult<usize> {
        Ok(self.journal()?.len())
    }

    /// Full integrity audit of every author's chain.
    pub fn audit(&self) -> CellResult<Vec<AuditReport>> {
        Ok(ChainAuditor::audit_all(&self.chain)?)
    }

    // ---- Commit ----

    /// Build `author`'s next action against their current chain head.
    pub(crate) fn prepare(&self, author: &AgentPubKey, kind: ActionKind) -> CellResult<Action> {
        Ok(self.chain.prepare(author, kind)?)
    }

    /// Commit a signed, validated action and apply it to the store and index.
    ///
    /// Lineage tips and link tombstones are checked again under the journal
    /// lock, so a proposal that went stale after validation fails here with
    /// the same error the store would give, before anything is written to
    /// the chain.
    pub(crate) fn commit(&self, record: ActionRecord, entry: Option<&Entry>) -> CellResult<Committed> {
        let mut journal = self.journal()?;

        match record.kind() {
            ActionKind::Create { entry_address, .. } => {
                self.store_entry(&record, entry, entry_address)?;
            }
            ActionKind::Update {
                original_action,
                previous_action,
                entry_address,
                ..
            } => {
                self.entries.check_tip(original_action, previous_action)?;
                self.store_entry(&record, entry, entry_address)?;
            }
            ActionKind::Delete {
                original_action, ..
            } => match self.entries.lineage(original_action)? {
                None => return Err(StoreError::LineageNotFound(*original_action).into()),
                Some(l) if l.is_deleted() => {
                    return Err(StoreError::LineageDeleted(*original_action).into())
                }
                Some(_) => {}
            },
            ActionKind::CreateLink { .. } => {}
            ActionKind::DeleteLink {
                link_add_action, ..
            } => {
                let id = LinkId(*link_add_action);
                match self.links.get_link(&id)? {
                    None => return Err(LinkError::LinkNotFound(id).into()),
                    Some(existing) => {
                        if let Some(deleted_by) = existing.deleted_by {
                            return Err(LinkError::AlreadyDeleted {
                                link: id,
                                deleted_by,
                            }
                            .into());
                        }
                    }
                }
            }
        }

        let record = self.chain.commit(record)?;
        journal.push(record.address);
        let committed = self.apply(&record).inspect_err(|e| {
            warn!(action = %record.address.short_hex(), error = %e, "committed action did not apply");
        })?;
        drop(journal);

        debug!(
            author = %record.author(),
            seq = record.seq(),
            kind = record.kind().name(),
            action = %record.address.short_hex(),
            "action committed"
        );
        self.emit(&record)?;
        Ok(committed)
    }

    fn store_entry(
        &self,
        record: &ActionRecord,
        entry: Option<&Entry>,
        declared: &Address,
    ) -> CellResult<()> {
        let entry = entry.ok_or(StoreError::EntryNotFound(*declared))?;
        let stored = self.entries.put_entry(entry)?;
        if stored != *declared {
            return Err(StoreError::InvalidAction {
                address: record.address,
                reason: "entry content does not match its address".into(),
            }
            .into());
        }
        Ok(())
    }

    /// Apply a committed action to the entry store or link index.
    fn apply(&self, record: &ActionRecord) -> CellResult<Committed> {
        Ok(match record.kind() {
            ActionKind::Create { .. } => Committed::Lineage(self.entries.record_create(record)?),
            ActionKind::Update { .. } => Committed::Lineage(self.entries.record_update(record)?),
            ActionKind::Delete { .. } => Committed::Lineage(self.entries.record_delete(record)?),
            ActionKind::CreateLink { .. } => Committed::Link(self.links.create_link(record)?),
            ActionKind::DeleteLink { .. } => Committed::Link(self.links.delete_link(record)?),
        })
    }

    fn emit(&self, record: &ActionRecord) -> CellResult<()> {
        let author = *record.author();
        let signal = match record.kind() {
            ActionKind::Create { .. } => Signal::EntryCreated {
                original: record.address,
                author,
            },
            ActionKind::Update {
                original_action,
                previous_action,
                ..
            } => Signal::EntryUpdated {
                original: *original_action,
                action: record.address,
                previous: *previous_action,
                author,
            },
            ActionKind::Delete {
                original_action, ..
            } => Signal::EntryDeleted {
                original: *original_action,
                action: record.address,
                author,
            },
            ActionKind::CreateLink { .. } => {
                let id = LinkId(record.address);
                let link = self
                    .links
                    .get_link(&id)?
                    .ok_or(LinkError::LinkNotFound(id))?
                    .link;
                Signal::LinkCreated { link }
            }
            ActionKind::DeleteLink {
                link_add_action, ..
            } => Signal::LinkDeleted {
                link: LinkId(*link_add_action),
                action: record.address,
                author,
            },
        };
        // No subscribers is not an error.
        let _ = self.signals.send(signal);
        Ok(())
    }

    fn journal(&self) -> CellResult<MutexGuard<'_, Vec<Address>>> {
        self.journal.lock().map_err(|_| CellError::LockPoisoned)
    }

    // ---- Persistence ----

    pub fn snapshot(&self) -> CellResult<DhtSnapshot> {
        // Hold the journal so no commit lands between the three reads.
        let journal = self.journal()?;
        let mut authors = self.chain.authors()?;
        authors.sort();
        let chains = authors
            .iter()
            .map(|a| self.chain.read_chain(a))
            .collect::<Result<Vec<_>, _>>()?;
        let mut entries = self.entries.all_entries()?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(DhtSnapshot {
            format: SNAPSHOT_FORMAT,
            entries: entries.into_iter().map(|(_, e)| e).collect(),
            chains,
            order: journal.clone(),
        })
    }

    /// Rebuild a DHT by verifying every chain and replaying its actions into
    /// the entry store and link index in commit order.
    pub fn from_snapshot(snapshot: DhtSnapshot, config: &CellConfig) -> CellResult<Self> {
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(CellError::Snapshot(format!(
                "unsupported format {}, expected {SNAPSHOT_FORMAT}",
                snapshot.format
            )));
        }
        let dht = Self::new(config);
        for entry in &snapshot.entries {
            dht.entries.put_entry(entry)?;
        }

        let total: usize = snapshot.chains.iter().map(Vec::len).sum();
        if total != snapshot.order.len() {
            return Err(CellError::Snapshot(format!(
                "order lists {} actions but chains hold {total}",
                snapshot.order.len()
            )));
        }
        for chain in snapshot.chains {
            dht.chain.restore_chain(chain)?;
        }

        let mut seen = HashSet::with_capacity(total);
        let mut next_seq: HashMap<AgentPubKey, u32> = HashMap::new();
        for address in &snapshot.order {
            if !seen.insert(*address) {
                return Err(CellError::Snapshot(format!("action {address} listed twice")));
            }
            let record = dht
                .chain
                .get_action(address)?
                .ok_or_else(|| CellError::Snapshot(format!("action {address} is in no chain")))?;
            let expected = next_seq.entry(*record.author()).or_insert(0);
            if record.seq() != *expected {
                return Err(CellError::Snapshot(format!(
                    "action {address} replayed out of chain order"
                )));
            }
            *expected += 1;
            dht.apply(&record)?;
        }

        *dht.journal()? = snapshot.order;
        info!(
            actions = total,
            entries = snapshot.entries.len(),
            "dht rebuilt from snapshot"
        );
        Ok(dht)
    }

    /// Write a JSON snapshot, replacing `path` atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> CellResult<()> {
        let path = path.as_ref();
        let snapshot = self.snapshot()?;
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| CellError::Serialization(e.to_string()))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.persist(path).map_err(|e| CellError::Io(e.error))?;
        debug!(path = %path.display(), actions = snapshot.order.len(), "snapshot saved");
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P, config: &CellConfig) -> CellResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: DhtSnapshot = serde_json::from_str(&content)
            .map_err(|e| CellError::Serialization(e.to_string()))?;
        Self::from_snapshot(snapshot, config)
    }
}

impl Default for Dht {
    fn default() -> Self {
        Self::new(&CellConfig::default())
    }
}

impl std::fmt::Debug for Dht {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dht")
            .field("actions", &self.journal.lock().map(|j| j.len()).unwrap_or(0))
            .field("entries", &self.entries.entry_count().unwrap_or(0))
            .finish()
    }
}
