use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use rhz_chain::{ActionKind, ActionRecord};
use rhz_crypto::ContentHasher;
use rhz_types::{Address, Entry};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::lineage::{Lineage, Revision};
use crate::traits::{EntryReader, EntryWriter};

/// Default cap on a single entry's size.
pub const DEFAULT_MAX_ENTRY_BYTES: usize = 4 * 1024 * 1024;

/// In-memory entry store.
///
/// Intended for tests and embedding. Blobs, lineages and the
/// action-to-lineage index sit behind one `RwLock`, so every lineage
/// transition is a single atomic compare-and-swap.
pub struct InMemoryEntryStore {
    max_entry_bytes: usize,
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    entries: HashMap<Address, Entry>,
    lineages: HashMap<Address, Lineage>,
    originals: HashMap<Address, Address>,
}

impl InMemoryEntryStore {
    pub fn new() -> Self {
        Self::with_max_entry_bytes(DEFAULT_MAX_ENTRY_BYTES)
    }

    pub fn with_max_entry_bytes(max_entry_bytes: usize) -> Self {
        Self {
            max_entry_bytes,
            inner: RwLock::new(StoreState::default()),
        }
    }

    pub fn max_entry_bytes(&self) -> usize {
        self.max_entry_bytes
    }

    /// Number of distinct entry blobs.
    pub fn entry_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.entries.len())
    }

    /// Every stored blob, sorted by address.
    pub fn all_entries(&self) -> StoreResult<Vec<(Address, Entry)>> {
        let state = self.read()?;
        let mut entries: Vec<_> = state
            .entries
            .iter()
            .map(|(a, e)| (*a, e.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for InMemoryEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryEntryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (entries, lineages) = self
            .read()
            .map(|s| (s.entries.len(), s.lineages.len()))
            .unwrap_or_default();
        f.debug_struct("InMemoryEntryStore")
            .field("entry_count", &entries)
            .field("lineage_count", &lineages)
            .finish()
    }
}

fn invalid(record: &ActionRecord, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidAction {
        address: record.address,
        reason: reason.into(),
    }
}

/// Lineage lookup shared by `check_tip` and `record_update`.
fn live_tip<'a>(
    state: &'a StoreState,
    original: &Address,
    expected: &Address,
) -> StoreResult<&'a Lineage> {
    let lineage = state
        .lineages
        .get(original)
        .ok_or(StoreError::LineageNotFound(*original))?;
    if lineage.is_deleted() {
        return Err(StoreError::LineageDeleted(*original));
    }
    let actual = lineage.tip();
    if actual != *expected {
        return Err(StoreError::StaleUpdate {
            original: *original,
            expected: *expected,
            actual,
        });
    }
    Ok(lineage)
}

fn stored(state: &StoreState, address: Address) -> StoreResult<Entry> {
    state
        .entries
        .get(&address)
        .cloned()
        .ok_or(StoreError::EntryNotFound(address))
}

/// Content written by the lineage tip.
fn tip_entry(state: &StoreState, lineage: &Lineage) -> StoreResult<Entry> {
    let tip = lineage.tip_record();
    let address = tip
        .kind()
        .entry_address()
        .ok_or_else(|| invalid(tip, "lineage tip writes no entry"))?;
    stored(state, address)
}

fn revisions(state: &StoreState, lineage: &Lineage) -> StoreResult<Vec<Revision>> {
    lineage
        .actions()
        .map(|record| -> StoreResult<Revision> {
            let entry = match record.kind().entry_address() {
                Some(address) => Some(stored(state, address)?),
                None => None,
            };
            Ok(Revision {
                record: record.clone(),
                entry,
            })
        })
        .collect()
}

impl EntryReader for InMemoryEntryStore {
    fn get_entry(&self, address: &Address) -> StoreResult<Option<Entry>> {
        Ok(self.read()?.entries.get(address).cloned())
    }

    fn lineage(&self, original: &Address) -> StoreResult<Option<Lineage>> {
        Ok(self.read()?.lineages.get(original).cloned())
    }

    fn get_latest(&self, original: &Address) -> StoreResult<Option<(Entry, ActionRecord)>> {
        let state = self.read()?;
        match state.lineages.get(original) {
            Some(lineage) if !lineage.is_deleted() => {
                let entry = tip_entry(&state, lineage)?;
                Ok(Some((entry, lineage.tip_record().clone())))
            }
            _ => Ok(None),
        }
    }

    fn get_all_revisions(&self, original: &Address) -> StoreResult<Vec<Revision>> {
        let state = self.read()?;
        match state.lineages.get(original) {
            Some(lineage) => revisions(&state, lineage),
            None => Ok(Vec::new()),
        }
    }

    fn latest_view(&self, original: &Address) -> StoreResult<Option<(Lineage, Entry)>> {
        let state = self.read()?;
        match state.lineages.get(original) {
            Some(lineage) if !lineage.is_deleted() => {
                let entry = tip_entry(&state, lineage)?;
                Ok(Some((lineage.clone(), entry)))
            }
            _ => Ok(None),
        }
    }

    fn history_view(&self, original: &Address) -> StoreResult<Option<(Lineage, Vec<Revision>)>> {
        let state = self.read()?;
        let Some(lineage) = state.lineages.get(original) else {
            return Ok(None);
        };
        Ok(Some((lineage.clone(), revisions(&state, lineage)?)))
    }

    fn find_original(&self, action: &Address) -> StoreResult<Option<Address>> {
        Ok(self.read()?.originals.get(action).copied())
    }

    fn lineages(&self) -> StoreResult<Vec<Address>> {
        Ok(self.read()?.lineages.keys().copied().collect())
    }

    fn check_tip(&self, original: &Address, expected: &Address) -> StoreResult<()> {
        let state = self.read()?;
        live_tip(&state, original, expected).map(|_| ())
    }
}

impl EntryWriter for InMemoryEntryStore {
    fn put_entry(&self, entry: &Entry) -> StoreResult<Address> {
        if entry.len() > self.max_entry_bytes {
            return Err(StoreError::EntryTooLarge {
                size: entry.len(),
                max: self.max_entry_bytes,
            });
        }
        let address = ContentHasher::ENTRY.hash(entry.as_bytes());
        let mut state = self.write()?;
        state.entries.entry(address).or_insert_with(|| entry.clone());
        Ok(address)
    }

    fn record_create(&self, record: &ActionRecord) -> StoreResult<Lineage> {
        let ActionKind::Create {
            entry_type,
            entry_address,
        } = record.kind()
        else {
            return Err(invalid(record, "expected a create action"));
        };

        let mut state = self.write()?;
        if let Some(existing) = state.lineages.get(&record.address) {
            if existing.create == *record {
                return Ok(existing.clone());
            }
            return Err(StoreError::DuplicateCreate(record.address));
        }
        if state.originals.contains_key(&record.address) {
            return Err(StoreError::DuplicateCreate(record.address));
        }
        if !state.entries.contains_key(entry_address) {
            return Err(StoreError::EntryNotFound(*entry_address));
        }

        let lineage = Lineage::new(record.clone(), entry_type.clone());
        state.originals.insert(record.address, record.address);
        state.lineages.insert(record.address, lineage.clone());
        debug!(original = %record.address.short_hex(), entry_type = %entry_type, "lineage created");
        Ok(lineage)
    }

    fn record_update(&self, record: &ActionRecord) -> StoreResult<Lineage> {
        let ActionKind::Update {
            entry_type,
            original_action,
            original_entry,
            previous_action,
            entry_address,
        } = record.kind()
        else {
            return Err(invalid(record, "expected an update action"));
        };

        let mut state = self.write()?;
        let lineage = live_tip(&state, original_action, previous_action)?;
        if lineage.original_entry_address() != Some(*original_entry) {
            return Err(invalid(record, "original entry does not match the lineage"));
        }
        if lineage.entry_type != *entry_type {
            return Err(invalid(record, "entry type differs from the lineage"));
        }
        if !state.entries.contains_key(entry_address) {
            return Err(StoreError::EntryNotFound(*entry_address));
        }

        state.originals.insert(record.address, *original_action);
        let lineage = state
            .lineages
            .get_mut(original_action)
            .ok_or(StoreError::LineageNotFound(*original_action))?;
        lineage.updates.push(record.clone());
        debug!(
            original = %original_action.short_hex(),
            revision = lineage.revision_count(),
            "lineage advanced"
        );
        Ok(lineage.clone())
    }

    fn record_delete(&self, record: &ActionRecord) -> StoreResult<Lineage> {
        let ActionKind::Delete {
            original_action,
            original_entry,
        } = record.kind()
        else {
            return Err(invalid(record, "expected a delete action"));
        };

        let mut state = self.write()?;
        let lineage = state
            .lineages
            .get_mut(original_action)
            .ok_or(StoreError::LineageNotFound(*original_action))?;
        if lineage.is_deleted() {
            return Err(StoreError::LineageDeleted(*original_action));
        }
        if lineage.original_entry_address() != Some(*original_entry) {
            return Err(invalid(record, "original entry does not match the lineage"));
        }
        lineage.delete = Some(record.clone());
        let lineage = lineage.clone();
        state.originals.insert(record.address, *original_action);
        debug!(original = %original_action.short_hex(), "lineage deleted");
        Ok(lineage)
    }
}
