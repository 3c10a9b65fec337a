use rhz_chain::ActionRecord;
use rhz_types::{Address, AgentPubKey, Entry, EntryType};
use serde::{Deserialize, Serialize};

/// Revision history of one logical record, anchored by its create action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    pub original_action: Address,
    pub entry_type: EntryType,
    pub create: ActionRecord,
    pub updates: Vec<ActionRecord>,
    pub delete: Option<ActionRecord>,
}

impl Lineage {
    pub(crate) fn new(create: ActionRecord, entry_type: EntryType) -> Self {
        Self {
            original_action: create.address,
            entry_type,
            create,
            updates: Vec::new(),
            delete: None,
        }
    }

    /// Author of the create action.
    pub fn original_author(&self) -> &AgentPubKey {
        self.create.author()
    }

    /// The latest create or update action. Deletes never become the tip.
    pub fn tip_record(&self) -> &ActionRecord {
        self.updates.last().unwrap_or(&self.create)
    }

    pub fn tip(&self) -> Address {
        self.tip_record().address
    }

    /// Entry address written by the tip action.
    pub fn latest_entry_address(&self) -> Option<Address> {
        self.tip_record().kind().entry_address()
    }

    /// Entry address written by the create action.
    pub fn original_entry_address(&self) -> Option<Address> {
        self.create.kind().entry_address()
    }

    pub fn is_deleted(&self) -> bool {
        self.delete.is_some()
    }

    /// Create plus updates. The delete marker is not a revision of content.
    pub fn revision_count(&self) -> usize {
        1 + self.updates.len()
    }

    /// Every action in the lineage, oldest first, delete marker last.
    pub fn actions(&self) -> impl Iterator<Item = &ActionRecord> {
        std::iter::once(&self.create)
            .chain(self.updates.iter())
            .chain(self.delete.iter())
    }
}

/// One step of a lineage's history. `entry` is `None` for the delete marker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub record: ActionRecord,
    pub entry: Option<Entry>,
}

impl Revision {
    pub fn is_delete(&self) -> bool {
        self.entry.is_none()
    }
}
