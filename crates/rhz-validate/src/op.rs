use rhz_chain::Action;
use rhz_links::{Link, LinkReader};
use rhz_store::{EntryReader, Lineage};
use rhz_types::{Address, AgentPubKey, Entry, EntryType, LinkTag, LinkType};

// ---------------------------------------------------------------------------
// ValidationOp
// ---------------------------------------------------------------------------

/// A proposed state transition, bundled with the state it depends on.
///
/// The action is fully formed (sequence, previous action, timestamp) but not
/// yet committed. Lineages and links are resolved by the caller before
/// validation so every stage sees the same snapshot.
#[derive(Clone, Debug)]
pub enum ValidationOp {
    CreateEntry {
        action: Action,
        entry_type: EntryType,
        entry: Entry,
    },
    UpdateEntry {
        action: Action,
        entry_type: EntryType,
        entry: Entry,
        lineage: Lineage,
    },
    DeleteEntry {
        action: Action,
        lineage: Lineage,
    },
    CreateLink {
        action: Action,
        base: Address,
        target: Address,
        link_type: LinkType,
        tag: LinkTag,
    },
    DeleteLink {
        action: Action,
        link: Link,
    },
}

impl ValidationOp {
    pub fn action(&self) -> &Action {
        match self {
            Self::CreateEntry { action, .. }
            | Self::UpdateEntry { action, .. }
            | Self::DeleteEntry { action, .. }
            | Self::CreateLink { action, .. }
            | Self::DeleteLink { action, .. } => action,
        }
    }

    pub fn author(&self) -> &AgentPubKey {
        &self.action().author
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateEntry { .. } => "create_entry",
            Self::UpdateEntry { .. } => "update_entry",
            Self::DeleteEntry { .. } => "delete_entry",
            Self::CreateLink { .. } => "create_link",
            Self::DeleteLink { .. } => "delete_link",
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationResult
// ---------------------------------------------------------------------------

/// Verdict of a validator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    /// Rejected, with a human-readable reason shown to the caller verbatim.
    Invalid(String),
}

impl ValidationResult {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

// ---------------------------------------------------------------------------
// ValidationContext
// ---------------------------------------------------------------------------

/// Read-only view of current state for cross-referential checks.
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    pub entries: &'a dyn EntryReader,
    pub links: &'a dyn LinkReader,
}

impl<'a> ValidationContext<'a> {
    pub fn new(entries: &'a dyn EntryReader, links: &'a dyn LinkReader) -> Self {
        Self { entries, links }
    }

    /// Whether `original` names a live lineage of `entry_type`.
    ///
    /// Read failures count as "no", so a validator built on this fails
    /// closed.
    pub fn is_live_of_type(&self, original: &Address, entry_type: &EntryType) -> bool {
        matches!(
            self.entries.lineage(original),
            Ok(Some(lineage)) if !lineage.is_deleted() && lineage.entry_type == *entry_type
        )
    }

    /// Whether an entry blob with this address is stored.
    pub fn entry_exists(&self, address: &Address) -> bool {
        self.entries.contains_entry(address).unwrap_or(false)
    }
}

impl std::fmt::Debug for ValidationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ValidationContext")
    }
}
