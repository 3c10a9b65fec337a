use rhz_chain::ActionRecord;
use rhz_types::{Address, Entry};

use crate::error::StoreResult;
use crate::lineage::{Lineage, Revision};

/// Read side of the entry store.
///
/// All reads return `Ok(None)` (or an empty sequence) for unknown
/// addresses. Absence is a normal outcome, not an error.
pub trait EntryReader: Send + Sync {
    fn get_entry(&self, address: &Address) -> StoreResult<Option<Entry>>;

    fn contains_entry(&self, address: &Address) -> StoreResult<bool> {
        Ok(self.get_entry(address)?.is_some())
    }

    fn lineage(&self, original: &Address) -> StoreResult<Option<Lineage>>;

    /// Current content and authoring action, or `None` if the lineage is
    /// unknown or deleted.
    fn get_latest(&self, original: &Address) -> StoreResult<Option<(Entry, ActionRecord)>>;

    /// Full history, oldest first, ending with the delete marker if any.
    /// Re-reading yields the same sequence.
    fn get_all_revisions(&self, original: &Address) -> StoreResult<Vec<Revision>>;

    /// The lineage and its tip content, read together. `None` if the
    /// lineage is unknown or deleted.
    fn latest_view(&self, original: &Address) -> StoreResult<Option<(Lineage, Entry)>>;

    /// The lineage and its full history, read together.
    fn history_view(&self, original: &Address) -> StoreResult<Option<(Lineage, Vec<Revision>)>>;

    /// Resolve any create, update or delete action to its lineage's
    /// original create action.
    fn find_original(&self, action: &Address) -> StoreResult<Option<Address>>;

    /// Originals of every known lineage, in no particular order.
    fn lineages(&self) -> StoreResult<Vec<Address>>;

    /// Compare `expected` against the lineage tip without writing.
    ///
    /// Fails the same way `record_update` would: `LineageNotFound`,
    /// `LineageDeleted`, or `StaleUpdate`.
    fn check_tip(&self, original: &Address, expected: &Address) -> StoreResult<()>;
}

/// Write side of the entry store.
pub trait EntryWriter: Send + Sync {
    /// Store entry content. Idempotent by address.
    fn put_entry(&self, entry: &Entry) -> StoreResult<Address>;

    /// Start a lineage from a `Create` action.
    ///
    /// Replaying the identical record is a no-op returning the existing
    /// lineage. A different record at the same address is a
    /// `DuplicateCreate`.
    fn record_create(&self, record: &ActionRecord) -> StoreResult<Lineage>;

    /// Append an `Update` action. Its `previous_action` must equal the
    /// lineage tip.
    fn record_update(&self, record: &ActionRecord) -> StoreResult<Lineage>;

    /// Terminate a lineage with a `Delete` action.
    fn record_delete(&self, record: &ActionRecord) -> StoreResult<Lineage>;
}
