//! The [`LinkReader`] / [`LinkWriter`] storage interface.

use rhz_chain::ActionRecord;
use rhz_types::{Address, LinkType, TagPredicate};

use crate::error::LinkResult;
use crate::types::{Link, LinkId, LinkRecord};

/// Read side of the link index.
///
/// Query results are in creation order and re-reading yields the same
/// sequence as long as nothing was written in between.
pub trait LinkReader: Send + Sync {
    /// Look up one link by id, live or tombstoned.
    fn get_link(&self, id: &LinkId) -> LinkResult<Option<LinkRecord>>;

    /// Live links on `base` of `link_type`, optionally filtered by tag.
    fn query_links(
        &self,
        base: &Address,
        link_type: LinkType,
        tag_filter: Option<&TagPredicate>,
    ) -> LinkResult<Vec<Link>> {
        Ok(self
            .query_links_including_deleted(base, link_type, tag_filter)?
            .into_iter()
            .filter(LinkRecord::is_live)
            .map(|r| r.link)
            .collect())
    }

    /// Like [`query_links`](LinkReader::query_links) but tombstoned links
    /// are included along with the action that deleted them.
    fn query_links_including_deleted(
        &self,
        base: &Address,
        link_type: LinkType,
        tag_filter: Option<&TagPredicate>,
    ) -> LinkResult<Vec<LinkRecord>>;

    /// Total number of link records, live or not.
    fn link_count(&self) -> LinkResult<usize>;
}

/// Write side of the link index.
pub trait LinkWriter: Send + Sync {
    /// Record the edge described by a `CreateLink` action.
    ///
    /// Replaying the same action is a no-op returning the same id.
    fn create_link(&self, record: &ActionRecord) -> LinkResult<LinkId>;

    /// Tombstone the link named by a `DeleteLink` action.
    ///
    /// Replaying the same action is a no-op. Deleting an already
    /// tombstoned link with a different action is `AlreadyDeleted`.
    fn delete_link(&self, record: &ActionRecord) -> LinkResult<LinkId>;
}
