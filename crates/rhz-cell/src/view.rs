use std::fmt;

use rhz_chain::{ActionKind, ActionRecord};
use rhz_links::LinkId;
use rhz_store::{Lineage, Revision};
use rhz_types::{Address, AgentPubKey, Entry, EntryType, LinkTag, LinkType, Timestamp};
use serde::Serialize;

use crate::error::CellError;

/// Which kind of action produced a view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionKind {
    Create,
    Update,
    Delete,
}

/// A lineage as seen at one of its actions.
///
/// From [`Cell::get`](crate::Cell::get) this is the live tip. Each step of
/// [`Cell::get_history`](crate::Cell::get_history) is also an `EntryView`; the
/// delete marker carries the last content with `deleted` set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntryView {
    /// Stable identity of the lineage: its create action.
    pub original: Address,
    /// The action this view was taken at.
    pub action: Address,
    pub kind: RevisionKind,
    pub entry_type: EntryType,
    pub latest: Entry,
    pub latest_address: Address,
    pub author: AgentPubKey,
    pub original_author: AgentPubKey,
    pub timestamp: Timestamp,
    /// Position of `action` in the lineage, the create being 0.
    pub revision: usize,
    pub deleted: bool,
}

impl EntryView {
    /// View of the live tip of `lineage`.
    pub(crate) fn tip(lineage: &Lineage, latest: Entry) -> Self {
        let record = lineage.tip_record();
        Self::at(lineage, record, latest, lineage.revision_count() - 1)
    }

    /// One view per revision, oldest first.
    pub(crate) fn history(lineage: &Lineage, revisions: Vec<Revision>) -> Vec<Self> {
        let mut views: Vec<Self> = Vec::with_capacity(revisions.len());
        for (position, revision) in revisions.into_iter().enumerate() {
            let latest = match revision.entry {
                Some(entry) => entry,
                None => match views.last() {
                    Some(previous) => previous.latest.clone(),
                    None => continue,
                },
            };
            views.push(Self::at(lineage, &revision.record, latest, position));
        }
        views
    }

    fn at(lineage: &Lineage, record: &ActionRecord, latest: Entry, revision: usize) -> Self {
        let kind = match record.kind() {
            ActionKind::Create { .. } => RevisionKind::Create,
            ActionKind::Update { .. } => RevisionKind::Update,
            _ => RevisionKind::Delete,
        };
        Self {
            original: lineage.original_action,
            action: record.address,
            kind,
            entry_type: lineage.entry_type.clone(),
            latest_address: record
                .kind()
                .entry_address()
                .or_else(|| lineage.latest_entry_address())
                .unwrap_or_else(Address::null),
            latest,
            author: *record.author(),
            original_author: *lineage.original_author(),
            timestamp: record.action.timestamp,
            revision,
            deleted: kind == RevisionKind::Delete,
        }
    }
}

/// A link to create as part of an index move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLink {
    pub base: Address,
    pub target: Address,
    pub link_type: LinkType,
    pub tag: LinkTag,
}

/// Move an entry between collections: tombstone `from`, then create `to`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexMove {
    pub from: LinkId,
    pub to: NewLink,
}

/// Which half of an index move failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveStep {
    Unlink,
    Link,
}

impl fmt::Display for MoveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlink => f.write_str("unlink"),
            Self::Link => f.write_str("link"),
        }
    }
}

#[derive(Debug)]
pub struct IndexMoveFailure {
    /// Position of the move in the request.
    pub index: usize,
    pub step: MoveStep,
    pub error: CellError,
}

/// Outcome of [`Cell::update_with_index_transition`](crate::Cell::update_with_index_transition).
///
/// The update itself always committed when this is returned. Index moves
/// that failed are listed in `failures`; they are not rolled back.
#[derive(Debug)]
pub struct TransitionReport {
    pub view: EntryView,
    /// Links created by successful moves, in request order.
    pub created: Vec<LinkId>,
    pub failures: Vec<IndexMoveFailure>,
}

impl TransitionReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
