//! In-memory [`InMemoryLinkIndex`] for tests and embedding.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

use rhz_chain::{ActionKind, ActionRecord};
use rhz_types::{Address, LinkType, TagPredicate};
use tracing::debug;

use crate::error::{LinkError, LinkResult};
use crate::traits::{LinkReader, LinkWriter};
use crate::types::{Link, LinkId, LinkRecord};

/// In-memory link index.
///
/// Records are kept in one creation-ordered vector with two positional
/// indices on top: by link id and by base address.
#[derive(Default)]
pub struct InMemoryLinkIndex {
    inner: RwLock<IndexState>,
}

#[derive(Default)]
struct IndexState {
    records: Vec<LinkRecord>,
    by_id: HashMap<LinkId, usize>,
    by_base: HashMap<Address, Vec<usize>>,
}

impl InMemoryLinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> LinkResult<RwLockReadGuard<'_, IndexState>> {
        self.inner.read().map_err(|_| LinkError::LockPoisoned)
    }
}

impl std::fmt::Debug for InMemoryLinkIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.read().map(|s| s.records.len()).unwrap_or_default();
        f.debug_struct("InMemoryLinkIndex")
            .field("link_count", &count)
            .finish()
    }
}

impl LinkReader for InMemoryLinkIndex {
    fn get_link(&self, id: &LinkId) -> LinkResult<Option<LinkRecord>> {
        let state = self.read()?;
        Ok(state.by_id.get(id).map(|&i| state.records[i].clone()))
    }

    fn query_links_including_deleted(
        &self,
        base: &Address,
        link_type: LinkType,
        tag_filter: Option<&TagPredicate>,
    ) -> LinkResult<Vec<LinkRecord>> {
        let state = self.read()?;
        let Some(positions) = state.by_base.get(base) else {
            return Ok(Vec::new());
        };
        Ok(positions
            .iter()
            .map(|&i| &state.records[i])
            .filter(|r| r.link.link_type == link_type)
            .filter(|r| tag_filter.map_or(true, |p| p.matches(&r.link.tag)))
            .cloned()
            .collect())
    }

    fn link_count(&self) -> LinkResult<usize> {
        Ok(self.read()?.records.len())
    }
}

impl LinkWriter for InMemoryLinkIndex {
    fn create_link(&self, record: &ActionRecord) -> LinkResult<LinkId> {
        let ActionKind::CreateLink {
            base,
            target,
            link_type,
            tag,
        } = record.kind()
        else {
            return Err(LinkError::InvalidAction {
                address: record.address,
                reason: "expected a create_link action".into(),
            });
        };

        let id = LinkId(record.address);
        let mut state = self.inner.write().map_err(|_| LinkError::LockPoisoned)?;
        if state.by_id.contains_key(&id) {
            return Ok(id);
        }

        let position = state.records.len();
        state.records.push(LinkRecord {
            link: Link {
                id,
                base: *base,
                target: *target,
                link_type: *link_type,
                tag: tag.clone(),
                author: *record.author(),
                timestamp: record.action.timestamp,
            },
            deleted_by: None,
        });
        state.by_id.insert(id, position);
        state.by_base.entry(*base).or_default().push(position);
        debug!(link = %id.0.short_hex(), base = %base.short_hex(), %link_type, "link created");
        Ok(id)
    }

    fn delete_link(&self, record: &ActionRecord) -> LinkResult<LinkId> {
        let ActionKind::DeleteLink {
            link_add_action,
            base,
        } = record.kind()
        else {
            return Err(LinkError::InvalidAction {
                address: record.address,
                reason: "expected a delete_link action".into(),
            });
        };

        let id = LinkId(*link_add_action);
        let mut state = self.inner.write().map_err(|_| LinkError::LockPoisoned)?;
        let position = *state.by_id.get(&id).ok_or(LinkError::LinkNotFound(id))?;
        let entry = &mut state.records[position];
        if entry.link.base != *base {
            return Err(LinkError::InvalidAction {
                address: record.address,
                reason: "base does not match the link being deleted".into(),
            });
        }
        match entry.deleted_by {
            Some(existing) if existing == record.address => return Ok(id),
            Some(existing) => {
                return Err(LinkError::AlreadyDeleted {
                    link: id,
                    deleted_by: existing,
                })
            }
            None => entry.deleted_by = Some(record.address),
        }
        debug!(link = %id.0.short_hex(), by = %record.address.short_hex(), "link tombstoned");
        Ok(id)
    }
}
