use std::sync::Arc;

use rhz_chain::{Action, ActionKind, ActionRecord};
use rhz_crypto::{AgentSigner, ContentHasher};
use rhz_links::{Link, LinkError, LinkId, Path};
use rhz_store::{Lineage, StoreError};
use rhz_types::{Address, AgentPubKey, Entry, EntryType, LinkTag, LinkType, TagPredicate};
use rhz_validate::{ValidationEngine, ValidationOp, ValidationResult};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::dht::{Committed, Dht};
use crate::error::{CellError, CellResult};
use crate::signal::Signal;
use crate::view::{EntryView, IndexMove, IndexMoveFailure, MoveStep, TransitionReport};

/// One agent's handle on a [`Dht`].
///
/// Every write is prepared against the agent's chain head, validated,
/// signed, and then committed. Concurrency losses (`ChainError::Fork`,
/// `StoreError::StaleUpdate`) are returned to the caller as-is; wrap calls
/// in a [`RetryPolicy`](crate::RetryPolicy) to retry them.
pub struct Cell {
    signer: Arc<dyn AgentSigner>,
    dht: Arc<Dht>,
    engine: Arc<ValidationEngine>,
}

impl Cell {
    pub fn new(signer: Arc<dyn AgentSigner>, dht: Arc<Dht>, engine: Arc<ValidationEngine>) -> Self {
        Self {
            signer,
            dht,
            engine,
        }
    }

    /// The agent this cell writes as.
    pub fn agent(&self) -> AgentPubKey {
        self.signer.agent()
    }

    pub fn dht(&self) -> &Arc<Dht> {
        &self.dht
    }

    pub fn engine(&self) -> &ValidationEngine {
        &self.engine
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.dht.subscribe()
    }

    // ---- Entry writes ----

    pub fn create(&self, entry_type: EntryType, entry: Entry) -> CellResult<EntryView> {
        let kind = ActionKind::Create {
            entry_type: entry_type.clone(),
            entry_address: ContentHasher::ENTRY.hash(entry.as_bytes()),
        };
        let (record, committed) =
            self.propose(kind, Some(&entry), |action| ValidationOp::CreateEntry {
                action,
                entry_type,
                entry: entry.clone(),
            })?;
        Ok(EntryView::tip(&into_lineage(&record, committed)?, entry))
    }

    /// Append a revision to the lineage at `original`.
    ///
    /// `previous` must be the tip the caller last read (the original itself
    /// for the first update). If someone else advanced the lineage since,
    /// this fails with `StoreError::StaleUpdate`.
    pub fn update(
        &self,
        original: Address,
        previous: Address,
        entry_type: EntryType,
        entry: Entry,
    ) -> CellResult<EntryView> {
        let lineage = self.live_lineage(&original)?;
        self.dht.entries().check_tip(&original, &previous)?;

        let kind = ActionKind::Update {
            entry_type: entry_type.clone(),
            original_action: original,
            original_entry: lineage.original_entry_address().unwrap_or_else(Address::null),
            previous_action: previous,
            entry_address: ContentHasher::ENTRY.hash(entry.as_bytes()),
        };
        let (record, committed) =
            self.propose(kind, Some(&entry), |action| ValidationOp::UpdateEntry {
                action,
                entry_type,
                entry: entry.clone(),
                lineage,
            })?;
        Ok(EntryView::tip(&into_lineage(&record, committed)?, entry))
    }

    /// Terminate the lineage at `original`. Returns the delete action.
    pub fn delete(&self, original: Address) -> CellResult<Address> {
        let lineage = self.live_lineage(&original)?;
        let kind = ActionKind::Delete {
            original_action: original,
            original_entry: lineage.original_entry_address().unwrap_or_else(Address::null),
        };
        let (record, _) =
            self.propose(kind, None, |action| ValidationOp::DeleteEntry { action, lineage })?;
        Ok(record.address)
    }

    // ---- Entry reads ----

    /// Live tip of the lineage, or `None` if it is unknown or deleted.
    pub fn get(&self, original: &Address) -> CellResult<Option<EntryView>> {
        Ok(self
            .dht
            .entries()
            .latest_view(original)?
            .map(|(lineage, entry)| EntryView::tip(&lineage, entry)))
    }

    /// Every revision, oldest first, ending with the delete marker if any.
    /// Empty for an unknown lineage.
    pub fn get_history(&self, original: &Address) -> CellResult<Vec<EntryView>> {
        Ok(match self.dht.entries().history_view(original)? {
            Some((lineage, revisions)) => EntryView::history(&lineage, revisions),
            None => Vec::new(),
        })
    }

    /// Resolve any create, update or delete action to its lineage's
    /// original.
    pub fn find_original(&self, action: &Address) -> CellResult<Option<Address>> {
        Ok(self.dht.entries().find_original(action)?)
    }

    // ---- Links ----

    pub fn link(
        &self,
        base: Address,
        target: Address,
        link_type: LinkType,
        tag: LinkTag,
    ) -> CellResult<LinkId> {
        let kind = ActionKind::CreateLink {
            base,
            target,
            link_type,
            tag: tag.clone(),
        };
        let (record, _) = self.propose(kind, None, |action| ValidationOp::CreateLink {
            action,
            base,
            target,
            link_type,
            tag,
        })?;
        Ok(LinkId(record.address))
    }

    /// Tombstone a live link.
    pub fn unlink(&self, id: LinkId) -> CellResult<()> {
        let record = self
            .dht
            .links()
            .get_link(&id)?
            .ok_or(LinkError::LinkNotFound(id))?;
        if let Some(deleted_by) = record.deleted_by {
            return Err(LinkError::AlreadyDeleted {
                link: id,
                deleted_by,
            }
            .into());
        }
        let link = record.link;
        let kind = ActionKind::DeleteLink {
            link_add_action: id.address(),
            base: link.base,
        };
        self.propose(kind, None, |action| ValidationOp::DeleteLink { action, link })?;
        Ok(())
    }

    /// Tombstone every live link of `link_type` on `base`. Returns the ids
    /// removed, in creation order.
    pub fn delete_links(&self, base: &Address, link_type: LinkType) -> CellResult<Vec<LinkId>> {
        let links = self.dht.links().query_links(base, link_type, None)?;
        let mut removed = Vec::with_capacity(links.len());
        for link in links {
            self.unlink(link.id)?;
            removed.push(link.id);
        }
        Ok(removed)
    }

    /// Live links on `base`, for callers whose targets are not lineages.
    pub fn get_links(
        &self,
        base: &Address,
        link_type: LinkType,
        tag_filter: Option<&TagPredicate>,
    ) -> CellResult<Vec<Link>> {
        Ok(self.dht.links().query_links(base, link_type, tag_filter)?)
    }

    /// Live entries linked from `path`, in link creation order.
    ///
    /// Targets that are deleted, unknown, or not lineages at all are
    /// skipped: a stale index shortens the list, it does not fail it.
    pub fn list(
        &self,
        path: &Path,
        link_type: LinkType,
        tag_filter: Option<&TagPredicate>,
    ) -> CellResult<Vec<EntryView>> {
        let links = self
            .dht
            .links()
            .query_links(&path.address(), link_type, tag_filter)?;
        let mut views = Vec::with_capacity(links.len());
        for link in links {
            match self.get(&link.target)? {
                Some(view) => views.push(view),
                None => debug!(path = %path, target = %link.target.short_hex(), "skipping dead index target"),
            }
        }
        Ok(views)
    }

    // ---- Compound ----

    /// Update an entry, then move it between indices.
    ///
    /// If the update fails nothing else is attempted. Once it commits, each
    /// move tombstones its old link and creates its new one; failures there
    /// are collected in the report and the update stays committed.
    pub fn update_with_index_transition(
        &self,
        original: Address,
        previous: Address,
        entry_type: EntryType,
        entry: Entry,
        moves: &[IndexMove],
    ) -> CellResult<TransitionReport> {
        let view = self.update(original, previous, entry_type, entry)?;

        let mut created = Vec::new();
        let mut failures = Vec::new();
        for (index, step) in moves.iter().enumerate() {
            if let Err(error) = self.unlink(step.from) {
                warn!(original = %original.short_hex(), index, %error, "index move: unlink failed");
                failures.push(IndexMoveFailure {
                    index,
                    step: MoveStep::Unlink,
                    error,
                });
            }
            let to = &step.to;
            match self.link(to.base, to.target, to.link_type, to.tag.clone()) {
                Ok(id) => created.push(id),
                Err(error) => {
                    warn!(original = %original.short_hex(), index, %error, "index move: link failed");
                    failures.push(IndexMoveFailure {
                        index,
                        step: MoveStep::Link,
                        error,
                    });
                }
            }
        }

        Ok(TransitionReport {
            view,
            created,
            failures,
        })
    }

    // ---- Internals ----

    /// Prepare, validate, sign, and commit one action.
    fn propose<F>(
        &self,
        kind: ActionKind,
        entry: Option<&Entry>,
        op: F,
    ) -> CellResult<(ActionRecord, Committed)>
    where
        F: FnOnce(Action) -> ValidationOp,
    {
        let action = self.dht.prepare(&self.agent(), kind)?;
        let op = op(action);
        let report = self.engine.validate(&op, &self.dht.context())?;
        if let ValidationResult::Invalid(reason) = report.result {
            return Err(CellError::Invalid(reason));
        }
        let record = ActionRecord::sign(op.action().clone(), self.signer.as_ref())?;
        let committed = self.dht.commit(record.clone(), entry)?;
        Ok((record, committed))
    }

    /// The lineage at `original`, which must be a true original and not
    /// deleted.
    fn live_lineage(&self, original: &Address) -> CellResult<Lineage> {
        let lineage = self
            .dht
            .entries()
            .lineage(original)?
            .ok_or(StoreError::LineageNotFound(*original))?;
        if lineage.is_deleted() {
            return Err(StoreError::LineageDeleted(*original).into());
        }
        Ok(lineage)
    }
}

fn into_lineage(record: &ActionRecord, committed: Committed) -> CellResult<Lineage> {
    match committed {
        Committed::Lineage(lineage) => Ok(lineage),
        Committed::Link(_) => Err(StoreError::InvalidAction {
            address: record.address,
            reason: "action did not produce a lineage".into(),
        }
        .into()),
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("agent", &self.agent())
            .field("dht", &self.dht)
            .finish()
    }
}
