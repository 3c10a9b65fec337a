//! High-level API for Rhizome.
//!
//! A [`Dht`] holds the shared state: per-agent action chains, the entry
//! store, and the link index. A [`Cell`] is one agent's handle on it and
//! the entry point for application code:
//!
//! - entry CRUD: [`Cell::create`], [`Cell::update`], [`Cell::delete`],
//!   [`Cell::get`], [`Cell::get_history`]
//! - index CRUD: [`Cell::link`], [`Cell::unlink`], [`Cell::list`]
//! - the compound [`Cell::update_with_index_transition`]
//!
//! Every write is validated before it is committed. Concurrency losses
//! come back as retriable [`CellError`]s; [`RetryPolicy`] re-runs an
//! operation for callers that want that.

pub mod cell;
pub mod config;
pub mod dht;
pub mod error;
pub mod retry;
pub mod signal;
pub mod view;

pub use cell::Cell;
pub use config::{CellConfig, DEFAULT_SIGNAL_CAPACITY};
pub use dht::{Committed, Dht, DhtSnapshot, SNAPSHOT_FORMAT};
pub use error::{CellError, CellResult, ErrorClass};
pub use retry::{Backoff, RetryPolicy};
pub use signal::Signal;
pub use view::{EntryView, IndexMove, IndexMoveFailure, MoveStep, NewLink, RevisionKind, TransitionReport};

// Re-export key types
pub use rhz_crypto::{AgentKey, AgentSigner};
pub use rhz_links::{Link, LinkId, Path};
pub use rhz_types::{Address, AgentPubKey, Entry, EntryType, LinkTag, LinkType, TagPredicate};
pub use rhz_validate::{
    MutationPolicy, ValidationContext, ValidationEngine, ValidationResult, ValidatorRegistry,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    use rhz_chain::ChainError;
    use rhz_crypto::ContentHasher;
    use rhz_links::LinkError;
    use rhz_store::StoreError;
    use rhz_validate::ValidationError;
    use serde_json::{json, Value};

    const INDEX: LinkType = LinkType(0);
    const AUTHORED: LinkType = LinkType(1);
    const FRAGILE_LINK: LinkType = LinkType(2);

    fn task() -> EntryType {
        EntryType::new("T", 1)
    }

    fn wiki() -> EntryType {
        EntryType::new("wiki", 1)
    }

    fn crash() -> EntryType {
        EntryType::new("crash", 1)
    }

    /// Accepts anything except content carrying `"boom": true`, on which
    /// its validator panics.
    fn fragile() -> EntryType {
        EntryType::new("fragile", 1)
    }

    fn registry() -> ValidatorRegistry {
        let mut registry = ValidatorRegistry::new();
        registry
            .register_validator(task(), |_, entry, _| {
                match entry.decode::<Value>() {
                    Ok(v) if v["name"].as_str().is_some_and(|n| !n.is_empty()) => {
                        ValidationResult::Valid
                    }
                    _ => ValidationResult::invalid("name must not be empty"),
                }
            })
            .unwrap()
            .register_entry_type(wiki(), MutationPolicy::AnyAgent, |_, _, _| {
                ValidationResult::Valid
            })
            .unwrap()
            .register_validator(crash(), |_, _, _| panic!("validator bug"))
            .unwrap()
            .register_link_type(INDEX, "index", MutationPolicy::AnyAgent, |_, _, _, _, _| {
                ValidationResult::Valid
            })
            .unwrap()
            .register_link_validator(AUTHORED, |_, _, _, _, _| ValidationResult::Valid)
            .unwrap()
            .register_validator(fragile(), |_, entry, _| {
                if entry.decode::<Value>().is_ok_and(|v| v["boom"] == json!(true)) {
                    panic!("fragile validator bug");
                }
                ValidationResult::Valid
            })
            .unwrap()
            .register_link_validator(FRAGILE_LINK, |_, _, _, _, _| panic!("link validator bug"))
            .unwrap();
        registry
    }

    struct Net {
        dht: Arc<Dht>,
        engine: Arc<ValidationEngine>,
    }

    impl Net {
        fn new() -> Self {
            Self::with_config(&CellConfig::default())
        }

        fn with_config(config: &CellConfig) -> Self {
            Self::over(Arc::new(Dht::new(config)), config)
        }

        fn over(dht: Arc<Dht>, config: &CellConfig) -> Self {
            Self {
                dht,
                engine: Arc::new(ValidationEngine::with_default_stages(
                    config.validation(),
                    registry(),
                )),
            }
        }

        fn cell(&self, key: &AgentKey) -> Cell {
            Cell::new(Arc::new(key.clone()), self.dht.clone(), self.engine.clone())
        }

        fn agent(&self) -> Cell {
            self.cell(&AgentKey::generate())
        }
    }

    fn entry(value: Value) -> Entry {
        Entry::from_json(&value).unwrap()
    }

    fn name(view: &EntryView) -> String {
        view.latest.decode::<Value>().unwrap()["name"]
            .as_str()
            .unwrap()
            .to_string()
    }

    fn chain_len(cell: &Cell) -> u32 {
        cell.dht().chain().chain_len(&cell.agent()).unwrap()
    }

    // -----------------------------------------------------------------------
    // 1. Create, update, index, list, delete
    // -----------------------------------------------------------------------
    #[test]
    fn end_to_end_lifecycle() {
        let net = Net::new();
        let alice = net.agent();

        let created = alice.create(task(), entry(json!({"name": "A"}))).unwrap();
        let original = created.original;
        assert_eq!(name(&created), "A");
        assert_eq!(created.action, original);
        assert_eq!(created.kind, RevisionKind::Create);

        let updated = alice
            .update(original, original, task(), entry(json!({"name": "B"})))
            .unwrap();
        assert_eq!(updated.original, original);
        assert_eq!(updated.revision, 1);
        assert_eq!(name(&alice.get(&original).unwrap().unwrap()), "B");

        let active = Path::from("T.active");
        alice
            .link(active.address(), original, INDEX, LinkTag::empty())
            .unwrap();
        let listed = alice.list(&active, INDEX, None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(name(&listed[0]), "B");

        alice.delete(original).unwrap();
        assert!(alice.list(&active, INDEX, None).unwrap().is_empty());
        assert!(alice.get(&original).unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // 2. Concurrent updates with the same stale tip: exactly one wins
    // -----------------------------------------------------------------------
    #[test]
    fn optimistic_update_race() {
        let net = Net::new();
        let alice = net.agent();
        let bob = net.agent();
        let original = alice.create(wiki(), entry(json!({"v": 0}))).unwrap().original;

        let barrier = Barrier::new(2);
        let results: Vec<CellResult<EntryView>> = std::thread::scope(|s| {
            let handles: Vec<_> = [(&alice, 1), (&bob, 2)]
                .into_iter()
                .map(|(cell, v)| {
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        cell.update(original, original, wiki(), entry(json!({"v": v})))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        let loser = results.into_iter().find_map(Result::err).unwrap();
        assert!(matches!(loser, CellError::Store(StoreError::StaleUpdate { .. })));
        assert!(loser.is_retriable());

        // Retrying against the fresh tip succeeds.
        let tip = alice.get(&original).unwrap().unwrap().action;
        let retried = bob
            .update(original, tip, wiki(), entry(json!({"v": 3})))
            .unwrap();
        assert_eq!(retried.revision, 2);
        assert_eq!(alice.get_history(&original).unwrap().len(), 3);
    }

    #[test]
    fn reads_during_updates_see_whole_revisions() {
        let net = Net::new();
        let alice = net.agent();
        let reader = net.agent();
        let original = alice.create(wiki(), entry(json!({"v": 0}))).unwrap().original;
        let done = std::sync::atomic::AtomicBool::new(false);

        std::thread::scope(|s| {
            s.spawn(|| {
                let mut tip = original;
                for v in 1..300 {
                    tip = alice
                        .update(original, tip, wiki(), entry(json!({"v": v})))
                        .unwrap()
                        .action;
                }
                done.store(true, std::sync::atomic::Ordering::SeqCst);
            });
            s.spawn(|| {
                while !done.load(std::sync::atomic::Ordering::SeqCst) {
                    let view = reader.get(&original).unwrap().unwrap();
                    assert_eq!(
                        ContentHasher::ENTRY.hash(view.latest.as_bytes()),
                        view.latest_address
                    );
                    let history = reader.get_history(&original).unwrap();
                    assert!(history.len() > view.revision);
                    let last = history.last().unwrap();
                    assert_eq!(
                        ContentHasher::ENTRY.hash(last.latest.as_bytes()),
                        last.latest_address
                    );
                }
            });
        });

        let view = alice.get(&original).unwrap().unwrap();
        assert_eq!(view.revision, 299);
        assert_eq!(view.latest.decode::<Value>().unwrap()["v"], json!(299));
    }

    // -----------------------------------------------------------------------
    // 3. Delete is terminal but history survives
    // -----------------------------------------------------------------------
    #[test]
    fn delete_is_terminal() {
        let net = Net::new();
        let alice = net.agent();
        let original = alice.create(task(), entry(json!({"name": "A"}))).unwrap().original;
        alice
            .update(original, original, task(), entry(json!({"name": "B"})))
            .unwrap();
        let delete_action = alice.delete(original).unwrap();

        let tip = alice.get_history(&original).unwrap()[1].action;
        let err = alice
            .update(original, tip, task(), entry(json!({"name": "C"})))
            .unwrap_err();
        assert!(matches!(err, CellError::Store(StoreError::LineageDeleted(o)) if o == original));
        assert!(!err.is_retriable());
        assert!(matches!(
            alice.delete(original).unwrap_err(),
            CellError::Store(StoreError::LineageDeleted(_))
        ));

        assert!(alice.get(&original).unwrap().is_none());
        let history = alice.get_history(&original).unwrap();
        let kinds: Vec<_> = history.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            [RevisionKind::Create, RevisionKind::Update, RevisionKind::Delete]
        );
        let marker = history.last().unwrap();
        assert!(marker.deleted);
        assert_eq!(marker.action, delete_action);
        assert_eq!(name(marker), "B");
    }

    // -----------------------------------------------------------------------
    // 4. Unlinked targets leave live queries but stay in history
    // -----------------------------------------------------------------------
    #[test]
    fn link_visibility() {
        let net = Net::new();
        let alice = net.agent();
        let path = Path::from("T.active");
        let original = alice.create(task(), entry(json!({"name": "A"}))).unwrap().original;

        let id = alice
            .link(path.address(), original, INDEX, LinkTag::from("open"))
            .unwrap();
        assert_eq!(alice.list(&path, INDEX, None).unwrap().len(), 1);

        alice.unlink(id).unwrap();
        assert!(alice.list(&path, INDEX, None).unwrap().is_empty());

        let all = net
            .dht
            .links()
            .query_links_including_deleted(&path.address(), INDEX, None)
            .unwrap();
        assert_eq!(all.len(), 1);
        let tombstone = all[0].deleted_by.unwrap();
        let action = net.dht.chain().get_action(&tombstone).unwrap().unwrap();
        assert_eq!(action.kind().name(), "delete_link");

        assert!(matches!(
            alice.unlink(id).unwrap_err(),
            CellError::Link(LinkError::AlreadyDeleted { .. })
        ));
        assert!(matches!(
            alice.unlink(LinkId(Address::of(b"nope"))).unwrap_err(),
            CellError::Link(LinkError::LinkNotFound(_))
        ));
    }

    // -----------------------------------------------------------------------
    // 5. Validation fails closed and appends nothing
    // -----------------------------------------------------------------------
    #[test]
    fn panicking_validator_appends_nothing() {
        let net = Net::new();
        let alice = net.agent();
        let err = alice.create(crash(), entry(json!({}))).unwrap_err();
        assert!(matches!(
            err,
            CellError::Validation(ValidationError::ValidatorFault { .. })
        ));
        assert_eq!(err.class(), ErrorClass::Validation);
        assert_eq!(chain_len(&alice), 0);
    }

    #[test]
    fn panicking_validator_on_update_appends_nothing() {
        let net = Net::new();
        let alice = net.agent();
        let original = alice.create(fragile(), entry(json!({"boom": false}))).unwrap().original;
        let before = net.dht.action_count().unwrap();

        let err = alice
            .update(original, original, fragile(), entry(json!({"boom": true})))
            .unwrap_err();
        assert!(matches!(
            err,
            CellError::Validation(ValidationError::ValidatorFault { .. })
        ));
        assert_eq!(net.dht.action_count().unwrap(), before);
        let tip = alice.get(&original).unwrap().unwrap();
        assert_eq!(tip.action, original);
        assert_eq!(tip.revision, 0);
    }

    #[test]
    fn panicking_link_validator_appends_nothing() {
        let net = Net::new();
        let alice = net.agent();
        let err = alice
            .link(
                Path::from("T").address(),
                Address::of(b"target"),
                FRAGILE_LINK,
                LinkTag::empty(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            CellError::Validation(ValidationError::ValidatorFault { .. })
        ));
        assert_eq!(net.dht.action_count().unwrap(), 0);
        assert_eq!(chain_len(&alice), 0);
        assert!(alice
            .get_links(&Path::from("T").address(), FRAGILE_LINK, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn invalid_reason_reaches_caller() {
        let net = Net::new();
        let alice = net.agent();
        let err = alice.create(task(), entry(json!({"name": ""}))).unwrap_err();
        match err {
            CellError::Invalid(reason) => assert_eq!(reason, "name must not be empty"),
            other => panic!("unexpected {other:?}"),
        }

        let unknown = alice
            .create(EntryType::new("unknown", 1), entry(json!({})))
            .unwrap_err();
        assert!(matches!(unknown, CellError::Invalid(_)));
        assert_eq!(chain_len(&alice), 0);
        assert_eq!(net.dht.action_count().unwrap(), 0);
    }

    // -----------------------------------------------------------------------
    // 6. Mutation policy
    // -----------------------------------------------------------------------
    #[test]
    fn only_original_author_mutates_by_default() {
        let net = Net::new();
        let alice = net.agent();
        let bob = net.agent();

        let task_original = alice.create(task(), entry(json!({"name": "A"}))).unwrap().original;
        let err = bob
            .update(task_original, task_original, task(), entry(json!({"name": "X"})))
            .unwrap_err();
        assert!(matches!(err, CellError::Invalid(ref r) if r.contains("original author")));
        assert!(matches!(bob.delete(task_original).unwrap_err(), CellError::Invalid(_)));

        let page = alice.create(wiki(), entry(json!({"t": 1}))).unwrap().original;
        let edited = bob
            .update(page, page, wiki(), entry(json!({"t": 2})))
            .unwrap();
        assert_eq!(edited.author, bob.agent());
        assert_eq!(edited.original_author, alice.agent());

        let authored = alice
            .link(alice.agent().as_address(), task_original, AUTHORED, LinkTag::empty())
            .unwrap();
        assert!(matches!(bob.unlink(authored).unwrap_err(), CellError::Invalid(_)));
        alice.unlink(authored).unwrap();
    }

    // -----------------------------------------------------------------------
    // 7. Chains stay gap-free and linked
    // -----------------------------------------------------------------------
    #[test]
    fn chain_monotonicity() {
        let net = Net::new();
        let alice = net.agent();
        let original = alice.create(task(), entry(json!({"name": "A"}))).unwrap().original;
        let v2 = alice
            .update(original, original, task(), entry(json!({"name": "B"})))
            .unwrap();
        alice
            .link(Path::from("T").address(), original, INDEX, LinkTag::empty())
            .unwrap();
        alice
            .update(original, v2.action, task(), entry(json!({"name": "C"})))
            .unwrap();

        let chain = net.dht.chain().read_chain(&alice.agent()).unwrap();
        assert_eq!(chain.len(), 4);
        for (i, record) in chain.iter().enumerate() {
            assert_eq!(record.seq() as usize, i);
            if i > 0 {
                assert_eq!(record.action.prev_action, Some(chain[i - 1].address));
                assert!(record.action.timestamp >= chain[i - 1].action.timestamp);
            } else {
                assert!(record.action.prev_action.is_none());
            }
        }
        net.dht.chain().validate_chain_integrity(&alice.agent()).unwrap();
        assert!(net.dht.audit().unwrap().iter().all(|r| r.is_valid()));
    }

    // -----------------------------------------------------------------------
    // 8. Revisions resolve to their original
    // -----------------------------------------------------------------------
    #[test]
    fn find_original_and_true_originals_only() {
        let net = Net::new();
        let alice = net.agent();
        let original = alice.create(task(), entry(json!({"name": "A"}))).unwrap().original;
        let update = alice
            .update(original, original, task(), entry(json!({"name": "B"})))
            .unwrap()
            .action;

        assert_eq!(alice.find_original(&update).unwrap(), Some(original));
        assert_eq!(alice.find_original(&original).unwrap(), Some(original));
        assert_eq!(alice.find_original(&Address::of(b"?")).unwrap(), None);

        assert!(alice.get(&update).unwrap().is_none());
        assert!(matches!(
            alice
                .update(update, update, task(), entry(json!({"name": "C"})))
                .unwrap_err(),
            CellError::Store(StoreError::LineageNotFound(a)) if a == update
        ));
    }

    // -----------------------------------------------------------------------
    // 9. Update with index transition
    // -----------------------------------------------------------------------
    fn indexed(cell: &Cell, status: &str) -> (Address, LinkId) {
        let original = cell
            .create(task(), entry(json!({"name": "job", "status": status})))
            .unwrap()
            .original;
        let link = cell
            .link(
                Path::from("T").child(status).address(),
                original,
                INDEX,
                LinkTag::empty(),
            )
            .unwrap();
        (original, link)
    }

    fn move_to(link: LinkId, status: &str, target: Address) -> IndexMove {
        IndexMove {
            from: link,
            to: NewLink {
                base: Path::from("T").child(status).address(),
                target,
                link_type: INDEX,
                tag: LinkTag::empty(),
            },
        }
    }

    #[test]
    fn index_transition_moves_entry() {
        let net = Net::new();
        let alice = net.agent();
        let (original, pending_link) = indexed(&alice, "pending");

        let report = alice
            .update_with_index_transition(
                original,
                original,
                task(),
                entry(json!({"name": "job", "status": "active"})),
                &[move_to(pending_link, "active", original)],
            )
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.view.revision, 1);

        assert!(alice.list(&Path::from("T.pending"), INDEX, None).unwrap().is_empty());
        let active = alice.list(&Path::from("T.active"), INDEX, None).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].action, report.view.action);
    }

    #[test]
    fn index_failure_does_not_roll_back_update() {
        let net = Net::new();
        let alice = net.agent();
        let (original, pending_link) = indexed(&alice, "pending");
        alice.unlink(pending_link).unwrap();

        let report = alice
            .update_with_index_transition(
                original,
                original,
                task(),
                entry(json!({"name": "job2"})),
                &[move_to(pending_link, "active", original)],
            )
            .unwrap();
        assert!(!report.is_complete());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].step, MoveStep::Unlink);
        assert!(matches!(
            report.failures[0].error,
            CellError::Link(LinkError::AlreadyDeleted { .. })
        ));
        assert_eq!(report.created.len(), 1);
        assert_eq!(name(&alice.get(&original).unwrap().unwrap()), "job2");
    }

    #[test]
    fn failed_update_leaves_indices_untouched() {
        let net = Net::new();
        let alice = net.agent();
        let (original, pending_link) = indexed(&alice, "pending");
        let v2 = alice
            .update(original, original, task(), entry(json!({"name": "v2"})))
            .unwrap();
        let before = net.dht.links().link_count().unwrap();

        let err = alice
            .update_with_index_transition(
                original,
                original,
                task(),
                entry(json!({"name": "v3"})),
                &[move_to(pending_link, "active", original)],
            )
            .unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(net.dht.links().link_count().unwrap(), before);
        assert_eq!(alice.list(&Path::from("T.pending"), INDEX, None).unwrap().len(), 1);
        assert_eq!(alice.get(&original).unwrap().unwrap().action, v2.action);
    }

    // -----------------------------------------------------------------------
    // 10. Bulk unlink and raw link access
    // -----------------------------------------------------------------------
    #[test]
    fn delete_links_and_get_links() {
        let net = Net::new();
        let alice = net.agent();
        let base = Path::from("tags.rust").address();
        let mut targets = Vec::new();
        for (i, tag) in ["a:1", "a:2", "b:1"].into_iter().enumerate() {
            let original = alice
                .create(task(), entry(json!({"name": format!("t{i}")})))
                .unwrap()
                .original;
            alice.link(base, original, INDEX, LinkTag::from(tag)).unwrap();
            targets.push(original);
        }

        let prefixed = alice
            .get_links(&base, INDEX, Some(&TagPredicate::Prefix(b"a:".to_vec())))
            .unwrap();
        assert_eq!(prefixed.iter().map(|l| l.target).collect::<Vec<_>>(), targets[..2]);

        let removed = alice.delete_links(&base, INDEX).unwrap();
        assert_eq!(removed.len(), 3);
        assert!(alice.get_links(&base, INDEX, None).unwrap().is_empty());
        assert!(alice.delete_links(&base, INDEX).unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // 11. Lists skip dead and foreign targets
    // -----------------------------------------------------------------------
    #[test]
    fn list_tolerates_stale_index() {
        let net = Net::new();
        let alice = net.agent();
        let path = Path::from("T.all");
        let keep = alice.create(task(), entry(json!({"name": "keep"}))).unwrap().original;
        let gone = alice.create(task(), entry(json!({"name": "gone"}))).unwrap().original;
        for target in [keep, gone, alice.agent().as_address()] {
            alice.link(path.address(), target, INDEX, LinkTag::empty()).unwrap();
        }
        alice.delete(gone).unwrap();

        let listed = alice.list(&path, INDEX, None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].original, keep);
        assert_eq!(alice.get_links(&path.address(), INDEX, None).unwrap().len(), 3);
    }

    // -----------------------------------------------------------------------
    // 12. Commit signals
    // -----------------------------------------------------------------------
    #[test]
    fn commits_are_signalled() {
        let net = Net::new();
        let alice = net.agent();
        let mut rx = alice.subscribe();

        let original = alice.create(task(), entry(json!({"name": "A"}))).unwrap().original;
        let id = alice
            .link(Path::from("T").address(), original, INDEX, LinkTag::empty())
            .unwrap();
        alice.delete(original).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            Signal::EntryCreated {
                original,
                author: alice.agent()
            }
        );
        match rx.try_recv().unwrap() {
            Signal::LinkCreated { link } => assert_eq!(link.id, id),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(rx.try_recv().unwrap(), Signal::EntryDeleted { .. }));
        assert!(rx.try_recv().is_err());

        // A rejected write signals nothing.
        let _ = alice.create(task(), entry(json!({"name": ""})));
        assert!(rx.try_recv().is_err());
    }

    // -----------------------------------------------------------------------
    // 13. Entry size limit
    // -----------------------------------------------------------------------
    #[test]
    fn oversized_entry_is_rejected_before_commit() {
        let config = CellConfig {
            max_entry_bytes: 32,
            ..Default::default()
        };
        let net = Net::with_config(&config);
        let alice = net.agent();
        let err = alice
            .create(task(), entry(json!({"name": "x".repeat(64)})))
            .unwrap_err();
        assert!(matches!(err, CellError::Store(StoreError::EntryTooLarge { .. })));
        assert_eq!(chain_len(&alice), 0);
    }

    // -----------------------------------------------------------------------
    // 14. Retry policy re-runs the whole operation
    // -----------------------------------------------------------------------
    #[test]
    fn retry_policy_recovers_from_stale_update() {
        let net = Net::new();
        let alice = net.agent();
        let original = alice.create(wiki(), entry(json!({"v": 1}))).unwrap().original;
        let stale = original;
        alice
            .update(original, original, wiki(), entry(json!({"v": 2})))
            .unwrap();

        let policy = RetryPolicy {
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            ..RetryPolicy::default()
        };
        let view = policy
            .run(|attempt| {
                let previous = if attempt == 1 {
                    stale
                } else {
                    alice.get(&original)?.map(|v| v.action).unwrap_or(original)
                };
                alice.update(original, previous, wiki(), entry(json!({"v": 3})))
            })
            .unwrap();
        assert_eq!(view.revision, 2);
    }

    // -----------------------------------------------------------------------
    // 15. Snapshots rebuild indices by replay
    // -----------------------------------------------------------------------
    #[test]
    fn snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dht.json");
        let config = CellConfig::default();
        let alice_key = AgentKey::generate();
        let bob_key = AgentKey::generate();

        let net = Net::new();
        let alice = net.cell(&alice_key);
        let bob = net.cell(&bob_key);
        let path = Path::from("wiki.pages");
        let page = alice.create(wiki(), entry(json!({"t": 1}))).unwrap().original;
        bob.update(page, page, wiki(), entry(json!({"t": 2}))).unwrap();
        let gone = alice.create(task(), entry(json!({"name": "gone"}))).unwrap().original;
        let link = bob.link(path.address(), page, INDEX, LinkTag::empty()).unwrap();
        alice.link(path.address(), gone, INDEX, LinkTag::empty()).unwrap();
        alice.delete(gone).unwrap();
        net.dht.save(&file).unwrap();

        let restored = Net::over(Arc::new(Dht::load(&file, &config).unwrap()), &config);
        let alice2 = restored.cell(&alice_key);
        assert_eq!(alice2.get(&page).unwrap(), alice.get(&page).unwrap());
        assert_eq!(alice2.get_history(&gone).unwrap(), alice.get_history(&gone).unwrap());
        assert_eq!(
            alice2.list(&path, INDEX, None).unwrap(),
            alice.list(&path, INDEX, None).unwrap()
        );
        assert!(restored.dht.links().get_link(&link).unwrap().unwrap().is_live());
        assert_eq!(
            restored.dht.action_count().unwrap(),
            net.dht.action_count().unwrap()
        );

        // Writing continues where the chain left off.
        let before = chain_len(&alice2);
        alice2.create(task(), entry(json!({"name": "next"}))).unwrap();
        assert_eq!(chain_len(&alice2), before + 1);
    }

    #[test]
    fn tampered_snapshot_is_rejected() {
        let net = Net::new();
        let alice = net.agent();
        let original = alice.create(task(), entry(json!({"name": "A"}))).unwrap().original;
        alice
            .update(original, original, task(), entry(json!({"name": "B"})))
            .unwrap();
        let snapshot = net.dht.snapshot().unwrap();
        let config = CellConfig::default();

        let mut reordered = snapshot.clone();
        reordered.order.reverse();
        assert!(matches!(
            Dht::from_snapshot(reordered, &config).unwrap_err(),
            CellError::Snapshot(_)
        ));

        let mut truncated = snapshot.clone();
        truncated.order.pop();
        assert!(matches!(
            Dht::from_snapshot(truncated, &config).unwrap_err(),
            CellError::Snapshot(_)
        ));

        let mut forged = snapshot.clone();
        forged.chains[0][1].signature = forged.chains[0][0].signature.clone();
        assert!(matches!(
            Dht::from_snapshot(forged, &config).unwrap_err(),
            CellError::Chain(ChainError::Integrity { .. })
        ));

        let mut missing_entry = snapshot;
        missing_entry.entries.clear();
        assert!(matches!(
            Dht::from_snapshot(missing_entry, &config).unwrap_err(),
            CellError::Store(StoreError::EntryNotFound(_))
        ));
    }
}
