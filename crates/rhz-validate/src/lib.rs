//! Validation pipeline for Rhizome.
//!
//! Every proposed action is validated before it is committed to the
//! author's chain. The pipeline runs three stages in order:
//!
//! 1. **Structural**: the action matches the proposal, entry addresses
//!    match content, updates keep their lineage's entry type, link tags fit
//!    the configured cap.
//! 2. **Authorization**: updates and deletes respect the type's
//!    [`MutationPolicy`].
//! 3. **Application**: the validator registered for the entry or link type
//!    decides.
//!
//! Validation fails closed. Unregistered types are invalid, and a validator
//! that panics yields [`ValidationError::ValidatorFault`].
//!
//! # Quick Start
//!
//! ```rust
//! use rhz_validate::{ValidationConfig, ValidationEngine, ValidationResult, ValidatorRegistry};
//! use rhz_types::EntryType;
//!
//! let mut registry = ValidatorRegistry::new();
//! registry
//!     .register_validator(EntryType::new("note", 1), |_, entry, _| {
//!         if entry.is_empty() {
//!             ValidationResult::invalid("note is empty")
//!         } else {
//!             ValidationResult::Valid
//!         }
//!     })
//!     .unwrap();
//! let engine = ValidationEngine::with_default_stages(ValidationConfig::default(), registry);
//! assert_eq!(engine.stage_count(), 3);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod op;
pub mod registry;
pub mod stage;
pub mod stages;

pub use config::{ValidationConfig, DEFAULT_MAX_TAG_BYTES};
pub use engine::{ValidationEngine, ValidationReport};
pub use error::ValidationError;
pub use op::{ValidationContext, ValidationOp, ValidationResult};
pub use registry::{
    EntryValidatorFn, LinkValidatorFn, MutationPolicy, ValidatorRegistry,
};
pub use stage::{StageDecision, StageResult, ValidationStage};
pub use stages::{ApplicationStage, AuthorizationStage, StructuralStage};

#[cfg(test)]
mod tests {
    use super::*;
    use rhz_chain::{Action, ActionKind, ActionRecord, ChainWriter, InMemoryChain};
    use rhz_crypto::{AgentKey, AgentSigner};
    use rhz_links::{InMemoryLinkIndex, Link, LinkReader, LinkWriter};
    use rhz_store::{EntryReader, EntryWriter, InMemoryEntryStore, Lineage};
    use rhz_types::{Address, Entry, EntryType, LinkTag, LinkType};
    use serde_json::json;

    const FOLLOWS: LinkType = LinkType(1);

    fn post() -> EntryType {
        EntryType::new("post", 1)
    }

    fn wiki() -> EntryType {
        EntryType::new("wiki", 1)
    }

    fn comment() -> EntryType {
        EntryType::new("comment", 1)
    }

    /// Posts need a non-empty "body"; wiki pages may be edited by anyone;
    /// comments must point at a live post.
    fn registry() -> ValidatorRegistry {
        let mut registry = ValidatorRegistry::new();
        registry
            .register_validator(post(), |_, entry, _| {
                match entry.decode::<serde_json::Value>() {
                    Ok(v) if v["body"].as_str().is_some_and(|b| !b.is_empty()) => {
                        ValidationResult::Valid
                    }
                    _ => ValidationResult::invalid("post body must be non-empty"),
                }
            })
            .unwrap()
            .register_entry_type(wiki(), MutationPolicy::AnyAgent, |_, _, _| {
                ValidationResult::Valid
            })
            .unwrap()
            .register_validator(comment(), |_, entry, ctx| {
                let target = entry
                    .decode::<serde_json::Value>()
                    .ok()
                    .and_then(|v| v["on"].as_str().and_then(|s| s.parse::<Address>().ok()));
                match target {
                    Some(on) if ctx.is_live_of_type(&on, &post()) => ValidationResult::Valid,
                    _ => ValidationResult::invalid("comment must reference a live post"),
                }
            })
            .unwrap()
            .register_link_type(FOLLOWS, "follows", MutationPolicy::OriginalAuthor, |_, _, _, _, _| {
                ValidationResult::Valid
            })
            .unwrap();
        registry
    }

    fn engine() -> ValidationEngine {
        ValidationEngine::with_default_stages(ValidationConfig::default(), registry())
    }

    struct Fixture {
        chain: InMemoryChain,
        entries: InMemoryEntryStore,
        links: InMemoryLinkIndex,
        alice: AgentKey,
        bob: AgentKey,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                chain: InMemoryChain::new(),
                entries: InMemoryEntryStore::new(),
                links: InMemoryLinkIndex::new(),
                alice: AgentKey::generate(),
                bob: AgentKey::generate(),
            }
        }

        fn ctx(&self) -> ValidationContext<'_> {
            ValidationContext::new(&self.entries, &self.links)
        }

        fn prepare(&self, signer: &AgentKey, kind: ActionKind) -> Action {
            self.chain.prepare(&signer.agent(), kind).unwrap()
        }

        fn create_op(&self, signer: &AgentKey, entry_type: EntryType, value: serde_json::Value) -> ValidationOp {
            let entry = Entry::from_json(&value).unwrap();
            let entry_address = rhz_crypto::ContentHasher::ENTRY.hash(entry.as_bytes());
            let action = self.prepare(
                signer,
                ActionKind::Create {
                    entry_type: entry_type.clone(),
                    entry_address,
                },
            );
            ValidationOp::CreateEntry {
                action,
                entry_type,
                entry,
            }
        }

        /// Commit a create without validation and return its lineage.
        fn seed(&self, signer: &AgentKey, entry_type: EntryType, value: serde_json::Value) -> Lineage {
            let entry = Entry::from_json(&value).unwrap();
            let entry_address = self.entries.put_entry(&entry).unwrap();
            let record = self
                .chain
                .append(signer, ActionKind::Create { entry_type, entry_address })
                .unwrap();
            self.entries.record_create(&record).unwrap()
        }

        fn update_op(&self, signer: &AgentKey, lineage: &Lineage, entry_type: EntryType, value: serde_json::Value) -> ValidationOp {
            let entry = Entry::from_json(&value).unwrap();
            let entry_address = rhz_crypto::ContentHasher::ENTRY.hash(entry.as_bytes());
            let action = self.prepare(
                signer,
                ActionKind::Update {
                    entry_type: entry_type.clone(),
                    original_action: lineage.original_action,
                    original_entry: lineage.original_entry_address().unwrap(),
                    previous_action: lineage.tip(),
                    entry_address,
                },
            );
            ValidationOp::UpdateEntry {
                action,
                entry_type,
                entry,
                lineage: lineage.clone(),
            }
        }

        fn delete_op(&self, signer: &AgentKey, lineage: &Lineage) -> ValidationOp {
            let action = self.prepare(
                signer,
                ActionKind::Delete {
                    original_action: lineage.original_action,
                    original_entry: lineage.original_entry_address().unwrap(),
                },
            );
            ValidationOp::DeleteEntry {
                action,
                lineage: lineage.clone(),
            }
        }

        fn link_op(&self, signer: &AgentKey, link_type: LinkType, tag: LinkTag) -> ValidationOp {
            let base = Address::of(b"base");
            let target = Address::of(b"target");
            let action = self.prepare(
                signer,
                ActionKind::CreateLink {
                    base,
                    target,
                    link_type,
                    tag: tag.clone(),
                },
            );
            ValidationOp::CreateLink {
                action,
                base,
                target,
                link_type,
                tag,
            }
        }

        fn seed_link(&self, signer: &AgentKey) -> Link {
            let record: ActionRecord = self
                .chain
                .append(
                    signer,
                    ActionKind::CreateLink {
                        base: Address::of(b"base"),
                        target: Address::of(b"target"),
                        link_type: FOLLOWS,
                        tag: LinkTag::empty(),
                    },
                )
                .unwrap();
            let id = self.links.create_link(&record).unwrap();
            self.links.get_link(&id).unwrap().unwrap().link
        }

        fn unlink_op(&self, signer: &AgentKey, link: &Link) -> ValidationOp {
            let action = self.prepare(
                signer,
                ActionKind::DeleteLink {
                    link_add_action: link.id.address(),
                    base: link.base,
                },
            );
            ValidationOp::DeleteLink {
                action,
                link: link.clone(),
            }
        }
    }

    fn reason(report: &ValidationReport) -> &str {
        match &report.result {
            ValidationResult::Invalid(reason) => reason,
            ValidationResult::Valid => panic!("expected rejection"),
        }
    }

    // -----------------------------------------------------------------------
    // 1. Default pipeline accepts a valid create
    // -----------------------------------------------------------------------
    #[test]
    fn default_pipeline_accepts_valid_create() {
        let fx = Fixture::new();
        let op = fx.create_op(&fx.alice, post(), json!({"body": "hello"}));
        let report = engine().validate(&op, &fx.ctx()).unwrap();
        assert!(report.is_valid());
        assert_eq!(report.stage_results.len(), 3);
        assert!(report.stage_results.iter().all(|s| s.passed));
    }

    // -----------------------------------------------------------------------
    // 2. Validator reasons reach the caller verbatim
    // -----------------------------------------------------------------------
    #[test]
    fn validator_reason_is_reported() {
        let fx = Fixture::new();
        let op = fx.create_op(&fx.alice, post(), json!({"body": ""}));
        let report = engine().validate(&op, &fx.ctx()).unwrap();
        assert_eq!(reason(&report), "post body must be non-empty");
        assert_eq!(report.stage_results.last().unwrap().stage_name, "application");
    }

    // -----------------------------------------------------------------------
    // 3. Unregistered entry types are rejected
    // -----------------------------------------------------------------------
    #[test]
    fn unregistered_entry_type_is_invalid() {
        let fx = Fixture::new();
        let op = fx.create_op(&fx.alice, EntryType::new("post", 2), json!({"body": "x"}));
        let report = engine().validate(&op, &fx.ctx()).unwrap();
        assert!(reason(&report).contains("post@2"));
    }

    // -----------------------------------------------------------------------
    // 4. A panicking validator is a fault, not a pass
    // -----------------------------------------------------------------------
    #[test]
    fn panicking_validator_is_fault() {
        let mut registry = ValidatorRegistry::new();
        registry
            .register_validator(post(), |_, _, _| panic!("validator bug"))
            .unwrap();
        let engine = ValidationEngine::with_default_stages(ValidationConfig::default(), registry);

        let fx = Fixture::new();
        let op = fx.create_op(&fx.alice, post(), json!({"body": "x"}));
        let err = engine.validate(&op, &fx.ctx()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::ValidatorFault {
                validator: "post@1".into(),
                message: "validator bug".into(),
            }
        );
    }

    // -----------------------------------------------------------------------
    // 5. Entry address must match content
    // -----------------------------------------------------------------------
    #[test]
    fn structural_rejects_wrong_entry_address() {
        let fx = Fixture::new();
        let mut op = fx.create_op(&fx.alice, post(), json!({"body": "x"}));
        if let ValidationOp::CreateEntry { entry, .. } = &mut op {
            *entry = Entry::from_json(&json!({"body": "swapped"})).unwrap();
        }
        let report = engine().validate(&op, &fx.ctx()).unwrap();
        assert!(reason(&report).contains("entry address"));
        assert_eq!(report.stage_results.len(), 1);
    }

    // -----------------------------------------------------------------------
    // 6. Only the original author may update by default
    // -----------------------------------------------------------------------
    #[test]
    fn update_by_other_agent_is_rejected() {
        let fx = Fixture::new();
        let lineage = fx.seed(&fx.alice, post(), json!({"body": "v1"}));

        let own = fx.update_op(&fx.alice, &lineage, post(), json!({"body": "v2"}));
        assert!(engine().validate(&own, &fx.ctx()).unwrap().is_valid());

        let foreign = fx.update_op(&fx.bob, &lineage, post(), json!({"body": "v2"}));
        let report = engine().validate(&foreign, &fx.ctx()).unwrap();
        assert!(reason(&report).contains("original author"));
        assert_eq!(report.stage_results.last().unwrap().stage_name, "authorization");
    }

    // -----------------------------------------------------------------------
    // 7. AnyAgent types accept foreign updates and deletes
    // -----------------------------------------------------------------------
    #[test]
    fn any_agent_policy_allows_foreign_mutation() {
        let fx = Fixture::new();
        let lineage = fx.seed(&fx.alice, wiki(), json!({"title": "Home"}));

        let update = fx.update_op(&fx.bob, &lineage, wiki(), json!({"title": "Home!"}));
        assert!(engine().validate(&update, &fx.ctx()).unwrap().is_valid());

        let delete = fx.delete_op(&fx.bob, &lineage);
        assert!(engine().validate(&delete, &fx.ctx()).unwrap().is_valid());
    }

    // -----------------------------------------------------------------------
    // 8. Updates keep the lineage's entry type
    // -----------------------------------------------------------------------
    #[test]
    fn update_cannot_change_entry_type() {
        let fx = Fixture::new();
        let lineage = fx.seed(&fx.alice, post(), json!({"body": "v1"}));
        let op = fx.update_op(&fx.alice, &lineage, wiki(), json!({"title": "t"}));
        let report = engine().validate(&op, &fx.ctx()).unwrap();
        assert!(reason(&report).contains("changes entry type"));
    }

    // -----------------------------------------------------------------------
    // 9. Deletes are authorized but not content-validated
    // -----------------------------------------------------------------------
    #[test]
    fn delete_skips_application_validator() {
        let fx = Fixture::new();
        // Seeded directly; the post validator would reject this body.
        let lineage = fx.seed(&fx.alice, post(), json!({"body": ""}));

        let own = fx.delete_op(&fx.alice, &lineage);
        assert!(engine().validate(&own, &fx.ctx()).unwrap().is_valid());

        let foreign = fx.delete_op(&fx.bob, &lineage);
        assert!(!engine().validate(&foreign, &fx.ctx()).unwrap().is_valid());
    }

    // -----------------------------------------------------------------------
    // 10. Validators can consult current state
    // -----------------------------------------------------------------------
    #[test]
    fn validator_reads_context() {
        let fx = Fixture::new();
        let target = fx.seed(&fx.alice, post(), json!({"body": "hi"}));

        let ok = fx.create_op(&fx.bob, comment(), json!({"on": target.original_action.to_hex()}));
        assert!(engine().validate(&ok, &fx.ctx()).unwrap().is_valid());

        let dangling = fx.create_op(&fx.bob, comment(), json!({"on": Address::of(b"nope").to_hex()}));
        assert!(!engine().validate(&dangling, &fx.ctx()).unwrap().is_valid());
    }

    // -----------------------------------------------------------------------
    // 11. Link tags are capped
    // -----------------------------------------------------------------------
    #[test]
    fn oversized_tag_is_rejected() {
        let fx = Fixture::new();
        let config = ValidationConfig { max_tag_bytes: 4 };
        let engine = ValidationEngine::with_default_stages(config, registry());

        let short = fx.link_op(&fx.alice, FOLLOWS, LinkTag::from("abcd"));
        assert!(engine.validate(&short, &fx.ctx()).unwrap().is_valid());

        let long = fx.link_op(&fx.alice, FOLLOWS, LinkTag::from("abcde"));
        let report = engine.validate(&long, &fx.ctx()).unwrap();
        assert!(reason(&report).contains("limit is 4"));
    }

    // -----------------------------------------------------------------------
    // 12. Unregistered link types are rejected
    // -----------------------------------------------------------------------
    #[test]
    fn unregistered_link_type_is_invalid() {
        let fx = Fixture::new();
        let op = fx.link_op(&fx.alice, LinkType(9), LinkTag::empty());
        assert!(!engine().validate(&op, &fx.ctx()).unwrap().is_valid());
    }

    // -----------------------------------------------------------------------
    // 13. Only the link author may delete an OriginalAuthor link
    // -----------------------------------------------------------------------
    #[test]
    fn delete_link_respects_policy() {
        let fx = Fixture::new();
        let link = fx.seed_link(&fx.alice);
        assert_eq!(fx.links.link_count().unwrap(), 1);

        let foreign = fx.unlink_op(&fx.bob, &link);
        assert!(!engine().validate(&foreign, &fx.ctx()).unwrap().is_valid());

        let own = fx.unlink_op(&fx.alice, &link);
        assert!(engine().validate(&own, &fx.ctx()).unwrap().is_valid());
    }

    // -----------------------------------------------------------------------
    // 14. Mismatched action kinds are rejected
    // -----------------------------------------------------------------------
    #[test]
    fn action_kind_must_match_operation() {
        let fx = Fixture::new();
        let lineage = fx.seed(&fx.alice, post(), json!({"body": "v1"}));
        let ValidationOp::DeleteEntry { action, .. } = fx.delete_op(&fx.alice, &lineage) else {
            unreachable!()
        };
        let op = ValidationOp::CreateEntry {
            action,
            entry_type: post(),
            entry: Entry::from_json(&json!({"body": "x"})).unwrap(),
        };
        let report = engine().validate(&op, &fx.ctx()).unwrap();
        assert!(reason(&report).contains("delete action"));
    }

    // -----------------------------------------------------------------------
    // 15. An empty pipeline rejects everything
    // -----------------------------------------------------------------------
    #[test]
    fn empty_pipeline_rejects() {
        let fx = Fixture::new();
        let engine = ValidationEngine::new(ValidationConfig::default(), registry());
        let op = fx.create_op(&fx.alice, post(), json!({"body": "x"}));
        let report = engine.validate(&op, &fx.ctx()).unwrap();
        assert!(!report.is_valid());
        assert!(report.stage_results.is_empty());
    }

    // -----------------------------------------------------------------------
    // 16. Rules hash tracks configuration and validator table
    // -----------------------------------------------------------------------
    #[test]
    fn rules_hash_is_deterministic() {
        let a = engine().rules_hash().unwrap();
        let b = engine().rules_hash().unwrap();
        assert_eq!(a, b);

        let tighter = ValidationEngine::with_default_stages(
            ValidationConfig { max_tag_bytes: 10 },
            registry(),
        );
        assert_ne!(a, tighter.rules_hash().unwrap());

        let bare = ValidationEngine::with_default_stages(
            ValidationConfig::default(),
            ValidatorRegistry::new(),
        );
        assert_ne!(a, bare.rules_hash().unwrap());
    }

    // -----------------------------------------------------------------------
    // 17. Store reads go through the context
    // -----------------------------------------------------------------------
    #[test]
    fn context_helpers_fail_closed_on_unknown_addresses() {
        let fx = Fixture::new();
        let lineage = fx.seed(&fx.alice, post(), json!({"body": "x"}));
        let ctx = fx.ctx();
        assert!(ctx.is_live_of_type(&lineage.original_action, &post()));
        assert!(!ctx.is_live_of_type(&lineage.original_action, &wiki()));
        assert!(!ctx.is_live_of_type(&Address::of(b"?"), &post()));
        assert!(ctx.entry_exists(&lineage.latest_entry_address().unwrap()));
        assert!(fx.entries.lineage(&lineage.original_action).unwrap().is_some());
    }
}
