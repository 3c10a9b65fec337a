use rhz_chain::ActionKind;
use rhz_crypto::ContentHasher;

use crate::config::ValidationConfig;
use crate::error::ValidationError;
use crate::op::{ValidationContext, ValidationOp};
use crate::stage::{StageDecision, ValidationStage};

/// Shape checks that need no application knowledge.
///
/// The action must describe the same transition as the operation it is
/// bundled with, entry addresses must match content, updates keep the
/// lineage's type, and link tags stay under the configured cap.
pub struct StructuralStage {
    config: ValidationConfig,
}

impl StructuralStage {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }
}

impl ValidationStage for StructuralStage {
    fn name(&self) -> &str {
        "structural"
    }

    fn evaluate(
        &self,
        op: &ValidationOp,
        _context: &ValidationContext<'_>,
    ) -> Result<StageDecision, ValidationError> {
        let decision = match op {
            ValidationOp::CreateEntry {
                action,
                entry_type,
                entry,
            } => match &action.kind {
                ActionKind::Create {
                    entry_type: declared,
                    entry_address,
                } => {
                    if declared != entry_type {
                        StageDecision::fail(format!(
                            "action declares {declared} but entry is {entry_type}"
                        ))
                    } else if !ContentHasher::ENTRY.verify(entry.as_bytes(), entry_address) {
                        StageDecision::fail("entry address does not match entry content")
                    } else {
                        StageDecision::Pass
                    }
                }
                other => mismatch("create_entry", other),
            },

            ValidationOp::UpdateEntry {
                action,
                entry_type,
                entry,
                lineage,
            } => match &action.kind {
                ActionKind::Update {
                    entry_type: declared,
                    original_action,
                    original_entry,
                    entry_address,
                    ..
                } => {
                    if *original_action != lineage.original_action {
                        StageDecision::fail("update targets a different lineage")
                    } else if declared != entry_type || *entry_type != lineage.entry_type {
                        StageDecision::fail(format!(
                            "update changes entry type from {} to {entry_type}",
                            lineage.entry_type
                        ))
                    } else if Some(*original_entry) != lineage.original_entry_address() {
                        StageDecision::fail("original entry does not match lineage")
                    } else if !ContentHasher::ENTRY.verify(entry.as_bytes(), entry_address) {
                        StageDecision::fail("entry address does not match entry content")
                    } else {
                        StageDecision::Pass
                    }
                }
                other => mismatch("update_entry", other),
            },

            ValidationOp::DeleteEntry { action, lineage } => match &action.kind {
                ActionKind::Delete {
                    original_action,
                    original_entry,
                } => {
                    if *original_action != lineage.original_action {
                        StageDecision::fail("delete targets a different lineage")
                    } else if Some(*original_entry) != lineage.original_entry_address() {
                        StageDecision::fail("original entry does not match lineage")
                    } else {
                        StageDecision::Pass
                    }
                }
                other => mismatch("delete_entry", other),
            },

            ValidationOp::CreateLink {
                action,
                base,
                target,
                link_type,
                tag,
            } => match &action.kind {
                ActionKind::CreateLink {
                    base: b,
                    target: t,
                    link_type: lt,
                    tag: tg,
                } => {
                    if b != base || t != target || lt != link_type || tg != tag {
                        StageDecision::fail("action does not describe this link")
                    } else if tag.len() > self.config.max_tag_bytes {
                        StageDecision::fail(format!(
                            "link tag is {} bytes, limit is {}",
                            tag.len(),
                            self.config.max_tag_bytes
                        ))
                    } else {
                        StageDecision::Pass
                    }
                }
                other => mismatch("create_link", other),
            },

            ValidationOp::DeleteLink { action, link } => match &action.kind {
                ActionKind::DeleteLink {
                    link_add_action,
                    base,
                } => {
                    if *link_add_action != link.id.address() || *base != link.base {
                        StageDecision::fail("action does not name this link")
                    } else {
                        StageDecision::Pass
                    }
                }
                other => mismatch("delete_link", other),
            },
        };
        Ok(decision)
    }
}

fn mismatch(op: &str, kind: &ActionKind) -> StageDecision {
    StageDecision::fail(format!("{op} proposal carries a {kind} action"))
}
