use std::sync::Arc;

use crate::error::ValidationError;
use crate::op::{ValidationContext, ValidationOp};
use crate::registry::{MutationPolicy, ValidatorRegistry};
use crate::stage::{StageDecision, ValidationStage};

/// Mutation authorization.
///
/// Updates and deletes of entries, and deletes of links, are checked
/// against the mutation policy registered for their type. Under
/// `OriginalAuthor` only the creator may mutate. Creates are always
/// authorized here; whether their content is acceptable is up to the
/// application stage.
pub struct AuthorizationStage {
    registry: Arc<ValidatorRegistry>,
}

impl AuthorizationStage {
    pub fn new(registry: Arc<ValidatorRegistry>) -> Self {
        Self { registry }
    }
}

impl ValidationStage for AuthorizationStage {
    fn name(&self) -> &str {
        "authorization"
    }

    fn evaluate(
        &self,
        op: &ValidationOp,
        _context: &ValidationContext<'_>,
    ) -> Result<StageDecision, ValidationError> {
        let (policy, owner, what) = match op {
            ValidationOp::UpdateEntry { lineage, .. } | ValidationOp::DeleteEntry { lineage, .. } => {
                let what = if matches!(op, ValidationOp::UpdateEntry { .. }) {
                    "update this entry"
                } else {
                    "delete this entry"
                };
                let Some(def) = self.registry.entry_type(&lineage.entry_type) else {
                    return Ok(StageDecision::fail(format!(
                        "no validator registered for entry type {}",
                        lineage.entry_type
                    )));
                };
                (def.policy, *lineage.original_author(), what)
            }
            ValidationOp::DeleteLink { link, .. } => {
                let Some(def) = self.registry.link_type(link.link_type) else {
                    return Ok(StageDecision::fail(format!(
                        "no validator registered for {}",
                        link.link_type
                    )));
                };
                (def.policy, link.author, "delete this link")
            }
            ValidationOp::CreateEntry { .. } | ValidationOp::CreateLink { .. } => {
                return Ok(StageDecision::Pass)
            }
        };

        match policy {
            MutationPolicy::AnyAgent => Ok(StageDecision::Pass),
            MutationPolicy::OriginalAuthor if *op.author() == owner => Ok(StageDecision::Pass),
            MutationPolicy::OriginalAuthor => Ok(StageDecision::fail(format!(
                "only the original author {owner} may {what}"
            ))),
        }
    }
}
