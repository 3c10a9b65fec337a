use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use crate::error::ValidationError;
use crate::op::{ValidationContext, ValidationOp, ValidationResult};
use crate::registry::ValidatorRegistry;
use crate::stage::{StageDecision, ValidationStage};

/// Runs the application's registered validators.
///
/// Entry validators see creates and updates, link validators see link
/// creates. A type with no registered validator is rejected. A validator
/// that panics surfaces as [`ValidationError::ValidatorFault`]; it never
/// counts as a pass.
pub struct ApplicationStage {
    registry: Arc<ValidatorRegistry>,
}

impl ApplicationStage {
    pub fn new(registry: Arc<ValidatorRegistry>) -> Self {
        Self { registry }
    }
}

impl ValidationStage for ApplicationStage {
    fn name(&self) -> &str {
        "application"
    }

    fn evaluate(
        &self,
        op: &ValidationOp,
        context: &ValidationContext<'_>,
    ) -> Result<StageDecision, ValidationError> {
        let (label, outcome) = match op {
            ValidationOp::CreateEntry {
                entry_type, entry, ..
            }
            | ValidationOp::UpdateEntry {
                entry_type, entry, ..
            } => {
                let Some(def) = self.registry.entry_type(entry_type) else {
                    return Ok(StageDecision::fail(format!(
                        "no validator registered for entry type {entry_type}"
                    )));
                };
                let validator = def.validator.clone();
                (
                    entry_type.to_string(),
                    panic::catch_unwind(AssertUnwindSafe(|| {
                        validator(entry_type, entry, context)
                    })),
                )
            }
            ValidationOp::CreateLink {
                base,
                target,
                link_type,
                tag,
                ..
            } => {
                let Some(def) = self.registry.link_type(*link_type) else {
                    return Ok(StageDecision::fail(format!(
                        "no validator registered for {link_type}"
                    )));
                };
                let validator = def.validator.clone();
                (
                    def.name.clone(),
                    panic::catch_unwind(AssertUnwindSafe(|| {
                        validator(*link_type, base, target, tag, context)
                    })),
                )
            }
            ValidationOp::DeleteEntry { .. } | ValidationOp::DeleteLink { .. } => {
                return Ok(StageDecision::Pass)
            }
        };

        match outcome {
            Ok(ValidationResult::Valid) => Ok(StageDecision::Pass),
            Ok(ValidationResult::Invalid(reason)) => Ok(StageDecision::Fail { reason }),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(validator = %label, %message, "validator panicked");
                Err(ValidationError::ValidatorFault {
                    validator: label,
                    message,
                })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
