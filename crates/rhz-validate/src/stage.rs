use std::time::Duration;

use crate::error::ValidationError;
use crate::op::{ValidationContext, ValidationOp};

// ---------------------------------------------------------------------------
// StageDecision
// ---------------------------------------------------------------------------

/// The outcome of a single stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageDecision {
    Pass,
    Fail { reason: String },
}

impl StageDecision {
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail {
            reason: reason.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

// ---------------------------------------------------------------------------
// StageResult
// ---------------------------------------------------------------------------

/// Audit record for one stage that ran.
#[derive(Clone, Debug)]
pub struct StageResult {
    pub stage_name: String,
    pub passed: bool,
    pub reason: Option<String>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// ValidationStage trait
// ---------------------------------------------------------------------------

/// One step of the validation pipeline.
///
/// A stage returns `Ok(Fail)` when the proposal breaks a rule and `Err` when
/// it could not reach a verdict. Both stop the pipeline.
pub trait ValidationStage: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(
        &self,
        op: &ValidationOp,
        context: &ValidationContext<'_>,
    ) -> Result<StageDecision, ValidationError>;
}
