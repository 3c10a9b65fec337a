use std::sync::Arc;
use std::time::{Duration, Instant};

use rhz_crypto::ContentHasher;
use rhz_types::Address;
use tracing::debug;

use crate::config::ValidationConfig;
use crate::error::ValidationError;
use crate::op::{ValidationContext, ValidationOp, ValidationResult};
use crate::registry::ValidatorRegistry;
use crate::stage::{StageDecision, StageResult, ValidationStage};
use crate::stages::{ApplicationStage, AuthorizationStage, StructuralStage};

const RULES_HASHER: ContentHasher = ContentHasher::new("rhz-validation-rules-v1");

// ---------------------------------------------------------------------------
// ValidationReport
// ---------------------------------------------------------------------------

/// The outcome of running a proposal through the pipeline.
#[derive(Clone, Debug)]
pub struct ValidationReport {
    pub result: ValidationResult,
    /// Fingerprint of the configuration and validator table that decided.
    pub rules_hash: Address,
    /// Per-stage results in evaluation order.
    pub stage_results: Vec<StageResult>,
    pub elapsed: Duration,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.result.is_valid()
    }
}

// ---------------------------------------------------------------------------
// ValidationEngine
// ---------------------------------------------------------------------------

/// Fail-closed validation pipeline.
///
/// Every proposed action passes through here before it is committed. The
/// first failing stage rejects the proposal, and a stage error (including
/// a panicking validator) is returned to the caller as an error, never
/// treated as acceptance.
pub struct ValidationEngine {
    stages: Vec<Box<dyn ValidationStage>>,
    config: ValidationConfig,
    registry: Arc<ValidatorRegistry>,
}

impl ValidationEngine {
    /// An engine with an empty pipeline. Use [`Self::add_stage`] to add
    /// stages, or [`Self::with_default_stages`] for the standard pipeline.
    pub fn new(config: ValidationConfig, registry: ValidatorRegistry) -> Self {
        Self {
            stages: Vec::new(),
            config,
            registry: Arc::new(registry),
        }
    }

    /// Structural -> Authorization -> Application
    pub fn with_default_stages(config: ValidationConfig, registry: ValidatorRegistry) -> Self {
        let mut engine = Self::new(config, registry);
        engine.add_stage(Box::new(StructuralStage::new(engine.config.clone())));
        engine.add_stage(Box::new(AuthorizationStage::new(engine.registry.clone())));
        engine.add_stage(Box::new(ApplicationStage::new(engine.registry.clone())));
        engine
    }

    pub fn add_stage(&mut self, stage: Box<dyn ValidationStage>) {
        self.stages.push(stage);
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run `op` through every stage, stopping at the first failure.
    ///
    /// An engine without stages rejects everything.
    pub fn validate(
        &self,
        op: &ValidationOp,
        context: &ValidationContext<'_>,
    ) -> Result<ValidationReport, ValidationError> {
        let pipeline_start = Instant::now();
        let rules_hash = self.rules_hash()?;

        if self.stages.is_empty() {
            return Ok(ValidationReport {
                result: ValidationResult::invalid("validation pipeline has no stages"),
                rules_hash,
                stage_results: Vec::new(),
                elapsed: pipeline_start.elapsed(),
            });
        }

        let mut stage_results = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let stage_start = Instant::now();
            let decision = stage.evaluate(op, context)?;

            let reason = match &decision {
                StageDecision::Pass => None,
                StageDecision::Fail { reason } => Some(reason.clone()),
            };
            stage_results.push(StageResult {
                stage_name: stage.name().to_string(),
                passed: decision.is_pass(),
                reason,
                elapsed: stage_start.elapsed(),
            });

            if let StageDecision::Fail { reason } = decision {
                debug!(
                    op = op.name(),
                    author = %op.author(),
                    stage = stage.name(),
                    %reason,
                    "proposal rejected"
                );
                return Ok(ValidationReport {
                    result: ValidationResult::Invalid(reason),
                    rules_hash,
                    stage_results,
                    elapsed: pipeline_start.elapsed(),
                });
            }
        }

        Ok(ValidationReport {
            result: ValidationResult::Valid,
            rules_hash,
            stage_results,
            elapsed: pipeline_start.elapsed(),
        })
    }

    /// BLAKE3 fingerprint of the active configuration, validator table,
    /// and stage order.
    pub fn rules_hash(&self) -> Result<Address, ValidationError> {
        let stages: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        RULES_HASHER
            .hash_json(&(&self.config, self.registry.signature(), stages))
            .map_err(|e| ValidationError::Config(e.to_string()))
    }
}

impl std::fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationEngine")
            .field("stages", &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}
