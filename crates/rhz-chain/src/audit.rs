use rhz_crypto::HashChainVerifier;
use rhz_types::AgentPubKey;

use crate::action::ActionRecord;
use crate::error::ChainResult;
use crate::traits::ChainReader;

/// Result of auditing one author's chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditReport {
    pub author: AgentPubKey,
    pub action_count: u32,
    pub violations: Vec<Violation>,
}

impl AuditReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific integrity violation detected during an audit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub seq: u32,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    SequenceGap,
    BrokenLink,
    HashMismatch,
    AuthorChanged,
    TimestampRegression,
    BadSignature,
}

/// Chain auditor. Unlike `validate_chain_integrity` it does not stop at the
/// first fault.
pub struct ChainAuditor;

impl ChainAuditor {
    pub fn audit<R: ChainReader + ?Sized>(
        reader: &R,
        author: &AgentPubKey,
    ) -> ChainResult<AuditReport> {
        let records = reader.read_chain(author)?;
        Ok(AuditReport {
            author: *author,
            action_count: records.len() as u32,
            violations: Self::inspect(author, &records),
        })
    }

    /// Audit every chain the reader knows about.
    pub fn audit_all<R: ChainReader + ?Sized>(reader: &R) -> ChainResult<Vec<AuditReport>> {
        let mut reports = Vec::new();
        for author in reader.authors()? {
            reports.push(Self::audit(reader, &author)?);
        }
        Ok(reports)
    }

    /// Every violation in `records`, genesis first.
    pub fn inspect(author: &AgentPubKey, records: &[ActionRecord]) -> Vec<Violation> {
        use rhz_crypto::LinkageError;

        let mut violations = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let prev = index.checked_sub(1).map(|p| &records[p]);
            let seq = record.seq();

            if let Err(err) = HashChainVerifier::verify_link(index, record, prev) {
                let kind = match err {
                    LinkageError::SequenceGap { .. } => ViolationKind::SequenceGap,
                    LinkageError::HashMismatch { .. } => ViolationKind::HashMismatch,
                    LinkageError::GenesisHasPrev
                    | LinkageError::BrokenLink { .. }
                    | LinkageError::MissingPrev { .. } => ViolationKind::BrokenLink,
                };
                violations.push(Violation {
                    seq,
                    kind,
                    description: err.to_string(),
                });
            }

            if record.author() != author {
                violations.push(Violation {
                    seq,
                    kind: ViolationKind::AuthorChanged,
                    description: format!("action authored by {}", record.author()),
                });
            }

            if let Some(p) = prev {
                if record.action.timestamp < p.action.timestamp {
                    violations.push(Violation {
                        seq,
                        kind: ViolationKind::TimestampRegression,
                        description: format!(
                            "timestamp {} precedes previous {}",
                            record.action.timestamp, p.action.timestamp
                        ),
                    });
                }
            }

            if !record.verify_signature() {
                violations.push(Violation {
                    seq,
                    kind: ViolationKind::BadSignature,
                    description: format!("signature on {} does not verify", record.address),
                });
            }
        }
        violations
    }
}
