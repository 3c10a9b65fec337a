//! Append-only action chains for Rhizome.
//!
//! Every agent owns one chain. Each action references its predecessor by
//! address and carries a strictly increasing sequence number, so a chain is
//! a tamper-evident history of everything the agent has written.
//!
//! This crate provides:
//! - [`Action`] / [`ActionKind`] / [`ActionRecord`]: signed chain entries
//! - `ChainWriter` / `ChainReader` trait boundaries
//! - [`InMemoryChain`] with compare-and-swap commits on the chain head
//! - [`ChainAuditor`] collecting every integrity violation in a chain

pub mod action;
pub mod audit;
pub mod error;
pub mod memory;
pub mod traits;

pub use action::{Action, ActionKind, ActionRecord};
pub use audit::{AuditReport, ChainAuditor, Violation, ViolationKind};
pub use error::{ChainError, ChainResult};
pub use memory::InMemoryChain;
pub use traits::{ChainReader, ChainWriter};
