//! Cryptographic primitives for Rhizome.
//!
//! Provides content addressing (plain and domain-separated BLAKE3), Ed25519
//! agent signing/verification, and linkage verification for append-only
//! action chains.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod chain;
pub mod hasher;
pub mod signer;

pub use chain::{ChainLink, HashChainVerifier, LinkageError};
pub use hasher::{address_of, ContentHasher, HasherError};
pub use signer::{verify, AgentKey, AgentSigner, Signature, SignatureError};
