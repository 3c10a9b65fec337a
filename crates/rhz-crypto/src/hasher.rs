use rhz_types::Address;

/// Plain BLAKE3-256 address of arbitrary bytes.
///
/// Pure and deterministic: equal inputs always yield equal addresses.
pub fn address_of(bytes: &[u8]) -> Address {
    Address::of(bytes)
}

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"rhz-entry-v1"`,
/// `"rhz-action-v1"`) that is prepended to every hash computation, so an
/// entry and an action with identical bytes never share an address.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for entry content.
    pub const ENTRY: Self = Self {
        domain: "rhz-entry-v1",
    };
    /// Hasher for chain actions.
    pub const ACTION: Self = Self {
        domain: "rhz-action-v1",
    };
    /// Hasher for path anchors.
    pub const PATH: Self = Self {
        domain: "rhz-path-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Address {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Address::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<Address, HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Verify that data produces the expected address.
    pub fn verify(&self, data: &[u8], expected: &Address) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Errors from hashing operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::ENTRY.hash(data), ContentHasher::ENTRY.hash(data));
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        let entry = ContentHasher::ENTRY.hash(data);
        let action = ContentHasher::ACTION.hash(data);
        let path = ContentHasher::PATH.hash(data);
        assert_ne!(entry, action);
        assert_ne!(entry, path);
        assert_ne!(action, path);
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::ENTRY.hash(b"original");
        assert!(ContentHasher::ENTRY.verify(b"original", &id));
        assert!(!ContentHasher::ENTRY.verify(b"tampered", &id));
    }

    #[test]
    fn hash_json_matches_hash_of_encoding() {
        let value = serde_json::json!({"key": "value", "num": 42});
        let id = ContentHasher::ACTION.hash_json(&value).unwrap();
        let bytes = serde_json::to_vec(&value).unwrap();
        assert_eq!(id, ContentHasher::ACTION.hash(&bytes));
    }

    #[test]
    fn address_of_has_no_domain() {
        assert_eq!(address_of(b"test"), address_of(b"test"));
        assert_ne!(address_of(b"test"), ContentHasher::ENTRY.hash(b"test"));
    }
}
