//! Path anchors.
//!
//! A path is a dotted, hierarchical key such as `"requests.status.open"`
//! mapped deterministically to a base address for index links. The same
//! string always yields the same address.
//!
//! Strict validation (used by [`Path::parse`]):
//! - Must be non-empty
//! - Must not contain whitespace or control characters
//! - Must not start or end with `.`
//! - Components between dots must be non-empty (no `..`)

use std::fmt;

use rhz_crypto::ContentHasher;
use rhz_types::Address;
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, LinkResult};

/// Separator between path components.
pub const DELIMITER: &str = ".";

/// One segment of a path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Component(String);

impl Component {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Component {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Component {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A hierarchical anchor key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(Vec<Component>);

/// Validate a dotted path string, returning `Ok(())` if valid.
pub fn validate_path(s: &str) -> LinkResult<()> {
    let fail = |reason: &str| LinkError::InvalidPath {
        path: s.to_string(),
        reason: reason.into(),
    };

    if s.is_empty() {
        return Err(fail("path must not be empty"));
    }
    if let Some(ch) = s.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(LinkError::InvalidPath {
            path: s.to_string(),
            reason: format!("contains forbidden character: {ch:?}"),
        });
    }
    if s.starts_with(DELIMITER) || s.ends_with(DELIMITER) {
        return Err(fail("must not start or end with '.'"));
    }
    if s.split(DELIMITER).any(str::is_empty) {
        return Err(fail("components must not be empty"));
    }
    Ok(())
}

impl Path {
    /// The root path (no components).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse with strict validation.
    pub fn parse(s: &str) -> LinkResult<Self> {
        validate_path(s)?;
        Ok(Self::from(s))
    }

    pub fn components(&self) -> &[Component] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The last component.
    pub fn leaf(&self) -> Option<&Component> {
        self.0.last()
    }

    /// This path truncated by one level, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// This path extended by one component.
    pub fn child(&self, component: impl Into<Component>) -> Self {
        let mut components = self.0.clone();
        components.push(component.into());
        Self(components)
    }

    /// PATH-domain hash of the length-prefixed components.
    pub fn address(&self) -> Address {
        let mut bytes = Vec::new();
        for component in &self.0 {
            let raw = component.as_str().as_bytes();
            bytes.extend_from_slice(&(raw.len() as u32).to_be_bytes());
            bytes.extend_from_slice(raw);
        }
        ContentHasher::PATH.hash(&bytes)
    }
}

/// Lenient conversion: empty components are dropped, so `"a..b."` and
/// `"a.b"` name the same path. Use [`Path::parse`] to reject such input.
impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self(
            s.split(DELIMITER)
                .filter(|c| !c.is_empty())
                .map(Component::from)
                .collect(),
        )
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Vec<Component>> for Path {
    fn from(components: Vec<Component>) -> Self {
        Self(components)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.0.iter().map(Component::as_str).collect();
        f.write_str(&parts.join(DELIMITER))
    }
}
