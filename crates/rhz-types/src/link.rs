use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Application-scoped link type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkType(pub u8);

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-type:{}", self.0)
    }
}

/// Opaque tag bytes used for secondary filtering, e.g. a status or sort key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkTag(Vec<u8>);

impl LinkTag {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for LinkTag {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for LinkTag {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Filter over link tags used by link queries.
#[derive(Clone)]
pub enum TagPredicate {
    /// Tag equals the given bytes.
    Exact(LinkTag),
    /// Tag starts with the given bytes.
    Prefix(Vec<u8>),
    /// Arbitrary caller-supplied predicate.
    Custom(Arc<dyn Fn(&LinkTag) -> bool + Send + Sync>),
}

impl TagPredicate {
    pub fn custom(f: impl Fn(&LinkTag) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    pub fn matches(&self, tag: &LinkTag) -> bool {
        match self {
            Self::Exact(expected) => expected == tag,
            Self::Prefix(prefix) => tag.as_bytes().starts_with(prefix),
            Self::Custom(f) => f(tag),
        }
    }
}

impl fmt::Debug for TagPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(tag) => f.debug_tuple("Exact").field(tag).finish(),
            Self::Prefix(prefix) => f.debug_tuple("Prefix").field(prefix).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
