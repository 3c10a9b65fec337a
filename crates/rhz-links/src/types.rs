//! Core link types.

use std::fmt;

use rhz_types::{Address, AgentPubKey, LinkTag, LinkType, Timestamp};
use serde::{Deserialize, Serialize};

/// Identity of a link: the address of the action that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(pub Address);

impl LinkId {
    pub fn address(&self) -> Address {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Address> for LinkId {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

/// A directed, typed, tagged edge. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub base: Address,
    pub target: Address,
    pub link_type: LinkType,
    pub tag: LinkTag,
    pub author: AgentPubKey,
    pub timestamp: Timestamp,
}

/// A link as kept in the index, with its tombstone if it was deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub link: Link,
    /// Address of the `DeleteLink` action, if any.
    pub deleted_by: Option<Address>,
}

impl LinkRecord {
    pub fn is_live(&self) -> bool {
        self.deleted_by.is_none()
    }
}
