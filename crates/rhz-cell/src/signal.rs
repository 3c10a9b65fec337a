use rhz_links::{Link, LinkId};
use rhz_types::{Address, AgentPubKey};
use serde::Serialize;

/// Notification broadcast after a commit becomes visible.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    EntryCreated {
        original: Address,
        author: AgentPubKey,
    },
    EntryUpdated {
        original: Address,
        action: Address,
        previous: Address,
        author: AgentPubKey,
    },
    EntryDeleted {
        original: Address,
        action: Address,
        author: AgentPubKey,
    },
    LinkCreated {
        link: Link,
    },
    LinkDeleted {
        link: LinkId,
        action: Address,
        author: AgentPubKey,
    },
}

impl Signal {
    pub fn author(&self) -> &AgentPubKey {
        match self {
            Self::EntryCreated { author, .. }
            | Self::EntryUpdated { author, .. }
            | Self::EntryDeleted { author, .. }
            | Self::LinkDeleted { author, .. } => author,
            Self::LinkCreated { link } => &link.author,
        }
    }
}
