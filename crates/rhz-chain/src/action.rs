use std::fmt;

use rhz_crypto::{AgentSigner, ChainLink, ContentHasher, HasherError, Signature};
use rhz_types::{Address, AgentPubKey, EntryType, LinkTag, LinkType, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, ChainResult};

/// One state transition in an agent's chain.
///
/// `prev_action` is absent only at `seq == 0`. The action's address is the
/// ACTION-domain hash of its JSON encoding; the address is what gets signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub author: AgentPubKey,
    pub seq: u32,
    pub timestamp: Timestamp,
    pub prev_action: Option<Address>,
    pub kind: ActionKind,
}

/// What an action does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Starts a lineage. The action's own address becomes the lineage id.
    Create {
        entry_type: EntryType,
        entry_address: Address,
    },
    /// Appends a revision to the lineage anchored at `original_action`.
    /// `previous_action` is the tip the author saw when proposing.
    Update {
        entry_type: EntryType,
        original_action: Address,
        original_entry: Address,
        previous_action: Address,
        entry_address: Address,
    },
    /// Terminates the lineage anchored at `original_action`.
    Delete {
        original_action: Address,
        original_entry: Address,
    },
    CreateLink {
        base: Address,
        target: Address,
        link_type: LinkType,
        tag: LinkTag,
    },
    /// Tombstones the link created by `link_add_action`.
    DeleteLink { link_add_action: Address, base: Address },
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::CreateLink { .. } => "create_link",
            Self::DeleteLink { .. } => "delete_link",
        }
    }

    /// The entry this action writes, for create and update.
    pub fn entry_address(&self) -> Option<Address> {
        match self {
            Self::Create { entry_address, .. } | Self::Update { entry_address, .. } => {
                Some(*entry_address)
            }
            _ => None,
        }
    }

    pub fn entry_type(&self) -> Option<&EntryType> {
        match self {
            Self::Create { entry_type, .. } | Self::Update { entry_type, .. } => Some(entry_type),
            _ => None,
        }
    }

    /// The lineage this action mutates, for update and delete.
    pub fn original_action(&self) -> Option<Address> {
        match self {
            Self::Update {
                original_action, ..
            }
            | Self::Delete {
                original_action, ..
            } => Some(*original_action),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Action {
    /// Content address of this action.
    pub fn address(&self) -> Result<Address, HasherError> {
        ContentHasher::ACTION.hash_json(self)
    }

    pub fn is_genesis(&self) -> bool {
        self.seq == 0
    }
}

/// A committed action: the action, its address, and the author's signature
/// over that address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub address: Address,
    pub action: Action,
    pub signature: Signature,
}

impl ActionRecord {
    /// Address and sign an action. The signer must be the action's author.
    pub fn sign(action: Action, signer: &dyn AgentSigner) -> ChainResult<Self> {
        let agent = signer.agent();
        if agent != action.author {
            return Err(ChainError::AuthorMismatch {
                author: action.author,
                signer: agent,
            });
        }
        let address = action.address()?;
        let signature = signer.sign(address.as_bytes());
        Ok(Self {
            address,
            action,
            signature,
        })
    }

    /// Check the signature against the author's key.
    pub fn verify_signature(&self) -> bool {
        rhz_crypto::verify(&self.action.author, self.address.as_bytes(), &self.signature)
    }

    pub fn author(&self) -> &AgentPubKey {
        &self.action.author
    }

    pub fn seq(&self) -> u32 {
        self.action.seq
    }

    pub fn kind(&self) -> &ActionKind {
        &self.action.kind
    }
}

impl ChainLink for ActionRecord {
    fn address(&self) -> Address {
        self.address
    }

    fn prev_address(&self) -> Option<Address> {
        self.action.prev_action
    }

    fn sequence(&self) -> u32 {
        self.action.seq
    }

    fn computed_address(&self) -> Result<Address, HasherError> {
        self.action.address()
    }
}
