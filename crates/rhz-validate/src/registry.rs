use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rhz_types::{Address, Entry, EntryType, LinkTag, LinkType};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::op::{ValidationContext, ValidationResult};

/// Validator for entries of one type. Runs on create and update.
pub type EntryValidatorFn =
    Arc<dyn Fn(&EntryType, &Entry, &ValidationContext<'_>) -> ValidationResult + Send + Sync>;

/// Validator for links of one type. Arguments are type, base, target, tag.
pub type LinkValidatorFn = Arc<
    dyn Fn(LinkType, &Address, &Address, &LinkTag, &ValidationContext<'_>) -> ValidationResult
        + Send
        + Sync,
>;

/// Who may update or delete what someone else created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPolicy {
    /// Only the agent that created the lineage (or link).
    #[default]
    OriginalAuthor,
    AnyAgent,
}

pub struct EntryTypeDef {
    pub policy: MutationPolicy,
    pub validator: EntryValidatorFn,
}

pub struct LinkTypeDef {
    pub name: String,
    pub policy: MutationPolicy,
    pub validator: LinkValidatorFn,
}

/// Closed dispatch table from entry and link types to their validators.
///
/// Built once at start-up and then frozen inside a `ValidationEngine`.
/// Types that were never registered are rejected, not waved through.
#[derive(Default)]
pub struct ValidatorRegistry {
    entry_types: BTreeMap<EntryType, EntryTypeDef>,
    link_types: BTreeMap<LinkType, LinkTypeDef>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry type with the default mutation policy.
    pub fn register_validator<F>(
        &mut self,
        entry_type: EntryType,
        validator: F,
    ) -> Result<&mut Self, ValidationError>
    where
        F: Fn(&EntryType, &Entry, &ValidationContext<'_>) -> ValidationResult
            + Send
            + Sync
            + 'static,
    {
        self.register_entry_type(entry_type, MutationPolicy::default(), validator)
    }

    pub fn register_entry_type<F>(
        &mut self,
        entry_type: EntryType,
        policy: MutationPolicy,
        validator: F,
    ) -> Result<&mut Self, ValidationError>
    where
        F: Fn(&EntryType, &Entry, &ValidationContext<'_>) -> ValidationResult
            + Send
            + Sync
            + 'static,
    {
        if self.entry_types.contains_key(&entry_type) {
            return Err(ValidationError::Config(format!(
                "entry type {entry_type} registered twice"
            )));
        }
        self.entry_types.insert(
            entry_type,
            EntryTypeDef {
                policy,
                validator: Arc::new(validator),
            },
        );
        Ok(self)
    }

    /// Register a link type with the default mutation policy.
    pub fn register_link_validator<F>(
        &mut self,
        link_type: LinkType,
        validator: F,
    ) -> Result<&mut Self, ValidationError>
    where
        F: Fn(LinkType, &Address, &Address, &LinkTag, &ValidationContext<'_>) -> ValidationResult
            + Send
            + Sync
            + 'static,
    {
        self.register_link_type(
            link_type,
            link_type.to_string(),
            MutationPolicy::default(),
            validator,
        )
    }

    pub fn register_link_type<F>(
        &mut self,
        link_type: LinkType,
        name: impl Into<String>,
        policy: MutationPolicy,
        validator: F,
    ) -> Result<&mut Self, ValidationError>
    where
        F: Fn(LinkType, &Address, &Address, &LinkTag, &ValidationContext<'_>) -> ValidationResult
            + Send
            + Sync
            + 'static,
    {
        if self.link_types.contains_key(&link_type) {
            return Err(ValidationError::Config(format!(
                "{link_type} registered twice"
            )));
        }
        self.link_types.insert(
            link_type,
            LinkTypeDef {
                name: name.into(),
                policy,
                validator: Arc::new(validator),
            },
        );
        Ok(self)
    }

    pub fn entry_type(&self, entry_type: &EntryType) -> Option<&EntryTypeDef> {
        self.entry_types.get(entry_type)
    }

    pub fn link_type(&self, link_type: LinkType) -> Option<&LinkTypeDef> {
        self.link_types.get(&link_type)
    }

    /// Find a link type by its registered name.
    pub fn link_type_named(&self, name: &str) -> Option<LinkType> {
        self.link_types
            .iter()
            .find(|(_, def)| def.name == name)
            .map(|(t, _)| *t)
    }

    pub fn entry_types(&self) -> impl Iterator<Item = &EntryType> {
        self.entry_types.keys()
    }

    /// Stable description of the table, used for the rules fingerprint.
    pub(crate) fn signature(&self) -> Vec<String> {
        let entries = self
            .entry_types
            .iter()
            .map(|(t, d)| format!("entry:{t}:{:?}", d.policy));
        let links = self
            .link_types
            .iter()
            .map(|(t, d)| format!("link:{}:{}:{:?}", t.0, d.name, d.policy));
        entries.chain(links).collect()
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("entry_types", &self.entry_types.keys().collect::<Vec<_>>())
            .field("link_types", &self.link_types.keys().collect::<Vec<_>>())
            .finish()
    }
}
