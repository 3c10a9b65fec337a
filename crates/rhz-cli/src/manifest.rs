//! `rhz.toml`: cell settings plus the application's entry and link types.

use std::path::Path as FsPath;

use anyhow::{bail, Context};
use rhz_cell::CellConfig;
use rhz_types::{EntryType, LinkType};
use rhz_validate::{MutationPolicy, ValidationResult, ValidatorRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MANIFEST: &str = r#"# Rhizome cell manifest.

[cell]
max_entry_bytes = 4194304
max_tag_bytes = 1000

[cell.retry]
max_attempts = 5
backoff = "exponential"

[[entry_types]]
name = "note"
version = 1
required = ["title"]

[[entry_types]]
name = "page"
version = 1
required = ["title", "body"]
policy = "any_agent"

[[link_types]]
id = 0
name = "index"
policy = "any_agent"

[[link_types]]
id = 1
name = "comments"
target_type = "note"
"#;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub cell: CellConfig,
    #[serde(default)]
    pub entry_types: Vec<EntryTypeDecl>,
    #[serde(default)]
    pub link_types: Vec<LinkTypeDecl>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryTypeDecl {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u16,
    /// Top-level JSON fields every entry must carry, non-null.
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub policy: MutationPolicy,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkTypeDecl {
    pub id: u8,
    pub name: String,
    #[serde(default)]
    pub policy: MutationPolicy,
    /// When set, targets must be live entries of this type.
    #[serde(default)]
    pub target_type: Option<String>,
}

fn default_version() -> u16 {
    1
}

impl Manifest {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let manifest: Self = toml::from_str(s).context("parsing rhz.toml")?;
        manifest.cell.check()?;
        Ok(manifest)
    }

    pub fn load(path: &FsPath) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Build the validator table declared by this manifest.
    pub fn registry(&self) -> anyhow::Result<ValidatorRegistry> {
        let mut registry = ValidatorRegistry::new();
        for decl in &self.entry_types {
            let entry_type = EntryType::new(decl.name.clone(), decl.version);
            let required = decl.required.clone();
            registry.register_entry_type(entry_type, decl.policy, move |_, entry, _| {
                check_required(&required, entry.decode::<Value>().ok())
            })?;
        }
        for decl in &self.link_types {
            let target_type = decl
                .target_type
                .as_deref()
                .map(str::parse::<EntryType>)
                .transpose()
                .with_context(|| format!("link type {}", decl.name))?;
            registry.register_link_type(
                LinkType(decl.id),
                decl.name.clone(),
                decl.policy,
                move |_, _, target, _, ctx| match &target_type {
                    Some(t) if !ctx.is_live_of_type(target, t) => {
                        ValidationResult::invalid(format!("target must be a live {t} entry"))
                    }
                    _ => ValidationResult::Valid,
                },
            )?;
        }
        Ok(registry)
    }

    /// Resolve a link type given by name or number.
    pub fn link_type(&self, name_or_id: &str) -> anyhow::Result<LinkType> {
        if let Some(decl) = self.link_types.iter().find(|d| d.name == name_or_id) {
            return Ok(LinkType(decl.id));
        }
        match name_or_id.parse::<u8>() {
            Ok(id) if self.link_types.iter().any(|d| d.id == id) => Ok(LinkType(id)),
            _ => bail!("unknown link type {name_or_id:?}"),
        }
    }

    /// Resolve `name` to a declared entry type, taking the highest version
    /// when none is given.
    pub fn entry_type(&self, name: &str) -> anyhow::Result<EntryType> {
        if name.contains('@') {
            return Ok(name.parse()?);
        }
        self.entry_types
            .iter()
            .filter(|d| d.name == name)
            .map(|d| d.version)
            .max()
            .map(|version| EntryType::new(name, version))
            .with_context(|| format!("unknown entry type {name:?}"))
    }
}

fn check_required(required: &[String], value: Option<Value>) -> ValidationResult {
    let Some(Value::Object(fields)) = value else {
        return ValidationResult::invalid("entry must be a JSON object");
    };
    match required
        .iter()
        .find(|f| fields.get(f.as_str()).map_or(true, Value::is_null))
    {
        Some(missing) => ValidationResult::invalid(format!("missing required field `{missing}`")),
        None => ValidationResult::Valid,
    }
}
