//! The on-disk state directory: manifest, agent key, and DHT snapshot.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use rhz_cell::{Cell, Dht};
use rhz_crypto::AgentKey;
use rhz_validate::ValidationEngine;
use tracing::info;

use crate::manifest::{Manifest, DEFAULT_MANIFEST};

pub const MANIFEST_FILE: &str = "rhz.toml";
pub const KEY_FILE: &str = "agent.key";
pub const DHT_FILE: &str = "dht.json";

pub struct Workspace {
    root: PathBuf,
    pub manifest: Manifest,
    pub cell: Cell,
}

impl Workspace {
    /// Lay out a fresh state directory. Refuses to clobber an existing one
    /// unless `force` is set.
    pub fn init(root: &Path, force: bool) -> anyhow::Result<AgentKey> {
        if root.join(MANIFEST_FILE).exists() && !force {
            bail!(
                "{} already holds a Rhizome state directory (use --force to overwrite)",
                root.display()
            );
        }
        fs::create_dir_all(root).with_context(|| format!("creating {}", root.display()))?;
        fs::write(root.join(MANIFEST_FILE), DEFAULT_MANIFEST)?;

        let key = AgentKey::generate();
        fs::write(root.join(KEY_FILE), key.to_hex())?;

        let manifest = Manifest::from_toml_str(DEFAULT_MANIFEST)?;
        Dht::new(&manifest.cell).save(root.join(DHT_FILE))?;
        info!(root = %root.display(), "state directory initialized");
        Ok(key)
    }

    pub fn open(root: &Path) -> anyhow::Result<Self> {
        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            bail!("no Rhizome state at {} (run `rhz init`)", root.display());
        }
        let manifest = Manifest::load(&manifest_path)?;

        let key_hex = fs::read_to_string(root.join(KEY_FILE))
            .with_context(|| format!("reading {KEY_FILE}"))?;
        let key = AgentKey::from_hex(key_hex.trim()).context("agent.key is not a valid key")?;

        let dht_path = root.join(DHT_FILE);
        let dht = if dht_path.exists() {
            Dht::load(&dht_path, &manifest.cell)
                .with_context(|| format!("loading {}", dht_path.display()))?
        } else {
            Dht::new(&manifest.cell)
        };

        let engine =
            ValidationEngine::with_default_stages(manifest.cell.validation(), manifest.registry()?);
        let cell = Cell::new(Arc::new(key), Arc::new(dht), Arc::new(engine));
        Ok(Self {
            root: root.to_path_buf(),
            manifest,
            cell,
        })
    }

    /// Persist the DHT after a write.
    pub fn save(&self) -> anyhow::Result<()> {
        self.cell.dht().save(self.root.join(DHT_FILE))?;
        Ok(())
    }
}
