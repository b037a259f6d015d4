use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use buildsync_hosting::GitService;
use buildsync_sync::{BuildTemplate, ProjectConfig, SyncerConfig};
use buildsync_types::Trigger;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
/// Top-level `buildsync.toml` layout.
pub struct BuildsyncConfigFile {
    #[serde(default)]
    pub syncers: Vec<SyncerEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncerEntry {
    pub id: String,
    pub service: GitService,
    pub hosting: HostingEntry,
    pub xcode_server: XcodeServerEntry,
    pub project: ProjectConfig,
    pub template: BuildTemplate,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub syncer: SyncerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostingEntry {
    #[serde(default)]
    pub api_base: Option<String>,
    /// Secret-store key holding the API token.
    pub token_key: String,
    #[serde(default)]
    pub status_context: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XcodeServerEntry {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password_key: Option<String>,
}

impl BuildsyncConfigFile {
    pub fn parse(raw: &str) -> Result<Self> {
        let config = toml::from_str::<Self>(raw).context("failed to parse buildsync config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.syncers.is_empty() {
            bail!("config declares no [[syncers]] entries");
        }
        let mut ids = BTreeSet::new();
        for entry in &self.syncers {
            let id = entry.id.trim();
            if id.is_empty() || id.contains(['/', '\\']) {
                bail!("syncer id '{}' must be non-empty and contain no path separators", entry.id);
            }
            // Ids become file names under the state directory.
            if id.chars().all(|c| c == '.') {
                bail!("syncer id '{}' must not consist only of dots", entry.id);
            }
            if !ids.insert(id) {
                bail!("duplicate syncer id '{id}'");
            }
            if entry.project.repo.split('/').filter(|part| !part.is_empty()).count() != 2 {
                bail!(
                    "syncer '{id}': project.repo '{}' must be in owner/name form",
                    entry.project.repo
                );
            }
            entry
                .syncer
                .validate()
                .with_context(|| format!("syncer '{id}'"))?;
        }
        Ok(())
    }
}
