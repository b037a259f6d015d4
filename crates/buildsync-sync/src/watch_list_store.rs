use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use buildsync_core::write_text_atomic;
use serde::{Deserialize, Serialize};

pub const WATCH_LIST_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WatchListState {
    schema_version: u32,
    repo: String,
    #[serde(default)]
    watched_branches: BTreeMap<String, bool>,
}

#[derive(Debug, Clone)]
/// JSON file holding the branch watch map of one syncer.
pub struct WatchListStore {
    path: PathBuf,
}

impl WatchListStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Loads the stored watch map. A missing file or one written for a
    /// different repository yields `None`.
    pub fn load(&self, repo: &str) -> Result<Option<BTreeMap<String, bool>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read watch list {}", self.path.display()))?;
        let state = serde_json::from_str::<WatchListState>(&raw)
            .with_context(|| format!("failed to parse watch list {}", self.path.display()))?;
        if state.schema_version != WATCH_LIST_SCHEMA_VERSION {
            bail!(
                "unsupported watch list schema: expected {}, found {}",
                WATCH_LIST_SCHEMA_VERSION,
                state.schema_version
            );
        }
        if state.repo != repo {
            tracing::warn!(
                path = %self.path.display(),
                stored_repo = %state.repo,
                repo,
                "ignoring watch list written for another repository"
            );
            return Ok(None);
        }
        Ok(Some(state.watched_branches))
    }

    pub fn save(&self, repo: &str, watched_branches: &BTreeMap<String, bool>) -> Result<()> {
        let state = WatchListState {
            schema_version: WATCH_LIST_SCHEMA_VERSION,
            repo: repo.to_string(),
            watched_branches: watched_branches.clone(),
        };
        let mut payload =
            serde_json::to_string_pretty(&state).context("failed to serialize watch list")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
    }
}
