//! Secret resolution for hosting tokens and CI passwords.
//!
//! Config files name secrets by key; the engine never sees the values. Keys
//! resolve through a `SecretStore` while clients are being constructed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use buildsync_core::write_text_atomic;
use serde::{Deserialize, Serialize};

pub const SECRET_STORE_SCHEMA_VERSION: u32 = 1;

pub trait SecretStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// Resolves `key` and fails with the key name when it is missing or blank.
pub fn require_secret(store: &dyn SecretStore, key: &str) -> Result<String> {
    store
        .read(key)?
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("secret '{key}' is not set"))
}

#[derive(Debug, Clone, Default)]
/// Reads secrets from environment variables named after the key.
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(std::env::var(key).ok())
    }

    fn write(&self, key: &str, _value: &str) -> Result<()> {
        bail!("environment secret store is read-only; cannot store '{key}'")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SecretStoreFile {
    schema_version: u32,
    #[serde(default)]
    secrets: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct JsonFileSecretStore {
    path: PathBuf,
}

impl JsonFileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let file = serde_json::from_str::<SecretStoreFile>(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        if file.schema_version != SECRET_STORE_SCHEMA_VERSION {
            bail!(
                "unsupported secret store schema: expected {}, found {}",
                SECRET_STORE_SCHEMA_VERSION,
                file.schema_version
            );
        }
        Ok(file.secrets)
    }
}

impl SecretStore for JsonFileSecretStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut secrets = self.load()?;
        secrets.insert(key.to_string(), value.to_string());
        let file = SecretStoreFile {
            schema_version: SECRET_STORE_SCHEMA_VERSION,
            secrets,
        };
        let mut payload =
            serde_json::to_string_pretty(&file).context("failed to serialize secret store")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}
