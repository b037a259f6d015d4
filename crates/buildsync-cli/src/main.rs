mod cli_args;
mod config_file;
mod runtime;
mod secret_store;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli_args::{Cli, CliCommand};
use crate::config_file::BuildsyncConfigFile;
use crate::runtime::{build_syncers, run_once, run_until_shutdown};
use crate::secret_store::{EnvSecretStore, JsonFileSecretStore, SecretStore};

fn init_tracing(default_directive: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn secret_store_for(cli: &Cli) -> Box<dyn SecretStore> {
    match cli.secrets_file.as_ref() {
        Some(path) => Box::new(JsonFileSecretStore::new(path.clone())),
        None => Box::new(EnvSecretStore),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    if let Some(CliCommand::SetSecret { key, value }) = cli.command.as_ref() {
        let Some(path) = cli.secrets_file.as_ref() else {
            bail!("set-secret requires --secrets-file");
        };
        let store = JsonFileSecretStore::new(path.clone());
        store.write(key, value)?;
        tracing::info!(key = %key, path = %store.path().display(), "secret stored");
        return Ok(());
    }

    let config = BuildsyncConfigFile::load(&cli.config)?;
    let secrets = secret_store_for(&cli);
    let syncers = build_syncers(&config, secrets.as_ref(), &cli.state_dir)
        .context("failed to initialize syncers")?;

    if cli.once {
        run_once(&syncers, &cli.state_dir).await
    } else {
        run_until_shutdown(&syncers, &cli.state_dir).await
    }
}
