use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "buildsync",
    about = "Keeps pull requests and watched branches in sync with Xcode Server bots",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "BUILDSYNC_CONFIG",
        default_value = "buildsync.toml",
        help = "Path to the TOML file declaring one [[syncers]] entry per repository."
    )]
    pub config: PathBuf,

    #[arg(
        long = "state-dir",
        env = "BUILDSYNC_STATE_DIR",
        default_value = ".buildsync",
        help = "Directory holding per-syncer watch lists and state snapshots."
    )]
    pub state_dir: PathBuf,

    #[arg(
        long = "secrets-file",
        env = "BUILDSYNC_SECRETS_FILE",
        help = "Optional JSON secret store. Secrets are read from the environment when unset."
    )]
    pub secrets_file: Option<PathBuf>,

    #[arg(
        long,
        env = "BUILDSYNC_LOG",
        default_value = "info",
        help = "Default tracing filter directive. RUST_LOG takes precedence when set."
    )]
    pub log: String,

    #[arg(
        long,
        default_value_t = false,
        help = "Run a single sync cycle per syncer and exit non-zero if any cycle reported an error."
    )]
    pub once: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Store a secret in the JSON secret store given by --secrets-file.
    SetSecret {
        key: String,
        #[arg(long, env = "BUILDSYNC_SECRET_VALUE", hide_env_values = true)]
        value: String,
    },
}
