use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use buildsync_core::write_text_atomic;
use buildsync_hosting::HostingClientConfig;
use buildsync_slack::SlackNotifier;
use buildsync_sync::{SyncContext, Syncer, SyncerEvent, SyncerSnapshot, WatchListStore};
use buildsync_types::{CiServerClient, Notifier};
use buildsync_xcode_server::{XcodeServerClient, XcodeServerConfig};
use futures_util::future::join_all;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::config_file::{BuildsyncConfigFile, SyncerEntry};
use crate::secret_store::{require_secret, SecretStore};

const WATCH_LIST_FILE_NAME: &str = "watch_list.json";
const SNAPSHOT_FILE_NAME: &str = "state.json";

pub fn watch_list_path(state_dir: &Path, syncer_id: &str) -> PathBuf {
    state_dir.join(syncer_id).join(WATCH_LIST_FILE_NAME)
}

pub fn snapshot_path(state_dir: &Path, syncer_id: &str) -> PathBuf {
    state_dir.join(syncer_id).join(SNAPSHOT_FILE_NAME)
}

/// Wires the clients, notifiers, and stores for one `[[syncers]]` entry.
pub fn build_syncer(
    entry: &SyncerEntry,
    secrets: &dyn SecretStore,
    state_dir: &Path,
) -> Result<Syncer> {
    let id = entry.id.trim();
    let token = require_secret(secrets, &entry.hosting.token_key)
        .with_context(|| format!("syncer '{id}': hosting token"))?;
    let mut hosting_config = HostingClientConfig::new(token);
    hosting_config.api_base = entry.hosting.api_base.clone();
    if let Some(status_context) = entry.hosting.status_context.as_ref() {
        hosting_config.status_context = status_context.clone();
    }
    let hosting = entry
        .service
        .build_client(&hosting_config)
        .with_context(|| format!("syncer '{id}': failed to build {} client", entry.service))?;

    let mut xcode_config = XcodeServerConfig::new(entry.xcode_server.host.clone());
    if let Some(port) = entry.xcode_server.port {
        xcode_config.port = port;
    }
    xcode_config.user = entry.xcode_server.user.clone();
    if let Some(password_key) = entry.xcode_server.password_key.as_deref() {
        xcode_config.password = Some(
            require_secret(secrets, password_key)
                .with_context(|| format!("syncer '{id}': xcode server password"))?,
        );
    }
    let ci: Arc<dyn CiServerClient> = Arc::new(
        XcodeServerClient::new(&xcode_config)
            .with_context(|| format!("syncer '{id}': failed to build xcode server client"))?,
    );

    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if let Some(webhook) = entry.syncer.slack_webhook() {
        notifiers.push(Arc::new(
            SlackNotifier::new(webhook)
                .with_context(|| format!("syncer '{id}': failed to build slack notifier"))?,
        ));
    }

    let context = SyncContext {
        hosting,
        ci,
        notifiers,
        config: entry.syncer.clone(),
        build_template: entry.template.clone(),
        project: entry.project.clone(),
        triggers: entry.triggers.clone(),
    };
    let watch_store = WatchListStore::new(watch_list_path(state_dir, id));
    Syncer::new(id, context, Some(watch_store))
}

pub fn build_syncers(
    config: &BuildsyncConfigFile,
    secrets: &dyn SecretStore,
    state_dir: &Path,
) -> Result<Vec<Syncer>> {
    config
        .syncers
        .iter()
        .map(|entry| build_syncer(entry, secrets, state_dir))
        .collect()
}

pub fn persist_snapshot(path: &Path, snapshot: &SyncerSnapshot) -> Result<()> {
    let mut payload =
        serde_json::to_string_pretty(snapshot).context("failed to serialize syncer snapshot")?;
    payload.push('\n');
    write_text_atomic(path, &payload)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn persist_snapshot_or_warn(syncer: &Syncer, path: &Path) {
    if let Err(error) = persist_snapshot(path, &syncer.snapshot()) {
        tracing::warn!(
            syncer = syncer.id(),
            path = %path.display(),
            error = %format!("{error:#}"),
            "failed to persist syncer snapshot"
        );
    }
}

fn spawn_snapshot_persister(syncer: Syncer, path: PathBuf) -> JoinHandle<()> {
    let mut events = syncer.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SyncerEvent::DidFinishSyncing { .. }) => persist_snapshot_or_warn(&syncer, &path),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(syncer = syncer.id(), skipped, "snapshot persister lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Runs one cycle per syncer concurrently and fails if any cycle reported
/// an error.
pub async fn run_once(syncers: &[Syncer], state_dir: &Path) -> Result<()> {
    join_all(syncers.iter().map(Syncer::sync_now)).await;

    let mut failed = Vec::new();
    for syncer in syncers {
        persist_snapshot_or_warn(syncer, &snapshot_path(state_dir, syncer.id()));
        let snapshot = syncer.snapshot();
        if let Some(error) = snapshot.last_error {
            tracing::error!(syncer = syncer.id(), error = %error, "sync cycle failed");
            failed.push(syncer.id().to_string());
        } else {
            tracing::info!(syncer = syncer.id(), reports = ?snapshot.reports, "sync cycle finished");
        }
    }
    if !failed.is_empty() {
        bail!("sync failed for: {}", failed.join(", "));
    }
    Ok(())
}

/// Activates every syncer and keeps them running until ctrl-c.
pub async fn run_until_shutdown(syncers: &[Syncer], state_dir: &Path) -> Result<()> {
    let mut persisters = Vec::with_capacity(syncers.len());
    let mut handles = Vec::with_capacity(syncers.len());
    for syncer in syncers {
        persisters.push(spawn_snapshot_persister(
            syncer.clone(),
            snapshot_path(state_dir, syncer.id()),
        ));
        handles.push(syncer.activate()?);
    }
    tracing::info!(syncers = syncers.len(), "buildsync running; press ctrl-c to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown requested");

    for handle in &mut handles {
        handle.shutdown().await;
    }
    for persister in persisters {
        persister.abort();
    }
    for syncer in syncers {
        persist_snapshot_or_warn(syncer, &snapshot_path(state_dir, syncer.id()));
    }
    Ok(())
}
