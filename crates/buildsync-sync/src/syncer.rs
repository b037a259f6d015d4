//! Periodic, single-flight sync loop for one repository.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use buildsync_core::{current_unix_timestamp, rfc3339_from_unix};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot, watch, Mutex};
use tokio::task::JoinHandle;

use crate::context::SyncContext;
use crate::reconciler::{reconcile, WatchList};
use crate::sync_pair::sync_pairs_from;
use crate::watch_list_store::WatchListStore;

pub const SYNCER_SNAPSHOT_SCHEMA_VERSION: u32 = 1;
pub const REPORT_ALL_PULL_REQUESTS: &str = "All Pull Requests";
pub const REPORT_ALL_BOTS: &str = "All Bots";
pub const REPORT_CREATED_BOTS: &str = "Created bots";
pub const REPORT_SYNCED_BOTS: &str = "Synced bots";
pub const REPORT_DELETED_BOTS: &str = "Deleted bots";
pub const REPORT_RATE_LIMIT: &str = "Rate Limit";
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncerEvent {
    Initial,
    DidBecomeActive,
    DidStartSyncing,
    DidFinishSyncing { error: Option<String> },
    DidEncounterError { message: String },
    DidStop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Observable syncer state, replaced wholesale after every change.
pub struct SyncerSnapshot {
    pub schema_version: u32,
    pub syncer_id: String,
    pub repo: String,
    pub state: SyncerEvent,
    pub active: bool,
    pub is_syncing: bool,
    pub last_sync_started_at: Option<String>,
    pub last_sync_finished_at: Option<String>,
    pub last_successful_sync_at: Option<String>,
    pub last_error: Option<String>,
    #[serde(default)]
    pub reports: BTreeMap<String, String>,
    #[serde(default)]
    pub watched_branches: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Started,
    /// A cycle was already in flight; the trigger was dropped.
    AlreadySyncing,
}

#[derive(Default)]
struct CycleState {
    reports: BTreeMap<String, String>,
    last_error: Option<String>,
}

struct SyncerInner {
    id: String,
    context: SyncContext,
    cycle_lock: Arc<Mutex<()>>,
    snapshot_tx: watch::Sender<SyncerSnapshot>,
    events_tx: broadcast::Sender<SyncerEvent>,
    watch_store: Option<WatchListStore>,
}

#[derive(Clone)]
pub struct Syncer {
    inner: Arc<SyncerInner>,
}

fn now_rfc3339() -> String {
    rfc3339_from_unix(current_unix_timestamp())
}

impl Syncer {
    /// Builds an inactive syncer. The stored watch list, when present, is
    /// loaded first and the configured entries are applied on top of it.
    pub fn new(
        id: impl Into<String>,
        context: SyncContext,
        watch_store: Option<WatchListStore>,
    ) -> Result<Self> {
        let id = id.into();
        context
            .config
            .validate()
            .with_context(|| format!("invalid configuration for syncer {id}"))?;
        let mut watched_branches = match watch_store.as_ref() {
            Some(store) => store.load(context.repo_name())?.unwrap_or_default(),
            None => BTreeMap::new(),
        };
        watched_branches.extend(context.config.watched_branches.clone());

        let snapshot = SyncerSnapshot {
            schema_version: SYNCER_SNAPSHOT_SCHEMA_VERSION,
            syncer_id: id.clone(),
            repo: context.repo_name().to_string(),
            state: SyncerEvent::Initial,
            active: false,
            is_syncing: false,
            last_sync_started_at: None,
            last_sync_finished_at: None,
            last_successful_sync_at: None,
            last_error: None,
            reports: BTreeMap::new(),
            watched_branches,
        };
        let (snapshot_tx, _) = watch::channel(snapshot);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            inner: Arc::new(SyncerInner {
                id,
                context,
                cycle_lock: Arc::new(Mutex::new(())),
                snapshot_tx,
                events_tx,
                watch_store,
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn snapshot(&self) -> SyncerSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<SyncerSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncerEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Starts the timer loop; the first cycle runs immediately.
    pub fn activate(&self) -> Result<SyncerHandle> {
        if self.snapshot().active {
            bail!("syncer {} is already active", self.inner.id);
        }
        self.update_snapshot(|snapshot| snapshot.active = true);
        self.emit(SyncerEvent::DidBecomeActive);
        tracing::info!(
            syncer = %self.inner.id,
            repo = %self.inner.context.repo_name(),
            interval_secs = self.inner.context.config.sync_interval().as_secs(),
            "syncer activated"
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(run_syncer_loop(self.clone(), shutdown_rx));
        Ok(SyncerHandle {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Runs one cycle now unless one is already in flight.
    pub async fn sync_now(&self) -> SyncTrigger {
        match Arc::clone(&self.inner.cycle_lock).try_lock_owned() {
            Ok(_guard) => {
                self.run_cycle().await;
                SyncTrigger::Started
            }
            Err(_) => {
                self.log_dropped_trigger();
                SyncTrigger::AlreadySyncing
            }
        }
    }

    fn spawn_cycle(&self) -> SyncTrigger {
        match Arc::clone(&self.inner.cycle_lock).try_lock_owned() {
            Ok(guard) => {
                let syncer = self.clone();
                tokio::spawn(async move {
                    syncer.run_cycle().await;
                    drop(guard);
                });
                SyncTrigger::Started
            }
            Err(_) => {
                self.log_dropped_trigger();
                SyncTrigger::AlreadySyncing
            }
        }
    }

    fn log_dropped_trigger(&self) {
        tracing::info!(
            syncer = %self.inner.id,
            "previous sync has not finished, dropping trigger; consider a longer sync interval"
        );
    }

    fn update_snapshot(&self, modify: impl FnOnce(&mut SyncerSnapshot)) {
        self.inner.snapshot_tx.send_modify(modify);
    }

    fn emit(&self, event: SyncerEvent) {
        self.update_snapshot(|snapshot| snapshot.state = event.clone());
        let _ = self.inner.events_tx.send(event);
    }

    fn notify_error(&self, cycle: &mut CycleState, context: &str, error: &anyhow::Error) {
        let message = format!("{context}: {error:#}");
        tracing::error!(
            syncer = %self.inner.id,
            context,
            error = %format!("{error:#}"),
            "syncing encountered a problem"
        );
        cycle.last_error = Some(message.clone());
        self.emit(SyncerEvent::DidEncounterError { message });
    }

    async fn run_cycle(&self) {
        let started = Instant::now();
        self.update_snapshot(|snapshot| {
            snapshot.is_syncing = true;
            snapshot.last_sync_started_at = Some(now_rfc3339());
            snapshot.reports.clear();
        });
        self.emit(SyncerEvent::DidStartSyncing);
        tracing::info!(syncer = %self.inner.id, "sync starting");

        let mut cycle = CycleState::default();
        let watched_branches = match self.perform_cycle(&mut cycle).await {
            Ok(watched_branches) => watched_branches,
            Err(error) => {
                self.notify_error(&mut cycle, "Syncing", &error);
                None
            }
        };

        if let (Some(watched), Some(store)) = (&watched_branches, &self.inner.watch_store) {
            if let Err(error) = store.save(self.inner.context.repo_name(), watched) {
                tracing::warn!(
                    syncer = %self.inner.id,
                    path = %store.path().display(),
                    error = %format!("{error:#}"),
                    "failed to persist watch list"
                );
            }
        }

        let error = cycle.last_error.clone();
        let finished_at = now_rfc3339();
        self.update_snapshot(|snapshot| {
            snapshot.is_syncing = false;
            snapshot.last_sync_finished_at = Some(finished_at.clone());
            if error.is_none() {
                snapshot.last_successful_sync_at = Some(finished_at);
            }
            snapshot.last_error = error.clone();
            snapshot.reports = cycle.reports;
            if let Some(watched) = watched_branches {
                snapshot.watched_branches = watched;
            }
        });
        tracing::info!(
            syncer = %self.inner.id,
            outcome = if error.is_some() { "with error" } else { "successfully" },
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sync finished"
        );
        self.emit(SyncerEvent::DidFinishSyncing { error });
    }

    async fn perform_cycle(
        &self,
        cycle: &mut CycleState,
    ) -> Result<Option<BTreeMap<String, bool>>> {
        let context = &self.inner.context;
        let repo_name = context.repo_name();

        let repo = context
            .hosting
            .get_repo(repo_name)
            .await
            .context("fetching repo")?;
        let prs = context
            .hosting
            .get_open_pull_requests(repo_name)
            .await
            .context("fetching PRs")?;
        cycle
            .reports
            .insert(REPORT_ALL_PULL_REQUESTS.to_string(), prs.len().to_string());

        let watch_list = WatchList {
            branches: self.snapshot().watched_branches,
            auto_watch_new_branches: context.config.auto_watch_new_branches,
        };
        let branches = if watch_list.is_active() {
            context
                .hosting
                .get_branches_of_repo(repo_name)
                .await
                .context("fetching branches")?
        } else {
            Vec::new()
        };

        let bots = context.ci.get_bots().await.context("fetching bots")?;
        cycle
            .reports
            .insert(REPORT_ALL_BOTS.to_string(), bots.len().to_string());

        let reconciliation = reconcile(repo_name, &prs, &branches, &bots, &watch_list);
        let counts = [
            (REPORT_CREATED_BOTS, reconciliation.actions.created_count()),
            (REPORT_SYNCED_BOTS, reconciliation.actions.synced_count()),
            (REPORT_DELETED_BOTS, reconciliation.actions.deleted_count()),
        ];
        for (key, count) in counts {
            if count > 0 {
                cycle.reports.insert(key.to_string(), count.to_string());
            }
        }
        tracing::debug!(
            syncer = %self.inner.id,
            prs = prs.len(),
            branches = branches.len(),
            bots = bots.len(),
            "resolved sync pairs"
        );

        let pairs = sync_pairs_from(reconciliation.actions);
        let results = join_all(
            pairs
                .iter()
                .map(|pair| async move { (pair, pair.sync(context).await) }),
        )
        .await;
        for (pair, result) in results {
            if let Err(error) = result {
                self.notify_error(cycle, &format!("SyncPair: {}", pair.name()), &error);
            }
        }

        if let Some(rate_limit) = repo.rate_limit.as_ref() {
            let report = rate_limit.report();
            tracing::info!(syncer = %self.inner.id, rate_limit = %report, "rate limit");
            cycle.reports.insert(REPORT_RATE_LIMIT.to_string(), report);
        }
        Ok(reconciliation.watched_branches)
    }
}

#[derive(Debug)]
/// Controls a running syncer loop.
pub struct SyncerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SyncerHandle {
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Stops scheduling new cycles and waits for an in-flight cycle to
    /// finish.
    pub async fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

async fn run_syncer_loop(syncer: Syncer, mut shutdown_rx: oneshot::Receiver<()>) {
    let mut interval = tokio::time::interval(syncer.inner.context.config.sync_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                syncer.spawn_cycle();
            }
            _ = &mut shutdown_rx => {
                break;
            }
        }
    }

    // Wait out an in-flight cycle so DidStop is the last state published.
    let _cycle = syncer.inner.cycle_lock.lock().await;
    syncer.update_snapshot(|snapshot| snapshot.active = false);
    syncer.emit(SyncerEvent::DidStop);
    tracing::info!(syncer = %syncer.inner.id, "syncer stopped");
}
