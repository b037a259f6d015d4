//! Reconciliation engine that keeps pull requests and watched branches in
//! step with CI bots.
//!
//! A [`Syncer`] polls one repository on a fixed interval. Each cycle lists
//! the hosting side and the CI side, pairs them with [`reconcile`], and then
//! drives every [`SyncPair`] concurrently: creating and deleting bots,
//! starting and canceling integrations, and publishing commit statuses.

pub mod actions;
pub mod bot_naming;
pub mod config;
pub mod context;
pub mod issues_digest;
pub mod reconciler;
pub mod resolver;
pub mod status_update;
pub mod summary_builder;
pub mod sync_pair;
pub mod syncer;
pub mod watch_list_store;

#[cfg(test)]
mod test_support;

pub use bot_naming::{
    is_bot_belonging_to_repo, name_for_branch_bot, name_for_pr_bot, parse_bot_name, BotTarget,
};
pub use config::{
    bot_configuration_for, BuildTemplate, ProjectConfig, SyncerConfig,
    DEFAULT_INTEGRATION_HISTORY_WINDOW, DEFAULT_SYNC_INTERVAL_SECONDS, DEFAULT_TRIGGER_KEYWORD,
};
pub use context::SyncContext;
pub use reconciler::{reconcile, BotActions, Reconciliation, WatchList};
pub use resolver::{resolve_actions, Actions, ResolveTarget, StatusToSet};
pub use summary_builder::SummaryBuilder;
pub use sync_pair::{sync_pairs_from, SyncPair};
pub use syncer::{
    SyncTrigger, Syncer, SyncerEvent, SyncerHandle, SyncerSnapshot,
    SYNCER_SNAPSHOT_SCHEMA_VERSION,
};
pub use watch_list_store::WatchListStore;
