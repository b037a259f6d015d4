use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Result};
use buildsync_types::{
    BotConfiguration, BotSchedule, CleaningPolicy, DeviceFilterType, DeviceSpecification,
    PlatformType, SourceControlBlueprint, Trigger,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SYNC_INTERVAL_SECONDS: u64 = 15;
pub const DEFAULT_TRIGGER_KEYWORD: &str = "lttm";
pub const DEFAULT_INTEGRATION_HISTORY_WINDOW: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Per-syncer policy knobs.
pub struct SyncerConfig {
    pub sync_interval_seconds: u64,
    /// Gate a PR's first build behind a comment containing a trigger keyword.
    pub wait_for_keyword: bool,
    pub trigger_keywords: Vec<String>,
    pub post_status_comments: bool,
    pub watched_branches: BTreeMap<String, bool>,
    pub auto_watch_new_branches: bool,
    pub slack_webhook: Option<String>,
    pub integration_history_window: usize,
    pub delete_orphaned_bots: bool,
}

impl Default for SyncerConfig {
    fn default() -> Self {
        Self {
            sync_interval_seconds: DEFAULT_SYNC_INTERVAL_SECONDS,
            wait_for_keyword: true,
            trigger_keywords: vec![DEFAULT_TRIGGER_KEYWORD.to_string()],
            post_status_comments: true,
            watched_branches: BTreeMap::new(),
            auto_watch_new_branches: false,
            slack_webhook: None,
            integration_history_window: DEFAULT_INTEGRATION_HISTORY_WINDOW,
            delete_orphaned_bots: true,
        }
    }
}

impl SyncerConfig {
    /// Sync interval, never shorter than one second.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_seconds.max(1))
    }

    pub fn slack_webhook(&self) -> Option<&str> {
        self.slack_webhook
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn history_window(&self) -> usize {
        self.integration_history_window.max(1)
    }

    /// Keyword quoted in the "waiting" status shown on gated PRs.
    pub fn primary_keyword(&self) -> &str {
        self.trigger_keywords
            .iter()
            .map(|keyword| keyword.trim())
            .find(|keyword| !keyword.is_empty())
            .unwrap_or(DEFAULT_TRIGGER_KEYWORD)
    }

    pub fn validate(&self) -> Result<()> {
        if self.wait_for_keyword
            && self
                .trigger_keywords
                .iter()
                .all(|keyword| keyword.trim().is_empty())
        {
            bail!("wait_for_keyword is enabled but trigger_keywords is empty");
        }
        Ok(())
    }
}

fn default_schedule() -> BotSchedule {
    BotSchedule::Manual
}

fn default_cleaning_policy() -> CleaningPolicy {
    CleaningPolicy::Never
}

fn default_device_filter() -> DeviceFilterType {
    DeviceFilterType::AllAvailableDevicesAndSimulators
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Build settings shared by every bot a syncer creates.
pub struct BuildTemplate {
    pub scheme: String,
    #[serde(default = "default_schedule")]
    pub schedule: BotSchedule,
    #[serde(default = "default_cleaning_policy")]
    pub cleaning_policy: CleaningPolicy,
    #[serde(default = "default_true")]
    pub should_analyze: bool,
    #[serde(default = "default_true")]
    pub should_test: bool,
    #[serde(default)]
    pub should_archive: bool,
    #[serde(default)]
    pub testing_device_ids: Vec<String>,
    #[serde(default = "default_device_filter")]
    pub device_filter: DeviceFilterType,
    #[serde(default)]
    pub platform: Option<PlatformType>,
}

impl BuildTemplate {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            schedule: default_schedule(),
            cleaning_policy: default_cleaning_policy(),
            should_analyze: true,
            should_test: true,
            should_archive: false,
            testing_device_ids: Vec::new(),
            device_filter: default_device_filter(),
            platform: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The repository a syncer tracks and where its Xcode project lives.
pub struct ProjectConfig {
    /// `owner/name` on the hosting service.
    pub repo: String,
    pub ssh_url: String,
    pub project_path: String,
}

/// Assembles the bot definition for `branch`. `schedule_override` replaces
/// the template schedule when set.
pub fn bot_configuration_for(
    template: &BuildTemplate,
    project: &ProjectConfig,
    branch: &str,
    schedule_override: Option<BotSchedule>,
    triggers: &[Trigger],
) -> BotConfiguration {
    BotConfiguration {
        scheme_name: template.scheme.clone(),
        schedule: schedule_override.unwrap_or_else(|| template.schedule.clone()),
        cleaning_policy: template.cleaning_policy,
        perform_analyze_action: template.should_analyze,
        perform_test_action: template.should_test,
        perform_archive_action: template.should_archive,
        triggers: triggers.to_vec(),
        device_specification: DeviceSpecification {
            platform: template.platform.unwrap_or(PlatformType::Ios),
            filter: template.device_filter,
            device_identifiers: template.testing_device_ids.clone(),
        },
        source_control: SourceControlBlueprint {
            repository_url: project.ssh_url.clone(),
            branch: branch.to_string(),
            project_path: project.project_path.clone(),
        },
    }
}
