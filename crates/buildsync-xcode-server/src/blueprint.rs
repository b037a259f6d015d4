use buildsync_types::{
    BotConfiguration, BotSchedule, CleaningPolicy, DeviceFilterType, Trigger, TriggerKind,
    TriggerPhase,
};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

const GIT_SYSTEM_KEY: &str = "com.apple.dt.Xcode.sourcecontrol.Git";
const BRANCH_OPTIONS: u64 = 156;
const BOT_TYPE_SERVER: u64 = 1;

/// Stable blueprint identifier derived from the repository URL.
pub fn repository_identifier(repository_url: &str) -> String {
    let digest = Sha256::digest(repository_url.trim().as_bytes());
    digest
        .iter()
        .take(20)
        .map(|byte| format!("{byte:02X}"))
        .collect()
}

fn cleaning_policy_code(policy: CleaningPolicy) -> u64 {
    match policy {
        CleaningPolicy::Never => 0,
        CleaningPolicy::Always => 1,
        CleaningPolicy::OnceADay => 2,
        CleaningPolicy::OnceAWeek => 3,
    }
}

fn device_filter_code(filter: DeviceFilterType) -> u64 {
    match filter {
        DeviceFilterType::AllAvailableDevicesAndSimulators => 0,
        DeviceFilterType::AllDevices => 1,
        DeviceFilterType::AllSimulators => 2,
        DeviceFilterType::SelectedDevicesAndSimulators => 3,
    }
}

fn schedule_fields(schedule: &BotSchedule) -> (u64, u64) {
    match schedule {
        BotSchedule::Periodic { interval_seconds } => (1, *interval_seconds),
        BotSchedule::OnCommit => (2, 0),
        BotSchedule::Manual => (3, 0),
    }
}

fn trigger_payload(trigger: &Trigger) -> Value {
    let phase = match trigger.phase {
        TriggerPhase::Prebuild => 1,
        TriggerPhase::Postbuild => 2,
    };
    let mut payload = json!({
        "name": trigger.name,
        "phase": phase,
    });
    match &trigger.kind {
        TriggerKind::RunScript { script_body } => {
            payload["type"] = json!(1);
            payload["scriptBody"] = json!(script_body);
        }
        TriggerKind::EmailNotification { recipients } => {
            payload["type"] = json!(2);
            payload["emailConfiguration"] = json!({
                "additionalRecipients": recipients,
                "emailCommitters": false,
                "includeCommitMessages": true,
                "includeIssueDetails": true,
            });
        }
    }
    if let Some(conditions) = trigger.conditions {
        payload["conditions"] = json!({
            "status": 2,
            "onSuccess": conditions.on_success,
            "onWarnings": conditions.on_warnings,
            "onAnalyzerWarnings": conditions.on_analyzer_warnings,
            "onFailingTests": conditions.on_failing_tests,
            "onBuildErrors": conditions.on_build_errors,
            "onInternalErrors": conditions.on_internal_errors,
        });
    }
    payload
}

/// Renders the Xcode Server bot creation body.
pub fn bot_creation_payload(name: &str, configuration: &BotConfiguration) -> Value {
    let source = &configuration.source_control;
    let repo_id = repository_identifier(&source.repository_url);
    let (schedule_type, periodic_interval) = schedule_fields(&configuration.schedule);
    let device = &configuration.device_specification;

    json!({
        "name": name,
        "type": BOT_TYPE_SERVER,
        "requiresUpgrade": false,
        "group": {"name": "buildsync"},
        "configuration": {
            "builtFromClean": cleaning_policy_code(configuration.cleaning_policy),
            "schemeName": configuration.scheme_name,
            "performsAnalyzeAction": configuration.perform_analyze_action,
            "performsTestAction": configuration.perform_test_action,
            "performsArchiveAction": configuration.perform_archive_action,
            "scheduleType": schedule_type,
            "periodicScheduleInterval": periodic_interval,
            "triggers": configuration.triggers.iter().map(trigger_payload).collect::<Vec<_>>(),
            "deviceSpecification": {
                "filters": [{
                    "platform": {"identifier": device.platform.as_str()},
                    "filterType": device_filter_code(device.filter),
                }],
                "deviceIdentifiers": device.device_identifiers,
            },
            "sourceControlBlueprint": {
                "DVTSourceControlWorkspaceBlueprintPrimaryRemoteRepositoryKey": repo_id,
                "DVTSourceControlWorkspaceBlueprintIdentifierKey": repository_identifier(name),
                "DVTSourceControlWorkspaceBlueprintNameKey": name,
                "DVTSourceControlWorkspaceBlueprintRelativePathToProjectKey": source.project_path,
                "DVTSourceControlWorkspaceBlueprintLocationsKey": {
                    repo_id.clone(): {
                        "DVTSourceControlBranchIdentifierKey": source.branch,
                        "DVTSourceControlBranchOptionsKey": BRANCH_OPTIONS,
                        "DVTSourceControlWorkspaceBlueprintLocationTypeKey": "DVTSourceControlBranch",
                    }
                },
                "DVTSourceControlWorkspaceBlueprintRemoteRepositoriesKey": [{
                    "DVTSourceControlWorkspaceBlueprintRemoteRepositoryURLKey": source.repository_url,
                    "DVTSourceControlWorkspaceBlueprintRemoteRepositorySystemKey": GIT_SYSTEM_KEY,
                    "DVTSourceControlWorkspaceBlueprintRemoteRepositoryIdentifierKey": repo_id,
                }],
            },
        },
    })
}
