use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningPolicy {
    Never,
    Always,
    OnceADay,
    OnceAWeek,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotSchedule {
    Periodic { interval_seconds: u64 },
    OnCommit,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformType {
    Ios,
    Macos,
    Tvos,
    Watchos,
}

impl PlatformType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ios => "com.apple.platform.iphoneos",
            Self::Macos => "com.apple.platform.macosx",
            Self::Tvos => "com.apple.platform.appletvos",
            Self::Watchos => "com.apple.platform.watchos",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFilterType {
    AllAvailableDevicesAndSimulators,
    AllDevices,
    AllSimulators,
    SelectedDevicesAndSimulators,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpecification {
    pub platform: PlatformType,
    pub filter: DeviceFilterType,
    #[serde(default)]
    pub device_identifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Where the CI server checks out the code for a bot.
pub struct SourceControlBlueprint {
    pub repository_url: String,
    pub branch: String,
    pub project_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPhase {
    Prebuild,
    Postbuild,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerKind {
    RunScript { script_body: String },
    EmailNotification { recipients: Vec<String> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConditions {
    #[serde(default)]
    pub on_success: bool,
    #[serde(default)]
    pub on_warnings: bool,
    #[serde(default)]
    pub on_analyzer_warnings: bool,
    #[serde(default)]
    pub on_failing_tests: bool,
    #[serde(default)]
    pub on_build_errors: bool,
    #[serde(default)]
    pub on_internal_errors: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    pub phase: TriggerPhase,
    pub kind: TriggerKind,
    #[serde(default)]
    pub conditions: Option<TriggerConditions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Build-job definition sent to the CI server when a bot is created.
pub struct BotConfiguration {
    pub scheme_name: String,
    pub schedule: BotSchedule,
    pub cleaning_policy: CleaningPolicy,
    pub perform_analyze_action: bool,
    pub perform_test_action: bool,
    pub perform_archive_action: bool,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    pub device_specification: DeviceSpecification,
    pub source_control: SourceControlBlueprint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// CI job definition. Matched by `name`, addressed by `id`.
pub struct Bot {
    pub id: String,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub tiny_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub configuration: Option<BotConfiguration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrationStep {
    Pending,
    Preparing,
    Checkout,
    BeforeTriggers,
    Building,
    Testing,
    Archiving,
    Processing,
    AfterTriggers,
    Uploading,
    Completed,
}

impl IntegrationStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Checkout => "checkout",
            Self::BeforeTriggers => "before-triggers",
            Self::Building => "building",
            Self::Testing => "testing",
            Self::Archiving => "archiving",
            Self::Processing => "processing",
            Self::AfterTriggers => "after-triggers",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
        }
    }

    pub fn from_raw(raw: &str) -> Option<Self> {
        let step = match raw.trim() {
            "pending" => Self::Pending,
            "preparing" => Self::Preparing,
            "checkout" => Self::Checkout,
            "before-triggers" => Self::BeforeTriggers,
            "building" => Self::Building,
            "testing" => Self::Testing,
            "archiving" => Self::Archiving,
            "processing" => Self::Processing,
            "after-triggers" => Self::AfterTriggers,
            "uploading" => Self::Uploading,
            "completed" => Self::Completed,
            _ => return None,
        };
        Some(step)
    }

    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrationResult {
    Succeeded,
    Warnings,
    AnalyzerWarnings,
    TestFailures,
    BuildErrors,
    BuildFailed,
    CheckoutError,
    InternalError,
    InternalCheckoutError,
    InternalBuildError,
    InternalProcessingError,
    TriggerError,
    Canceled,
    Unknown,
}

impl IntegrationResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Warnings => "warnings",
            Self::AnalyzerWarnings => "analyzer-warnings",
            Self::TestFailures => "test-failures",
            Self::BuildErrors => "build-errors",
            Self::BuildFailed => "build-failed",
            Self::CheckoutError => "checkout-error",
            Self::InternalError => "internal-error",
            Self::InternalCheckoutError => "internal-checkout-error",
            Self::InternalBuildError => "internal-build-error",
            Self::InternalProcessingError => "internal-processing-error",
            Self::TriggerError => "trigger-error",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }

    /// Parses the CI server's raw result string; unrecognized values map to `Unknown`.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "succeeded" => Self::Succeeded,
            "warnings" => Self::Warnings,
            "analyzer-warnings" => Self::AnalyzerWarnings,
            "test-failures" => Self::TestFailures,
            "build-errors" => Self::BuildErrors,
            "build-failed" => Self::BuildFailed,
            "checkout-error" => Self::CheckoutError,
            "internal-error" => Self::InternalError,
            "internal-checkout-error" => Self::InternalCheckoutError,
            "internal-build-error" => Self::InternalBuildError,
            "internal-processing-error" => Self::InternalProcessingError,
            "trigger-error" => Self::TriggerError,
            "canceled" => Self::Canceled,
            _ => Self::Unknown,
        }
    }

    pub fn is_passing(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Warnings | Self::AnalyzerWarnings
        )
    }

    pub fn is_errored(self) -> bool {
        matches!(
            self,
            Self::BuildErrors
                | Self::BuildFailed
                | Self::CheckoutError
                | Self::InternalError
                | Self::InternalCheckoutError
                | Self::InternalBuildError
                | Self::InternalProcessingError
                | Self::TriggerError
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildResultSummary {
    #[serde(default)]
    pub tests_count: u64,
    #[serde(default)]
    pub test_failure_count: u64,
    #[serde(default)]
    pub warning_count: u64,
    #[serde(default)]
    pub analyzer_warning_count: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub code_coverage_percentage: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One build run of a bot. Immutable once `step` reaches `Completed`.
pub struct Integration {
    pub id: String,
    pub number: u64,
    pub step: IntegrationStep,
    #[serde(default)]
    pub result: Option<IntegrationResult>,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub build_result_summary: Option<BuildResultSummary>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrationsQuery {
    pub last: usize,
}

impl Default for IntegrationsQuery {
    fn default() -> Self {
        Self { last: 20 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationIssueType {
    BuildServiceError,
    BuildServiceWarning,
    TriggerError,
    Error,
    Warning,
    TestFailure,
    AnalyzerWarning,
}

impl IntegrationIssueType {
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::BuildServiceError | Self::TriggerError | Self::Error | Self::TestFailure
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationIssueStatus {
    Fresh,
    Unresolved,
    Resolved,
    Silenced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationIssue {
    pub id: String,
    pub issue_type: IntegrationIssueType,
    pub status: IntegrationIssueStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub document_file_path: Option<String>,
    #[serde(default)]
    pub line_number: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Issues reported by one integration, grouped by category.
pub struct IntegrationIssues {
    #[serde(default)]
    pub build_service_errors: Vec<IntegrationIssue>,
    #[serde(default)]
    pub build_service_warnings: Vec<IntegrationIssue>,
    #[serde(default)]
    pub trigger_errors: Vec<IntegrationIssue>,
    #[serde(default)]
    pub errors: Vec<IntegrationIssue>,
    #[serde(default)]
    pub warnings: Vec<IntegrationIssue>,
    #[serde(default)]
    pub analyzer_warnings: Vec<IntegrationIssue>,
    #[serde(default)]
    pub test_failures: Vec<IntegrationIssue>,
}

impl IntegrationIssues {
    pub fn is_empty(&self) -> bool {
        self.build_service_errors.is_empty()
            && self.build_service_warnings.is_empty()
            && self.trigger_errors.is_empty()
            && self.errors.is_empty()
            && self.warnings.is_empty()
            && self.analyzer_warnings.is_empty()
            && self.test_failures.is_empty()
    }
}

#[async_trait]
/// Continuous-integration server consumed by the syncer.
pub trait CiServerClient: Send + Sync {
    /// Host used to build integration links.
    fn hostname(&self) -> &str;

    async fn get_bots(&self) -> Result<Vec<Bot>, ClientError>;

    async fn get_bot_integrations(
        &self,
        bot_id: &str,
        query: IntegrationsQuery,
    ) -> Result<Vec<Integration>, ClientError>;

    /// Enqueues a new integration on the bot.
    async fn post_integration(&self, bot_id: &str) -> Result<Integration, ClientError>;

    async fn cancel_integration(&self, integration_id: &str) -> Result<(), ClientError>;

    async fn get_integration_issues(
        &self,
        integration_id: &str,
    ) -> Result<IntegrationIssues, ClientError>;

    async fn create_bot(
        &self,
        name: &str,
        configuration: &BotConfiguration,
    ) -> Result<Bot, ClientError>;

    async fn delete_bot(&self, bot: &Bot) -> Result<(), ClientError>;
}
