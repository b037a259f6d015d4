use buildsync_types::{
    Bot, BuildResultSummary, Integration, IntegrationIssue, IntegrationIssueStatus,
    IntegrationIssueType, IntegrationIssues, IntegrationResult, IntegrationStep,
};
use serde::Deserialize;

const LOCATIONS_KEY: &str = "DVTSourceControlWorkspaceBlueprintLocationsKey";
const REVISION_KEY: &str = "DVTSourceControlLocationRevisionKey";

#[derive(Debug, Deserialize)]
pub(crate) struct XcsList<T> {
    #[serde(default = "Vec::new")]
    pub(crate) results: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XcsBot {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_rev", default)]
    rev: Option<String>,
    #[serde(rename = "tinyID", default)]
    tiny_id: Option<String>,
    name: String,
}

impl From<XcsBot> for Bot {
    fn from(value: XcsBot) -> Self {
        Self {
            id: value.id,
            revision: value.rev,
            tiny_id: value.tiny_id,
            name: value.name,
            configuration: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct XcsBuildResultSummary {
    #[serde(default)]
    tests_count: u64,
    #[serde(default)]
    test_failure_count: u64,
    #[serde(default)]
    warning_count: u64,
    #[serde(default)]
    analyzer_warning_count: u64,
    #[serde(default)]
    error_count: u64,
    #[serde(default)]
    code_coverage_percentage: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct XcsIntegration {
    #[serde(rename = "_id")]
    id: String,
    number: u64,
    #[serde(default)]
    current_step: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    build_result_summary: Option<XcsBuildResultSummary>,
    #[serde(default)]
    revision_blueprint: Option<serde_json::Value>,
}

fn commit_from_blueprint(blueprint: &serde_json::Value) -> Option<String> {
    blueprint
        .get(LOCATIONS_KEY)?
        .as_object()?
        .values()
        .find_map(|location| location.get(REVISION_KEY)?.as_str().map(ToOwned::to_owned))
}

impl From<XcsIntegration> for Integration {
    fn from(value: XcsIntegration) -> Self {
        let step = value
            .current_step
            .as_deref()
            .and_then(IntegrationStep::from_raw)
            .unwrap_or(IntegrationStep::Pending);
        let result = value
            .result
            .as_deref()
            .map(IntegrationResult::from_raw)
            .filter(|_| step.is_completed());
        Self {
            id: value.id,
            number: value.number,
            step,
            result,
            commit_sha: value.revision_blueprint.as_ref().and_then(commit_from_blueprint),
            build_result_summary: value.build_result_summary.map(|summary| BuildResultSummary {
                tests_count: summary.tests_count,
                test_failure_count: summary.test_failure_count,
                warning_count: summary.warning_count,
                analyzer_warning_count: summary.analyzer_warning_count,
                error_count: summary.error_count,
                code_coverage_percentage: summary.code_coverage_percentage,
            }),
            duration_seconds: value.duration,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct XcsIssue {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    document_file_path: Option<String>,
    #[serde(default)]
    line_number: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct XcsIssueBuckets {
    #[serde(default)]
    fresh_issues: Vec<XcsIssue>,
    #[serde(default)]
    unresolved_issues: Vec<XcsIssue>,
    #[serde(default)]
    resolved_issues: Vec<XcsIssue>,
    #[serde(default)]
    silenced_issues: Vec<XcsIssue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct XcsIntegrationIssues {
    #[serde(default)]
    build_service_errors: Vec<XcsIssue>,
    #[serde(default)]
    build_service_warnings: Vec<XcsIssue>,
    #[serde(default)]
    trigger_errors: Vec<XcsIssue>,
    #[serde(default)]
    errors: XcsIssueBuckets,
    #[serde(default)]
    warnings: XcsIssueBuckets,
    #[serde(default)]
    analyzer_warnings: XcsIssueBuckets,
    #[serde(default)]
    test_failures: XcsIssueBuckets,
}

fn convert_issue(
    issue: XcsIssue,
    issue_type: IntegrationIssueType,
    status: IntegrationIssueStatus,
) -> IntegrationIssue {
    IntegrationIssue {
        id: issue.id,
        issue_type,
        status,
        message: issue.message,
        document_file_path: issue.document_file_path,
        line_number: issue.line_number,
    }
}

fn flat_issues(issues: Vec<XcsIssue>, issue_type: IntegrationIssueType) -> Vec<IntegrationIssue> {
    issues
        .into_iter()
        .map(|issue| convert_issue(issue, issue_type, IntegrationIssueStatus::Fresh))
        .collect()
}

fn bucketed_issues(
    buckets: XcsIssueBuckets,
    issue_type: IntegrationIssueType,
) -> Vec<IntegrationIssue> {
    let sources = [
        (IntegrationIssueStatus::Fresh, buckets.fresh_issues),
        (IntegrationIssueStatus::Unresolved, buckets.unresolved_issues),
        (IntegrationIssueStatus::Resolved, buckets.resolved_issues),
        (IntegrationIssueStatus::Silenced, buckets.silenced_issues),
    ];
    sources
        .into_iter()
        .flat_map(|(status, issues)| {
            issues
                .into_iter()
                .map(move |issue| convert_issue(issue, issue_type, status))
        })
        .collect()
}

impl From<XcsIntegrationIssues> for IntegrationIssues {
    fn from(value: XcsIntegrationIssues) -> Self {
        Self {
            build_service_errors: flat_issues(
                value.build_service_errors,
                IntegrationIssueType::BuildServiceError,
            ),
            build_service_warnings: flat_issues(
                value.build_service_warnings,
                IntegrationIssueType::BuildServiceWarning,
            ),
            trigger_errors: flat_issues(value.trigger_errors, IntegrationIssueType::TriggerError),
            errors: bucketed_issues(value.errors, IntegrationIssueType::Error),
            warnings: bucketed_issues(value.warnings, IntegrationIssueType::Warning),
            analyzer_warnings: bucketed_issues(
                value.analyzer_warnings,
                IntegrationIssueType::AnalyzerWarning,
            ),
            test_failures: bucketed_issues(value.test_failures, IntegrationIssueType::TestFailure),
        }
    }
}
