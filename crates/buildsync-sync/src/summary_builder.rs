//! Maps a finished integration onto a commit status and markdown comment.

use std::collections::BTreeMap;

use buildsync_core::format_natural_duration;
use buildsync_types::{
    BuildResultSummary, BuildState, Integration, IntegrationResult, SourceHostingClient,
    StatusAndComment,
};

const RESULT_PREFIX: &str = "*Result*: ";
pub const HTTPS_LINK_KEY: &str = "https";
pub const XCODE_LINK_KEY: &str = "xcode";

fn pluralize(count: u64, noun: &str) -> String {
    if count == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    }
}

pub struct SummaryBuilder<'a> {
    status_creator: &'a dyn SourceHostingClient,
    links: BTreeMap<String, String>,
    lines: Vec<String>,
}

impl<'a> SummaryBuilder<'a> {
    pub fn new(status_creator: &'a dyn SourceHostingClient, links: BTreeMap<String, String>) -> Self {
        Self {
            status_creator,
            links,
            lines: Vec::new(),
        }
    }

    /// Dispatches on the integration's result. Integrations without a
    /// result summarize as empty.
    pub fn summarize(self, integration: &Integration) -> StatusAndComment {
        match integration.result {
            Some(result) if result.is_passing() => self.build_passing(integration),
            Some(IntegrationResult::TestFailures) => self.build_failing_tests(integration),
            Some(IntegrationResult::Canceled) => self.build_canceled(integration),
            Some(result) if result.is_errored() => self.build_errored(integration),
            Some(IntegrationResult::Unknown) => self.build_errored(integration),
            _ => self.build_empty(),
        }
    }

    pub fn build_passing(mut self, integration: &Integration) -> StatusAndComment {
        self.add_base_comment(integration);
        let summary = integration.build_result_summary.unwrap_or_default();
        match integration.result {
            Some(IntegrationResult::Succeeded) => self.append_tests_passed(&summary),
            Some(IntegrationResult::Warnings) | Some(IntegrationResult::AnalyzerWarnings) => {
                match (summary.warning_count, summary.analyzer_warning_count) {
                    (_, 0) => self.append_warnings(&summary),
                    (0, _) => self.append_analyzer_warnings(&summary),
                    _ => self.append_warnings_and_analyzer_warnings(&summary),
                }
            }
            _ => {}
        }
        if summary.code_coverage_percentage > 0 {
            self.lines.push(format!(
                "*Test Coverage*: {}%",
                summary.code_coverage_percentage
            ));
        }
        self.finish(BuildState::Success, "Build passed!", integration)
    }

    pub fn build_failing_tests(mut self, integration: &Integration) -> StatusAndComment {
        self.add_base_comment(integration);
        let summary = integration.build_result_summary.unwrap_or_default();
        self.lines.push(format!(
            "{RESULT_PREFIX}**Build failed {} {}** out of {}",
            summary.test_failure_count,
            pluralize(summary.test_failure_count, "test"),
            summary.tests_count
        ));
        self.finish(BuildState::Failure, "Build failed tests!", integration)
    }

    pub fn build_errored(mut self, integration: &Integration) -> StatusAndComment {
        self.add_base_comment(integration);
        let error_count = integration
            .build_result_summary
            .map(|summary| summary.error_count)
            .unwrap_or_default();
        let state = integration
            .result
            .unwrap_or(IntegrationResult::Unknown)
            .as_str();
        self.lines.push(format!(
            "{RESULT_PREFIX}**{error_count} {}, failing state: {state}**",
            pluralize(error_count, "error")
        ));
        self.finish(BuildState::Error, "Build error!", integration)
    }

    pub fn build_canceled(mut self, integration: &Integration) -> StatusAndComment {
        self.add_base_comment(integration);
        self.lines.push("Build was **manually canceled**.".to_string());
        self.finish(BuildState::Error, "Build canceled!", integration)
    }

    pub fn build_empty(self) -> StatusAndComment {
        StatusAndComment::status_only(self.status_creator.create_status_from_state(
            BuildState::NoState,
            None,
            None,
        ))
    }

    fn add_base_comment(&mut self, integration: &Integration) {
        let mut title = format!("Integration {}", integration.number);
        if let Some(link) = self.links.get(HTTPS_LINK_KEY) {
            title = format!("[{title}]({link})");
        }
        self.lines.push(format!("Result of {title}"));
        self.lines.push("---".to_string());
        let duration = match integration.duration_seconds {
            Some(seconds) => format_natural_duration(seconds.max(0.0) as u64),
            None => "[NOT PROVIDED]".to_string(),
        };
        self.lines.push(format!("*Duration*: {duration}"));
    }

    fn append_tests_passed(&mut self, summary: &BuildResultSummary) {
        let tests = summary.tests_count;
        let section = if tests > 0 {
            format!("All {tests} {} passed. ", pluralize(tests, "test"))
        } else {
            String::new()
        };
        self.lines
            .push(format!("{RESULT_PREFIX}**Perfect build!** {section}:+1:"));
    }

    fn append_warnings(&mut self, summary: &BuildResultSummary) {
        self.lines.push(format!(
            "{RESULT_PREFIX}All {} tests passed with **{} {}**.",
            summary.tests_count,
            summary.warning_count,
            pluralize(summary.warning_count, "warning")
        ));
    }

    fn append_analyzer_warnings(&mut self, summary: &BuildResultSummary) {
        self.lines.push(format!(
            "{RESULT_PREFIX}All {} tests passed with **{} {}**.",
            summary.tests_count,
            summary.analyzer_warning_count,
            pluralize(summary.analyzer_warning_count, "analyzer warning")
        ));
    }

    fn append_warnings_and_analyzer_warnings(&mut self, summary: &BuildResultSummary) {
        self.lines.push(format!(
            "{RESULT_PREFIX}All {} tests passed with **{} {}** and **{} {}**.",
            summary.tests_count,
            summary.warning_count,
            pluralize(summary.warning_count, "warning"),
            summary.analyzer_warning_count,
            pluralize(summary.analyzer_warning_count, "analyzer warning")
        ));
    }

    fn finish(
        self,
        state: BuildState,
        description: &str,
        integration: &Integration,
    ) -> StatusAndComment {
        let status = self.status_creator.create_status_from_state(
            state,
            Some(description),
            self.links.get(HTTPS_LINK_KEY).map(String::as_str),
        );
        let comment = (!self.lines.is_empty()).then(|| self.lines.join("\n"));
        StatusAndComment {
            status,
            comment,
            integration: Some(integration.clone()),
            links: self.links,
        }
    }
}
