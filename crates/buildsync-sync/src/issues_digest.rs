use buildsync_types::{IntegrationIssue, IntegrationIssueStatus, IntegrationIssues};

fn marker(issue: &IntegrationIssue) -> &'static str {
    match issue.status {
        IntegrationIssueStatus::Resolved => "✅",
        IntegrationIssueStatus::Silenced => "🙊",
        IntegrationIssueStatus::Fresh | IntegrationIssueStatus::Unresolved => {
            if issue.issue_type.is_error() {
                "🛑"
            } else {
                "⚠️"
            }
        }
    }
}

fn render_issue(issue: &IntegrationIssue) -> String {
    let mut line = format!("\n{}  ", marker(issue));
    if let Some(message) = issue.message.as_deref() {
        line.push_str(message);
    }
    if let (Some(file), Some(line_number)) = (issue.document_file_path.as_deref(), issue.line_number)
    {
        line.push_str(&format!("\n\tIn {file}:{line_number}"));
    }
    line
}

/// Renders integration issues grouped by category, errors first.
pub fn build_issues_digest(issues: &IntegrationIssues) -> String {
    let sections: [(&str, &[IntegrationIssue]); 7] = [
        ("*Service errors*", &issues.build_service_errors),
        ("*Triggers Errors*", &issues.trigger_errors),
        ("*Errors*", &issues.errors),
        ("*Test failures*", &issues.test_failures),
        ("*Service warnings*", &issues.build_service_warnings),
        ("*Analyzer warnings*", &issues.analyzer_warnings),
        ("*Warnings*", &issues.warnings),
    ];
    let mut digest = String::new();
    for (title, entries) in sections {
        if entries.is_empty() {
            continue;
        }
        digest.push_str(title);
        digest.push('\n');
        for issue in entries {
            digest.push_str(&render_issue(issue));
            digest.push('\n');
        }
    }
    digest
}
