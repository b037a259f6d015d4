//! Slack incoming-webhook notifier for build results.

use async_trait::async_trait;
use buildsync_transport::{HttpTransport, TransportConfig};
use buildsync_types::{BuildState, ClientError, IssueComment, Notifier, NotifierNotification};
use serde_json::{json, Value};

const XCODE_LINK_KEY: &str = "xcode";

#[derive(Clone)]
/// Posts one attachment per notification to a Slack incoming webhook.
pub struct SlackNotifier {
    transport: HttpTransport,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: &str) -> Result<Self, ClientError> {
        let webhook_url = webhook_url.trim();
        if webhook_url.is_empty() {
            return Err(ClientError::InvalidRequest(
                "slack webhook url cannot be empty".to_string(),
            ));
        }
        let config = TransportConfig::new(webhook_url, "buildsync");
        Ok(Self {
            transport: HttpTransport::new(&config, &[])?,
            webhook_url: webhook_url.to_string(),
        })
    }
}

fn attachment_color(state: BuildState) -> &'static str {
    match state {
        BuildState::Error | BuildState::Failure => "danger",
        BuildState::NoState | BuildState::Pending => "warning",
        BuildState::Success => "good",
    }
}

fn capitalized(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Strips the integration title line and markdown emphasis, and splices the
/// issues digest in after the `---` separator.
pub fn reformat_comment(comment: &str, issues: Option<&str>) -> String {
    let mut result = comment.replace("**", "");
    loop {
        let Some(start) = result.to_ascii_lowercase().find("result of") else {
            break;
        };
        let Some(newline) = result[start..].find('\n') else {
            break;
        };
        result.replace_range(start..start + newline + 1, "");
    }
    if let Some(issues) = issues {
        result = result.replace("---", &format!("---\n{issues}---\n"));
    }
    let lines: Vec<&str> = result.split('\n').filter(|line| !line.is_empty()).collect();
    let keep = lines.len().saturating_sub(1);
    lines[..keep].join("\n")
}

/// Builds the webhook body, or `None` when the notification has no xcode link
/// or integration result to point at.
pub fn build_webhook_payload(notification: &NotifierNotification) -> Option<Value> {
    let link = notification.links.get(XCODE_LINK_KEY)?;
    let result = notification.integration_result.as_deref()?;
    let state = notification.status.state.as_str();

    let (title, pretext) = match notification.issue_number {
        Some(number) => (
            format!("#{number} |-> {} {}", notification.branch, capitalized(result)),
            format!(
                "[{}] <{link}|PR #{number}> |-> {}: {state}",
                notification.repo, notification.branch
            ),
        ),
        None => (
            format!("Branch {} {}", notification.branch, capitalized(result)),
            format!(
                "[{}] |-> <{link}|{}>: {state}",
                notification.repo, notification.branch
            ),
        ),
    };

    Some(json!({
        "attachments": [{
            "fallback": pretext,
            "pretext": pretext,
            "color": attachment_color(notification.status.state),
            "mrkdwn_in": ["pretext", "text", "fallback", "fields"],
            "unfurl_links": false,
            "fields": [{
                "title": title,
                "value": reformat_comment(&notification.comment, notification.issues.as_deref()),
                "short": false,
            }],
        }]
    }))
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    async fn post_comment_on_issue(
        &self,
        notification: &NotifierNotification,
    ) -> Result<Option<IssueComment>, ClientError> {
        let Some(payload) = build_webhook_payload(notification) else {
            tracing::debug!(
                repo = %notification.repo,
                branch = %notification.branch,
                "skipping slack notification without integration link"
            );
            return Ok(None);
        };
        self.transport
            .request_empty_non_idempotent("post slack webhook", || {
                self.transport
                    .http()
                    .post(self.webhook_url.as_str())
                    .json(&payload)
            })
            .await?;
        Ok(None)
    }
}
