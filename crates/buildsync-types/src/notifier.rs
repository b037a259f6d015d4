use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ClientError, CommitStatus, Integration, IssueComment};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Computed commit status plus an optional human-readable comment.
pub struct StatusAndComment {
    pub status: CommitStatus,
    pub comment: Option<String>,
    pub integration: Option<Integration>,
    #[serde(default)]
    pub links: BTreeMap<String, String>,
}

impl StatusAndComment {
    pub fn status_only(status: CommitStatus) -> Self {
        Self {
            status,
            comment: None,
            integration: None,
            links: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Payload handed to secondary notifiers when a status with a comment is posted.
pub struct NotifierNotification {
    pub comment: String,
    /// Absent for branch-only notifications.
    pub issue_number: Option<u64>,
    pub repo: String,
    pub branch: String,
    pub status: CommitStatus,
    pub integration_result: Option<String>,
    #[serde(default)]
    pub links: BTreeMap<String, String>,
    /// Issues digest of the integration, present for failing builds.
    pub issues: Option<String>,
}

#[async_trait]
/// Secondary notification channel, e.g. a chat webhook.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn post_comment_on_issue(
        &self,
        notification: &NotifierNotification,
    ) -> Result<Option<IssueComment>, ClientError>;
}
