use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ClientError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoPermissions {
    pub read: bool,
    pub write: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Rate-limit snapshot captured from the hosting service's response headers.
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    pub reset_unix: u64,
}

impl RateLimitInfo {
    pub fn used_percent(&self) -> f64 {
        if self.limit == 0 {
            return 0.0;
        }
        let used = self.limit.saturating_sub(self.remaining);
        (used as f64 / self.limit as f64) * 100.0
    }

    /// Human-readable report stored in the syncer's report map.
    pub fn report(&self) -> String {
        format!(
            "count: {}/{}, renews at {}, used {:.1}%",
            self.limit.saturating_sub(self.remaining),
            self.limit,
            format_reset_time(self.reset_unix),
            self.used_percent()
        )
    }
}

fn format_reset_time(unix_seconds: u64) -> String {
    i64::try_from(unix_seconds)
        .ok()
        .and_then(|seconds| chrono::DateTime::<chrono::Utc>::from_timestamp(seconds, 0))
        .map(|value| value.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| unix_seconds.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Read-only repository snapshot fetched once per sync cycle.
pub struct Repo {
    pub full_name: String,
    pub permissions: RepoPermissions,
    pub ssh_url: Option<String>,
    pub rate_limit: Option<RateLimitInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Open pull request. Identity is `number`; head fields move with each push.
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub head_name: String,
    pub head_commit_sha: String,
    pub base_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit_sha: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Commit status states understood by every hosting service.
pub enum BuildState {
    NoState,
    Pending,
    Success,
    Failure,
    Error,
}

impl BuildState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoState => "no_state",
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
        }
    }

    pub fn is_failing(self) -> bool {
        matches!(self, Self::Failure | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    pub state: BuildState,
    pub description: Option<String>,
    pub target_url: Option<String>,
    pub context: String,
}

impl CommitStatus {
    /// Two statuses are equivalent when state and description match; the
    /// target URL and context never trigger a re-post.
    pub fn is_equivalent(&self, other: &CommitStatus) -> bool {
        self.state == other.state && self.description == other.description
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    pub body: String,
    pub author: Option<String>,
}

#[async_trait]
/// Source hosting service (GitHub, BitBucket Server, ...) consumed by the syncer.
pub trait SourceHostingClient: Send + Sync {
    /// Stable short name used in logs, e.g. `github`.
    fn service_name(&self) -> &'static str;

    async fn get_repo(&self, repo: &str) -> Result<Repo, ClientError>;

    async fn get_open_pull_requests(&self, repo: &str) -> Result<Vec<PullRequest>, ClientError>;

    async fn get_branches_of_repo(&self, repo: &str) -> Result<Vec<Branch>, ClientError>;

    /// Returns the status this service's context last posted on `commit`, if any.
    async fn get_status_of_commit(
        &self,
        commit: &str,
        repo: &str,
    ) -> Result<Option<CommitStatus>, ClientError>;

    async fn post_status_of_commit(
        &self,
        commit: &str,
        status: &CommitStatus,
        repo: &str,
    ) -> Result<CommitStatus, ClientError>;

    async fn get_comments_of_issue(
        &self,
        issue_number: u64,
        repo: &str,
    ) -> Result<Vec<IssueComment>, ClientError>;

    async fn post_comment_on_issue(
        &self,
        comment: &str,
        issue_number: u64,
        repo: &str,
    ) -> Result<IssueComment, ClientError>;

    fn create_status_from_state(
        &self,
        state: BuildState,
        description: Option<&str>,
        target_url: Option<&str>,
    ) -> CommitStatus;

    /// Returns the comments whose body contains any of `keywords`, ignoring case.
    async fn find_matching_comment_in_issue(
        &self,
        keywords: &[String],
        issue_number: u64,
        repo: &str,
    ) -> Result<Vec<IssueComment>, ClientError> {
        let keywords = keywords
            .iter()
            .map(|keyword| keyword.trim().to_ascii_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect::<Vec<_>>();
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let comments = self.get_comments_of_issue(issue_number, repo).await?;
        Ok(comments
            .into_iter()
            .filter(|comment| {
                let body = comment.body.to_ascii_lowercase();
                keywords.iter().any(|keyword| body.contains(keyword.as_str()))
            })
            .collect())
    }
}
