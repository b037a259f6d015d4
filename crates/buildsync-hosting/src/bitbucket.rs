use async_trait::async_trait;
use buildsync_transport::{HttpTransport, TransportConfig};
use buildsync_types::{
    Branch, BuildState, ClientError, CommitStatus, IssueComment, PullRequest, Repo,
    RepoPermissions, SourceHostingClient,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::RepoName;

pub const BITBUCKET_DEFAULT_API_BASE: &str = "https://bitbucket.org";
const BITBUCKET_PAGE_LIMIT: &str = "100";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BitBucketPage<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
    #[serde(default = "default_last_page")]
    is_last_page: bool,
    #[serde(default)]
    next_page_start: Option<u64>,
}

fn default_last_page() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct BitBucketLink {
    href: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BitBucketLinks {
    #[serde(default)]
    clone: Vec<BitBucketLink>,
}

#[derive(Debug, Deserialize)]
struct BitBucketProject {
    key: String,
}

#[derive(Debug, Deserialize)]
struct BitBucketRepo {
    slug: String,
    project: BitBucketProject,
    #[serde(default)]
    links: BitBucketLinks,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BitBucketRef {
    display_id: String,
    #[serde(default)]
    latest_commit: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BitBucketPullRequest {
    id: u64,
    #[serde(default)]
    title: String,
    from_ref: BitBucketRef,
    to_ref: BitBucketRef,
}

#[derive(Debug, Deserialize)]
struct BitBucketBuildStatus {
    state: String,
    key: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BitBucketUser {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BitBucketComment {
    id: u64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    author: Option<BitBucketUser>,
}

impl From<BitBucketComment> for IssueComment {
    fn from(value: BitBucketComment) -> Self {
        Self {
            id: value.id,
            body: value.text,
            author: value.author.map(|author| author.name),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BitBucketActivity {
    action: String,
    #[serde(default)]
    comment: Option<BitBucketComment>,
}

fn bitbucket_state(state: BuildState) -> &'static str {
    match state {
        BuildState::NoState | BuildState::Pending => "INPROGRESS",
        BuildState::Success => "SUCCESSFUL",
        BuildState::Failure | BuildState::Error => "FAILED",
    }
}

/// BitBucket collapses failure and error into FAILED, so the exact state is
/// carried in the status name as `<context>: <state>`.
fn build_state_from_bitbucket(status: &BitBucketBuildStatus) -> BuildState {
    let from_name = status
        .name
        .as_deref()
        .and_then(|name| name.rsplit_once(": "))
        .and_then(|(_, raw)| match raw {
            "no_state" => Some(BuildState::NoState),
            "pending" => Some(BuildState::Pending),
            "success" => Some(BuildState::Success),
            "failure" => Some(BuildState::Failure),
            "error" => Some(BuildState::Error),
            _ => None,
        });
    if let Some(state) = from_name {
        return state;
    }
    match status.state.as_str() {
        "INPROGRESS" => BuildState::Pending,
        "SUCCESSFUL" => BuildState::Success,
        "FAILED" => BuildState::Failure,
        _ => BuildState::NoState,
    }
}

#[derive(Clone)]
/// BitBucket Server REST 1.0 implementation of `SourceHostingClient`.
///
/// Repositories are addressed as `PROJECT/slug`; pull requests double as issues.
pub struct BitBucketClient {
    transport: HttpTransport,
    status_context: String,
}

impl BitBucketClient {
    pub fn new(
        transport: &TransportConfig,
        token: &str,
        status_context: &str,
    ) -> Result<Self, ClientError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ClientError::InvalidRequest(
                "bitbucket token cannot be empty".to_string(),
            ));
        }
        let transport = HttpTransport::new(
            transport,
            &[
                ("accept", "application/json".to_string()),
                ("authorization", format!("Bearer {token}")),
            ],
        )?;
        Ok(Self {
            transport,
            status_context: status_context.to_string(),
        })
    }

    fn repo_path(repo: &RepoName) -> String {
        format!(
            "rest/api/1.0/projects/{}/repos/{}",
            repo.owner, repo.name
        )
    }

    async fn get_all_pages<T>(&self, operation: &str, path: &str) -> Result<Vec<T>, ClientError>
    where
        T: DeserializeOwned,
    {
        let mut start = 0_u64;
        let mut rows = Vec::new();
        loop {
            let start_value = start.to_string();
            let page: BitBucketPage<T> = self
                .transport
                .request_json(operation, || {
                    self.transport.http().get(self.transport.url(path)).query(&[
                        ("limit", BITBUCKET_PAGE_LIMIT),
                        ("start", start_value.as_str()),
                    ])
                })
                .await?;
            rows.extend(page.values);
            match page.next_page_start {
                Some(next) if !page.is_last_page && next > start => start = next,
                _ => break,
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl SourceHostingClient for BitBucketClient {
    fn service_name(&self) -> &'static str {
        "bitbucket"
    }

    async fn get_repo(&self, repo: &str) -> Result<Repo, ClientError> {
        let repo = RepoName::parse(repo)?;
        let path = Self::repo_path(&repo);
        let fetched: BitBucketRepo = self
            .transport
            .request_json("get repo", || {
                self.transport.http().get(self.transport.url(&path))
            })
            .await?;
        let ssh_url = fetched
            .links
            .clone
            .into_iter()
            .find(|link| link.name.as_deref() == Some("ssh"))
            .map(|link| link.href);
        // BitBucket only returns repositories the token can read; write access
        // is discovered when the first status is posted.
        Ok(Repo {
            full_name: format!("{}/{}", fetched.project.key, fetched.slug),
            permissions: RepoPermissions {
                read: true,
                write: true,
            },
            ssh_url,
            rate_limit: None,
        })
    }

    async fn get_open_pull_requests(&self, repo: &str) -> Result<Vec<PullRequest>, ClientError> {
        let repo = RepoName::parse(repo)?;
        let path = format!("{}/pull-requests?state=OPEN", Self::repo_path(&repo));
        let rows: Vec<BitBucketPullRequest> =
            self.get_all_pages("list pull requests", &path).await?;
        Ok(rows
            .into_iter()
            .map(|row| PullRequest {
                number: row.id,
                title: row.title,
                head_name: row.from_ref.display_id,
                head_commit_sha: row.from_ref.latest_commit,
                base_name: row.to_ref.display_id,
            })
            .collect())
    }

    async fn get_branches_of_repo(&self, repo: &str) -> Result<Vec<Branch>, ClientError> {
        let repo = RepoName::parse(repo)?;
        let path = format!("{}/branches", Self::repo_path(&repo));
        let rows: Vec<BitBucketRef> = self.get_all_pages("list branches", &path).await?;
        Ok(rows
            .into_iter()
            .map(|row| Branch {
                name: row.display_id,
                commit_sha: row.latest_commit,
            })
            .collect())
    }

    async fn get_status_of_commit(
        &self,
        commit: &str,
        _repo: &str,
    ) -> Result<Option<CommitStatus>, ClientError> {
        let path = format!("rest/build-status/1.0/commits/{commit}");
        let rows: Vec<BitBucketBuildStatus> =
            self.get_all_pages("get commit statuses", &path).await?;
        Ok(rows
            .into_iter()
            .find(|status| status.key == self.status_context)
            .map(|status| CommitStatus {
                state: build_state_from_bitbucket(&status),
                description: status.description,
                target_url: status.url,
                context: status.key,
            }))
    }

    async fn post_status_of_commit(
        &self,
        commit: &str,
        status: &CommitStatus,
        _repo: &str,
    ) -> Result<CommitStatus, ClientError> {
        let path = format!("rest/build-status/1.0/commits/{commit}");
        let payload = json!({
            "state": bitbucket_state(status.state),
            "key": status.context,
            "name": format!("{}: {}", status.context, status.state.as_str()),
            "url": status.target_url.clone().unwrap_or_default(),
            "description": status.description.clone().unwrap_or_default(),
        });
        self.transport
            .request_empty("post commit status", || {
                self.transport
                    .http()
                    .post(self.transport.url(&path))
                    .json(&payload)
            })
            .await?;
        Ok(status.clone())
    }

    async fn get_comments_of_issue(
        &self,
        issue_number: u64,
        repo: &str,
    ) -> Result<Vec<IssueComment>, ClientError> {
        let repo = RepoName::parse(repo)?;
        let path = format!(
            "{}/pull-requests/{issue_number}/activities",
            Self::repo_path(&repo)
        );
        let rows: Vec<BitBucketActivity> =
            self.get_all_pages("list pull request activities", &path).await?;
        Ok(rows
            .into_iter()
            .filter(|activity| activity.action == "COMMENTED")
            .filter_map(|activity| activity.comment)
            .map(IssueComment::from)
            .collect())
    }

    async fn post_comment_on_issue(
        &self,
        comment: &str,
        issue_number: u64,
        repo: &str,
    ) -> Result<IssueComment, ClientError> {
        let repo = RepoName::parse(repo)?;
        let path = format!(
            "{}/pull-requests/{issue_number}/comments",
            Self::repo_path(&repo)
        );
        let payload = json!({ "text": comment });
        let created: BitBucketComment = self
            .transport
            .request_json_non_idempotent("create pull request comment", || {
                self.transport
                    .http()
                    .post(self.transport.url(&path))
                    .json(&payload)
            })
            .await?;
        Ok(created.into())
    }

    fn create_status_from_state(
        &self,
        state: BuildState,
        description: Option<&str>,
        target_url: Option<&str>,
    ) -> CommitStatus {
        CommitStatus {
            state,
            description: description.map(ToOwned::to_owned),
            target_url: target_url.map(ToOwned::to_owned),
            context: self.status_context.clone(),
        }
    }
}
