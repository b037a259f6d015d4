use async_trait::async_trait;
use buildsync_transport::{HttpTransport, TransportConfig};
use buildsync_types::{
    Branch, BuildState, ClientError, CommitStatus, IssueComment, PullRequest, RateLimitInfo, Repo,
    RepoPermissions, SourceHostingClient,
};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use crate::RepoName;

pub const GITHUB_DEFAULT_API_BASE: &str = "https://api.github.com";
const GITHUB_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct GithubRepoPermissions {
    #[serde(default)]
    pull: bool,
    #[serde(default)]
    push: bool,
}

#[derive(Debug, Deserialize)]
struct GithubRepo {
    full_name: String,
    #[serde(default)]
    ssh_url: Option<String>,
    #[serde(default)]
    permissions: Option<GithubRepoPermissions>,
}

#[derive(Debug, Deserialize)]
struct GithubRef {
    #[serde(rename = "ref")]
    ref_name: String,
    #[serde(default)]
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GithubPullRequest {
    number: u64,
    #[serde(default)]
    title: String,
    head: GithubRef,
    base: GithubRef,
}

#[derive(Debug, Deserialize)]
struct GithubCommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GithubBranch {
    name: String,
    commit: GithubCommitRef,
}

#[derive(Debug, Deserialize)]
struct GithubStatus {
    state: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    target_url: Option<String>,
    #[serde(default)]
    context: String,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GithubComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    user: Option<GithubUser>,
}

impl From<GithubComment> for IssueComment {
    fn from(value: GithubComment) -> Self {
        Self {
            id: value.id,
            body: value.body.unwrap_or_default(),
            author: value.user.map(|user| user.login),
        }
    }
}

fn github_state(state: BuildState) -> &'static str {
    match state {
        BuildState::NoState | BuildState::Pending => "pending",
        BuildState::Success => "success",
        BuildState::Failure => "failure",
        BuildState::Error => "error",
    }
}

fn build_state_from_github(raw: &str) -> BuildState {
    match raw {
        "pending" => BuildState::Pending,
        "success" => BuildState::Success,
        "failure" => BuildState::Failure,
        "error" => BuildState::Error,
        _ => BuildState::NoState,
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
}

fn rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    Some(RateLimitInfo {
        limit: header_u64(headers, "x-ratelimit-limit")?,
        remaining: header_u64(headers, "x-ratelimit-remaining")?,
        reset_unix: header_u64(headers, "x-ratelimit-reset").unwrap_or_default(),
    })
}

#[derive(Clone)]
/// GitHub REST v3 implementation of `SourceHostingClient`.
pub struct GithubClient {
    transport: HttpTransport,
    status_context: String,
}

impl GithubClient {
    pub fn new(
        transport: &TransportConfig,
        token: &str,
        status_context: &str,
    ) -> Result<Self, ClientError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ClientError::InvalidRequest(
                "github token cannot be empty".to_string(),
            ));
        }
        let transport = HttpTransport::new(
            transport,
            &[
                ("accept", "application/vnd.github+json".to_string()),
                ("x-github-api-version", "2022-11-28".to_string()),
                ("authorization", format!("Bearer {token}")),
            ],
        )?;
        Ok(Self {
            transport,
            status_context: status_context.to_string(),
        })
    }

    async fn get_paginated<T>(&self, operation: &str, path: &str) -> Result<Vec<T>, ClientError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let page_value = page.to_string();
            let per_page = GITHUB_PAGE_SIZE.to_string();
            let chunk: Vec<T> = self
                .transport
                .request_json(operation, || {
                    self.transport.http().get(self.transport.url(path)).query(&[
                        ("per_page", per_page.as_str()),
                        ("page", page_value.as_str()),
                    ])
                })
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < GITHUB_PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }
}

#[async_trait]
impl SourceHostingClient for GithubClient {
    fn service_name(&self) -> &'static str {
        "github"
    }

    async fn get_repo(&self, repo: &str) -> Result<Repo, ClientError> {
        let repo = RepoName::parse(repo)?;
        let path = format!("repos/{}/{}", repo.owner, repo.name);
        let response = self
            .transport
            .request_json_with_headers::<GithubRepo, _>("get repo", || {
                self.transport.http().get(self.transport.url(&path))
            })
            .await?;
        let permissions = response
            .value
            .permissions
            .map(|value| RepoPermissions {
                read: value.pull,
                write: value.push,
            })
            .unwrap_or_default();
        Ok(Repo {
            full_name: response.value.full_name,
            permissions,
            ssh_url: response.value.ssh_url,
            rate_limit: rate_limit_from_headers(&response.headers),
        })
    }

    async fn get_open_pull_requests(&self, repo: &str) -> Result<Vec<PullRequest>, ClientError> {
        let repo = RepoName::parse(repo)?;
        let path = format!("repos/{}/{}/pulls?state=open", repo.owner, repo.name);
        let rows: Vec<GithubPullRequest> = self.get_paginated("list pull requests", &path).await?;
        Ok(rows
            .into_iter()
            .map(|row| PullRequest {
                number: row.number,
                title: row.title,
                head_name: row.head.ref_name,
                head_commit_sha: row.head.sha,
                base_name: row.base.ref_name,
            })
            .collect())
    }

    async fn get_branches_of_repo(&self, repo: &str) -> Result<Vec<Branch>, ClientError> {
        let repo = RepoName::parse(repo)?;
        let path = format!("repos/{}/{}/branches", repo.owner, repo.name);
        let rows: Vec<GithubBranch> = self.get_paginated("list branches", &path).await?;
        Ok(rows
            .into_iter()
            .map(|row| Branch {
                name: row.name,
                commit_sha: row.commit.sha,
            })
            .collect())
    }

    async fn get_status_of_commit(
        &self,
        commit: &str,
        repo: &str,
    ) -> Result<Option<CommitStatus>, ClientError> {
        let repo = RepoName::parse(repo)?;
        let path = format!("repos/{}/{}/commits/{commit}/statuses", repo.owner, repo.name);
        // Statuses come back newest first; the first one with our context wins.
        let statuses: Vec<GithubStatus> = self
            .transport
            .request_json("get commit statuses", || {
                self.transport.http().get(self.transport.url(&path))
            })
            .await?;
        Ok(statuses
            .into_iter()
            .find(|status| status.context == self.status_context)
            .map(|status| CommitStatus {
                state: build_state_from_github(&status.state),
                description: status.description,
                target_url: status.target_url,
                context: status.context,
            }))
    }

    async fn post_status_of_commit(
        &self,
        commit: &str,
        status: &CommitStatus,
        repo: &str,
    ) -> Result<CommitStatus, ClientError> {
        let repo = RepoName::parse(repo)?;
        let path = format!("repos/{}/{}/statuses/{commit}", repo.owner, repo.name);
        let payload = json!({
            "state": github_state(status.state),
            "description": status.description,
            "target_url": status.target_url,
            "context": status.context,
        });
        let created: GithubStatus = self
            .transport
            .request_json("post commit status", || {
                self.transport
                    .http()
                    .post(self.transport.url(&path))
                    .json(&payload)
            })
            .await?;
        Ok(CommitStatus {
            state: build_state_from_github(&created.state),
            description: created.description,
            target_url: created.target_url,
            context: created.context,
        })
    }

    async fn get_comments_of_issue(
        &self,
        issue_number: u64,
        repo: &str,
    ) -> Result<Vec<IssueComment>, ClientError> {
        let repo = RepoName::parse(repo)?;
        let path = format!(
            "repos/{}/{}/issues/{issue_number}/comments",
            repo.owner, repo.name
        );
        let rows: Vec<GithubComment> = self.get_paginated("list issue comments", &path).await?;
        Ok(rows.into_iter().map(IssueComment::from).collect())
    }

    async fn post_comment_on_issue(
        &self,
        comment: &str,
        issue_number: u64,
        repo: &str,
    ) -> Result<IssueComment, ClientError> {
        let repo = RepoName::parse(repo)?;
        let path = format!(
            "repos/{}/{}/issues/{issue_number}/comments",
            repo.owner, repo.name
        );
        let payload = json!({ "body": comment });
        let created: GithubComment = self
            .transport
            .request_json_non_idempotent("create issue comment", || {
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
        // GitHub has no "no state"; it reads back as pending.
        let state = match state {
            BuildState::NoState => BuildState::Pending,
            other => other,
        };
        CommitStatus {
            state,
            description: description.map(ToOwned::to_owned),
            target_url: target_url.map(ToOwned::to_owned),
            context: self.status_context.clone(),
        }
    }
}
