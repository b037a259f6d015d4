use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use buildsync_types::{
    Bot, BotConfiguration, Branch, BuildState, CiServerClient, ClientError, CommitStatus,
    Integration, IntegrationIssues, IntegrationStep, IntegrationsQuery, IssueComment, Notifier,
    NotifierNotification, PullRequest, RateLimitInfo, Repo, RepoPermissions, SourceHostingClient,
};

fn failure(operation: &str) -> ClientError {
    ClientError::HttpStatus {
        status: 500,
        body: format!("{operation} failed"),
    }
}

#[derive(Default)]
pub(crate) struct FakeHosting {
    pub(crate) prs: Mutex<Vec<PullRequest>>,
    pub(crate) branches: Mutex<Vec<Branch>>,
    pub(crate) statuses: Mutex<BTreeMap<String, CommitStatus>>,
    pub(crate) comments: Mutex<BTreeMap<u64, Vec<IssueComment>>>,
    pub(crate) posted_statuses: Mutex<Vec<(String, CommitStatus)>>,
    pub(crate) posted_comments: Mutex<Vec<(u64, String)>>,
    pub(crate) get_repo_calls: AtomicUsize,
    pub(crate) get_branches_calls: AtomicUsize,
    pub(crate) fail_get_prs: AtomicBool,
    pub(crate) fail_post_status: AtomicBool,
    pub(crate) fail_get_status: AtomicBool,
}

impl FakeHosting {
    pub(crate) fn with_prs(prs: Vec<PullRequest>) -> Self {
        let hosting = Self::default();
        *hosting.prs.lock().expect("lock") = prs;
        hosting
    }

    pub(crate) fn posted_status_count(&self) -> usize {
        self.posted_statuses.lock().expect("lock").len()
    }

    pub(crate) fn add_comment(&self, issue_number: u64, body: &str) {
        let mut comments = self.comments.lock().expect("lock");
        let entry = comments.entry(issue_number).or_default();
        let id = entry.len() as u64 + 1;
        entry.push(IssueComment {
            id,
            body: body.to_string(),
            author: Some("reviewer".to_string()),
        });
    }
}

#[async_trait]
impl SourceHostingClient for FakeHosting {
    fn service_name(&self) -> &'static str {
        "fake"
    }

    async fn get_repo(&self, repo: &str) -> Result<Repo, ClientError> {
        self.get_repo_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Repo {
            full_name: repo.to_string(),
            permissions: RepoPermissions {
                read: true,
                write: true,
            },
            ssh_url: Some(format!("git@example.com:{repo}.git")),
            rate_limit: Some(RateLimitInfo {
                limit: 5000,
                remaining: 4990,
                reset_unix: 0,
            }),
        })
    }

    async fn get_open_pull_requests(&self, _repo: &str) -> Result<Vec<PullRequest>, ClientError> {
        if self.fail_get_prs.load(Ordering::SeqCst) {
            return Err(failure("list pull requests"));
        }
        Ok(self.prs.lock().expect("lock").clone())
    }

    async fn get_branches_of_repo(&self, _repo: &str) -> Result<Vec<Branch>, ClientError> {
        self.get_branches_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.branches.lock().expect("lock").clone())
    }

    async fn get_status_of_commit(
        &self,
        commit: &str,
        _repo: &str,
    ) -> Result<Option<CommitStatus>, ClientError> {
        if self.fail_get_status.load(Ordering::SeqCst) {
            return Err(failure("get status"));
        }
        Ok(self.statuses.lock().expect("lock").get(commit).cloned())
    }

    async fn post_status_of_commit(
        &self,
        commit: &str,
        status: &CommitStatus,
        _repo: &str,
    ) -> Result<CommitStatus, ClientError> {
        if self.fail_post_status.load(Ordering::SeqCst) {
            return Err(failure("post status"));
        }
        self.statuses
            .lock()
            .expect("lock")
            .insert(commit.to_string(), status.clone());
        self.posted_statuses
            .lock()
            .expect("lock")
            .push((commit.to_string(), status.clone()));
        Ok(status.clone())
    }

    async fn get_comments_of_issue(
        &self,
        issue_number: u64,
        _repo: &str,
    ) -> Result<Vec<IssueComment>, ClientError> {
        Ok(self
            .comments
            .lock()
            .expect("lock")
            .get(&issue_number)
            .cloned()
            .unwrap_or_default())
    }

    async fn post_comment_on_issue(
        &self,
        comment: &str,
        issue_number: u64,
        _repo: &str,
    ) -> Result<IssueComment, ClientError> {
        self.posted_comments
            .lock()
            .expect("lock")
            .push((issue_number, comment.to_string()));
        Ok(IssueComment {
            id: 1,
            body: comment.to_string(),
            author: None,
        })
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
            context: "buildsync".to_string(),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeCi {
    pub(crate) bots: Mutex<Vec<Bot>>,
    pub(crate) integrations: Mutex<BTreeMap<String, Vec<Integration>>>,
    pub(crate) issues: Mutex<BTreeMap<String, IntegrationIssues>>,
    pub(crate) started: Mutex<Vec<String>>,
    pub(crate) canceled: Mutex<Vec<String>>,
    pub(crate) created: Mutex<Vec<(String, BotConfiguration)>>,
    pub(crate) deleted: Mutex<Vec<String>>,
    pub(crate) queries: Mutex<Vec<IntegrationsQuery>>,
    pub(crate) get_bots_calls: AtomicUsize,
    pub(crate) get_bots_delay_ms: AtomicU64,
    pub(crate) fail_start: AtomicBool,
    pub(crate) fail_cancel: AtomicBool,
    pub(crate) fail_create: AtomicBool,
}

impl FakeCi {
    pub(crate) fn with_bot(bot: Bot, integrations: Vec<Integration>) -> Self {
        let ci = Self::default();
        ci.integrations
            .lock()
            .expect("lock")
            .insert(bot.id.clone(), integrations);
        ci.bots.lock().expect("lock").push(bot);
        ci
    }
}

#[async_trait]
impl CiServerClient for FakeCi {
    fn hostname(&self) -> &str {
        "ci.local"
    }

    async fn get_bots(&self) -> Result<Vec<Bot>, ClientError> {
        self.get_bots_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.get_bots_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(self.bots.lock().expect("lock").clone())
    }

    async fn get_bot_integrations(
        &self,
        bot_id: &str,
        query: IntegrationsQuery,
    ) -> Result<Vec<Integration>, ClientError> {
        self.queries.lock().expect("lock").push(query);
        Ok(self
            .integrations
            .lock()
            .expect("lock")
            .get(bot_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn post_integration(&self, bot_id: &str) -> Result<Integration, ClientError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(failure("start integration"));
        }
        self.started.lock().expect("lock").push(bot_id.to_string());
        let mut integrations = self.integrations.lock().expect("lock");
        let entry = integrations.entry(bot_id.to_string()).or_default();
        let number = entry.iter().map(|integration| integration.number).max().unwrap_or(0) + 1;
        let integration = Integration {
            id: format!("{bot_id}-i{number}"),
            number,
            step: IntegrationStep::Pending,
            result: None,
            commit_sha: None,
            build_result_summary: None,
            duration_seconds: None,
        };
        entry.push(integration.clone());
        Ok(integration)
    }

    async fn cancel_integration(&self, integration_id: &str) -> Result<(), ClientError> {
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(failure("cancel integration"));
        }
        self.canceled
            .lock()
            .expect("lock")
            .push(integration_id.to_string());
        Ok(())
    }

    async fn get_integration_issues(
        &self,
        integration_id: &str,
    ) -> Result<IntegrationIssues, ClientError> {
        Ok(self
            .issues
            .lock()
            .expect("lock")
            .get(integration_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_bot(
        &self,
        name: &str,
        configuration: &BotConfiguration,
    ) -> Result<Bot, ClientError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(failure("create bot"));
        }
        let mut bots = self.bots.lock().expect("lock");
        let bot = Bot {
            id: format!("bot-{}", bots.len() + 1),
            revision: Some("1-a".to_string()),
            tiny_id: None,
            name: name.to_string(),
            configuration: Some(configuration.clone()),
        };
        bots.push(bot.clone());
        self.created
            .lock()
            .expect("lock")
            .push((name.to_string(), configuration.clone()));
        Ok(bot)
    }

    async fn delete_bot(&self, bot: &Bot) -> Result<(), ClientError> {
        self.bots
            .lock()
            .expect("lock")
            .retain(|existing| existing.id != bot.id);
        self.deleted.lock().expect("lock").push(bot.id.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeNotifier {
    pub(crate) notifications: Mutex<Vec<NotifierNotification>>,
    pub(crate) fail: AtomicBool,
}

#[async_trait]
impl Notifier for FakeNotifier {
    fn name(&self) -> &str {
        "fake-notifier"
    }

    async fn post_comment_on_issue(
        &self,
        notification: &NotifierNotification,
    ) -> Result<Option<IssueComment>, ClientError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(failure("notify"));
        }
        self.notifications
            .lock()
            .expect("lock")
            .push(notification.clone());
        Ok(None)
    }
}
