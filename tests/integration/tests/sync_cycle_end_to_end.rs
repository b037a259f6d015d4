use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use buildsync_sync::{
    name_for_branch_bot, name_for_pr_bot, BuildTemplate, ProjectConfig, SyncContext, SyncTrigger,
    Syncer, SyncerConfig, SyncerEvent,
};
use buildsync_types::{
    Bot, BotConfiguration, BotSchedule, Branch, BuildResultSummary, BuildState, CiServerClient,
    ClientError, CommitStatus, Integration, IntegrationIssue, IntegrationIssueStatus,
    IntegrationIssueType, IntegrationIssues, IntegrationResult, IntegrationStep,
    IntegrationsQuery, IssueComment, Notifier, NotifierNotification, PullRequest, Repo,
    RepoPermissions, SourceHostingClient,
};
use tokio::sync::Mutex as AsyncMutex;

const REPO: &str = "octo/widgets";
const CI_HOST: &str = "ci.example.com";

#[derive(Default)]
struct ScriptedHosting {
    prs: AsyncMutex<Vec<PullRequest>>,
    branches: AsyncMutex<Vec<Branch>>,
    statuses: AsyncMutex<BTreeMap<String, CommitStatus>>,
    comments: AsyncMutex<BTreeMap<u64, Vec<IssueComment>>>,
    status_writes: AsyncMutex<Vec<(String, CommitStatus)>>,
    comment_writes: AsyncMutex<Vec<(u64, String)>>,
}

impl ScriptedHosting {
    async fn open_pr(&self, number: u64, head: &str, sha: &str) {
        let mut prs = self.prs.lock().await;
        prs.retain(|pr| pr.number != number);
        prs.push(PullRequest {
            number,
            title: format!("Change #{number}"),
            head_name: head.to_string(),
            head_commit_sha: sha.to_string(),
            base_name: "main".to_string(),
        });
    }

    async fn close_pr(&self, number: u64) {
        self.prs.lock().await.retain(|pr| pr.number != number);
    }

    async fn push_branch(&self, name: &str, sha: &str) {
        let mut branches = self.branches.lock().await;
        branches.retain(|branch| branch.name != name);
        branches.push(Branch {
            name: name.to_string(),
            commit_sha: sha.to_string(),
        });
    }

    async fn comment(&self, issue_number: u64, body: &str) {
        let mut comments = self.comments.lock().await;
        let entry = comments.entry(issue_number).or_default();
        let id = entry.len() as u64 + 1;
        entry.push(IssueComment {
            id,
            body: body.to_string(),
            author: Some("reviewer".to_string()),
        });
    }

    async fn status_of(&self, commit: &str) -> Option<CommitStatus> {
        self.statuses.lock().await.get(commit).cloned()
    }

    async fn status_write_count(&self) -> usize {
        self.status_writes.lock().await.len()
    }

    async fn comment_writes(&self) -> Vec<(u64, String)> {
        self.comment_writes.lock().await.clone()
    }
}

#[async_trait]
impl SourceHostingClient for ScriptedHosting {
    fn service_name(&self) -> &'static str {
        "scripted"
    }

    async fn get_repo(&self, repo: &str) -> Result<Repo, ClientError> {
        Ok(Repo {
            full_name: repo.to_string(),
            permissions: RepoPermissions {
                read: true,
                write: true,
            },
            ssh_url: Some(format!("git@example.com:{repo}.git")),
            rate_limit: None,
        })
    }

    async fn get_open_pull_requests(&self, _repo: &str) -> Result<Vec<PullRequest>, ClientError> {
        Ok(self.prs.lock().await.clone())
    }

    async fn get_branches_of_repo(&self, _repo: &str) -> Result<Vec<Branch>, ClientError> {
        Ok(self.branches.lock().await.clone())
    }

    async fn get_status_of_commit(
        &self,
        commit: &str,
        _repo: &str,
    ) -> Result<Option<CommitStatus>, ClientError> {
        Ok(self.statuses.lock().await.get(commit).cloned())
    }

    async fn post_status_of_commit(
        &self,
        commit: &str,
        status: &CommitStatus,
        _repo: &str,
    ) -> Result<CommitStatus, ClientError> {
        self.statuses
            .lock()
            .await
            .insert(commit.to_string(), status.clone());
        self.status_writes
            .lock()
            .await
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
            .await
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
        self.comment_writes
            .lock()
            .await
            .push((issue_number, comment.to_string()));
        Ok(IssueComment {
            id: 1000,
            body: comment.to_string(),
            author: Some("buildsync".to_string()),
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
struct ScriptedCi {
    bots: AsyncMutex<Vec<Bot>>,
    integrations: AsyncMutex<BTreeMap<String, Vec<Integration>>>,
    issues: AsyncMutex<BTreeMap<String, IntegrationIssues>>,
    created: AsyncMutex<Vec<(String, BotConfiguration)>>,
    started: AsyncMutex<Vec<String>>,
    canceled: AsyncMutex<Vec<String>>,
    deleted: AsyncMutex<Vec<String>>,
    next_bot: AtomicU64,
    get_bots_delay_ms: AtomicU64,
}

impl ScriptedCi {
    async fn bot_named(&self, name: &str) -> Option<Bot> {
        self.bots
            .lock()
            .await
            .iter()
            .find(|bot| bot.name == name)
            .cloned()
    }

    async fn seed_bot(&self, name: &str, integrations: Vec<Integration>) -> Bot {
        let number = self.next_bot.fetch_add(1, Ordering::SeqCst) + 1;
        let bot = Bot {
            id: format!("seeded-{number}"),
            revision: Some("1-a".to_string()),
            tiny_id: Some(format!("T{number}")),
            name: name.to_string(),
            configuration: None,
        };
        self.bots.lock().await.push(bot.clone());
        self.integrations
            .lock()
            .await
            .insert(bot.id.clone(), integrations);
        bot
    }

    /// Moves the bot's newest integration forward, as Xcode Server would.
    async fn advance_latest(
        &self,
        bot_id: &str,
        step: IntegrationStep,
        commit: &str,
        result: Option<IntegrationResult>,
        summary: Option<BuildResultSummary>,
    ) -> String {
        let mut integrations = self.integrations.lock().await;
        let entry = integrations.entry(bot_id.to_string()).or_default();
        let latest = entry
            .iter_mut()
            .max_by_key(|integration| integration.number)
            .expect("bot should have an integration");
        latest.step = step;
        latest.commit_sha = Some(commit.to_string());
        latest.result = result;
        latest.build_result_summary = summary;
        if step == IntegrationStep::Completed {
            latest.duration_seconds = Some(65.0);
        }
        latest.id.clone()
    }

    async fn started_count(&self) -> usize {
        self.started.lock().await.len()
    }
}

#[async_trait]
impl CiServerClient for ScriptedCi {
    fn hostname(&self) -> &str {
        CI_HOST
    }

    async fn get_bots(&self) -> Result<Vec<Bot>, ClientError> {
        let delay = self.get_bots_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(self.bots.lock().await.clone())
    }

    async fn get_bot_integrations(
        &self,
        bot_id: &str,
        query: IntegrationsQuery,
    ) -> Result<Vec<Integration>, ClientError> {
        let integrations = self.integrations.lock().await;
        let mut list = integrations.get(bot_id).cloned().unwrap_or_default();
        list.sort_by(|left, right| right.number.cmp(&left.number));
        list.truncate(query.last);
        Ok(list)
    }

    async fn post_integration(&self, bot_id: &str) -> Result<Integration, ClientError> {
        self.started.lock().await.push(bot_id.to_string());
        let mut integrations = self.integrations.lock().await;
        let entry = integrations.entry(bot_id.to_string()).or_default();
        let number = entry
            .iter()
            .map(|integration| integration.number)
            .max()
            .unwrap_or(0)
            + 1;
        let integration = Integration {
            id: format!("{bot_id}-{number}"),
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
        self.canceled.lock().await.push(integration_id.to_string());
        let mut integrations = self.integrations.lock().await;
        for integration in integrations.values_mut().flatten() {
            if integration.id == integration_id {
                integration.step = IntegrationStep::Completed;
                integration.result = Some(IntegrationResult::Canceled);
            }
        }
        Ok(())
    }

    async fn get_integration_issues(
        &self,
        integration_id: &str,
    ) -> Result<IntegrationIssues, ClientError> {
        Ok(self
            .issues
            .lock()
            .await
            .get(integration_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_bot(
        &self,
        name: &str,
        configuration: &BotConfiguration,
    ) -> Result<Bot, ClientError> {
        let number = self.next_bot.fetch_add(1, Ordering::SeqCst) + 1;
        let bot = Bot {
            id: format!("bot-{number}"),
            revision: Some("1-a".to_string()),
            tiny_id: Some(format!("T{number}")),
            name: name.to_string(),
            configuration: Some(configuration.clone()),
        };
        self.bots.lock().await.push(bot.clone());
        self.created
            .lock()
            .await
            .push((name.to_string(), configuration.clone()));
        Ok(bot)
    }

    async fn delete_bot(&self, bot: &Bot) -> Result<(), ClientError> {
        self.bots.lock().await.retain(|existing| existing.id != bot.id);
        self.deleted.lock().await.push(bot.id.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notifications: AsyncMutex<Vec<NotifierNotification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn post_comment_on_issue(
        &self,
        notification: &NotifierNotification,
    ) -> Result<Option<IssueComment>, ClientError> {
        self.notifications.lock().await.push(notification.clone());
        Ok(None)
    }
}

struct World {
    hosting: Arc<ScriptedHosting>,
    ci: Arc<ScriptedCi>,
    notifier: Arc<RecordingNotifier>,
    syncer: Syncer,
}

impl World {
    fn new(config: SyncerConfig) -> Self {
        let hosting = Arc::new(ScriptedHosting::default());
        let ci = Arc::new(ScriptedCi::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let mut template = BuildTemplate::new("Widgets");
        template.schedule = BotSchedule::OnCommit;
        let context = SyncContext {
            hosting: hosting.clone(),
            ci: ci.clone(),
            notifiers: vec![notifier.clone() as Arc<dyn Notifier>],
            config,
            build_template: template,
            project: ProjectConfig {
                repo: REPO.to_string(),
                ssh_url: "git@example.com:octo/widgets.git".to_string(),
                project_path: "Widgets.xcodeproj".to_string(),
            },
            triggers: Vec::new(),
        };
        let syncer = Syncer::new("widgets", context, None).expect("syncer");
        Self {
            hosting,
            ci,
            notifier,
            syncer,
        }
    }

    /// Runs one cycle and asserts it finished without a reported error.
    async fn cycle(&self) {
        assert_eq!(self.syncer.sync_now().await, SyncTrigger::Started);
        let snapshot = self.syncer.snapshot();
        assert_eq!(snapshot.last_error, None, "cycle reported an error");
        assert_eq!(snapshot.state, SyncerEvent::DidFinishSyncing { error: None });
    }
}

fn ungated() -> SyncerConfig {
    SyncerConfig {
        wait_for_keyword: false,
        ..SyncerConfig::default()
    }
}

fn perfect_summary(tests: u64) -> BuildResultSummary {
    BuildResultSummary {
        tests_count: tests,
        ..BuildResultSummary::default()
    }
}

fn integration(
    id: &str,
    number: u64,
    step: IntegrationStep,
    commit: Option<&str>,
    result: Option<IntegrationResult>,
) -> Integration {
    Integration {
        id: id.to_string(),
        number,
        step,
        result,
        commit_sha: commit.map(ToOwned::to_owned),
        build_result_summary: result.map(|_| perfect_summary(4)),
        duration_seconds: result.map(|_| 12.0),
    }
}

#[tokio::test]
async fn integration_pr_lifecycle_from_keyword_gate_to_green_build() {
    let world = World::new(SyncerConfig::default());
    world.hosting.open_pr(42, "feature-x", "abc123").await;
    let bot_name = name_for_pr_bot(42, REPO);

    world.cycle().await;
    let created = world.ci.created.lock().await.clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].0, bot_name);
    assert_eq!(created[0].1.schedule, BotSchedule::Manual);
    assert_eq!(created[0].1.source_control.branch, "feature-x");

    world.cycle().await;
    let waiting = world.hosting.status_of("abc123").await.expect("status");
    assert_eq!(waiting.state, BuildState::Pending);
    assert_eq!(
        waiting.description.as_deref(),
        Some("Waiting for \"lttm\" to start testing")
    );
    assert_eq!(world.ci.started_count().await, 0);

    world.cycle().await;
    assert_eq!(world.hosting.status_write_count().await, 1);

    world.hosting.comment(42, "Looks good, LTTM!").await;
    world.cycle().await;
    assert_eq!(world.ci.started_count().await, 1);
    let queued = world.hosting.status_of("abc123").await.expect("status");
    assert_eq!(
        queued.description.as_deref(),
        Some("Build waiting in queue...")
    );

    let bot = world.ci.bot_named(&bot_name).await.expect("bot");
    world
        .ci
        .advance_latest(&bot.id, IntegrationStep::Building, "abc123", None, None)
        .await;
    world.cycle().await;
    let building = world.hosting.status_of("abc123").await.expect("status");
    assert_eq!(
        building.description.as_deref(),
        Some("Integration step: building...")
    );

    world
        .ci
        .advance_latest(
            &bot.id,
            IntegrationStep::Completed,
            "abc123",
            Some(IntegrationResult::Succeeded),
            Some(perfect_summary(10)),
        )
        .await;
    world.cycle().await;
    let passed = world.hosting.status_of("abc123").await.expect("status");
    assert_eq!(passed.state, BuildState::Success);
    assert_eq!(passed.description.as_deref(), Some("Build passed!"));
    assert_eq!(
        passed.target_url.as_deref(),
        Some("https://ci.example.com/xcode/bots/T1/integrations/1")
    );
    let comments = world.hosting.comment_writes().await;
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].0, 42);
    assert!(comments[0]
        .1
        .contains("*Result*: **Perfect build!** All 10 tests passed. :+1:"));
    assert!(comments[0].1.contains("*Duration*: 1 minute and 5 seconds"));
    let notifications = world.notifier.notifications.lock().await.clone();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].issue_number, Some(42));
    assert_eq!(notifications[0].integration_result.as_deref(), Some("succeeded"));

    let writes_before = world.hosting.status_write_count().await;
    world.cycle().await;
    world.cycle().await;
    assert_eq!(world.hosting.status_write_count().await, writes_before);
    assert_eq!(world.hosting.comment_writes().await.len(), 1);
    assert_eq!(world.ci.started_count().await, 1);

    world.hosting.close_pr(42).await;
    world.cycle().await;
    assert_eq!(world.ci.deleted.lock().await.clone(), vec![bot.id.clone()]);
    assert!(world.ci.bot_named(&bot_name).await.is_none());
}

#[tokio::test]
async fn integration_ungated_pr_starts_one_integration_on_second_cycle() {
    let world = World::new(ungated());
    world.hosting.open_pr(42, "feature-x", "abc123").await;

    world.cycle().await;
    assert_eq!(world.ci.created.lock().await.len(), 1);
    assert_eq!(world.ci.started_count().await, 0);

    world.cycle().await;
    assert_eq!(world.ci.started_count().await, 1);

    world.cycle().await;
    world.cycle().await;
    assert_eq!(world.ci.started_count().await, 1);
    assert_eq!(world.ci.created.lock().await.len(), 1);
}

#[tokio::test]
async fn integration_watched_release_branch_builds_and_notifies_summary() {
    let config = SyncerConfig {
        watched_branches: BTreeMap::from([("release".to_string(), true)]),
        ..ungated()
    };
    let world = World::new(config);
    world.hosting.push_branch("main", "m1").await;
    world.hosting.push_branch("release", "r1").await;
    let bot_name = name_for_branch_bot("release", REPO);

    world.cycle().await;
    let created = world.ci.created.lock().await.clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].0, bot_name);
    assert_eq!(created[0].1.schedule, BotSchedule::OnCommit);
    assert_eq!(
        world.syncer.snapshot().watched_branches,
        BTreeMap::from([("main".to_string(), false), ("release".to_string(), true)])
    );

    world.cycle().await;
    assert_eq!(world.ci.started_count().await, 1);
    let bot = world.ci.bot_named(&bot_name).await.expect("bot");
    world
        .ci
        .advance_latest(
            &bot.id,
            IntegrationStep::Completed,
            "r1",
            Some(IntegrationResult::Succeeded),
            Some(perfect_summary(10)),
        )
        .await;

    world.cycle().await;
    let status = world.hosting.status_of("r1").await.expect("status");
    assert_eq!(status.state, BuildState::Success);
    assert!(world.hosting.comment_writes().await.is_empty());
    let notifications = world.notifier.notifications.lock().await.clone();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].issue_number, None);
    assert_eq!(notifications[0].branch, "release");
    assert!(notifications[0]
        .comment
        .contains("*Result*: **Perfect build!** All 10 tests passed. :+1:"));
    assert!(world.hosting.status_of("m1").await.is_none());
}

#[tokio::test]
async fn integration_new_head_commit_cancels_stale_integration_and_restarts() {
    let world = World::new(ungated());
    world.hosting.open_pr(7, "topic", "new-sha").await;
    let bot = world
        .ci
        .seed_bot(
            &name_for_pr_bot(7, REPO),
            vec![integration(
                "stale",
                1,
                IntegrationStep::Testing,
                Some("old-sha"),
                None,
            )],
        )
        .await;

    world.cycle().await;

    assert_eq!(world.ci.canceled.lock().await.clone(), vec!["stale".to_string()]);
    assert_eq!(world.ci.started.lock().await.clone(), vec![bot.id.clone()]);
    let status = world.hosting.status_of("new-sha").await.expect("status");
    assert_eq!(status.description.as_deref(), Some("Build waiting in queue..."));
    assert!(world.hosting.status_of("old-sha").await.is_none());
}

#[tokio::test]
async fn integration_failing_tests_carry_issue_digest_to_notifiers() {
    let world = World::new(ungated());
    world.hosting.open_pr(9, "broken", "bad1").await;
    world
        .ci
        .seed_bot(
            &name_for_pr_bot(9, REPO),
            vec![Integration {
                build_result_summary: Some(BuildResultSummary {
                    tests_count: 5,
                    test_failure_count: 2,
                    ..BuildResultSummary::default()
                }),
                ..integration(
                    "failed-1",
                    1,
                    IntegrationStep::Completed,
                    Some("bad1"),
                    Some(IntegrationResult::TestFailures),
                )
            }],
        )
        .await;
    world.ci.issues.lock().await.insert(
        "failed-1".to_string(),
        IntegrationIssues {
            test_failures: vec![IntegrationIssue {
                id: "issue-1".to_string(),
                issue_type: IntegrationIssueType::TestFailure,
                status: IntegrationIssueStatus::Fresh,
                message: Some("testCheckout() failed".to_string()),
                document_file_path: Some("CheckoutTests.swift".to_string()),
                line_number: Some(31),
            }],
            ..IntegrationIssues::default()
        },
    );

    world.cycle().await;

    let status = world.hosting.status_of("bad1").await.expect("status");
    assert_eq!(status.state, BuildState::Failure);
    assert_eq!(status.description.as_deref(), Some("Build failed tests!"));
    let comments = world.hosting.comment_writes().await;
    assert_eq!(comments.len(), 1);
    assert!(comments[0]
        .1
        .contains("*Result*: **Build failed 2 tests** out of 5"));
    let notifications = world.notifier.notifications.lock().await.clone();
    let digest = notifications[0].issues.clone().expect("digest");
    assert!(digest.contains("*Test failures*"));
    assert!(digest.contains("testCheckout() failed"));
    assert!(digest.contains("In CheckoutTests.swift:31"));
}

#[tokio::test]
async fn integration_matching_remote_status_performs_no_writes() {
    let world = World::new(ungated());
    world.hosting.open_pr(5, "done", "green1").await;
    world
        .ci
        .seed_bot(
            &name_for_pr_bot(5, REPO),
            vec![integration(
                "done-1",
                1,
                IntegrationStep::Completed,
                Some("green1"),
                Some(IntegrationResult::Succeeded),
            )],
        )
        .await;
    world.hosting.statuses.lock().await.insert(
        "green1".to_string(),
        world.hosting.create_status_from_state(
            BuildState::Success,
            Some("Build passed!"),
            Some("https://elsewhere.example.com"),
        ),
    );

    world.cycle().await;

    assert_eq!(world.hosting.status_write_count().await, 0);
    assert!(world.hosting.comment_writes().await.is_empty());
    assert!(world.notifier.notifications.lock().await.is_empty());
    assert_eq!(world.ci.started_count().await, 0);
}

#[tokio::test]
async fn integration_orphaned_bots_are_drained_then_deleted() {
    let world = World::new(ungated());
    let orphan = world
        .ci
        .seed_bot(
            &name_for_pr_bot(3, REPO),
            vec![integration("orphan-run", 1, IntegrationStep::Building, Some("x"), None)],
        )
        .await;
    let foreign = world
        .ci
        .seed_bot(&name_for_pr_bot(3, "someone/else"), Vec::new())
        .await;
    let manual = world.ci.seed_bot("Nightly archive", Vec::new()).await;

    world.cycle().await;

    assert_eq!(
        world.ci.canceled.lock().await.clone(),
        vec!["orphan-run".to_string()]
    );
    assert_eq!(world.ci.deleted.lock().await.clone(), vec![orphan.id]);
    let remaining = world
        .ci
        .bots
        .lock()
        .await
        .iter()
        .map(|bot| bot.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(remaining, vec![foreign.id, manual.id]);
}

#[tokio::test]
async fn integration_orphan_deletion_can_be_disabled() {
    let world = World::new(SyncerConfig {
        delete_orphaned_bots: false,
        ..ungated()
    });
    world
        .ci
        .seed_bot(
            &name_for_pr_bot(3, REPO),
            vec![integration("orphan-run", 1, IntegrationStep::Pending, Some("x"), None)],
        )
        .await;

    world.cycle().await;

    assert_eq!(world.ci.canceled.lock().await.len(), 1);
    assert!(world.ci.deleted.lock().await.is_empty());
    assert_eq!(world.ci.bots.lock().await.len(), 1);
}

#[tokio::test]
async fn integration_overlapping_trigger_is_dropped_while_cycle_runs() {
    let world = World::new(ungated());
    world.hosting.open_pr(1, "a", "sha-a").await;
    world.ci.get_bots_delay_ms.store(250, Ordering::SeqCst);
    let mut events = world.syncer.subscribe_events();

    let (first, second) = tokio::join!(world.syncer.sync_now(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        world.syncer.sync_now().await
    });

    assert_eq!(first, SyncTrigger::Started);
    assert_eq!(second, SyncTrigger::AlreadySyncing);
    assert_eq!(world.ci.created.lock().await.len(), 1);

    let mut started = 0;
    while let Ok(event) = events.try_recv() {
        if event == SyncerEvent::DidStartSyncing {
            started += 1;
        }
    }
    assert_eq!(started, 1);
}
