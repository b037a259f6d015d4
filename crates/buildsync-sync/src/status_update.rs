use anyhow::{Context, Result};
use buildsync_types::{NotifierNotification, StatusAndComment};
use futures_util::future::join_all;

use crate::context::SyncContext;

/// Posts `status` on `commit` unless the hosting service already shows an
/// equivalent one. When a status is posted and carries a comment, the
/// comment goes to the PR (if enabled) and to every secondary notifier.
pub async fn update_commit_status_if_necessary(
    context: &SyncContext,
    status: &StatusAndComment,
    commit: &str,
    branch: &str,
    issue_number: Option<u64>,
    issues: Option<String>,
) -> Result<()> {
    let repo = context.repo_name();
    let current = context
        .hosting
        .get_status_of_commit(commit, repo)
        .await
        .with_context(|| format!("commit {commit} failed to return status"))?;
    if current
        .as_ref()
        .is_some_and(|current| current.is_equivalent(&status.status))
    {
        tracing::debug!(commit, state = status.status.state.as_str(), "commit status unchanged");
        return Ok(());
    }

    context
        .hosting
        .post_status_of_commit(commit, &status.status, repo)
        .await
        .with_context(|| format!("failed to post a status on commit {commit} of repo {repo}"))?;
    tracing::info!(
        commit,
        branch,
        state = status.status.state.as_str(),
        "posted commit status"
    );

    let Some(comment) = status.comment.as_deref() else {
        return Ok(());
    };
    let notification = NotifierNotification {
        comment: comment.to_string(),
        issue_number,
        repo: repo.to_string(),
        branch: branch.to_string(),
        status: status.status.clone(),
        integration_result: status
            .integration
            .as_ref()
            .and_then(|integration| integration.result)
            .map(|result| result.as_str().to_string()),
        links: status.links.clone(),
        issues,
    };

    let hosting_comment = async {
        match issue_number {
            Some(number) if context.config.post_status_comments => context
                .hosting
                .post_comment_on_issue(comment, number, repo)
                .await
                .map(|_| ())
                .with_context(|| {
                    format!("failed to post a comment on issue {number} of repo {repo}")
                }),
            _ => Ok(()),
        }
    };
    let secondary = join_all(context.notifiers.iter().map(|notifier| {
        let notification = &notification;
        async move {
            if let Err(error) = notifier.post_comment_on_issue(notification).await {
                tracing::warn!(
                    notifier = notifier.name(),
                    repo = %notification.repo,
                    branch = %notification.branch,
                    error = %error,
                    "secondary notifier failed"
                );
            }
        }
    }));
    let (hosting_result, _) = tokio::join!(hosting_comment, secondary);
    hosting_result
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use buildsync_types::{BuildState, CommitStatus, Notifier, StatusAndComment};

    use super::update_commit_status_if_necessary;
    use crate::config::{BuildTemplate, ProjectConfig, SyncerConfig};
    use crate::context::SyncContext;
    use crate::test_support::{FakeCi, FakeHosting, FakeNotifier};

    fn context(
        hosting: Arc<FakeHosting>,
        notifier: Arc<FakeNotifier>,
        post_status_comments: bool,
    ) -> SyncContext {
        SyncContext {
            hosting,
            ci: Arc::new(FakeCi::default()),
            notifiers: vec![notifier as Arc<dyn Notifier>],
            config: SyncerConfig {
                post_status_comments,
                ..SyncerConfig::default()
            },
            build_template: BuildTemplate::new("App"),
            project: ProjectConfig {
                repo: "octo/widgets".to_string(),
                ssh_url: "git@example.com:octo/widgets.git".to_string(),
                project_path: "App.xcodeproj".to_string(),
            },
            triggers: Vec::new(),
        }
    }

    fn passed(comment: Option<&str>) -> StatusAndComment {
        StatusAndComment {
            status: CommitStatus {
                state: BuildState::Success,
                description: Some("Build passed!".to_string()),
                target_url: Some("https://ci.local/x".to_string()),
                context: "buildsync".to_string(),
            },
            comment: comment.map(ToOwned::to_owned),
            integration: None,
            links: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn functional_unchanged_status_is_posted_once() {
        let hosting = Arc::new(FakeHosting::default());
        let notifier = Arc::new(FakeNotifier::default());
        let context = context(hosting.clone(), notifier.clone(), true);
        let status = passed(Some("*Result*: ok"));
        for _ in 0..2 {
            update_commit_status_if_necessary(&context, &status, "abc", "feature", Some(1), None)
                .await
                .expect("update");
        }
        assert_eq!(hosting.posted_status_count(), 1);
        assert_eq!(hosting.posted_comments.lock().expect("lock").len(), 1);
        assert_eq!(notifier.notifications.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn functional_existing_equivalent_status_performs_zero_writes() {
        let hosting = Arc::new(FakeHosting::default());
        hosting
            .statuses
            .lock()
            .expect("lock")
            .insert("abc".to_string(), passed(None).status);
        let notifier = Arc::new(FakeNotifier::default());
        let context = context(hosting.clone(), notifier.clone(), true);
        update_commit_status_if_necessary(&context, &passed(Some("c")), "abc", "b", Some(1), None)
            .await
            .expect("update");
        assert_eq!(hosting.posted_status_count(), 0);
        assert!(hosting.posted_comments.lock().expect("lock").is_empty());
        assert!(notifier.notifications.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn functional_comment_toggle_and_branch_targets_skip_pr_comment() {
        let hosting = Arc::new(FakeHosting::default());
        let notifier = Arc::new(FakeNotifier::default());
        let context = context(hosting.clone(), notifier.clone(), false);
        update_commit_status_if_necessary(&context, &passed(Some("c")), "one", "b", Some(1), None)
            .await
            .expect("update");
        let context = self::context(hosting.clone(), notifier.clone(), true);
        update_commit_status_if_necessary(
            &context,
            &passed(Some("c")),
            "two",
            "release",
            None,
            Some("*Errors*\n".to_string()),
        )
        .await
        .expect("update");
        assert!(hosting.posted_comments.lock().expect("lock").is_empty());
        let notifications = notifier.notifications.lock().expect("lock");
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[1].issue_number, None);
        assert_eq!(notifications[1].issues.as_deref(), Some("*Errors*\n"));
    }

    #[tokio::test]
    async fn regression_secondary_notifier_failure_does_not_fail_update() {
        let hosting = Arc::new(FakeHosting::default());
        let notifier = Arc::new(FakeNotifier::default());
        notifier.fail.store(true, Ordering::SeqCst);
        let context = context(hosting.clone(), notifier, true);
        update_commit_status_if_necessary(&context, &passed(Some("c")), "abc", "b", Some(3), None)
            .await
            .expect("notifier errors are logged only");
        assert_eq!(hosting.posted_status_count(), 1);
    }

    #[tokio::test]
    async fn regression_status_post_failure_surfaces_error() {
        let hosting = Arc::new(FakeHosting::default());
        hosting.fail_post_status.store(true, Ordering::SeqCst);
        let notifier = Arc::new(FakeNotifier::default());
        let context = context(hosting, notifier.clone(), true);
        let error = update_commit_status_if_necessary(&context, &passed(Some("c")), "abc", "b", None, None)
            .await
            .expect_err("must fail");
        assert!(format!("{error:#}").contains("failed to post a status on commit abc"));
        assert!(notifier.notifications.lock().expect("lock").is_empty());
    }
}
