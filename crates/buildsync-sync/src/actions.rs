use anyhow::{anyhow, Context, Result};
use buildsync_types::Integration;
use futures_util::future::{join_all, BoxFuture};
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};

use crate::context::SyncContext;
use crate::issues_digest::build_issues_digest;
use crate::resolver::{Actions, StatusToSet};
use crate::status_update::update_commit_status_if_necessary;

/// Cancels every integration concurrently; the last failure is returned.
pub async fn cancel_integrations(context: &SyncContext, integrations: &[Integration]) -> Result<()> {
    let results = join_all(integrations.iter().map(|integration| async move {
        context
            .ci
            .cancel_integration(&integration.id)
            .await
            .with_context(|| format!("failed to cancel integration {}", integration.number))
    }))
    .await;
    let mut last_error = None;
    for result in results {
        if let Err(error) = result {
            tracing::warn!(error = %format!("{error:#}"), "integration cancel failed");
            last_error = Some(error);
        }
    }
    last_error.map_or(Ok(()), Err)
}

async fn apply_status(
    context: &SyncContext,
    status: &StatusToSet,
    last_integration: Option<&Integration>,
) -> Result<()> {
    let mut issues_error = None;
    let mut issues = None;
    if status.status.status.state.is_failing() {
        if let Some(integration) = last_integration {
            match context.ci.get_integration_issues(&integration.id).await {
                Ok(found) => issues = Some(build_issues_digest(&found)),
                Err(error) => {
                    tracing::warn!(
                        integration = integration.number,
                        error = %error,
                        "failed to fetch integration issues"
                    );
                    issues_error = Some(anyhow!(
                        "integration {} failed to return integration issues: {error}",
                        integration.id
                    ));
                }
            }
        }
    }
    update_commit_status_if_necessary(
        context,
        &status.status,
        &status.commit,
        &status.branch,
        status.issue_number,
        issues,
    )
    .await?;
    issues_error.map_or(Ok(()), Err)
}

/// Runs the cancel, status and start sub-operations concurrently. Every
/// sub-operation runs to completion; the error of the one that finished last
/// is reported and earlier ones are only logged.
pub async fn apply_actions(context: &SyncContext, actions: &Actions) -> Result<()> {
    let mut pending: FuturesUnordered<BoxFuture<'_, Result<()>>> = FuturesUnordered::new();

    if !actions.integrations_to_cancel.is_empty() {
        pending.push(cancel_integrations(context, &actions.integrations_to_cancel).boxed());
    }
    if let Some(status) = actions.status_to_set.as_ref() {
        pending.push(apply_status(context, status, actions.last_integration.as_ref()).boxed());
    }
    if let Some(bot) = actions.start_new_integration_bot.as_ref() {
        pending.push(
            async move {
                let integration = context
                    .ci
                    .post_integration(&bot.id)
                    .await
                    .with_context(|| format!("bot {} failed to enqueue an integration", bot.name))?;
                tracing::info!(
                    bot = %bot.name,
                    integration = integration.number,
                    "enqueued integration"
                );
                Ok(())
            }
            .boxed(),
        );
    }

    let mut last_error = None;
    while let Some(result) = pending.next().await {
        if let Err(error) = result {
            tracing::warn!(error = %format!("{error:#}"), "sync action failed");
            last_error = Some(error);
        }
    }
    last_error.map_or(Ok(()), Err)
}
