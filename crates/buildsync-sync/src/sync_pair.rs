//! One reconciliation unit per PR, branch or orphaned bot.

use anyhow::{Context, Result};
use buildsync_types::{
    Bot, BotSchedule, Branch, BuildState, Integration, IntegrationsQuery, PullRequest,
    StatusAndComment,
};

use crate::actions::{apply_actions, cancel_integrations};
use crate::bot_naming::{name_for_branch_bot, name_for_pr_bot};
use crate::config::bot_configuration_for;
use crate::context::SyncContext;
use crate::reconciler::BotActions;
use crate::resolver::{resolve_actions, ResolveTarget};
use crate::status_update::update_commit_status_if_necessary;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncPair {
    PrBot { pr: PullRequest, bot: Bot },
    BranchBot { branch: Branch, bot: Bot },
    PrNoBot { pr: PullRequest },
    BranchNoBot { branch: Branch },
    DeletableBot { bot: Bot },
}

/// Expands reconciler buckets into pairs: creations, then syncs, then
/// deletions.
pub fn sync_pairs_from(actions: BotActions) -> Vec<SyncPair> {
    let mut pairs = Vec::new();
    pairs.extend(
        actions
            .pr_bots_to_create
            .into_iter()
            .map(|pr| SyncPair::PrNoBot { pr }),
    );
    pairs.extend(
        actions
            .branch_bots_to_create
            .into_iter()
            .map(|branch| SyncPair::BranchNoBot { branch }),
    );
    pairs.extend(
        actions
            .prs_to_sync
            .into_iter()
            .map(|(pr, bot)| SyncPair::PrBot { pr, bot }),
    );
    pairs.extend(
        actions
            .branches_to_sync
            .into_iter()
            .map(|(branch, bot)| SyncPair::BranchBot { branch, bot }),
    );
    pairs.extend(
        actions
            .bots_to_delete
            .into_iter()
            .map(|bot| SyncPair::DeletableBot { bot }),
    );
    pairs
}

impl SyncPair {
    pub fn name(&self) -> String {
        match self {
            Self::PrBot { pr, bot } => {
                format!("PR ({}:{}) + Bot ({})", pr.number, pr.head_name, bot.name)
            }
            Self::BranchBot { branch, bot } => {
                format!("Branch ({}) + Bot ({})", branch.name, bot.name)
            }
            Self::PrNoBot { pr } => format!("PR ({}:{}) + No Bot", pr.number, pr.head_name),
            Self::BranchNoBot { branch } => format!("Branch ({}) + No Bot", branch.name),
            Self::DeletableBot { bot } => format!("Deletable Bot ({})", bot.name),
        }
    }

    pub async fn sync(&self, context: &SyncContext) -> Result<()> {
        match self {
            Self::PrBot { pr, bot } => sync_pr_with_bot(context, pr, bot).await,
            Self::BranchBot { branch, bot } => sync_branch_with_bot(context, branch, bot).await,
            Self::PrNoBot { pr } => {
                let name = name_for_pr_bot(pr.number, context.repo_name());
                create_bot(context, &name, &pr.head_name, Some(BotSchedule::Manual)).await
            }
            Self::BranchNoBot { branch } => {
                let name = name_for_branch_bot(&branch.name, context.repo_name());
                create_bot(context, &name, &branch.name, None).await
            }
            Self::DeletableBot { bot } => delete_bot(context, bot).await,
        }
    }
}

async fn fetch_integrations(context: &SyncContext, bot: &Bot) -> Result<Vec<Integration>> {
    let query = IntegrationsQuery {
        last: context.config.history_window(),
    };
    context
        .ci
        .get_bot_integrations(&bot.id, query)
        .await
        .with_context(|| format!("bot {} failed to return integrations", bot.name))
}

async fn is_pr_bot_enabled(
    context: &SyncContext,
    pr: &PullRequest,
    integrations: &[Integration],
) -> Result<bool> {
    if !integrations.is_empty() || !context.config.wait_for_keyword {
        return Ok(true);
    }
    let found = context
        .hosting
        .find_matching_comment_in_issue(
            &context.config.trigger_keywords,
            pr.number,
            context.repo_name(),
        )
        .await
        .context("fetching comments")?;
    Ok(!found.is_empty())
}

async fn sync_pr_with_bot(context: &SyncContext, pr: &PullRequest, bot: &Bot) -> Result<()> {
    let integrations = fetch_integrations(context, bot).await?;
    if !is_pr_bot_enabled(context, pr, &integrations).await? {
        tracing::debug!(bot = %bot.name, "bot is not yet enabled, waiting for keyword");
        let description = format!(
            "Waiting for \"{}\" to start testing",
            context.config.primary_keyword()
        );
        let status = context.hosting.create_status_from_state(
            BuildState::Pending,
            Some(&description),
            None,
        );
        return update_commit_status_if_necessary(
            context,
            &StatusAndComment::status_only(status),
            &pr.head_commit_sha,
            &pr.head_name,
            Some(pr.number),
            None,
        )
        .await;
    }

    let actions = resolve_actions(
        ResolveTarget {
            commit: &pr.head_commit_sha,
            branch: &pr.head_name,
            issue_number: Some(pr.number),
        },
        bot,
        context.ci.hostname(),
        context.hosting.as_ref(),
        &integrations,
    );
    apply_actions(context, &actions).await
}

async fn sync_branch_with_bot(context: &SyncContext, branch: &Branch, bot: &Bot) -> Result<()> {
    let integrations = fetch_integrations(context, bot).await?;
    let actions = resolve_actions(
        ResolveTarget {
            commit: &branch.commit_sha,
            branch: &branch.name,
            issue_number: None,
        },
        bot,
        context.ci.hostname(),
        context.hosting.as_ref(),
        &integrations,
    );
    apply_actions(context, &actions).await
}

async fn create_bot(
    context: &SyncContext,
    name: &str,
    branch: &str,
    schedule_override: Option<BotSchedule>,
) -> Result<()> {
    let configuration = bot_configuration_for(
        &context.build_template,
        &context.project,
        branch,
        schedule_override,
        &context.triggers,
    );
    match context.ci.create_bot(name, &configuration).await {
        Ok(bot) => {
            tracing::info!(bot = %bot.name, id = %bot.id, "created bot");
            Ok(())
        }
        Err(error) => {
            tracing::error!(
                bot = name,
                configuration = %serde_json::to_string(&configuration).unwrap_or_default(),
                error = %error,
                "failed to create bot"
            );
            Err(error).with_context(|| format!("failed to create bot {name}"))
        }
    }
}

async fn delete_bot(context: &SyncContext, bot: &Bot) -> Result<()> {
    let integrations = fetch_integrations(context, bot).await?;
    let running = integrations
        .into_iter()
        .filter(|integration| !integration.step.is_completed())
        .collect::<Vec<_>>();
    cancel_integrations(context, &running).await?;
    if !context.config.delete_orphaned_bots {
        tracing::info!(bot = %bot.name, "orphaned bot drained, deletion disabled");
        return Ok(());
    }
    context
        .ci
        .delete_bot(bot)
        .await
        .with_context(|| format!("failed to delete bot {}", bot.name))?;
    tracing::info!(bot = %bot.name, "deleted orphaned bot");
    Ok(())
}
