//! Decides cancel / status / start for one bot from its recent integrations.

use std::collections::BTreeMap;

use buildsync_types::{
    Bot, BuildState, Integration, IntegrationResult, IntegrationStep, SourceHostingClient,
    StatusAndComment,
};

use crate::summary_builder::{SummaryBuilder, HTTPS_LINK_KEY, XCODE_LINK_KEY};

pub const WAITING_IN_QUEUE_DESCRIPTION: &str = "Build waiting in queue...";

#[derive(Debug, Clone, PartialEq)]
pub struct StatusToSet {
    pub status: StatusAndComment,
    pub commit: String,
    pub branch: String,
    /// PR number for PR bots; branch bots have no issue to comment on.
    pub issue_number: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Declarative outcome of one resolution round for one entity.
pub struct Actions {
    pub integrations_to_cancel: Vec<Integration>,
    pub status_to_set: Option<StatusToSet>,
    pub start_new_integration_bot: Option<Bot>,
    /// Integration the status was derived from, used to fetch its issues.
    pub last_integration: Option<Integration>,
}

/// Entity a bot is building.
#[derive(Debug, Clone, Copy)]
pub struct ResolveTarget<'a> {
    pub commit: &'a str,
    pub branch: &'a str,
    pub issue_number: Option<u64>,
}

pub fn integration_links(
    hostname: &str,
    bot: &Bot,
    integration: &Integration,
) -> BTreeMap<String, String> {
    let bot_ref = bot.tiny_id.as_deref().unwrap_or(bot.id.as_str());
    BTreeMap::from([
        (
            XCODE_LINK_KEY.to_string(),
            format!(
                "xcbot://{hostname}/botID/{}/integrationID/{}",
                bot.id, integration.id
            ),
        ),
        (
            HTTPS_LINK_KEY.to_string(),
            format!(
                "https://{hostname}/xcode/bots/{bot_ref}/integrations/{}",
                integration.number
            ),
        ),
    ])
}

/// Checkout failures never record a revision; they are attributed to the
/// head commit so the failure is reported instead of rebuilt every cycle.
fn is_commitless_checkout_failure(integration: &Integration) -> bool {
    integration.commit_sha.is_none()
        && matches!(
            integration.result,
            Some(IntegrationResult::CheckoutError | IntegrationResult::InternalCheckoutError)
        )
}

fn latest<'a>(integrations: impl Iterator<Item = &'a Integration>) -> Option<&'a Integration> {
    integrations.max_by_key(|integration| integration.number)
}

pub fn resolve_actions(
    target: ResolveTarget<'_>,
    bot: &Bot,
    hostname: &str,
    status_creator: &dyn SourceHostingClient,
    integrations: &[Integration],
) -> Actions {
    let is_head = |integration: &&Integration| integration.commit_sha.as_deref() == Some(target.commit);
    let running = |integration: &&Integration| !integration.step.is_completed();

    let integrations_to_cancel = integrations
        .iter()
        .filter(running)
        .filter(|integration| {
            integration
                .commit_sha
                .as_deref()
                .is_some_and(|commit| commit != target.commit)
        })
        .cloned()
        .collect::<Vec<_>>();

    let status_to_set = |status: StatusAndComment| StatusToSet {
        status,
        commit: target.commit.to_string(),
        branch: target.branch.to_string(),
        issue_number: target.issue_number,
    };
    let pending = |description: &str| {
        StatusAndComment::status_only(status_creator.create_status_from_state(
            BuildState::Pending,
            Some(description),
            None,
        ))
    };

    let head_running = latest(integrations.iter().filter(running).filter(is_head));
    // Queued integrations have not checked out yet and carry no commit.
    let queued = integrations
        .iter()
        .filter(running)
        .any(|integration| integration.commit_sha.is_none());
    let head_completed = latest(
        integrations
            .iter()
            .filter(|integration| integration.step.is_completed())
            .filter(|integration| {
                is_head(integration) || is_commitless_checkout_failure(integration)
            }),
    );

    if let Some(integration) = head_running {
        let status = if integration.step == IntegrationStep::Pending {
            pending(WAITING_IN_QUEUE_DESCRIPTION)
        } else {
            pending(&format!("Integration step: {}...", integration.step.as_str()))
        };
        return Actions {
            integrations_to_cancel,
            status_to_set: Some(status_to_set(status)),
            start_new_integration_bot: None,
            last_integration: None,
        };
    }

    if queued {
        return Actions {
            integrations_to_cancel,
            status_to_set: Some(status_to_set(pending(WAITING_IN_QUEUE_DESCRIPTION))),
            start_new_integration_bot: None,
            last_integration: None,
        };
    }

    if let Some(integration) = head_completed {
        let links = integration_links(hostname, bot, integration);
        let summary = SummaryBuilder::new(status_creator, links).summarize(integration);
        return Actions {
            integrations_to_cancel,
            status_to_set: Some(status_to_set(summary)),
            start_new_integration_bot: None,
            last_integration: Some(integration.clone()),
        };
    }

    Actions {
        integrations_to_cancel,
        status_to_set: Some(status_to_set(pending(WAITING_IN_QUEUE_DESCRIPTION))),
        start_new_integration_bot: Some(bot.clone()),
        last_integration: None,
    }
}
