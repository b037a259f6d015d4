//! Pure diff of {pull requests, watched branches} against existing bots.

use std::collections::{BTreeMap, BTreeSet};

use buildsync_types::{Bot, Branch, PullRequest};

use crate::bot_naming::{is_bot_belonging_to_repo, name_for_branch_bot, name_for_pr_bot};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Branch watch policy as seen by one reconciliation round.
pub struct WatchList {
    pub branches: BTreeMap<String, bool>,
    pub auto_watch_new_branches: bool,
}

impl WatchList {
    /// Watching is active when any branch is explicitly watched or new
    /// branches are picked up automatically.
    pub fn is_active(&self) -> bool {
        self.auto_watch_new_branches || self.branches.values().any(|watched| *watched)
    }

    fn should_watch(&self, branch_name: &str) -> bool {
        match self.branches.get(branch_name) {
            Some(watched) => *watched,
            None => self.auto_watch_new_branches,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotActions {
    pub prs_to_sync: Vec<(PullRequest, Bot)>,
    pub pr_bots_to_create: Vec<PullRequest>,
    pub branches_to_sync: Vec<(Branch, Bot)>,
    pub branch_bots_to_create: Vec<Branch>,
    pub bots_to_delete: Vec<Bot>,
}

impl BotActions {
    pub fn created_count(&self) -> usize {
        self.pr_bots_to_create.len() + self.branch_bots_to_create.len()
    }

    pub fn synced_count(&self) -> usize {
        self.prs_to_sync.len() + self.branches_to_sync.len()
    }

    pub fn deleted_count(&self) -> usize {
        self.bots_to_delete.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub actions: BotActions,
    /// Refreshed watch map for persistence; `None` when watching is inactive.
    pub watched_branches: Option<BTreeMap<String, bool>>,
}

/// Maps the live hosting and CI state onto the five action buckets.
///
/// Bots not owned by `repo_name` are ignored. When two owned bots share a
/// name the first one wins and the duplicates are scheduled for deletion, so
/// at most one bot per PR or branch survives the round.
pub fn reconcile(
    repo_name: &str,
    prs: &[PullRequest],
    branches: &[Branch],
    bots: &[Bot],
    watch_list: &WatchList,
) -> Reconciliation {
    let mut actions = BotActions::default();
    let mut owned: BTreeMap<String, Bot> = BTreeMap::new();
    for bot in bots
        .iter()
        .filter(|bot| is_bot_belonging_to_repo(&bot.name, repo_name))
    {
        if owned.contains_key(&bot.name) {
            actions.bots_to_delete.push(bot.clone());
        } else {
            owned.insert(bot.name.clone(), bot.clone());
        }
    }

    for pr in prs {
        match owned.remove(&name_for_pr_bot(pr.number, repo_name)) {
            Some(bot) => actions.prs_to_sync.push((pr.clone(), bot)),
            None => actions.pr_bots_to_create.push(pr.clone()),
        }
    }

    let pr_heads: BTreeSet<&str> = prs.iter().map(|pr| pr.head_name.as_str()).collect();
    let mut seen = BTreeSet::new();
    let mut watched_names = BTreeSet::new();
    for branch in branches {
        if !seen.insert(branch.name.as_str()) {
            continue;
        }
        if !watch_list.should_watch(&branch.name) || pr_heads.contains(branch.name.as_str()) {
            continue;
        }
        watched_names.insert(branch.name.as_str());
        match owned.remove(&name_for_branch_bot(&branch.name, repo_name)) {
            Some(bot) => actions.branches_to_sync.push((branch.clone(), bot)),
            None => actions.branch_bots_to_create.push(branch.clone()),
        }
    }

    actions.bots_to_delete.extend(owned.into_values());

    let watched_branches = watch_list.is_active().then(|| {
        seen.iter()
            .map(|name| (name.to_string(), watched_names.contains(name)))
            .collect()
    });

    Reconciliation {
        actions,
        watched_branches,
    }
}
