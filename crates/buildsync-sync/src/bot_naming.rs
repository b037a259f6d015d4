//! Canonical bot names for pull requests and watched branches.
//!
//! Names look like `BuildSync [org/repo] PR #42` and
//! `BuildSync [org/repo] |-> release`. Repository names never contain square
//! brackets and branch names never contain spaces, so the bracketed repo and
//! the `PR #` / `|-> ` markers keep PR, branch and foreign bots disjoint.

const BOT_NAME_PREFIX: &str = "BuildSync";
const PR_MARKER: &str = "PR #";
const BRANCH_MARKER: &str = "|-> ";

#[derive(Debug, Clone, PartialEq, Eq)]
/// What a buildsync-owned bot is tracking.
pub enum BotTarget {
    PullRequest(u64),
    Branch(String),
}

fn repo_prefix(repo_name: &str) -> String {
    format!("{BOT_NAME_PREFIX} [{repo_name}] ")
}

pub fn name_for_pr_bot(pr_number: u64, repo_name: &str) -> String {
    format!("{}{PR_MARKER}{pr_number}", repo_prefix(repo_name))
}

pub fn name_for_branch_bot(branch_name: &str, repo_name: &str) -> String {
    format!("{}{BRANCH_MARKER}{branch_name}", repo_prefix(repo_name))
}

/// Recovers the tracked entity from a bot name owned by `repo_name`.
pub fn parse_bot_name(bot_name: &str, repo_name: &str) -> Option<BotTarget> {
    let rest = bot_name.strip_prefix(repo_prefix(repo_name).as_str())?;
    if let Some(number) = rest.strip_prefix(PR_MARKER) {
        return number.parse::<u64>().ok().map(BotTarget::PullRequest);
    }
    let branch = rest.strip_prefix(BRANCH_MARKER)?;
    if branch.is_empty() {
        return None;
    }
    Some(BotTarget::Branch(branch.to_string()))
}

/// True only for bots this system created for `repo_name`; everything else is
/// left alone.
pub fn is_bot_belonging_to_repo(bot_name: &str, repo_name: &str) -> bool {
    parse_bot_name(bot_name, repo_name).is_some()
}
