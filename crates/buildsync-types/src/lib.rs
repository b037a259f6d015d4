//! Shared data model and client contracts for buildsync.
//!
//! The reconciliation engine depends only on the traits exported here; each
//! hosting service, CI server, and chat notifier implements them in its own
//! crate.
mod ci;
mod error;
mod hosting;
mod notifier;

pub use ci::{
    Bot, BotConfiguration, BotSchedule, BuildResultSummary, CiServerClient, CleaningPolicy,
    DeviceFilterType, DeviceSpecification, Integration, IntegrationIssue, IntegrationIssueStatus,
    IntegrationIssueType, IntegrationIssues, IntegrationResult, IntegrationStep,
    IntegrationsQuery, PlatformType, SourceControlBlueprint, Trigger, TriggerConditions,
    TriggerKind, TriggerPhase,
};
pub use error::ClientError;
pub use hosting::{
    Branch, BuildState, CommitStatus, IssueComment, PullRequest, RateLimitInfo, Repo,
    RepoPermissions, SourceHostingClient,
};
pub use notifier::{Notifier, NotifierNotification, StatusAndComment};
