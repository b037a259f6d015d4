use std::sync::Arc;

use buildsync_types::{CiServerClient, Notifier, SourceHostingClient, Trigger};

use crate::config::{BuildTemplate, ProjectConfig, SyncerConfig};

#[derive(Clone)]
/// Everything one syncer needs to run a cycle: already-authenticated
/// clients plus the policy and templates they are driven with.
pub struct SyncContext {
    pub hosting: Arc<dyn SourceHostingClient>,
    pub ci: Arc<dyn CiServerClient>,
    /// Secondary notifiers; their failures are logged and never fail a pair.
    pub notifiers: Vec<Arc<dyn Notifier>>,
    pub config: SyncerConfig,
    pub build_template: BuildTemplate,
    pub project: ProjectConfig,
    pub triggers: Vec<Trigger>,
}

impl SyncContext {
    pub fn repo_name(&self) -> &str {
        &self.project.repo
    }
}
