use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use buildsync_transport::TransportConfig;
use buildsync_types::{ClientError, SourceHostingClient};
use serde::{Deserialize, Serialize};

use crate::{BitBucketClient, GithubClient, BITBUCKET_DEFAULT_API_BASE, GITHUB_DEFAULT_API_BASE};

pub const DEFAULT_STATUS_CONTEXT: &str = "buildsync";
const HOSTING_USER_AGENT: &str = "buildsync-hosting";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Supported source hosting services.
pub enum GitService {
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "bitbucket")]
    BitBucket,
}

impl GitService {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::BitBucket => "bitbucket",
        }
    }

    pub fn default_api_base(self) -> &'static str {
        match self {
            Self::GitHub => GITHUB_DEFAULT_API_BASE,
            Self::BitBucket => BITBUCKET_DEFAULT_API_BASE,
        }
    }

    /// Builds the hosting client for this service. Downstream code only sees the trait.
    pub fn build_client(
        self,
        config: &HostingClientConfig,
    ) -> Result<Arc<dyn SourceHostingClient>, ClientError> {
        let api_base = config
            .api_base
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.default_api_base());
        let mut transport = TransportConfig::new(api_base, HOSTING_USER_AGENT);
        transport.request_timeout_ms = config.request_timeout_ms;
        transport.retry_max_attempts = config.retry_max_attempts;
        transport.retry_base_delay_ms = config.retry_base_delay_ms;

        let client: Arc<dyn SourceHostingClient> = match self {
            Self::GitHub => Arc::new(GithubClient::new(
                &transport,
                &config.token,
                &config.status_context,
            )?),
            Self::BitBucket => Arc::new(BitBucketClient::new(
                &transport,
                &config.token,
                &config.status_context,
            )?),
        };
        tracing::debug!(service = self.as_str(), api_base, "built hosting client");
        Ok(client)
    }
}

impl fmt::Display for GitService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GitService {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "bitbucket" => Ok(Self::BitBucket),
            other => Err(format!(
                "unsupported git service '{other}', expected github or bitbucket"
            )),
        }
    }
}

#[derive(Debug, Clone)]
/// Already-resolved connection settings for a hosting client.
pub struct HostingClientConfig {
    pub api_base: Option<String>,
    pub token: String,
    pub status_context: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl HostingClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_base: None,
            token: token.into(),
            status_context: DEFAULT_STATUS_CONTEXT.to_string(),
            request_timeout_ms: 30_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}
