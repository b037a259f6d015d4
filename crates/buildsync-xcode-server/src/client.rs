use async_trait::async_trait;
use base64::Engine;
use buildsync_transport::{HttpTransport, TransportConfig};
use buildsync_types::{
    Bot, BotConfiguration, CiServerClient, ClientError, Integration, IntegrationIssues,
    IntegrationsQuery,
};

use crate::blueprint::bot_creation_payload;
use crate::wire::{XcsBot, XcsIntegration, XcsIntegrationIssues, XcsList};

pub const XCODE_SERVER_DEFAULT_PORT: u16 = 20343;
const XCS_CLIENT_VERSION: &str = "7";

#[derive(Debug, Clone)]
/// Connection settings for one Xcode Server instance.
pub struct XcodeServerConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
    /// Scheme used to reach the API; tests point this at plain http.
    pub scheme: String,
}

impl XcodeServerConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: XCODE_SERVER_DEFAULT_PORT,
            user: None,
            password: None,
            request_timeout_ms: 30_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
            scheme: "https".to_string(),
        }
    }

    fn api_base(&self) -> String {
        format!("{}://{}:{}/api", self.scheme, self.host, self.port)
    }
}

#[derive(Clone)]
/// Xcode Server REST implementation of `CiServerClient`.
pub struct XcodeServerClient {
    transport: HttpTransport,
    hostname: String,
}

impl XcodeServerClient {
    pub fn new(config: &XcodeServerConfig) -> Result<Self, ClientError> {
        let host = config.host.trim();
        if host.is_empty() {
            return Err(ClientError::InvalidRequest(
                "xcode server host cannot be empty".to_string(),
            ));
        }
        let mut transport_config = TransportConfig::new(config.api_base(), "buildsync");
        transport_config.request_timeout_ms = config.request_timeout_ms;
        transport_config.retry_max_attempts = config.retry_max_attempts;
        transport_config.retry_base_delay_ms = config.retry_base_delay_ms;
        transport_config.accept_invalid_certs = true;

        let mut headers = vec![("x-xcsclientversion", XCS_CLIENT_VERSION.to_string())];
        if let Some(user) = config.user.as_deref().filter(|user| !user.is_empty()) {
            let password = config.password.as_deref().unwrap_or_default();
            let credentials = base64::engine::general_purpose::STANDARD
                .encode(format!("{user}:{password}"));
            headers.push(("authorization", format!("Basic {credentials}")));
        }

        Ok(Self {
            transport: HttpTransport::new(&transport_config, &headers)?,
            hostname: host.to_string(),
        })
    }
}

#[async_trait]
impl CiServerClient for XcodeServerClient {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    async fn get_bots(&self) -> Result<Vec<Bot>, ClientError> {
        let list: XcsList<XcsBot> = self
            .transport
            .request_json("list bots", || {
                self.transport.http().get(self.transport.url("bots"))
            })
            .await?;
        Ok(list.results.into_iter().map(Bot::from).collect())
    }

    async fn get_bot_integrations(
        &self,
        bot_id: &str,
        query: IntegrationsQuery,
    ) -> Result<Vec<Integration>, ClientError> {
        let path = format!("bots/{bot_id}/integrations");
        let last = query.last.max(1).to_string();
        let list: XcsList<XcsIntegration> = self
            .transport
            .request_json("list bot integrations", || {
                self.transport
                    .http()
                    .get(self.transport.url(&path))
                    .query(&[("last", last.as_str())])
            })
            .await?;
        Ok(list.results.into_iter().map(Integration::from).collect())
    }

    async fn post_integration(&self, bot_id: &str) -> Result<Integration, ClientError> {
        let path = format!("bots/{bot_id}/integrations");
        let created: XcsIntegration = self
            .transport
            .request_json_non_idempotent("start integration", || {
                self.transport.http().post(self.transport.url(&path))
            })
            .await?;
        tracing::debug!(bot_id, "started integration");
        Ok(created.into())
    }

    async fn cancel_integration(&self, integration_id: &str) -> Result<(), ClientError> {
        let path = format!("integrations/{integration_id}/cancel");
        self.transport
            .request_empty("cancel integration", || {
                self.transport.http().post(self.transport.url(&path))
            })
            .await
    }

    async fn get_integration_issues(
        &self,
        integration_id: &str,
    ) -> Result<IntegrationIssues, ClientError> {
        let path = format!("integrations/{integration_id}/issues");
        let issues: XcsIntegrationIssues = self
            .transport
            .request_json("get integration issues", || {
                self.transport.http().get(self.transport.url(&path))
            })
            .await?;
        Ok(issues.into())
    }

    async fn create_bot(
        &self,
        name: &str,
        configuration: &BotConfiguration,
    ) -> Result<Bot, ClientError> {
        let payload = bot_creation_payload(name, configuration);
        let created: XcsBot = self
            .transport
            .request_json_non_idempotent("create bot", || {
                self.transport
                    .http()
                    .post(self.transport.url("bots"))
                    .json(&payload)
            })
            .await?;
        let mut bot = Bot::from(created);
        bot.configuration = Some(configuration.clone());
        Ok(bot)
    }

    async fn delete_bot(&self, bot: &Bot) -> Result<(), ClientError> {
        let revision = bot.revision.as_deref().ok_or_else(|| {
            ClientError::InvalidRequest(format!("bot {} has no revision to delete", bot.id))
        })?;
        let path = format!("bots/{}/{revision}", bot.id);
        self.transport
            .request_empty("delete bot", || {
                self.transport.http().delete(self.transport.url(&path))
            })
            .await
    }
}
