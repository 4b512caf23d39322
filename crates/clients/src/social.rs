//! Social-platform client adapter.
//!
//! Posts and replies on an external social network on the agent's behalf.
//! In production this would drive the platform's HTTP API; the connection
//! loop here is the long-polling skeleton, started per agent with the
//! credentials the character declared.

use async_trait::async_trait;
use tracing::info;

use troupe_core::client::{AgentRef, ClientHandle, PlatformClient};
use troupe_core::error::ClientError;

/// Secret key a character must declare to enable the social client.
pub const SOCIAL_TOKEN_KEY: &str = "SOCIAL_API_TOKEN";

/// Social client configuration.
#[derive(Clone)]
pub struct SocialConfig {
    /// Platform API token.
    pub api_token: String,
    /// Seconds between feed polls.
    pub poll_interval_secs: u64,
}

impl std::fmt::Debug for SocialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialConfig")
            .field("api_token", &"[REDACTED]")
            .field("poll_interval_secs", &self.poll_interval_secs)
            .finish()
    }
}

/// Social-platform client adapter.
#[derive(Debug)]
pub struct SocialClient {
    config: SocialConfig,
}

impl SocialClient {
    pub fn new(config: SocialConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PlatformClient for SocialClient {
    fn name(&self) -> &str {
        "social"
    }

    async fn start(&self, agent: &AgentRef) -> Result<ClientHandle, ClientError> {
        if self.config.api_token.is_empty() {
            return Err(ClientError::StartFailed {
                client: "social".into(),
                reason: format!("no {SOCIAL_TOKEN_KEY} configured"),
            });
        }

        info!(
            agent = %agent.name,
            username = %agent.username,
            "Social client starting"
        );

        let poll_interval = std::time::Duration::from_secs(self.config.poll_interval_secs);
        let agent_name = agent.name.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                ticker.tick().await;
                // In production: fetch mentions, hand them to the runtime,
                // post queued replies.
                tracing::trace!(agent = %agent_name, "Social feed poll");
            }
        });

        Ok(ClientHandle::new("social", Some(task)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> AgentRef {
        AgentRef {
            agent_id: "id".into(),
            name: "Norinder".into(),
            username: "norinder".into(),
        }
    }

    #[tokio::test]
    async fn start_without_token_fails() {
        let client = SocialClient::new(SocialConfig {
            api_token: String::new(),
            poll_interval_secs: 60,
        });
        let err = client.start(&agent()).await.unwrap_err();
        assert!(matches!(err, ClientError::StartFailed { .. }));
    }

    #[tokio::test]
    async fn start_with_token_returns_handle() {
        let client = SocialClient::new(SocialConfig {
            api_token: "tok".into(),
            poll_interval_secs: 60,
        });
        let mut handle = client.start(&agent()).await.unwrap();
        assert_eq!(handle.name(), "social");
        handle.stop();
    }

    #[test]
    fn debug_never_prints_token() {
        let config = SocialConfig {
            api_token: "super-secret".into(),
            poll_interval_secs: 60,
        };
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
