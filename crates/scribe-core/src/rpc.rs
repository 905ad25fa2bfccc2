use anyhow::Result;
use async_trait::async_trait;

/// The two auxiliary calls the pipeline issues against the messaging
/// platform. The transport crate implements this over the Slack Web API;
/// tests substitute recording fakes.
#[async_trait]
pub trait SlackRpc: Send + Sync {
    /// Resolves a user's display name by id.
    async fn user_display_name(&self, user_id: &str) -> Result<String>;

    /// Adds an emoji reaction to the message identified by channel and
    /// timestamp.
    async fn add_reaction(&self, name: &str, channel: &str, timestamp: &str) -> Result<()>;
}
