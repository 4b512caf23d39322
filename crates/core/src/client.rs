//! PlatformClient trait — the abstraction over external network clients.
//!
//! A platform client posts and replies on an external network (social
//! feed, chat platform) on behalf of one agent. The supervisor only ever
//! asks for a client to be started; everything after that is the client's
//! own business.

use async_trait::async_trait;

use crate::error::ClientError;

/// The minimal view of an agent a platform client needs to start.
///
/// Clients never see the runtime itself; they get the identity and the
/// credentials the character declared for them.
#[derive(Debug, Clone)]
pub struct AgentRef {
    pub agent_id: String,
    pub name: String,
    pub username: String,
}

/// Opaque handle to a started client. Dropping or stopping it detaches
/// the client's background task.
#[derive(Debug)]
pub struct ClientHandle {
    name: String,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl ClientHandle {
    pub fn new(name: impl Into<String>, task: Option<tokio::task::JoinHandle<()>>) -> Self {
        Self {
            name: name.into(),
            task,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the client's background task, if it has one.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The core PlatformClient trait.
///
/// Implementations handle platform-specific connection logic and
/// credentials; a start failure is recoverable from the supervisor's
/// point of view (the agent runs degraded, console-only).
#[async_trait]
pub trait PlatformClient: Send + Sync + std::fmt::Debug {
    /// Client name as declared in character configs (e.g. "social").
    fn name(&self) -> &str;

    /// Start the client for one agent.
    async fn start(&self, agent: &AgentRef) -> Result<ClientHandle, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_stop_aborts_task() {
        let task = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        let mut handle = ClientHandle::new("social", Some(task));
        assert_eq!(handle.name(), "social");
        handle.stop();
        // Second stop is a no-op.
        handle.stop();
    }
}
