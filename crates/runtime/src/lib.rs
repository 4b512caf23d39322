//! The agent runtime — the external collaborator the supervisor
//! constructs and initializes, one per character.
//!
//! The runtime owns conversational behavior for exactly one character:
//! it journals every exchange through the shared store and produces the
//! ordered reply sequence the Direct Client returns to callers. Model
//! invocation sits behind the resolved provider token and is out of the
//! supervisor's sight entirely.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use troupe_core::character::Character;
use troupe_core::client::AgentRef;
use troupe_core::error::RuntimeError;
use troupe_core::message::ReplyMessage;
use troupe_providers::ResolvedToken;
use troupe_storage::{ArtifactCache, SqliteStore};

/// One character's running agent.
///
/// Constructed with every handle it will ever hold; after registration
/// with the Direct Client the supervisor keeps no reference to it.
pub struct AgentRuntime {
    character: Character,
    token: ResolvedToken,
    store: Arc<SqliteStore>,
    cache: Arc<ArtifactCache>,
    initialized: AtomicBool,
}

impl AgentRuntime {
    pub fn new(
        character: Character,
        token: ResolvedToken,
        store: Arc<SqliteStore>,
        cache: Arc<ArtifactCache>,
    ) -> Self {
        Self {
            character,
            token,
            store,
            cache,
            initialized: AtomicBool::new(false),
        }
    }

    /// The character's stable id.
    pub fn agent_id(&self) -> &str {
        self.character.id()
    }

    /// The character's display name.
    pub fn name(&self) -> &str {
        &self.character.name
    }

    /// The defaults-filled character this runtime was built from.
    pub fn character(&self) -> &Character {
        &self.character
    }

    /// The minimal identity view platform clients receive.
    pub fn agent_ref(&self) -> AgentRef {
        AgentRef {
            agent_id: self.character.id().to_string(),
            name: self.character.name.clone(),
            username: self
                .character
                .username
                .clone()
                .unwrap_or_else(|| self.character.name.clone()),
        }
    }

    /// Bring the runtime to a usable state. Must complete before the
    /// agent is registered anywhere.
    pub async fn initialize(&self) -> Result<(), RuntimeError> {
        self.store.init().await.map_err(|e| RuntimeError::InitFailed {
            agent: self.character.name.clone(),
            reason: e.to_string(),
        })?;

        // Prime the cache slot this agent reads its persona artifacts from.
        let cache_key = format!("persona:{}", self.character.id());
        if self.cache.get(&cache_key).await.is_none() {
            self.cache
                .put(
                    cache_key,
                    serde_json::json!({
                        "name": self.character.name,
                        "provider": self.token.provider,
                    }),
                )
                .await;
        }

        self.initialized.store(true, Ordering::SeqCst);
        info!(
            agent = %self.character.name,
            provider = %self.token.provider,
            "Agent runtime initialized"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Process one inbound message and return the ordered replies.
    ///
    /// Journals both sides of the exchange before returning.
    pub async fn reply(
        &self,
        text: &str,
        user_id: &str,
        user_name: &str,
    ) -> Result<Vec<ReplyMessage>, RuntimeError> {
        if !self.is_initialized() {
            return Err(RuntimeError::ReplyFailed {
                agent: self.character.name.clone(),
                reason: "runtime not initialized".into(),
            });
        }

        self.store
            .append_message(self.character.id(), user_id, text)
            .await
            .map_err(|e| RuntimeError::ReplyFailed {
                agent: self.character.name.clone(),
                reason: e.to_string(),
            })?;

        debug!(agent = %self.character.name, user = user_id, "Composing reply");
        let replies = self.compose(text, user_name);

        for reply in &replies {
            self.store
                .append_message(self.character.id(), self.character.id(), &reply.text)
                .await
                .map_err(|e| RuntimeError::ReplyFailed {
                    agent: self.character.name.clone(),
                    reason: e.to_string(),
                })?;
        }

        Ok(replies)
    }

    /// Deterministic reply composition. A character may pin a fixed
    /// greeting via the `greeting` setting; otherwise the agent
    /// acknowledges in its own voice.
    fn compose(&self, text: &str, user_name: &str) -> Vec<ReplyMessage> {
        if let Some(serde_json::Value::String(greeting)) =
            self.character.settings.extra.get("greeting")
        {
            return vec![ReplyMessage::text(greeting.clone())];
        }
        vec![ReplyMessage::text(format!(
            "{user_name}, {} heard you: {text}",
            self.character.name
        ))]
    }
}
