//! Error types for the Troupe domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Troupe operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Character loading/validation errors ---
    #[error("Character error: {0}")]
    Character(#[from] CharacterError),

    // --- Provider token resolution errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Platform client errors ---
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    // --- Direct client (local message API) errors ---
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    // --- Agent runtime errors ---
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum CharacterError {
    #[error("Character file not found: {path}")]
    NotFound { path: String },

    #[error("Failed to read character file {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Failed to parse character file {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid character '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("No token found for provider '{provider}' (tried: {tried})")]
    TokenNotFound { provider: String, tried: String },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open store: {0}")]
    OpenFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Client not configured: {0}")]
    NotConfigured(String),

    #[error("Client '{client}' failed to start: {reason}")]
    StartFailed { client: String, reason: String },

    #[error("Unknown client: {0}")]
    Unknown(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {reason}")]
    BindFailed { addr: String, reason: String },

    #[error("Agent not registered: {0}")]
    AgentNotFound(String),

    #[error("Server not running")]
    NotRunning,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Agent '{agent}' failed to initialize: {reason}")]
    InitFailed { agent: String, reason: String },

    #[error("Agent '{agent}' failed to reply: {reason}")]
    ReplyFailed { agent: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::TokenNotFound {
            provider: "anthropic".into(),
            tried: "secrets.ANTHROPIC_API_KEY, env.ANTHROPIC_API_KEY".into(),
        });
        assert!(err.to_string().contains("anthropic"));
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn character_error_names_the_file() {
        let err = Error::Character(CharacterError::ParseFailed {
            path: "characters/norinder.json".into(),
            reason: "expected value at line 3".into(),
        });
        assert!(err.to_string().contains("norinder.json"));
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn client_start_failure_is_distinct_from_unknown() {
        let start = ClientError::StartFailed {
            client: "social".into(),
            reason: "no credentials".into(),
        };
        let unknown = ClientError::Unknown("mastodon".into());
        assert!(start.to_string().contains("no credentials"));
        assert!(unknown.to_string().contains("mastodon"));
    }
}
