//! Provider token resolution for Troupe.
//!
//! Each model provider declares an ordered fallback chain of
//! `(source, key)` pairs. Resolution walks the chain top to bottom and
//! the first match wins: a character's own secrets always shadow the
//! process-wide settings, and within one source the documented key order
//! applies (e.g. `ANTHROPIC_API_KEY` before the legacy `CLAUDE_API_KEY`).
//!
//! The chains are data, not code, so the policy is testable in isolation
//! from the bring-up sequencer.

use troupe_core::character::Character;
use troupe_core::error::ProviderError;

/// Where a token candidate is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// The character's own `settings.secrets` map.
    CharacterSecrets,
    /// Process-wide settings (config file, then environment).
    ProcessSettings,
}

impl std::fmt::Display for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::CharacterSecrets => write!(f, "secrets"),
            TokenSource::ProcessSettings => write!(f, "settings"),
        }
    }
}

/// Process-wide settings lookup, implemented by the config layer.
pub trait SettingsSource {
    fn get(&self, key: &str) -> Option<String>;
}

impl SettingsSource for std::collections::HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        std::collections::HashMap::get(self, key).cloned()
    }
}

/// The acceptable key names for one provider, in documented priority order.
///
/// An empty list means the provider needs no token (local inference).
fn key_chain(provider: &str) -> Result<&'static [&'static str], ProviderError> {
    match provider {
        "anthropic" => Ok(&["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"]),
        "openai" => Ok(&["OPENAI_API_KEY"]),
        "openrouter" => Ok(&["OPENROUTER_API_KEY"]),
        "groq" => Ok(&["GROQ_API_KEY"]),
        "ollama" | "llama_local" => Ok(&[]),
        other => Err(ProviderError::UnknownProvider(other.into())),
    }
}

/// The full fallback chain for a provider: every `(source, key)` pair that
/// will be consulted, in order.
pub fn fallback_chain(
    provider: &str,
) -> Result<Vec<(TokenSource, &'static str)>, ProviderError> {
    let keys = key_chain(provider)?;
    let mut pairs = Vec::with_capacity(keys.len() * 2);
    for key in keys {
        pairs.push((TokenSource::CharacterSecrets, *key));
    }
    for key in keys {
        pairs.push((TokenSource::ProcessSettings, *key));
    }
    Ok(pairs)
}

/// A resolved provider credential, ready to hand to the agent runtime.
#[derive(Clone)]
pub struct ResolvedToken {
    pub provider: String,
    /// `None` for providers that need no credential.
    pub token: Option<String>,
}

impl std::fmt::Debug for ResolvedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedToken")
            .field("provider", &self.provider)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Resolve the provider token for one character.
pub fn resolve_token(
    character: &Character,
    settings: &dyn SettingsSource,
) -> Result<ResolvedToken, ProviderError> {
    let provider = character.provider.as_str();
    let chain = fallback_chain(provider)?;

    if chain.is_empty() {
        return Ok(ResolvedToken {
            provider: provider.into(),
            token: None,
        });
    }

    for (source, key) in &chain {
        let candidate = match source {
            TokenSource::CharacterSecrets => character.secret(key).map(str::to_string),
            TokenSource::ProcessSettings => settings.get(key),
        };
        if let Some(token) = candidate.filter(|t| !t.is_empty()) {
            tracing::debug!(provider, source = %source, key, "Resolved provider token");
            return Ok(ResolvedToken {
                provider: provider.into(),
                token: Some(token),
            });
        }
    }

    let tried = chain
        .iter()
        .map(|(source, key)| format!("{source}.{key}"))
        .collect::<Vec<_>>()
        .join(", ");
    Err(ProviderError::TokenNotFound {
        provider: provider.into(),
        tried,
    })
}
