//! Character configuration — the persona definition an agent is built from.
//!
//! A character is loaded once at start-up, mutated in place only to fill
//! missing `id`/`username` defaults, and never touched again after an agent
//! has been constructed from it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Namespace for deriving stable character ids from names.
///
/// Fixed so the same name always yields the same id across processes.
const CHARACTER_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x8f, 0x3a, 0x1c, 0x5e, 0x42, 0x91, 0x4b, 0x7d, 0x9a, 0x06, 0xd3, 0x2f, 0x77, 0x10, 0xbe,
    0x54,
]);

/// A persona definition: identity, model-provider selection, enabled
/// clients, and a settings/secrets bag.
#[derive(Clone, Serialize, Deserialize)]
pub struct Character {
    /// Display name. Required; everything else can be defaulted from it.
    pub name: String,

    /// Stable identifier. Derived deterministically from `name` if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Username used on external platforms. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Model-provider selector (e.g. "anthropic", "openai").
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Platform-client names enabled for this character.
    #[serde(default)]
    pub clients: Vec<String>,

    /// Plugin descriptors. A plugin may declare additional clients.
    #[serde(default)]
    pub plugins: Vec<PluginDescriptor>,

    /// Character-level settings, including the secrets map.
    #[serde(default)]
    pub settings: CharacterSettings,
}

fn default_provider() -> String {
    "anthropic".into()
}

/// Per-character settings bag.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CharacterSettings {
    /// Secret values (API keys etc.), consulted before process-wide settings.
    #[serde(default)]
    pub secrets: HashMap<String, String>,

    /// Free-form settings the runtime may consult.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A plugin attached to a character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,

    /// Clients this plugin wants started alongside the character's own.
    #[serde(default)]
    pub clients: Vec<String>,
}

impl std::fmt::Debug for Character {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Character")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("username", &self.username)
            .field("provider", &self.provider)
            .field("clients", &self.clients)
            .field("plugins", &self.plugins)
            .field("settings", &"[REDACTED]")
            .finish()
    }
}

impl Character {
    /// Create a character with just a name; everything else defaulted.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            username: None,
            provider: default_provider(),
            clients: Vec::new(),
            plugins: Vec::new(),
            settings: CharacterSettings::default(),
        }
    }

    /// Fill missing `id` and `username` in place.
    ///
    /// The id is derived from the name, so two loads of the same character
    /// file agree on it.
    pub fn fill_defaults(&mut self) {
        if self.id.is_none() {
            self.id = Some(Self::derive_id(&self.name));
        }
        if self.username.is_none() {
            self.username = Some(self.name.clone());
        }
    }

    /// Deterministic id for a character name.
    pub fn derive_id(name: &str) -> String {
        Uuid::new_v5(&CHARACTER_ID_NAMESPACE, name.as_bytes()).to_string()
    }

    /// The filled-in id. Panics if `fill_defaults` has not run — callers get
    /// characters from the loader, which always fills defaults.
    pub fn id(&self) -> &str {
        self.id.as_deref().expect("character id not filled")
    }

    /// Look up a secret in the character's own bag.
    pub fn secret(&self, key: &str) -> Option<&str> {
        self.settings.secrets.get(key).map(String::as_str)
    }

    /// All client names to start: the character's own list plus any
    /// plugin-declared clients, deduplicated in declaration order.
    pub fn declared_clients(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let all = self
            .clients
            .iter()
            .chain(self.plugins.iter().flat_map(|p| p.clients.iter()));
        for name in all {
            if !out.iter().any(|n| n == name) {
                out.push(name.clone());
            }
        }
        out
    }
}
