//! Platform client implementations for Troupe.
//!
//! The bring-up sequencer asks for clients by the names a character
//! declares; `build_client` maps those names to adapters, configured from
//! the character's own secrets.

pub mod social;

pub use social::{SocialClient, SocialConfig, SOCIAL_TOKEN_KEY};

use std::sync::Arc;

use troupe_core::character::Character;
use troupe_core::client::PlatformClient;
use troupe_core::error::ClientError;

/// Build the adapter for one declared client name.
///
/// An unknown name is a recoverable error — the sequencer logs it and
/// continues with a degraded agent.
pub fn build_client(
    name: &str,
    character: &Character,
) -> Result<Arc<dyn PlatformClient>, ClientError> {
    match name {
        "social" => {
            let api_token = character
                .secret(SOCIAL_TOKEN_KEY)
                .unwrap_or_default()
                .to_string();
            Ok(Arc::new(SocialClient::new(SocialConfig {
                api_token,
                poll_interval_secs: 120,
            })))
        }
        other => Err(ClientError::Unknown(other.into())),
    }
}
