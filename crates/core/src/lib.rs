//! # Troupe Core
//!
//! Domain types, traits, and error definitions for the Troupe agent host.
//! This crate has **zero framework dependencies** — it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait or plain value type here.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod character;
pub mod client;
pub mod error;
pub mod message;

// Re-export key types at crate root for ergonomics
pub use character::{Character, CharacterSettings, PluginDescriptor};
pub use client::{AgentRef, ClientHandle, PlatformClient};
pub use error::{Error, Result};
pub use message::{InboundMessage, ReplyMessage, StoredMessage};
