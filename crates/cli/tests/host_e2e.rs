//! End-to-end tests for the Troupe agent host.
//!
//! These exercise the full pipeline: character bring-up through the
//! supervisor, the direct client's HTTP message endpoint, and the
//! console round-trip semantics, using an in-process line feed instead
//! of a terminal.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use troupe_config::AppConfig;
use troupe_core::character::Character;
use troupe_core::message::ReplyMessage;
use troupe_providers::ResolvedToken;
use troupe_runtime::AgentRuntime;
use troupe_storage::{ArtifactCache, SqliteStore};
use troupe_supervisor::{MemorySample, MemorySampler, Supervisor};

/// Sampler pinned well below the warning threshold.
struct QuietSampler;

impl MemorySampler for QuietSampler {
    fn sample(&self) -> MemorySample {
        MemorySample {
            taken_at: chrono::Utc::now(),
            bytes: 10 * 1024 * 1024,
        }
    }
}

fn test_config(dir: &tempfile::TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.data_dir = dir.path().to_path_buf();
    config.server.port = 0;
    config.bringup.agent_delay_ms = 0;
    config.console.rearm_delay_ms = 1;
    config
}

fn norinder() -> Character {
    let mut ch = Character::new("Norinder");
    ch.settings
        .secrets
        .insert("ANTHROPIC_API_KEY".into(), "sk-test".into());
    ch.settings
        .extra
        .insert("greeting".into(), serde_json::json!("Namaste!"));
    ch
}

fn line_feed(lines: &[&str]) -> (JoinHandle<()>, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(16);
    let lines: Vec<String> = lines.iter().map(|s| s.to_string()).collect();
    let task = tokio::spawn(async move {
        for line in lines {
            if tx.send(line).await.is_err() {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
    });
    (task, rx)
}

#[tokio::test]
async fn console_session_hello_then_exit() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::with_sampler(test_config(&dir), Arc::new(QuietSampler));
    let (input, rx) = line_feed(&["hello", "exit"]);

    let code = supervisor
        .run_with_input(vec![norinder()], input, rx)
        .await;
    assert_eq!(code, 0);

    // The round-trip was journaled before teardown: user line plus reply.
    let store = SqliteStore::open(dir.path()).await.unwrap();
    let journal = store
        .recent_messages(&Character::derive_id("Norinder"), 10)
        .await
        .unwrap();
    assert_eq!(journal.len(), 2);
    assert!(journal.iter().any(|m| m.text == "hello"));
    assert!(journal.iter().any(|m| m.text == "Namaste!"));
    store.close().await;
}

#[tokio::test]
async fn message_endpoint_speaks_the_documented_shape() {
    // POST /Norinder/message with {text, userId, userName} must answer
    // with a JSON array of objects carrying at least `text`.
    let mut character = norinder();
    character.fill_defaults();

    let store = Arc::new(SqliteStore::open_path("sqlite::memory:").await.unwrap());
    let cache = Arc::new(ArtifactCache::new());
    let runtime = Arc::new(AgentRuntime::new(
        character,
        ResolvedToken {
            provider: "anthropic".into(),
            token: Some("sk-test".into()),
        },
        store,
        cache,
    ));
    runtime.initialize().await.unwrap();

    let direct = troupe_server::start("127.0.0.1", 0).await.unwrap();
    direct.register_agent(runtime).await;

    let url = format!("{}/Norinder/message", direct.base_url());
    let response = reqwest::Client::new()
        .post(&url)
        .json(&serde_json::json!({
            "text": "hello",
            "userId": "user",
            "userName": "User",
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let replies: Vec<ReplyMessage> = response.json().await.unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].text, "Namaste!");
    direct.shutdown();
}

#[tokio::test]
async fn two_characters_come_up_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    config.bringup.agent_delay_ms = 30;
    let supervisor = Supervisor::with_sampler(config, Arc::new(QuietSampler));

    let mut second = norinder();
    second.name = "Second".into();
    let (input, rx) = line_feed(&["exit"]);

    let code = supervisor
        .run_with_input(vec![norinder(), second], input, rx)
        .await;
    assert_eq!(code, 0);
}
