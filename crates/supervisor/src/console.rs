//! Interactive console loop.
//!
//! Single-threaded, cooperative, one pending read at a time: prompt,
//! read a line, round-trip it through the direct client's message
//! endpoint for the first configured agent, print the ordered replies,
//! re-arm. `exit` (case-insensitive) ends the session; a failed
//! round-trip does not.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

use troupe_core::message::{InboundMessage, ReplyMessage};

use crate::shutdown::{ShutdownCause, ShutdownSignal};
use crate::watchdog::{MemoryPressure, MemoryWatchdog};

/// One console round-trip gone wrong. Recoverable: the loop logs it and
/// re-arms.
#[derive(Debug, thiserror::Error)]
pub enum RoundTripError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("message endpoint returned status {0}")]
    Status(u16),
}

/// Spawn the stdin reader. Returns the task (the console input handle
/// the resource registry owns) and the line stream.
pub fn spawn_stdin_reader() -> (JoinHandle<()>, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(8);
    let task = tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF (Ctrl+D)
                Err(e) => {
                    error!(error = %e, "Console input error");
                    break;
                }
            }
        }
    });
    (task, rx)
}

/// Whether a line is the session-ending command.
pub fn is_exit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("exit")
}

/// The read-eval loop over one agent.
pub struct ConsoleLoop {
    http: reqwest::Client,
    base_url: String,
    agent_id: String,
    rearm_delay: std::time::Duration,
    watchdog: Arc<MemoryWatchdog>,
    shutdown: ShutdownSignal,
}

impl ConsoleLoop {
    pub fn new(
        base_url: impl Into<String>,
        agent_id: impl Into<String>,
        rearm_delay_ms: u64,
        watchdog: Arc<MemoryWatchdog>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            agent_id: agent_id.into(),
            rearm_delay: std::time::Duration::from_millis(rearm_delay_ms),
            watchdog,
            shutdown,
        }
    }

    /// Drive the loop until shutdown is requested or the line stream
    /// closes. Never returns while a round-trip is still in flight.
    pub async fn run(&self, lines: &mut mpsc::Receiver<String>) {
        loop {
            if self.shutdown.is_requested() {
                return;
            }

            print!("you> ");
            let _ = std::io::stdout().flush();

            let Some(line) = lines.recv().await else {
                self.shutdown.request(ShutdownCause::ConsoleClosed);
                return;
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if is_exit_command(trimmed) {
                self.shutdown.request(ShutdownCause::ConsoleExit);
                return;
            }

            if self.watchdog.check().await == MemoryPressure::Critical {
                self.shutdown.request(ShutdownCause::MemoryCritical);
                return;
            }

            match self.send_message(trimmed).await {
                Ok(replies) => {
                    for reply in replies {
                        println!("{}: {}", self.agent_id, reply.text);
                    }
                }
                Err(e) => {
                    // One failed round-trip is not fatal; re-arm.
                    error!(agent = %self.agent_id, error = %e, "Console round-trip failed");
                }
            }

            tokio::time::sleep(self.rearm_delay).await;
        }
    }

    /// POST one line to the agent's message endpoint and parse the
    /// ordered reply sequence.
    async fn send_message(&self, text: &str) -> Result<Vec<ReplyMessage>, RoundTripError> {
        let url = format!("{}/{}/message", self.base_url, self.agent_id);
        let response = self
            .http
            .post(&url)
            .json(&InboundMessage::from_console(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Release the body before reporting the failure.
            drop(response);
            return Err(RoundTripError::Status(status.as_u16()));
        }

        let replies = response.json::<Vec<ReplyMessage>>().await?;
        Ok(replies)
    }
}
