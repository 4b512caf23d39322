//! Shutdown controller — the terminal state machine of the process.
//!
//! {Running, ShuttingDown, Terminated}, driven by termination signals,
//! the console `exit` command, watchdog Critical reports, and faults in
//! supervised tasks. The flag flips exactly once; every later trigger is
//! absorbed. No transition leads back to Running.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info};

/// Why the process is going down. Decides the exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownCause {
    /// SIGINT or SIGTERM.
    Signal,
    /// The console user typed `exit`.
    ConsoleExit,
    /// Console input reached EOF.
    ConsoleClosed,
    /// The watchdog measured memory at or above the critical threshold.
    MemoryCritical,
    /// A supervised task failed or a bring-up step errored.
    Fault(String),
}

impl ShutdownCause {
    /// Requested shutdowns exit 0; error-triggered shutdowns exit 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownCause::Signal | ShutdownCause::ConsoleExit | ShutdownCause::ConsoleClosed => 0,
            ShutdownCause::MemoryCritical | ShutdownCause::Fault(_) => 1,
        }
    }
}

/// Lifecycle states. Shutdown is terminal for the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    ShuttingDown,
    Terminated,
}

/// Cloneable trigger handle given to every component that can demand
/// shutdown. The first `request` wins; the rest are logged and dropped.
#[derive(Clone)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
    tx: mpsc::Sender<ShutdownCause>,
}

impl ShutdownSignal {
    /// Build a signal and the receiver the supervisor listens on.
    pub fn channel() -> (Self, mpsc::Receiver<ShutdownCause>) {
        let (tx, rx) = mpsc::channel(4);
        (
            Self {
                flag: Arc::new(AtomicBool::new(false)),
                tx,
            },
            rx,
        )
    }

    /// Whether shutdown has been requested. Monotonic: once true,
    /// forever true.
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request shutdown. Only the first caller's cause reaches the
    /// supervisor; concurrent triggers are absorbed here.
    pub fn request(&self, cause: ShutdownCause) {
        if self
            .flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(?cause, "Shutdown already in progress; trigger absorbed");
            return;
        }
        info!(?cause, "Shutdown requested");
        // The receiver can only be gone during final teardown, when the
        // flag is already set and this branch is unreachable.
        let _ = self.tx.try_send(cause);
    }
}

/// Listen for SIGINT/SIGTERM and translate the first one into a
/// shutdown request.
pub async fn wait_for_signal(shutdown: ShutdownSignal) {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C");
    }
    shutdown.request(ShutdownCause::Signal);
}
