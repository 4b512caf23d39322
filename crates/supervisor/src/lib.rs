//! # Troupe Supervisor
//!
//! The process-lifecycle core: brings agents up strictly in order, keeps
//! the host alive under bounded memory, drives the interactive console,
//! and guarantees orderly resource release on shutdown or fatal error.
//!
//! All lifecycle state — the one-shot shutdown flag, the memoized
//! storage/cache handles, the watchdog — lives on the [`Supervisor`]
//! context and is passed to the components that need it; nothing here is
//! ambient global state.

pub mod console;
pub mod registry;
pub mod sequencer;
pub mod shutdown;
pub mod watchdog;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use troupe_config::AppConfig;
use troupe_core::character::Character;
use troupe_core::error::Error;

pub use console::ConsoleLoop;
pub use registry::ResourceRegistry;
pub use sequencer::BringupReport;
pub use shutdown::{LifecycleState, ShutdownCause, ShutdownSignal};
pub use watchdog::{
    MemoryPressure, MemorySample, MemorySampler, MemoryWatchdog, ProcessMemorySampler,
};

/// The supervisor context. Owns the resource registry, the watchdog,
/// and the shutdown channel for one process lifetime.
pub struct Supervisor {
    config: AppConfig,
    registry: Arc<ResourceRegistry>,
    watchdog: Arc<MemoryWatchdog>,
    shutdown: ShutdownSignal,
    shutdown_rx: mpsc::Receiver<ShutdownCause>,
}

impl Supervisor {
    /// Build a supervisor sampling real process memory.
    pub fn new(config: AppConfig) -> Self {
        Self::with_sampler(config, Arc::new(ProcessMemorySampler::new()))
    }

    /// Build a supervisor with an injected memory sampler.
    pub fn with_sampler(config: AppConfig, sampler: Arc<dyn MemorySampler>) -> Self {
        let registry = Arc::new(ResourceRegistry::new());
        let watchdog = Arc::new(MemoryWatchdog::new(
            config.watchdog.clone(),
            sampler,
            registry.clone(),
        ));
        let (shutdown, shutdown_rx) = ShutdownSignal::channel();
        Self {
            config,
            registry,
            watchdog,
            shutdown,
            shutdown_rx,
        }
    }

    /// A trigger handle for embedding callers (and tests).
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Run the host on the real stdin. Returns the process exit code.
    pub async fn run(self, characters: Vec<Character>) -> i32 {
        let (console_input, lines) = console::spawn_stdin_reader();
        self.run_with_input(characters, console_input, lines).await
    }

    /// Run the host with an injected console line source.
    pub async fn run_with_input(
        mut self,
        characters: Vec<Character>,
        console_input: JoinHandle<()>,
        lines: mpsc::Receiver<String>,
    ) -> i32 {
        if characters.is_empty() {
            error!("No characters configured; refusing to start");
            return 1;
        }

        info!(
            state = ?LifecycleState::Running,
            characters = characters.len(),
            "Supervisor starting"
        );
        self.registry.set_console(console_input).await;

        if let Err(e) = self.launch(characters, lines).await {
            error!(error = %e, "Start-up failed");
            self.shutdown
                .request(ShutdownCause::Fault(e.to_string()));
        }

        // Park until the first shutdown trigger lands: console exit,
        // signal, watchdog critical, or a start-up fault from above.
        let cause = self
            .shutdown_rx
            .recv()
            .await
            .unwrap_or_else(|| ShutdownCause::Fault("shutdown channel closed".into()));

        info!(state = ?LifecycleState::ShuttingDown, ?cause, "Beginning teardown");
        self.registry.cleanup().await;
        let code = cause.exit_code();
        info!(state = ?LifecycleState::Terminated, code, "Supervisor finished");
        code
    }

    /// Bring the host up: signal listener, watchdog timer, direct
    /// client, agents in order, console loop.
    async fn launch(
        &mut self,
        characters: Vec<Character>,
        mut lines: mpsc::Receiver<String>,
    ) -> Result<(), Error> {
        let signal_task = tokio::spawn(shutdown::wait_for_signal(self.shutdown.clone()));
        self.registry.register_timer(signal_task).await;

        let watchdog = self.watchdog.clone();
        let watchdog_shutdown = self.shutdown.clone();
        let watchdog_task =
            tokio::spawn(async move { watchdog.run_periodic(watchdog_shutdown).await });
        self.registry.register_timer(watchdog_task).await;

        let direct = Arc::new(
            troupe_server::start(&self.config.server.host, self.config.server.port).await?,
        );
        self.registry.set_direct_client(direct.clone()).await;

        let first_agent = characters[0].name.clone();
        let reports = sequencer::bring_up(
            &self.config,
            &self.registry,
            &self.watchdog,
            &self.shutdown,
            &direct,
            characters,
        )
        .await?;
        info!(agents = reports.len(), "All agents started");

        let console = ConsoleLoop::new(
            direct.base_url(),
            first_agent,
            self.config.console.rearm_delay_ms,
            self.watchdog.clone(),
            self.shutdown.clone(),
        );
        tokio::spawn(async move {
            console.run(&mut lines).await;
            // Keep degraded agents' client handles alive until the
            // console session ends; they abort on drop.
            drop(reports);
        });

        Ok(())
    }
}
