//! Agent bring-up sequencer.
//!
//! Walks the configured character list strictly in order, never
//! concurrently: pre-flight memory check, identity defaults, provider
//! token resolution, lazily opened shared handles, runtime construction
//! and initialization, best-effort platform client start-up,
//! registration with the direct client, then a fixed inter-instance
//! delay to bound burst resource use.
//!
//! A broken required character is a deployment error: any failure
//! outside the optional client step aborts the whole process.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use troupe_config::AppConfig;
use troupe_core::character::Character;
use troupe_core::client::ClientHandle;
use troupe_core::error::Error;
use troupe_providers::SettingsSource;
use troupe_runtime::AgentRuntime;
use troupe_server::DirectClientHandle;

use crate::registry::ResourceRegistry;
use crate::shutdown::{ShutdownCause, ShutdownSignal};
use crate::watchdog::{MemoryPressure, MemoryWatchdog};

/// Process-wide settings view handed to the token resolver: config
/// file's settings bag first, then the environment.
struct ProcessSettings<'a>(&'a AppConfig);

impl SettingsSource for ProcessSettings<'_> {
    fn get(&self, key: &str) -> Option<String> {
        self.0.setting(key)
    }
}

/// What one successful bring-up produced. The timestamps exist so
/// callers (and tests) can observe the no-overlap ordering guarantee;
/// the client handles keep degraded-optional background tasks alive for
/// the life of the process.
#[derive(Debug)]
pub struct BringupReport {
    pub name: String,
    pub agent_id: String,
    pub started_at: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
    pub client_handles: Vec<ClientHandle>,
    pub failed_clients: Vec<String>,
}

/// Bring up every character in list order.
pub async fn bring_up(
    config: &AppConfig,
    registry: &ResourceRegistry,
    watchdog: &MemoryWatchdog,
    shutdown: &ShutdownSignal,
    direct_client: &DirectClientHandle,
    characters: Vec<Character>,
) -> Result<Vec<BringupReport>, Error> {
    let total = characters.len();
    let mut reports = Vec::with_capacity(total);

    for (index, character) in characters.into_iter().enumerate() {
        if shutdown.is_requested() {
            return Err(Error::Internal("shutdown during agent bring-up".into()));
        }

        if watchdog.check().await == MemoryPressure::Critical {
            shutdown.request(ShutdownCause::MemoryCritical);
            return Err(Error::Internal(
                "memory critical during agent bring-up".into(),
            ));
        }

        let name = character.name.clone();
        let report = start_agent(config, registry, direct_client, character)
            .await
            .inspect_err(|e| {
                error!(character = %name, error = %e, "Agent bring-up failed");
            })?;

        info!(
            character = %report.name,
            agent_id = %report.agent_id,
            "Agent started ({}/{total})",
            index + 1
        );
        reports.push(report);

        if index + 1 < total {
            tokio::time::sleep(std::time::Duration::from_millis(config.bringup.agent_delay_ms))
                .await;
        }
    }

    Ok(reports)
}

/// Construct, initialize, and register one agent.
async fn start_agent(
    config: &AppConfig,
    registry: &ResourceRegistry,
    direct_client: &DirectClientHandle,
    mut character: Character,
) -> Result<BringupReport, Error> {
    let started_at = Utc::now();

    character.fill_defaults();

    let token = troupe_providers::resolve_token(&character, &ProcessSettings(config))?;

    let store = registry.store(&config.data_dir).await?;
    let cache = registry.cache().await;

    let declared = character.declared_clients();
    let name = character.name.clone();
    let runtime = Arc::new(AgentRuntime::new(character, token, store, cache));
    runtime.initialize().await?;

    // Optional clients: a failure degrades the agent, never aborts the
    // sequence. Console interaction stays viable without them.
    let mut client_handles = Vec::new();
    let mut failed_clients = Vec::new();
    let agent = runtime.agent_ref();
    for client_name in declared {
        let started = match troupe_clients::build_client(&client_name, runtime.character()) {
            Ok(client) => client.start(&agent).await,
            Err(e) => Err(e),
        };
        match started {
            Ok(handle) => client_handles.push(handle),
            Err(e) => {
                warn!(
                    character = %name,
                    client = %client_name,
                    error = %e,
                    "Platform client failed to start; continuing degraded"
                );
                failed_clients.push(client_name);
            }
        }
    }

    let agent_id = runtime.agent_id().to_string();
    direct_client.register_agent(runtime).await;
    let registered_at = Utc::now();

    Ok(BringupReport {
        name,
        agent_id,
        started_at,
        registered_at,
        client_handles,
        failed_clients,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchdog::ScriptedSampler;
    use troupe_config::WatchdogConfig;

    const MB: u64 = 1024 * 1024;

    struct Fixture {
        config: AppConfig,
        registry: Arc<ResourceRegistry>,
        watchdog: MemoryWatchdog,
        sampler: Arc<ScriptedSampler>,
        _dir: tempfile::TempDir,
    }

    fn fixture(agent_delay_ms: u64) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.data_dir = dir.path().to_path_buf();
        config.bringup.agent_delay_ms = agent_delay_ms;

        let registry = Arc::new(ResourceRegistry::new());
        let sampler = Arc::new(ScriptedSampler::new(100 * MB));
        let watchdog = MemoryWatchdog::new(
            WatchdogConfig::default(),
            sampler.clone(),
            registry.clone(),
        );
        Fixture {
            config,
            registry,
            watchdog,
            sampler,
            _dir: dir,
        }
    }

    fn character(name: &str) -> Character {
        let mut ch = Character::new(name);
        ch.settings
            .secrets
            .insert("ANTHROPIC_API_KEY".into(), "sk-test".into());
        ch
    }

    #[tokio::test]
    async fn bring_up_preserves_list_order_with_delay() {
        let f = fixture(50);
        let (shutdown, _rx) = ShutdownSignal::channel();
        let direct = troupe_server::start("127.0.0.1", 0).await.unwrap();

        let reports = bring_up(
            &f.config,
            &f.registry,
            &f.watchdog,
            &shutdown,
            &direct,
            vec![character("First"), character("Second")],
        )
        .await
        .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "First");
        assert_eq!(reports[1].name, "Second");
        // No overlap: the second construction starts only after the
        // first's registration plus the inter-instance delay.
        let gap = reports[1].started_at - reports[0].registered_at;
        assert!(gap.num_milliseconds() >= 50, "gap was {gap:?}");
        direct.shutdown();
    }

    #[tokio::test]
    async fn missing_token_aborts_the_sequence() {
        let f = fixture(0);
        let (shutdown, _rx) = ShutdownSignal::channel();
        let direct = troupe_server::start("127.0.0.1", 0).await.unwrap();

        let mut broken = Character::new("Broken");
        broken.provider = "anthropic".into();
        let err = bring_up(
            &f.config,
            &f.registry,
            &f.watchdog,
            &shutdown,
            &direct,
            vec![broken],
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("anthropic"));
        direct.shutdown();
    }

    #[tokio::test]
    async fn failed_optional_client_degrades_instead_of_aborting() {
        let f = fixture(0);
        let (shutdown, _rx) = ShutdownSignal::channel();
        let direct = troupe_server::start("127.0.0.1", 0).await.unwrap();

        let mut ch = character("Degraded");
        // Declared but without SOCIAL_API_TOKEN, so start fails.
        ch.clients = vec!["social".into()];

        let reports = bring_up(
            &f.config,
            &f.registry,
            &f.watchdog,
            &shutdown,
            &direct,
            vec![ch],
        )
        .await
        .unwrap();
        assert_eq!(reports[0].failed_clients, vec!["social".to_string()]);
        assert!(reports[0].client_handles.is_empty());
        direct.shutdown();
    }

    #[tokio::test]
    async fn critical_memory_preempts_bring_up() {
        let f = fixture(0);
        f.sampler.set(400 * MB);
        let (shutdown, mut rx) = ShutdownSignal::channel();
        let direct = troupe_server::start("127.0.0.1", 0).await.unwrap();

        let err = bring_up(
            &f.config,
            &f.registry,
            &f.watchdog,
            &shutdown,
            &direct,
            vec![character("Never")],
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("memory critical"));
        assert_eq!(rx.recv().await, Some(ShutdownCause::MemoryCritical));
        direct.shutdown();
    }

    #[tokio::test]
    async fn handles_are_shared_across_characters() {
        let f = fixture(0);
        let (shutdown, _rx) = ShutdownSignal::channel();
        let direct = troupe_server::start("127.0.0.1", 0).await.unwrap();

        bring_up(
            &f.config,
            &f.registry,
            &f.watchdog,
            &shutdown,
            &direct,
            vec![character("A"), character("B")],
        )
        .await
        .unwrap();

        // Memoized: asking again returns the same store instance.
        let store_a = f.registry.store(&f.config.data_dir).await.unwrap();
        let store_b = f.registry.store(&f.config.data_dir).await.unwrap();
        assert!(Arc::ptr_eq(&store_a, &store_b));
        direct.shutdown();
    }
}
