//! Resource registry — single owner of every process-wide handle.
//!
//! Holds exactly the handles the supervisor owns (console input task,
//! SQLite store, artifact cache, direct client, periodic timers) and
//! performs idempotent, ordered teardown. `cleanup()` can be entered
//! concurrently from independent failure paths; the first `take()` of
//! each handle wins and later calls are no-ops for that handle.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use troupe_core::error::StorageError;
use troupe_storage::{ArtifactCache, SqliteStore};
use troupe_server::DirectClientHandle;

#[derive(Default)]
struct Handles {
    console: Option<JoinHandle<()>>,
    store: Option<Arc<SqliteStore>>,
    cache: Option<Arc<ArtifactCache>>,
    direct_client: Option<Arc<DirectClientHandle>>,
    timers: Vec<JoinHandle<()>>,
    torn_down: bool,
}

/// Owner of the process's nullable resource handles.
pub struct ResourceRegistry {
    inner: Mutex<Handles>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Handles::default()),
        }
    }

    /// Adopt the console input task.
    pub async fn set_console(&self, task: JoinHandle<()>) {
        let mut inner = self.inner.lock().await;
        debug_assert!(inner.console.is_none(), "console handle set twice");
        inner.console = Some(task);
    }

    /// Adopt the direct client handle.
    pub async fn set_direct_client(&self, handle: Arc<DirectClientHandle>) {
        let mut inner = self.inner.lock().await;
        debug_assert!(inner.direct_client.is_none(), "direct client set twice");
        inner.direct_client = Some(handle);
    }

    /// Adopt a periodic timer task (watchdog and friends).
    pub async fn register_timer(&self, task: JoinHandle<()>) {
        self.inner.lock().await.timers.push(task);
    }

    /// The persistent store, opened lazily on first use and shared by
    /// every agent afterwards. Using the registry after teardown is a
    /// programming error.
    pub async fn store(&self, data_dir: &Path) -> Result<Arc<SqliteStore>, StorageError> {
        let mut inner = self.inner.lock().await;
        if inner.torn_down {
            panic!("resource registry used after teardown");
        }
        if let Some(store) = &inner.store {
            return Ok(store.clone());
        }
        let store = Arc::new(SqliteStore::open(data_dir).await?);
        store.init().await?;
        inner.store = Some(store.clone());
        Ok(store)
    }

    /// The artifact cache, created once and memoized — one instance per
    /// process, intentionally shared across all agents.
    pub async fn cache(&self) -> Arc<ArtifactCache> {
        let mut inner = self.inner.lock().await;
        if inner.torn_down {
            panic!("resource registry used after teardown");
        }
        inner
            .cache
            .get_or_insert_with(|| Arc::new(ArtifactCache::new()))
            .clone()
    }

    /// Advisory reclamation pass: trim whatever the cache currently
    /// holds. Cooperative; never creates the cache and never fails.
    pub async fn reclamation_hint(&self) {
        let cache = self.inner.lock().await.cache.clone();
        if let Some(cache) = cache {
            let freed = cache.trim().await;
            debug!(freed, "Reclamation hint processed");
        }
    }

    /// Whether teardown has already run.
    pub async fn is_torn_down(&self) -> bool {
        self.inner.lock().await.torn_down
    }

    /// Ordered, idempotent teardown. Returns `true` for the invocation
    /// that actually released the handles; concurrent and repeat callers
    /// get `false` and a no-op.
    ///
    /// Order: console input → store → cache → direct client →
    /// reclamation hint → timers.
    pub async fn cleanup(&self) -> bool {
        let mut inner = self.inner.lock().await;
        let first_pass = !inner.torn_down;
        inner.torn_down = true;

        if let Some(console) = inner.console.take() {
            console.abort();
            debug!("Console input handle closed");
        }

        if let Some(store) = inner.store.take() {
            store.close().await;
            debug!("Persistent store closed");
        }

        if let Some(cache) = inner.cache.take() {
            let freed = cache.trim().await;
            debug!(freed, "Cache handle dropped");
        }

        if let Some(direct_client) = inner.direct_client.take() {
            direct_client.shutdown();
            debug!("Direct client stopped");
        }

        // Everything droppable is dropped above; the hint is all that
        // remains of the advisory pass at this point.
        if first_pass {
            debug!("Reclamation hint requested");
        }

        for timer in inner.timers.drain(..) {
            timer.abort();
        }

        if first_pass {
            info!("Resource teardown complete");
        } else {
            warn!("Teardown re-entered; nothing left to release");
        }
        first_pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let registry = ResourceRegistry::new();
        let _ = registry.cache().await;
        assert!(registry.cleanup().await);
        assert!(!registry.cleanup().await);
        assert!(registry.is_torn_down().await);
    }

    #[tokio::test]
    async fn concurrent_cleanup_releases_exactly_once() {
        let registry = Arc::new(ResourceRegistry::new());
        let dir = tempfile::tempdir().unwrap();
        let _ = registry.store(dir.path()).await.unwrap();
        let _ = registry.cache().await;
        registry
            .set_console(tokio::spawn(async {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            }))
            .await;

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move { registry.cleanup().await }));
        }

        let mut first_passes = 0;
        for task in tasks {
            if task.await.unwrap() {
                first_passes += 1;
            }
        }
        assert_eq!(first_passes, 1);
    }

    #[tokio::test]
    async fn store_is_memoized() {
        let registry = ResourceRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let a = registry.store(dir.path()).await.unwrap();
        let b = registry.store(dir.path()).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn cache_is_memoized() {
        let registry = ResourceRegistry::new();
        let a = registry.cache().await;
        let b = registry.cache().await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn reclamation_hint_never_creates_the_cache() {
        let registry = ResourceRegistry::new();
        registry.reclamation_hint().await;
        // Cleanup on a registry that never opened anything still works.
        assert!(registry.cleanup().await);
    }

    #[tokio::test]
    #[should_panic(expected = "used after teardown")]
    async fn cache_access_after_teardown_panics() {
        let registry = ResourceRegistry::new();
        registry.cleanup().await;
        let _ = registry.cache().await;
    }
}
