//! In-process artifact cache.
//!
//! One instance per process, shared by every agent — intentional
//! single-tenant caching, not per-character isolation. The watchdog's
//! advisory reclamation hint empties it.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

/// Shared artifact cache keyed by string.
#[derive(Default)]
pub struct ArtifactCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn put(&self, key: impl Into<String>, value: Value) {
        self.entries.write().await.insert(key.into(), value);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Advisory reclamation: drop everything cached and report how many
    /// entries were freed. A hint, not a guarantee that memory returns
    /// to the OS.
    pub async fn trim(&self) -> usize {
        let mut entries = self.entries.write().await;
        let freed = entries.len();
        entries.clear();
        entries.shrink_to_fit();
        if freed > 0 {
            debug!(freed, "Artifact cache trimmed");
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let cache = ArtifactCache::new();
        cache.put("avatar:norinder", json!({"url": "x.png"})).await;
        assert_eq!(
            cache.get("avatar:norinder").await,
            Some(json!({"url": "x.png"}))
        );
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn trim_reports_freed_count() {
        let cache = ArtifactCache::new();
        cache.put("a", json!(1)).await;
        cache.put("b", json!(2)).await;
        assert_eq!(cache.trim().await, 2);
        assert!(cache.is_empty().await);
        assert_eq!(cache.trim().await, 0);
    }
}
