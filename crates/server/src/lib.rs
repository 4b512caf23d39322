//! Direct Client — the local HTTP message API for Troupe.
//!
//! Exposes `POST /{agent_id}/message` for sending a message to a
//! registered agent and receiving its ordered replies, plus a health
//! endpoint. Started once per process; the supervisor registers each
//! agent runtime with the returned handle as bring-up completes.
//!
//! Built on Axum for high performance async HTTP.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info};

use troupe_core::error::ServerError;
use troupe_core::message::{InboundMessage, ReplyMessage};
use troupe_runtime::AgentRuntime;

/// Registered agents, addressable by id and by name.
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<AgentRuntime>>>,
}

impl AgentRegistry {
    pub async fn register(&self, runtime: Arc<AgentRuntime>) {
        let mut agents = self.agents.write().await;
        agents.insert(runtime.agent_id().to_string(), runtime.clone());
        agents.insert(runtime.name().to_string(), runtime.clone());
        info!(agent = %runtime.name(), "Agent registered with direct client");
    }

    pub async fn get(&self, key: &str) -> Option<Arc<AgentRuntime>> {
        self.agents.read().await.get(key).cloned()
    }

    /// Distinct registered runtimes (each is stored under two keys).
    pub async fn count(&self) -> usize {
        let agents = self.agents.read().await;
        let mut ids: Vec<&str> = agents.values().map(|r| r.agent_id()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

type SharedRegistry = Arc<AgentRegistry>;

/// Build the Axum router over an agent registry.
pub fn build_router(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/{agent_id}/message", post(message_handler))
        .with_state(registry)
}

/// Handle to the running direct client.
///
/// Registration stays valid for the life of the process; `shutdown`
/// stops the listener and detaches every registered runtime.
pub struct DirectClientHandle {
    registry: SharedRegistry,
    local_addr: SocketAddr,
    serve_task: tokio::task::JoinHandle<()>,
}

impl DirectClientHandle {
    /// Register a constructed agent runtime. The direct client owns the
    /// runtime from here on.
    pub async fn register_agent(&self, runtime: Arc<AgentRuntime>) {
        self.registry.register(runtime).await;
    }

    /// The address the server actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL for local callers.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Stop serving. Idempotent; registered runtimes are dropped with
    /// the registry.
    pub fn shutdown(&self) {
        self.serve_task.abort();
    }
}

impl Drop for DirectClientHandle {
    fn drop(&mut self) {
        self.serve_task.abort();
    }
}

/// Start the direct client on `host:port`. Returns once the listener is
/// bound; serving continues on a background task.
pub async fn start(host: &str, port: u16) -> Result<DirectClientHandle, ServerError> {
    let registry: SharedRegistry = Arc::new(AgentRegistry::default());
    let app = build_router(registry.clone());

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::BindFailed {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;
    let local_addr = listener.local_addr().map_err(|e| ServerError::BindFailed {
        addr,
        reason: e.to_string(),
    })?;

    let serve_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Direct client serve loop ended");
        }
    });

    info!(addr = %local_addr, "Direct client listening");
    Ok(DirectClientHandle {
        registry,
        local_addr,
        serve_task,
    })
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    agents: usize,
}

async fn health_handler(State(registry): State<SharedRegistry>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        agents: registry.count().await,
    })
}

async fn message_handler(
    State(registry): State<SharedRegistry>,
    Path(agent_id): Path<String>,
    Json(payload): Json<InboundMessage>,
) -> Result<Json<Vec<ReplyMessage>>, StatusCode> {
    let Some(runtime) = registry.get(&agent_id).await else {
        return Err(StatusCode::NOT_FOUND);
    };

    match runtime
        .reply(&payload.text, &payload.user_id, &payload.user_name)
        .await
    {
        Ok(replies) => Ok(Json(replies)),
        Err(e) => {
            error!(agent = %agent_id, error = %e, "Agent reply failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use troupe_core::character::Character;
    use troupe_providers::ResolvedToken;
    use troupe_storage::{ArtifactCache, SqliteStore};

    async fn registry_with_norinder() -> SharedRegistry {
        let mut character = Character::new("Norinder");
        character.fill_defaults();
        character
            .settings
            .extra
            .insert("greeting".into(), serde_json::json!("Namaste!"));

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

        let registry = Arc::new(AgentRegistry::default());
        registry.register(runtime).await;
        registry
    }

    fn message_request(agent: &str, text: &str) -> Request<Body> {
        let body = serde_json::json!({
            "text": text,
            "userId": "user",
            "userName": "User",
        });
        Request::builder()
            .method("POST")
            .uri(format!("/{agent}/message"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_agent_count() {
        let app = build_router(registry_with_norinder().await);
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["agents"], 1);
    }

    #[tokio::test]
    async fn message_roundtrip_by_name() {
        let app = build_router(registry_with_norinder().await);
        let response = app.oneshot(message_request("Norinder", "hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let replies: Vec<ReplyMessage> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text, "Namaste!");
    }

    #[tokio::test]
    async fn message_roundtrip_by_id() {
        let registry = registry_with_norinder().await;
        let id = Character::derive_id("Norinder");
        let app = build_router(registry);
        let response = app.oneshot(message_request(&id, "hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_agent_is_404() {
        let app = build_router(registry_with_norinder().await);
        let response = app.oneshot(message_request("Nobody", "hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn start_binds_ephemeral_port() {
        let handle = start("127.0.0.1", 0).await.unwrap();
        assert_ne!(handle.local_addr().port(), 0);
        handle.shutdown();
    }
}
