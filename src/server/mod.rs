//! HTTP surface for the chat adapter
//!
//! - `GET /api/actions` lists every action with its payload schema
//! - `POST /api/actions/:name` runs a registered action with the JSON body as payload
//! - `POST /api/feedback` records thumbs up/down feedback on a reply
//! - `GET /health` reports the configured backends and actions

use crate::actions::ActionRegistry;
use crate::llm::traits::BackendKind;
use crate::orchestrator::FallbackOrchestrator;
use crate::RelayError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Reaction payload attached to a feedback event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackValue {
    #[serde(default)]
    pub reaction: String,
    #[serde(default)]
    pub feedback: String,
}

/// Feedback the chat platform sends when a user rates a reply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackLoopData {
    #[serde(default)]
    pub action_name: String,
    #[serde(default)]
    pub action_value: FeedbackValue,
    #[serde(default)]
    pub reply_to_id: Option<String>,
}

#[derive(Clone)]
struct AppState {
    actions: ActionRegistry,
    backends: Arc<Vec<BackendKind>>,
    started_at: DateTime<Utc>,
}

/// Serves registered actions over HTTP
pub struct RelayServer {
    state: AppState,
    host: String,
    port: u16,
}

impl RelayServer {
    pub fn new(actions: ActionRegistry, orchestrator: &FallbackOrchestrator, port: u16) -> Self {
        Self {
            state: AppState {
                actions,
                backends: Arc::new(orchestrator.configured_backends()),
                started_at: Utc::now(),
            },
            host: "0.0.0.0".to_string(),
            port,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/actions", get(list_actions_handler))
            .route("/api/actions/:name", post(action_handler))
            .route("/api/feedback", post(feedback_handler))
            .route("/health", get(health_handler))
            .with_state(self.state.clone())
            .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
    }

    /// Serve until ctrl-c
    pub async fn start(self) -> Result<(), RelayError> {
        let app = self.router();
        let bind_addr = format!("{}:{}", self.host, self.port);
        info!(addr = %bind_addr, "Starting relay HTTP server");

        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| RelayError::configuration_error(format!("Failed to bind {}: {}", bind_addr, e)))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| RelayError::internal_error(format!("HTTP server failed: {}", e)))?;

        info!("Relay HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn list_actions_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({"actions": state.actions.get_action_schemas().await}))
}

async fn action_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Option<Json<Value>>,
) -> (StatusCode, Json<Value>) {
    let payload = body.map(|Json(v)| v).unwrap_or_else(|| json!({}));
    let status = if state.actions.has_action(&name).await {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    let reply = state.actions.dispatch(&name, &payload).await;
    (status, Json(json!({"action": name, "reply": reply})))
}

async fn feedback_handler(
    Json(feedback): Json<FeedbackLoopData>,
) -> Json<Value> {
    info!(
        reaction = %feedback.action_value.reaction,
        feedback = %feedback.action_value.feedback,
        reply_to_id = feedback.reply_to_id.as_deref().unwrap_or(""),
        "Feedback received"
    );
    Json(json!({"status": "received"}))
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let backends: Vec<&str> = state.backends.iter().map(BackendKind::as_str).collect();
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "started_at": state.started_at,
        "backends": backends,
        "actions": state.actions.action_names().await
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::create_default_actions;
    use crate::orchestrator::FallbackPolicy;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn server() -> RelayServer {
        let orchestrator = Arc::new(FallbackOrchestrator::new(false, false, FallbackPolicy::default()));
        let actions = create_default_actions(orchestrator.clone()).await.unwrap();
        RelayServer::new(actions, &orchestrator, 0)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_action_endpoint() {
        let app = server().await.router();
        let response = app
            .oneshot(
                Request::post("/api/actions/getNickname")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"location":"San Francisco, CA"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["action"], "getNickname");
        assert_eq!(body["reply"], "The Golden City");
    }

    #[tokio::test]
    async fn test_list_actions_endpoint() {
        let app = server().await.router();
        let response = app
            .oneshot(Request::get("/api/actions").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let actions = body["actions"].as_array().unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0]["name"], "getCurrentWeather");
        assert_eq!(actions[2]["name"], "queryFabricDataAgent");
        assert_eq!(actions[2]["parameters"]["required"][0], "question");
    }

    #[test]
    fn test_with_host() {
        let orchestrator = FallbackOrchestrator::new(false, false, FallbackPolicy::default());
        let server = RelayServer::new(ActionRegistry::new(), &orchestrator, 3978).with_host("127.0.0.1");
        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 3978);
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let app = server().await.router();
        let response = app
            .oneshot(
                Request::post("/api/actions/launchRocket")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["reply"], "The agent encountered an error or bug.");
    }

    #[tokio::test]
    async fn test_feedback_endpoint() {
        let app = server().await.router();
        let response = app
            .oneshot(
                Request::post("/api/feedback")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"actionName":"feedback","actionValue":{"reaction":"like","feedback":"{}"},"replyToId":"r1"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = server().await.router();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["actions"].as_array().unwrap().len(), 3);
    }
}
