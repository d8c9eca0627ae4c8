use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    routing::{get, post},
};
use chrono::Utc;
use lib_common::engine::NodeListing;
use lib_common::orchestrator::{TriggerOutcome, UpdateState};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use super::error::ApiError;
use super::state::AppState;

const DEFAULT_GROUP: &str = "Proxy";

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    Router::new()
        .route("/update", post(update_handler))
        .route("/status", get(status_handler))
        .route("/switch", post(switch_handler))
        .route("/nodes", get(nodes_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct TriggerResponse {
    status: TriggerOutcome,
    message: &'static str,
    timestamp: String,
}

async fn update_handler(State(state): State<AppState>) -> Json<TriggerResponse> {
    let status = state.orchestrator.trigger();
    let message = match status {
        TriggerOutcome::Accepted => "update started, poll /status for progress",
        TriggerOutcome::Busy => "an update is already running, try again later",
    };
    Json(TriggerResponse {
        status,
        message,
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn status_handler(State(state): State<AppState>) -> Json<UpdateState> {
    Json(state.orchestrator.status())
}

#[derive(Debug, Deserialize)]
struct SwitchRequest {
    #[serde(default, alias = "node")]
    target: Option<String>,
    #[serde(default = "default_group")]
    group: String,
}

#[derive(Debug, Serialize)]
struct SwitchResponse {
    status: &'static str,
    message: String,
    target: String,
    group: String,
}

async fn switch_handler(
    State(state): State<AppState>,
    body: Result<Json<SwitchRequest>, JsonRejection>,
) -> Result<Json<SwitchResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let target = request
        .target
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("field 'target' is required".to_string()))?;

    state.engine.switch(&request.group, &target).await?;

    Ok(Json(SwitchResponse {
        status: "ok",
        message: format!("switched to {target}"),
        target,
        group: request.group,
    }))
}

#[derive(Debug, Deserialize)]
struct NodesQuery {
    #[serde(default = "default_group")]
    group: String,
}

async fn nodes_handler(
    State(state): State<AppState>,
    Query(query): Query<NodesQuery>,
) -> Result<Json<NodeListing>, ApiError> {
    let listing = state.engine.list_nodes(&query.group).await?;
    info!(group = %listing.group, total = listing.total, "listed nodes");
    Ok(Json(listing))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    control_surface: &'static str,
    engine: &'static str,
    engine_version: Option<String>,
    timestamp: String,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let (engine, engine_version) = match state.engine.version().await {
        Ok(version) => ("ok", Some(version)),
        Err(e) => {
            warn!(error = %e, "engine health check failed");
            ("unreachable", None)
        }
    };
    Json(HealthResponse {
        control_surface: "ok",
        engine,
        engine_version,
        timestamp: Utc::now().to_rfc3339(),
    })
}
