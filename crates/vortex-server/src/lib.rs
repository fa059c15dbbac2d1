//! HTTP surface for the vortex analysis engine.
//!
//! One POST endpoint drives the whole pipeline; everything else
//! (credential rotation, market context fusion, retries) lives in
//! `vortex-engine` behind it.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use vortex_engine::providers::providers_from_env;
use vortex_engine::{
    ConsensusFlags, EngineOptions, GeminiClient, GenerativeBackend, KeyPool, SignalEngine,
};
use vortex_models::{AnalyzeRequest, ErrorEnvelope, SuccessEnvelope, VortexConfig, ENGINE_NAME};

pub struct AppState {
    pub engine: SignalEngine,
    pub pool: Arc<KeyPool>,
}

/// Wire the engine up from configuration and the process environment
/// (credentials, provider secrets, auxiliary AI keys).
pub fn build_state(config: &VortexConfig) -> AppState {
    let pool = Arc::new(KeyPool::from_env());
    let backend = Arc::new(GeminiClient::new(
        config.engine.model.clone(),
        Duration::from_secs(config.engine.backend_timeout_seconds),
    )) as Arc<dyn GenerativeBackend>;

    let engine = SignalEngine::new(
        Arc::clone(&pool),
        backend,
        providers_from_env(),
        ConsensusFlags::from_env(),
        EngineOptions::from_config(&config.engine),
    );

    AppState { engine, pool }
}

pub fn router(state: Arc<AppState>, enable_cors: bool) -> Router {
    let mut router = Router::new()
        .route("/api/analyze", post(analyze))
        .route("/api/health", get(health))
        .with_state(state);

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.layer(TraceLayer::new_for_http())
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(_) => return failure(StatusCode::BAD_REQUEST, "Invalid JSON body"),
    };

    let prompt = match request.prompt.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => return failure(StatusCode::BAD_REQUEST, "Missing or invalid prompt"),
    };

    if let Some(image) = &request.image {
        if !is_base64_payload(image) {
            return failure(StatusCode::BAD_REQUEST, "Image must be a base64 string");
        }
    }

    match state.engine.analyze(&prompt, request.image.as_deref()).await {
        Ok(report) => (StatusCode::OK, Json(SuccessEnvelope::new(report))).into_response(),
        Err(e) => {
            error!(error = %e, "Analysis failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "engine": ENGINE_NAME,
        "keys": state.pool.status(),
    }))
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorEnvelope::new(message))).into_response()
}

/// Accept plain base64 or a `data:...;base64,` URL.
fn is_base64_payload(image: &str) -> bool {
    let payload = match image.split_once(',') {
        Some((_, payload)) => payload,
        None => image,
    };
    BASE64.decode(payload).is_ok()
}
