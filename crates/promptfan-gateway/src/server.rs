use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use promptfan_core::GenerationRequest;
use promptfan_engine::BatchOrchestrator;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared application state.
pub struct AppState {
    pub orchestrator: Arc<BatchOrchestrator>,
}

/// The HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Router serving `POST /generate` and `GET /health`.
    pub fn build(orchestrator: Arc<BatchOrchestrator>) -> Router {
        let state = Arc::new(AppState { orchestrator });

        Router::new()
            .route("/generate", post(generate_handler))
            .route("/health", get(health_handler))
            .with_state(state)
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": "promptfan"}))
}

/// `POST /generate`
///
/// The body is parsed by hand so that a malformed payload maps to 400 with
/// the parser message instead of axum's extractor rejection.
async fn generate_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: GenerationRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Rejected malformed generate request");
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    info!(parallel = request.parallel, "Generate request accepted");

    match state.orchestrator.run(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!(error = %e, "Batch failed before any attempt ran");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            )
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}
