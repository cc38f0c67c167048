//! HTTP server: the dispatch endpoints and a health probe.
use crate::dispatch::{DispatchError, Dispatcher};
use crate::validator::{self, ValidationError};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{error, info, instrument, warn};

pub const PUSH_PATH: &str = "/api/push/web-push";
pub const OUTCOMES_PATH: &str = "/api/push/web-push/outcomes";

#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Dispatcher,
}

/// Errors surfaced to HTTP callers.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request, undecodable token or failed delivery. Body is the plain-text message.
    BadRequest(String),
    InternalServerError(String),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Serialize(_) => ApiError::InternalServerError(err.to_string()),
            DispatchError::Decode { .. } | DispatchError::Delivery { .. } => {
                ApiError::BadRequest(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                warn!(%message, "rejecting push request");
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal server error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred",
                )
                    .into_response()
            }
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// All-or-nothing dispatch: `{"success": true}` only when every subscriber was reached.
#[instrument(skip_all)]
async fn send_push(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request = validator::parse_request(&body)?;
    let report = state.dispatcher.dispatch(&request).await?;
    info!(dispatch_id = %report.dispatch_id, delivered = report.delivered(), "push dispatched");
    Ok(Json(json!({ "success": true })))
}

/// Best-effort dispatch returning the per-subscriber outcomes.
#[instrument(skip_all)]
async fn send_push_outcomes(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request = validator::parse_request(&body)?;
    let report = state.dispatcher.dispatch_each(&request).await?;
    info!(
        dispatch_id = %report.dispatch_id,
        delivered = report.delivered(),
        failed = report.failed(),
        "push dispatched"
    );
    Ok(Json(json!({
        "success": report.all_delivered(),
        "dispatch_id": report.dispatch_id,
        "dispatched_at": report.dispatched_at,
        "delivered": report.delivered(),
        "failed": report.failed(),
        "outcomes": report.outcomes,
    })))
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(PUSH_PATH, post(send_push))
        .route(OUTCOMES_PATH, post(send_push_outcomes))
        .with_state(state)
}

/// Serve the API on an already-bound listener until the process exits.
pub async fn serve(listener: TcpListener, state: ApiState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "http server listening");
    }
    axum::serve(listener, router(state).into_make_service()).await
}
