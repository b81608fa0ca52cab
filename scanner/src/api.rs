use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::{future::Future, net::SocketAddr, sync::Arc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::job_manager::{JobError, JobManager, PollResponse, StatusResponse, SubmitResponse};

/// Header chứa token của tiến trình
pub const TOKEN_HEADER: &str = "x-app-token";

/// Lỗi trả về cho client
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    NotFound,
    BadRequest(String),
}

/// Body lỗi dạng `{"error": "..."}`
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "authentication error".to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "job not found".to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };
        (status, Json(ApiErrorResponse { error: message })).into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(_) => ApiError::NotFound,
        }
    }
}

/// State dùng chung cho các handler
#[derive(Clone)]
pub struct AppState {
    pub token: Arc<str>,
    pub jobs: JobManager,
}

impl AppState {
    pub fn new(token: impl Into<String>, jobs: JobManager) -> Self {
        Self {
            token: Arc::from(token.into()),
            jobs,
        }
    }

    fn authorized(&self, candidate: Option<&str>) -> bool {
        candidate.map_or(false, |token| token == &*self.token)
    }
}

/// Sinh token ngẫu nhiên 32 byte dạng hex
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    #[serde(default)]
    pub since: usize,
}

fn header_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok())
}

async fn get_token(State(state): State<AppState>) -> Json<TokenResponse> {
    Json(TokenResponse {
        token: state.token.to_string(),
    })
}

async fn check(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    let payload: Option<Value> = if body.is_empty() {
        None
    } else {
        serde_json::from_slice(&body).ok()
    };

    let body_token = payload
        .as_ref()
        .and_then(|p| p.get("token"))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty());
    if !state.authorized(body_token.or_else(|| header_token(&headers))) {
        warn!("Rejected /check with missing or wrong token");
        return Err(ApiError::Unauthorized);
    }

    let payload = payload.ok_or_else(|| ApiError::BadRequest("invalid JSON body".to_string()))?;
    let addresses = payload
        .get("addresses")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::BadRequest("addresses must be a list".to_string()))?
        .iter()
        .map(|a| a.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ApiError::BadRequest("addresses must be strings".to_string()))?;
    let include_empty = payload
        .get("include_empty")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(Json(state.jobs.submit(addresses, include_empty)))
}

async fn poll(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
    Query(query): Query<PollQuery>,
) -> Result<Json<PollResponse>, ApiError> {
    if !state.authorized(header_token(&headers)) {
        return Err(ApiError::Unauthorized);
    }
    Ok(Json(state.jobs.poll(&job_id, query.since)?))
}

async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    if !state.authorized(header_token(&headers)) {
        return Err(ApiError::Unauthorized);
    }
    Ok(Json(state.jobs.status(&job_id)?))
}

/// Router của HTTP API, mọi phản hồi đều có `Cache-Control: no-store`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/_token", get(get_token))
        .route("/check", post(check))
        .route("/jobs/:id/poll", get(poll))
        .route("/jobs/:id/status", get(status))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO)),
        )
        .with_state(state)
}

/// Chạy HTTP API tới khi `shutdown` hoàn tất
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);
    info!("API server starting on {}", addr);

    axum::Server::try_bind(&addr)?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("API server stopped");
    Ok(())
}
