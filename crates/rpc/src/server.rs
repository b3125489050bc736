use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::PrometheusHandle;
use salescast_forecast_core::{PredictError, PredictionService, VERSION};
use salescast_types::{PredictionRequest, PredictionResult};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

pub const PREDICT_REQUESTS_TOTAL: &str = "salescast_predict_requests_total";
pub const PREDICT_RECORDS_TOTAL: &str = "salescast_predict_records_total";
pub const PREDICT_REJECTED_TOTAL: &str = "salescast_predict_rejected_total";

pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Commit this crate was built from, embedded by `build.rs`
pub const GIT_COMMIT: Option<&str> = option_env!("SALESCAST_GIT_COMMIT");

/// Register descriptions for the counters this server emits.
pub fn describe_metrics() {
    describe_counter!(PREDICT_REQUESTS_TOTAL, "Prediction batches received");
    describe_counter!(PREDICT_RECORDS_TOTAL, "Prediction records received");
    describe_counter!(
        PREDICT_REJECTED_TOTAL,
        "Prediction batches rejected as invalid"
    );
}

#[derive(Clone)]
pub struct AppState {
    pub service: PredictionService,
    pub start_time: Instant,
    pub req_count: Arc<AtomicUsize>,
    pub metrics: Option<PrometheusHandle>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(service: PredictionService) -> Self {
        Self {
            service,
            start_time: Instant::now(),
            req_count: Arc::new(AtomicUsize::new(0)),
            metrics: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    fn record_request(&self) -> u64 {
        self.req_count.fetch_add(1, Ordering::Relaxed) as u64 + 1
    }

    fn request_total(&self) -> u64 {
        self.req_count.load(Ordering::Relaxed) as u64
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    req_total: u64,
    max_batch_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    field: Option<String>,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
            field: None,
        }
    }

    fn with_field<S: Into<String>>(mut self, field: S) -> Self {
        self.field = Some(field.into());
        self
    }

    fn unprocessable<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn service_unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorResponse {
            error: self.message,
            field: self.field,
        });
        (self.status, payload).into_response()
    }
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        let message = err.to_string();
        match err {
            PredictError::Validation { source, .. } => {
                ApiError::unprocessable(message).with_field(source.field())
            }
            PredictError::JoinMiss { .. } => ApiError::unprocessable(message).with_field("Store"),
            PredictError::UnknownCategory { column, .. } => {
                ApiError::unprocessable(message).with_field(column)
            }
            PredictError::BatchTooLarge { .. } => ApiError::unprocessable(message),
            PredictError::NotReady(_) => ApiError::service_unavailable(message),
            PredictError::Model(_) | PredictError::Internal(_) => ApiError::internal(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(rejection.status(), rejection.body_text())
    }
}

/// Serve until `shutdown` resolves.
pub async fn start_server<F>(state: AppState, addr: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shared = Arc::new(state);
    let app = build_router(shared);
    let listener = bind_listener(addr).await?;
    if let Ok(local) = listener.local_addr() {
        info!("RPC server listening on {}", local);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("RPC server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind RPC listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind RPC listener on {addr}"))
    }
}

pub fn build_router(state: SharedState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/predict", post(handle_predict))
        .route("/health", get(handle_health))
        .route("/version", get(handle_version))
        .route("/metrics", get(handle_metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_predict(
    State(state): State<SharedState>,
    payload: Result<Json<Vec<PredictionRequest>>, JsonRejection>,
) -> Result<Json<Vec<PredictionResult>>, ApiError> {
    state.record_request();
    counter!(PREDICT_REQUESTS_TOTAL).increment(1);

    let Json(batch) = payload.map_err(|rejection| {
        counter!(PREDICT_REJECTED_TOTAL).increment(1);
        warn!("Rejected undecodable prediction batch: {}", rejection);
        ApiError::from(rejection)
    })?;
    counter!(PREDICT_RECORDS_TOTAL).increment(batch.len() as u64);

    let service = state.service.clone();
    let records = batch.len();
    let outcome = tokio::task::spawn_blocking(move || service.predict(&batch))
        .await
        .map_err(|err| ApiError::internal(format!("prediction task failed: {err}")))?;

    match outcome {
        Ok(results) => {
            debug!(records, results = results.len(), "prediction batch served");
            Ok(Json(results))
        }
        Err(err) => {
            if err.is_client_error() {
                counter!(PREDICT_REJECTED_TOTAL).increment(1);
                warn!("Rejected prediction batch: {}", err);
            } else {
                error!("Prediction batch failed: {}", err);
            }
            Err(ApiError::from(err))
        }
    }
}

async fn handle_health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let req_total = state.record_request();
    let context = state.service.context();

    let response = HealthResponse {
        status: if context.is_some() { "ready" } else { "unready" },
        version: VERSION,
        uptime_secs: state.uptime_seconds(),
        req_total,
        max_batch_size: state.service.max_batch_size(),
        model_hash: context.map(|ctx| ctx.model_hash().to_string()),
        store_count: context.map(|ctx| ctx.store_count()),
        reason: state.service.unready_reason().map(str::to_string),
    };

    let status = if context.is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

async fn handle_version(State(state): State<SharedState>) -> Json<VersionResponse> {
    state.record_request();
    Json(VersionResponse {
        name: "salescast",
        version: VERSION,
        commit: GIT_COMMIT,
    })
}

async fn handle_metrics(State(state): State<SharedState>) -> Response {
    let body = match &state.metrics {
        Some(handle) => handle.render(),
        None => render_fallback_metrics(&state),
    };

    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

/// Minimal exposition used when no Prometheus recorder is installed.
fn render_fallback_metrics(state: &AppState) -> String {
    let req_total = state.request_total();
    let uptime = state.uptime_seconds();
    let ready = u8::from(state.service.is_ready());

    let mut metrics =
        "# HELP salescast_http_requests_total Total number of HTTP requests handled\n".to_string();
    metrics.push_str("# TYPE salescast_http_requests_total counter\n");
    metrics.push_str(&format!("salescast_http_requests_total {req_total}\n"));
    metrics.push_str("# HELP salescast_uptime_seconds Uptime of the service in seconds\n");
    metrics.push_str("# TYPE salescast_uptime_seconds gauge\n");
    metrics.push_str(&format!("salescast_uptime_seconds {uptime}\n"));
    metrics.push_str("# HELP salescast_ready Whether the prediction artifacts are loaded\n");
    metrics.push_str("# TYPE salescast_ready gauge\n");
    metrics.push_str(&format!("salescast_ready {ready}\n"));
    metrics
}
