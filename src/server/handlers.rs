// HTTP request handlers

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use tokio_util::io::StreamReader;

use super::ScanServer;
use crate::clamd::ClamdError;
use crate::scan::{Outcome, ScanError};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Create the main application router
pub fn create_router(server: Arc<ScanServer>) -> Router {
    let body_limit = server.config().max_upload_bytes;

    Router::new()
        .route("/", get(home))
        .route("/scan", post(scan))
        .route("/scanPath", get(scan_path))
        .route("/metrics", get(metrics_endpoint))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(server)
}

/// Serialize `value` as the JSON response body
fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response, AppError> {
    let body = serde_json::to_vec(value)
        .map_err(|e| AppError::internal(format!("Could not marshal JSON: {}", e)))?;
    Ok((status, [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response())
}

/// HTTP status for a single-stream verdict
pub fn outcome_status(outcome: Outcome) -> StatusCode {
    match outcome {
        Outcome::Clean => StatusCode::OK,
        Outcome::Infected => StatusCode::NOT_ACCEPTABLE,
        Outcome::Failed => StatusCode::BAD_REQUEST,
        Outcome::Malformed => StatusCode::PRECONDITION_FAILED,
        Outcome::Unrecognized => StatusCode::NOT_IMPLEMENTED,
    }
}

/// 413 when the body limit was hit, 500 for any other broken upload
fn multipart_error_status(err: &MultipartError) -> StatusCode {
    match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Same as `multipart_error_status`, for a multipart error hidden inside an I/O error
fn upload_error_status(err: &io::Error) -> StatusCode {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<MultipartError>())
        .map(multipart_error_status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Handle POST /scan - stream the first multipart file part to clamd
async fn scan(
    State(server): State<Arc<ScanServer>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let mut multipart = multipart
        .map_err(|e| AppError::internal(format!("Could not initialize reader: {}", e)))?;

    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => {
            server.metrics().observe_rejected("empty_filename");
            return Err(AppError::bad_request(ScanError::EmptyFilename.to_string()));
        }
        Err(e) => {
            return Err(AppError::new(
                multipart_error_status(&e),
                format!("Could not read file: {}", e),
            ));
        }
    };

    let filename = field.file_name().unwrap_or_default().to_string();
    let body = Box::pin(field.map_err(|e| io::Error::new(io::ErrorKind::Other, e)));
    let reader = StreamReader::new(body);

    match server.scanner().scan_upload(&filename, reader).await {
        Ok(verdict) => {
            server
                .metrics()
                .observe_scan(verdict.outcome, verdict.elapsed);
            let status = outcome_status(verdict.outcome);
            match verdict.result {
                Some(result) => json_response(status, &result),
                None => Err(AppError::new(status, "clamd returned no verdict")),
            }
        }
        Err(e) if e.is_validation() => {
            let reason = match &e {
                ScanError::EmptyFilename => "empty_filename",
                _ => "empty_payload",
            };
            server.metrics().observe_rejected(reason);
            Err(AppError::bad_request(e.to_string()))
        }
        Err(ScanError::Upload(e)) | Err(ScanError::Clamd(ClamdError::Source(e))) => Err(
            AppError::new(upload_error_status(&e), format!("Could not read file: {}", e)),
        ),
        Err(e) => {
            server.metrics().observe_daemon_error("scan");
            Err(AppError::internal(format!("Could not scan file: {}", e)))
        }
    }
}

/// Query string for /scanPath
#[derive(Debug, Deserialize)]
pub struct ScanPathQuery {
    #[serde(default)]
    pub path: Option<String>,
}

/// Handle GET /scanPath?path=... - scan a path on the daemon's filesystem
async fn scan_path(
    State(server): State<Arc<ScanServer>>,
    Query(query): Query<ScanPathQuery>,
) -> Result<Response, AppError> {
    let path = query
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::bad_request("Url Param 'path' is missing"))?;

    match server.scanner().scan_path(&path).await {
        Ok(results) => json_response(StatusCode::OK, &results),
        Err(ScanError::Clamd(e @ ClamdError::InvalidArgument(_))) => {
            Err(AppError::bad_request(format!("Could not scan file: {}", e)))
        }
        Err(e) => {
            server.metrics().observe_daemon_error("scan_path");
            Err(AppError::internal(format!("Could not scan file: {}", e)))
        }
    }
}

/// Handle GET / - clamd statistics passthrough
async fn home(State(server): State<Arc<ScanServer>>) -> Result<Response, AppError> {
    match server.scanner().client().stats().await {
        Ok(stats) => json_response(StatusCode::OK, &stats),
        Err(e) => {
            server.metrics().observe_daemon_error("stats");
            Err(AppError::internal(format!("Could not get stats: {}", e)))
        }
    }
}

/// Handle GET /metrics - Prometheus metrics endpoint
async fn metrics_endpoint(State(server): State<Arc<ScanServer>>) -> Result<Response, AppError> {
    let metrics = server.metrics();
    let body = metrics
        .render()
        .map_err(|e| AppError::internal(format!("Could not render metrics: {}", e)))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, metrics.content_type())],
        body,
    )
        .into_response())
}

/// JSON error body: `{"Error": "..."}`
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    #[serde(rename = "Error")]
    error: &'a str,
}

/// Application error wrapper for proper HTTP error responses
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "Request failed");
        } else {
            tracing::warn!(status = %self.status, error = %self.message, "Request rejected");
        }

        let body = serde_json::to_vec(&ErrorBody {
            error: &self.message,
        })
        .unwrap_or_else(|_| br#"{"Error":"internal error"}"#.to_vec());

        (self.status, [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response()
    }
}
