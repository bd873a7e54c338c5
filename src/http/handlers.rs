//! Route handlers for the fortune endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::error::FortuneError;
use crate::fortune::{FortuneBackend, FortuneOptions, FortuneResponse, SearchResponse};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Source of fortunes
    pub backend: Arc<dyn FortuneBackend>,
}

impl AppState {
    /// Create handler state around a backend.
    pub fn new(backend: Arc<dyn FortuneBackend>) -> Self {
        Self { backend }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short summary of what failed
    pub error: String,
    /// Details, when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An error that renders as a JSON response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, error: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.to_string(),
                message: Some(message.into()),
            },
        }
    }

    /// A 400 response.
    pub fn bad_request(error: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, message)
    }

    /// A 500 response describing a backend failure.
    pub fn internal(error: &str, source: &FortuneError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error, source.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Query parameters accepted by the fortune endpoints.
///
/// Flags are only enabled by the literal value `true`; lists are
/// comma-separated. When a key repeats, its first value is used.
#[derive(Debug, Default)]
pub struct FortuneQuery {
    all: Option<String>,
    show_cookie: Option<String>,
    equal: Option<String>,
    long: Option<String>,
    short: Option<String>,
    ignore_case: Option<String>,
    wait: Option<String>,
    length: Option<String>,
    pattern: Option<String>,
    files: Option<String>,
    percentages: Option<String>,
}

impl FortuneQuery {
    /// Collect the known parameters from raw query pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut query = Self::default();

        for (key, value) in pairs {
            let slot = match key.as_str() {
                "all" => &mut query.all,
                "show_cookie" => &mut query.show_cookie,
                "equal" => &mut query.equal,
                "long" => &mut query.long,
                "short" => &mut query.short,
                "ignore_case" => &mut query.ignore_case,
                "wait" => &mut query.wait,
                "length" => &mut query.length,
                "pattern" => &mut query.pattern,
                "files" => &mut query.files,
                "percentages" => &mut query.percentages,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        query
    }

    /// Convert the raw parameters into fortune options.
    pub fn into_options(self) -> FortuneOptions {
        fn flag(value: &Option<String>) -> bool {
            value.as_deref() == Some("true")
        }

        fn list(value: Option<String>) -> Vec<String> {
            match value.filter(|v| !v.is_empty()) {
                Some(v) => v.split(',').map(str::to_string).collect(),
                None => Vec::new(),
            }
        }

        FortuneOptions {
            all: flag(&self.all),
            show_cookie: flag(&self.show_cookie),
            equal: flag(&self.equal),
            long: flag(&self.long),
            short: flag(&self.short),
            ignore_case: flag(&self.ignore_case),
            wait: flag(&self.wait),
            length: self
                .length
                .as_deref()
                .and_then(|l| l.parse().ok())
                .unwrap_or(0),
            pattern: self.pattern.filter(|p| !p.is_empty()),
            files: list(self.files),
            percentages: list(self.percentages),
        }
    }
}

/// Response body for the file listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct FilesResponse {
    /// Available fortune files
    pub files: Vec<String>,
    /// Number of files
    pub count: usize,
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "fortune-api",
    }))
}

/// `GET /fortune`
pub async fn get_fortune(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<FortuneResponse>, ApiError> {
    let options = FortuneQuery::from_pairs(params).into_options();

    match state.backend.fortune(&options).await {
        Ok(fortune) => Ok(Json(fortune)),
        Err(e) => {
            error!(error = %e, "Failed to get fortune");
            Err(ApiError::internal("Failed to get fortune", &e))
        }
    }
}

/// `GET /fortune/files`
pub async fn list_files(State(state): State<AppState>) -> Result<Json<FilesResponse>, ApiError> {
    match state.backend.list_files().await {
        Ok(files) => {
            let count = files.len();
            Ok(Json(FilesResponse { files, count }))
        }
        Err(e) => {
            error!(error = %e, "Failed to list fortune files");
            Err(ApiError::internal("Failed to list files", &e))
        }
    }
}

/// `GET /fortune/search`
pub async fn search_fortunes(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<SearchResponse>, ApiError> {
    let options = FortuneQuery::from_pairs(params).into_options();
    let Some(pattern) = options.pattern.clone() else {
        return Err(ApiError::bad_request(
            "Missing required parameter",
            "pattern parameter is required",
        ));
    };

    match state.backend.search(&pattern, options).await {
        Ok(results) => Ok(Json(results)),
        Err(e) => {
            error!(error = %e, pattern = %pattern, "Failed to search fortunes");
            Err(ApiError::internal("Search failed", &e))
        }
    }
}
