//! JSON HTTP server.
//!
//! Exposes search and project listing to browser front ends. The server is
//! stateless across requests; every call builds its own GitLab client from
//! the loaded configuration.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/projects` | Projects visible to the token |
//! | `POST` | `/search` | Multi-project search |
//! | `POST` | `/projects/{id}/search` | Search a single project |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Search term is required." } }
//! ```
//!
//! Error codes: `bad_request` (400), `configuration` (500), `internal` (500),
//! `upstream` (502). `GET /projects` keeps its listing shape on failure and
//! adds the same `error` object next to an empty `projects` array.
//!
//! Per-project failures during a search are not HTTP errors; they are
//! reported in the `errors` array of a `200` response.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::aggregate::search_projects;
use crate::config::Config;
use crate::error::SearchError;
use crate::models::{ErrorDetail, ProjectListResponse, SearchRequest, SearchResponse, Source};
use crate::projects::project_listing;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Build the router without binding a socket.
pub fn router(config: Config) -> Router {
    let state = AppState {
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/projects", get(handle_projects))
        .route("/search", post(handle_search))
        .route("/projects/{id}/search", post(handle_project_search))
        .layer(cors)
        .with_state(state)
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(config.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Search server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        let (status, code) = match err {
            SearchError::Validation(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            SearchError::Configuration => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
            SearchError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /projects ============

async fn handle_projects(State(state): State<AppState>) -> (StatusCode, Json<ProjectListResponse>) {
    let listing = project_listing(&state.config).await;
    let status = match listing.error.as_ref().map(|e| e.code.as_str()) {
        None => StatusCode::OK,
        Some("upstream") => StatusCode::BAD_GATEWAY,
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(listing))
}

// ============ POST /search ============

async fn handle_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(request) = payload?;
    let response = search_projects(&state.config, request).await?;
    Ok(Json(response))
}

// ============ POST /projects/{id}/search ============

/// Body of the single-project search; the project comes from the path.
#[derive(Deserialize)]
struct ProjectSearchBody {
    #[serde(default)]
    search_term: String,
    #[serde(default = "SearchRequest::default_sources")]
    sources: Vec<Source>,
}

async fn handle_project_search(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ProjectSearchBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Path(id) = id?;
    let Json(body) = payload?;
    let request = SearchRequest {
        search_term: body.search_term,
        project_ids: vec![id],
        sources: body.sources,
    };
    let response = search_projects(&state.config, request).await?;
    Ok(Json(response))
}
