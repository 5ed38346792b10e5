use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::error::ScrapeError;
use crate::pipeline::Pipeline;
use crate::query::QueryGenerator;
use crate::tasks::{TaskResult, TaskStatus, TaskStore, TaskSummary};

#[derive(OpenApi)]
#[openapi(
    paths(generate_query, trigger_search, get_search_status, list_tasks),
    components(schemas(
        SearchRequest,
        QueryResponse,
        SearchResponse,
        ErrorBody,
        TaskResult,
        TaskSummary,
        TaskStatus,
        crate::profile::Profile
    )),
    tags((name = "search", description = "Profile search"))
)]
pub struct ApiDoc;

pub struct AppState {
    pub generator: Arc<QueryGenerator>,
    pub pipeline: Pipeline,
    pub tasks: TaskStore,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequest {
    /// What to look for, in plain language.
    pub prompt: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueryResponse {
    pub query: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub task_id: Uuid,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: message.into(),
        }
    }
}

impl From<ScrapeError> for ApiError {
    fn from(e: ScrapeError) -> Self {
        let (status, code) = match &e {
            ScrapeError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ScrapeError::Llm(_) | ScrapeError::Http(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        Self {
            status,
            code,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

pub fn router(state: Arc<AppState>, static_dir: &str) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/query", post(generate_query))
        .route("/search", post(trigger_search))
        .route("/search/:task_id", get(get_search_status))
        .route("/tasks", get(list_tasks))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

fn prompt_of(payload: &SearchRequest) -> Result<String, ApiError> {
    let prompt = payload.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::bad_request("Please enter a search request."));
    }
    Ok(prompt.to_string())
}

/// Preview the search query generated for a request.
#[utoipa::path(
    post,
    path = "/query",
    tag = "search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Generated query", body = QueryResponse),
        (status = 400, description = "Empty request", body = ErrorBody),
        (status = 502, description = "Language model failed", body = ErrorBody)
    )
)]
pub async fn generate_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let prompt = prompt_of(&payload)?;
    let query = state.generator.generate(&prompt).await?;
    Ok(Json(QueryResponse { query }))
}

/// Start a search. Poll `/search/{task_id}` for progress.
#[utoipa::path(
    post,
    path = "/search",
    tag = "search",
    request_body = SearchRequest,
    responses(
        (status = 202, description = "Search started", body = SearchResponse),
        (status = 400, description = "Empty request", body = ErrorBody)
    )
)]
pub async fn trigger_search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<(StatusCode, Json<SearchResponse>), ApiError> {
    let prompt = prompt_of(&payload)?;
    let task_id = state.tasks.create(&prompt).await;
    info!("🚀 Search {} started: {}", task_id, prompt);

    let worker_state = Arc::clone(&state);
    tokio::spawn(async move {
        run_search(worker_state, task_id, prompt).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(SearchResponse {
            task_id,
            message: "Search started".to_string(),
        }),
    ))
}

async fn run_search(state: Arc<AppState>, task_id: Uuid, prompt: String) {
    let query = match state.generator.generate(&prompt).await {
        Ok(q) => q,
        Err(e) => {
            error!("Search {} failed to generate a query: {}", task_id, e);
            state.tasks.fail(task_id, e.to_string()).await;
            return;
        }
    };
    state.tasks.start_scraping(task_id, &query).await;

    let summary = state.pipeline.run(&query).await;
    info!("✅ Search {} completed with {} profiles", task_id, summary.profiles.len());
    state
        .tasks
        .complete(task_id, summary.links_found, summary.failed, summary.profiles)
        .await;
}

#[utoipa::path(
    get,
    path = "/search/{task_id}",
    tag = "search",
    params(("task_id" = Uuid, Path, description = "Task id returned by POST /search")),
    responses(
        (status = 200, description = "Task state", body = TaskResult),
        (status = 404, description = "Unknown task", body = ErrorBody)
    )
)]
pub async fn get_search_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskResult>, ApiError> {
    state
        .tasks
        .get(task_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no search with id {}", task_id)))
}

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "search",
    responses((status = 200, description = "Searches, newest first", body = [TaskSummary]))
)]
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskSummary>> {
    Json(state.tasks.list().await)
}
