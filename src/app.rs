use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, Request, State, rejection::JsonRejection},
    http::{Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::Utc;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::{StoreError, WorkflowError};
use crate::models::{Account, Message, Project, Record, Submission, Task};
use crate::repository::decode;
use crate::workflow::Tracker;

pub struct AppState {
    pub tracker: Tracker,
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

/// Failed request, rendered as `{"success": false, "error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match err {
            StoreError::DuplicateEmail
            | StoreError::DuplicateSubmission
            | StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let status = match err {
            WorkflowError::Store(store_err) => return store_err.into(),
            WorkflowError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::MissingField(_)
            | WorkflowError::AlreadySubmitted
            | WorkflowError::SubmissionLocked(_)
            | WorkflowError::InvalidStatusChange(_)
            | WorkflowError::InvalidAttachment(_) => StatusCode::BAD_REQUEST,
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError {
            status: match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            },
            message: rejection.body_text(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Json(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("request failed: {}", self.message);
        } else {
            warn!("request rejected ({}): {}", self.status.as_u16(), self.message);
        }
        let body = json!({ "success": false, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

/// `{"success": true, "<key>": value}`
fn envelope(key: &str, value: impl Serialize) -> ApiResult {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    body.insert(key.to_string(), serde_json::to_value(value)?);
    Ok(Json(Value::Object(body)))
}

fn success() -> ApiResult {
    Ok(Json(json!({ "success": true })))
}

/// Decode a request body into a record. The client may not choose the id.
fn record_body<T: Record>(payload: Result<Json<Value>, JsonRejection>) -> Result<T, ApiError> {
    let Json(mut value) = payload?;
    let Some(fields) = value.as_object_mut() else {
        return Err(ApiError::bad_request(format!(
            "{} body must be a JSON object",
            T::COLLECTION
        )));
    };
    fields.remove("id");
    Ok(decode(value)?)
}

fn patch_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, ApiError> {
    match payload? {
        Json(Value::Object(fields)) => Ok(fields),
        _ => Err(ApiError::bad_request("update body must be a JSON object")),
    }
}

/// Ids arrive as strings in the path; anything non-numeric matches no record.
fn parse_id(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}

/// Build the REST router, nested under `prefix` (e.g. `/make-server-local`).
pub fn router(state: Arc<AppState>, prefix: &str, max_body_bytes: usize) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/login", post(login))
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/:email", put(update_account))
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/:id", put(update_project).delete(delete_project))
        .route("/submissions", get(list_submissions).post(create_submission))
        .route(
            "/submissions/:id",
            put(update_submission).delete(delete_submission),
        )
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/:id", put(update_task))
        .route("/messages", get(list_messages).post(create_message))
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::CONTENT_LENGTH])
        .max_age(Duration::from_secs(600));

    Router::new().nest(prefix, api).layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn(log_requests))
            .layer(cors)
            .layer(DefaultBodyLimit::max(max_body_bytes)),
    )
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;
    info!(
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

/// Open the configured store, seed it and serve until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store = config.open_store()?;
    let tracker = Tracker::open(store, config.id_strategy)?;
    let state = Arc::new(AppState { tracker });
    let prefix = config.route_prefix();
    let app = router(state, &prefix, config.max_body_bytes);

    let listener = TcpListener::bind(config.addr).await?;
    info!("Listening on http://{}{}", config.addr, prefix);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down server...");
}

// ============ HANDLERS ============

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult {
    let Json(credentials) = payload?;
    let account = state
        .tracker
        .login(&credentials.email, &credentials.password)?;
    envelope("account", account)
}

async fn list_accounts(State(state): State<Arc<AppState>>) -> ApiResult {
    envelope("accounts", state.tracker.accounts.list()?)
}

async fn create_account(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let account: Account = record_body(payload)?;
    envelope("account", state.tracker.accounts.create(account)?)
}

async fn update_account(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let patch = patch_body(payload)?;
    envelope("account", state.tracker.accounts.update(&email, &patch)?)
}

async fn list_projects(State(state): State<Arc<AppState>>) -> ApiResult {
    envelope("projects", state.tracker.projects.list_active(Utc::now())?)
}

async fn create_project(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let project: Project = record_body(payload)?;
    envelope("project", state.tracker.projects.create(project)?)
}

async fn update_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let patch = patch_body(payload)?;
    let updated = match parse_id(&id) {
        Some(id) => state.tracker.projects.update(id, &patch)?,
        None => None,
    };
    envelope("project", updated)
}

async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    if let Some(id) = parse_id(&id) {
        state.tracker.projects.delete(id)?;
    }
    success()
}

async fn list_submissions(State(state): State<Arc<AppState>>) -> ApiResult {
    envelope("submissions", state.tracker.submissions.list()?)
}

async fn create_submission(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let submission: Submission = record_body(payload)?;
    envelope("submission", state.tracker.submissions.create(submission)?)
}

async fn update_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let patch = patch_body(payload)?;
    let updated = match parse_id(&id) {
        Some(id) => state.tracker.submissions.update(id, &patch)?,
        None => None,
    };
    envelope("submission", updated)
}

async fn delete_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    if let Some(id) = parse_id(&id) {
        state.tracker.submissions.delete(id)?;
    }
    success()
}

async fn list_tasks(State(state): State<Arc<AppState>>) -> ApiResult {
    envelope("tasks", state.tracker.tasks.list()?)
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let task: Task = record_body(payload)?;
    envelope("task", state.tracker.tasks.create(task)?)
}

async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let patch = patch_body(payload)?;
    let updated = match parse_id(&id) {
        Some(id) => state.tracker.tasks.update(id, &patch)?,
        None => None,
    };
    envelope("task", updated)
}

async fn list_messages(State(state): State<Arc<AppState>>) -> ApiResult {
    envelope("messages", state.tracker.messages.list()?)
}

async fn create_message(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let message: Message = record_body(payload)?;
    envelope("message", state.tracker.messages.create(message)?)
}
