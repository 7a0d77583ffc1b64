//! HTTP API server.
//!
//! Request/response glue around the state store, the report log, and the
//! vision collaborator.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/health` | Health check |
//! | `POST` | `/vision/analyze` | Analyze a photo, append the result to the report log |
//! | `GET`  | `/reports/latest` | Most recent analysis report |
//! | `GET`  | `/state` | Current application state |
//! | `PUT`  | `/state` | Partial update of the application state |
//!
//! `GET /` answers with the health payload as well; the original serves a
//! static frontend there, which is out of scope here.
//!
//! # Error Contract
//!
//! Error responses carry a flat JSON body:
//!
//! ```json
//! { "error": "inventory must be an array" }
//! ```
//!
//! Model-call and response-parsing failures (500) additionally carry a
//! `detail` string for diagnosis. Validation problems map to 400, a
//! missing model credential (with mock mode off) to 501.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser
//! frontend can call the API from any host.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::{AnalysisResult, AppState, Report};
use crate::reports::ReportLog;
use crate::storage::StoreError;
use crate::store::StateStore;
use crate::vision::{self, VisionError};

pub const SERVICE_NAME: &str = "Takoyaki Vision API";

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor. Constructed once at process start; the two stores
/// carry their own locks, so `Api` itself is cheaply cloneable.
#[derive(Clone)]
pub struct Api {
    pub config: Arc<Config>,
    pub store: Arc<StateStore>,
    pub reports: Arc<ReportLog>,
}

impl Api {
    /// Builds the service object with file-backed stores under the
    /// configured data directory.
    pub fn new(config: Config) -> Self {
        let store = StateStore::json_file(config.storage.state_path());
        let reports = ReportLog::json_file(config.storage.reports_path());
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            reports: Arc::new(reports),
        }
    }
}

/// Builds the router with all route handlers and the permissive CORS
/// layer. Exposed separately from [`run_server`] so tests can mount the
/// router on an ephemeral port.
pub fn build_router(api: Api) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_health))
        .route("/api/health", get(handle_health))
        .route("/vision/analyze", post(handle_analyze))
        .route("/reports/latest", get(handle_latest_report))
        .route("/state", get(handle_get_state).put(handle_put_state))
        .layer(cors)
        .with_state(api)
}

/// Starts the HTTP server.
///
/// Seeds the default inventory on first startup, binds to the address in
/// `[server].bind`, and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let api = Api::new(config.clone());

    api.store.initialize()?;
    api.reports.initialize()?;

    if !config.vision.mock_enabled() && config.vision.api_key().is_none() {
        println!(
            "WARNING: OPENAI_API_KEY not set. Set OPENAI_API_KEY or enable MOCK_VISION=1 to use mock responses."
        );
    }

    let app = build_router(api);

    println!("{} listening on http://{}", SERVICE_NAME, bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// Internal error type that converts into an Axum HTTP response with a
/// flat `{"error": ...}` JSON body.
struct AppError {
    status: StatusCode,
    body: Value,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        body: json!({"error": message.into()}),
    }
}

/// Constructs a 500 error carrying a diagnostic detail string.
fn internal(message: &str, detail: String) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: json!({"error": message, "detail": detail}),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(message) => bad_request(message),
            // Persistence faults on the state path fail loudly.
            other => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: json!({"error": other.to_string()}),
            },
        }
    }
}

impl From<VisionError> for AppError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::InvalidImage(message) => bad_request(message),
            VisionError::Config(message) => AppError {
                status: StatusCode::NOT_IMPLEMENTED,
                body: json!({"error": message}),
            },
            VisionError::Model(detail) => internal("failed to call model", detail),
            VisionError::Schema(detail) => internal("Failed to parse model response", detail),
        }
    }
}

// ============ GET /api/health ============

/// JSON response body for `GET /api/health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    service: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
    })
}

// ============ POST /vision/analyze ============

/// Analyze-request fields, accepted as multipart (`image` file or
/// `image_base64`), urlencoded form, or JSON body.
#[derive(Default, Deserialize)]
struct AnalyzeRequest {
    image_base64: Option<String>,
    instructions: Option<String>,
}

/// Handler for `POST /vision/analyze`.
///
/// Validates the image payload, invokes the vision collaborator, and
/// appends the result to the report log before returning it. The append
/// is best-effort: a log-write failure is logged and deliberately
/// discarded so the caller still receives the successful analysis
/// (availability over durability, for the report log only). The state
/// store is never touched by this path.
async fn handle_analyze(
    State(api): State<Api>,
    req: Request,
) -> Result<Json<AnalysisResult>, AppError> {
    let request = extract_analyze_request(req).await?;

    let image_base64 = request
        .image_base64
        .ok_or_else(|| bad_request("image or image_base64 is required"))?;
    let image_base64 = vision::normalize_image_payload(&image_base64)?;

    let instructions = request
        .instructions
        .unwrap_or_else(|| vision::DEFAULT_INSTRUCTIONS.to_string());

    let result = vision::analyze(&api.config.vision, &image_base64, &instructions).await?;

    if let Err(err) = api.reports.append(&result) {
        eprintln!("Warning: failed to save report: {}", err);
    }

    Ok(Json(result))
}

/// Pulls the analyze fields out of whichever body encoding the client
/// used. An unrecognized or absent content type behaves like a request
/// with no image payload.
async fn extract_analyze_request(req: Request) -> Result<AnalyzeRequest, AppError> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| bad_request(e.to_string()))?;
        let mut request = AnalyzeRequest::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| bad_request(e.to_string()))?
        {
            match field.name() {
                Some("image") => {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| bad_request(e.to_string()))?;
                    // A raw file upload takes precedence over image_base64.
                    request.image_base64 = Some(vision::encode_image_bytes(&data));
                }
                Some("image_base64") => {
                    let text = field.text().await.map_err(|e| bad_request(e.to_string()))?;
                    request.image_base64.get_or_insert(text);
                }
                Some("instructions") => {
                    let text = field.text().await.map_err(|e| bad_request(e.to_string()))?;
                    request.instructions = Some(text);
                }
                _ => {}
            }
        }
        Ok(request)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(request) = Form::<AnalyzeRequest>::from_request(req, &())
            .await
            .map_err(|e| bad_request(e.to_string()))?;
        Ok(request)
    } else if content_type.starts_with("application/json") {
        let Json(request) = Json::<AnalyzeRequest>::from_request(req, &())
            .await
            .map_err(|e| bad_request(e.to_string()))?;
        Ok(request)
    } else {
        Ok(AnalyzeRequest::default())
    }
}

// ============ GET /reports/latest ============

async fn handle_latest_report(State(api): State<Api>) -> Result<Json<Report>, AppError> {
    match api.reports.latest()? {
        Some(report) => Ok(Json(report)),
        None => Err(AppError {
            status: StatusCode::NOT_FOUND,
            body: json!({"error": "no reports found"}),
        }),
    }
}

// ============ GET /state, PUT /state ============

async fn handle_get_state(State(api): State<Api>) -> Result<Json<AppState>, AppError> {
    Ok(Json(api.store.load()?))
}

async fn handle_put_state(
    State(api): State<Api>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AppState>, AppError> {
    let Json(payload) = body.map_err(|_| bad_request("JSON body is required"))?;
    let updated = api.store.replace(&payload)?;
    Ok(Json(updated))
}
