//! HTTP surface for the report service.
//!
//! ### API Endpoints
//! - `GET  /api/reports` - list reports, newest first
//! - `POST /api/reports` - create a report definition
//! - `GET  /api/reports/:id` - report detail with owner
//! - `POST /api/reports/:id/generate` - synthesize and store data, returns a preview
//! - `GET  /api/reports/:id/data` - latest generated data
//! - `POST /api/reports/:id/email` - mail the latest data as CSV
//! - `GET  /api/reports/download/:id` - latest data as a CSV download
//! - `GET  /health` - liveness

use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateReportResponse, EmailReportPayload, GenerateReportResponse, MessageResponse, NewReport, ReportDetail,
    ReportSummary, Row,
};
use crate::service::ReportService;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, instrument, warn};

#[derive(Clone)]
pub struct AppState {
    service: Arc<ReportService>,
    started_at: Instant,
}

impl AppState {
    pub fn new(service: Arc<ReportService>) -> Self {
        Self {
            service,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Error carried back to the client as `{ "message": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Maps a service error; server-side failures are logged and reported
    /// with the operation's generic `failure` message.
    fn from_app(error: AppError, failure: &str) -> Self {
        let status = match &error {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Precondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Io(_) | AppError::Mail(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %error, "{}", failure);
            return Self {
                status,
                message: failure.to_string(),
            };
        }

        warn!(status = status.as_u16(), error = %error, "request rejected");
        Self {
            status,
            message: error.client_message().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(MessageResponse { message: self.message })).into_response()
    }
}

/// Unwraps a JSON body, turning axum's plain-text rejection into a 400
/// `{ "message": ... }` response.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        let message = rejection.body_text();
        warn!(status = rejection.status().as_u16(), error = %message, "malformed request body");
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    })
}

/// Runs a blocking service call off the async runtime.
async fn run_blocking<T, F>(state: &AppState, failure: &'static str, job: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ReportService) -> AppResult<T> + Send + 'static,
{
    let service = state.service.clone();
    tokio::task::spawn_blocking(move || job(&service))
        .await
        .map_err(|join_error| ApiError::from_app(AppError::Internal(join_error.to_string()), failure))?
        .map_err(|error| ApiError::from_app(error, failure))
}

#[instrument(skip(state))]
async fn handle_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

#[instrument(skip(state))]
async fn handle_list_reports(State(state): State<AppState>) -> Result<Json<Vec<ReportSummary>>, ApiError> {
    run_blocking(&state, "Failed to fetch reports", |service| service.list_reports())
        .await
        .map(Json)
}

#[instrument(skip(state, payload))]
async fn handle_create_report(
    State(state): State<AppState>,
    payload: Result<Json<NewReport>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateReportResponse>), ApiError> {
    let payload = json_body(payload)?;
    let created = run_blocking(&state, "Failed to create report", move |service| {
        service.create_report(payload)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state))]
async fn handle_get_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<Json<ReportDetail>, ApiError> {
    run_blocking(&state, "Failed to fetch report", move |service| service.get_report(&report_id))
        .await
        .map(Json)
}

#[instrument(skip(state))]
async fn handle_generate_report_data(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<Json<GenerateReportResponse>, ApiError> {
    run_blocking(&state, "Failed to generate report data", move |service| {
        service.generate_report_data(&report_id)
    })
    .await
    .map(Json)
}

#[instrument(skip(state))]
async fn handle_get_report_data(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<Json<Vec<Row>>, ApiError> {
    run_blocking(&state, "Failed to fetch report data", move |service| {
        service.get_report_data(&report_id)
    })
    .await
    .map(Json)
}

#[instrument(skip(state, payload))]
async fn handle_email_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    payload: Result<Json<EmailReportPayload>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let payload = json_body(payload)?;
    run_blocking(&state, "Failed to email report", move |service| {
        service.email_report(&report_id, &payload.email)
    })
    .await?;
    Ok(Json(MessageResponse {
        message: "Report sent successfully".to_string(),
    }))
}

#[instrument(skip(state))]
async fn handle_download_report_csv(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<Response, ApiError> {
    let export = run_blocking(&state, "Failed to download report CSV", move |service| {
        service.download_report_csv(&report_id)
    })
    .await?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", export.file_name),
        ),
    ];
    Ok((headers, export.bytes).into_response())
}

pub fn build_router(service: Arc<ReportService>) -> Router {
    let reports = Router::new()
        .route("/", get(handle_list_reports).post(handle_create_report))
        .route("/download/:id", get(handle_download_report_csv))
        .route("/:id", get(handle_get_report))
        .route("/:id/generate", post(handle_generate_report_data))
        .route("/:id/data", get(handle_get_report_data))
        .route("/:id/email", post(handle_email_report));

    Router::new()
        .route("/health", get(handle_health_check))
        .nest("/api/reports", reports)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(service))
}

#[cfg(test)]
mod tests {
    use super::{build_router, HealthResponse};
    use crate::config::ServiceSettings;
    use crate::db::DocumentStore;
    use crate::mailer::SpoolMailer;
    use crate::models::{CreateReportResponse, GenerateReportResponse, MessageResponse, ReportDetail, ReportSummary, Row};
    use crate::service::ReportService;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_router(outbox: &std::path::Path) -> Router {
        let store = Arc::new(DocumentStore::in_memory().expect("store"));
        let mailer = Arc::new(SpoolMailer::new(outbox));
        let service = ReportService::new(store, mailer, ServiceSettings::default());
        build_router(Arc::new(service))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn create_report(app: &Router, name: &str, metrics: &[&str]) -> String {
        let (status, body) = send(
            app,
            json_request("POST", "/api/reports", serde_json::json!({ "name": name, "metrics": metrics })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created: CreateReportResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(created.message, "Report created successfully");
        created.id
    }

    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_router(dir.path());
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "healthy");
    }

    #[tokio::test]
    async fn test_create_list_and_get_report() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_router(dir.path());
        let id = create_report(&app, "Scores", &["Score", "Max Score"]).await;

        let (status, body) = send(&app, get("/api/reports")).await;
        assert_eq!(status, StatusCode::OK);
        let reports: Vec<ReportSummary> = serde_json::from_slice(&body).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].report.id, id);

        let (status, body) = send(&app, get(&format!("/api/reports/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        let detail: ReportDetail = serde_json::from_slice(&body).unwrap();
        assert_eq!(detail.report.metrics, vec!["Score".to_string(), "Max Score".to_string()]);
        assert!(detail.user_email.is_none());
    }

    #[tokio::test]
    async fn test_unknown_report_returns_not_found_message() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_router(dir.path());
        let (status, body) = send(&app, get("/api/reports/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: MessageResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.message, "Report not found");

        let (status, _) = send(&app, json_request("POST", "/api/reports/missing/generate", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generate_then_fetch_and_download() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_router(dir.path());
        let id = create_report(&app, "Login audit", &["Master-O ID", "Login Status", "Last Login Date"]).await;

        let (status, _) = send(&app, get(&format!("/api/reports/{id}/data"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app,
            json_request("POST", &format!("/api/reports/{id}/generate"), serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let generated: GenerateReportResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(generated.data.len(), 10);

        let (status, body) = send(&app, get(&format!("/api/reports/{id}/data"))).await;
        assert_eq!(status, StatusCode::OK);
        let rows: Vec<Row> = serde_json::from_slice(&body).unwrap();
        assert_eq!(rows.len(), 100);
        assert_eq!(&rows[..10], generated.data.as_slice());

        let response = app
            .clone()
            .oneshot(get(&format!("/api/reports/download/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=Login_audit.csv"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(text.lines().next(), Some("Master-O ID,Login Status,Last Login Date"));
        assert_eq!(text.lines().count(), 101);
    }

    #[tokio::test]
    async fn test_email_spools_message_and_validates_recipient() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = dir.path().join("outbox");
        let app = create_test_router(&outbox);
        let id = create_report(&app, "Weekly", &["Score"]).await;

        let (status, body) = send(
            &app,
            json_request("POST", &format!("/api/reports/{id}/email"), serde_json::json!({ "email": "x@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: MessageResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.message, "Report data not found");

        send(&app, json_request("POST", &format!("/api/reports/{id}/generate"), serde_json::json!({}))).await;

        let (status, _) = send(
            &app,
            json_request("POST", &format!("/api/reports/{id}/email"), serde_json::json!({ "email": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            json_request("POST", &format!("/api/reports/{id}/email"), serde_json::json!({ "email": "x@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let sent: MessageResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(sent.message, "Report sent successfully");
        assert_eq!(std::fs::read_dir(&outbox).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_bodies_return_json_messages() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_router(dir.path());

        let (status, body) = send(&app, json_request("POST", "/api/reports", serde_json::json!({ "name": "x" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: MessageResponse = serde_json::from_slice(&body).unwrap();
        assert!(error.message.contains("metrics"));

        let request = Request::builder()
            .method("POST")
            .uri("/api/reports")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: MessageResponse = serde_json::from_slice(&body).unwrap();
        assert!(!error.message.is_empty());

        let id = create_report(&app, "Weekly", &["Score"]).await;
        let (status, body) = send(
            &app,
            json_request("POST", &format!("/api/reports/{id}/email"), serde_json::json!({ "address": "x@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: MessageResponse = serde_json::from_slice(&body).unwrap();
        assert!(error.message.contains("email"));
    }

    #[tokio::test]
    async fn test_blank_report_name_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_router(dir.path());
        let (status, _) = send(
            &app,
            json_request("POST", "/api/reports", serde_json::json!({ "name": " ", "metrics": ["Score"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
