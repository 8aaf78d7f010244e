//! HTTP trigger: `POST /companies/:company/analyze` runs the pipeline over
//! `<input_dir>/<company>.csv` and answers with the resulting table.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use color_eyre::eyre::{Result, eyre};
use joblens_core::{AnalyzeConfig, Analyzer, SilentProgress, default_output_path};
use joblens_shared::{AppConfig, JobLensError};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

pub(crate) struct AppState {
    config: AppConfig,
    analyzer: Analyzer,
    input_dir: PathBuf,
    output_dir: PathBuf,
    /// One pipeline run at a time; concurrent requests queue here.
    run_lock: Mutex<()>,
}

impl AppState {
    pub(crate) fn new(config: AppConfig, analyzer: Analyzer) -> Self {
        let input_dir = PathBuf::from(&config.server.input_dir);
        let output_dir = PathBuf::from(&config.defaults.output_dir);
        Self {
            config,
            analyzer,
            input_dir,
            output_dir,
            run_lock: Mutex::new(()),
        }
    }
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/companies/:company/analyze", post(analyze_company))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub(crate) async fn serve(config: AppConfig, analyzer: Analyzer) -> Result<()> {
    let addr = config.server.bind.clone();
    let state = Arc::new(AppState::new(config, analyzer));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| eyre!("failed to bind {addr}: {e}"))?;

    info!(
        %addr,
        input_dir = %state.input_dir.display(),
        output_dir = %state.output_dir.display(),
        "analyze trigger listening"
    );
    println!("Listening on http://{addr}");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[instrument(skip_all, fields(company = %company))]
async fn analyze_company(
    State(state): State<Arc<AppState>>,
    Path(company): Path<String>,
) -> std::result::Result<Response, ApiError> {
    if !is_valid_company(&company) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("invalid company name '{company}'"),
        ));
    }

    let input = state.input_dir.join(format!("{company}.csv"));
    if !input.is_file() {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("no job table for company '{company}'"),
        ));
    }
    let output = default_output_path(&input, &state.output_dir);

    let _run = state.run_lock.lock().await;
    let config = AnalyzeConfig::new(&input, &output, &state.config);
    let result = state.analyzer.analyze(&config, &SilentProgress).await?;

    let bytes = tokio::fs::read(&result.output)
        .await
        .map_err(|e| ApiError::from(JobLensError::io(&result.output, e)))?;

    info!(rows = result.rows, bytes = bytes.len(), "analysis served");

    let file_name = result
        .output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{company}-analysis.csv"));

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Company names map onto file names, so only a conservative charset is allowed.
fn is_valid_company(company: &str) -> bool {
    !company.is_empty()
        && company
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<JobLensError> for ApiError {
    fn from(err: JobLensError) -> Self {
        let status = match &err {
            JobLensError::MissingColumn { .. } | JobLensError::Validation { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            JobLensError::ResourceBusy { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "analyze request failed");
        } else {
            warn!(status = %self.status, error = %self.message, "analyze request rejected");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
