//! Local web front end.
//!
//! Uploads land in `<workdir>/uploads/<batch>/`, reports in
//! `<workdir>/outputs/<batch>/`. A batch is one upload, identified by a
//! UUID; every route that takes a batch id rejects anything else.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use maud::{DOCTYPE, Markup, html};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::signal;
use tolcheck::discovery::io_type_for;
use tolcheck::{
    CONFIG_FILE_NAME, ConfigEntry, ConfigFile, DEFAULT_TOLERANCE, IoType, ScanConfig, Unit,
    scan_workspace,
};
use tolcheck_report::{CheckCounts, ReportOptions};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::logging::LoggingMiddleware;
use crate::runner::{self, RunRequest};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BODY_LIMIT: usize = 100 * 1024 * 1024;

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Holds the `uploads/` and `outputs/` folders.
    pub workdir: PathBuf,
    /// Largest accepted request body, in bytes.
    pub body_limit: usize,
    /// Tolerance proposed for newly uploaded tests.
    pub default_tolerance: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            workdir: PathBuf::from("."),
            body_limit: DEFAULT_BODY_LIMIT,
            default_tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn uploads_dir(&self) -> PathBuf {
        self.workdir.join("uploads")
    }

    #[must_use]
    pub fn outputs_dir(&self) -> PathBuf {
        self.workdir.join("outputs")
    }

    /// Address a local browser should open.
    #[must_use]
    pub fn browser_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    fn upload_dir(&self, batch: Uuid) -> PathBuf {
        self.config.uploads_dir().join(batch.to_string())
    }

    fn output_dir(&self, batch: Uuid) -> PathBuf {
        self.config.outputs_dir().join(batch.to_string())
    }
}

/// A failed request, rendered as `{ "error": "..." }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    #[allow(clippy::needless_pass_by_value)]
    fn multipart(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("{err:#}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_batch(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid batch id: {raw}")))
}

/// Reduce a client-supplied file name to its last path component.
///
/// Browsers may send a full client path with either separator. Returns
/// `None` for names that would not address a file inside the batch folder.
#[must_use]
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    (!name.is_empty() && name != "." && name != "..").then(|| name.to_owned())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
}

fn content_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("html") => "text/html; charset=utf-8",
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn parse_config(body: &[u8]) -> ApiResult<ConfigFile> {
    let text = std::str::from_utf8(body)
        .map_err(|e| ApiError::bad_request(format!("Configuration is not UTF-8: {e}")))?;
    ConfigFile::from_json(text).map_err(|e| ApiError::bad_request(e.to_string()))
}

async fn remove_batch_dir(dir: &Path) -> anyhow::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to remove {}", dir.display()))),
    }
}

fn landing_page() -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "tolcheck" }
            }
            body {
                h1 { "tolcheck" }
                p { "Measurement tolerance checks with Excel and HTML reports." }
                h2 { "API" }
                ul {
                    li { code { "POST /api/upload" } " multipart field " code { "files" } }
                    li { code { "POST /api/process" } " " code { "{ batch_id, measurement_types, configs }" } }
                    li { code { "GET /download/{batch}/{file}" } }
                    li { code { "GET /view/{batch}/{file}" } }
                    li { code { "POST /api/save-config/{batch}" } }
                    li { code { "POST /api/load-config" } " multipart field " code { "file" } }
                    li { code { "POST /api/reset/{batch}" } }
                }
                p { "Version " (env!("CARGO_PKG_VERSION")) }
            }
        }
    }
}

async fn index() -> Html<String> {
    Html(landing_page().into_string())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[derive(Debug, Default)]
struct SavedUploads {
    saw_files: bool,
    names: BTreeSet<String>,
}

impl SavedUploads {
    fn count(&self, io_type: IoType) -> usize {
        self.names
            .iter()
            .filter(|n| io_type_for(Path::new(n)) == Some(io_type))
            .count()
    }
}

async fn save_uploads(multipart: &mut Multipart, dir: &Path) -> ApiResult<SavedUploads> {
    let mut saved = SavedUploads::default();
    while let Some(field) = multipart.next_field().await.map_err(ApiError::multipart)? {
        if field.name() != Some("files") {
            continue;
        }
        saved.saw_files = true;
        let Some(name) = field.file_name().and_then(sanitize_file_name) else {
            continue;
        };
        if io_type_for(Path::new(&name)).is_none() {
            debug!(file = %name, "Ignoring upload that is neither CSV nor TXT");
            continue;
        }
        let bytes = field.bytes().await.map_err(ApiError::multipart)?;
        let path = dir.join(&name);
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to store {}", path.display()))?;
        saved.names.insert(name);
    }
    Ok(saved)
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    batch_id: Uuid,
    files_count: usize,
    csv_count: usize,
    txt_count: usize,
    unit: Unit,
    /// Text files with more than one measurement type.
    measurement_types: BTreeMap<String, Vec<String>>,
    test_configs: Vec<ConfigEntry>,
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let batch = Uuid::new_v4();
    let dir = state.upload_dir(batch);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let saved = save_uploads(&mut multipart, &dir).await;
    let saved = match saved {
        Ok(saved) if !saved.names.is_empty() => saved,
        other => {
            if let Err(e) = remove_batch_dir(&dir).await {
                warn!("{e:#}");
            }
            return Err(match other {
                Err(e) => e,
                Ok(s) if s.saw_files => ApiError::bad_request("No valid CSV or TXT files found"),
                Ok(_) => ApiError::bad_request("No files provided"),
            });
        }
    };
    info!(%batch, files = saved.names.len(), "Stored upload batch");

    let workspace = tokio::task::spawn_blocking(move || scan_workspace(&ScanConfig::new(dir)))
        .await
        .context("Workspace scan task failed")??;

    Ok(Json(UploadResponse {
        success: true,
        batch_id: batch,
        files_count: saved.names.len(),
        csv_count: saved.count(IoType::Output),
        txt_count: saved.count(IoType::Input),
        unit: workspace.unit,
        measurement_types: workspace.multi_type_files(),
        test_configs: workspace
            .default_config(state.config.default_tolerance)
            .to_file()
            .configurations,
    }))
}

#[derive(Debug, Deserialize)]
struct ProcessRequest {
    batch_id: String,
    #[serde(default)]
    measurement_types: BTreeMap<String, String>,
    #[serde(default)]
    configs: Vec<ConfigEntry>,
}

#[derive(Debug, Serialize)]
struct ProcessResponse {
    success: bool,
    excel_file: String,
    html_file: Option<String>,
    total_entries: usize,
    mean_check: Option<CheckCounts>,
    sigma_check: Option<CheckCounts>,
    all_passed: bool,
}

async fn process_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<ProcessResponse>> {
    let request: ProcessRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request: {e}")))?;
    let batch = parse_batch(&request.batch_id)?;
    let input = state.upload_dir(batch);
    if !input.is_dir() {
        return Err(ApiError::bad_request("No files uploaded"));
    }

    let run_request = RunRequest {
        tolerance: state.config.default_tolerance,
        config: Some(ConfigFile {
            configurations: request.configs,
            ..ConfigFile::default()
        }),
        measurement_types: request.measurement_types,
        raw: false,
        report: ReportOptions::new(Some(state.output_dir(batch)), false),
    };
    let summary =
        tokio::task::spawn_blocking(move || runner::run(&ScanConfig::new(input), &run_request))
            .await
            .context("Processing task failed")??;
    info!(%batch, entries = summary.total_entries, "Processed batch");

    Ok(Json(ProcessResponse {
        success: true,
        excel_file: file_name(&summary.files.workbook),
        html_file: summary.files.html_report.as_deref().map(file_name),
        total_entries: summary.total_entries,
        mean_check: summary.mean_check,
        sigma_check: summary.sigma_check,
        all_passed: summary.all_passed(),
    }))
}

async fn serve_output(
    state: &AppState,
    batch: &str,
    file: &str,
    attachment: bool,
) -> ApiResult<Response> {
    let batch = parse_batch(batch)?;
    let Some(name) = sanitize_file_name(file).filter(|n| n == file) else {
        return Err(ApiError::bad_request(format!("Invalid file name: {file}")));
    };
    let path = state.output_dir(batch).join(&name);
    let Ok(bytes) = tokio::fs::read(&path).await else {
        return Err(ApiError::not_found("File not found"));
    };

    let mut response = ([(header::CONTENT_TYPE, content_type(&name))], bytes).into_response();
    if attachment
        && let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{name}\""))
    {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

async fn download(
    State(state): State<AppState>,
    axum::extract::Path((batch, file)): axum::extract::Path<(String, String)>,
) -> ApiResult<Response> {
    serve_output(&state, &batch, &file, true).await
}

async fn view(
    State(state): State<AppState>,
    axum::extract::Path((batch, file)): axum::extract::Path<(String, String)>,
) -> ApiResult<Response> {
    serve_output(&state, &batch, &file, false).await
}

async fn save_config(
    State(state): State<AppState>,
    axum::extract::Path(batch): axum::extract::Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let batch = parse_batch(&batch)?;
    let config = parse_config(&body)?;
    let dir = state.output_dir(batch);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    config
        .save(&dir.join(CONFIG_FILE_NAME))
        .context("Failed to save configuration")?;
    Ok(Json(json!({ "success": true, "filename": CONFIG_FILE_NAME })))
}

#[derive(Debug, Serialize)]
struct LoadConfigResponse {
    success: bool,
    config: ConfigFile,
}

async fn load_config(mut multipart: Multipart) -> ApiResult<Json<LoadConfigResponse>> {
    while let Some(field) = multipart.next_field().await.map_err(ApiError::multipart)? {
        if field.name() != Some("file") {
            continue;
        }
        if field.file_name().is_none_or(str::is_empty) {
            return Err(ApiError::bad_request("No file selected"));
        }
        let bytes = field.bytes().await.map_err(ApiError::multipart)?;
        let config = parse_config(&bytes)?;
        return Ok(Json(LoadConfigResponse {
            success: true,
            config,
        }));
    }
    Err(ApiError::bad_request("No file provided"))
}

async fn reset(
    State(state): State<AppState>,
    axum::extract::Path(batch): axum::extract::Path<String>,
) -> ApiResult<Json<Value>> {
    let batch = parse_batch(&batch)?;
    remove_batch_dir(&state.upload_dir(batch)).await?;
    remove_batch_dir(&state.output_dir(batch)).await?;
    info!(%batch, "Removed batch");
    Ok(Json(json!({ "success": true })))
}

/// Build the application router.
#[must_use]
pub fn router(state: AppState, verbose: u8) -> Router {
    let body_limit = state.config.body_limit;
    let logging = LoggingMiddleware::new(verbose);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/process", post(process_batch))
        .route("/api/save-config/{batch}", post(save_config))
        .route("/api/load-config", post(load_config))
        .route("/api/reset/{batch}", post(reset))
        .route("/download/{batch}/{file}", get(download))
        .route("/view/{batch}/{file}", get(view))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(move |request: Request, next: Next| {
            let logging = logging.clone();
            async move { logging.handle(request, next).await }
        }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

/// Bind and serve until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the work directory cannot be prepared, the address
/// cannot be bound, or the server fails.
pub async fn serve(config: ServerConfig, verbose: u8) -> anyhow::Result<()> {
    for dir in [config.uploads_dir(), config.outputs_dir()] {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener.local_addr()?;
    println!("Serving tolcheck on http://{local} (press Ctrl+C to stop)");
    info!(workdir = %config.workdir.display(), "Server started");

    axum::serve(listener, router(AppState::new(config), verbose))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}
