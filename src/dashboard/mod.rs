//! The browser dashboard: three HTML pages, a progress endpoint the pages
//! poll while a download runs, and a route serving finished files.

pub mod pages;

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    Form, Json, Router,
    body::Body,
    extract::{Path as AxumPath, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use mime_guess::MimeGuess;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::{fs::File, signal, task};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::batch::{BatchDownloader, BatchReport, parse_url_list};
use crate::config::Settings;
use crate::files::{ensure_output_dir, resolve_in};
use crate::format::{Container, DownloadRequest, Quality};
use crate::progress::{PreviewCard, ProgressBoard, ProgressSnapshot};
use crate::single::{SingleDownloader, SingleError, SingleReport};
use crate::ytdlp::MediaBackend;

use pages::{BatchView, Choice, Notice, SingleView};

pub type SharedBackend = Arc<dyn MediaBackend + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    settings: Arc<Settings>,
    backend: SharedBackend,
    board: ProgressBoard,
    /// Held for the whole of a download so only one runs at a time.
    gate: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(settings: Settings, backend: SharedBackend) -> Self {
        Self {
            settings: Arc::new(settings),
            backend,
            board: ProgressBoard::new(),
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn board(&self) -> &ProgressBoard {
        &self.board
    }

    async fn run_single(
        &self,
        request: DownloadRequest,
    ) -> ApiResult<Result<SingleReport, SingleError>> {
        let state = self.clone();
        task::spawn_blocking(move || -> Result<Result<SingleReport, SingleError>> {
            let _running = state.gate.lock();
            ensure_output_dir(&state.settings.output_dir)?;
            let downloader = SingleDownloader::new(
                state.backend.as_ref(),
                &state.settings.output_dir,
                &state.settings.audio,
            );

            let mut board = state.board.clone();
            board.begin("Analyzing video...");
            let info = match downloader.preview(&request.url) {
                Ok(info) => info,
                Err(err) => {
                    board.finish("Failed to fetch video information!");
                    return Ok(Err(SingleError::Metadata(err)));
                }
            };

            board.begin_with_preview(
                format!("Downloading {}...", info.display_title()),
                PreviewCard::from(&info),
            );
            let result = downloader.download(info, &request, &mut board);
            board.finish(match &result {
                Ok(_) => "Download completed!",
                Err(_) => "Download failed.",
            });
            Ok(result)
        })
        .await
        .map_err(|err| ApiError::internal(format!("task join error: {err}")))?
        .map_err(|err| ApiError::internal(format!("{err:#}")))
    }

    async fn run_batch(&self, choice: Choice, urls: Vec<String>) -> ApiResult<BatchReport> {
        let state = self.clone();
        task::spawn_blocking(move || -> Result<BatchReport> {
            let _running = state.gate.lock();
            ensure_output_dir(&state.settings.output_dir)?;
            let downloader = BatchDownloader::new(
                state.backend.as_ref(),
                &state.settings.output_dir,
                &state.settings.audio,
            );

            let mut board = state.board.clone();
            board.begin(format!("Found {} video URLs.", urls.len()));
            let report = downloader.run(choice.container, choice.quality, &urls, &mut board);
            board.finish("All tasks completed!");
            Ok(report)
        })
        .await
        .map_err(|err| ApiError::internal(format!("task join error: {err}")))?
        .map_err(|err| ApiError::internal(format!("{err:#}")))
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, "{}", self.message);
        }
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct SingleForm {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub container: Container,
    #[serde(default)]
    pub quality: Quality,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchForm {
    #[serde(default)]
    pub urls: String,
    #[serde(default)]
    pub container: Container,
    #[serde(default)]
    pub quality: Quality,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/single", get(single_page).post(single_submit))
        .route("/batch", get(batch_page).post(batch_submit))
        .route("/api/progress", get(progress))
        .route("/files/{name}", get(download_file))
        .with_state(state)
}

/// Binds `addr` and serves until Ctrl+C.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("dashboard listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running dashboard server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!("failed to install Ctrl+C handler: {err}");
    }
    info!("shutting down");
}

async fn home(State(state): State<AppState>) -> Html<String> {
    Html(pages::home(&state.settings.output_dir))
}

async fn single_page(State(state): State<AppState>) -> Html<String> {
    Html(pages::single(&SingleView {
        url: "",
        choice: Choice::default(),
        output_dir: &state.settings.output_dir,
        notices: Vec::new(),
        preview: None,
        files: &[],
    }))
}

async fn single_submit(
    State(state): State<AppState>,
    Form(form): Form<SingleForm>,
) -> ApiResult<Html<String>> {
    let url = form.url.trim().to_owned();
    let choice = Choice {
        container: form.container,
        quality: form.quality,
    };
    let output_dir = state.settings.output_dir.clone();
    let page = |notices: Vec<Notice>| {
        Html(pages::single(&SingleView {
            url: &url,
            choice,
            output_dir: &output_dir,
            notices,
            preview: None,
            files: &[],
        }))
    };

    if url.is_empty() {
        return Ok(page(vec![Notice::Warning(
            "Please enter a YouTube video URL!".to_owned(),
        )]));
    }
    if !state.settings.accepts_url(&url) {
        return Ok(page(vec![Notice::Error(
            "Invalid YouTube URL! Please enter a valid YouTube link.".to_owned(),
        )]));
    }

    let request = DownloadRequest::new(url.clone(), choice.container, choice.quality);
    let result = state.run_single(request.clone()).await?;
    let html = match &result {
        Ok(report) => pages::single(&SingleView {
            url: &url,
            choice,
            output_dir: &output_dir,
            notices: vec![
                Notice::Success(format!(
                    "Format: {} - Quality: {}",
                    request.container.label(),
                    report.selection.description
                )),
                Notice::Success(format!(
                    "{} downloaded successfully!",
                    report.info.display_title()
                )),
                Notice::Info(format!(
                    "File location: {}",
                    absolute_display(report.saved.as_deref().unwrap_or(&output_dir))
                )),
            ],
            preview: Some(&report.info),
            files: &report.files,
        }),
        Err(err) => pages::single(&SingleView {
            url: &url,
            choice,
            output_dir: &output_dir,
            notices: vec![
                Notice::Error(err.to_string()),
                Notice::Warning(err.hint().to_owned()),
            ],
            preview: err.preview(),
            files: &[],
        }),
    };
    Ok(Html(html))
}

async fn batch_page(State(state): State<AppState>) -> Html<String> {
    Html(pages::batch(&BatchView {
        urls: "",
        choice: Choice::default(),
        output_dir: &state.settings.output_dir,
        notices: Vec::new(),
        report: None,
    }))
}

async fn batch_submit(
    State(state): State<AppState>,
    Form(form): Form<BatchForm>,
) -> ApiResult<Html<String>> {
    let choice = Choice {
        container: form.container,
        quality: form.quality,
    };
    let urls = parse_url_list(&form.urls);
    let output_dir = state.settings.output_dir.clone();

    if urls.is_empty() {
        return Ok(Html(pages::batch(&BatchView {
            urls: &form.urls,
            choice,
            output_dir: &output_dir,
            notices: vec![Notice::Warning(
                "No valid video URL was entered.".to_owned(),
            )],
            report: None,
        })));
    }

    let found = Notice::Info(format!("Found {} video URLs.", urls.len()));
    let report = state.run_batch(choice, urls).await?;
    let mut notices = vec![found];
    if report.tally.success_count > 0 {
        notices.push(Notice::Success(format!(
            "Download completed! {} videos were successfully downloaded.",
            report.tally.success_count
        )));
    }

    Ok(Html(pages::batch(&BatchView {
        urls: &form.urls,
        choice,
        output_dir: &output_dir,
        notices,
        report: Some(&report),
    })))
}

async fn progress(State(state): State<AppState>) -> Json<ProgressSnapshot> {
    Json(state.board.snapshot())
}

async fn download_file(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> ApiResult<Response> {
    let path = resolve_in(&state.settings.output_dir, &name)
        .ok_or_else(|| ApiError::not_found("file not found"))?;
    stream_file(path).await
}

async fn stream_file(path: PathBuf) -> ApiResult<Response> {
    let file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;

    let stream = ReaderStream::new(file);
    let mut response = Body::from_stream(stream).into_response();
    if let Some(mime) = MimeGuess::from_path(&path).first()
        && let Ok(value) = mime.to_string().parse()
    {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }

    Ok(response)
}

fn absolute_display(dir: &Path) -> String {
    std::path::absolute(dir)
        .unwrap_or_else(|_| dir.to_path_buf())
        .display()
        .to_string()
}
