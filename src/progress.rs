//! Progress reporting during blocking downloads.
//!
//! The downloading collaborator only knows about [`ProgressObserver`]; how the
//! numbers reach a screen is up to the caller. [`ProgressBoard`] is the shared
//! snapshot the dashboard polls.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::media::MediaInfo;

/// Prefix of the download progress lines we ask yt-dlp to print.
pub const DOWNLOAD_MARKER: &str = "ytdash-dl";
/// Prefix of the post-processing progress lines.
pub const POSTPROCESS_MARKER: &str = "ytdash-pp";

/// `--progress-template` value for the download stage. Unknown fields print
/// as `NA`.
pub const DOWNLOAD_PROGRESS_TEMPLATE: &str = "download:ytdash-dl %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s";
/// `--progress-template` value for the post-processing stage.
pub const POSTPROCESS_PROGRESS_TEMPLATE: &str =
    "postprocess:ytdash-pp %(progress.status)s %(progress.postprocessor)s";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Downloading,
    PostProcessing,
    Finished,
    /// A batch moved on to the item at `current` (1-based) out of `total`.
    Item {
        current: usize,
        total: usize,
        url: String,
    },
}

/// Receives progress while a blocking operation runs. `fraction` is always
/// within `0.0..=1.0`.
pub trait ProgressObserver {
    fn report(&mut self, fraction: f32, phase: Phase);
}

impl<F> ProgressObserver for F
where
    F: FnMut(f32, Phase),
{
    fn report(&mut self, fraction: f32, phase: Phase) {
        self(fraction, phase)
    }
}

/// Observer that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn report(&mut self, _fraction: f32, _phase: Phase) {}
}

/// A progress line emitted through our templates.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Download { downloaded: u64, total: Option<u64> },
    PostProcess { status: String, processor: String },
}

impl ProgressEvent {
    /// Completion fraction for download lines, `None` when the size is unknown.
    pub fn fraction(&self) -> Option<f32> {
        match self {
            ProgressEvent::Download {
                downloaded,
                total: Some(total),
            } if *total > 0 => Some(clamp_fraction(*downloaded as f32 / *total as f32)),
            _ => None,
        }
    }
}

/// Parses a line printed through [`DOWNLOAD_PROGRESS_TEMPLATE`] or
/// [`POSTPROCESS_PROGRESS_TEMPLATE`]. The exact byte total wins over the
/// estimate.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        DOWNLOAD_MARKER => {
            let downloaded = parse_bytes(parts.next()?)?;
            let total = parts.next().and_then(parse_bytes);
            let estimate = parts.next().and_then(parse_bytes);
            Some(ProgressEvent::Download {
                downloaded,
                total: total.or(estimate),
            })
        }
        POSTPROCESS_MARKER => {
            let status = parts.next()?.to_owned();
            let processor = parts.next().unwrap_or_default().to_owned();
            Some(ProgressEvent::PostProcess { status, processor })
        }
        _ => None,
    }
}

// yt-dlp prints floats for estimates and `NA` for missing values.
fn parse_bytes(raw: &str) -> Option<u64> {
    let value: f64 = raw.parse().ok()?;
    (value.is_finite() && value >= 0.0).then(|| value.round() as u64)
}

pub fn clamp_fraction(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Video details shown next to the bar while a single download runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewCard {
    pub title: String,
    pub uploader: String,
    pub duration: String,
    pub views: String,
    pub thumbnail: Option<String>,
}

impl From<&MediaInfo> for PreviewCard {
    fn from(info: &MediaInfo) -> Self {
        Self {
            title: info.display_title().to_owned(),
            uploader: info.display_uploader().to_owned(),
            duration: info.duration_text(),
            views: info.views_text(),
            thumbnail: info.thumbnail.clone(),
        }
    }
}

/// What the progress area currently shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub fraction: f32,
    pub status: String,
    pub active: bool,
    pub preview: Option<PreviewCard>,
}

/// Cloneable handle to the shared progress display.
#[derive(Debug, Clone, Default)]
pub struct ProgressBoard {
    inner: Arc<RwLock<ProgressSnapshot>>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the board for a new run.
    pub fn begin(&self, status: impl Into<String>) {
        *self.inner.write() = ProgressSnapshot {
            fraction: 0.0,
            status: status.into(),
            active: true,
            preview: None,
        };
    }

    /// Like [`begin`](Self::begin), with the video's details on display until
    /// the next run starts.
    pub fn begin_with_preview(&self, status: impl Into<String>, preview: PreviewCard) {
        *self.inner.write() = ProgressSnapshot {
            fraction: 0.0,
            status: status.into(),
            active: true,
            preview: Some(preview),
        };
    }

    pub fn finish(&self, status: impl Into<String>) {
        let mut snapshot = self.inner.write();
        snapshot.status = status.into();
        snapshot.active = false;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner.read().clone()
    }
}

impl ProgressObserver for ProgressBoard {
    fn report(&mut self, fraction: f32, phase: Phase) {
        let fraction = clamp_fraction(fraction);
        let status = match &phase {
            Phase::Downloading => format!("Downloading... {:.1}%", fraction * 100.0),
            Phase::PostProcessing => "Converting...".to_owned(),
            Phase::Finished => "Download completed!".to_owned(),
            Phase::Item {
                current,
                total,
                url,
            } => format!(
                "Processing video {current}/{total}: {}...",
                url.chars().take(50).collect::<String>()
            ),
        };
        let mut snapshot = self.inner.write();
        snapshot.fraction = fraction;
        snapshot.status = status;
    }
}
