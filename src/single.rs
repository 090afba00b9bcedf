//! Single-item flow: preview metadata, download one URL, list what landed on
//! disk.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::failure::{FailureReason, FetchError};
use crate::files::{SavedFile, list_matching};
use crate::format::{DownloadRequest, Selection};
use crate::media::MediaInfo;
use crate::options::{AudioSettings, DownloadOptions, single_template};
use crate::progress::ProgressObserver;
use crate::sanitize::output_stem;
use crate::ytdlp::MediaBackend;

#[derive(Debug, Clone)]
pub struct SingleReport {
    pub info: MediaInfo,
    pub selection: Selection,
    pub stem: String,
    pub saved: Option<PathBuf>,
    /// Files in the output directory whose name contains `stem`.
    pub files: Vec<SavedFile>,
}

#[derive(Debug, Error)]
pub enum SingleError {
    #[error("Failed to fetch video information: {0}")]
    Metadata(#[source] FetchError),
    /// The preview succeeded, so the page can still show it next to the error.
    #[error("An error occurred: {error}")]
    Download {
        info: Box<MediaInfo>,
        selection: Selection,
        #[source]
        error: FetchError,
    },
}

impl SingleError {
    pub fn reason(&self) -> FailureReason {
        match self {
            SingleError::Metadata(error) | SingleError::Download { error, .. } => error.reason(),
        }
    }

    pub fn hint(&self) -> &'static str {
        self.reason().hint()
    }

    pub fn preview(&self) -> Option<&MediaInfo> {
        match self {
            SingleError::Metadata(_) => None,
            SingleError::Download { info, .. } => Some(info.as_ref()),
        }
    }
}

pub struct SingleDownloader<'a, B: MediaBackend + ?Sized> {
    backend: &'a B,
    output_dir: &'a Path,
    audio: &'a AudioSettings,
}

impl<'a, B: MediaBackend + ?Sized> SingleDownloader<'a, B> {
    pub fn new(backend: &'a B, output_dir: &'a Path, audio: &'a AudioSettings) -> Self {
        Self {
            backend,
            output_dir,
            audio,
        }
    }

    /// Metadata only; nothing is written.
    pub fn preview(&self, url: &str) -> Result<MediaInfo, FetchError> {
        self.backend.fetch_metadata(url)
    }

    pub fn run(
        &self,
        request: &DownloadRequest,
        observer: &mut dyn ProgressObserver,
    ) -> Result<SingleReport, SingleError> {
        let info = self.preview(&request.url).map_err(SingleError::Metadata)?;
        self.download(info, request, observer)
    }

    /// Downloads an already previewed item.
    pub fn download(
        &self,
        info: MediaInfo,
        request: &DownloadRequest,
        observer: &mut dyn ProgressObserver,
    ) -> Result<SingleReport, SingleError> {
        let selection = request.selection();
        let stem = output_stem(info.display_title(), info.fallback_stem());
        let options = DownloadOptions::for_request(
            &selection,
            request.container,
            single_template(self.output_dir, &stem),
            self.audio,
        );

        info!(
            url = %request.url,
            selector = %selection.selector,
            stem = %stem,
            "downloading single item"
        );
        let outcome = match self.backend.download(&request.url, &options, observer) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(url = %request.url, reason = ?error.reason(), "download failed: {error}");
                return Err(SingleError::Download {
                    info: Box::new(info),
                    selection,
                    error,
                });
            }
        };

        let files = list_matching(self.output_dir, &stem).unwrap_or_else(|err| {
            warn!("could not list {}: {err:#}", self.output_dir.display());
            Vec::new()
        });

        Ok(SingleReport {
            info,
            selection,
            stem,
            saved: outcome.saved,
            files,
        })
    }
}
