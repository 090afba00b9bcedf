//! The downloading collaborator: a thin wrapper around the `yt-dlp` binary.
//!
//! Every call is blocking. Metadata and playlist listings capture the whole
//! output; downloads stream stdout and stderr line by line so progress can be
//! forwarded while the process runs.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;

use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::failure::{FailureReason, FetchError};
use crate::media::{FlatEntry, MediaInfo, Playlist};
use crate::options::{DownloadOptions, SAVED_MARKER};
use crate::progress::{Phase, ProgressEvent, ProgressObserver, parse_progress_line};

const DEFAULT_FFMPEG: &str = "ffmpeg";

/// What a finished download left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Final path reported by yt-dlp, when it printed one.
    pub saved: Option<PathBuf>,
}

/// Operations the page flows need from the extraction library.
pub trait MediaBackend {
    /// Reads metadata without downloading anything.
    fn fetch_metadata(&self, url: &str) -> Result<MediaInfo, FetchError>;

    /// Downloads one URL, reporting progress to `observer` as it goes.
    fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        observer: &mut dyn ProgressObserver,
    ) -> Result<DownloadOutcome, FetchError>;

    /// Lists a playlist's entries without downloading them.
    fn list_playlist(&self, url: &str) -> Result<Playlist, FetchError>;
}

#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    ffmpeg: Option<PathBuf>,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ffmpeg: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let backend = Self::new(&settings.ytdlp);
        match &settings.ffmpeg {
            Some(ffmpeg) => backend.with_ffmpeg(ffmpeg),
            None => backend,
        }
    }

    /// Uses an explicit ffmpeg binary (or directory) instead of PATH lookup.
    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = Some(ffmpeg.into());
        self
    }

    pub fn ensure_available(&self) -> Result<()> {
        ensure_program_available(&self.program, "--version")
    }

    pub fn ensure_transcoder(&self) -> Result<()> {
        let ffmpeg = self.ffmpeg_binary();
        ensure_program_available(&ffmpeg, "-version")
    }

    // `--ffmpeg-location` accepts a directory; probe the binary inside it.
    fn ffmpeg_binary(&self) -> PathBuf {
        match &self.ffmpeg {
            Some(path) if path.is_dir() => path.join(DEFAULT_FFMPEG),
            Some(path) => path.clone(),
            None => PathBuf::from(DEFAULT_FFMPEG),
        }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.stdin(Stdio::null());
        command
    }

    /// Runs yt-dlp to completion and returns stdout, or a classified failure
    /// built from stderr.
    fn run_captured(&self, args: &[&str], url: &str) -> Result<Vec<u8>, FetchError> {
        let output = self
            .command()
            .args(args)
            .arg("--")
            .arg(url)
            .output()
            .map_err(|err| {
                FetchError::launch(self.program_name(), FailureReason::MissingDownloader, err)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::failed(error_summary(
                &stderr,
                &format!("yt-dlp exited with {}", output.status),
            )));
        }

        Ok(output.stdout)
    }
}

impl MediaBackend for YtDlp {
    fn fetch_metadata(&self, url: &str) -> Result<MediaInfo, FetchError> {
        debug!(url, "fetching metadata");
        let stdout = self.run_captured(
            &[
                "--dump-single-json",
                "--skip-download",
                "--no-playlist",
                "--no-warnings",
                "--no-progress",
            ],
            url,
        )?;
        Ok(serde_json::from_slice(&stdout)?)
    }

    fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        observer: &mut dyn ProgressObserver,
    ) -> Result<DownloadOutcome, FetchError> {
        if options.needs_transcoder()
            && let Err(err) = self.ensure_transcoder()
        {
            return Err(FetchError::Failed {
                reason: FailureReason::MissingTranscoder,
                message: format!("audio conversion needs ffmpeg: {err}"),
            });
        }

        let mut command = self.command();
        command.args(options.to_args());
        if let Some(ffmpeg) = &self.ffmpeg {
            command.arg("--ffmpeg-location").arg(ffmpeg);
        }
        command
            .arg("--")
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(url, format = %options.format, "starting download");
        let mut child = command.spawn().map_err(|err| {
            FetchError::launch(self.program_name(), FailureReason::MissingDownloader, err)
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut saved = None;
        let mut error_lines = Vec::new();

        let (tx, rx) = mpsc::channel();
        thread::scope(|scope| {
            if let Some(stdout) = stdout {
                let tx = tx.clone();
                scope.spawn(move || forward_lines(stdout, Stream::Stdout, tx));
            }
            if let Some(stderr) = stderr {
                let tx = tx.clone();
                scope.spawn(move || forward_lines(stderr, Stream::Stderr, tx));
            }
            drop(tx);

            for (stream, line) in rx {
                if let Some(event) = parse_progress_line(&line) {
                    forward_event(&event, observer);
                    continue;
                }
                match stream {
                    Stream::Stdout => {
                        if let Some(path) = line.strip_prefix(SAVED_MARKER) {
                            saved = Some(PathBuf::from(path.trim()));
                        }
                    }
                    Stream::Stderr => error_lines.push(line),
                }
            }
        });

        let status = child.wait().map_err(|err| {
            FetchError::launch(self.program_name(), FailureReason::Other, err)
        })?;

        if !status.success() {
            let stderr = error_lines.join("\n");
            return Err(FetchError::failed(error_summary(
                &stderr,
                &format!("yt-dlp exited with {status}"),
            )));
        }

        observer.report(1.0, Phase::Finished);
        Ok(DownloadOutcome { saved })
    }

    fn list_playlist(&self, url: &str) -> Result<Playlist, FetchError> {
        debug!(url, "listing playlist");
        let stdout = self.run_captured(&["--flat-playlist", "--dump-json", "--no-warnings"], url)?;
        let stdout = String::from_utf8_lossy(&stdout);

        let mut title = None;
        let mut entries = Vec::new();
        for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
            let entry: FlatEntry = match serde_json::from_str(line) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping unreadable playlist entry: {err}");
                    continue;
                }
            };
            if title.is_none() {
                title = entry.playlist_name().map(str::to_owned);
            }
            if let Some(entry) = entry.into_entry() {
                entries.push(entry);
            }
        }

        Ok(Playlist {
            title: title.unwrap_or_else(|| "playlist".to_owned()),
            entries,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

fn forward_lines<R: Read>(reader: R, stream: Stream, tx: mpsc::Sender<(Stream, String)>) {
    for line in BufReader::new(reader).lines() {
        let Ok(line) = line else { break };
        if tx.send((stream, line)).is_err() {
            break;
        }
    }
}

fn forward_event(event: &ProgressEvent, observer: &mut dyn ProgressObserver) {
    match event {
        ProgressEvent::Download { .. } => {
            if let Some(fraction) = event.fraction() {
                observer.report(fraction, Phase::Downloading);
            }
        }
        ProgressEvent::PostProcess { .. } => observer.report(1.0, Phase::PostProcessing),
    }
}

/// Picks the `ERROR:` lines out of yt-dlp's stderr, falling back to the last
/// non-empty line and then to `fallback`.
fn error_summary(stderr: &str, fallback: &str) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("ERROR:"))
        .collect();
    if !errors.is_empty() {
        return errors.join("\n");
    }
    stderr
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| fallback.to_owned())
}

/// Runs `<program> <version_flag>` to fail loudly when yt-dlp or ffmpeg are
/// missing.
pub fn ensure_program_available(program: &Path, version_flag: &str) -> Result<()> {
    let status = Command::new(program)
        .arg(version_flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => bail!(
            "{} is installed but returned a failure status",
            program.display()
        ),
        Err(err) => bail!(
            "{} is not installed or not in PATH: {}",
            program.display(),
            err
        ),
    }
}
