//! Immutable per-call configuration handed to the downloading collaborator.

use std::path::{Path, PathBuf};

use crate::format::{Container, Selection};
use crate::progress::{DOWNLOAD_PROGRESS_TEMPLATE, POSTPROCESS_PROGRESS_TEMPLATE};

/// Filename template used by the batch page. The title is not sanitized here;
/// yt-dlp applies its own filename rules.
pub const BATCH_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Marker printed by yt-dlp once the final file has been moved into place.
pub const SAVED_MARKER: &str = "saved:";

/// Audio extraction defaults, overridable through the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSettings {
    pub codec: String,
    pub quality: String,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            codec: "mp3".to_owned(),
            quality: "192".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    /// Re-encode the downloaded stream to an audio-only file. Needs ffmpeg.
    ExtractAudio { codec: String, quality: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub format: String,
    pub output_template: PathBuf,
    pub quiet: bool,
    pub report_progress: bool,
    pub post_processors: Vec<PostProcessor>,
}

impl DownloadOptions {
    pub fn new(format: impl Into<String>, output_template: impl Into<PathBuf>) -> Self {
        Self {
            format: format.into(),
            output_template: output_template.into(),
            quiet: true,
            report_progress: true,
            post_processors: Vec::new(),
        }
    }

    /// Options for one request: the resolved selector, the output template,
    /// and audio extraction when the container asks for it.
    pub fn for_request(
        selection: &Selection,
        container: Container,
        output_template: impl Into<PathBuf>,
        audio: &AudioSettings,
    ) -> Self {
        let options = Self::new(selection.selector.clone(), output_template);
        match container {
            Container::Video => options,
            Container::Audio => options.with_post_processor(PostProcessor::ExtractAudio {
                codec: audio.codec.clone(),
                quality: audio.quality.clone(),
            }),
        }
    }

    pub fn with_post_processor(mut self, processor: PostProcessor) -> Self {
        self.post_processors.push(processor);
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.report_progress = enabled;
        self
    }

    pub fn needs_transcoder(&self) -> bool {
        self.post_processors
            .iter()
            .any(|processor| matches!(processor, PostProcessor::ExtractAudio { .. }))
    }

    /// Renders the options as yt-dlp arguments. The URL is not included.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--format".to_owned(),
            self.format.clone(),
            "--output".to_owned(),
            self.output_template.to_string_lossy().into_owned(),
            "--no-playlist".to_owned(),
        ];

        if self.quiet {
            args.push("--quiet".to_owned());
            args.push("--no-warnings".to_owned());
        }

        if self.report_progress {
            args.extend([
                "--progress".to_owned(),
                "--newline".to_owned(),
                "--progress-template".to_owned(),
                DOWNLOAD_PROGRESS_TEMPLATE.to_owned(),
                "--progress-template".to_owned(),
                POSTPROCESS_PROGRESS_TEMPLATE.to_owned(),
            ]);
        }

        for processor in &self.post_processors {
            match processor {
                PostProcessor::ExtractAudio { codec, quality } => {
                    args.extend([
                        "--extract-audio".to_owned(),
                        "--audio-format".to_owned(),
                        codec.clone(),
                        "--audio-quality".to_owned(),
                        audio_quality_arg(quality),
                    ]);
                }
            }
        }

        args.extend([
            "--print".to_owned(),
            format!("after_move:{SAVED_MARKER}%(filepath)s"),
            "--no-simulate".to_owned(),
        ]);

        args
    }
}

/// Output template for a single download: `<dir>/<stem>.%(ext)s`.
pub fn single_template(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{stem}.%(ext)s"))
}

pub fn batch_template(output_dir: &Path) -> PathBuf {
    output_dir.join(BATCH_TEMPLATE)
}

// Numbers below 10 are VBR levels, anything larger is a bitrate in kbps.
fn audio_quality_arg(quality: &str) -> String {
    match quality.parse::<u32>() {
        Ok(value) if value >= 10 => format!("{value}K"),
        _ => quality.to_owned(),
    }
}
