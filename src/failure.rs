//! Why a fetch failed, and what to tell the user about it.

use std::io;

use serde::Serialize;
use thiserror::Error;

/// Enumerated cause of a failed metadata fetch or download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    AgeRestricted,
    Private,
    MissingTranscoder,
    MissingDownloader,
    Other,
}

impl FailureReason {
    /// Classifies yt-dlp's error output. Unmatched text is `Other`.
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        if message.contains("age-restricted") || message.contains("confirm your age") {
            FailureReason::AgeRestricted
        } else if message.contains("private") {
            FailureReason::Private
        } else if message.contains("ffmpeg") || message.contains("ffprobe") {
            FailureReason::MissingTranscoder
        } else {
            FailureReason::Other
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            FailureReason::AgeRestricted => "This video may have age restrictions.",
            FailureReason::Private => "This video may be private.",
            FailureReason::MissingTranscoder => {
                "FFmpeg is required! Please check the installation instructions."
            }
            FailureReason::MissingDownloader => {
                "yt-dlp is required! Install it and make sure it is on PATH."
            }
            FailureReason::Other => {
                "Check your internet connection or ensure the URL is correct."
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not run {program}: {source}")]
    Launch {
        program: String,
        reason: FailureReason,
        #[source]
        source: io::Error,
    },
    #[error("{message}")]
    Failed {
        reason: FailureReason,
        message: String,
    },
    #[error("unreadable yt-dlp output: {0}")]
    Output(#[from] serde_json::Error),
}

impl FetchError {
    /// Builds a failure from error text, classifying it on the way.
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        FetchError::Failed {
            reason: FailureReason::classify(&message),
            message,
        }
    }

    /// Spawn failures: a missing executable gets `missing`, anything else is
    /// `Other`.
    pub fn launch(program: impl Into<String>, missing: FailureReason, source: io::Error) -> Self {
        let reason = if source.kind() == io::ErrorKind::NotFound {
            missing
        } else {
            FailureReason::Other
        };
        FetchError::Launch {
            program: program.into(),
            reason,
            source,
        }
    }

    pub fn reason(&self) -> FailureReason {
        match self {
            FetchError::Launch { reason, .. } | FetchError::Failed { reason, .. } => *reason,
            FetchError::Output(_) => FailureReason::Other,
        }
    }

    pub fn hint(&self) -> &'static str {
        self.reason().hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_messages() {
        assert_eq!(
            FailureReason::classify(
                "ERROR: [youtube] abc: Sign in to confirm your age. This video may be inappropriate"
            ),
            FailureReason::AgeRestricted
        );
        assert_eq!(
            FailureReason::classify("This video is Age-Restricted"),
            FailureReason::AgeRestricted
        );
        assert_eq!(
            FailureReason::classify("ERROR: [youtube] abc: Private video. Sign in if you've been granted access"),
            FailureReason::Private
        );
        assert_eq!(
            FailureReason::classify("ERROR: Postprocessing: ffprobe and ffmpeg not found"),
            FailureReason::MissingTranscoder
        );
    }

    #[test]
    fn unmatched_text_falls_through_to_other() {
        let reason = FailureReason::classify("HTTP Error 404: Not Found");
        assert_eq!(reason, FailureReason::Other);
        assert!(reason.hint().contains("internet connection"));
    }

    #[test]
    fn launch_errors_distinguish_missing_programs() {
        let missing = FetchError::launch(
            "yt-dlp",
            FailureReason::MissingDownloader,
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(missing.reason(), FailureReason::MissingDownloader);

        let denied = FetchError::launch(
            "yt-dlp",
            FailureReason::MissingDownloader,
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(denied.reason(), FailureReason::Other);
    }

    #[test]
    fn failed_keeps_the_message() {
        let err = FetchError::failed("ERROR: Private video");
        assert_eq!(err.to_string(), "ERROR: Private video");
        assert_eq!(err.hint(), "This video may be private.");
    }
}
