//! Maps the dashboard's container/quality choices onto yt-dlp format selectors.
//!
//! The table is fixed: every pair the UI can emit resolves to a non-empty
//! selector. Video tiers below "highest" carry a fallback clause so a video
//! without a matching height still downloads something in the target
//! container.

use std::{fmt, str::FromStr};

use anyhow::{Error, bail};
use serde::{Deserialize, Serialize};

/// File type every video tier is restricted to.
pub const TARGET_EXT: &str = "mp4";

/// Selector used for every audio request, regardless of the quality argument.
pub const AUDIO_SELECTOR: &str = "bestaudio/best";

/// Output file type the user picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    #[default]
    Video,
    Audio,
}

impl Container {
    pub const ALL: [Container; 2] = [Container::Video, Container::Audio];

    pub fn slug(self) -> &'static str {
        match self {
            Container::Video => "video",
            Container::Audio => "audio",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Container::Video => "MP4 (Video)",
            Container::Audio => "MP3 (Audio)",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Container {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "video" | "mp4" => Ok(Container::Video),
            "audio" | "mp3" => Ok(Container::Audio),
            other => bail!("unknown container: {other}"),
        }
    }
}

/// Coarse resolution bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    #[serde(rename = "highest")]
    Highest,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "audio")]
    AudioBest,
}

impl Quality {
    /// Tiers offered for video downloads, in display order.
    pub const VIDEO_TIERS: [Quality; 4] =
        [Quality::Highest, Quality::P720, Quality::P480, Quality::P360];

    pub fn slug(self) -> &'static str {
        match self {
            Quality::Highest => "highest",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::P360 => "360p",
            Quality::AudioBest => "audio",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quality::Highest => "Highest Quality",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::P360 => "360p",
            Quality::AudioBest => "Best Audio Quality",
        }
    }

    fn max_height(self) -> Option<u32> {
        match self {
            Quality::P720 => Some(720),
            Quality::P480 => Some(480),
            Quality::P360 => Some(360),
            Quality::Highest | Quality::AudioBest => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Quality {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "highest" | "best" => Ok(Quality::Highest),
            "720p" | "720" => Ok(Quality::P720),
            "480p" | "480" => Ok(Quality::P480),
            "360p" | "360" => Ok(Quality::P360),
            "audio" | "audio-best" => Ok(Quality::AudioBest),
            other => bail!("unknown quality: {other}"),
        }
    }
}

/// A resolved selector plus the sentence shown next to it in the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub selector: String,
    pub description: &'static str,
}

/// Resolves the yt-dlp selector for a container/quality pair.
///
/// Audio ignores the quality entirely. A video request carrying the audio
/// tier is treated like "highest".
pub fn resolve(container: Container, quality: Quality) -> Selection {
    match container {
        Container::Audio => Selection {
            selector: AUDIO_SELECTOR.to_owned(),
            description: "Best Audio Quality",
        },
        Container::Video => match quality.max_height() {
            None => Selection {
                selector: format!("best[ext={TARGET_EXT}]"),
                description: "Highest Quality",
            },
            Some(height) => {
                // 360p falls back to the smallest stream, the others to the largest.
                let (fallback, description) = match quality {
                    Quality::P360 => ("worst", "360p or lowest available"),
                    Quality::P480 => ("best", "480p or best available"),
                    _ => ("best", "720p or best available"),
                };
                Selection {
                    selector: format!(
                        "best[height<={height}][ext={TARGET_EXT}]/{fallback}[ext={TARGET_EXT}]"
                    ),
                    description,
                }
            }
        },
    }
}

/// One UI submission: a URL plus the chosen container and quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub container: Container,
    pub quality: Quality,
}

impl DownloadRequest {
    /// Normalizes the quality so audio always carries the audio tier and video
    /// never does.
    pub fn new(url: impl Into<String>, container: Container, quality: Quality) -> Self {
        let quality = match (container, quality) {
            (Container::Audio, _) => Quality::AudioBest,
            (Container::Video, Quality::AudioBest) => Quality::Highest,
            (Container::Video, other) => other,
        };
        Self {
            url: url.into().trim().to_owned(),
            container,
            quality,
        }
    }

    pub fn selection(&self) -> Selection {
        resolve(self.container, self.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn video_tiers_are_distinct_and_non_empty() {
        let selectors: HashSet<String> = Quality::VIDEO_TIERS
            .iter()
            .map(|quality| resolve(Container::Video, *quality).selector)
            .collect();
        assert_eq!(selectors.len(), Quality::VIDEO_TIERS.len());
        assert!(selectors.iter().all(|selector| !selector.is_empty()));
    }

    #[test]
    fn capped_tiers_carry_a_fallback_clause() {
        assert!(!resolve(Container::Video, Quality::Highest).selector.contains('/'));
        for quality in [Quality::P720, Quality::P480, Quality::P360] {
            let selector = resolve(Container::Video, quality).selector;
            let (primary, fallback) = selector.split_once('/').expect("fallback clause");
            assert!(primary.contains("height<="));
            assert!(fallback.ends_with("[ext=mp4]"));
        }
    }

    #[test]
    fn video_table_matches_expected_selectors() {
        assert_eq!(resolve(Container::Video, Quality::Highest).selector, "best[ext=mp4]");
        assert_eq!(
            resolve(Container::Video, Quality::P720).selector,
            "best[height<=720][ext=mp4]/best[ext=mp4]"
        );
        assert_eq!(
            resolve(Container::Video, Quality::P480).selector,
            "best[height<=480][ext=mp4]/best[ext=mp4]"
        );
        assert_eq!(
            resolve(Container::Video, Quality::P360).selector,
            "best[height<=360][ext=mp4]/worst[ext=mp4]"
        );
    }

    #[test]
    fn audio_ignores_quality() {
        for quality in Quality::VIDEO_TIERS
            .into_iter()
            .chain(std::iter::once(Quality::AudioBest))
        {
            let selection = resolve(Container::Audio, quality);
            assert_eq!(selection.selector, AUDIO_SELECTOR);
            assert_eq!(selection.description, "Best Audio Quality");
        }
    }

    #[test]
    fn request_normalizes_quality_per_container() {
        let audio = DownloadRequest::new(" https://youtu.be/x ", Container::Audio, Quality::P720);
        assert_eq!(audio.quality, Quality::AudioBest);
        assert_eq!(audio.url, "https://youtu.be/x");

        let video = DownloadRequest::new("u", Container::Video, Quality::AudioBest);
        assert_eq!(video.quality, Quality::Highest);
        assert_eq!(video.selection().selector, "best[ext=mp4]");
    }

    #[test]
    fn parses_cli_spellings() {
        assert_eq!("720".parse::<Quality>().unwrap(), Quality::P720);
        assert_eq!("Highest".parse::<Quality>().unwrap(), Quality::Highest);
        assert_eq!("mp3".parse::<Container>().unwrap(), Container::Audio);
        assert!("1080p".parse::<Quality>().is_err());
    }
}
