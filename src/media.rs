//! Metadata shapes read from yt-dlp's JSON output.
//!
//! Everything except the id is optional because extractors disagree on which
//! fields they fill in; the display helpers pick sensible placeholders.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Subset of `yt-dlp --dump-single-json` used for the preview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub id: String,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub channel: Option<String>,
    pub duration: Option<f64>,
    pub view_count: Option<u64>,
    pub thumbnail: Option<String>,
    pub upload_date: Option<String>,
}

impl MediaInfo {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.is_empty())
            .unwrap_or("Unknown")
    }

    pub fn display_uploader(&self) -> &str {
        self.uploader
            .as_deref()
            .or(self.channel.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or("Unknown")
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(|secs| secs.round() as u64)
            .unwrap_or(0)
    }

    /// `"212 seconds (3:32)"`.
    pub fn duration_text(&self) -> String {
        let secs = self.duration_seconds();
        format!("{secs} seconds ({})", format_duration(secs))
    }

    pub fn views_text(&self) -> String {
        group_thousands(self.view_count.unwrap_or(0))
    }

    /// `YYYYMMDD` from yt-dlp rendered as `YYYY-MM-DD`.
    pub fn upload_date_text(&self) -> Option<String> {
        let raw = self.upload_date.as_deref()?;
        NaiveDate::parse_from_str(raw, "%Y%m%d")
            .ok()
            .map(|date| date.format("%Y-%m-%d").to_string())
    }

    /// Id used when the title sanitizes to nothing.
    pub fn fallback_stem(&self) -> Option<&str> {
        Some(self.id.as_str()).filter(|id| !id.is_empty())
    }
}

/// Whole minutes and zero-padded seconds. Hours are not split out, so an
/// hour and two minutes reads `62:05`.
pub fn format_duration(total_seconds: u64) -> String {
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Playlist {
    pub title: String,
    pub entries: Vec<PlaylistEntry>,
}

impl Playlist {
    /// Entries in `[start, end)`; out-of-range bounds are clamped.
    pub fn range(&self, start: usize, end: Option<usize>) -> &[PlaylistEntry] {
        let len = self.entries.len();
        let end = end.unwrap_or(len).min(len);
        let start = start.min(end);
        &self.entries[start..end]
    }
}

/// One line of `yt-dlp --flat-playlist --dump-json`.
#[derive(Debug, Deserialize)]
pub(crate) struct FlatEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub playlist_title: Option<String>,
    #[serde(default)]
    pub playlist: Option<String>,
}

impl FlatEntry {
    pub(crate) fn into_entry(self) -> Option<PlaylistEntry> {
        let id = self.id.filter(|id| !id.is_empty())?;
        let url = self
            .url
            .filter(|url| url.starts_with("http"))
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={id}"));
        Some(PlaylistEntry {
            title: self.title.unwrap_or_else(|| "unknown".to_owned()),
            id,
            url,
        })
    }

    pub(crate) fn playlist_name(&self) -> Option<&str> {
        self.playlist_title
            .as_deref()
            .or(self.playlist.as_deref())
            .filter(|name| !name.is_empty())
    }
}
