//! Batch flow: one selector for the whole list, then every URL in input
//! order, one at a time. A failing item is counted and skipped; it never stops
//! the run.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use crate::failure::FetchError;
use crate::format::{Container, Quality, Selection, resolve};
use crate::options::{AudioSettings, DownloadOptions, batch_template};
use crate::progress::{NoProgress, Phase, ProgressObserver};
use crate::ytdlp::{DownloadOutcome, MediaBackend};

/// Splits pasted input into trimmed, non-empty lines, keeping their order.
pub fn parse_url_list(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchTally {
    pub success_count: usize,
    pub error_count: usize,
    pub total: usize,
}

impl BatchTally {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Every item has been counted one way or the other.
    pub fn is_complete(&self) -> bool {
        self.success_count + self.error_count == self.total
    }
}

#[derive(Debug)]
pub struct ItemResult {
    /// 1-based position in the input list.
    pub position: usize,
    pub url: String,
    pub outcome: Result<DownloadOutcome, FetchError>,
}

#[derive(Debug)]
pub struct BatchReport {
    pub selection: Selection,
    pub tally: BatchTally,
    pub items: Vec<ItemResult>,
}

impl BatchReport {
    /// Turns a run with any failed item into an error.
    pub fn ensure_all_succeeded(&self) -> Result<()> {
        if self.tally.error_count > 0 {
            bail!(
                "{} of {} downloads failed",
                self.tally.error_count,
                self.tally.total
            );
        }
        Ok(())
    }
}

/// The part of a playlist picked for a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSlice {
    pub title: String,
    /// Number of entries in the whole playlist.
    pub available: usize,
    pub urls: Vec<String>,
}

/// Lists the playlist at `url` and keeps the entries in `[start, end)`.
/// Selecting nothing is an error.
pub fn expand_playlist<B: MediaBackend + ?Sized>(
    backend: &B,
    url: &str,
    start: usize,
    end: Option<usize>,
) -> Result<PlaylistSlice> {
    let playlist = backend
        .list_playlist(url)
        .with_context(|| format!("listing playlist {url}"))?;
    let urls: Vec<String> = playlist
        .range(start, end)
        .iter()
        .map(|entry| entry.url.clone())
        .collect();
    if urls.is_empty() {
        bail!("playlist range {start}..{end:?} selects no videos");
    }
    Ok(PlaylistSlice {
        available: playlist.entries.len(),
        title: playlist.title,
        urls,
    })
}

pub struct BatchDownloader<'a, B: MediaBackend + ?Sized> {
    backend: &'a B,
    output_dir: &'a Path,
    audio: &'a AudioSettings,
}

impl<'a, B: MediaBackend + ?Sized> BatchDownloader<'a, B> {
    pub fn new(backend: &'a B, output_dir: &'a Path, audio: &'a AudioSettings) -> Self {
        Self {
            backend,
            output_dir,
            audio,
        }
    }

    pub fn run(
        &self,
        container: Container,
        quality: Quality,
        urls: &[String],
        observer: &mut dyn ProgressObserver,
    ) -> BatchReport {
        let selection = resolve(container, quality);
        let options = DownloadOptions::for_request(
            &selection,
            container,
            batch_template(self.output_dir),
            self.audio,
        )
        .with_progress(false);

        let total = urls.len();
        let mut tally = BatchTally::new(total);
        let mut items = Vec::with_capacity(total);
        info!(total, selector = %selection.selector, "starting batch");

        for (index, url) in urls.iter().enumerate() {
            let current = index + 1;
            observer.report(
                current as f32 / total as f32,
                Phase::Item {
                    current,
                    total,
                    url: url.clone(),
                },
            );

            let outcome = self.backend.download(url, &options, &mut NoProgress);
            match &outcome {
                Ok(_) => {
                    tally.success_count += 1;
                    info!(current, total, %url, "downloaded");
                }
                Err(err) => {
                    tally.error_count += 1;
                    warn!(current, total, %url, "download failed: {err}");
                }
            }
            items.push(ItemResult {
                position: current,
                url: url.clone(),
                outcome,
            });
        }

        observer.report(1.0, Phase::Finished);
        BatchReport {
            selection,
            tally,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use tempfile::tempdir;

    fn urls(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parse_drops_blank_lines_and_keeps_order() {
        let parsed = parse_url_list("  https://a \n\n\t\nhttps://b\r\n   \nhttps://c");
        assert_eq!(parsed, urls(&["https://a", "https://b", "https://c"]));
        assert!(parse_url_list(" \n \n").is_empty());
    }

    #[test]
    fn failing_item_does_not_abort_the_batch() {
        let dir = tempdir().unwrap();
        let backend = FakeBackend::titled("T").failing(&["two"]);
        let audio = AudioSettings::default();
        let batch = BatchDownloader::new(&backend, dir.path(), &audio);
        let list = urls(&["https://y/one", "https://y/two", "https://y/three"]);

        let report = batch.run(Container::Video, Quality::Highest, &list, &mut NoProgress);

        assert_eq!(
            report.tally,
            BatchTally {
                success_count: 2,
                error_count: 1,
                total: 3
            }
        );
        assert!(report.tally.is_complete());
        assert_eq!(backend.calls(), list);
        assert!(report.items[1].outcome.is_err());
        assert!(report.items[2].outcome.is_ok());
        assert_eq!(report.items[2].position, 3);
    }

    #[test]
    fn blank_lines_are_not_counted() {
        let dir = tempdir().unwrap();
        let backend = FakeBackend::titled("T");
        let audio = AudioSettings::default();
        let batch = BatchDownloader::new(&backend, dir.path(), &audio);
        let list = parse_url_list("https://y/1\n\n   \nhttps://y/2\n");

        let report = batch.run(Container::Audio, Quality::AudioBest, &list, &mut NoProgress);
        assert_eq!(report.tally.total, 2);
        assert_eq!(report.tally.success_count, 2);
        assert_eq!(report.selection.selector, "bestaudio/best");
    }

    #[test]
    fn uses_unsanitized_title_template() {
        let dir = tempdir().unwrap();
        let backend = FakeBackend::titled("T");
        let audio = AudioSettings::default();
        let batch = BatchDownloader::new(&backend, dir.path(), &audio);
        batch.run(
            Container::Video,
            Quality::P480,
            &urls(&["https://y/1"]),
            &mut NoProgress,
        );
        let templates = backend.templates.lock().clone();
        assert_eq!(templates, vec![dir.path().join("%(title)s.%(ext)s")]);
    }

    #[test]
    fn reports_item_progress_in_order() {
        let dir = tempdir().unwrap();
        let backend = FakeBackend::titled("T");
        let audio = AudioSettings::default();
        let batch = BatchDownloader::new(&backend, dir.path(), &audio);
        let mut phases = Vec::new();
        let mut observer = |fraction: f32, phase: Phase| phases.push((fraction, phase));
        batch.run(
            Container::Video,
            Quality::Highest,
            &urls(&["https://y/1", "https://y/2"]),
            &mut observer,
        );

        assert_eq!(phases.len(), 3);
        assert_eq!(
            phases[0],
            (
                0.5,
                Phase::Item {
                    current: 1,
                    total: 2,
                    url: "https://y/1".into()
                }
            )
        );
        assert_eq!(phases[1].0, 1.0);
        assert_eq!(phases[2].1, Phase::Finished);
    }

    #[test]
    fn empty_list_does_nothing() {
        let dir = tempdir().unwrap();
        let backend = FakeBackend::titled("T");
        let audio = AudioSettings::default();
        let batch = BatchDownloader::new(&backend, dir.path(), &audio);
        let report = batch.run(Container::Video, Quality::Highest, &[], &mut NoProgress);
        assert_eq!(report.tally, BatchTally::default());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn failed_items_make_the_run_an_error() {
        let dir = tempdir().unwrap();
        let backend = FakeBackend::titled("T").failing(&["bad"]);
        let audio = AudioSettings::default();
        let batch = BatchDownloader::new(&backend, dir.path(), &audio);

        let clean = batch.run(
            Container::Video,
            Quality::Highest,
            &urls(&["https://y/1"]),
            &mut NoProgress,
        );
        assert!(clean.ensure_all_succeeded().is_ok());

        let mixed = batch.run(
            Container::Video,
            Quality::Highest,
            &urls(&["https://y/1", "https://y/bad"]),
            &mut NoProgress,
        );
        let err = mixed.ensure_all_succeeded().unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 downloads failed");
    }

    #[test]
    fn playlist_slice_keeps_half_open_range() {
        let backend = FakeBackend::titled("T");
        let slice = expand_playlist(&backend, "https://www.youtube.com/playlist?list=PL", 1, None)
            .unwrap();
        assert_eq!(slice.title, "Fake");
        assert_eq!(slice.available, 3);
        assert_eq!(
            slice.urls,
            urls(&[
                "https://www.youtube.com/watch?v=b",
                "https://www.youtube.com/watch?v=c"
            ])
        );

        let first = expand_playlist(&backend, "https://y/list", 0, Some(1)).unwrap();
        assert_eq!(first.urls, urls(&["https://www.youtube.com/watch?v=a"]));
    }

    #[test]
    fn empty_playlist_slice_is_an_error() {
        let backend = FakeBackend::titled("T");
        let err = expand_playlist(&backend, "https://y/list", 2, Some(2)).unwrap_err();
        assert!(err.to_string().contains("selects no videos"));
        assert!(expand_playlist(&backend, "https://y/list", 7, None).is_err());
    }

    #[test]
    fn playlist_entries_feed_the_batch_loop() {
        let dir = tempdir().unwrap();
        let backend = FakeBackend::titled("T").failing(&["v=b"]);
        let audio = AudioSettings::default();
        let slice = expand_playlist(&backend, "https://y/list", 0, None).unwrap();
        let report = BatchDownloader::new(&backend, dir.path(), &audio).run(
            Container::Audio,
            Quality::AudioBest,
            &slice.urls,
            &mut NoProgress,
        );
        assert_eq!(backend.calls(), slice.urls);
        assert_eq!(report.tally.success_count, 2);
        assert!(report.ensure_all_succeeded().is_err());
    }
}
