use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use ytdash::{
    batch::{BatchDownloader, BatchReport, expand_playlist, parse_url_list},
    config::{DEFAULT_CONFIG_PATH, Settings, load_settings_from},
    files::ensure_output_dir,
    format::{Container, DownloadRequest, Quality},
    logging,
    progress::{Phase, ProgressObserver},
    single::SingleDownloader,
    ytdlp::{MediaBackend, YtDlp},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Download YouTube videos from the terminal.")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the config file")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Preview and download one URL.
    Single {
        url: String,
        #[command(flatten)]
        choice: ChoiceArgs,
    },
    /// Download every URL listed in a file, one per line (`-` reads stdin).
    Batch {
        #[arg(value_name = "FILE|-")]
        source: String,
        #[command(flatten)]
        choice: ChoiceArgs,
    },
    /// Download a slice of a playlist.
    Playlist {
        url: String,
        #[arg(long, default_value_t = 0, help = "First entry to download (0-based)")]
        start: usize,
        #[arg(long, help = "Stop before this entry")]
        end: Option<usize>,
        #[command(flatten)]
        choice: ChoiceArgs,
    },
}

#[derive(Args, Debug, Clone, Copy)]
struct ChoiceArgs {
    #[arg(long, help = "Extract MP3 audio instead of MP4 video")]
    audio: bool,
    #[arg(
        long,
        value_name = "Q",
        default_value = "highest",
        help = "highest, 720p, 480p or 360p"
    )]
    quality: Quality,
}

impl ChoiceArgs {
    fn container(self) -> Container {
        if self.audio {
            Container::Audio
        } else {
            Container::Video
        }
    }
}

/// Redraws one status line on stderr.
struct TerminalProgress {
    last_percent: Option<u32>,
}

impl TerminalProgress {
    fn new() -> Self {
        Self { last_percent: None }
    }
}

impl ProgressObserver for TerminalProgress {
    fn report(&mut self, fraction: f32, phase: Phase) {
        let mut err = io::stderr().lock();
        match phase {
            Phase::Downloading => {
                let percent = (fraction * 1000.0).round() as u32;
                if self.last_percent == Some(percent) {
                    return;
                }
                self.last_percent = Some(percent);
                let _ = write!(err, "\rDownloading... {:.1}%   ", fraction * 100.0);
            }
            Phase::PostProcessing => {
                let _ = write!(err, "\rConverting...            ");
            }
            Phase::Finished => {
                self.last_percent = None;
                let _ = writeln!(err, "\rDownload completed!      ");
            }
            Phase::Item {
                current,
                total,
                url,
            } => {
                let _ = writeln!(err, "Processing video {current}/{total}: {url}");
            }
        }
        let _ = err.flush();
    }
}

fn main() -> Result<()> {
    logging::init(logging::DEFAULT_DIRECTIVE);
    let cli = Cli::parse();
    let settings = load_settings_from(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    ensure_output_dir(&settings.output_dir)?;
    let backend = YtDlp::from_settings(&settings);

    match cli.command {
        Command::Single { url, choice } => run_single(&backend, &settings, url, choice),
        Command::Batch { source, choice } => {
            let urls = load_batch_urls(&source)?;
            run_batch(&backend, &settings, &urls, choice)
        }
        Command::Playlist {
            url,
            start,
            end,
            choice,
        } => run_playlist(&backend, &settings, &url, start, end, choice),
    }
}

/// URLs from a file, or from stdin when `source` is `-`. Nothing usable is an
/// error.
fn load_batch_urls(source: &str) -> Result<Vec<String>> {
    let urls = parse_url_list(&read_source(source)?);
    if urls.is_empty() {
        bail!("No valid video URL was entered.");
    }
    Ok(urls)
}

fn read_source(source: &str) -> Result<String> {
    if source == "-" {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("reading URLs from stdin")?;
        Ok(input)
    } else {
        fs::read_to_string(source).with_context(|| format!("reading {source}"))
    }
}

fn run_single(
    backend: &dyn MediaBackend,
    settings: &Settings,
    url: String,
    choice: ChoiceArgs,
) -> Result<()> {
    if !settings.accepts_url(&url) {
        bail!("Invalid YouTube URL! Please enter a valid YouTube link.");
    }
    let request = DownloadRequest::new(url, choice.container(), choice.quality);
    let downloader = SingleDownloader::new(backend, &settings.output_dir, &settings.audio);

    let info = match downloader.preview(&request.url) {
        Ok(info) => info,
        Err(err) => bail!("Failed to fetch video information: {err}\n{}", err.hint()),
    };
    println!("Title:    {}", info.display_title());
    println!("Channel:  {}", info.display_uploader());
    println!("Duration: {}", info.duration_text());
    println!("Views:    {}", info.views_text());

    let mut progress = TerminalProgress::new();
    match downloader.download(info, &request, &mut progress) {
        Ok(report) => {
            println!(
                "Format: {} - Quality: {}",
                request.container.label(),
                report.selection.description
            );
            println!("{} downloaded successfully!", report.info.display_title());
            if let Some(saved) = &report.saved {
                println!("Saved to {}", saved.display());
            }
            for file in &report.files {
                println!("- {} ({:.1} MB)", file.name, file.size_mb());
            }
            Ok(())
        }
        Err(err) => bail!("{err}\n{}", err.hint()),
    }
}

fn run_playlist(
    backend: &dyn MediaBackend,
    settings: &Settings,
    url: &str,
    start: usize,
    end: Option<usize>,
    choice: ChoiceArgs,
) -> Result<()> {
    let slice = expand_playlist(backend, url, start, end)?;
    println!("-------------");
    println!("{}", slice.title);
    println!("Videos: {} (downloading {})", slice.available, slice.urls.len());
    println!("-------------");
    run_batch(backend, settings, &slice.urls, choice)
}

fn run_batch(
    backend: &dyn MediaBackend,
    settings: &Settings,
    urls: &[String],
    choice: ChoiceArgs,
) -> Result<()> {
    info!(count = urls.len(), "batch starting");
    let downloader = BatchDownloader::new(backend, &settings.output_dir, &settings.audio);
    let mut progress = TerminalProgress::new();
    let report = downloader.run(choice.container(), choice.quality, urls, &mut progress);
    print_batch(&report);
    report.ensure_all_succeeded()
}

fn print_batch(report: &BatchReport) {
    for item in &report.items {
        match &item.outcome {
            Ok(_) => println!("{}. {} - Downloaded", item.position, item.url),
            Err(err) => println!("{}. {} - Error: {err}", item.position, item.url),
        }
    }
    let tally = report.tally;
    println!(
        "Successful: {}  Errored: {}  Total: {}",
        tally.success_count, tally.error_count, tally.total
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use tempfile::{NamedTempFile, tempdir};
    use ytdash::{
        failure::FetchError,
        media::{MediaInfo, Playlist, PlaylistEntry},
        options::DownloadOptions,
        ytdlp::DownloadOutcome,
    };

    /// Fails every URL containing `fail`; lists a four-entry playlist.
    struct ScriptedBackend;

    impl MediaBackend for ScriptedBackend {
        fn fetch_metadata(&self, url: &str) -> Result<MediaInfo, FetchError> {
            Ok(MediaInfo {
                id: url.rsplit('/').next().unwrap_or_default().to_owned(),
                title: Some("Scripted".to_owned()),
                ..MediaInfo::default()
            })
        }

        fn download(
            &self,
            url: &str,
            _options: &DownloadOptions,
            observer: &mut dyn ProgressObserver,
        ) -> Result<DownloadOutcome, FetchError> {
            if url.contains("fail") {
                return Err(FetchError::failed("ERROR: scripted failure"));
            }
            observer.report(1.0, Phase::Finished);
            Ok(DownloadOutcome::default())
        }

        fn list_playlist(&self, _url: &str) -> Result<Playlist, FetchError> {
            Ok(Playlist {
                title: "Scripted Mix".to_owned(),
                entries: ["one", "two", "fail", "four"]
                    .iter()
                    .map(|id| PlaylistEntry {
                        id: (*id).to_owned(),
                        title: id.to_string(),
                        url: format!("https://youtu.be/{id}"),
                    })
                    .collect(),
            })
        }
    }

    fn settings_in(dir: &std::path::Path) -> Settings {
        Settings {
            output_dir: PathBuf::from(dir),
            ..Settings::default()
        }
    }

    fn video() -> ChoiceArgs {
        ChoiceArgs {
            audio: false,
            quality: Quality::Highest,
        }
    }

    #[test]
    fn batch_file_is_read_and_blank_lines_dropped() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "https://youtu.be/a\n\n  https://youtu.be/b  \n").unwrap();
        let urls = load_batch_urls(file.path().to_str().unwrap()).unwrap();
        assert_eq!(urls, vec!["https://youtu.be/a", "https://youtu.be/b"]);
    }

    #[test]
    fn empty_batch_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "  \n\n").unwrap();
        let err = load_batch_urls(file.path().to_str().unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "No valid video URL was entered.");
        assert!(load_batch_urls("/nonexistent/urls.txt").is_err());
    }

    #[test]
    fn any_failed_item_fails_the_command() {
        let dir = tempdir().unwrap();
        let settings = settings_in(dir.path());
        let ok = vec!["https://youtu.be/one".to_owned()];
        assert!(run_batch(&ScriptedBackend, &settings, &ok, video()).is_ok());

        let mixed = vec![
            "https://youtu.be/one".to_owned(),
            "https://youtu.be/fail".to_owned(),
        ];
        let err = run_batch(&ScriptedBackend, &settings, &mixed, video()).unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 downloads failed");
    }

    #[test]
    fn playlist_runs_only_the_requested_slice() {
        let dir = tempdir().unwrap();
        let settings = settings_in(dir.path());
        let list = "https://www.youtube.com/playlist?list=PL";
        assert!(run_playlist(&ScriptedBackend, &settings, list, 0, Some(2), video()).is_ok());
        assert!(run_playlist(&ScriptedBackend, &settings, list, 3, None, video()).is_ok());
        assert!(run_playlist(&ScriptedBackend, &settings, list, 1, Some(3), video()).is_err());

        let empty = run_playlist(&ScriptedBackend, &settings, list, 4, None, video()).unwrap_err();
        assert!(empty.to_string().contains("selects no videos"));
    }

    #[test]
    fn single_rejects_foreign_hosts_before_any_call() {
        let dir = tempdir().unwrap();
        let settings = settings_in(dir.path());
        let err = run_single(
            &ScriptedBackend,
            &settings,
            "https://vimeo.com/1".to_owned(),
            video(),
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("Invalid YouTube URL!"));
        assert!(
            run_single(
                &ScriptedBackend,
                &settings,
                "https://youtu.be/fail".to_owned(),
                video()
            )
            .is_err()
        );
    }
}
