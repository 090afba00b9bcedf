//! Test doubles shared by the unit tests.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use parking_lot::Mutex;

use crate::failure::FetchError;
use crate::media::{MediaInfo, Playlist, PlaylistEntry};
use crate::options::DownloadOptions;
use crate::progress::{Phase, ProgressObserver};
use crate::ytdlp::{DownloadOutcome, MediaBackend};

/// Bash stand-in for yt-dlp. URLs containing `private`, `agegate` or `broken`
/// fail with the matching yt-dlp error text.
pub const STUB_YTDLP: &str = r#"#!/usr/bin/env bash
set -euo pipefail
url="${!#}"
prev=""
output=""
ext="mp4"
for arg in "$@"; do
    if [[ "$prev" == "--output" ]]; then
        output="$arg"
    fi
    if [[ "$arg" == "--extract-audio" ]]; then
        ext="mp3"
    fi
    prev="$arg"
done
fail() {
    echo "ERROR: [youtube] stub: $1" >&2
    exit 1
}
case "$url" in
    *private*) fail "Private video. Sign in if you've been granted access to this video" ;;
    *agegate*) fail "Sign in to confirm your age. This video may be inappropriate for some users." ;;
    *broken*) fail "Unable to download webpage: HTTP Error 404: Not Found" ;;
esac
if [[ " $* " == *" --dump-single-json "* ]]; then
cat <<'JSON'
{"id": "alpha", "title": "Alpha: Title?", "uploader": "Stub Channel", "duration": 125, "view_count": 1500, "thumbnail": "https://i.ytimg.com/vi/alpha/hq.jpg", "upload_date": "20240101"}
JSON
exit 0
fi
if [[ " $* " == *" --flat-playlist "* ]]; then
echo '{"id": "one", "title": "First", "url": "https://www.youtube.com/watch?v=one", "playlist_title": "Stub Mix"}'
echo '{"id": "two", "title": "Second", "url": "two", "playlist_title": "Stub Mix"}'
echo '{"id": "three", "title": "Third", "playlist_title": "Stub Mix"}'
exit 0
fi
path="${output//"%(ext)s"/$ext}"
path="${path//"%(title)s"/Alpha Title}"
mkdir -p "$(dirname "$path")"
echo "[youtube] stub: Downloading webpage"
echo "ytdash-dl 512 1024 NA"
echo "ytdash-dl 1024 1024 NA"
if [[ "$ext" == "mp3" ]]; then
    echo "ytdash-pp started ExtractAudio"
fi
printf 'stub-bytes' > "$path"
echo "saved:$path"
"#;

/// Writes an executable script named `name` into `dir`.
#[cfg(unix)]
pub fn install_stub(dir: &Path, name: &str, script: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, script)?;
    let mut perms = fs::metadata(&path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms)?;
    Ok(path)
}

/// In-process backend: records every call and fails URLs containing any of
/// the `failing` fragments.
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub info: MediaInfo,
    pub failing: Vec<&'static str>,
    pub metadata_fails: bool,
    pub calls: Mutex<Vec<String>>,
    pub templates: Mutex<Vec<PathBuf>>,
}

impl FakeBackend {
    pub fn titled(title: &str) -> Self {
        Self {
            info: MediaInfo {
                id: "fake123".to_owned(),
                title: Some(title.to_owned()),
                ..MediaInfo::default()
            },
            ..Self::default()
        }
    }

    pub fn failing(mut self, fragments: &[&'static str]) -> Self {
        self.failing.extend_from_slice(fragments);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl MediaBackend for FakeBackend {
    fn fetch_metadata(&self, url: &str) -> Result<MediaInfo, FetchError> {
        if self.metadata_fails {
            return Err(FetchError::failed(format!(
                "ERROR: Unsupported URL: {url}"
            )));
        }
        Ok(self.info.clone())
    }

    fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        observer: &mut dyn ProgressObserver,
    ) -> Result<DownloadOutcome, FetchError> {
        self.calls.lock().push(url.to_owned());
        self.templates.lock().push(options.output_template.clone());
        if let Some(fragment) = self.failing.iter().find(|f| url.contains(**f)) {
            return Err(FetchError::failed(format!("ERROR: stub failure ({fragment})")));
        }

        let ext = if options.needs_transcoder() { "mp3" } else { "mp4" };
        let template = options.output_template.to_string_lossy();
        let path = PathBuf::from(
            template
                .replace("%(ext)s", ext)
                .replace("%(title)s", self.info.display_title()),
        );
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| FetchError::failed(err.to_string()))?;
        }
        fs::write(&path, b"fake-bytes").map_err(|err| FetchError::failed(err.to_string()))?;

        observer.report(0.5, Phase::Downloading);
        observer.report(1.0, Phase::Finished);
        Ok(DownloadOutcome { saved: Some(path) })
    }

    fn list_playlist(&self, _url: &str) -> Result<Playlist, FetchError> {
        Ok(Playlist {
            title: "Fake".to_owned(),
            entries: ["a", "b", "c"]
                .iter()
                .map(|id| PlaylistEntry {
                    id: (*id).to_owned(),
                    title: format!("Title {id}"),
                    url: format!("https://www.youtube.com/watch?v={id}"),
                })
                .collect(),
        })
    }
}
