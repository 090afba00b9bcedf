//! Server-rendered HTML for the three dashboard pages.

use std::path::Path;

use crate::batch::BatchReport;
use crate::files::SavedFile;
use crate::format::{Container, Quality};
use crate::media::MediaInfo;

/// Banner shown above a page's results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
}

impl Notice {
    fn class(&self) -> &'static str {
        match self {
            Notice::Info(_) => "info",
            Notice::Success(_) => "success",
            Notice::Warning(_) => "warning",
            Notice::Error(_) => "error",
        }
    }

    fn text(&self) -> &str {
        match self {
            Notice::Info(text)
            | Notice::Success(text)
            | Notice::Warning(text)
            | Notice::Error(text) => text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Choice {
    pub container: Container,
    pub quality: Quality,
}

pub struct SingleView<'a> {
    pub url: &'a str,
    pub choice: Choice,
    pub output_dir: &'a Path,
    pub notices: Vec<Notice>,
    pub preview: Option<&'a MediaInfo>,
    pub files: &'a [SavedFile],
}

pub struct BatchView<'a> {
    pub urls: &'a str,
    pub choice: Choice,
    pub output_dir: &'a Path,
    pub notices: Vec<Notice>,
    pub report: Option<&'a BatchReport>,
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; color: #222; }
nav { background: #222; padding: 0.75rem 2rem; }
nav a { color: #fff; margin-right: 1.5rem; text-decoration: none; }
main { max-width: 960px; margin: 0 auto; padding: 1.5rem 2rem; }
.notice { padding: 0.6rem 1rem; border-radius: 6px; margin: 0.5rem 0; }
.info { background: #e8f1fb; } .success { background: #e6f6ea; }
.warning { background: #fff6dd; } .error { background: #fde8e8; }
.cards { display: flex; gap: 2rem; }
.card { flex: 1; border: 2px solid #4ECDC4; border-radius: 10px; padding: 1.5rem; text-align: center; }
.card.single { border-color: #FF6B6B; }
.row { display: flex; gap: 1rem; align-items: end; margin-bottom: 1rem; }
.preview { display: flex; gap: 1.5rem; margin: 1rem 0; }
.preview img { width: 300px; border-radius: 6px; }
.metrics { display: flex; gap: 3rem; margin: 1rem 0; }
.metric strong { display: block; font-size: 2rem; }
input[type=text], textarea { width: 100%; padding: 0.5rem; box-sizing: border-box; }
textarea { min-height: 10rem; }
button { background: #FF4B4B; color: #fff; border: 0; border-radius: 6px; padding: 0.7rem; width: 100%; font-size: 1rem; cursor: pointer; }
progress { width: 100%; }
#progress-area { display: none; margin: 1rem 0; }
"#;

const PROGRESS_SCRIPT: &str = r#"
<script>
(function () {
  const form = document.querySelector('form.download');
  const area = document.getElementById('progress-area');
  const bar = document.getElementById('progress-bar');
  const status = document.getElementById('progress-status');
  const live = document.getElementById('live-preview');
  const container = document.querySelector('select[name=container]');
  const quality = document.querySelector('select[name=quality]');
  const audioQuality = document.querySelector('label.audio-quality');
  function syncQuality() {
    if (!container || !quality) { return; }
    const audio = container.value === 'audio';
    quality.disabled = audio;
    quality.closest('label').hidden = audio;
    if (audioQuality) { audioQuality.hidden = !audio; }
  }
  if (container) { container.addEventListener('change', syncQuality); syncQuality(); }
  function showPreview(card) {
    if (!live) { return; }
    live.replaceChildren();
    if (!card) { return; }
    if (card.thumbnail) {
      const img = document.createElement('img');
      img.src = card.thumbnail;
      img.alt = 'thumbnail';
      live.appendChild(img);
    }
    const details = document.createElement('div');
    [['Title', card.title], ['Channel', card.uploader], ['Duration', card.duration], ['Views', card.views]]
      .forEach(function (pair) {
        const row = document.createElement('div');
        const label = document.createElement('b');
        label.textContent = pair[0] + ':';
        row.append(label, ' ' + pair[1]);
        details.appendChild(row);
      });
    live.appendChild(details);
  }
  async function poll() {
    try {
      const res = await fetch('/api/progress');
      const snap = await res.json();
      bar.value = snap.fraction;
      status.textContent = snap.status;
      showPreview(snap.preview);
    } catch (_) {}
    setTimeout(poll, 500);
  }
  if (form) {
    form.addEventListener('submit', function () {
      area.style.display = 'block';
      poll();
    });
  }
})();
</script>
"#;

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{title}</title><style>{STYLE}</style></head><body>\
         <nav><a href=\"/\">Home</a><a href=\"/single\">Youtube Downloader</a>\
         <a href=\"/batch\">Playlist Downloader</a></nav><main>{body}</main>\
         {PROGRESS_SCRIPT}</body></html>",
        title = escape_html(title),
    )
}

fn notices_html(notices: &[Notice]) -> String {
    notices
        .iter()
        .map(|notice| {
            format!(
                "<div class=\"notice {}\">{}</div>",
                notice.class(),
                escape_html(notice.text())
            )
        })
        .collect()
}

fn choice_fields(choice: Choice) -> String {
    let containers: String = Container::ALL
        .iter()
        .map(|container| {
            format!(
                "<option value=\"{}\"{}>{}</option>",
                container.slug(),
                selected(*container == choice.container),
                container.label()
            )
        })
        .collect();
    let qualities: String = Quality::VIDEO_TIERS
        .iter()
        .map(|quality| {
            format!(
                "<option value=\"{}\"{}>{}</option>",
                quality.slug(),
                selected(*quality == choice.quality),
                quality.label()
            )
        })
        .collect();
    // Only one of the two quality labels is visible; MP3 has a single tier.
    let audio = choice.container == Container::Audio;
    format!(
        "<label>Format:<br><select name=\"container\">{containers}</select></label>\
         <label class=\"video-quality\"{}>Quality:<br>\
         <select name=\"quality\"{}>{qualities}</select></label>\
         <label class=\"audio-quality\"{}>Quality:<br>\
         <select disabled><option selected>{}</option></select></label>",
        flag(audio, " hidden"),
        flag(audio, " disabled"),
        flag(!audio, " hidden"),
        Quality::AudioBest.label()
    )
}

fn selected(on: bool) -> &'static str {
    flag(on, " selected")
}

fn flag(on: bool, attribute: &'static str) -> &'static str {
    if on { attribute } else { "" }
}

fn folder_notice(output_dir: &Path) -> String {
    let shown = std::path::absolute(output_dir).unwrap_or_else(|_| output_dir.to_path_buf());
    format!(
        "<div class=\"notice info\">Files will be saved to: <code>{}</code></div>",
        escape_html(&shown.display().to_string())
    )
}

const PROGRESS_AREA: &str = "<div id=\"progress-area\"><progress id=\"progress-bar\" max=\"1\" value=\"0\"></progress>\
     <div id=\"progress-status\"></div><div id=\"live-preview\" class=\"preview\"></div></div>";

pub fn home(output_dir: &Path) -> String {
    let body = format!(
        "<h1>YouTube Video Downloader</h1>\
         <p>Download YouTube videos one at a time or in bulk. Pick a page below or from the menu.</p>\
         <div class=\"cards\">\
         <div class=\"card single\"><h3>Single Video Downloader</h3>\
         <p>Video preview, quality selection and a progress indicator.</p>\
         <a href=\"/single\">Open Youtube Downloader</a></div>\
         <div class=\"card\"><h3>Batch Video Downloader</h3>\
         <p>Paste many URLs, one per line, and download them in order.</p>\
         <a href=\"/batch\">Open Playlist Downloader</a></div></div>\
         <h3>Features</h3><ul>\
         <li>MP4 video in Highest, 720p, 480p or 360p</li>\
         <li>MP3 audio extraction through FFmpeg</li>\
         <li>Safe filename generation and file size listing</li></ul>\
         {}\
         <p><small>Powered by <strong>yt-dlp</strong>. FFmpeg is required for MP3.</small></p>",
        folder_notice(output_dir)
    );
    layout("YouTube Video Downloader", &body)
}

pub fn single(view: &SingleView<'_>) -> String {
    let mut body = String::from(
        "<h1>YouTube Video Downloader</h1><p>Advanced YouTube video downloader powered by yt-dlp</p>",
    );
    body.push_str(&folder_notice(view.output_dir));
    body.push_str(&format!(
        "<form class=\"download\" method=\"post\" action=\"/single\">\
         <div class=\"row\">{}</div>\
         <label>YouTube Video URL:<input type=\"text\" name=\"url\" value=\"{}\" \
         placeholder=\"https://www.youtube.com/watch?v=dQw4w9WgXcQ\"></label><p></p>\
         <button type=\"submit\">Analyze and Download</button></form>",
        choice_fields(view.choice),
        escape_html(view.url)
    ));
    body.push_str(PROGRESS_AREA);

    if let Some(info) = view.preview {
        body.push_str(&preview_html(info));
    }
    body.push_str(&notices_html(&view.notices));
    if !view.files.is_empty() {
        body.push_str(&files_html(view.files));
    }
    layout("YouTube Video Downloader", &body)
}

fn preview_html(info: &MediaInfo) -> String {
    let thumbnail = info
        .thumbnail
        .as_deref()
        .map(|src| format!("<img src=\"{}\" alt=\"thumbnail\">", escape_html(src)))
        .unwrap_or_default();
    let uploaded = info
        .upload_date_text()
        .map(|date| format!("<div><b>Uploaded:</b> {date}</div>"))
        .unwrap_or_default();
    format!(
        "<div class=\"preview\">{thumbnail}<div>\
         <div><b>Title:</b> {}</div><div><b>Channel:</b> {}</div>\
         <div><b>Duration:</b> {}</div><div><b>Views:</b> {}</div>{uploaded}</div></div>",
        escape_html(info.display_title()),
        escape_html(info.display_uploader()),
        info.duration_text(),
        info.views_text(),
    )
}

fn files_html(files: &[SavedFile]) -> String {
    let items: String = files
        .iter()
        .map(|file| {
            format!(
                "<li><a href=\"/files/{}\"><b>{}</b></a> ({:.1} MB)</li>",
                urlencoding::encode(&file.name),
                escape_html(&file.name),
                file.size_mb()
            )
        })
        .collect();
    format!("<p>Downloaded files:</p><ul>{items}</ul>")
}

pub fn batch(view: &BatchView<'_>) -> String {
    let mut body = String::from(
        "<h1>YouTube Playlist Downloader</h1><p>Download multiple YouTube video URLs in bulk (powered by yt-dlp)</p>",
    );
    body.push_str(&folder_notice(view.output_dir));
    body.push_str(&format!(
        "<form class=\"download\" method=\"post\" action=\"/batch\">\
         <div class=\"row\">{}</div>\
         <label>Video URLs (one URL per line):<textarea name=\"urls\" \
         placeholder=\"https://www.youtube.com/watch?v=...\">{}</textarea></label><p></p>\
         <button type=\"submit\">Download Videos</button></form>",
        choice_fields(view.choice),
        escape_html(view.urls)
    ));
    body.push_str(PROGRESS_AREA);
    body.push_str(&notices_html(&view.notices));

    if let Some(report) = view.report {
        body.push_str(&batch_results_html(report));
    }
    layout("Playlist Downloader", &body)
}

fn batch_results_html(report: &BatchReport) -> String {
    let rows: String = report
        .items
        .iter()
        .map(|item| match &item.outcome {
            Ok(_) => format!(
                "<div class=\"notice success\">{}. <b>{}</b> - Downloaded</div>",
                item.position,
                escape_html(&item.url)
            ),
            Err(err) => format!(
                "<div class=\"notice error\">{}. <b>{}</b> - Error: {}</div>",
                item.position,
                escape_html(&item.url),
                escape_html(&err.to_string())
            ),
        })
        .collect();
    let tally = report.tally;
    format!(
        "{rows}<hr><div class=\"metrics\">\
         <div class=\"metric\">Successful<strong>{}</strong></div>\
         <div class=\"metric\">Errored<strong>{}</strong></div>\
         <div class=\"metric\">Total<strong>{}</strong></div></div>",
        tally.success_count, tally.error_count, tally.total
    )
}
