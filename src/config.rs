use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
};

use crate::options::AudioSettings;

pub const DEFAULT_CONFIG_PATH: &str = "ytdash.toml";
pub const DEFAULT_OUTPUT_DIR: &str = "Downloads";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8501;
pub const DEFAULT_YTDLP: &str = "yt-dlp";
pub const DEFAULT_ALLOWED_HOSTS: [&str; 3] = ["youtube.com", "youtu.be", "m.youtube.com"];

/// Raw contents of the TOML config file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub output_dir: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub ytdlp: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub audio_codec: Option<String>,
    pub audio_quality: Option<String>,
    pub allowed_hosts: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub ytdlp: PathBuf,
    pub ffmpeg: Option<PathBuf>,
    pub audio: AudioSettings,
    pub allowed_hosts: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_file_config(FileConfig::default())
    }
}

impl Settings {
    fn from_file_config(cfg: FileConfig) -> Self {
        let defaults = AudioSettings::default();
        Self {
            output_dir: cfg
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            host: cfg.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cfg.port.unwrap_or(DEFAULT_PORT),
            ytdlp: cfg.ytdlp.unwrap_or_else(|| PathBuf::from(DEFAULT_YTDLP)),
            ffmpeg: cfg.ffmpeg,
            audio: AudioSettings {
                codec: cfg.audio_codec.unwrap_or(defaults.codec),
                quality: cfg.audio_quality.unwrap_or(defaults.quality),
            },
            allowed_hosts: cfg.allowed_hosts.unwrap_or_else(|| {
                DEFAULT_ALLOWED_HOSTS
                    .iter()
                    .map(|host| host.to_string())
                    .collect()
            }),
        }
    }

    /// Applies `YTDASH_HOST`, `YTDASH_PORT` and `YTDASH_OUTPUT_DIR` on top of
    /// the file values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("YTDASH_HOST").filter(|value| !value.is_empty()) {
            self.host = host;
        }
        if let Some(port) = lookup("YTDASH_PORT").filter(|value| !value.is_empty()) {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("Parsing YTDASH_PORT value {port:?}"))?;
        }
        if let Some(dir) = lookup("YTDASH_OUTPUT_DIR").filter(|value| !value.is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Parsing listen host {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// True when the URL mentions one of the allowed hosts.
    pub fn accepts_url(&self, url: &str) -> bool {
        self.allowed_hosts.iter().any(|host| url.contains(host.as_str()))
    }
}

/// Reads the TOML file at `path`. A missing file is not an error.
pub fn read_file_config(path: &Path) -> Result<Option<FileConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let cfg: FileConfig =
        toml::from_str(&content).with_context(|| format!("Parsing {}", path.display()))?;
    Ok(Some(cfg))
}

/// File values (or defaults when the file is missing), then environment
/// overrides.
pub fn load_settings_from(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let cfg = read_file_config(path)?.unwrap_or_default();
    let mut settings = Settings::from_file_config(cfg);
    settings.apply_env(|key| std::env::var(key).ok())?;
    Ok(settings)
}
