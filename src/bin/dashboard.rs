use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use ytdash::{
    config::{DEFAULT_CONFIG_PATH, load_settings_from},
    dashboard::{AppState, serve},
    files::ensure_output_dir,
    logging,
    ytdlp::YtDlp,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Browser dashboard for downloading YouTube videos.")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the config file")]
    config: PathBuf,
    #[arg(long = "host", value_name = "ADDR", help = "Override the listen address")]
    host: Option<String>,
    #[arg(short = 'p', long = "port", value_name = "PORT", help = "Override the listen port")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(logging::DEFAULT_DIRECTIVE);
    let cli = Cli::parse();

    let mut settings = load_settings_from(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    if let Some(host) = cli.host {
        settings.host = host;
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }

    ensure_output_dir(&settings.output_dir)?;
    let backend = YtDlp::from_settings(&settings);
    if let Err(err) = backend.ensure_available() {
        warn!("{err:#}; downloads will fail until it is installed");
    }
    if let Err(err) = backend.ensure_transcoder() {
        warn!("{err:#}; MP3 downloads are unavailable");
    }

    let addr = settings.bind_addr()?;
    info!(output_dir = %settings.output_dir.display(), "saving downloads");
    serve(AppState::new(settings, Arc::new(backend)), addr).await
}
