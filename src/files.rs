//! Output directory helpers: listing downloaded files and resolving names
//! requested over HTTP.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use walkdir::WalkDir;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedFile {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl SavedFile {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MB
    }
}

/// Creates the output directory if it does not exist yet.
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))
}

/// Files directly inside `dir` whose name contains `stem`, sorted by name.
/// A missing directory yields an empty list.
pub fn list_matching(dir: &Path, stem: &str) -> Result<Vec<SavedFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("reading {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.contains(stem) {
            continue;
        }
        let size_bytes = entry
            .metadata()
            .with_context(|| format!("reading size of {}", entry.path().display()))?
            .len();
        files.push(SavedFile {
            name,
            path: entry.into_path(),
            size_bytes,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Maps a requested file name onto a path inside `dir`. Anything that is not
/// a single normal path component is refused.
pub fn resolve_in(dir: &Path, name: &str) -> Option<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if !name.contains(['/', '\\']) => {
            Some(dir.join(part))
        }
        _ => None,
    }
}
