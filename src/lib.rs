#![forbid(unsafe_code)]

//! Library behind the ytdash dashboard and the `fetch` command.
//!
//! Everything that touches the network goes through the external `yt-dlp`
//! program (see [`ytdlp`]); this crate picks format selectors, names files,
//! and drives single and batch runs.

pub mod batch;
pub mod config;
pub mod dashboard;
pub mod failure;
pub mod files;
pub mod format;
pub mod logging;
pub mod media;
pub mod options;
pub mod progress;
pub mod sanitize;
pub mod single;
pub mod ytdlp;

#[cfg(test)]
mod testing;
