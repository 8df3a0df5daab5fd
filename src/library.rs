//! Library helpers
//!
//! The library is the set of torrents already on the debrid account. These
//! helpers filter it down to playable entries and derive display info from
//! release filenames.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::models::{ContainerFormat, RemoteFile, RemoteTorrent};

/// Title, year and quality guessed from a release name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseInfo {
    pub title: String,
    pub year: Option<u16>,
    pub quality: Option<String>,
}

/// Only torrents that finished downloading can be played
pub fn downloaded_only(torrents: Vec<RemoteTorrent>) -> Vec<RemoteTorrent> {
    torrents.into_iter().filter(|t| t.is_ready()).collect()
}

/// Files of a torrent whose extension is a known video container
pub fn video_files(files: &[RemoteFile]) -> Vec<&RemoteFile> {
    files.iter().filter(|f| f.container().is_video()).collect()
}

fn year_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").ok())
        .as_ref()
}

fn quality_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(2160p|1080p|720p|480p)\b").ok())
        .as_ref()
}

/// Parse a release name like `The.Matrix.1999.1080p.BluRay.x264.mkv`.
///
/// The title is everything before the year (or quality tag), with dots and
/// underscores turned into spaces.
pub fn release_info(filename: &str) -> ReleaseInfo {
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) if ContainerFormat::from_path(filename).is_video() => stem,
        _ => filename,
    };
    let normalized = stem.replace(['.', '_'], " ");

    let year_match = year_regex().and_then(|re| re.find(&normalized));
    let quality_match = quality_regex().and_then(|re| re.find(&normalized));

    let cut = [year_match.map(|m| m.start()), quality_match.map(|m| m.start())]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(normalized.len());

    let mut title = normalized[..cut]
        .trim()
        .trim_end_matches(['(', '[', '-'])
        .trim()
        .to_string();
    if title.is_empty() {
        title = normalized.trim().to_string();
    }

    ReleaseInfo {
        title,
        year: year_match.and_then(|m| m.as_str().parse().ok()),
        quality: quality_match.map(|m| m.as_str().to_lowercase()),
    }
}

/// Format a byte count as GB above 1 GiB, MB otherwise
pub fn format_size(bytes: u64) -> String {
    let gb = bytes as f64 / (1024.0 * 1024.0 * 1024.0);
    if gb >= 1.0 {
        return format!("{:.1} GB", gb);
    }
    let mb = bytes as f64 / (1024.0 * 1024.0);
    format!("{:.1} MB", mb)
}
