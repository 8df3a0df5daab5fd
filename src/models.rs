//! Data structures and types for StreamHub
//!
//! Contains all shared models used across the crate organized by domain:
//! - **Magnets**: validated magnet requests and info hashes
//! - **Debrid**: remote torrents, files, unrestricted links, transcodes
//! - **Playback**: resolved streams, delivery types, stream descriptors
//! - **Search**: torrent search results

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

// =============================================================================
// Magnet Models
// =============================================================================

/// Prefix every accepted magnet link must start with
pub const MAGNET_PREFIX: &str = "magnet:?xt=urn:btih:";

/// A magnet link that passed the prefix check, with an optional display title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnetRequest {
    uri: String,
    pub title: Option<String>,
}

impl MagnetRequest {
    /// Validate a raw magnet URI by prefix match
    pub fn parse(uri: impl Into<String>) -> Result<Self, String> {
        let uri = uri.into();
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Err("Magnet link cannot be empty".to_string());
        }
        if !trimmed.starts_with(MAGNET_PREFIX) {
            return Err(format!(
                "Invalid magnet link format (expected '{}...')",
                MAGNET_PREFIX
            ));
        }
        Ok(Self {
            uri: trimmed.to_string(),
            title: None,
        })
    }

    /// Attach a display title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// Info hash embedded in the link, if it is a 40-char hex hash
    pub fn info_hash(&self) -> Option<InfoHash> {
        InfoHash::from_magnet(&self.uri)
    }
}

impl fmt::Display for MagnetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.title {
            Some(title) => write!(f, "{} ({})", title, self.uri),
            None => write!(f, "{}", self.uri),
        }
    }
}

/// 40 lowercase hex character BitTorrent v1 info hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InfoHash(String);

fn btih_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)btih:([a-f0-9]{40})(?:[^a-f0-9]|$)").ok())
        .as_ref()
}

impl InfoHash {
    /// Extract the info hash from a magnet URI (`btih:` followed by 40 hex chars)
    pub fn from_magnet(magnet: &str) -> Option<Self> {
        btih_regex()?
            .captures(magnet)
            .and_then(|caps| caps.get(1))
            .map(|m| InfoHash(m.as_str().to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Debrid Models
// =============================================================================

/// Lifecycle status reported by the debrid provider for a torrent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentStatus {
    MagnetError,
    MagnetConversion,
    WaitingFilesSelection,
    Queued,
    Downloading,
    Downloaded,
    Error,
    Virus,
    Compressing,
    Uploading,
    Dead,
    #[serde(other)]
    Unknown,
}

impl TorrentStatus {
    /// Terminal ready state: links are available
    pub fn is_ready(&self) -> bool {
        matches!(self, TorrentStatus::Downloaded)
    }

    /// Terminal failure states; polling further will not help
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            TorrentStatus::MagnetError
                | TorrentStatus::Error
                | TorrentStatus::Virus
                | TorrentStatus::Dead
        )
    }
}

impl fmt::Display for TorrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TorrentStatus::MagnetError => "magnet_error",
            TorrentStatus::MagnetConversion => "magnet_conversion",
            TorrentStatus::WaitingFilesSelection => "waiting_files_selection",
            TorrentStatus::Queued => "queued",
            TorrentStatus::Downloading => "downloading",
            TorrentStatus::Downloaded => "downloaded",
            TorrentStatus::Error => "error",
            TorrentStatus::Virus => "virus",
            TorrentStatus::Compressing => "compressing",
            TorrentStatus::Uploading => "uploading",
            TorrentStatus::Dead => "dead",
            TorrentStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Server-side torrent record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTorrent {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub bytes: u64,
    pub status: TorrentStatus,
    #[serde(default)]
    pub progress: f64,
    /// Creation timestamp as reported by the provider (ISO 8601)
    #[serde(default)]
    pub added: String,
    /// Only present on the single-torrent info endpoint
    #[serde(default)]
    pub files: Vec<RemoteFile>,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub speed: Option<u64>,
    #[serde(default)]
    pub seeders: Option<u32>,
}

impl RemoteTorrent {
    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }

    pub fn first_link(&self) -> Option<&str> {
        self.links.first().map(String::as_str)
    }
}

impl fmt::Display for RemoteTorrent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {:.0}% ({} links)",
            self.filename,
            self.status,
            self.progress,
            self.links.len()
        )
    }
}

/// File inside a remote torrent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Index within the torrent
    pub id: u32,
    pub path: String,
    pub bytes: u64,
    #[serde(deserialize_with = "bool_from_flag")]
    pub selected: bool,
}

impl RemoteFile {
    /// File name without the leading directory components
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn container(&self) -> ContainerFormat {
        ContainerFormat::from_path(&self.path)
    }
}

/// Direct link obtained by unrestricting a link reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnrestrictedLink {
    pub id: String,
    pub filename: String,
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
    pub filesize: u64,
    /// The link reference this was derived from
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub host: String,
    /// Directly fetchable URL (expires)
    pub download: String,
    #[serde(default, deserialize_with = "bool_from_flag")]
    pub streamable: bool,
}

/// Debrid account information from `/user`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebridUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "type", default)]
    pub account_type: String,
    #[serde(default)]
    pub premium: u64,
    #[serde(default)]
    pub expiration: String,
}

impl DebridUser {
    pub fn is_premium(&self) -> bool {
        self.account_type == "premium"
    }
}

/// Server-computed transcoding URLs, keyed by format family then quality label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscodeOptions {
    /// Adaptive HLS family
    #[serde(default)]
    pub apple: BTreeMap<String, String>,
    #[serde(default)]
    pub dash: BTreeMap<String, String>,
    /// Progressive MP4 family
    #[serde(rename = "liveMP4", default)]
    pub live_mp4: BTreeMap<String, String>,
    /// WebM family
    #[serde(rename = "h264WebM", default)]
    pub h264_webm: BTreeMap<String, String>,
}

impl TranscodeOptions {
    pub fn is_empty(&self) -> bool {
        self.apple.is_empty()
            && self.dash.is_empty()
            && self.live_mp4.is_empty()
            && self.h264_webm.is_empty()
    }
}

/// Accept both `0`/`1` integers and JSON booleans
fn bool_from_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
    })
}

// =============================================================================
// Playback Models
// =============================================================================

/// How a resolved URL must be delivered to the media surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryType {
    /// HLS manifest, needs an adaptive-streaming engine
    Adaptive,
    ProgressiveMp4,
    ProgressiveWebm,
}

impl DeliveryType {
    pub fn mime_type(&self) -> &'static str {
        match self {
            DeliveryType::Adaptive => "application/x-mpegURL",
            DeliveryType::ProgressiveMp4 => "video/mp4",
            DeliveryType::ProgressiveWebm => "video/webm",
        }
    }

    pub fn is_adaptive(&self) -> bool {
        matches!(self, DeliveryType::Adaptive)
    }
}

impl fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryType::Adaptive => write!(f, "adaptive"),
            DeliveryType::ProgressiveMp4 => write!(f, "progressive-mp4"),
            DeliveryType::ProgressiveWebm => write!(f, "progressive-webm"),
        }
    }
}

/// A browser-playable URL and its delivery type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStream {
    pub url: String,
    #[serde(rename = "deliveryType")]
    pub delivery_type: DeliveryType,
}

impl ResolvedStream {
    pub fn new(url: impl Into<String>, delivery_type: DeliveryType) -> Self {
        Self {
            url: url.into(),
            delivery_type,
        }
    }

    pub fn progressive(url: impl Into<String>) -> Self {
        Self::new(url, DeliveryType::ProgressiveMp4)
    }
}

impl fmt::Display for ResolvedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.delivery_type, self.url)
    }
}

/// What the UI hands the playback adapter: a titled stream URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub title: String,
    pub url: String,
    /// Provider file id, when already known (library path)
    pub file_id: Option<String>,
}

impl StreamDescriptor {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            file_id: None,
        }
    }

    pub fn with_file_id(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    pub fn container(&self) -> ContainerFormat {
        ContainerFormat::from_path(&self.url)
    }
}

/// Video container detected from a path or URL extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Mp4,
    M4v,
    WebM,
    Hls,
    Mkv,
    Avi,
    Mov,
    Wmv,
    Flv,
    Unknown,
}

impl ContainerFormat {
    /// Detect from the extension of a path or URL (query and fragment ignored)
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let name = path.rsplit('/').next().unwrap_or(path);
        let ext = match name.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return ContainerFormat::Unknown,
        };
        match ext.as_str() {
            "mp4" => ContainerFormat::Mp4,
            "m4v" => ContainerFormat::M4v,
            "webm" => ContainerFormat::WebM,
            "m3u8" => ContainerFormat::Hls,
            "mkv" => ContainerFormat::Mkv,
            "avi" => ContainerFormat::Avi,
            "mov" => ContainerFormat::Mov,
            "wmv" => ContainerFormat::Wmv,
            "flv" => ContainerFormat::Flv,
            _ => ContainerFormat::Unknown,
        }
    }

    /// Whether this is a video file (manifests are not)
    pub fn is_video(&self) -> bool {
        !matches!(self, ContainerFormat::Unknown | ContainerFormat::Hls)
    }

    /// Containers browsers cannot play directly
    pub fn needs_transcoding(&self) -> bool {
        matches!(
            self,
            ContainerFormat::Mkv
                | ContainerFormat::Avi
                | ContainerFormat::Mov
                | ContainerFormat::Wmv
                | ContainerFormat::Flv
        )
    }

    /// Delivery type to use when the URL is played as-is
    pub fn direct_delivery(&self) -> DeliveryType {
        match self {
            ContainerFormat::Hls => DeliveryType::Adaptive,
            ContainerFormat::WebM => DeliveryType::ProgressiveWebm,
            _ => DeliveryType::ProgressiveMp4,
        }
    }
}

// =============================================================================
// Search Models
// =============================================================================

/// Torrent search hit, after field remapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentResult {
    pub name: String,
    #[serde(rename = "detailUrl")]
    pub detail_url: String,
    pub size: String,
    pub seeds: String,
    pub leech: String,
    pub magnet: String,
    pub date: Option<String>,
}

impl fmt::Display for TorrentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] 👤{}", self.name, self.size, self.seeds)
    }
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub query: String,
    pub page: u32,
    /// Page size reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(rename = "totalPages")]
    pub total_pages: u32,
    pub results: Vec<TorrentResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn test_magnet_prefix_validation() {
        assert!(MagnetRequest::parse(format!("{}{}", MAGNET_PREFIX, HASH)).is_ok());
        assert!(MagnetRequest::parse("").is_err());
        assert!(MagnetRequest::parse("http://example.com/file.torrent").is_err());
        assert!(MagnetRequest::parse("magnet:?dn=no-hash").is_err());
    }

    #[test]
    fn test_info_hash_ignores_case_and_params() {
        let upper = format!("magnet:?xt=urn:btih:{}&dn=Movie", HASH.to_uppercase());
        let with_trackers = format!(
            "magnet:?dn=Movie&xt=urn:BTIH:{}&tr=udp%3A%2F%2Ftracker",
            HASH
        );
        assert_eq!(InfoHash::from_magnet(&upper).unwrap().as_str(), HASH);
        assert_eq!(InfoHash::from_magnet(&with_trackers).unwrap().as_str(), HASH);
    }

    #[test]
    fn test_info_hash_rejects_short_hashes() {
        assert!(InfoHash::from_magnet("magnet:?xt=urn:btih:abc123").is_none());
        // 41 hex chars is not a v1 hash
        let long = format!("magnet:?xt=urn:btih:{}a", HASH);
        assert!(InfoHash::from_magnet(&long).is_none());
    }

    #[test]
    fn test_container_detection() {
        assert_eq!(ContainerFormat::from_path("Movie.2020.mkv"), ContainerFormat::Mkv);
        assert_eq!(
            ContainerFormat::from_path("https://cdn/d/ABC/Movie.MP4?token=1"),
            ContainerFormat::Mp4
        );
        assert_eq!(
            ContainerFormat::from_path("https://cdn/t/x/full.m3u8"),
            ContainerFormat::Hls
        );
        assert_eq!(ContainerFormat::from_path("https://cdn/d/ABC"), ContainerFormat::Unknown);
        assert!(ContainerFormat::Mkv.needs_transcoding());
        assert!(!ContainerFormat::Mp4.needs_transcoding());
        assert_eq!(ContainerFormat::Hls.direct_delivery(), DeliveryType::Adaptive);
    }

    #[test]
    fn test_delivery_type_serde_names() {
        let json = serde_json::to_string(&DeliveryType::ProgressiveMp4).unwrap();
        assert_eq!(json, "\"progressive-mp4\"");
        let parsed: DeliveryType = serde_json::from_str("\"adaptive\"").unwrap();
        assert_eq!(parsed, DeliveryType::Adaptive);
    }

    #[test]
    fn test_remote_file_selected_flag() {
        let file: RemoteFile =
            serde_json::from_str(r#"{"id":1,"path":"/Movie/movie.mkv","bytes":10,"selected":1}"#)
                .unwrap();
        assert!(file.selected);
        assert_eq!(file.name(), "movie.mkv");
        assert_eq!(file.container(), ContainerFormat::Mkv);
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let status: TorrentStatus = serde_json::from_str("\"something_new\"").unwrap();
        assert_eq!(status, TorrentStatus::Unknown);
        assert!(!status.is_ready());
    }
}
