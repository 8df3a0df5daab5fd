//! StreamHub - stream torrents through Real-Debrid
//!
//! Search for torrents, hand magnet links to Real-Debrid, wait for them to
//! be cached and play the resulting direct or transcoded stream.
//!
//! # Modules
//!
//! - `models` - Data structures for torrents, links, streams and search
//! - `api` - API clients (Real-Debrid, torrent search)
//! - `stream` - Stream resolution, format negotiation and playback
//! - `library` - Helpers for browsing downloaded torrents
//! - `config` - Settings file and API credential
//! - `cli` - Command line surface

pub mod api;
pub mod cli;
pub mod config;
pub mod library;
pub mod models;
pub mod stream;

// Re-export commonly used types
pub use models::{
    DeliveryType, InfoHash, MagnetRequest, RemoteFile, RemoteTorrent, ResolvedStream,
    StreamDescriptor, TorrentResult, TorrentStatus, TranscodeOptions, UnrestrictedLink,
};

pub use api::{DebridClient, DebridError, SearchClient};
pub use config::{Config, Credentials};
pub use stream::{PlaybackSession, PlaybackState, StreamResolver};
