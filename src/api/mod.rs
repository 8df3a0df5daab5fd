//! API clients for external services
//!
//! - Debrid: Real-Debrid torrent processing, unrestricting and transcoding
//! - Search: torrent search proxy returning magnet links

pub mod debrid;
pub mod search;

pub use debrid::{DebridClient, DebridError, DebridResult};
pub use search::{FieldLayout, SearchClient, SearchError};
