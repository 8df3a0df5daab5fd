//! Streaming pipeline
//!
//! - Retry: bounded polling with backoff and cancellation
//! - Negotiate: ordered format fallback chain
//! - Resolver: magnet / library link → playable stream
//! - Playback: session state machine over a media surface
//! - Player: VLC/mpv media surface

pub mod negotiate;
pub mod playback;
pub mod player;
pub mod resolver;
pub mod retry;

pub use negotiate::{FallbackChain, FormatStrategy, Negotiation};
pub use playback::{MediaSurface, PlaybackSession, PlaybackState, SurfaceError};
pub use player::{LocalPlayer, PlayerType};
pub use resolver::StreamResolver;
pub use retry::{poll_until, Backoff, PollPolicy, Polled, RetryError};
