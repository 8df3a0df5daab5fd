//! Playback session state machine
//!
//! Binds a [`StreamDescriptor`] to a [`MediaSurface`]: decides whether the
//! URL needs format negotiation, attaches the result adaptively or as a
//! direct source, and performs a single progressive fallback when the
//! adaptive engine reports a fatal error.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{ContainerFormat, DeliveryType, ResolvedStream, StreamDescriptor};
use crate::stream::negotiate::FallbackChain;
use crate::stream::resolver::{file_id_from_url, StreamResolver};

/// Errors raised by a media surface
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Player '{0}' not found. Install it first.")]
    NotFound(String),
    #[error("Failed to start player: {0}")]
    StartFailed(#[from] std::io::Error),
    #[error("Source rejected: {0}")]
    Rejected(String),
}

/// Where resolved media ends up (a video element, a local player, ...)
pub trait MediaSurface {
    /// Hand an HLS manifest to an adaptive-streaming engine
    fn attach_adaptive(&mut self, url: &str) -> Result<(), SurfaceError>;

    /// Play a progressive file directly
    fn set_source(&mut self, url: &str, mime_type: &str) -> Result<(), SurfaceError>;

    /// Tear down whatever is attached
    fn detach(&mut self);
}

/// Lifecycle of one playback session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Loading,
    Ready { stream: ResolvedStream },
    Error { message: String },
}

impl PlaybackState {
    pub fn is_ready(&self) -> bool {
        matches!(self, PlaybackState::Ready { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PlaybackState::Error { .. })
    }

    pub fn stream(&self) -> Option<&ResolvedStream> {
        match self {
            PlaybackState::Ready { stream } => Some(stream),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            PlaybackState::Error { message } => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Loading => write!(f, "Loading..."),
            PlaybackState::Ready { stream } => write!(f, "Ready {}", stream),
            PlaybackState::Error { message } => write!(f, "Error: {}", message),
        }
    }
}

/// One playback attempt. A new attempt is a new session.
pub struct PlaybackSession<'r, S: MediaSurface> {
    id: Uuid,
    resolver: &'r StreamResolver,
    surface: S,
    state: PlaybackState,
    descriptor: Option<StreamDescriptor>,
    fallback_used: bool,
}

impl<'r, S: MediaSurface> PlaybackSession<'r, S> {
    pub fn new(resolver: &'r StreamResolver, surface: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            resolver,
            surface,
            state: PlaybackState::Idle,
            descriptor: None,
            fallback_used: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn descriptor(&self) -> Option<&StreamDescriptor> {
        self.descriptor.as_ref()
    }

    /// Idle → Loading → Ready/Error.
    ///
    /// URLs already in a browser-playable container skip negotiation. A
    /// session that has left Idle ignores further loads.
    pub async fn load(
        &mut self,
        descriptor: StreamDescriptor,
        cancel: &CancellationToken,
    ) -> &PlaybackState {
        if self.state != PlaybackState::Idle {
            warn!(session = %self.id, state = %self.state, "load ignored, session already started");
            return &self.state;
        }

        self.state = PlaybackState::Loading;
        info!(session = %self.id, title = %descriptor.title, "loading stream");

        let resolved = self.resolver.resolve_descriptor(&descriptor, cancel).await;
        self.descriptor = Some(descriptor);

        match resolved {
            Ok(stream) => self.attach(stream),
            Err(e) => {
                warn!(session = %self.id, error = %e, "stream resolution failed");
                self.fail(e.user_message());
            }
        }
        &self.state
    }

    /// Ready → (fallback) Ready, or → Error.
    ///
    /// Only the adaptive engine earns a fallback, and only once: the stream
    /// is re-negotiated as progressive MP4 and attached as a direct source.
    /// A bare manifest with no progressive rendition goes to Error.
    pub async fn handle_fatal_error(
        &mut self,
        reason: &str,
        cancel: &CancellationToken,
    ) -> &PlaybackState {
        let current = match &self.state {
            PlaybackState::Ready { stream } => stream.clone(),
            _ => {
                warn!(session = %self.id, reason, "fatal error outside Ready ignored");
                return &self.state;
            }
        };

        warn!(session = %self.id, reason, delivery = %current.delivery_type, "fatal playback error");

        if !current.delivery_type.is_adaptive() || self.fallback_used {
            self.surface.detach();
            self.fail(format!("Playback failed: {}", reason));
            return &self.state;
        }

        self.fallback_used = true;
        self.surface.detach();

        let (url, file_id) = match &self.descriptor {
            Some(d) => (d.url.clone(), d.file_id.clone()),
            None => (current.url.clone(), None),
        };
        let file_id = file_id.or_else(|| file_id_from_url(&url));

        let fallback = self
            .resolver
            .negotiate_with(
                &FallbackChain::progressive_only(),
                &url,
                file_id.as_deref(),
                cancel,
            )
            .await;

        match fallback {
            // A manifest re-served as a file is not a progressive stream
            Ok(negotiation)
                if negotiation.stream.url == current.url
                    || ContainerFormat::from_path(&negotiation.stream.url) == ContainerFormat::Hls =>
            {
                warn!(session = %self.id, url = %negotiation.stream.url, "no progressive source available");
                self.fail(format!("Playback failed: {} (no progressive fallback)", reason));
            }
            Ok(negotiation) => {
                info!(session = %self.id, url = %negotiation.stream.url, "falling back to progressive source");
                let stream = ResolvedStream::progressive(negotiation.stream.url);
                self.attach(stream);
            }
            Err(e) => self.fail(e.user_message()),
        }
        &self.state
    }

    fn attach(&mut self, stream: ResolvedStream) {
        let attached = match stream.delivery_type {
            DeliveryType::Adaptive => self.surface.attach_adaptive(&stream.url),
            other => self.surface.set_source(&stream.url, other.mime_type()),
        };

        match attached {
            Ok(()) => {
                info!(session = %self.id, stream = %stream, "playback ready");
                self.state = PlaybackState::Ready { stream };
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "media surface rejected source");
                self.fail(e.to_string());
            }
        }
    }

    fn fail(&mut self, message: String) {
        self.state = PlaybackState::Error { message };
    }
}
