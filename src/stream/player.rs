//! Local Player - VLC/mpv playback surface
//!
//! Opens resolved streams in VLC or mpv. Both players fetch HLS manifests
//! and segments themselves, so they serve as the adaptive engine too.

use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::stream::playback::{MediaSurface, SurfaceError};

/// Supported local players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerType {
    /// mpv media player (default)
    #[default]
    Mpv,
    /// VLC media player
    Vlc,
}

impl PlayerType {
    /// Parse a configured player name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mpv" => Some(PlayerType::Mpv),
            "vlc" => Some(PlayerType::Vlc),
            _ => None,
        }
    }

    /// Get the command name for this player
    pub fn command(&self) -> &'static str {
        match self {
            PlayerType::Vlc => {
                // On macOS, VLC is an app bundle - check for it
                #[cfg(target_os = "macos")]
                if std::path::Path::new("/Applications/VLC.app").exists() {
                    return "/Applications/VLC.app/Contents/MacOS/VLC";
                }
                "vlc"
            }
            PlayerType::Mpv => "mpv",
        }
    }

    /// Get a display name for this player
    pub fn display_name(&self) -> &'static str {
        match self {
            PlayerType::Vlc => "VLC",
            PlayerType::Mpv => "mpv",
        }
    }
}

impl std::fmt::Display for PlayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Local player process acting as a media surface
pub struct LocalPlayer {
    player_type: PlayerType,
    title: Option<String>,
    child: Option<Child>,
}

impl LocalPlayer {
    pub fn new(player_type: PlayerType) -> Self {
        Self {
            player_type,
            title: None,
            child: None,
        }
    }

    /// Window title shown by the player
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn player_type(&self) -> PlayerType {
        self.player_type
    }

    /// Check if the player is available on the system
    pub async fn is_available(&self) -> bool {
        let cmd = self.player_type.command();

        // If it's a full path (macOS app bundle), check if it exists
        if cmd.starts_with('/') {
            return std::path::Path::new(cmd).exists();
        }

        Command::new("which")
            .arg(cmd)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Wait for the running player to exit
    pub async fn wait(&mut self) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;
        let status = child.wait().await.ok();
        self.child = None;
        status
    }

    fn build_command(&self, url: &str) -> Command {
        let mut cmd = Command::new(self.player_type.command());
        cmd.arg(url);

        match self.player_type {
            PlayerType::Vlc => {
                cmd.arg("--no-video-title-show");
                if let Some(title) = &self.title {
                    cmd.arg(format!("--meta-title={}", title));
                }
            }
            PlayerType::Mpv => {
                cmd.arg("--force-window=immediate");
                if let Some(title) = &self.title {
                    cmd.arg(format!("--force-media-title={}", title));
                }
            }
        }

        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        cmd
    }

    fn launch(&mut self, url: &str) -> Result<(), SurfaceError> {
        self.detach();

        let child = self.build_command(url).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SurfaceError::NotFound(self.player_type.command().to_string())
            } else {
                SurfaceError::StartFailed(e)
            }
        })?;

        debug!(player = %self.player_type, pid = ?child.id(), "player launched");
        self.child = Some(child);
        Ok(())
    }
}

impl MediaSurface for LocalPlayer {
    fn attach_adaptive(&mut self, url: &str) -> Result<(), SurfaceError> {
        self.launch(url)
    }

    fn set_source(&mut self, url: &str, mime_type: &str) -> Result<(), SurfaceError> {
        debug!(mime_type, "setting direct source");
        self.launch(url)
    }

    fn detach(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
    }
}
