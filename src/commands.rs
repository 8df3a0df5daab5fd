//! CLI Command Handlers
//!
//! Implements all CLI commands by calling the appropriate backend services.
//! Each handler takes CLI args and Output, returns ExitCode.

use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use streamhub::api::{DebridClient, SearchClient};
use streamhub::cli::{
    AddCmd, AvailableCmd, Cli, DeleteCmd, ExitCode, LibraryCmd, Output, PlayCmd, PlayerChoice,
    SearchCmd, StatusOk, StreamCmd, TokenAction, TokenCmd,
};
use streamhub::config::{Config, Credentials};
use streamhub::library::{self, ReleaseInfo};
use streamhub::models::{RemoteTorrent, ResolvedStream, StreamDescriptor};
use streamhub::stream::{
    LocalPlayer, MediaSurface, PlaybackSession, PlaybackState, PlayerType, StreamResolver,
};

// =============================================================================
// Shared Context
// =============================================================================

/// Settings, credential and clients shared by the handlers
pub struct Context {
    pub config: Config,
    pub config_path: PathBuf,
    pub credentials: Credentials,
    pub client: DebridClient,
}

impl Context {
    /// Load settings from `--config` or the default location
    pub fn load(cli: &Cli, output: &Output) -> Result<Self, ExitCode> {
        let config_path = match cli.config.clone().or_else(Config::path) {
            Some(path) => path,
            None => {
                return Err(output.error(
                    "Could not determine a config directory. Pass --config <path>.",
                    ExitCode::InvalidArgs,
                ))
            }
        };

        let config = Config::load_from(&config_path)
            .map_err(|e| output.error(e.to_string(), ExitCode::InvalidArgs))?;

        let credentials = Credentials::persisted(&config_path);
        credentials
            .reload()
            .map_err(|e| output.error(e.to_string(), ExitCode::InvalidArgs))?;

        debug!(path = %config_path.display(), token = credentials.is_configured(), "config loaded");

        let client = DebridClient::with_base_url(credentials.clone(), config.api_base_url());
        Ok(Self {
            config,
            config_path,
            credentials,
            client,
        })
    }

    fn resolver(&self) -> StreamResolver {
        StreamResolver::from_config(self.client.clone(), &self.config)
    }

    fn player_type(&self, choice: Option<PlayerChoice>) -> PlayerType {
        choice
            .map(PlayerType::from)
            .or_else(|| self.config.player.as_deref().and_then(PlayerType::from_name))
            .unwrap_or_default()
    }
}

// =============================================================================
// Search Command
// =============================================================================

pub async fn search_cmd(cmd: SearchCmd, ctx: &Context, output: &Output) -> ExitCode {
    let client = SearchClient::from_config(&ctx.config.search);

    output.info(format!("Searching for: {}", cmd.query));

    match client.search(&cmd.query, cmd.page).await {
        Ok(mut page) => {
            page.results.truncate(cmd.limit);

            if output.json {
                if let Err(e) = output.print(&page) {
                    return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
                }
            } else {
                for result in &page.results {
                    output.line(result);
                }
                output.info(format!("Page {} of {}", page.page, page.total_pages));
            }
            ExitCode::Success
        }
        Err(e) => output.error(format!("Search failed: {}", e), ExitCode::NetworkError),
    }
}

// =============================================================================
// Available / Add Commands
// =============================================================================

pub async fn available_cmd(cmd: AvailableCmd, ctx: &Context, output: &Output) -> ExitCode {
    #[derive(Serialize)]
    struct Availability {
        magnet: String,
        cached: bool,
    }

    match ctx.client.instant_availability(&cmd.magnet).await {
        Ok(cached) => {
            if output.json {
                let response = Availability {
                    magnet: cmd.magnet,
                    cached,
                };
                if let Err(e) = output.print(&response) {
                    return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
                }
            } else if cached {
                output.line("Cached: ready to stream");
            } else {
                output.line("Not cached: streaming will wait for Real-Debrid");
            }
            ExitCode::Success
        }
        Err(e) => output.debrid_error(&e),
    }
}

pub async fn add_cmd(cmd: AddCmd, ctx: &Context, output: &Output) -> ExitCode {
    #[derive(Serialize)]
    struct Added {
        status: &'static str,
        torrent_id: String,
    }

    let torrent_id = match ctx.client.submit_magnet(&cmd.magnet).await {
        Ok(id) => id,
        Err(e) => return output.debrid_error(&e),
    };

    if let Err(e) = ctx.client.select_all_files(&torrent_id).await {
        return output.debrid_error(&e);
    }

    output.info(format!("Added to library: {}", torrent_id));
    let response = Added {
        status: "added",
        torrent_id,
    };
    if let Err(e) = output.print(&response) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

// =============================================================================
// Stream Command
// =============================================================================

pub async fn stream_cmd(
    cmd: StreamCmd,
    ctx: &Context,
    output: &Output,
    cancel: &CancellationToken,
) -> ExitCode {
    let resolver = ctx.resolver();
    output.info("Submitting magnet to Real-Debrid...");

    let stream = match resolver.resolve(&cmd.magnet, cancel).await {
        Ok(stream) => stream,
        Err(e) => return output.debrid_error(&e),
    };

    let title = cmd
        .title
        .clone()
        .or_else(|| title_from_url(&stream.url))
        .unwrap_or_else(|| "Real-Debrid stream".to_string());
    let descriptor = StreamDescriptor::new(title, stream.url);

    if cmd.url_only {
        return print_stream(&resolver, &descriptor, output, cancel).await;
    }

    play(&resolver, descriptor, ctx.player_type(cmd.player), output, cancel).await
}

// =============================================================================
// Library Commands
// =============================================================================

/// One row of the library listing
#[derive(Debug, Serialize)]
struct LibraryEntry {
    id: String,
    filename: String,
    status: String,
    progress: f64,
    size: String,
    links: usize,
    #[serde(flatten)]
    info: ReleaseInfo,
}

impl From<&RemoteTorrent> for LibraryEntry {
    fn from(torrent: &RemoteTorrent) -> Self {
        Self {
            id: torrent.id.clone(),
            filename: torrent.filename.clone(),
            status: torrent.status.to_string(),
            progress: torrent.progress,
            size: library::format_size(torrent.bytes),
            links: torrent.links.len(),
            info: library::release_info(&torrent.filename),
        }
    }
}

pub async fn library_cmd(cmd: LibraryCmd, ctx: &Context, output: &Output) -> ExitCode {
    let torrents = match ctx.client.list_torrents().await {
        Ok(torrents) => torrents,
        Err(e) => return output.debrid_error(&e),
    };

    let torrents = if cmd.all {
        torrents
    } else {
        library::downloaded_only(torrents)
    };

    if torrents.is_empty() {
        output.info("No downloaded torrents. Add one with `streamhub add <magnet>`.");
    }

    let entries: Vec<LibraryEntry> = torrents.iter().map(LibraryEntry::from).collect();

    if output.json {
        if let Err(e) = output.print(&entries) {
            return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
        }
    } else {
        for entry in &entries {
            let year = entry.info.year.map(|y| format!(" ({})", y)).unwrap_or_default();
            let quality = entry.info.quality.as_deref().unwrap_or("Unknown");
            output.line(format!(
                "{}  {}{}  {}  {}  [{}]",
                entry.id, entry.info.title, year, quality, entry.size, entry.status
            ));
        }
    }
    ExitCode::Success
}

pub async fn play_cmd(
    cmd: PlayCmd,
    ctx: &Context,
    output: &Output,
    cancel: &CancellationToken,
) -> ExitCode {
    let resolver = ctx.resolver();

    let torrent = match ctx.client.torrent_status(&cmd.torrent_id).await {
        Ok(torrent) => torrent,
        Err(e) => return output.debrid_error(&e),
    };

    let videos = library::video_files(&torrent.files);
    if !torrent.files.is_empty() && videos.is_empty() {
        warn!(torrent_id = %torrent.id, "torrent has no video files");
    }

    let link = match resolver
        .resolve_library_entry(&torrent, cmd.file, cancel)
        .await
    {
        Ok(link) => link,
        Err(e) if e.is_remote() => return output.error(e.user_message(), ExitCode::NoStreams),
        Err(e) => return output.debrid_error(&e),
    };

    let title = library::release_info(&link.filename).title;
    let descriptor = StreamDescriptor::new(title, link.download).with_file_id(link.id);

    if cmd.url_only {
        return print_stream(&resolver, &descriptor, output, cancel).await;
    }

    play(&resolver, descriptor, ctx.player_type(cmd.player), output, cancel).await
}

pub async fn delete_cmd(cmd: DeleteCmd, ctx: &Context, output: &Output) -> ExitCode {
    match ctx.client.delete_torrent(&cmd.torrent_id).await {
        Ok(()) => {
            output.info(format!("Deleted {}", cmd.torrent_id));
            if let Err(e) = output.print(StatusOk::default()) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Err(e) => output.debrid_error(&e),
    }
}

// =============================================================================
// Token Command
// =============================================================================

pub async fn token_cmd(cmd: TokenCmd, ctx: &Context, output: &Output) -> ExitCode {
    match cmd.action {
        TokenAction::Set { token } => {
            if token.trim().is_empty() {
                return output.error("Token must not be empty", ExitCode::InvalidArgs);
            }
            if let Err(e) = ctx.credentials.set(token) {
                return output.error(e.to_string(), ExitCode::Error);
            }
            output.info(format!("Token saved to {}", ctx.config_path.display()));
            if !ctx.client.verify_token().await {
                output.info("Warning: Real-Debrid did not accept this token");
            }
            ExitCode::Success
        }
        TokenAction::Clear => match ctx.credentials.clear() {
            Ok(()) => {
                output.info("Token removed");
                ExitCode::Success
            }
            Err(e) => output.error(e.to_string(), ExitCode::Error),
        },
        TokenAction::Verify => match ctx.client.user().await {
            Ok(user) => {
                if output.json {
                    if let Err(e) = output.print(&user) {
                        return output
                            .error(format!("Failed to serialize: {}", e), ExitCode::Error);
                    }
                } else {
                    output.line(format!(
                        "{} ({}), expires {}",
                        user.username, user.account_type, user.expiration
                    ));
                }
                ExitCode::Success
            }
            Err(e) => output.debrid_error(&e),
        },
        TokenAction::Show => {
            #[derive(Serialize)]
            struct TokenStatus {
                configured: bool,
                path: String,
            }
            let status = TokenStatus {
                configured: ctx.credentials.is_configured(),
                path: ctx.config_path.display().to_string(),
            };
            if output.json {
                if let Err(e) = output.print(&status) {
                    return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
                }
            } else if status.configured {
                output.line("API token configured");
            } else {
                output.line("No API token. Run `streamhub token set <TOKEN>`.");
            }
            ExitCode::Success
        }
    }
}

// =============================================================================
// Playback Helpers
// =============================================================================

/// Release title from the last path segment of a download URL
fn title_from_url(url: &str) -> Option<String> {
    let segment = url.split(['?', '#']).next()?.rsplit('/').next()?;
    let filename = urlencoding::decode(segment).ok()?;
    let info = library::release_info(&filename);
    (!info.title.is_empty()).then_some(info.title)
}

async fn print_stream(
    resolver: &StreamResolver,
    descriptor: &StreamDescriptor,
    output: &Output,
    cancel: &CancellationToken,
) -> ExitCode {
    let stream: ResolvedStream = match resolver.resolve_descriptor(descriptor, cancel).await {
        Ok(stream) => stream,
        Err(e) => return output.debrid_error(&e),
    };

    if output.json {
        if let Err(e) = output.print(&stream) {
            return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
        }
    } else {
        output.line(&stream.url);
    }
    ExitCode::Success
}

/// Open the descriptor in a local player and babysit it.
///
/// A non-zero player exit while playing an adaptive stream is treated as
/// a fatal engine error and triggers the session's progressive fallback.
async fn play(
    resolver: &StreamResolver,
    descriptor: StreamDescriptor,
    player_type: PlayerType,
    output: &Output,
    cancel: &CancellationToken,
) -> ExitCode {
    let player = LocalPlayer::new(player_type).with_title(descriptor.title.clone());
    if !player.is_available().await {
        return output.error(
            format!("{} not found. Install it first.", player_type.display_name()),
            ExitCode::PlaybackFailed,
        );
    }

    output.info(format!("Opening in {}...", player_type.display_name()));

    let mut session = PlaybackSession::new(resolver, player);
    session.load(descriptor, cancel).await;

    loop {
        match session.state() {
            PlaybackState::Ready { stream } => {
                debug!(session = %session.id(), stream = %stream, "waiting for player");
                if output.json {
                    if let Err(e) = output.print(stream) {
                        session.surface_mut().detach();
                        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
                    }
                } else {
                    output.info(format!("Playing {}", stream));
                }
            }
            PlaybackState::Error { message } => {
                return output.error(message.clone(), ExitCode::PlaybackFailed);
            }
            PlaybackState::Idle | PlaybackState::Loading => {
                return output.error("Playback did not start", ExitCode::PlaybackFailed);
            }
        }

        let exit = tokio::select! {
            status = session.surface_mut().wait() => Some(status),
            _ = cancel.cancelled() => None,
        };

        let Some(exit) = exit else {
            session.surface_mut().detach();
            return ExitCode::Cancelled;
        };

        match exit {
            Some(status) if !status.success() => {
                let reason = format!("{} exited with {}", player_type.display_name(), status);
                session.handle_fatal_error(&reason, cancel).await;
            }
            _ => return ExitCode::Success,
        }
    }
}
