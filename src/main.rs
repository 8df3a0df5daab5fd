//! StreamHub - stream torrents through Real-Debrid
//!
//! # Usage
//!
//! ```bash
//! streamhub token set <TOKEN>
//! streamhub search "big buck bunny"
//! streamhub stream "magnet:?xt=urn:btih:..." --player mpv
//! streamhub library --json
//! ```

mod commands;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use streamhub::cli::{self, Cli, Command, ExitCode, Output};

use crate::commands::Context;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    run_cli(cli, &cancel).await.into()
}

/// Logs go to stderr so JSON on stdout stays parseable
fn init_tracing(verbose: bool) {
    let default = if verbose { "streamhub=debug" } else { "streamhub=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli, cancel: &CancellationToken) -> ExitCode {
    let output = Output::new(&cli);

    let ctx = match Context::load(&cli, &output) {
        Ok(ctx) => ctx,
        Err(code) => return code,
    };

    match cli.command {
        Command::Search(cmd) => commands::search_cmd(cmd, &ctx, &output).await,

        Command::Available(cmd) => {
            if let Err(e) = cli::validate_magnet(&cmd.magnet) {
                return output.error(e, ExitCode::InvalidArgs);
            }
            commands::available_cmd(cmd, &ctx, &output).await
        }

        Command::Add(cmd) => {
            if let Err(e) = cli::validate_magnet(&cmd.magnet) {
                return output.error(e, ExitCode::InvalidArgs);
            }
            commands::add_cmd(cmd, &ctx, &output).await
        }

        Command::Stream(cmd) => {
            if let Err(e) = cli::validate_magnet(&cmd.magnet) {
                return output.error(e, ExitCode::InvalidArgs);
            }
            commands::stream_cmd(cmd, &ctx, &output, cancel).await
        }

        Command::Library(cmd) => commands::library_cmd(cmd, &ctx, &output).await,

        Command::Play(cmd) => commands::play_cmd(cmd, &ctx, &output, cancel).await,

        Command::Delete(cmd) => commands::delete_cmd(cmd, &ctx, &output).await,

        Command::Token(cmd) => commands::token_cmd(cmd, &ctx, &output).await,
    }
}
