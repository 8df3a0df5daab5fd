//! CLI Command Tests
//!
//! Argument parsing, JSON output format and exit code mapping.

// =============================================================================
// CLI Argument Parsing Tests
// =============================================================================

mod cli_parsing {
    use clap::Parser;
    use streamhub::cli::{Cli, Command, PlayerChoice, TokenAction};

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["streamhub"]).is_err());
    }

    #[test]
    fn test_search_defaults() {
        let cli = Cli::parse_from(["streamhub", "search", "bunny"]);
        match cli.command {
            Command::Search(cmd) => {
                assert_eq!(cmd.query, "bunny");
                assert_eq!(cmd.page, 1);
                assert_eq!(cmd.limit, 20);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_search_alias() {
        let cli = Cli::parse_from(["streamhub", "s", "bunny", "--limit", "5"]);
        match cli.command {
            Command::Search(cmd) => assert_eq!(cmd.limit, 5),
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_stream_command() {
        let cli = Cli::parse_from([
            "streamhub",
            "stream",
            "magnet:?xt=urn:btih:abc",
            "--title",
            "Bunny",
            "--player",
            "mpv",
            "--url-only",
        ]);
        match cli.command {
            Command::Stream(cmd) => {
                assert_eq!(cmd.magnet, "magnet:?xt=urn:btih:abc");
                assert_eq!(cmd.title.as_deref(), Some("Bunny"));
                assert_eq!(cmd.player, Some(PlayerChoice::Mpv));
                assert!(cmd.url_only);
            }
            _ => panic!("Expected Stream command"),
        }
    }

    #[test]
    fn test_library_all() {
        let cli = Cli::parse_from(["streamhub", "library", "--all"]);
        match cli.command {
            Command::Library(cmd) => assert!(cmd.all),
            _ => panic!("Expected Library command"),
        }
    }

    #[test]
    fn test_delete_alias() {
        let cli = Cli::parse_from(["streamhub", "rm", "t1"]);
        match cli.command {
            Command::Delete(cmd) => assert_eq!(cmd.torrent_id, "t1"),
            _ => panic!("Expected Delete command"),
        }
    }

    #[test]
    fn test_token_subcommands() {
        for (arg, expected) in [("clear", "clear"), ("verify", "verify"), ("show", "show")] {
            let cli = Cli::parse_from(["streamhub", "token", arg]);
            let name = match cli.command {
                Command::Token(cmd) => match cmd.action {
                    TokenAction::Clear => "clear",
                    TokenAction::Verify => "verify",
                    TokenAction::Show => "show",
                    TokenAction::Set { .. } => "set",
                },
                _ => panic!("Expected Token command"),
            };
            assert_eq!(name, expected);
        }
    }

    #[test]
    fn test_invalid_player_rejected() {
        let result = Cli::try_parse_from(["streamhub", "stream", "magnet:?x", "--player", "quicktime"]);
        assert!(result.is_err());
    }
}

// =============================================================================
// JSON Output Tests
// =============================================================================

mod json_output {
    use streamhub::cli::{ExitCode, JsonOutput, StatusOk};
    use streamhub::models::ResolvedStream;
    use streamhub::stream::PlaybackState;

    #[test]
    fn test_json_output_success() {
        let output = JsonOutput::success("test data");
        let json = serde_json::to_string(&output).unwrap();

        assert!(json.contains("\"data\":\"test data\""));
        assert!(!json.contains("error"));
        assert!(!json.contains("exit_code"));
    }

    #[test]
    fn test_json_output_error() {
        let output = JsonOutput::<()>::error_msg("Token rejected", ExitCode::AuthRequired);
        let json = serde_json::to_string(&output).unwrap();

        assert!(json.contains("\"error\":\"Token rejected\""));
        assert!(json.contains("\"exit_code\":4"));
        assert!(!json.contains("\"data\""));
    }

    #[test]
    fn test_status_ok_format() {
        let json = serde_json::to_string(&StatusOk::default()).unwrap();
        assert_eq!(json, r#"{"status":"ok"}"#);
    }

    #[test]
    fn test_resolved_stream_format() {
        let json = serde_json::to_string(&ResolvedStream::progressive("https://cdn/x.mp4")).unwrap();
        assert_eq!(
            json,
            r#"{"url":"https://cdn/x.mp4","deliveryType":"progressive-mp4"}"#
        );
    }

    #[test]
    fn test_playback_state_format() {
        let json = serde_json::to_string(&PlaybackState::Idle).unwrap();
        assert_eq!(json, r#"{"state":"idle"}"#);

        let json = serde_json::to_string(&PlaybackState::Error {
            message: "boom".into(),
        })
        .unwrap();
        assert!(json.contains("\"state\":\"error\""));
        assert!(json.contains("\"message\":\"boom\""));
    }
}

// =============================================================================
// Output Helper Tests
// =============================================================================

mod output_helpers {
    use clap::Parser;
    use streamhub::api::DebridError;
    use streamhub::cli::{validate_magnet, Cli, ExitCode, Output, StatusOk};

    #[test]
    fn test_output_json_mode() {
        let cli = Cli::parse_from(["streamhub", "--json", "library"]);
        let output = Output::new(&cli);
        assert!(output.json);
    }

    #[test]
    fn test_output_quiet_mode() {
        let cli = Cli::parse_from(["streamhub", "--quiet", "library"]);
        let output = Output::new(&cli);
        assert!(output.quiet);
    }

    #[test]
    fn test_debrid_error_exit_code() {
        let cli = Cli::parse_from(["streamhub", "--quiet", "library"]);
        let output = Output {
            json: false,
            quiet: cli.quiet,
        };
        let code = output.debrid_error(&DebridError::Auth("no token".into()));
        assert_eq!(code, ExitCode::AuthRequired);

        let code = output.debrid_error(&DebridError::Cancelled);
        assert_eq!(code, ExitCode::Cancelled);
    }

    #[test]
    fn test_print_reports_serialize_failure() {
        use std::collections::HashMap;

        // JSON object keys must be strings
        let mut unserializable = HashMap::new();
        unserializable.insert((1u8, 2u8), "x");

        let output = Output {
            json: true,
            quiet: true,
        };
        assert!(output.print(&unserializable).is_err());
        assert!(output.print(StatusOk::default()).is_ok());
    }

    #[test]
    fn test_validate_magnet() {
        assert!(validate_magnet("magnet:?xt=urn:btih:0123456789abcdef").is_ok());
        assert!(validate_magnet("magnet:?dn=no-hash").is_err());
        assert!(validate_magnet("https://example.com/a.torrent").is_err());
    }
}
