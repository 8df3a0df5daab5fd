//! Stream resolver tests
//!
//! Runs the full magnet → stream pipeline against a mock Real-Debrid API
//! with a millisecond poll interval.

use mockito::{Matcher, Mock, Server, ServerGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use streamhub::api::{DebridClient, DebridError};
use streamhub::config::Credentials;
use streamhub::models::{DeliveryType, ResolvedStream, RemoteTorrent};
use streamhub::stream::{FallbackChain, FormatStrategy, StreamResolver};

const MAGNET: &str = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567";

fn resolver(server: &ServerGuard, max_attempts: u32) -> StreamResolver {
    let client = DebridClient::with_base_url(Credentials::from_token("tok"), server.url());
    StreamResolver::new(client).with_poll_interval(Duration::from_millis(1), max_attempts)
}

async fn mock_submit(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/torrents/addMagnet")
        .with_status(201)
        .with_body(r#"{"id": "t1", "uri": "https://x/torrents/info/t1"}"#)
        .create_async()
        .await
}

async fn mock_select(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/torrents/selectFiles/t1")
        .match_body(Matcher::UrlEncoded("files".into(), "all".into()))
        .with_status(204)
        .create_async()
        .await
}

async fn mock_status(server: &mut ServerGuard, body: &str, hits: usize) -> Mock {
    server
        .mock("GET", "/torrents/info/t1")
        .with_status(200)
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}

const DOWNLOADING: &str = r#"{"id": "t1", "status": "downloading", "progress": 42, "links": []}"#;
const DOWNLOADED: &str =
    r#"{"id": "t1", "status": "downloaded", "progress": 100, "links": ["l1"]}"#;

async fn mock_unrestrict(server: &mut ServerGuard, download: &str) -> Mock {
    server
        .mock("POST", "/unrestrict/link")
        .match_body(Matcher::UrlEncoded("link".into(), "l1".into()))
        .with_status(200)
        .with_body(format!(
            r#"{{"id": "F1", "filename": "x.mp4", "mimeType": "video/mp4", "filesize": 10,
                 "link": "l1", "host": "real-debrid.com", "download": "{}", "streamable": 1}}"#,
            download
        ))
        .create_async()
        .await
}

// =============================================================================
// Magnet Resolution
// =============================================================================

#[tokio::test]
async fn test_resolve_after_three_polls() {
    let mut server = Server::new_async().await;

    let submit = mock_submit(&mut server).await;
    let select = mock_select(&mut server).await;
    let downloading = mock_status(&mut server, DOWNLOADING, 2).await;
    let downloaded = mock_status(&mut server, DOWNLOADED, 1).await;
    let unrestrict = mock_unrestrict(&mut server, "https://cdn/x.mp4").await;

    let stream = resolver(&server, 30)
        .resolve(MAGNET, &CancellationToken::new())
        .await
        .unwrap();

    submit.assert_async().await;
    select.assert_async().await;
    downloading.assert_async().await;
    downloaded.assert_async().await;
    unrestrict.assert_async().await;

    assert_eq!(stream, ResolvedStream::new("https://cdn/x.mp4", DeliveryType::ProgressiveMp4));
}

#[tokio::test]
async fn test_ready_on_fifth_attempt() {
    let mut server = Server::new_async().await;

    mock_submit(&mut server).await;
    mock_select(&mut server).await;
    let downloading = mock_status(&mut server, DOWNLOADING, 4).await;
    let downloaded = mock_status(&mut server, DOWNLOADED, 1).await;
    mock_unrestrict(&mut server, "https://cdn/x.mp4").await;

    let stream = resolver(&server, 30)
        .resolve(MAGNET, &CancellationToken::new())
        .await
        .unwrap();

    downloading.assert_async().await;
    downloaded.assert_async().await;
    assert_eq!(stream.url, "https://cdn/x.mp4");
}

#[tokio::test]
async fn test_times_out_after_exactly_max_attempts() {
    let mut server = Server::new_async().await;

    mock_submit(&mut server).await;
    mock_select(&mut server).await;
    let downloading = mock_status(&mut server, DOWNLOADING, 30).await;
    let unrestrict = server
        .mock("POST", "/unrestrict/link")
        .expect(0)
        .create_async()
        .await;

    let err = resolver(&server, 30)
        .resolve(MAGNET, &CancellationToken::new())
        .await
        .unwrap_err();

    downloading.assert_async().await;
    unrestrict.assert_async().await;
    assert!(matches!(err, DebridError::Timeout(_)));
    assert!(err.to_string().contains("timeout"));
}

#[tokio::test]
async fn test_failed_torrent_stops_polling() {
    let mut server = Server::new_async().await;

    mock_submit(&mut server).await;
    mock_select(&mut server).await;
    let dead = mock_status(&mut server, r#"{"id": "t1", "status": "magnet_error"}"#, 1).await;

    let err = resolver(&server, 30)
        .resolve(MAGNET, &CancellationToken::new())
        .await
        .unwrap_err();

    dead.assert_async().await;
    assert!(err.is_remote());
}

#[tokio::test]
async fn test_downloaded_without_links() {
    let mut server = Server::new_async().await;

    mock_submit(&mut server).await;
    mock_select(&mut server).await;
    mock_status(&mut server, r#"{"id": "t1", "status": "downloaded", "links": []}"#, 1).await;

    let err = resolver(&server, 30)
        .resolve(MAGNET, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_remote());
    assert!(err.to_string().contains("no download links"));
}

#[tokio::test]
async fn test_invalid_magnet_makes_no_calls() {
    let mut server = Server::new_async().await;

    let submit = server
        .mock("POST", "/torrents/addMagnet")
        .expect(0)
        .create_async()
        .await;

    let err = resolver(&server, 30)
        .resolve("not-a-magnet", &CancellationToken::new())
        .await
        .unwrap_err();

    submit.assert_async().await;
    assert!(matches!(err, DebridError::Validation(_)));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let mut server = Server::new_async().await;

    let submit = server
        .mock("POST", "/torrents/addMagnet")
        .expect(0)
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = resolver(&server, 30)
        .resolve(MAGNET, &cancel)
        .await
        .unwrap_err();

    submit.assert_async().await;
    assert!(matches!(err, DebridError::Cancelled));
}

// =============================================================================
// Library Links / Negotiation
// =============================================================================

#[tokio::test]
async fn test_cached_link_prefers_adaptive() {
    let mut server = Server::new_async().await;

    mock_unrestrict(&mut server, "https://cdn/d/F1/x.mkv").await;
    let transcode = server
        .mock("GET", "/streaming/transcode/F1")
        .with_status(200)
        .with_body(
            r#"{"apple": {"full": "https://cdn/hls/full.m3u8"},
                "liveMP4": {"full": "https://cdn/mp4/full.mp4"}}"#,
        )
        .create_async()
        .await;

    let stream = resolver(&server, 30)
        .resolve_from_cached_link("l1", &CancellationToken::new())
        .await
        .unwrap();

    transcode.assert_async().await;
    assert_eq!(
        stream,
        ResolvedStream::new("https://cdn/hls/full.m3u8", DeliveryType::Adaptive)
    );
}

#[tokio::test]
async fn test_transcode_failure_falls_back_to_direct() {
    let mut server = Server::new_async().await;

    mock_unrestrict(&mut server, "https://cdn/x.mkv").await;
    server
        .mock("GET", "/streaming/transcode/F1")
        .with_status(503)
        .create_async()
        .await;

    let stream = resolver(&server, 30)
        .resolve_from_cached_link("l1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stream, ResolvedStream::progressive("https://cdn/x.mkv"));
}

#[tokio::test]
async fn test_negotiation_uses_file_id_from_url() {
    let mut server = Server::new_async().await;

    let transcode = server
        .mock("GET", "/streaming/transcode/XYZ")
        .with_status(200)
        .with_body(r#"{"liveMP4": {"720": "https://cdn/mp4/720.mp4"}}"#)
        .create_async()
        .await;

    let negotiation = resolver(&server, 30)
        .negotiate("https://cdn/d/XYZ/movie.mkv", None, &CancellationToken::new())
        .await
        .unwrap();

    transcode.assert_async().await;
    assert_eq!(negotiation.chosen, FormatStrategy::LiveMp4);
    assert_eq!(negotiation.stream, ResolvedStream::progressive("https://cdn/mp4/720.mp4"));
    assert_eq!(negotiation.skipped.len(), 1);
}

#[tokio::test]
async fn test_custom_chain_without_adaptive() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/streaming/transcode/F1")
        .with_status(200)
        .with_body(
            r#"{"apple": {"full": "https://cdn/hls/full.m3u8"},
                "h264WebM": {"480": "https://cdn/webm/480.webm"}}"#,
        )
        .create_async()
        .await;

    let resolver = resolver(&server, 30).with_chain(FallbackChain::new([FormatStrategy::WebM]));
    let negotiation = resolver
        .negotiate("https://cdn/x.mkv", Some("F1"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(negotiation.stream.delivery_type, DeliveryType::ProgressiveWebm);
    assert_eq!(negotiation.stream.url, "https://cdn/webm/480.webm");
}

#[tokio::test]
async fn test_library_entry_picks_requested_link() {
    let mut server = Server::new_async().await;

    let unrestrict = server
        .mock("POST", "/unrestrict/link")
        .match_body(Matcher::UrlEncoded("link".into(), "l2".into()))
        .with_status(200)
        .with_body(
            r#"{"id": "F2", "filename": "ep2.mkv", "filesize": 10, "download": "https://cdn/d/F2/ep2.mkv"}"#,
        )
        .create_async()
        .await;

    let torrent: RemoteTorrent = serde_json::from_str(
        r#"{"id": "t1", "status": "downloaded", "links": ["l1", "l2"]}"#,
    )
    .unwrap();

    let link = resolver(&server, 30)
        .resolve_library_entry(&torrent, Some(1), &CancellationToken::new())
        .await
        .unwrap();

    unrestrict.assert_async().await;
    assert_eq!(link.id, "F2");
    assert_eq!(link.download, "https://cdn/d/F2/ep2.mkv");
}

#[tokio::test]
async fn test_library_entry_without_links() {
    let server = Server::new_async().await;

    let torrent: RemoteTorrent =
        serde_json::from_str(r#"{"id": "t1", "status": "downloaded", "links": []}"#).unwrap();

    let err = resolver(&server, 30)
        .resolve_library_entry(&torrent, None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_remote());
    assert!(err.to_string().contains("no playable files"));
}

#[tokio::test]
async fn test_library_entry_not_ready() {
    let server = Server::new_async().await;

    let torrent: RemoteTorrent =
        serde_json::from_str(r#"{"id": "t1", "status": "downloading", "links": ["l1"]}"#)
            .unwrap();

    let err = resolver(&server, 30)
        .resolve_library_entry(&torrent, None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DebridError::Validation(_)));
}

#[tokio::test]
async fn test_concurrent_resolutions_are_independent() {
    let mut server = Server::new_async().await;

    let unrestrict = server
        .mock("POST", "/unrestrict/link")
        .with_status(200)
        .with_body(r#"{"id": "F1", "filename": "x.mp4", "filesize": 10, "download": "https://cdn/x.mp4"}"#)
        .expect(3)
        .create_async()
        .await;

    let resolver = resolver(&server, 30);
    let cancel = CancellationToken::new();
    let results = futures::future::join_all(
        (0..3).map(|_| resolver.resolve_from_cached_link("l1", &cancel)),
    )
    .await;

    unrestrict.assert_async().await;
    for result in results {
        assert_eq!(result.unwrap(), ResolvedStream::progressive("https://cdn/x.mp4"));
    }
}
