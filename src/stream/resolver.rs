//! Stream resolution
//!
//! Turns a magnet link, a library link reference or a direct URL into a
//! [`ResolvedStream`] by driving the debrid client: submit, select, wait
//! for the torrent to be ready, unrestrict and optionally negotiate a
//! transcoded format.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::debrid::{DebridClient, DebridError, DebridResult};
use crate::config::Config;
use crate::models::{
    RemoteTorrent, ResolvedStream, StreamDescriptor, TranscodeOptions, UnrestrictedLink,
};
use crate::stream::negotiate::{FallbackChain, Negotiation};
use crate::stream::retry::{cancellable, poll_until, PollPolicy, RetryError};

/// Pull the provider file id out of a `/d/<id>` download URL
pub fn file_id_from_url(url: &str) -> Option<String> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/d/([^/?#]+)").ok())
        .as_ref()?
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Orchestrates debrid calls into playable streams
#[derive(Debug, Clone)]
pub struct StreamResolver {
    client: DebridClient,
    poll: PollPolicy,
    chain: FallbackChain,
}

impl StreamResolver {
    /// Resolver with the default 30 × 2s poll policy and preferred format order
    pub fn new(client: DebridClient) -> Self {
        Self {
            client,
            poll: PollPolicy::default(),
            chain: FallbackChain::preferred(),
        }
    }

    /// Resolver tuned from settings
    pub fn from_config(client: DebridClient, config: &Config) -> Self {
        Self::new(client).with_poll_policy(PollPolicy::fixed(
            config.poll_interval(),
            config.poll_max_attempts(),
        ))
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Shorthand for a fixed-interval poll policy
    pub fn with_poll_interval(self, interval: Duration, max_attempts: u32) -> Self {
        self.with_poll_policy(PollPolicy::fixed(interval, max_attempts))
    }

    pub fn with_chain(mut self, chain: FallbackChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn client(&self) -> &DebridClient {
        &self.client
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    /// Magnet → direct progressive stream.
    ///
    /// Submitting is not idempotent on the provider: calling this again
    /// after a timeout creates a second job.
    pub async fn resolve(
        &self,
        magnet: &str,
        cancel: &CancellationToken,
    ) -> DebridResult<ResolvedStream> {
        let torrent_id = guard(cancel, self.client.submit_magnet(magnet)).await?;
        info!(torrent_id = %torrent_id, "magnet submitted, selecting files");

        guard(cancel, self.client.select_all_files(&torrent_id)).await?;

        let torrent = self.wait_until_ready(&torrent_id, cancel).await?;
        let link = torrent
            .first_link()
            .ok_or_else(|| DebridError::Decode("no download links available".to_string()))?;

        let unrestricted = guard(cancel, self.client.unrestrict(link)).await?;
        info!(torrent_id = %torrent_id, filename = %unrestricted.filename, "stream resolved");

        Ok(ResolvedStream::progressive(unrestricted.download))
    }

    /// Poll torrent status until it is downloaded.
    ///
    /// Fails with `Timeout` once the attempt budget is spent, and with
    /// `Remote` if the provider reports a failure state.
    pub async fn wait_until_ready(
        &self,
        torrent_id: &str,
        cancel: &CancellationToken,
    ) -> DebridResult<RemoteTorrent> {
        let polled = poll_until(
            self.poll,
            cancel,
            |attempt| {
                let client = &self.client;
                async move {
                    let torrent = client.torrent_status(torrent_id).await?;
                    debug!(torrent_id, attempt, status = %torrent.status, progress = torrent.progress, "polled torrent");
                    if torrent.status.is_failed() {
                        return Err(DebridError::Decode(format!(
                            "torrent {} failed with status {}",
                            torrent_id, torrent.status
                        )));
                    }
                    Ok(torrent)
                }
            },
            |torrent: &RemoteTorrent| torrent.is_ready(),
        )
        .await;

        match polled {
            Ok(polled) => {
                debug!(torrent_id, attempts = polled.attempts, "torrent ready");
                Ok(polled.value)
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!(torrent_id, attempts, status = %last.status, "torrent processing timeout");
                Err(DebridError::Timeout(format!(
                    "torrent processing timeout ({} after {} attempts)",
                    last.status, attempts
                )))
            }
            Err(RetryError::Cancelled) => Err(DebridError::Cancelled),
            Err(RetryError::Operation(e)) => Err(e),
        }
    }

    /// Library path: unrestrict an existing link reference afresh, then
    /// negotiate the best format for it.
    pub async fn resolve_from_cached_link(
        &self,
        link: &str,
        cancel: &CancellationToken,
    ) -> DebridResult<ResolvedStream> {
        let unrestricted = self.unrestrict_fresh(link, cancel).await?;
        let negotiation = self
            .negotiate(&unrestricted.download, Some(&unrestricted.id), cancel)
            .await?;
        Ok(negotiation.stream)
    }

    /// Pick one link of a downloaded library torrent (or the first) and
    /// unrestrict it. The returned link carries the direct URL and file id.
    pub async fn resolve_library_entry(
        &self,
        torrent: &RemoteTorrent,
        file_index: Option<usize>,
        cancel: &CancellationToken,
    ) -> DebridResult<UnrestrictedLink> {
        if !torrent.is_ready() {
            return Err(DebridError::Validation(format!(
                "torrent {} is not ready ({})",
                torrent.id, torrent.status
            )));
        }

        let link = file_index
            .and_then(|i| torrent.links.get(i))
            .or_else(|| torrent.links.first())
            .ok_or_else(|| DebridError::Decode("no playable files found".to_string()))?;

        self.unrestrict_fresh(link, cancel).await
    }

    async fn unrestrict_fresh(
        &self,
        link: &str,
        cancel: &CancellationToken,
    ) -> DebridResult<UnrestrictedLink> {
        let unrestricted = guard(cancel, self.client.unrestrict(link)).await?;
        debug!(file_id = %unrestricted.id, filename = %unrestricted.filename, "link unrestricted");
        Ok(unrestricted)
    }

    /// Playable stream for a descriptor.
    ///
    /// Containers a player handles natively (and `.m3u8` manifests) are
    /// returned as-is; everything else goes through negotiation.
    pub async fn resolve_descriptor(
        &self,
        descriptor: &StreamDescriptor,
        cancel: &CancellationToken,
    ) -> DebridResult<ResolvedStream> {
        let container = descriptor.container();
        if !container.needs_transcoding() {
            return Ok(ResolvedStream::new(
                descriptor.url.clone(),
                container.direct_delivery(),
            ));
        }
        let negotiation = self
            .negotiate(&descriptor.url, descriptor.file_id.as_deref(), cancel)
            .await?;
        Ok(negotiation.stream)
    }

    /// Negotiate with the resolver's default chain
    pub async fn negotiate(
        &self,
        direct_url: &str,
        file_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> DebridResult<Negotiation> {
        self.negotiate_with(&self.chain, direct_url, file_id, cancel)
            .await
    }

    /// Try to upgrade a direct URL to a transcoded format.
    ///
    /// Transcoding lookup failures never abort: they are logged and the
    /// chain falls through to the original URL. Only cancellation errors.
    pub async fn negotiate_with(
        &self,
        chain: &FallbackChain,
        direct_url: &str,
        file_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> DebridResult<Negotiation> {
        let file_id = file_id
            .map(str::to_string)
            .or_else(|| file_id_from_url(direct_url));

        let options = match file_id {
            Some(id) => self.lookup_transcode(&id, cancel).await?,
            None => {
                warn!(url = %direct_url, "no file id for transcoding lookup");
                None
            }
        };

        Ok(chain.negotiate(direct_url, options.as_ref()))
    }

    async fn lookup_transcode(
        &self,
        file_id: &str,
        cancel: &CancellationToken,
    ) -> DebridResult<Option<TranscodeOptions>> {
        match guard(cancel, self.client.transcode_options(file_id)).await {
            Ok(options) => Ok(Some(options)),
            Err(DebridError::Cancelled) => Err(DebridError::Cancelled),
            Err(e) => {
                warn!(file_id, error = %e, "transcoding lookup failed, using original file");
                Ok(None)
            }
        }
    }
}

/// Await a debrid call unless cancelled first
async fn guard<T, F>(cancel: &CancellationToken, fut: F) -> DebridResult<T>
where
    F: std::future::Future<Output = DebridResult<T>>,
{
    cancellable(cancel, fut)
        .await
        .unwrap_or(Err(DebridError::Cancelled))
}
