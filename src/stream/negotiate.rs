//! Playback format negotiation
//!
//! Given a direct URL and the provider's transcoding options, pick the best
//! browser-playable delivery. The order is an explicit list of strategies;
//! each one that cannot produce a URL is logged and skipped.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use crate::models::{DeliveryType, ResolvedStream, TranscodeOptions};

/// Quality labels tried when a family has no `full` variant
const QUALITY_PREFERENCE: &[&str] = &["1080", "720", "480"];

/// One way of turning a file into a playable stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatStrategy {
    /// Transcoded HLS (`apple` family)
    AdaptiveHls,
    /// Transcoded progressive MP4 (`liveMP4` family)
    LiveMp4,
    /// Transcoded WebM (`h264WebM` family)
    WebM,
    /// The original direct URL, untouched
    Direct,
}

impl FormatStrategy {
    /// Try to produce a stream; `Err` carries why this strategy was skipped
    fn apply(
        self,
        direct_url: &str,
        options: Option<&TranscodeOptions>,
    ) -> Result<ResolvedStream, String> {
        let (family, delivery) = match (self, options) {
            (FormatStrategy::Direct, _) => {
                return Ok(ResolvedStream::progressive(direct_url));
            }
            (_, None) => return Err("no transcoding options".to_string()),
            (FormatStrategy::AdaptiveHls, Some(o)) => (&o.apple, DeliveryType::Adaptive),
            (FormatStrategy::LiveMp4, Some(o)) => (&o.live_mp4, DeliveryType::ProgressiveMp4),
            (FormatStrategy::WebM, Some(o)) => (&o.h264_webm, DeliveryType::ProgressiveWebm),
        };

        pick_quality(family)
            .map(|url| ResolvedStream::new(url, delivery))
            .ok_or_else(|| format!("{} family is empty", self))
    }
}

impl fmt::Display for FormatStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatStrategy::AdaptiveHls => write!(f, "adaptive-hls"),
            FormatStrategy::LiveMp4 => write!(f, "live-mp4"),
            FormatStrategy::WebM => write!(f, "webm"),
            FormatStrategy::Direct => write!(f, "direct"),
        }
    }
}

/// `full` if present, otherwise 1080 → 720 → 480 → first key
pub fn pick_quality(family: &BTreeMap<String, String>) -> Option<&str> {
    if let Some(url) = family.get("full") {
        return Some(url.as_str());
    }
    QUALITY_PREFERENCE
        .iter()
        .find_map(|q| family.get(*q))
        .or_else(|| family.values().next())
        .map(String::as_str)
}

/// A strategy that was tried and did not apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedStrategy {
    pub strategy: FormatStrategy,
    pub reason: String,
}

/// Outcome of walking a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Negotiation {
    pub stream: ResolvedStream,
    pub chosen: FormatStrategy,
    pub skipped: Vec<SkippedStrategy>,
}

/// Ordered list of strategies, tried first to last.
///
/// A chain always ends in [`FormatStrategy::Direct`], so it can never fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain {
    strategies: Vec<FormatStrategy>,
}

impl FallbackChain {
    /// Build a chain; duplicates are dropped and `Direct` always comes last
    pub fn new(strategies: impl IntoIterator<Item = FormatStrategy>) -> Self {
        let mut ordered: Vec<FormatStrategy> = Vec::new();
        for strategy in strategies {
            if strategy != FormatStrategy::Direct && !ordered.contains(&strategy) {
                ordered.push(strategy);
            }
        }
        ordered.push(FormatStrategy::Direct);
        Self {
            strategies: ordered,
        }
    }

    /// Adaptive HLS, then MP4, then WebM, then the original file
    pub fn preferred() -> Self {
        Self::new([
            FormatStrategy::AdaptiveHls,
            FormatStrategy::LiveMp4,
            FormatStrategy::WebM,
            FormatStrategy::Direct,
        ])
    }

    /// Progressive MP4 only; used after the adaptive engine failed
    pub fn progressive_only() -> Self {
        Self::new([FormatStrategy::LiveMp4, FormatStrategy::Direct])
    }

    pub fn strategies(&self) -> &[FormatStrategy] {
        &self.strategies
    }

    /// Walk the chain against the given options (`None` = lookup unavailable)
    pub fn negotiate(&self, direct_url: &str, options: Option<&TranscodeOptions>) -> Negotiation {
        let mut skipped = Vec::new();

        for &strategy in &self.strategies {
            match strategy.apply(direct_url, options) {
                Ok(stream) => {
                    debug!(%strategy, delivery = %stream.delivery_type, "format negotiated");
                    return Negotiation {
                        stream,
                        chosen: strategy,
                        skipped,
                    };
                }
                Err(reason) => {
                    warn!(%strategy, %reason, "format strategy skipped");
                    skipped.push(SkippedStrategy { strategy, reason });
                }
            }
        }

        // Unreachable in practice: `new` guarantees a trailing Direct
        Negotiation {
            stream: ResolvedStream::progressive(direct_url),
            chosen: FormatStrategy::Direct,
            skipped,
        }
    }
}

impl Default for FallbackChain {
    fn default() -> Self {
        Self::preferred()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_adaptive_preferred_over_mp4() {
        let options = TranscodeOptions {
            apple: family(&[("full", "A")]),
            live_mp4: family(&[("full", "B")]),
            ..Default::default()
        };

        let result = FallbackChain::preferred().negotiate("https://cdn/x.mkv", Some(&options));
        assert_eq!(result.stream.url, "A");
        assert_eq!(result.stream.delivery_type, DeliveryType::Adaptive);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_empty_options_fall_back_to_direct() {
        let options = TranscodeOptions::default();
        let result = FallbackChain::preferred().negotiate("https://cdn/x.mp4", Some(&options));

        assert_eq!(result.stream, ResolvedStream::progressive("https://cdn/x.mp4"));
        assert_eq!(result.chosen, FormatStrategy::Direct);
        let order: Vec<_> = result.skipped.iter().map(|s| s.strategy).collect();
        assert_eq!(
            order,
            vec![
                FormatStrategy::AdaptiveHls,
                FormatStrategy::LiveMp4,
                FormatStrategy::WebM
            ]
        );
    }

    #[test]
    fn test_missing_lookup_falls_back_to_direct() {
        let result = FallbackChain::preferred().negotiate("https://cdn/x.mkv", None);
        assert_eq!(result.stream.delivery_type, DeliveryType::ProgressiveMp4);
        assert_eq!(result.stream.url, "https://cdn/x.mkv");
    }

    #[test]
    fn test_webm_used_when_only_family() {
        let options = TranscodeOptions {
            h264_webm: family(&[("720", "W720"), ("480", "W480")]),
            ..Default::default()
        };
        let result = FallbackChain::preferred().negotiate("d", Some(&options));
        assert_eq!(result.stream, ResolvedStream::new("W720", DeliveryType::ProgressiveWebm));
    }

    #[test]
    fn test_quality_preference_order() {
        assert_eq!(pick_quality(&family(&[("480", "a"), ("1080", "b")])), Some("b"));
        assert_eq!(pick_quality(&family(&[("480", "a"), ("720", "c")])), Some("c"));
        assert_eq!(pick_quality(&family(&[("360", "z"), ("240", "y")])), Some("y"));
        assert_eq!(pick_quality(&family(&[("1080", "b"), ("full", "f")])), Some("f"));
        assert_eq!(pick_quality(&BTreeMap::new()), None);
    }

    #[test]
    fn test_progressive_only_skips_adaptive() {
        let options = TranscodeOptions {
            apple: family(&[("full", "A")]),
            live_mp4: family(&[("full", "B")]),
            ..Default::default()
        };
        let result = FallbackChain::progressive_only().negotiate("d", Some(&options));
        assert_eq!(result.stream, ResolvedStream::progressive("B"));
    }

    #[test]
    fn test_chain_always_ends_in_direct() {
        let chain = FallbackChain::new([FormatStrategy::Direct, FormatStrategy::LiveMp4]);
        assert_eq!(
            chain.strategies(),
            &[FormatStrategy::LiveMp4, FormatStrategy::Direct]
        );
        let chain = FallbackChain::new([FormatStrategy::WebM, FormatStrategy::WebM]);
        assert_eq!(chain.strategies(), &[FormatStrategy::WebM, FormatStrategy::Direct]);
    }
}
