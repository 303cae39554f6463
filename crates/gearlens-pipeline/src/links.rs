//! Description link stage: extract purchase URLs from a video description
//! and resolve them to products through the link resolver.

use std::sync::Arc;
use std::sync::OnceLock;

use futures::future::join_all;
use regex::Regex;
use tracing::{debug, info, warn};
use url::Url;

use gearlens_models::LinkCandidate;

use crate::config::PipelineConfig;
use crate::oracle::LinkResolver;

/// Domains that never sell the products shown: social profiles, link hubs,
/// streaming platforms, tip jars, and bare URL shorteners.
const SOCIAL_DOMAINS: &[&str] = &[
    "instagram.com",
    "twitter.com",
    "tiktok.com",
    "facebook.com",
    "x.com",
    "threads.net",
    "snapchat.com",
    "linkedin.com",
    "discord.gg",
    "discord.com",
    "twitch.tv",
    "patreon.com",
    "youtube.com",
    "youtu.be",
    "spotify.com",
    "open.spotify.com",
    "music.apple.com",
    "podcasts.apple.com",
    "soundcloud.com",
    "linktr.ee",
    "beacons.ai",
    "bio.link",
    "allmylinks.com",
    "ko-fi.com",
    "buymeacoffee.com",
    "venmo.com",
    "paypal.com",
    "gofundme.com",
    "bit.ly",
    "tinyurl.com",
];

/// Affiliate query markers commonly found in creator links.
const AFFILIATE_MARKERS: &[&str] = &["tag=", "aff=", "affiliate", "ref=", "utm_source=affiliate"];

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"https?://[^\s<>"')\]]+"#).expect("static pattern compiles")
    })
}

/// Whether a URL points at a social/link-hub domain.
pub fn is_social_url(url: &str) -> bool {
    SOCIAL_DOMAINS.iter().any(|d| url.contains(d))
}

/// Extract candidate purchase URLs from a description, skipping social
/// domains and capping at the configured limit.
pub fn extract_description_urls(description: &str, max_links: usize) -> Vec<String> {
    let mut urls = Vec::new();
    for m in url_pattern().find_iter(description) {
        let url = m.as_str().trim_end_matches(['.', ',', ';']).to_string();
        if is_social_url(&url) || urls.contains(&url) {
            continue;
        }
        urls.push(url);
        if urls.len() >= max_links {
            break;
        }
    }
    urls
}

fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_default()
}

fn is_affiliate_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    AFFILIATE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Resolve description URLs to product candidates.
///
/// URLs are resolved in small concurrent batches; individual failures and
/// low-confidence resolutions are dropped.
pub async fn resolve_links(
    resolver: Arc<dyn LinkResolver>,
    urls: &[String],
    config: &PipelineConfig,
) -> Vec<LinkCandidate> {
    let mut candidates = Vec::new();

    for batch in urls.chunks(config.oracle_concurrency.max(1)) {
        let results = join_all(batch.iter().map(|url| {
            let resolver = Arc::clone(&resolver);
            async move { (url.clone(), resolver.resolve(url).await) }
        }))
        .await;

        for (url, result) in results {
            match result {
                Ok(Some(resolution)) if resolution.confidence > config.min_link_confidence => {
                    candidates.push(LinkCandidate {
                        name: resolution.name,
                        brand: resolution.brand,
                        category: resolution.category,
                        image_url: resolution.image_url,
                        domain: domain_of(&url),
                        is_affiliate: is_affiliate_url(&url),
                        purchase_url: url,
                        confidence: resolution.confidence,
                    });
                }
                Ok(Some(resolution)) => {
                    debug!(
                        "Dropping low-confidence link {} ({:.2})",
                        url, resolution.confidence
                    );
                }
                Ok(None) => {}
                Err(e) => warn!("Link resolution failed for {}: {}", url, e),
            }
        }
    }

    info!("Resolved {} of {} description links", candidates.len(), urls.len());
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_product_urls_and_skips_social() {
        let description = "\
Gear below!\n\
https://ketlmtn.com/products/sunshirt?ref=creator\n\
Follow me: https://instagram.com/creator\n\
https://linktr.ee/creator\n\
Buy here: https://www.amazon.com/dp/B0ABC?tag=creator-20.\n";
        let urls = extract_description_urls(description, 15);
        assert_eq!(urls.len(), 2);
        assert!(urls[0].contains("ketlmtn.com"));
        assert!(urls[1].ends_with("tag=creator-20"));
    }

    #[test]
    fn caps_at_max_links() {
        let description = (0..20)
            .map(|i| format!("https://shop{}.example.com/item", i))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(extract_description_urls(&description, 15).len(), 15);
    }

    #[test]
    fn domain_and_affiliate_detection() {
        assert_eq!(
            domain_of("https://www.amazon.com/dp/B0ABC?tag=creator-20"),
            "amazon.com"
        );
        assert!(is_affiliate_url("https://amazon.com/dp/B0?tag=creator-20"));
        assert!(!is_affiliate_url("https://ketlmtn.com/products/sunshirt"));
    }
}
