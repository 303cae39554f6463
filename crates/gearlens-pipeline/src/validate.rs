//! Cross-source validation: corroborating vision candidates against
//! transcript mentions and description links.
//!
//! First-fit consuming matching, deliberately not optimal assignment: each
//! transcript mention and link is consumed by at most one vision candidate,
//! scanned in order. Unconsumed mentions with timestamps go to the gap
//! resolver; the rest are emitted standalone so recall is preserved.

use std::collections::BTreeSet;

use tracing::info;

use gearlens_models::{Candidate, LinkCandidate, PurchaseLink, Source, TranscriptMention};

use crate::config::PipelineConfig;
use crate::text::{brands_match, names_match};

/// Output of the validation pass.
#[derive(Debug)]
pub struct ValidationOutcome {
    /// Boosted vision candidates plus standalone transcript/link candidates.
    pub candidates: Vec<Candidate>,
    /// Timestamped transcript mentions nothing matched; input to the gap
    /// resolver, which emits each exactly once.
    pub unmatched_mentions: Vec<TranscriptMention>,
}

/// Cross-validate vision candidates against the other two sources.
pub fn cross_validate(
    vision: Vec<Candidate>,
    mentions: &[TranscriptMention],
    links: &[LinkCandidate],
    config: &PipelineConfig,
) -> ValidationOutcome {
    let mut used_mentions = vec![false; mentions.len()];
    let mut used_links = vec![false; links.len()];
    let mut candidates = Vec::with_capacity(vision.len());

    for mut candidate in vision {
        // Transcript corroboration.
        for (i, mention) in mentions.iter().enumerate() {
            if used_mentions[i] {
                continue;
            }
            if mention_matches(&candidate, mention, config.timestamp_window_ms) {
                used_mentions[i] = true;
                candidate.boost(config.source_match_boost);
                candidate.add_source(Source::Transcript);
                break;
            }
        }

        // Description link corroboration.
        for (i, link) in links.iter().enumerate() {
            if used_links[i] {
                continue;
            }
            if link_matches(&candidate, link) {
                used_links[i] = true;
                candidate.boost(config.source_match_boost);
                candidate.add_source(Source::DescriptionLink);
                candidate.purchase_link = Some(PurchaseLink {
                    url: link.purchase_url.clone(),
                    domain: link.domain.clone(),
                    is_affiliate: link.is_affiliate,
                });
                if candidate.image_url.is_none() {
                    candidate.image_url = link.image_url.clone();
                }
                break;
            }
        }

        candidates.push(candidate);
    }

    // Unconsumed mentions: timestamped ones go to the gap resolver; the
    // rest become standalone transcript candidates.
    let mut unmatched_mentions = Vec::new();
    for (i, mention) in mentions.iter().enumerate() {
        if used_mentions[i] {
            continue;
        }
        if mention.timestamp_ms.is_some() {
            unmatched_mentions.push(mention.clone());
        } else {
            candidates.push(standalone_mention(
                mention,
                config.standalone_transcript_confidence,
            ));
        }
    }

    // Unconsumed links become standalone candidates at their resolver
    // confidence, rescaled to 0-100.
    for (i, link) in links.iter().enumerate() {
        if used_links[i] {
            continue;
        }
        candidates.push(standalone_link(link));
    }

    let multi_source = candidates.iter().filter(|c| c.sources.len() > 1).count();
    info!(
        "Cross-validation: {} candidates, {} multi-source, {} gaps",
        candidates.len(),
        multi_source,
        unmatched_mentions.len()
    );

    ValidationOutcome {
        candidates,
        unmatched_mentions,
    }
}

fn mention_matches(candidate: &Candidate, mention: &TranscriptMention, window_ms: u64) -> bool {
    let name_ok = names_match(&candidate.full_name(), &mention.full_name())
        || names_match(&candidate.name, &mention.name)
        || (candidate.has_brand()
            && mention.brand.as_deref().is_some_and(|b| brands_match(&candidate.brand, b))
            && (names_match(&candidate.name, &mention.name)
                || categories_match(candidate.category.as_deref(), mention.category.as_deref())));
    if !name_ok {
        return false;
    }
    match (mention.timestamp_ms, candidate.timestamp_ms) {
        (Some(a), Some(b)) => a.abs_diff(b) <= window_ms,
        _ => true,
    }
}

fn link_matches(candidate: &Candidate, link: &LinkCandidate) -> bool {
    names_match(&candidate.full_name(), &link.name)
        || names_match(&candidate.name, &link.name)
        || (candidate.has_brand()
            && link.brand.as_deref().is_some_and(|b| brands_match(&candidate.brand, b)))
}

fn categories_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

fn standalone_mention(mention: &TranscriptMention, confidence: u8) -> Candidate {
    Candidate {
        name: mention.name.clone(),
        brand: mention.brand.clone().unwrap_or_default(),
        category: mention.category.clone(),
        confidence,
        cluster_id: None,
        frame_id: None,
        detected_text: Vec::new(),
        evidence: mention.mention_context.clone(),
        timestamp_ms: mention.timestamp_ms,
        sources: BTreeSet::from([Source::Transcript]),
        purchase_link: None,
        image_url: None,
    }
}

fn standalone_link(link: &LinkCandidate) -> Candidate {
    Candidate {
        name: link.name.clone(),
        brand: link.brand.clone().unwrap_or_default(),
        category: link.category.clone(),
        confidence: Candidate::clamp_confidence((link.confidence * 100.0).round() as i64),
        cluster_id: None,
        frame_id: None,
        detected_text: Vec::new(),
        evidence: None,
        timestamp_ms: None,
        sources: BTreeSet::from([Source::DescriptionLink]),
        purchase_link: Some(PurchaseLink {
            url: link.purchase_url.clone(),
            domain: link.domain.clone(),
            is_affiliate: link.is_affiliate,
        }),
        image_url: link.image_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vision(name: &str, brand: &str, confidence: u8, ts: Option<u64>) -> Candidate {
        Candidate {
            name: name.to_string(),
            brand: brand.to_string(),
            category: None,
            confidence,
            cluster_id: None,
            frame_id: None,
            detected_text: Vec::new(),
            evidence: None,
            timestamp_ms: ts,
            sources: BTreeSet::from([Source::Vision]),
            purchase_link: None,
            image_url: None,
        }
    }

    fn mention(name: &str, brand: Option<&str>, ts: Option<u64>) -> TranscriptMention {
        TranscriptMention {
            name: name.to_string(),
            brand: brand.map(|b| b.to_string()),
            category: None,
            mention_context: None,
            timestamp_ms: ts,
        }
    }

    fn link(name: &str, confidence: f32) -> LinkCandidate {
        LinkCandidate {
            name: name.to_string(),
            brand: None,
            category: None,
            image_url: Some("https://cdn.example.com/img.jpg".to_string()),
            purchase_url: "https://shop.example.com/item".to_string(),
            domain: "shop.example.com".to_string(),
            is_affiliate: true,
            confidence,
        }
    }

    #[test]
    fn matching_sources_boost_and_union() {
        let outcome = cross_validate(
            vec![vision("Model Y", "Brand X", 70, Some(12_000))],
            &[mention("Model Y", Some("Brand X"), Some(10_000))],
            &[link("Brand X Model Y", 0.9)],
            &PipelineConfig::default(),
        );
        assert_eq!(outcome.candidates.len(), 1);
        let c = &outcome.candidates[0];
        assert_eq!(c.confidence, 100);
        assert_eq!(c.sources.len(), 3);
        assert!(c.purchase_link.is_some());
        assert!(outcome.unmatched_mentions.is_empty());
    }

    #[test]
    fn timestamp_window_blocks_distant_matches() {
        let outcome = cross_validate(
            vec![vision("Model Y", "Brand X", 70, Some(300_000))],
            &[mention("Model Y", Some("Brand X"), Some(10_000))],
            &[],
            &PipelineConfig::default(),
        );
        // Name matches but timestamps are 290s apart: the mention stays
        // unmatched and goes to the gap resolver.
        assert_eq!(outcome.candidates[0].confidence, 70);
        assert_eq!(outcome.unmatched_mentions.len(), 1);
    }

    #[test]
    fn mentions_are_consumed_once() {
        let outcome = cross_validate(
            vec![
                vision("Model Y", "Brand X", 70, None),
                vision("Model Y", "Brand X", 60, None),
            ],
            &[mention("Model Y", Some("Brand X"), None)],
            &[],
            &PipelineConfig::default(),
        );
        let boosted: Vec<u8> = outcome.candidates.iter().map(|c| c.confidence).collect();
        assert_eq!(boosted, vec![90, 60]);
    }

    #[test]
    fn untimestamped_mention_becomes_standalone() {
        let outcome = cross_validate(
            vec![],
            &[mention("Putter", None, None)],
            &[],
            &PipelineConfig::default(),
        );
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].confidence, 65);
        assert!(outcome.unmatched_mentions.is_empty());
    }

    #[test]
    fn unmatched_link_becomes_standalone_at_scaled_confidence() {
        let outcome = cross_validate(
            vec![],
            &[],
            &[link("Widget Deluxe", 0.8)],
            &PipelineConfig::default(),
        );
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].confidence, 80);
        assert!(outcome.candidates[0].purchase_link.is_some());
    }

    #[test]
    fn confidence_never_exceeds_100() {
        let outcome = cross_validate(
            vec![vision("Model Y", "Brand X", 95, None)],
            &[mention("Model Y", Some("Brand X"), None)],
            &[link("Brand X Model Y", 0.9)],
            &PipelineConfig::default(),
        );
        assert_eq!(outcome.candidates[0].confidence, 100);
    }
}
