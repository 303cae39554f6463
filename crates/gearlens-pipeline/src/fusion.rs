//! Product fusion: deduplicate candidates across sources and order the
//! final list.
//!
//! Names are normalized word by word before comparison so "KETL Mtn
//! Vent Tee" and "KETL Mountain Vent T-Shirt" collapse to one product.
//! Merging keeps the higher-confidence candidate as the base and rewards
//! the corroboration with a small bonus.

use std::collections::{HashSet, VecDeque};

use strsim::levenshtein;
use tracing::{debug, info};

use gearlens_models::Candidate;

use crate::config::PipelineConfig;
use crate::text::set_jaccard;

/// Word-level spelling variants folded during normalization.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("mtn", "mountain"),
    ("mt", "mountain"),
    ("tee", "t shirt"),
    ("tshirt", "t shirt"),
    ("hoody", "hoodie"),
    ("pkt", "pocket"),
    ("ltd", "limited"),
    ("ultralight", "ul"),
];

/// Names shorter than this are also compared by edit distance.
const EDIT_DISTANCE_NAME_LIMIT: usize = 30;

/// Word-set overlap required to call two names the same product.
const WORD_OVERLAP_THRESHOLD: f64 = 0.6;

/// Lowercase, split on whitespace/hyphens/underscores, and expand known
/// word variants. Includes the brand so same-named models from different
/// brands stay distinct.
pub fn normalize_name(brand: &str, name: &str) -> String {
    let combined = format!("{} {}", brand, name).to_lowercase();
    combined
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .map(expand_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn expand_word(word: &str) -> &str {
    ABBREVIATIONS
        .iter()
        .find(|(from, _)| *from == word)
        .map(|(_, to)| *to)
        .unwrap_or(word)
}

fn words_of(normalized: &str) -> HashSet<String> {
    normalized.split_whitespace().map(|w| w.to_string()).collect()
}

/// Whether two candidates describe the same physical product.
pub fn is_duplicate(a: &Candidate, b: &Candidate) -> bool {
    let norm_a = normalize_name(&a.brand, &a.name);
    let norm_b = normalize_name(&b.brand, &b.name);

    if norm_a == norm_b {
        return true;
    }
    if norm_a.contains(&norm_b) || norm_b.contains(&norm_a) {
        return true;
    }

    // Word overlap, ignoring brand words so a shared brand alone never
    // merges two distinct models.
    let brand_words: HashSet<String> = words_of(&normalize_name(&a.brand, ""))
        .union(&words_of(&normalize_name(&b.brand, "")))
        .cloned()
        .collect();
    let words_a: HashSet<String> = words_of(&norm_a).difference(&brand_words).cloned().collect();
    let words_b: HashSet<String> = words_of(&norm_b).difference(&brand_words).cloned().collect();
    if !words_a.is_empty()
        && !words_b.is_empty()
        && set_jaccard(&words_a, &words_b) >= WORD_OVERLAP_THRESHOLD
    {
        return true;
    }

    // Edit distance for short names, tolerant of minor misspellings.
    let min_len = norm_a.len().min(norm_b.len());
    if norm_a.len() < EDIT_DISTANCE_NAME_LIMIT && norm_b.len() < EDIT_DISTANCE_NAME_LIMIT {
        let max_distance = 2.max(min_len / 5);
        if levenshtein(&norm_a, &norm_b) <= max_distance {
            return true;
        }
    }

    // Same brand with one name containing the other.
    if a.has_brand() && a.brand.to_lowercase() == b.brand.to_lowercase() {
        let name_a = a.name.to_lowercase();
        let name_b = b.name.to_lowercase();
        if name_a.contains(&name_b) || name_b.contains(&name_a) {
            return true;
        }
    }

    false
}

/// Merge a duplicate pair, keeping the richer fields from both.
fn merge(a: Candidate, b: Candidate, merge_bonus: u8) -> Candidate {
    let (mut base, other) = if a.confidence >= b.confidence {
        (a, b)
    } else {
        (b, a)
    };

    for source in &other.sources {
        base.sources.insert(*source);
    }
    if other.name.len() > base.name.len() {
        base.name = other.name;
    }
    if !base.has_brand() && !other.brand.is_empty() && !other.brand.eq_ignore_ascii_case("unknown")
    {
        base.brand = other.brand;
    }
    if base.category.is_none() {
        base.category = other.category;
    }
    if base.purchase_link.is_none() {
        base.purchase_link = other.purchase_link;
    }
    if base.image_url.is_none() {
        base.image_url = other.image_url;
    }
    if base.timestamp_ms.is_none() {
        base.timestamp_ms = other.timestamp_ms;
    }
    if base.evidence.is_none() {
        base.evidence = other.evidence;
    }
    base.boost(merge_bonus);
    base
}

/// Deduplicate and order the final candidate list.
///
/// Greedy first-fit: each candidate either merges into the first existing
/// duplicate or starts a new product. A merge can widen the surviving
/// name, so merged candidates go back on the worklist until nothing in
/// the output pairs up. Output is ordered timestamped products first by
/// appearance time, then the rest by confidence.
pub fn fuse(candidates: Vec<Candidate>, config: &PipelineConfig) -> Vec<Candidate> {
    let input_len = candidates.len();
    let mut fused: Vec<Candidate> = Vec::new();
    let mut pending: VecDeque<Candidate> = candidates.into();

    while let Some(candidate) = pending.pop_front() {
        match fused.iter().position(|existing| is_duplicate(existing, &candidate)) {
            Some(idx) => {
                let existing = fused.remove(idx);
                debug!(
                    "Merging duplicate \"{}\" into \"{}\"",
                    candidate.name, existing.name
                );
                pending.push_front(merge(existing, candidate, config.merge_bonus));
            }
            None => fused.push(candidate),
        }
    }

    fused.sort_by(|a, b| match (a.timestamp_ms, b.timestamp_ms) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.confidence.cmp(&a.confidence),
    });

    info!("Fusion: {} candidates -> {} products", input_len, fused.len());
    fused
}
