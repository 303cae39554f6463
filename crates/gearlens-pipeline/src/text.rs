//! Text similarity primitives shared by the validator, gap resolver,
//! and fusion stages.

use std::collections::HashSet;

use strsim::levenshtein;

/// Words longer than this many characters count toward Jaccard overlap.
const MIN_WORD_LEN: usize = 2;

/// Split a name into its significant lowercase words.
pub fn significant_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > MIN_WORD_LEN)
        .map(|w| w.to_string())
        .collect()
}

/// Jaccard similarity of the significant word sets of two strings.
/// Returns 0.0 when either side has no significant words.
pub fn word_jaccard(a: &str, b: &str) -> f64 {
    let words_a = significant_words(a);
    let words_b = significant_words(b);
    set_jaccard(&words_a, &words_b)
}

/// Jaccard similarity of two pre-built word sets.
pub fn set_jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Whether two product names refer to the same product.
///
/// Checks, in order: exact match, substring containment, word Jaccard of
/// at least 0.4, and a length-scaled edit distance for names under 20
/// characters.
pub fn names_match(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let a = a.trim();
    let b = b.trim();

    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    if a.contains(b) || b.contains(a) {
        return true;
    }
    if word_jaccard(a, b) >= 0.4 {
        return true;
    }
    if a.len() < 20 && b.len() < 20 {
        let max_dist = (a.len().min(b.len()) / 4).max(1);
        if levenshtein(a, b) <= max_dist {
            return true;
        }
    }
    false
}

/// Whether two brand names refer to the same brand. Empty or "Unknown"
/// brands never match.
pub fn brands_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a.eq_ignore_ascii_case("unknown") || b.eq_ignore_ascii_case("unknown") {
        return false;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let a = a.trim();
    let b = b.trim();

    if a == b {
        return true;
    }
    if a.contains(b) || b.contains(a) {
        return true;
    }
    // One edit of slack for brands long enough to not collide by accident.
    if a.len() >= 5 && b.len() >= 5 {
        return levenshtein(a, b) <= 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_of_overlapping_names() {
        let sim = word_jaccard("KETL Mtn Sunshirt", "KETL Mtn Vent Sunshirt");
        assert!(sim >= 0.4, "similarity {} too low", sim);
    }

    #[test]
    fn jaccard_ignores_short_words() {
        // "on" and "xl" fall below the significant-word length.
        assert_eq!(word_jaccard("on xl", "on xl"), 0.0);
    }

    #[test]
    fn names_match_exact_and_substring() {
        assert!(names_match("MacBook Pro", "macbook pro"));
        assert!(names_match("MacBook Pro", "MacBook Pro 14"));
    }

    #[test]
    fn names_match_small_typo() {
        assert!(names_match("Sunshirt", "Sunshrit"));
    }

    #[test]
    fn names_do_not_match_distinct_products() {
        assert!(!names_match("MacBook Pro", "Kindle Paperwhite"));
    }

    #[test]
    fn brands_match_rules() {
        assert!(brands_match("Baseus", "baseus"));
        assert!(brands_match("KETL Mtn", "KETL"));
        assert!(brands_match("Patagonia", "Patagonla"));
        assert!(!brands_match("", "Baseus"));
        assert!(!brands_match("Unknown", "Baseus"));
        assert!(!brands_match("Sony", "Bose"));
    }
}
