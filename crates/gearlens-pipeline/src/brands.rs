//! Fuzzy brand matching against a curated dictionary.
//!
//! Two-tier correction for garbled brand names from auto-transcripts and
//! on-screen text reading: a curated garble map first (mis-hearings no edit
//! distance can fix), then Levenshtein against the dictionary with a
//! length-dependent distance bound.

use strsim::levenshtein;
use tracing::debug;

/// One brand with its canonical display name and known aliases.
#[derive(Debug, Clone)]
pub struct BrandEntry {
    pub name: String,
    pub aliases: Vec<String>,
}

impl BrandEntry {
    pub fn new(name: impl Into<String>, aliases: &[&str]) -> Self {
        Self {
            name: name.into(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Transcript mis-hearings mapped to the correct brand. These are beyond
/// what edit distance can recover.
const GARBLE_MAP: &[(&str, &str)] = &[
    ("erg leon", "HercLeon"),
    ("erglon", "HercLeon"),
    ("her leon", "HercLeon"),
    ("herc leon", "HercLeon"),
    ("herk leon", "HercLeon"),
    ("kettle", "KETL Mtn"),
    ("ketl", "KETL Mtn"),
    ("kettle mountain", "KETL Mtn"),
    ("cattle mountain", "KETL Mtn"),
    ("onbound marino", "Unbound Merino"),
    ("onbound merino", "Unbound Merino"),
    ("unbound marino", "Unbound Merino"),
    ("10000", "Ten Thousand"),
    ("10,000", "Ten Thousand"),
    ("ten thousand", "Ten Thousand"),
    ("buffy", "BUFF"),
    ("buff", "BUFF"),
    ("cariuma", "Cariloha"),
    ("carolina", "Cariloha"),
    ("backbone", "Pakt"),
    ("packed", "Pakt"),
    ("packet", "Pakt"),
    ("pack one", "Pakt"),
    ("pact", "Pakt"),
    ("sidon", "Seadon"),
    ("saidon", "Seadon"),
    ("sea don", "Seadon"),
    ("ku xiu", "KUXIU"),
    ("coochoo", "KUXIU"),
    ("koochoo", "KUXIU"),
    ("vivo barefoot", "Vivobarefoot"),
    ("wandered", "WANDRD"),
    ("wandrd", "WANDRD"),
    ("wander", "WANDRD"),
    ("basis", "Baseus"),
    ("bases", "Baseus"),
    ("baysius", "Baseus"),
    ("roave", "ROAV"),
    ("rove", "ROAV"),
    ("wildling", "Wildling Shoes"),
    ("wildling shoes", "Wildling Shoes"),
    ("sandisk", "SanDisk"),
    ("san disk", "SanDisk"),
    ("moft", "MOFT"),
];

/// Result of a fuzzy dictionary match.
#[derive(Debug, Clone)]
pub struct FuzzyMatch<'a> {
    pub brand: &'a BrandEntry,
    pub distance: usize,
    /// The dictionary string (name or alias) the input matched.
    pub matched_against: String,
}

/// Brand dictionary with a flat searchable index, built once per run and
/// passed by reference to every matcher call.
#[derive(Debug)]
pub struct BrandDictionary {
    entries: Vec<BrandEntry>,
    /// (normalized searchable text, entry index)
    index: Vec<(String, usize)>,
}

impl BrandDictionary {
    /// Build a dictionary from brand entries.
    pub fn new(entries: Vec<BrandEntry>) -> Self {
        let mut index = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            index.push((entry.name.to_lowercase(), i));
            for alias in &entry.aliases {
                index.push((alias.to_lowercase(), i));
            }
        }
        Self { entries, index }
    }

    /// Build the dictionary with the built-in brand set.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            BrandEntry::new("HercLeon", &["herc leon"]),
            BrandEntry::new("KETL Mtn", &["ketl", "ketl mountain"]),
            BrandEntry::new("Unbound Merino", &["unbound"]),
            BrandEntry::new("Ten Thousand", &["10000"]),
            BrandEntry::new("BUFF", &[]),
            BrandEntry::new("Cariloha", &[]),
            BrandEntry::new("Pakt", &[]),
            BrandEntry::new("Seadon", &[]),
            BrandEntry::new("KUXIU", &[]),
            BrandEntry::new("Vivobarefoot", &["vivo"]),
            BrandEntry::new("WANDRD", &[]),
            BrandEntry::new("Baseus", &[]),
            BrandEntry::new("ROAV", &[]),
            BrandEntry::new("Wildling Shoes", &["wildling"]),
            BrandEntry::new("SanDisk", &[]),
            BrandEntry::new("MOFT", &[]),
            BrandEntry::new("Patagonia", &[]),
            BrandEntry::new("Osprey", &[]),
            BrandEntry::new("Peak Design", &["peak"]),
            BrandEntry::new("Matador", &[]),
            BrandEntry::new("Aer", &[]),
            BrandEntry::new("Bellroy", &[]),
            BrandEntry::new("Anker", &[]),
            BrandEntry::new("Apple", &[]),
            BrandEntry::new("Sony", &[]),
            BrandEntry::new("Bose", &[]),
            BrandEntry::new("Lululemon", &["lulu lemon"]),
            BrandEntry::new("Arc'teryx", &["arcteryx"]),
            BrandEntry::new("On", &[]),
            BrandEntry::new("LG", &[]),
        ])
    }

    pub fn entries(&self) -> &[BrandEntry] {
        &self.entries
    }

    /// Fuzzy-match an input string against the dictionary.
    ///
    /// Exact name/alias match short-circuits at distance 0. Otherwise the
    /// lowest Levenshtein distance within the length-dependent bound wins,
    /// ties broken by first-found.
    pub fn fuzzy_match(&self, input: &str) -> Option<FuzzyMatch<'_>> {
        let normalized = input.to_lowercase();
        let normalized = normalized.trim();
        if normalized.is_empty() {
            return None;
        }

        // Fast path: exact name or alias.
        for (text, idx) in &self.index {
            if text == normalized {
                return Some(FuzzyMatch {
                    brand: &self.entries[*idx],
                    distance: 0,
                    matched_against: text.clone(),
                });
            }
        }

        let mut best: Option<FuzzyMatch<'_>> = None;
        for (text, idx) in &self.index {
            let max_dist = max_distance_for_len(text.len());
            if max_dist == 0 {
                continue;
            }
            if normalized.len().abs_diff(text.len()) > max_dist {
                continue;
            }
            // Short entries must agree on the first character.
            if text.len() < 6 && normalized.chars().next() != text.chars().next() {
                continue;
            }
            let distance = levenshtein(normalized, text);
            if distance <= max_dist && best.as_ref().map_or(true, |b| distance < b.distance) {
                best = Some(FuzzyMatch {
                    brand: &self.entries[*idx],
                    distance,
                    matched_against: text.clone(),
                });
            }
        }
        best
    }

    /// Correct a garbled brand name, checking the garble map before falling
    /// back to fuzzy dictionary matching. Returns `None` when the input needs
    /// no correction or nothing matched.
    pub fn fix_garbled(&self, brand: &str) -> Option<String> {
        if brand.len() < 2 {
            return None;
        }
        let normalized = brand.to_lowercase();
        let normalized = normalized.trim();

        for (garble, correct) in GARBLE_MAP {
            if normalized == *garble {
                debug!("Garble map: {:?} -> {:?}", brand, correct);
                return Some((*correct).to_string());
            }
        }
        for (garble, correct) in GARBLE_MAP {
            if normalized.contains(garble) || garble.contains(normalized) {
                debug!("Partial garble: {:?} -> {:?}", brand, correct);
                return Some((*correct).to_string());
            }
        }

        match self.fuzzy_match(normalized) {
            Some(m) if m.distance > 0 => {
                debug!(
                    "Corrected {:?} -> {:?} (distance {})",
                    brand, m.brand.name, m.distance
                );
                Some(m.brand.name.clone())
            }
            _ => None,
        }
    }

    /// Apply garble correction, returning the corrected brand or the input.
    pub fn correct_or_keep(&self, brand: &str) -> String {
        self.fix_garbled(brand).unwrap_or_else(|| brand.to_string())
    }
}

/// Maximum Levenshtein distance allowed for a dictionary entry of the given
/// length. Very short brand names ("On", "LG") are exact-only.
fn max_distance_for_len(len: usize) -> usize {
    if len < 3 {
        0
    } else if len < 8 {
        1
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_alias_matches_at_zero() {
        let dict = BrandDictionary::with_defaults();
        let m = dict.fuzzy_match("ketl mountain").unwrap();
        assert_eq!(m.brand.name, "KETL Mtn");
        assert_eq!(m.distance, 0);
    }

    #[test]
    fn one_edit_matches_short_brand() {
        let dict = BrandDictionary::with_defaults();
        let m = dict.fuzzy_match("ankor").unwrap();
        assert_eq!(m.brand.name, "Anker");
        assert_eq!(m.distance, 1);
    }

    #[test]
    fn short_brands_require_exact_match() {
        let dict = BrandDictionary::with_defaults();
        // "On" must only match exactly, never fuzzily.
        assert_eq!(dict.fuzzy_match("on").unwrap().brand.name, "On");
        assert!(dict.fuzzy_match("onn").is_none());
        assert!(dict.fuzzy_match("in").is_none());
    }

    #[test]
    fn first_char_pruning_for_short_entries() {
        let dict = BrandDictionary::new(vec![BrandEntry::new("Pakt", &[])]);
        // "bakt" is one edit from "pakt" but fails the first-char gate.
        assert!(dict.fuzzy_match("bakt").is_none());
    }

    #[test]
    fn garble_map_beats_fuzzy() {
        let dict = BrandDictionary::with_defaults();
        assert_eq!(dict.fix_garbled("Kettle").as_deref(), Some("KETL Mtn"));
        assert_eq!(dict.fix_garbled("Wandered").as_deref(), Some("WANDRD"));
        assert_eq!(dict.fix_garbled("Basis").as_deref(), Some("Baseus"));
    }

    #[test]
    fn partial_garble_containment() {
        let dict = BrandDictionary::with_defaults();
        assert_eq!(
            dict.fix_garbled("the kettle brand").as_deref(),
            Some("KETL Mtn")
        );
    }

    #[test]
    fn clean_brand_needs_no_correction() {
        let dict = BrandDictionary::with_defaults();
        assert_eq!(dict.fix_garbled("Patagonia"), None);
        assert_eq!(dict.correct_or_keep("Patagonia"), "Patagonia");
    }
}
