//! Transcript mention extraction.
//!
//! Two-pass analysis of a timestamped transcript through the oracle: a
//! first pass extracting every product mention, and a second "missed
//! products" pass that only runs when the first pass found enough to
//! suggest a gear-heavy video. Brands are garble-corrected on the way out.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use gearlens_models::{parse_timestamp_ms, TranscriptMention};

use crate::brands::BrandDictionary;
use crate::oracle::{RawMention, RecognitionOracle, VideoContext};

/// Transcript length cap per prompt, in characters.
const TRANSCRIPT_CHAR_LIMIT: usize = 50_000;

/// The second pass only runs when the first pass found at least this many
/// products; fewer suggests the video is not product-focused.
const SECOND_PASS_THRESHOLD: usize = 10;

/// Extract product mentions from a timestamped transcript.
///
/// Oracle failures degrade to an empty mention list; the pipeline
/// continues on the remaining sources.
pub async fn extract_mentions(
    oracle: Arc<dyn RecognitionOracle>,
    transcript: &str,
    context: &VideoContext,
    dictionary: &BrandDictionary,
) -> Vec<TranscriptMention> {
    if transcript.trim().is_empty() {
        return Vec::new();
    }

    let first_prompt = first_pass_prompt(transcript, context);
    let mut raw = match oracle.extract_mentions(&first_prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Transcript analysis failed: {}", e);
            return Vec::new();
        }
    };

    if raw.len() >= SECOND_PASS_THRESHOLD {
        let second_prompt = second_pass_prompt(transcript, &raw, context);
        match oracle.extract_mentions(&second_prompt).await {
            Ok(missed) if !missed.is_empty() => {
                info!("Second transcript pass found {} more products", missed.len());
                raw.extend(missed);
            }
            Ok(_) => {}
            Err(e) => warn!("Second transcript pass failed: {}", e),
        }
    }

    let mentions: Vec<TranscriptMention> = raw
        .into_iter()
        .filter(|r| !r.name.trim().is_empty())
        .map(|r| sanitize_mention(r, dictionary))
        .collect();

    info!("Transcript: {} product mentions", mentions.len());
    mentions
}

/// Turn a raw oracle mention into the internal type: parse the timestamp
/// (fail-soft) and garble-correct the brand.
fn sanitize_mention(raw: RawMention, dictionary: &BrandDictionary) -> TranscriptMention {
    let timestamp_ms = raw
        .timestamp
        .as_deref()
        .and_then(|ts| parse_timestamp_ms(ts).ok());
    let brand = raw.brand.filter(|b| !b.trim().is_empty()).map(|b| {
        dictionary.fix_garbled(&b).unwrap_or(b)
    });
    TranscriptMention {
        name: raw.name.trim().to_string(),
        brand,
        category: raw.category.filter(|c| !c.trim().is_empty()),
        mention_context: raw.mention_context,
        timestamp_ms,
    }
}

fn truncated(transcript: &str) -> &str {
    match transcript.char_indices().nth(TRANSCRIPT_CHAR_LIMIT) {
        Some((idx, _)) => &transcript[..idx],
        None => transcript,
    }
}

fn first_pass_prompt(transcript: &str, context: &VideoContext) -> String {
    format!(
        r#"Analyze this timestamped video transcript to extract ALL products the creator mentions, discusses, reviews, or recommends.

VIDEO TITLE: {title}
CHANNEL: {channel}

TIMESTAMPED TRANSCRIPT:
{transcript}

For EACH distinct product mentioned:
1. Extract the exact brand and model/product name
2. Note the category (e.g., "shirt", "backpack", "laptop", "headphones")
3. Quote a brief snippet of what the creator said about it (mention_context)
4. Note the timestamp where they FIRST mention it

BRAND RULES:
- Product line names are MODEL LINES, not brands. The BRAND is the parent company.
- ALWAYS set the brand to the parent company, NEVER to a product line name.
- Auto-transcripts often garble brand names. Common corrections:
  * "Erg Leon" / "Her Leon" = HercLeon
  * "Kettle" / "Cattle" = KETL Mtn
  * "Onbound Marino" = Unbound Merino
  * "Backbone" / "Packed" = Pakt
  * "Wandered" = WANDRD
  * "Basis" = Baseus

DEDUPLICATION:
- Return each distinct product ONCE with the timestamp of its FIRST mention.
- Different sizes/colors of the same model are NOT separate products.

IMPORTANT:
- Be thorough: extract EVERY distinct product, not just the main ones
- Include accessories, bags, apparel, tech
- If they only say a model name, infer the brand from context

Return JSON:
{{
  "products": [
    {{
      "name": "Full Product Name (without brand prefix)",
      "brand": "Brand (parent company)",
      "category": "category",
      "mention_context": "brief quote of what creator said",
      "timestamp": "2:34"
    }}
  ]
}}"#,
        title = context.title,
        channel = context.channel_name,
        transcript = truncated(transcript),
    )
}

/// Hints about categories and brands likely underrepresented so far.
fn missing_category_hints(found: &[RawMention]) -> String {
    let mut brands: HashMap<String, usize> = HashMap::new();
    for mention in found {
        if let Some(brand) = &mention.brand {
            if !brand.trim().is_empty() {
                *brands.entry(brand.to_lowercase()).or_default() += 1;
            }
        }
    }

    let mut hints = Vec::new();
    let multi: Vec<String> = brands
        .iter()
        .filter(|(_, count)| **count >= 2)
        .map(|(brand, count)| format!("{} ({} found so far)", brand, count))
        .collect();
    if !multi.is_empty() {
        hints.push(format!(
            "Brands with multiple products (likely have MORE items): {}",
            multi.join(", ")
        ));
    }
    hints.push(format!(
        "You found {} products so far, there are probably more.",
        found.len()
    ));
    hints.join("\n")
}

fn second_pass_prompt(
    transcript: &str,
    already_found: &[RawMention],
    context: &VideoContext,
) -> String {
    let found_list = already_found
        .iter()
        .map(|m| {
            format!(
                "- {} {} ({})",
                m.brand.as_deref().unwrap_or("?"),
                m.name,
                m.category.as_deref().unwrap_or("?")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"This transcript was already analyzed and {count} products were found.

VIDEO TITLE: {title}
CHANNEL: {channel}

ALREADY FOUND:
{found_list}

TRANSCRIPT:
{transcript}

TASK: Carefully re-read the ENTIRE transcript. Find products that are MISSING from the "Already Found" list above.

{hints}

Look for ANY product category that seems underrepresented in the found list:
- Electronics and accessories (chargers, cables, adapters, power banks)
- Grooming and toiletries (razors, toothbrush, toiletry kits)
- Outerwear and layers (rain jackets, fleece, vests)
- Travel accessories (sleep masks, water bottles, travel adapters)
- Bags and organizers (pouches, packing cubes, stuff sacks)
- Products mentioned only once or in passing

CRITICAL: Even if the creator mentions a product for just 2-3 seconds, INCLUDE IT.
Only return products that are GENUINELY NEW (not duplicates of what was already found).

Return JSON:
{{
  "products": [
    {{
      "name": "Product Name",
      "brand": "Brand",
      "category": "category",
      "mention_context": "brief quote",
      "timestamp": "M:SS"
    }}
  ]
}}

If no additional products are found, return {{"products": []}}"#,
        count = already_found.len(),
        title = context.title,
        channel = context.channel_name,
        found_list = found_list,
        transcript = truncated(transcript),
        hints = missing_category_hints(already_found),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, brand: Option<&str>, ts: Option<&str>) -> RawMention {
        RawMention {
            name: name.to_string(),
            brand: brand.map(|b| b.to_string()),
            category: None,
            mention_context: None,
            timestamp: ts.map(|t| t.to_string()),
        }
    }

    #[test]
    fn sanitize_parses_timestamp_and_fixes_brand() {
        let dict = BrandDictionary::with_defaults();
        let mention = sanitize_mention(raw("Sunshirt", Some("Kettle"), Some("2:34")), &dict);
        assert_eq!(mention.brand.as_deref(), Some("KETL Mtn"));
        assert_eq!(mention.timestamp_ms, Some(154_000));
    }

    #[test]
    fn sanitize_fails_soft_on_bad_timestamp() {
        let dict = BrandDictionary::with_defaults();
        let mention = sanitize_mention(raw("Sunshirt", None, Some("around 2 min")), &dict);
        assert_eq!(mention.timestamp_ms, None);
        assert_eq!(mention.brand, None);
    }

    #[test]
    fn hints_flag_multi_product_brands() {
        let found = vec![
            raw("Sunshirt", Some("KETL Mtn"), None),
            raw("Overshirt", Some("KETL Mtn"), None),
            raw("Zed 3", Some("Acme"), None),
        ];
        let hints = missing_category_hints(&found);
        assert!(hints.contains("ketl mtn (2 found so far)"));
        assert!(hints.contains("3 products"));
    }
}
