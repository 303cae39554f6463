//! Text clustering: grouping adjacent frames whose detected text overlaps
//! into candidate product segments.
//!
//! Single linear pass over the time-sorted detections. A new cluster starts
//! whenever the time gap to the previous kept frame exceeds the threshold or
//! the channel-filtered text similarity drops below the merge threshold.

use std::collections::{HashMap, HashSet};

use tracing::info;

use gearlens_models::{ClusterId, ProductCluster, TextDetection};

use crate::brands::BrandDictionary;
use crate::text_detect::is_generic_text;

/// Group product-text detections into clusters.
///
/// `channel_name` is excluded from similarity comparisons since it recurs
/// in many frames without identifying a product.
pub fn cluster_detections(
    detections: &[TextDetection],
    channel_name: &str,
    dictionary: &BrandDictionary,
    max_gap_ms: u64,
    min_jaccard: f64,
) -> Vec<ProductCluster> {
    let mut relevant: Vec<&TextDetection> = detections
        .iter()
        .filter(|d| d.has_product_text)
        .collect();
    relevant.sort_by_key(|d| d.timestamp_ms);

    let mut clusters = Vec::new();
    let mut current: Vec<&TextDetection> = Vec::new();

    for detection in relevant {
        let start_new = match current.last() {
            None => true,
            Some(prev) => {
                detection.timestamp_ms.saturating_sub(prev.timestamp_ms) > max_gap_ms
                    || text_jaccard(prev, detection, channel_name) < min_jaccard
            }
        };
        if start_new && !current.is_empty() {
            if let Some(cluster) = finish_cluster(&current, clusters.len(), dictionary) {
                clusters.push(cluster);
            }
            current.clear();
        }
        current.push(detection);
    }
    if !current.is_empty() {
        if let Some(cluster) = finish_cluster(&current, clusters.len(), dictionary) {
            clusters.push(cluster);
        }
    }

    info!("Clustered text detections into {} product segments", clusters.len());
    clusters
}

/// Jaccard similarity of two frames' text sets with channel mentions removed.
fn text_jaccard(a: &TextDetection, b: &TextDetection, channel_name: &str) -> f64 {
    let set_a = filtered_set(a, channel_name);
    let set_b = filtered_set(b, channel_name);
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn filtered_set(detection: &TextDetection, channel_name: &str) -> HashSet<String> {
    let channel = channel_name.to_lowercase();
    detection
        .texts
        .iter()
        .map(|t| t.to_lowercase())
        .filter(|t| channel.is_empty() || (!t.contains(&channel) && !channel.contains(t.as_str())))
        .collect()
}

/// Build a cluster from its member detections, or `None` when the members
/// carry nothing but boilerplate text.
fn finish_cluster(
    members: &[&TextDetection],
    index: usize,
    dictionary: &BrandDictionary,
) -> Option<ProductCluster> {
    // Union of member texts in first-seen order.
    let mut texts: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for member in members {
        for text in &member.texts {
            let normalized = text.to_lowercase();
            if seen.insert(normalized) {
                texts.push(text.clone());
            }
        }
    }
    if texts.iter().all(|t| is_generic_text(t)) {
        return None;
    }

    let representative = members
        .iter()
        .max_by_key(|m| m.texts.len())
        .map(|m| m.frame_id.clone())?;

    // Most frequent normalized string, original casing from first occurrence.
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0usize;
    for member in members {
        for text in &member.texts {
            if is_generic_text(text) {
                continue;
            }
            let entry = counts.entry(text.to_lowercase()).or_insert((0, order));
            entry.0 += 1;
            order += 1;
        }
    }
    let primary_normalized = counts
        .iter()
        .max_by(|(_, (ca, oa)), (_, (cb, ob))| ca.cmp(cb).then(ob.cmp(oa)))
        .map(|(text, _)| text.clone())
        .unwrap_or_default();
    let primary_text = texts
        .iter()
        .find(|t| t.to_lowercase() == primary_normalized)
        .cloned()
        .unwrap_or_default();

    let brand_guess = texts
        .iter()
        .find_map(|t| dictionary.fuzzy_match(t).map(|m| m.brand.name.clone()));

    Some(ProductCluster {
        id: ClusterId::new(format!("cluster_{:03}", index)),
        frame_ids: members.iter().map(|m| m.frame_id.clone()).collect(),
        representative_frame: representative,
        start_ms: members.first().map(|m| m.timestamp_ms).unwrap_or(0),
        end_ms: members.last().map(|m| m.timestamp_ms).unwrap_or(0),
        texts,
        primary_text,
        brand_guess,
        transcript_context: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearlens_models::FrameId;

    fn detection(id: &str, ts: u64, texts: &[&str]) -> TextDetection {
        TextDetection {
            frame_id: FrameId::new(id),
            timestamp_ms: ts,
            texts: texts.iter().map(|t| t.to_string()).collect(),
            has_product_text: texts.iter().any(|t| !is_generic_text(t)),
        }
    }

    fn dict() -> BrandDictionary {
        BrandDictionary::with_defaults()
    }

    #[test]
    fn contiguous_similar_frames_form_one_cluster() {
        let detections = vec![
            detection("frame_0000", 0, &["KETL Mtn", "Sunshirt"]),
            detection("frame_0001", 2000, &["KETL Mtn", "Sunshirt"]),
            detection("frame_0002", 4000, &["KETL Mtn"]),
        ];
        let clusters = cluster_detections(&detections, "Channel", &dict(), 6000, 0.5);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].frame_ids.len(), 3);
        assert_eq!(clusters[0].start_ms, 0);
        assert_eq!(clusters[0].end_ms, 4000);
        assert_eq!(clusters[0].primary_text, "KETL Mtn");
        assert_eq!(clusters[0].brand_guess.as_deref(), Some("KETL Mtn"));
    }

    #[test]
    fn time_gap_splits_clusters() {
        let detections = vec![
            detection("frame_0000", 0, &["Sunshirt"]),
            detection("frame_0001", 20_000, &["Sunshirt"]),
        ];
        let clusters = cluster_detections(&detections, "", &dict(), 6000, 0.5);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn dissimilar_text_splits_clusters() {
        let detections = vec![
            detection("frame_0000", 0, &["Sunshirt"]),
            detection("frame_0001", 2000, &["MacBook Pro"]),
        ];
        let clusters = cluster_detections(&detections, "", &dict(), 6000, 0.5);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn representative_has_most_text() {
        let detections = vec![
            detection("frame_0000", 0, &["Sunshirt"]),
            detection("frame_0001", 2000, &["Sunshirt", "KETL Mtn"]),
        ];
        // Jaccard {sunshirt} vs {sunshirt, ketl mtn} = 1/2 >= 0.5, one cluster.
        let clusters = cluster_detections(&detections, "", &dict(), 6000, 0.5);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].representative_frame.as_str(), "frame_0001");
    }

    #[test]
    fn boilerplate_only_clusters_are_dropped() {
        let detections = vec![detection("frame_0000", 0, &["Sunshirt", "#ad"])];
        let mut only_chrome = detections.clone();
        only_chrome[0].texts = vec!["SUBSCRIBE".to_string(), "#ad".to_string()];
        only_chrome[0].has_product_text = true;
        let clusters = cluster_detections(&only_chrome, "", &dict(), 6000, 0.5);
        assert!(clusters.is_empty());
    }

    #[test]
    fn channel_name_is_ignored_for_similarity() {
        let detections = vec![
            detection("frame_0000", 0, &["Gear Channel", "Sunshirt"]),
            detection("frame_0001", 2000, &["Gear Channel", "Sunshirt"]),
        ];
        let clusters = cluster_detections(&detections, "Gear Channel", &dict(), 6000, 0.5);
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn clusters_are_time_ordered_and_disjoint() {
        let detections = vec![
            detection("frame_0000", 0, &["Sunshirt"]),
            detection("frame_0001", 2000, &["Sunshirt"]),
            detection("frame_0002", 30_000, &["MacBook Pro"]),
            detection("frame_0003", 32_000, &["MacBook Pro"]),
        ];
        let clusters = cluster_detections(&detections, "", &dict(), 6000, 0.5);
        assert_eq!(clusters.len(), 2);
        assert!(clusters[0].end_ms < clusters[1].start_ms);
        let mut seen = HashSet::new();
        for cluster in &clusters {
            for id in &cluster.frame_ids {
                assert!(seen.insert(id.clone()), "frame {} in two clusters", id);
            }
        }
    }
}
