//! Frame identity, origin, and perceptual hashing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for an extracted frame.
///
/// Components other than the frame store hold only ids, never file paths;
/// the store owns the backing storage and its cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(String);

impl FrameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FrameId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How a frame was selected during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameOrigin {
    /// Sampled at the fixed interval.
    Interval,
    /// Selected by the decoder's scene-change detection.
    SceneChange,
}

/// 64-bit average hash: 8x8 grayscale grid, each bit set when the cell's
/// luminance is at or above the grid mean. Tolerant of lighting noise, so
/// near-duplicate frames land within a small Hamming distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerceptualHash(u64);

impl PerceptualHash {
    pub const ZERO: Self = Self(0);

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    /// Compute the hash from a 64-cell luminance grid (row-major 8x8).
    pub fn from_luma_grid(cells: &[u8; 64]) -> Self {
        let sum: u32 = cells.iter().map(|&c| c as u32).sum();
        let mean = sum / 64;

        let mut bits = 0u64;
        for (i, &cell) in cells.iter().enumerate() {
            if cell as u32 >= mean {
                bits |= 1 << i;
            }
        }
        Self(bits)
    }

    /// Number of differing bits between two hashes.
    pub fn distance(self, other: Self) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

/// Frame metadata visible to pipeline stages (no storage path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMeta {
    pub id: FrameId,
    pub timestamp_ms: u64,
    pub width: u32,
    pub height: u32,
    pub origin: FrameOrigin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_distance_counts_bits() {
        let a = PerceptualHash::from_bits(0b1010);
        let b = PerceptualHash::from_bits(0b0110);
        assert_eq!(a.distance(b), 2);
        assert_eq!(a.distance(a), 0);
    }

    #[test]
    fn luma_grid_thresholds_at_mean() {
        let mut cells = [0u8; 64];
        for cell in cells.iter_mut().take(32) {
            *cell = 200;
        }
        let hash = PerceptualHash::from_luma_grid(&cells);
        assert_eq!(hash.bits().count_ones(), 32);
    }

    #[test]
    fn luma_grid_tolerates_small_noise() {
        let mut bright = [0u8; 64];
        for cell in bright.iter_mut().take(32) {
            *cell = 200;
        }
        let mut noisy = bright;
        for cell in noisy.iter_mut() {
            *cell = cell.saturating_add(3);
        }
        let a = PerceptualHash::from_luma_grid(&bright);
        let b = PerceptualHash::from_luma_grid(&noisy);
        assert!(a.distance(b) <= 2, "noise shifted too many bits");
    }

    #[test]
    fn frame_id_display() {
        let id = FrameId::new("frame_0001");
        assert_eq!(id.to_string(), "frame_0001");
        assert_eq!(id.as_str(), "frame_0001");
    }
}
