//! Perceptual hashing of frame images.
//!
//! Average hash: resize to an 8x8 grid, convert to grayscale, threshold each
//! cell against the grid mean. Two frames that differ only by lighting or
//! compression noise land within a small Hamming distance of each other.

use std::path::Path;

use image::imageops::FilterType;

use gearlens_models::PerceptualHash;

use crate::error::{MediaError, MediaResult};

/// Compute the average hash of an image file.
pub fn hash_image_file(path: &Path) -> MediaResult<PerceptualHash> {
    let img = image::open(path).map_err(|e| MediaError::image_decode(e.to_string()))?;
    let luma = img.resize_exact(8, 8, FilterType::Triangle).to_luma8();

    let mut cells = [0u8; 64];
    for (i, pixel) in luma.pixels().enumerate().take(64) {
        cells[i] = pixel.0[0];
    }
    Ok(PerceptualHash::from_luma_grid(&cells))
}

/// Read an image's pixel dimensions, falling back to 720p defaults when the
/// file cannot be decoded.
pub fn image_dimensions_or_default(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap_or((1280, 720))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};
    use tempfile::TempDir;

    fn write_gradient(dir: &TempDir, name: &str, offset: u8) -> std::path::PathBuf {
        let img = ImageBuffer::from_fn(64, 64, |x, _| {
            Luma([((x * 4) as u8).saturating_add(offset)])
        });
        let path = dir.path().join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn identical_images_hash_equal() {
        let dir = TempDir::new().unwrap();
        let a = write_gradient(&dir, "a.png", 0);
        let b = write_gradient(&dir, "b.png", 0);
        assert_eq!(
            hash_image_file(&a).unwrap(),
            hash_image_file(&b).unwrap()
        );
    }

    #[test]
    fn lighting_shift_stays_close() {
        let dir = TempDir::new().unwrap();
        let a = write_gradient(&dir, "a.png", 0);
        let b = write_gradient(&dir, "b.png", 10);
        let dist = hash_image_file(&a)
            .unwrap()
            .distance(hash_image_file(&b).unwrap());
        assert!(dist <= 4, "uniform brightness shift moved {} bits", dist);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(hash_image_file(&path).is_err());
    }
}
