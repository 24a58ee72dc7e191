//! Average hash ("aHash") of a decoded frame.
//!
//! The frame is reduced to an 8x8 grayscale thumbnail and every pixel
//! brighter than the thumbnail's mean sets one bit. Re-encodes, resizes and
//! small colour shifts of the same picture land on the same 64 bits, while
//! unrelated pictures almost never do.

use image::imageops::FilterType;
use image::DynamicImage;

const HASH_SIDE: u32 = 8;

/// A 64-bit perceptual hash. The first thumbnail pixel is the most significant bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PerceptualHash(pub u64);

impl PerceptualHash {
    /// Calculate the Hamming distance between two hashes.
    pub fn distance(&self, other: &PerceptualHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Fixed-width lowercase hex form, 16 characters.
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl std::fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Calculate the average hash of an image.
pub fn average_hash(img: &DynamicImage) -> PerceptualHash {
    let small = img
        .grayscale()
        .resize_exact(HASH_SIDE, HASH_SIDE, FilterType::Lanczos3)
        .to_luma8();

    let pixels: Vec<f64> = small.pixels().map(|p| p[0] as f64).collect();
    let mean = pixels.iter().sum::<f64>() / pixels.len() as f64;

    let hash = pixels
        .iter()
        .fold(0u64, |acc, &p| (acc << 1) | u64::from(p > mean));

    PerceptualHash(hash)
}
