//! Deterministic hash-projection embedder.

use super::{Embedder, normalize};
use crate::Result;
use crate::models::Modality;
use sha2::{Digest, Sha256};

/// Deterministic embedder backed by token hashing.
///
/// Projects whitespace tokens onto a fixed number of dimensions via a
/// SHA-256 hash of each token. Identical content always yields identical
/// vectors, making it suitable for tests and for deployments without an
/// embedding model. Semantically unrelated content is very unlikely to
/// collide, but this is not a semantic embedding.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Default dimensionality, matching small sentence-embedding models.
    pub const DEFAULT_DIMENSIONS: usize = 384;

    /// Creates a hash embedder with the given dimensionality.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Creates a hash embedder with the default dimensionality.
    #[must_use]
    pub const fn with_default_dimensions() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::with_default_dimensions()
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, content: &str, modality: &Modality) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimensions];
        // Prefix tokens with the modality tag so equal text in different
        // modalities does not collide to similarity 1.0.
        let tag = modality.as_str();
        for token in content.split_whitespace() {
            let mut hasher = Sha256::new();
            hasher.update(tag.as_bytes());
            hasher.update(b"\0");
            hasher.update(token.to_lowercase().as_bytes());
            let digest = hasher.finalize();
            let bucket = (usize::from(digest[0]) << 8) | usize::from(digest[1]);
            let sign = if digest[2] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket % self.dimensions] += sign;
        }
        if vector.iter().all(|v| v.abs() <= f32::EPSILON) {
            // Empty or token-free content still deserves a stable vector.
            vector[0] = 1.0;
        }
        normalize(&vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_content_identical_vector() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("coffee with sofia", &Modality::Text);
        let b = embedder.embed("coffee with sofia", &Modality::Text);
        assert_eq!(a.ok(), b.ok());
    }

    #[test]
    fn test_different_content_different_vector() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("coffee with sofia", &Modality::Text);
        let b = embedder.embed("quarterly tax filing", &Modality::Text);
        assert_ne!(a.ok(), b.ok());
    }

    #[test]
    fn test_modality_prefix_separates_vectors() {
        let embedder = HashEmbedder::new(64);
        let text = embedder.embed("harbour sunset", &Modality::Text);
        let image = embedder.embed(
            "harbour sunset",
            &Modality::ImageDescriptor { dimensions: None },
        );
        assert_ne!(text.ok(), image.ok());
    }

    #[test]
    fn test_empty_content_yields_stable_unit_vector() {
        let embedder = HashEmbedder::new(8);
        let v = embedder.embed("", &Modality::Text);
        let Ok(v) = v else {
            assert!(v.is_ok());
            return;
        };
        let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-6);
    }
}
