//! Embedding generation port.
//!
//! The engine never talks to an embedding model directly; it consumes this
//! trait, implemented outside the core by whatever backend the surrounding
//! system configures. A deterministic hash-projection embedder is provided
//! for tests and embedding-less deployments.

// Allow cast precision loss for hash-based embedding calculations.
#![allow(clippy::cast_precision_loss)]

mod hash;

pub use hash::HashEmbedder;

use crate::models::Modality;
use crate::{Error, Result};

/// Trait for embedding generators (the embedding port).
///
/// Implementations map raw content to a fixed-length vector. Failures are
/// surfaced as [`Error::EmbeddingUnavailable`]; the core treats that as a
/// terminal ingestion failure and never retries internally.
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmbeddingUnavailable`] if the backing service is
    /// unreachable or misconfigured.
    fn embed(&self, content: &str, modality: &Modality) -> Result<Vec<f32>>;
}

/// Normalizes a vector to unit length so cosine similarity reduces to a
/// dot product at search time.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for empty or zero-magnitude vectors,
/// which cannot participate in cosine similarity.
pub fn normalize(embedding: &[f32]) -> Result<Vec<f32>> {
    if embedding.is_empty() {
        return Err(Error::InvalidArgument(
            "embedding must not be empty".to_string(),
        ));
    }
    let magnitude = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
    if magnitude <= f32::EPSILON {
        return Err(Error::InvalidArgument(
            "embedding has zero magnitude".to_string(),
        ));
    }
    Ok(embedding.iter().map(|v| v / magnitude).collect())
}

/// Dot product of two equal-length vectors.
///
/// Over normalized vectors this is exactly cosine similarity.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let normalized = normalize(&[3.0, 4.0]);
        let Ok(v) = normalized else {
            assert!(normalized.is_ok());
            return;
        };
        let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_rejects_zero_vector() {
        assert!(normalize(&[0.0, 0.0, 0.0]).is_err());
        assert!(normalize(&[]).is_err());
    }

    #[test]
    fn test_dot_is_cosine_over_normalized() {
        assert!((dot(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(dot(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }
}
