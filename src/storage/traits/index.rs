//! Semantic index trait.
//!
//! Nearest-neighbor search over embedding vectors, partitioned by tenant.
//! Similarity is cosine over normalized vectors, which implementations may
//! compute as a plain dot product.
//!
//! # Ordering
//!
//! `search` results are ordered by descending similarity. Ties are broken
//! by more-recent `created_at` first, then lexicographic id, so result
//! order is reproducible across runs and backends.

use crate::Result;
use crate::models::{MemoryId, TenantId};

/// Trait for semantic index backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn SemanticIndex>`
/// - Use interior mutability for mutable state
/// - Partitions must be physically separate per tenant; no query may
///   cross tenant boundaries
pub trait SemanticIndex: Send + Sync {
    /// Inserts or replaces the embedding for a unit.
    ///
    /// `created_at` is carried so the index can apply its recency
    /// tiebreak without consulting the repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert operation fails.
    fn insert(
        &self,
        tenant: &TenantId,
        id: &MemoryId,
        embedding: &[f32],
        created_at: u64,
    ) -> Result<()>;

    /// Removes a unit's embedding. Returns true if it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal operation fails.
    fn remove(&self, tenant: &TenantId, id: &MemoryId) -> Result<bool>;

    /// Returns up to `k` candidates ordered by descending similarity,
    /// excluding scores below `min_score`.
    ///
    /// An empty tenant partition yields an empty result, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] for a zero `k`, an
    /// out-of-range `min_score`, or a query dimension mismatch.
    fn search(
        &self,
        tenant: &TenantId,
        query: &[f32],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<(MemoryId, f32)>>;

    /// Returns all distinct pairs with similarity at or above `threshold`,
    /// ordered deterministically (lexicographic by first then second id).
    ///
    /// Used by consolidation merge detection.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan operation fails.
    fn pairs_above(
        &self,
        tenant: &TenantId,
        threshold: f32,
    ) -> Result<Vec<(MemoryId, MemoryId, f32)>>;

    /// Returns the number of indexed embeddings for a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    fn len(&self, tenant: &TenantId) -> Result<usize>;

    /// Returns true if the tenant has no indexed embeddings.
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    fn is_empty(&self, tenant: &TenantId) -> Result<bool> {
        Ok(self.len(tenant)? == 0)
    }
}
