//! Relation graph backend trait.
//!
//! Typed, weighted edges between memory units of a single tenant. The
//! graph may contain cycles (topical edges are symmetric); it is an
//! explicit adjacency structure keyed by tenant and id, never
//! language-level object references.
//!
//! # Operation Complexity
//!
//! | Operation | Complexity | Notes |
//! |-----------|------------|-------|
//! | `link` | O(k) | k = edges on the source node |
//! | `neighbors` | O(b^d) | b = branching, d = depth |
//! | `unlink_all` | O(E) | full edge scan for incoming edges |
//! | `repoint` | O(E) | merge support |

use crate::Result;
use crate::models::{EdgeKind, MemoryId, Neighbor, RelationEdge, TenantId};

/// Trait for relation graph backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn RelationGraphBackend>`
/// - Use interior mutability for mutable state
/// - `link` with an existing `(from, to, kind)` keeps the max weight
/// - Topical links are stored as two directed edges with equal weight
pub trait RelationGraphBackend: Send + Sync {
    /// Links two units.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] for self-loops or weights
    /// outside `(0.0, 1.0]`.
    fn link(
        &self,
        tenant: &TenantId,
        from: &MemoryId,
        to: &MemoryId,
        kind: EdgeKind,
        weight: f32,
    ) -> Result<()>;

    /// Bounded breadth-first traversal from `id` up to `max_depth` hops.
    ///
    /// Returns discovered nodes with their best path weight (product of
    /// edge weights along the path), deduplicated per node, ordered by
    /// descending path weight then lexicographic id. The origin itself is
    /// not returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the traversal operation fails.
    fn neighbors(
        &self,
        tenant: &TenantId,
        id: &MemoryId,
        kind_filter: Option<&[EdgeKind]>,
        max_depth: u32,
    ) -> Result<Vec<Neighbor>>;

    /// Removes every edge touching a unit, in either direction.
    ///
    /// Returns the number of edges removed. Invoked on deletion and
    /// eviction so no edge ever references a non-active unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal operation fails.
    fn unlink_all(&self, tenant: &TenantId, id: &MemoryId) -> Result<usize>;

    /// Re-points every edge of `absorbed` onto `survivor`.
    ///
    /// Edges that would become self-loops are dropped; duplicates arising
    /// from the re-point are collapsed per `(from, to, kind)`, keeping the
    /// max weight. Used when consolidation merges near-duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error if the re-point operation fails.
    fn repoint(&self, tenant: &TenantId, absorbed: &MemoryId, survivor: &MemoryId)
    -> Result<usize>;

    /// Returns all outgoing edges of a unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup operation fails.
    fn edges_from(&self, tenant: &TenantId, id: &MemoryId) -> Result<Vec<RelationEdge>>;

    /// Returns statistics about a tenant's graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    fn stats(&self, tenant: &TenantId) -> Result<GraphStats>;
}

/// Statistics about a tenant's relation graph.
#[derive(Debug, Clone, Default)]
pub struct GraphStats {
    /// Number of nodes with at least one edge.
    pub node_count: usize,
    /// Total number of directed edges.
    pub edge_count: usize,
    /// Number of edges by kind.
    pub edges_by_kind: std::collections::HashMap<EdgeKind, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_stats_default() {
        let stats = GraphStats::default();
        assert_eq!(stats.node_count, 0);
        assert_eq!(stats.edge_count, 0);
        assert!(stats.edges_by_kind.is_empty());
    }
}
