//! In-memory relation graph backend.

use crate::models::{EdgeKind, MemoryId, Neighbor, RelationEdge, TenantId};
use crate::storage::traits::{GraphStats, RelationGraphBackend};
use crate::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

/// Per-tenant adjacency: outgoing edges keyed by source node.
type Adjacency = HashMap<MemoryId, Vec<RelationEdge>>;

/// In-memory relation graph.
///
/// Explicit adjacency keyed by tenant and id; cycles are fine since
/// traversal tracks visited nodes rather than following references.
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    tenants: RwLock<HashMap<TenantId, Adjacency>>,
}

impl InMemoryGraph {
    /// Creates a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err(operation: &str) -> Error {
        Error::OperationFailed {
            operation: operation.to_string(),
            cause: "Lock poisoned".to_string(),
        }
    }

    /// Inserts one directed edge, collapsing onto an existing
    /// `(from, to, kind)` edge by keeping the max weight.
    fn insert_directed(
        adjacency: &mut Adjacency,
        from: &MemoryId,
        to: &MemoryId,
        kind: EdgeKind,
        weight: f32,
    ) {
        let edges = adjacency.entry(from.clone()).or_default();
        if let Some(existing) = edges
            .iter_mut()
            .find(|e| e.to_id == *to && e.kind == kind)
        {
            existing.weight = existing.weight.max(weight);
        } else {
            edges.push(RelationEdge::new(from.clone(), to.clone(), kind, weight));
        }
    }
}

impl RelationGraphBackend for InMemoryGraph {
    fn link(
        &self,
        tenant: &TenantId,
        from: &MemoryId,
        to: &MemoryId,
        kind: EdgeKind,
        weight: f32,
    ) -> Result<()> {
        if from == to {
            return Err(Error::InvalidArgument(format!(
                "self-loop rejected for unit {from}"
            )));
        }
        if weight <= 0.0 || weight > 1.0 {
            return Err(Error::InvalidArgument(format!(
                "edge weight must be in (0.0, 1.0], got {weight}"
            )));
        }

        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| Self::lock_err("graph_link"))?;
        let adjacency = tenants.entry(tenant.clone()).or_default();
        Self::insert_directed(adjacency, from, to, kind, weight);
        if kind.is_symmetric() {
            Self::insert_directed(adjacency, to, from, kind, weight);
        }
        Ok(())
    }

    fn neighbors(
        &self,
        tenant: &TenantId,
        id: &MemoryId,
        kind_filter: Option<&[EdgeKind]>,
        max_depth: u32,
    ) -> Result<Vec<Neighbor>> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| Self::lock_err("graph_neighbors"))?;
        let Some(adjacency) = tenants.get(tenant) else {
            return Ok(Vec::new());
        };

        // BFS tracking the best path weight seen per node. A node may be
        // reachable along several paths; the max-product path wins.
        let mut best: HashMap<MemoryId, (f32, u32)> = HashMap::new();
        let mut queue: VecDeque<(MemoryId, f32, u32)> = VecDeque::new();
        queue.push_back((id.clone(), 1.0, 0));

        while let Some((node, path_weight, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let Some(edges) = adjacency.get(&node) else {
                continue;
            };
            for edge in edges {
                if kind_filter.is_some_and(|kinds| !kinds.contains(&edge.kind)) {
                    continue;
                }
                if edge.to_id == *id {
                    continue;
                }
                let weight = path_weight * edge.weight;
                let improved = best
                    .get(&edge.to_id)
                    .is_none_or(|(existing, _)| weight > *existing);
                if improved {
                    best.insert(edge.to_id.clone(), (weight, depth + 1));
                    queue.push_back((edge.to_id.clone(), weight, depth + 1));
                }
            }
        }

        let mut neighbors: Vec<Neighbor> = best
            .into_iter()
            .map(|(node, (path_weight, depth))| Neighbor {
                id: node,
                path_weight,
                depth,
            })
            .collect();
        neighbors.sort_by(|a, b| {
            b.path_weight
                .partial_cmp(&a.path_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(neighbors)
    }

    fn unlink_all(&self, tenant: &TenantId, id: &MemoryId) -> Result<usize> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| Self::lock_err("graph_unlink"))?;
        let Some(adjacency) = tenants.get_mut(tenant) else {
            return Ok(0);
        };

        let mut removed = adjacency.remove(id).map_or(0, |edges| edges.len());
        for edges in adjacency.values_mut() {
            let before = edges.len();
            edges.retain(|e| e.to_id != *id);
            removed += before - edges.len();
        }
        adjacency.retain(|_, edges| !edges.is_empty());
        Ok(removed)
    }

    fn repoint(
        &self,
        tenant: &TenantId,
        absorbed: &MemoryId,
        survivor: &MemoryId,
    ) -> Result<usize> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| Self::lock_err("graph_repoint"))?;
        let Some(adjacency) = tenants.get_mut(tenant) else {
            return Ok(0);
        };

        let mut repointed = 0;

        // Outgoing edges of the absorbed unit move onto the survivor.
        if let Some(outgoing) = adjacency.remove(absorbed) {
            for edge in outgoing {
                if edge.to_id == *survivor {
                    continue;
                }
                Self::insert_directed(adjacency, survivor, &edge.to_id, edge.kind, edge.weight);
                repointed += 1;
            }
        }

        // Incoming edges are re-targeted at the survivor.
        let mut moved: Vec<(MemoryId, EdgeKind, f32)> = Vec::new();
        for (from, edges) in adjacency.iter_mut() {
            let before = edges.len();
            edges.retain(|e| {
                if e.to_id == *absorbed {
                    if *from != *survivor {
                        moved.push((from.clone(), e.kind, e.weight));
                    }
                    false
                } else {
                    true
                }
            });
            repointed += before - edges.len();
        }
        for (from, kind, weight) in moved {
            Self::insert_directed(adjacency, &from, survivor, kind, weight);
        }
        adjacency.retain(|_, edges| !edges.is_empty());
        Ok(repointed)
    }

    fn edges_from(&self, tenant: &TenantId, id: &MemoryId) -> Result<Vec<RelationEdge>> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| Self::lock_err("graph_edges_from"))?;
        Ok(tenants
            .get(tenant)
            .and_then(|adjacency| adjacency.get(id))
            .cloned()
            .unwrap_or_default())
    }

    fn stats(&self, tenant: &TenantId) -> Result<GraphStats> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| Self::lock_err("graph_stats"))?;
        let Some(adjacency) = tenants.get(tenant) else {
            return Ok(GraphStats::default());
        };

        let mut stats = GraphStats {
            node_count: adjacency.len(),
            ..GraphStats::default()
        };
        for edges in adjacency.values() {
            stats.edge_count += edges.len();
            for edge in edges {
                *stats.edges_by_kind.entry(edge.kind).or_insert(0) += 1;
            }
        }
        Ok(stats)
    }
}
