//! In-memory semantic index.
//!
//! Exact nearest-neighbor search by dot product over normalized vectors.
//! Linear scan per tenant partition; an ANN structure slots in behind the
//! same trait when corpus sizes demand it.

use crate::embedding::dot;
use crate::models::{MemoryId, TenantId};
use crate::storage::traits::SemanticIndex;
use crate::{Error, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

/// One indexed embedding with the metadata needed for tie-breaking.
#[derive(Debug, Clone)]
struct Entry {
    embedding: Vec<f32>,
    created_at: u64,
}

/// In-memory semantic index.
///
/// Tenant partitions are physically separate maps; a search never touches
/// another tenant's entries.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    tenants: RwLock<HashMap<TenantId, HashMap<MemoryId, Entry>>>,
}

impl InMemoryIndex {
    /// Creates a new empty index.
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

    /// Descending score, then more-recent `created_at`, then lexicographic
    /// id. Total order, so result sequences are reproducible.
    fn rank(
        a: &(MemoryId, f32, u64),
        b: &(MemoryId, f32, u64),
    ) -> Ordering {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.2.cmp(&a.2))
            .then_with(|| a.0.cmp(&b.0))
    }
}

impl SemanticIndex for InMemoryIndex {
    fn insert(
        &self,
        tenant: &TenantId,
        id: &MemoryId,
        embedding: &[f32],
        created_at: u64,
    ) -> Result<()> {
        if embedding.is_empty() {
            return Err(Error::InvalidArgument(
                "embedding must not be empty".to_string(),
            ));
        }
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| Self::lock_err("index_insert"))?;
        // Upsert: an existing id is replaced, never duplicated.
        tenants.entry(tenant.clone()).or_default().insert(
            id.clone(),
            Entry {
                embedding: embedding.to_vec(),
                created_at,
            },
        );
        Ok(())
    }

    fn remove(&self, tenant: &TenantId, id: &MemoryId) -> Result<bool> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| Self::lock_err("index_remove"))?;
        Ok(tenants
            .get_mut(tenant)
            .is_some_and(|partition| partition.remove(id).is_some()))
    }

    fn search(
        &self,
        tenant: &TenantId,
        query: &[f32],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<(MemoryId, f32)>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&min_score) {
            return Err(Error::InvalidArgument(format!(
                "min_score must be between 0.0 and 1.0, got {min_score}"
            )));
        }

        let tenants = self
            .tenants
            .read()
            .map_err(|_| Self::lock_err("index_search"))?;
        let Some(partition) = tenants.get(tenant) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(MemoryId, f32, u64)> = Vec::with_capacity(partition.len());
        for (id, entry) in partition {
            if entry.embedding.len() != query.len() {
                return Err(Error::InvalidArgument(format!(
                    "query dimension {} does not match index dimension {}",
                    query.len(),
                    entry.embedding.len()
                )));
            }
            let score = dot(&entry.embedding, query);
            if score >= min_score {
                scored.push((id.clone(), score, entry.created_at));
            }
        }

        scored.sort_by(Self::rank);
        scored.truncate(k);
        Ok(scored.into_iter().map(|(id, score, _)| (id, score)).collect())
    }

    fn pairs_above(
        &self,
        tenant: &TenantId,
        threshold: f32,
    ) -> Result<Vec<(MemoryId, MemoryId, f32)>> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| Self::lock_err("index_pairs"))?;
        let Some(partition) = tenants.get(tenant) else {
            return Ok(Vec::new());
        };

        // Deterministic pair order: lexicographic sweep.
        let mut ids: Vec<&MemoryId> = partition.keys().collect();
        ids.sort();

        let mut pairs = Vec::new();
        for (i, a) in ids.iter().enumerate() {
            for b in ids.iter().skip(i + 1) {
                let (Some(ea), Some(eb)) = (partition.get(*a), partition.get(*b)) else {
                    continue;
                };
                if ea.embedding.len() != eb.embedding.len() {
                    continue;
                }
                let score = dot(&ea.embedding, &eb.embedding);
                if score >= threshold {
                    pairs.push(((*a).clone(), (*b).clone(), score));
                }
            }
        }
        Ok(pairs)
    }

    fn len(&self, tenant: &TenantId) -> Result<usize> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| Self::lock_err("index_len"))?;
        Ok(tenants.get(tenant).map_or(0, HashMap::len))
    }
}
