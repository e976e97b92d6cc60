//! Retrieval orchestration.
//!
//! Composes the semantic index, relation graph, and repository into a
//! single ranked, deduplicated, explainable answer. Retrieval is the sole
//! place salience increases; consolidation is the sole place it decreases.

use crate::config::RetrievalConfig;
use crate::embedding::normalize;
use crate::models::{
    MemoryId, MemoryUnit, Provenance, RetrievalResult, SearchHit, TenantId,
};
use crate::services::TenantLocks;
use crate::storage::traits::{
    RelationGraphBackend, RepositoryBackend, SemanticIndex, UpdateFields,
};
use crate::{Error, Result, current_timestamp};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::instrument;

/// Caller-held handle for cancelling an in-flight query.
///
/// A query observed as cancelled before its result set is finalized
/// returns empty and applies no salience side effects.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a live token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true if cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Service for answering similarity queries.
pub struct RetrievalService {
    repository: Arc<dyn RepositoryBackend>,
    index: Arc<dyn SemanticIndex>,
    graph: Arc<dyn RelationGraphBackend>,
    locks: Arc<TenantLocks>,
    config: RetrievalConfig,
}

impl RetrievalService {
    /// Creates a new retrieval service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RepositoryBackend>,
        index: Arc<dyn SemanticIndex>,
        graph: Arc<dyn RelationGraphBackend>,
        locks: Arc<TenantLocks>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            repository,
            index,
            graph,
            locks,
            config,
        }
    }

    /// Answers a similarity query.
    ///
    /// Fetches up to `k` index candidates and, when `expand_related` is
    /// set, merges in 1-hop graph neighbors at a blended score of
    /// `similarity * path_weight`. An empty tenant corpus yields an empty
    /// result, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a zero or oversized `k` or a
    /// zero-magnitude query embedding.
    pub fn query(
        &self,
        tenant: &TenantId,
        query_embedding: &[f32],
        k: usize,
        expand_related: bool,
    ) -> Result<RetrievalResult> {
        self.query_with_cancel(tenant, query_embedding, k, expand_related, &CancelToken::new())
    }

    /// [`Self::query`] with caller-driven cancellation.
    ///
    /// # Errors
    ///
    /// Same as [`Self::query`].
    #[instrument(
        name = "mnemo.query",
        skip(self, query_embedding, cancel),
        fields(tenant = %tenant, k, expand_related)
    )]
    pub fn query_with_cancel(
        &self,
        tenant: &TenantId,
        query_embedding: &[f32],
        k: usize,
        expand_related: bool,
        cancel: &CancelToken,
    ) -> Result<RetrievalResult> {
        let start = Instant::now();
        let result = self.query_inner(tenant, query_embedding, k, expand_related, cancel);
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("mnemo_query_total", "status" => status).increment(1);
        metrics::histogram!("mnemo_query_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        result
    }

    fn query_inner(
        &self,
        tenant: &TenantId,
        query_embedding: &[f32],
        k: usize,
        expand_related: bool,
        cancel: &CancelToken,
    ) -> Result<RetrievalResult> {
        if k == 0 || k > self.config.max_k {
            return Err(Error::InvalidArgument(format!(
                "k must be between 1 and {}, got {k}",
                self.config.max_k
            )));
        }
        let query = normalize(query_embedding)?;

        let lock = self.locks.for_tenant(tenant);
        let _guard = lock.read().map_err(|_| Error::OperationFailed {
            operation: "query".to_string(),
            cause: "tenant lock poisoned".to_string(),
        })?;

        let candidates = self
            .index
            .search(tenant, &query, k, self.config.min_score)?;
        let candidates_considered = candidates.len();

        // Dedup by id, keeping the highest blended score per unit.
        let mut best: HashMap<MemoryId, SearchHit> = HashMap::new();
        for (id, similarity) in &candidates {
            let Some(unit) = self.fetch_active(tenant, id)? else {
                continue;
            };
            upsert_hit(
                &mut best,
                SearchHit {
                    unit,
                    score: *similarity,
                    similarity: *similarity,
                    path_weight: 1.0,
                    provenance: Provenance::Direct,
                },
            );
        }

        if expand_related {
            for (id, similarity) in &candidates {
                let neighbors = self.graph.neighbors(tenant, id, None, 1)?;
                for neighbor in neighbors {
                    if neighbor.path_weight < self.config.min_path_weight {
                        continue;
                    }
                    let Some(unit) = self.fetch_active(tenant, &neighbor.id)? else {
                        continue;
                    };
                    upsert_hit(
                        &mut best,
                        SearchHit {
                            unit,
                            score: similarity * neighbor.path_weight,
                            similarity: *similarity,
                            path_weight: neighbor.path_weight,
                            provenance: Provenance::Graph,
                        },
                    );
                }
            }
        }

        let mut hits: Vec<SearchHit> = best.into_values().collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.unit
                        .salience
                        .partial_cmp(&a.unit.salience)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| b.unit.created_at.cmp(&a.unit.created_at))
                .then_with(|| a.unit.id.cmp(&b.unit.id))
        });
        hits.truncate(k);

        // The result set is now final. A cancellation observed here means
        // no side effects and no results for the caller.
        if cancel.is_cancelled() {
            tracing::debug!("query cancelled before finalization, side effects skipped");
            return Ok(RetrievalResult::default());
        }

        self.reinforce(tenant, &mut hits)?;

        Ok(RetrievalResult {
            hits,
            candidates_considered,
            expanded: expand_related,
        })
    }

    /// Fetches a unit, skipping ids that are missing or no longer active.
    ///
    /// The index may briefly hold ids whose repository write has not
    /// landed; those are simply not returnable yet.
    fn fetch_active(&self, tenant: &TenantId, id: &MemoryId) -> Result<Option<MemoryUnit>> {
        match self.repository.get(tenant, id) {
            Ok(unit) if unit.is_active() => Ok(Some(unit)),
            Ok(_) => Ok(None),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Applies retrieval reinforcement to every returned unit.
    ///
    /// This is the only place salience increases.
    fn reinforce(&self, tenant: &TenantId, hits: &mut [SearchHit]) -> Result<()> {
        let now = current_timestamp();
        for hit in hits {
            let boosted = (hit.unit.salience + self.config.reinforcement).min(1.0);
            let patch = UpdateFields::new()
                .with_salience(boosted)
                .with_last_accessed_at(now);
            match self.repository.update_fields(tenant, &hit.unit.id, &patch, None) {
                Ok(updated) => hit.unit = updated,
                // The unit may have been deleted between assembly and
                // reinforcement; the stale copy is still returned.
                Err(Error::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Keeps the higher-scored hit per unit id.
fn upsert_hit(best: &mut HashMap<MemoryId, SearchHit>, hit: SearchHit) {
    match best.get_mut(&hit.unit.id) {
        Some(existing) if existing.score >= hit.score => {}
        Some(existing) => *existing = hit,
        None => {
            best.insert(hit.unit.id.clone(), hit);
        }
    }
}
