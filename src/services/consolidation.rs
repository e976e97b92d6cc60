//! Memory consolidation service.
//!
//! Bounds memory growth and keeps salient knowledge prioritized: idle
//! units decay, near-duplicates merge, low-salience units evict, and
//! terminal units eventually purge. A pass covers exactly one tenant,
//! stages every mutation against a snapshot, and applies them under that
//! tenant's exclusive lock, so concurrent retrieval sees pre-pass or
//! post-pass state for any unit, never a partially merged one.

use crate::config::ConsolidationConfig;
use crate::models::{
    MemoryId, MemoryStatus, MemoryUnit, PassStats, RelationEdge, SurvivorPolicy, TenantId,
};
use crate::services::TenantLocks;
use crate::storage::traits::{
    RelationGraphBackend, RepositoryBackend, SemanticIndex, UpdateFields,
};
use crate::{Error, Result, current_timestamp};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// One planned near-duplicate merge.
#[derive(Debug, Clone)]
struct Merge {
    absorbed: MemoryId,
    survivor: MemoryId,
}

/// Staged mutations for one tenant pass.
///
/// Computed entirely against a snapshot before anything is applied, so a
/// planning failure aborts with no state touched.
#[derive(Debug, Default)]
struct PassPlan {
    /// New salience per decayed unit.
    decays: Vec<(MemoryId, f32)>,
    merges: Vec<Merge>,
    evictions: Vec<MemoryId>,
}

/// Service for consolidating a tenant's memory.
pub struct ConsolidationService {
    repository: Arc<dyn RepositoryBackend>,
    index: Arc<dyn SemanticIndex>,
    graph: Arc<dyn RelationGraphBackend>,
    locks: Arc<TenantLocks>,
    config: ConsolidationConfig,
}

impl ConsolidationService {
    /// Creates a new consolidation service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RepositoryBackend>,
        index: Arc<dyn SemanticIndex>,
        graph: Arc<dyn RelationGraphBackend>,
        locks: Arc<TenantLocks>,
        config: ConsolidationConfig,
    ) -> Self {
        Self {
            repository,
            index,
            graph,
            locks,
            config,
        }
    }

    /// Runs one consolidation pass for a tenant at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConsolidationAborted`] if the pass failed and was
    /// rolled back. Callers retry on the next scheduled run; the error is
    /// never surfaced to ingestion or retrieval.
    pub fn run_pass(&self, tenant: &TenantId) -> Result<PassStats> {
        self.run_pass_at(tenant, current_timestamp())
    }

    /// Runs one consolidation pass with an explicit clock.
    ///
    /// The tenant and timestamp are per-invocation inputs rather than
    /// scheduler-held state, which keeps passes deterministic and
    /// parallel-safe across tenants.
    ///
    /// # Errors
    ///
    /// Same as [`Self::run_pass`].
    #[instrument(name = "mnemo.consolidate", skip(self), fields(tenant = %tenant))]
    pub fn run_pass_at(&self, tenant: &TenantId, now: u64) -> Result<PassStats> {
        let start = Instant::now();

        let result = self.locked_pass(tenant, now);

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("mnemo_consolidation_passes_total", "status" => status).increment(1);
        metrics::histogram!("mnemo_consolidation_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(stats) => tracing::info!(summary = %stats.summary(), "consolidation pass committed"),
            Err(e) => tracing::warn!(error = %e, "consolidation pass aborted and rolled back"),
        }
        result
    }

    fn locked_pass(&self, tenant: &TenantId, now: u64) -> Result<PassStats> {
        let lock = self.locks.for_tenant(tenant);
        let _guard = lock.write().map_err(|_| Error::ConsolidationAborted {
            tenant: tenant.as_str().to_string(),
            cause: "tenant lock poisoned".to_string(),
        })?;

        let aborted = |cause: &Error| Error::ConsolidationAborted {
            tenant: tenant.as_str().to_string(),
            cause: cause.to_string(),
        };

        let snapshot = self.repository.scan(tenant).map_err(|e| aborted(&e))?;
        let plan = self.plan(tenant, &snapshot, now).map_err(|e| aborted(&e))?;

        // Pre-pass edge capture, needed to restore the graph on rollback.
        let mut pre_edges = Vec::new();
        for unit in &snapshot {
            pre_edges.extend(
                self.graph
                    .edges_from(tenant, &unit.id)
                    .map_err(|e| aborted(&e))?,
            );
        }

        let mut stats = PassStats {
            processed: snapshot.iter().filter(|u| u.is_active()).count(),
            decayed: plan.decays.len(),
            merged: plan.merges.len(),
            evicted: plan.evictions.len(),
            purged: 0,
        };

        if let Err(e) = self.apply(tenant, &plan, &mut stats, now) {
            self.rollback(tenant, &snapshot, &plan, &pre_edges);
            return Err(aborted(&e));
        }
        Ok(stats)
    }

    /// Stages every mutation of the pass against the snapshot.
    fn plan(&self, tenant: &TenantId, snapshot: &[MemoryUnit], now: u64) -> Result<PassPlan> {
        let active: HashMap<&MemoryId, &MemoryUnit> = snapshot
            .iter()
            .filter(|u| u.is_active())
            .map(|u| (&u.id, u))
            .collect();

        let mut plan = PassPlan::default();

        // Decay: idle units lose salience.
        let mut staged_salience: HashMap<&MemoryId, f32> =
            active.iter().map(|(id, u)| (*id, u.salience)).collect();
        for (id, unit) in &active {
            if now.saturating_sub(unit.last_accessed_at) > self.config.decay_window_secs {
                let decayed = unit.salience * self.config.decay_factor;
                staged_salience.insert(*id, decayed);
                plan.decays.push(((*id).clone(), decayed));
            }
        }
        plan.decays.sort_by(|a, b| a.0.cmp(&b.0));

        // Merge detection: near-duplicate pairs, modality-compatible, the
        // lower-salience unit absorbed into the higher-salience one. Each
        // unit participates in at most one merge per pass.
        let mut absorbed: HashSet<MemoryId> = HashSet::new();
        for (a, b, _score) in self.index.pairs_above(tenant, self.config.merge_threshold)? {
            let (Some(ua), Some(ub)) = (active.get(&a), active.get(&b)) else {
                continue;
            };
            if absorbed.contains(&a) || absorbed.contains(&b) {
                continue;
            }
            if !ua.modality.merge_compatible(&ub.modality) {
                continue;
            }
            let sa = staged_salience.get(&a).copied().unwrap_or(ua.salience);
            let sb = staged_salience.get(&b).copied().unwrap_or(ub.salience);
            let a_survives = match self.config.survivor_policy {
                SurvivorPolicy::Salience => {
                    sa > sb || ((sa - sb).abs() < f32::EPSILON && a < b)
                }
                SurvivorPolicy::SalienceThenRecency => {
                    sa > sb
                        || ((sa - sb).abs() < f32::EPSILON
                            && (ua.created_at, &a) > (ub.created_at, &b))
                }
            };
            let (survivor, loser) = if a_survives { (a, b) } else { (b, a) };
            absorbed.insert(loser.clone());
            plan.merges.push(Merge {
                absorbed: loser,
                survivor,
            });
        }

        // Eviction: low staged salience, old enough, not already absorbed.
        for (id, unit) in &active {
            if absorbed.contains(*id) {
                continue;
            }
            let salience = staged_salience.get(id).copied().unwrap_or(unit.salience);
            if salience < self.config.eviction_threshold
                && now.saturating_sub(unit.created_at) > self.config.min_retention_secs
            {
                plan.evictions.push((*id).clone());
            }
        }
        plan.evictions.sort();

        Ok(plan)
    }

    /// Applies a staged plan. The caller rolls back on error.
    fn apply(
        &self,
        tenant: &TenantId,
        plan: &PassPlan,
        stats: &mut PassStats,
        now: u64,
    ) -> Result<()> {
        for (id, salience) in &plan.decays {
            self.repository.update_fields(
                tenant,
                id,
                &UpdateFields::new().with_salience(*salience),
                None,
            )?;
        }

        for merge in &plan.merges {
            self.graph.repoint(tenant, &merge.absorbed, &merge.survivor)?;
            self.repository.update_fields(
                tenant,
                &merge.absorbed,
                &UpdateFields::new().with_status(MemoryStatus::Merged, now),
                None,
            )?;
            self.index.remove(tenant, &merge.absorbed)?;
        }

        for id in &plan.evictions {
            self.repository.update_fields(
                tenant,
                id,
                &UpdateFields::new().with_status(MemoryStatus::Evicted, now),
                None,
            )?;
            self.index.remove(tenant, id)?;
            self.graph.unlink_all(tenant, id)?;
        }

        stats.purged = self
            .repository
            .purge_expired(tenant, now, self.config.audit_retention_secs)?
            .len();
        Ok(())
    }

    /// Best-effort restore of the pre-pass state for every unit the plan
    /// touched. The tenant's exclusive lock is still held, so no reader
    /// observes the intermediate states either way.
    fn rollback(
        &self,
        tenant: &TenantId,
        snapshot: &[MemoryUnit],
        plan: &PassPlan,
        pre_edges: &[RelationEdge],
    ) {
        let mut affected: HashSet<&MemoryId> = HashSet::new();
        affected.extend(plan.decays.iter().map(|(id, _)| id));
        for merge in &plan.merges {
            affected.insert(&merge.absorbed);
            affected.insert(&merge.survivor);
        }
        affected.extend(plan.evictions.iter());

        let by_id: HashMap<&MemoryId, &MemoryUnit> =
            snapshot.iter().map(|u| (&u.id, u)).collect();

        // Repository and index restore from the snapshot copies.
        for id in &affected {
            if let Some(unit) = by_id.get(*id) {
                let _ = self.repository.put(unit);
                if unit.is_active() {
                    let _ = self
                        .index
                        .insert(tenant, &unit.id, &unit.embedding, unit.created_at);
                }
            }
        }

        // Graph restore: drop whatever the pass did to the affected nodes,
        // then relink every pre-pass edge touching them. Relinking is a
        // max-weight upsert, so edges the pass never touched are unchanged.
        for id in &affected {
            let _ = self.graph.unlink_all(tenant, *id);
        }
        for edge in pre_edges {
            if affected.contains(&edge.from_id) || affected.contains(&edge.to_id) {
                let _ = self
                    .graph
                    .link(tenant, &edge.from_id, &edge.to_id, edge.kind, edge.weight);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::models::{EdgeKind, Modality};
    use crate::storage::{InMemoryGraph, InMemoryIndex, InMemoryRepository};

    const DAY: u64 = 86_400;

    struct Fixture {
        repository: Arc<InMemoryRepository>,
        index: Arc<InMemoryIndex>,
        graph: Arc<InMemoryGraph>,
        service: ConsolidationService,
        tenant: TenantId,
    }

    fn fixture() -> Fixture {
        fixture_with(ConsolidationConfig {
            min_retention_secs: DAY,
            audit_retention_secs: 30 * DAY,
            ..ConsolidationConfig::default()
        })
    }

    fn fixture_with(config: ConsolidationConfig) -> Fixture {
        let repository = Arc::new(InMemoryRepository::new());
        let index = Arc::new(InMemoryIndex::new());
        let graph = Arc::new(InMemoryGraph::new());
        let service = ConsolidationService::new(
            repository.clone(),
            index.clone(),
            graph.clone(),
            Arc::new(TenantLocks::new()),
            config,
        );
        Fixture {
            repository,
            index,
            graph,
            service,
            tenant: TenantId::new("acme"),
        }
    }

    fn seed(
        f: &Fixture,
        id: &str,
        embedding: Vec<f32>,
        salience: f32,
        created_at: u64,
        last_accessed_at: u64,
    ) -> MemoryId {
        seed_modality(f, id, Modality::Text, embedding, salience, created_at, last_accessed_at)
    }

    #[allow(clippy::too_many_arguments)]
    fn seed_modality(
        f: &Fixture,
        id: &str,
        modality: Modality,
        embedding: Vec<f32>,
        salience: f32,
        created_at: u64,
        last_accessed_at: u64,
    ) -> MemoryId {
        let mut unit = MemoryUnit::new(
            MemoryId::new(id),
            f.tenant.clone(),
            modality,
            format!("unit {id}"),
            embedding.clone(),
            salience,
            created_at,
        );
        unit.last_accessed_at = last_accessed_at;
        f.repository.put(&unit).unwrap();
        f.index
            .insert(&f.tenant, &unit.id, &embedding, created_at)
            .unwrap();
        unit.id
    }

    fn salience_of(f: &Fixture, id: &MemoryId) -> f32 {
        f.repository.get(&f.tenant, id).unwrap().salience
    }

    fn status_of(f: &Fixture, id: &MemoryId) -> MemoryStatus {
        f.repository.get(&f.tenant, id).unwrap().status
    }

    #[test]
    fn test_idle_units_decay() {
        let f = fixture();
        let now = 10 * DAY;
        let idle = seed(&f, "idle", vec![1.0, 0.0], 0.8, DAY, DAY);
        let fresh = seed(&f, "fresh", vec![0.0, 1.0], 0.8, DAY, now);

        let stats = f.service.run_pass_at(&f.tenant, now).unwrap();

        assert_eq!(stats.decayed, 1);
        assert!((salience_of(&f, &idle) - 0.8 * 0.95).abs() < 1e-6);
        assert!((salience_of(&f, &fresh) - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decay_compounds_across_passes() {
        let f = fixture();
        let id = seed(&f, "idle", vec![1.0, 0.0], 0.8, 0, 0);

        for i in 0..3 {
            f.service.run_pass_at(&f.tenant, (i + 2) * 10 * DAY).unwrap();
        }
        assert!((salience_of(&f, &id) - 0.8 * 0.95_f32.powi(3)).abs() < 1e-5);
    }

    #[test]
    fn test_near_duplicates_merge_into_higher_salience() {
        let f = fixture();
        let now = 2 * DAY;
        let keep = seed(&f, "keep", vec![1.0, 0.0], 0.8, 100, now);
        let lose = seed(&f, "lose", vec![0.98, 0.198_997_5], 0.3, 200, now);
        let other = seed(&f, "other", vec![0.0, 1.0], 0.5, 300, now);
        f.graph
            .link(&f.tenant, &lose, &other, EdgeKind::Reference, 0.7)
            .unwrap();

        let stats = f.service.run_pass_at(&f.tenant, now).unwrap();

        assert_eq!(stats.merged, 1);
        assert_eq!(status_of(&f, &keep), MemoryStatus::Active);
        assert_eq!(status_of(&f, &lose), MemoryStatus::Merged);
        assert!(!f.index.remove(&f.tenant, &lose).unwrap());
        // The absorbed unit's relations now hang off the survivor.
        assert!(f.graph.edges_from(&f.tenant, &lose).unwrap().is_empty());
        let repointed = f.graph.edges_from(&f.tenant, &keep).unwrap();
        assert_eq!(repointed.len(), 1);
        assert_eq!(repointed[0].to_id, other);
    }

    #[test]
    fn test_incompatible_modalities_never_merge() {
        let f = fixture();
        let now = 2 * DAY;
        seed_modality(
            &f,
            "note",
            Modality::Text,
            vec![1.0, 0.0],
            0.8,
            100,
            now,
        );
        seed_modality(
            &f,
            "photo",
            Modality::ImageDescriptor { dimensions: None },
            vec![1.0, 0.0],
            0.3,
            200,
            now,
        );

        let stats = f.service.run_pass_at(&f.tenant, now).unwrap();
        assert_eq!(stats.merged, 0);
        assert_eq!(status_of(&f, &MemoryId::new("photo")), MemoryStatus::Active);
    }

    #[test]
    fn test_salience_then_recency_prefers_newer_survivor() {
        let f = fixture_with(ConsolidationConfig {
            survivor_policy: SurvivorPolicy::SalienceThenRecency,
            min_retention_secs: DAY,
            ..ConsolidationConfig::default()
        });
        let now = 2 * DAY;
        let older = seed(&f, "older", vec![1.0, 0.0], 0.5, 100, now);
        let newer = seed(&f, "newer", vec![1.0, 0.0], 0.5, 200, now);

        f.service.run_pass_at(&f.tenant, now).unwrap();

        assert_eq!(status_of(&f, &newer), MemoryStatus::Active);
        assert_eq!(status_of(&f, &older), MemoryStatus::Merged);
    }

    #[test]
    fn test_low_salience_units_evict_after_retention() {
        let f = fixture();
        let now = 10 * DAY;
        let stale = seed(&f, "stale", vec![1.0, 0.0], 0.04, 100, now);
        let young = seed(&f, "young", vec![0.0, 1.0], 0.04, now - 100, now);
        let anchor = seed(&f, "anchor", vec![0.7, 0.7], 0.9, 100, now);
        f.graph
            .link(&f.tenant, &anchor, &stale, EdgeKind::Reference, 0.5)
            .unwrap();

        let stats = f.service.run_pass_at(&f.tenant, now).unwrap();

        assert_eq!(stats.evicted, 1);
        assert_eq!(status_of(&f, &stale), MemoryStatus::Evicted);
        assert_eq!(status_of(&f, &young), MemoryStatus::Active);
        // Eviction drops the unit's edges along with its index entry.
        assert!(f.graph.edges_from(&f.tenant, &anchor).unwrap().is_empty());
        assert!(!f.index.remove(&f.tenant, &stale).unwrap());
    }

    #[test]
    fn test_terminal_units_purge_after_audit_retention() {
        let f = fixture();
        let now = 100 * DAY;
        let id = seed(&f, "old", vec![1.0, 0.0], 0.5, 100, now);
        f.repository
            .update_fields(
                &f.tenant,
                &id,
                &UpdateFields::new().with_status(MemoryStatus::Deleted, 200),
                None,
            )
            .unwrap();
        f.index.remove(&f.tenant, &id).unwrap();

        let stats = f.service.run_pass_at(&f.tenant, now).unwrap();

        assert_eq!(stats.purged, 1);
        assert!(matches!(
            f.repository.get(&f.tenant, &id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_quiet_corpus_produces_empty_stats() {
        let f = fixture();
        let now = 2 * DAY;
        seed(&f, "a", vec![1.0, 0.0], 0.8, 100, now);
        seed(&f, "b", vec![0.0, 1.0], 0.8, 200, now);

        let stats = f.service.run_pass_at(&f.tenant, now).unwrap();
        assert!(stats.is_empty());
        assert_eq!(stats.processed, 2);
    }

    #[test]
    fn test_pass_touches_only_its_tenant() {
        let f = fixture();
        let now = 10 * DAY;
        seed(&f, "idle", vec![1.0, 0.0], 0.8, DAY, DAY);

        let other = TenantId::new("globex");
        let mut foreign = MemoryUnit::new(
            MemoryId::new("foreign"),
            other.clone(),
            Modality::Text,
            "foreign",
            vec![1.0, 0.0],
            0.8,
            DAY,
        );
        foreign.last_accessed_at = DAY;
        f.repository.put(&foreign).unwrap();
        f.index
            .insert(&other, &foreign.id, &foreign.embedding, DAY)
            .unwrap();

        f.service.run_pass_at(&f.tenant, now).unwrap();

        let untouched = f.repository.get(&other, &foreign.id).unwrap();
        assert!((untouched.salience - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_failed_pass_rolls_back_and_reports_abort() {
        struct FlakyRepository {
            inner: InMemoryRepository,
            fail_status_writes: std::sync::atomic::AtomicBool,
        }

        impl RepositoryBackend for FlakyRepository {
            fn put(&self, unit: &MemoryUnit) -> crate::Result<()> {
                self.inner.put(unit)
            }
            fn get(&self, tenant: &TenantId, id: &MemoryId) -> crate::Result<MemoryUnit> {
                self.inner.get(tenant, id)
            }
            fn list(
                &self,
                tenant: &TenantId,
                filter: &crate::models::ListFilter,
                cursor: Option<&str>,
                limit: usize,
            ) -> crate::Result<crate::models::Page> {
                self.inner.list(tenant, filter, cursor, limit)
            }
            fn update_fields(
                &self,
                tenant: &TenantId,
                id: &MemoryId,
                patch: &UpdateFields,
                expected_version: Option<u64>,
            ) -> crate::Result<MemoryUnit> {
                if patch.status.is_some()
                    && self
                        .fail_status_writes
                        .load(std::sync::atomic::Ordering::SeqCst)
                {
                    return Err(Error::OperationFailed {
                        operation: "update_fields".to_string(),
                        cause: "injected failure".to_string(),
                    });
                }
                self.inner.update_fields(tenant, id, patch, expected_version)
            }
            fn soft_delete(
                &self,
                tenant: &TenantId,
                id: &MemoryId,
                now: u64,
            ) -> crate::Result<MemoryUnit> {
                self.inner.soft_delete(tenant, id, now)
            }
            fn purge_expired(
                &self,
                tenant: &TenantId,
                now: u64,
                retention_secs: u64,
            ) -> crate::Result<Vec<MemoryId>> {
                self.inner.purge_expired(tenant, now, retention_secs)
            }
            fn scan(&self, tenant: &TenantId) -> crate::Result<Vec<MemoryUnit>> {
                self.inner.scan(tenant)
            }
            fn count_active(&self, tenant: &TenantId) -> crate::Result<usize> {
                self.inner.count_active(tenant)
            }
            fn tenants(&self) -> crate::Result<Vec<TenantId>> {
                self.inner.tenants()
            }
        }

        let repository = Arc::new(FlakyRepository {
            inner: InMemoryRepository::new(),
            fail_status_writes: std::sync::atomic::AtomicBool::new(true),
        });
        let index = Arc::new(InMemoryIndex::new());
        let graph = Arc::new(InMemoryGraph::new());
        let tenant = TenantId::new("acme");
        let service = ConsolidationService::new(
            repository.clone(),
            index.clone(),
            graph.clone(),
            Arc::new(TenantLocks::new()),
            ConsolidationConfig {
                min_retention_secs: DAY,
                ..ConsolidationConfig::default()
            },
        );

        let now = 10 * DAY;
        for (id, embedding, salience, created_at) in [
            ("keep", vec![1.0, 0.0], 0.8_f32, 100),
            ("lose", vec![1.0, 0.0], 0.3, 200),
        ] {
            let mut unit = MemoryUnit::new(
                MemoryId::new(id),
                tenant.clone(),
                Modality::Text,
                id,
                embedding.clone(),
                salience,
                created_at,
            );
            unit.last_accessed_at = now;
            repository.put(&unit).unwrap();
            index.insert(&tenant, &unit.id, &embedding, created_at).unwrap();
        }
        let lose = MemoryId::new("lose");
        let other = MemoryId::new("keep");
        graph
            .link(&tenant, &lose, &other, EdgeKind::Reference, 0.6)
            .unwrap();

        let err = service.run_pass_at(&tenant, now).unwrap_err();
        assert!(matches!(err, Error::ConsolidationAborted { .. }));

        // Rolled back: still active, still indexed, edges intact.
        let restored = repository.get(&tenant, &lose).unwrap();
        assert_eq!(restored.status, MemoryStatus::Active);
        assert!((restored.salience - 0.3).abs() < f32::EPSILON);
        assert_eq!(index.len(&tenant).unwrap(), 2);
        let edges = graph.edges_from(&tenant, &lose).unwrap();
        assert_eq!(edges.len(), 1);
        assert!((edges[0].weight - 0.6).abs() < f32::EPSILON);
    }
}
