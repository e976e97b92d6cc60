//! Memory ingestion service.
//!
//! Turns raw content into an embedded, linked memory unit: embed, dedup,
//! store, index, and link temporal adjacency. Ingestion is all-or-nothing;
//! an embedding or storage failure leaves no partial unit behind.

use crate::config::IngestConfig;
use crate::embedding::{Embedder, normalize};
use crate::models::{EdgeKind, MemoryId, MemoryUnit, Modality, TenantId, content_hash};
use crate::services::TenantLocks;
use crate::storage::traits::{RelationGraphBackend, RepositoryBackend, SemanticIndex};
use crate::{Error, Result, current_timestamp};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Request to ingest one piece of content.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Owning tenant, supplied by the caller's validated auth context.
    pub tenant_id: TenantId,
    /// Content modality.
    pub modality: Modality,
    /// Raw content handed to the embedding port.
    pub content: String,
    /// Display digest; defaults to a truncation of the content.
    pub content_summary: Option<String>,
    /// Re-ingestion under an existing id overwrites that unit.
    pub id: Option<MemoryId>,
    /// Opaque external collaborator identifiers.
    pub source_refs: Vec<String>,
    /// Optional tags.
    pub tags: Vec<String>,
}

impl IngestRequest {
    /// Creates a text ingestion request with defaults.
    #[must_use]
    pub fn text(tenant_id: TenantId, content: impl Into<String>) -> Self {
        Self {
            tenant_id,
            modality: Modality::Text,
            content: content.into(),
            content_summary: None,
            id: None,
            source_refs: Vec::new(),
            tags: Vec::new(),
        }
    }
}

/// Result of an ingestion.
#[derive(Debug, Clone)]
pub struct IngestResult {
    /// Id of the created (or matched) unit.
    pub memory_id: MemoryId,
    /// True if an exact duplicate short-circuited ingestion.
    pub deduplicated: bool,
}

/// Maximum characters kept when deriving a summary from content.
const SUMMARY_MAX_CHARS: usize = 160;

/// Service for ingesting memory units.
pub struct IngestService {
    embedder: Arc<dyn Embedder>,
    repository: Arc<dyn RepositoryBackend>,
    index: Arc<dyn SemanticIndex>,
    graph: Arc<dyn RelationGraphBackend>,
    locks: Arc<TenantLocks>,
    config: IngestConfig,
}

impl IngestService {
    /// Creates a new ingestion service.
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        repository: Arc<dyn RepositoryBackend>,
        index: Arc<dyn SemanticIndex>,
        graph: Arc<dyn RelationGraphBackend>,
        locks: Arc<TenantLocks>,
        config: IngestConfig,
    ) -> Self {
        Self {
            embedder,
            repository,
            index,
            graph,
            locks,
            config,
        }
    }

    /// Ingests one piece of content.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [`Error::InvalidArgument`] for empty content
    /// - [`Error::EmbeddingUnavailable`] if the embedding port fails; no
    ///   partial state is left behind
    /// - [`Error::Conflict`] never; re-ingestion under an existing id
    ///   overwrites
    #[instrument(
        name = "mnemo.ingest",
        skip(self, request),
        fields(tenant = %request.tenant_id, modality = %request.modality.as_str())
    )]
    pub fn ingest(&self, request: IngestRequest) -> Result<IngestResult> {
        let start = Instant::now();
        let result = self.ingest_inner(request);
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("mnemo_ingest_total", "status" => status).increment(1);
        metrics::histogram!("mnemo_ingest_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        result
    }

    fn ingest_inner(&self, request: IngestRequest) -> Result<IngestResult> {
        if request.content.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "content cannot be empty".to_string(),
            ));
        }

        // Embedding happens before any state is touched; a failure here is
        // terminal for this ingestion and leaves nothing behind.
        let raw = self.embedder.embed(&request.content, &request.modality)?;
        let embedding = normalize(&raw)?;

        let tenant = request.tenant_id.clone();
        let lock = self.locks.for_tenant(&tenant);
        let _guard = lock.read().map_err(|_| Error::OperationFailed {
            operation: "ingest".to_string(),
            cause: "tenant lock poisoned".to_string(),
        })?;

        let hash = content_hash(&request.content);
        if self.config.dedup_exact && request.id.is_none() {
            if let Some(existing) = self.find_exact_duplicate(&tenant, &hash)? {
                tracing::debug!(unit = %existing, "exact duplicate, skipping ingestion");
                return Ok(IngestResult {
                    memory_id: existing,
                    deduplicated: true,
                });
            }
        }

        let now = current_timestamp();
        let id = request.id.clone().unwrap_or_else(MemoryId::generate);
        let summary = request
            .content_summary
            .clone()
            .unwrap_or_else(|| truncate_summary(&request.content));

        // Temporal adjacency target: the tenant's most recently created
        // active unit before this one.
        let predecessor = self.latest_active(&tenant, &id)?;

        let mut unit = MemoryUnit::new(
            id.clone(),
            tenant.clone(),
            request.modality,
            summary,
            embedding.clone(),
            self.config.initial_salience,
            now,
        )
        .with_source_refs(request.source_refs)
        .with_tags(request.tags);
        unit.content_hash = hash;

        // Index and graph first, repository last; compensating removals
        // undo the earlier writes if a later one fails, so a failed
        // ingestion leaves no partial unit.
        self.index.insert(&tenant, &id, &embedding, now)?;

        if let Some(ref prev) = predecessor
            && let Err(e) =
                self.graph
                    .link(&tenant, prev, &id, EdgeKind::Temporal, self.config.adjacency_weight)
        {
            let _ = self.index.remove(&tenant, &id);
            return Err(e);
        }

        if let Err(e) = self.repository.put(&unit) {
            let _ = self.graph.unlink_all(&tenant, &id);
            let _ = self.index.remove(&tenant, &id);
            return Err(e);
        }

        tracing::info!(unit = %id, "ingested memory unit");
        Ok(IngestResult {
            memory_id: id,
            deduplicated: false,
        })
    }

    /// Soft-deletes a unit at the user's request.
    ///
    /// The unit turns `Deleted` and is retained for audit until the
    /// retention window expires; its index entry and relation edges are
    /// dropped immediately so it can no longer be retrieved or traversed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the unit does not exist for this
    /// tenant.
    #[instrument(name = "mnemo.delete", skip(self), fields(tenant = %tenant, unit = %id))]
    pub fn delete(&self, tenant: &TenantId, id: &MemoryId) -> Result<()> {
        let lock = self.locks.for_tenant(tenant);
        let _guard = lock.read().map_err(|_| Error::OperationFailed {
            operation: "delete".to_string(),
            cause: "tenant lock poisoned".to_string(),
        })?;

        self.repository.soft_delete(tenant, id, current_timestamp())?;
        self.index.remove(tenant, id)?;
        self.graph.unlink_all(tenant, id)?;
        metrics::counter!("mnemo_deletes_total").increment(1);
        tracing::info!("memory unit deleted");
        Ok(())
    }

    /// Finds an active unit with the same content hash.
    fn find_exact_duplicate(&self, tenant: &TenantId, hash: &str) -> Result<Option<MemoryId>> {
        let units = self.repository.scan(tenant)?;
        Ok(units
            .into_iter()
            .find(|u| u.is_active() && u.content_hash == hash)
            .map(|u| u.id))
    }

    /// Returns the most recently created active unit, excluding `ingesting`.
    fn latest_active(&self, tenant: &TenantId, ingesting: &MemoryId) -> Result<Option<MemoryId>> {
        let units = self.repository.scan(tenant)?;
        Ok(units
            .into_iter()
            .filter(|u| u.is_active() && u.id != *ingesting)
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|u| u.id))
    }
}

/// Truncates content to a display summary on a character boundary.
fn truncate_summary(content: &str) -> String {
    if content.chars().count() <= SUMMARY_MAX_CHARS {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(SUMMARY_MAX_CHARS).collect();
        format!("{truncated}…")
    }
}
