//! Repository backend trait.
//!
//! Durable keyed storage of memory units, partitioned by tenant.
//!
//! # Tenant Isolation
//!
//! Every method takes the calling tenant. A lookup for an id owned by a
//! different tenant fails with [`crate::Error::NotFound`], never a
//! "forbidden" variant, so callers cannot probe for the existence of
//! other tenants' units.
//!
//! # Concurrency
//!
//! | Operation | Guarantee |
//! |-----------|-----------|
//! | `put` | Idempotent on id; overwrites and bumps the version counter |
//! | `update_fields` | Optimistic: stale expected version → `Conflict` |
//! | `soft_delete` | Terminal status, retained for audit |

use crate::Result;
use crate::models::{ListFilter, MemoryId, MemoryStatus, MemoryUnit, Page, TenantId};

/// Partial update applied by [`RepositoryBackend::update_fields`].
///
/// Absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateFields {
    /// New content summary.
    pub content_summary: Option<String>,
    /// New salience value; clamped to `[0.0, 1.0]` by implementations.
    pub salience: Option<f32>,
    /// New last-accessed timestamp.
    pub last_accessed_at: Option<u64>,
    /// New status, with the timestamp of the transition.
    pub status: Option<(MemoryStatus, u64)>,
    /// Replacement tags.
    pub tags: Option<Vec<String>>,
}

impl UpdateFields {
    /// Creates an empty patch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            content_summary: None,
            salience: None,
            last_accessed_at: None,
            status: None,
            tags: None,
        }
    }

    /// Sets the salience field.
    #[must_use]
    pub const fn with_salience(mut self, salience: f32) -> Self {
        self.salience = Some(salience);
        self
    }

    /// Sets the last-accessed timestamp.
    #[must_use]
    pub const fn with_last_accessed_at(mut self, ts: u64) -> Self {
        self.last_accessed_at = Some(ts);
        self
    }

    /// Sets the status transition.
    #[must_use]
    pub const fn with_status(mut self, status: MemoryStatus, at: u64) -> Self {
        self.status = Some((status, at));
        self
    }
}

/// Trait for repository backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn RepositoryBackend>`
/// - Use interior mutability (e.g., `RwLock<HashMap<K, V>>`) for mutable state
pub trait RepositoryBackend: Send + Sync {
    /// Stores a unit, overwriting any previous unit with the same id.
    ///
    /// The stored version is bumped past the previous one; the caller's
    /// `version` field on `unit` is ignored on overwrite.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn put(&self, unit: &MemoryUnit) -> Result<()>;

    /// Retrieves a unit by tenant and id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if the unit does not exist for
    /// this tenant.
    fn get(&self, tenant: &TenantId, id: &MemoryId) -> Result<MemoryUnit>;

    /// Lists units for a tenant, newest first, paginated by opaque cursor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] for a malformed cursor.
    fn list(
        &self,
        tenant: &TenantId,
        filter: &ListFilter,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Page>;

    /// Applies a partial update under optimistic concurrency.
    ///
    /// When `expected_version` is supplied it must match the stored
    /// version exactly; the update bumps the version on success.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] for an unknown id and
    /// [`crate::Error::Conflict`] for a stale expected version.
    fn update_fields(
        &self,
        tenant: &TenantId,
        id: &MemoryId,
        patch: &UpdateFields,
        expected_version: Option<u64>,
    ) -> Result<MemoryUnit>;

    /// Soft-deletes a unit, marking it `Deleted` but retaining it for audit.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if the unit does not exist for
    /// this tenant.
    fn soft_delete(&self, tenant: &TenantId, id: &MemoryId, now: u64) -> Result<MemoryUnit>;

    /// Hard-removes terminal units whose status change is older than
    /// `retention_secs`. Returns the ids purged.
    ///
    /// # Errors
    ///
    /// Returns an error if the purge operation fails.
    fn purge_expired(&self, tenant: &TenantId, now: u64, retention_secs: u64)
    -> Result<Vec<MemoryId>>;

    /// Returns all units for a tenant regardless of status.
    ///
    /// Used by consolidation to snapshot a tenant's corpus.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan operation fails.
    fn scan(&self, tenant: &TenantId) -> Result<Vec<MemoryUnit>>;

    /// Returns the number of active units for a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    fn count_active(&self, tenant: &TenantId) -> Result<usize>;

    /// Returns every tenant currently holding at least one unit.
    ///
    /// Drives the consolidation scheduler's round-robin.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan operation fails.
    fn tenants(&self) -> Result<Vec<TenantId>>;
}
