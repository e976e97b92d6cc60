//! Per-tenant exclusive sections.

use crate::models::TenantId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Registry of per-tenant reader-writer locks.
///
/// Ingestion and retrieval take a tenant's shared lock and interleave
/// freely; a consolidation pass takes the exclusive lock, queueing that
/// tenant's writes and serving reads pre-pass until it commits. Locks for
/// distinct tenants never contend.
#[derive(Debug, Default)]
pub struct TenantLocks {
    locks: Mutex<HashMap<TenantId, Arc<RwLock<()>>>>,
}

impl TenantLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for a tenant, creating it on first use.
    ///
    /// A poisoned registry falls back to a fresh lock rather than
    /// propagating the panic to unrelated tenants.
    #[must_use]
    pub fn for_tenant(&self, tenant: &TenantId) -> Arc<RwLock<()>> {
        self.locks.lock().map_or_else(
            |_| Arc::new(RwLock::new(())),
            |mut locks| locks.entry(tenant.clone()).or_default().clone(),
        )
    }
}
