//! Service layer for mnemo.
//!
//! Services compose the storage backends into the engine's operations:
//! ingestion, retrieval, and consolidation. All of them share a
//! [`TenantLocks`] registry so a tenant's consolidation pass is exclusive
//! against that tenant's reads and writes while other tenants proceed
//! unaffected.

mod consolidation;
mod ingest;
mod retrieval;
mod scheduler;
mod tenant_locks;

pub use consolidation::ConsolidationService;
pub use ingest::{IngestRequest, IngestResult, IngestService};
pub use retrieval::{CancelToken, RetrievalService};
pub use scheduler::{ConsolidationScheduler, SchedulerHandle};
pub use tenant_locks::TenantLocks;
