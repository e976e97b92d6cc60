//! # Mnemo
//!
//! A multi-tenant memory store and consolidation engine for conversational
//! agents.
//!
//! Mnemo holds vector-embedded "memory units" per tenant, links them into a
//! semantic relation graph, answers similarity queries with graph expansion,
//! and periodically reweights and forgets entries to bound growth while
//! preserving salience.
//!
//! ## Features
//!
//! - Tenant-partitioned repository, semantic index, and relation graph
//! - Cosine similarity search over normalized embeddings with deterministic
//!   tie-breaking
//! - Bounded graph traversal for "related memories" expansion
//! - Consolidation passes (decay, near-duplicate merge, eviction) staged and
//!   committed atomically per tenant
//! - Retrieval reinforcement: returned units are boosted, idle units decay
//!
//! ## Example
//!
//! ```rust,ignore
//! use mnemo::IngestRequest;
//!
//! let request = IngestRequest::text(tenant.clone(), "Met Sofia at the harbour cafe");
//! let result = ingest.ingest(request)?;
//! let hits = retrieval.query(&tenant, &query_embedding, 10, true)?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod embedding;
pub mod models;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{ConsolidationConfig, IngestConfig, MnemoConfig, RetrievalConfig};
pub use embedding::Embedder;
pub use models::{
    EdgeKind, ListFilter, MemoryId, MemoryStatus, MemoryUnit, Modality, Neighbor, PassStats,
    Provenance, RelationEdge, RetrievalResult, SearchHit, SurvivorPolicy, TenantId,
};
pub use services::{
    CancelToken, ConsolidationScheduler, ConsolidationService, IngestRequest, IngestResult,
    IngestService, RetrievalService, SchedulerHandle, TenantLocks,
};
pub use storage::{
    InMemoryGraph, InMemoryIndex, InMemoryRepository, RelationGraphBackend, RepositoryBackend,
    SemanticIndex,
};

/// Error type for mnemo operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `NotFound` | Unknown id/tenant combination (including wrong-tenant access) |
/// | `Conflict` | Optimistic-concurrency version mismatch on update |
/// | `EmbeddingUnavailable` | Upstream embedding service unreachable; ingestion aborted |
/// | `InvalidArgument` | Malformed modality, zero vector, out-of-range k or threshold |
/// | `ConsolidationAborted` | Internal pass failure; rolled back and retried, never surfaced |
/// | `OperationFailed` | Backend read/write failure (poisoned lock, lost connection) |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The requested unit does not exist for the calling tenant.
    ///
    /// Also returned when the id exists under a different tenant, so that
    /// probing cannot distinguish "absent" from "owned by someone else".
    #[error("not found: {0}")]
    NotFound(String),

    /// Optimistic-concurrency version mismatch.
    ///
    /// Raised when an update carries an expected version that is stale
    /// relative to the stored unit.
    #[error("conflict: expected version {expected}, found {actual}")]
    Conflict {
        /// The version the caller expected.
        expected: u64,
        /// The version actually stored.
        actual: u64,
    },

    /// The embedding port failed or is misconfigured.
    ///
    /// Ingestion surfaces this synchronously and leaves no partial state.
    /// Retry policy belongs to the caller, never to this core.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - An embedding has the wrong dimensionality or zero magnitude
    /// - `k` is zero or a score threshold is outside 0.0 to 1.0
    /// - An edge weight is outside (0.0, 1.0] or would form a self-loop
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A consolidation pass failed partway and was rolled back.
    ///
    /// Never surfaced to ingestion or retrieval callers; logged and retried
    /// on the next scheduled pass.
    #[error("consolidation pass aborted for tenant '{tenant}': {cause}")]
    ConsolidationAborted {
        /// The tenant whose pass was abandoned.
        tenant: String,
        /// The underlying cause.
        cause: String,
    },

    /// An internal storage operation failed.
    ///
    /// Raised when a backend cannot complete a read or write, for example
    /// a poisoned lock in the in-memory backends or a connection failure
    /// in a database-backed one.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for mnemo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized to avoid duplicate implementations across the codebase.
/// Uses `SystemTime::now()` with fallback to 0 if the system clock is
/// before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use mnemo::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
