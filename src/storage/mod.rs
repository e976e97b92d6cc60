//! Storage layers for mnemo.
//!
//! Three tenant-partitioned layers, each behind a trait:
//!
//! - **Repository**: durable keyed storage of memory units
//! - **Semantic index**: nearest-neighbor search over embeddings
//! - **Relation graph**: typed weighted edges between units
//!
//! In-memory implementations back tests and embedded use; production
//! deployments plug database-backed implementations into the same traits.

pub mod memory;
pub mod traits;

pub use memory::{InMemoryGraph, InMemoryIndex, InMemoryRepository};
pub use traits::{
    GraphStats, RelationGraphBackend, RepositoryBackend, SemanticIndex, UpdateFields,
};
