//! Data models for mnemo.
//!
//! This module contains all the core data structures used throughout the
//! engine.

mod consolidation;
mod graph;
mod memory;
mod search;

pub use consolidation::{PassStats, SurvivorPolicy};
pub use graph::{EdgeKind, Neighbor, RelationEdge};
pub use memory::{MemoryId, MemoryStatus, MemoryUnit, Modality, TenantId, content_hash};
pub use search::{ListFilter, Page, Provenance, RetrievalResult, SearchHit, decode_cursor, encode_cursor};
