//! In-memory storage backends.
//!
//! `RwLock`-guarded implementations of the three storage traits. They back
//! the test suite and embedded deployments; database-backed implementations
//! plug into the same traits for production use.

mod graph;
mod index;
mod repository;

pub use graph::InMemoryGraph;
pub use index::InMemoryIndex;
pub use repository::InMemoryRepository;
