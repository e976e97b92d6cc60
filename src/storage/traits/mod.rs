//! Backend traits for the storage layers.

mod graph;
mod index;
mod repository;

pub use graph::{GraphStats, RelationGraphBackend};
pub use index::SemanticIndex;
pub use repository::{RepositoryBackend, UpdateFields};
