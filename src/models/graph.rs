//! Relation graph types.

use super::MemoryId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of relation edge between two memory units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// The units were ingested adjacently in time.
    Temporal,
    /// The units are topically similar; stored symmetric.
    Topical,
    /// One unit explicitly references the other.
    Reference,
}

impl EdgeKind {
    /// Returns all edge kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Temporal, Self::Topical, Self::Reference]
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Temporal => "temporal",
            Self::Topical => "topical",
            Self::Reference => "reference",
        }
    }

    /// Returns true if edges of this kind are stored in both directions.
    #[must_use]
    pub const fn is_symmetric(&self) -> bool {
        matches!(self, Self::Topical)
    }

    /// Parses an edge kind from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "temporal" => Some(Self::Temporal),
            "topical" => Some(Self::Topical),
            "reference" => Some(Self::Reference),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed edge between two memory units of the same tenant.
///
/// At most one edge exists per `(from_id, to_id, kind)`; re-linking keeps
/// the maximum weight. Self-loops are rejected at the service boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationEdge {
    /// Source unit.
    pub from_id: MemoryId,
    /// Destination unit.
    pub to_id: MemoryId,
    /// Relation kind.
    pub kind: EdgeKind,
    /// Edge weight in `(0.0, 1.0]`.
    pub weight: f32,
}

impl RelationEdge {
    /// Creates a new edge.
    #[must_use]
    pub const fn new(from_id: MemoryId, to_id: MemoryId, kind: EdgeKind, weight: f32) -> Self {
        Self {
            from_id,
            to_id,
            kind,
            weight,
        }
    }
}

/// A unit discovered by graph traversal, with its best path weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// The discovered unit.
    pub id: MemoryId,
    /// Product of edge weights along the best discovered path.
    pub path_weight: f32,
    /// Number of hops from the traversal origin.
    pub depth: u32,
}
