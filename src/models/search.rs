//! Retrieval and listing types.

use super::{MemoryId, MemoryStatus, MemoryUnit, Modality};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Filter criteria for repository listing.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Filter by modalities (matched by tag, ignoring detail fields).
    pub modalities: Vec<Modality>,
    /// Filter by statuses; empty means active only.
    pub statuses: Vec<MemoryStatus>,
    /// Minimum creation timestamp (inclusive).
    pub created_after: Option<u64>,
    /// Maximum creation timestamp (inclusive).
    pub created_before: Option<u64>,
}

impl ListFilter {
    /// Creates an empty filter (active units, all modalities, all times).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            modalities: Vec::new(),
            statuses: Vec::new(),
            created_after: None,
            created_before: None,
        }
    }

    /// Adds a modality filter.
    #[must_use]
    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modalities.push(modality);
        self
    }

    /// Adds a status filter.
    #[must_use]
    pub fn with_status(mut self, status: MemoryStatus) -> Self {
        self.statuses.push(status);
        self
    }

    /// Restricts to units created at or after the given timestamp.
    #[must_use]
    pub const fn created_after(mut self, ts: u64) -> Self {
        self.created_after = Some(ts);
        self
    }

    /// Restricts to units created at or before the given timestamp.
    #[must_use]
    pub const fn created_before(mut self, ts: u64) -> Self {
        self.created_before = Some(ts);
        self
    }

    /// Returns true if the unit passes this filter.
    #[must_use]
    pub fn matches(&self, unit: &MemoryUnit) -> bool {
        if self.statuses.is_empty() {
            if !unit.is_active() {
                return false;
            }
        } else if !self.statuses.contains(&unit.status) {
            return false;
        }
        if !self.modalities.is_empty()
            && !self
                .modalities
                .iter()
                .any(|m| m.as_str() == unit.modality.as_str())
        {
            return false;
        }
        if self.created_after.is_some_and(|ts| unit.created_at < ts) {
            return false;
        }
        if self.created_before.is_some_and(|ts| unit.created_at > ts) {
            return false;
        }
        true
    }
}

/// Pagination cursor payload: position of the last yielded unit.
///
/// Serialized and hex-encoded so callers treat it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CursorPos {
    created_at: u64,
    id: String,
}

/// Encodes a listing position into an opaque cursor string.
#[must_use]
pub fn encode_cursor(created_at: u64, id: &MemoryId) -> String {
    let pos = CursorPos {
        created_at,
        id: id.as_str().to_string(),
    };
    // CursorPos always serializes; fall back to an empty cursor if not.
    serde_json::to_vec(&pos).map(hex::encode).unwrap_or_default()
}

/// Decodes an opaque cursor back into a listing position.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the cursor is malformed.
pub fn decode_cursor(cursor: &str) -> Result<(u64, MemoryId)> {
    let bytes = hex::decode(cursor)
        .map_err(|_| Error::InvalidArgument("malformed pagination cursor".to_string()))?;
    let pos: CursorPos = serde_json::from_slice(&bytes)
        .map_err(|_| Error::InvalidArgument("malformed pagination cursor".to_string()))?;
    Ok((pos.created_at, MemoryId::new(pos.id)))
}

/// One page of repository listing results.
#[derive(Debug, Clone)]
pub struct Page {
    /// Units on this page, newest first.
    pub units: Vec<MemoryUnit>,
    /// Cursor for the next page, absent when exhausted.
    pub next_cursor: Option<String>,
}

/// How a retrieval hit was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Returned directly by the semantic index.
    Direct,
    /// Pulled in through relation-graph expansion.
    Graph,
}

/// A single ranked retrieval hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matched unit, as of result assembly.
    pub unit: MemoryUnit,
    /// Blended ranking score: similarity for direct hits,
    /// `similarity * path_weight` for graph expansion hits.
    pub score: f32,
    /// Raw cosine similarity against the query, when computed.
    pub similarity: f32,
    /// Path weight for graph hits; 1.0 for direct hits.
    pub path_weight: f32,
    /// How the hit was discovered.
    pub provenance: Provenance,
}

/// The final, ranked, deduplicated answer to a retrieval query.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    /// Ranked hits, best first.
    pub hits: Vec<SearchHit>,
    /// Number of candidates considered before deduplication.
    pub candidates_considered: usize,
    /// Whether graph expansion was performed.
    pub expanded: bool,
}

impl RetrievalResult {
    /// Returns true if no hits were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TenantId;

    fn unit(id: &str, created_at: u64, status: MemoryStatus) -> MemoryUnit {
        let mut u = MemoryUnit::new(
            MemoryId::new(id),
            TenantId::new("t1"),
            Modality::Text,
            "summary",
            vec![1.0, 0.0],
            0.5,
            created_at,
        );
        u.status = status;
        u
    }

    #[test]
    fn test_cursor_roundtrip() {
        let id = MemoryId::new("mem-7");
        let cursor = encode_cursor(1234, &id);
        assert!(!cursor.is_empty());
        let decoded = decode_cursor(&cursor);
        assert!(matches!(decoded, Ok((1234, ref d)) if *d == id));
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(decode_cursor("not-hex!").is_err());
        assert!(decode_cursor("deadbeef").is_err());
    }

    #[test]
    fn test_filter_defaults_to_active_only() {
        let filter = ListFilter::new();
        assert!(filter.matches(&unit("a", 10, MemoryStatus::Active)));
        assert!(!filter.matches(&unit("b", 10, MemoryStatus::Merged)));
        assert!(!filter.matches(&unit("c", 10, MemoryStatus::Evicted)));
    }

    #[test]
    fn test_filter_time_range() {
        let filter = ListFilter::new().created_after(100).created_before(200);
        assert!(filter.matches(&unit("a", 150, MemoryStatus::Active)));
        assert!(filter.matches(&unit("b", 100, MemoryStatus::Active)));
        assert!(!filter.matches(&unit("c", 99, MemoryStatus::Active)));
        assert!(!filter.matches(&unit("d", 201, MemoryStatus::Active)));
    }

    #[test]
    fn test_filter_by_explicit_status() {
        let filter = ListFilter::new().with_status(MemoryStatus::Merged);
        assert!(filter.matches(&unit("a", 10, MemoryStatus::Merged)));
        assert!(!filter.matches(&unit("b", 10, MemoryStatus::Active)));
    }

    #[test]
    fn test_filter_by_modality_ignores_detail_fields() {
        let filter = ListFilter::new().with_modality(Modality::AudioTranscript {
            duration_secs: None,
        });
        let mut u = unit("a", 10, MemoryStatus::Active);
        u.modality = Modality::AudioTranscript {
            duration_secs: Some(90),
        };
        assert!(filter.matches(&u));
    }
}
