//! Memory unit types and identifiers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Unique identifier for a memory unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Creates a new memory ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MemoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the tenant that owns a memory unit.
///
/// Every repository, index, and graph operation is scoped by this value;
/// it is supplied by the caller's validated auth context and trusted here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a new tenant ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Content modality of a memory unit.
///
/// Closed set: each variant carries only the detail relevant to it. The
/// embedding contract is shared across all variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Modality {
    /// Plain text captured from conversation or notes.
    Text,
    /// Transcribed audio.
    AudioTranscript {
        /// Duration of the source audio in seconds, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_secs: Option<u32>,
    },
    /// Descriptor text derived from an image.
    ImageDescriptor {
        /// Width x height of the source image, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        dimensions: Option<(u32, u32)>,
    },
    /// Excerpt extracted from a document.
    DocumentExcerpt {
        /// Page number within the source document, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        page: Option<u32>,
    },
}

impl Modality {
    /// Returns the modality as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::AudioTranscript { .. } => "audio-transcript",
            Self::ImageDescriptor { .. } => "image-descriptor",
            Self::DocumentExcerpt { .. } => "document-excerpt",
        }
    }

    /// Parses a modality from a string, ignoring detail fields.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "audio-transcript" | "audio" => Some(Self::AudioTranscript {
                duration_secs: None,
            }),
            "image-descriptor" | "image" => Some(Self::ImageDescriptor { dimensions: None }),
            "document-excerpt" | "document" => Some(Self::DocumentExcerpt { page: None }),
            _ => None,
        }
    }

    /// Returns true if two modalities may be merged during consolidation.
    ///
    /// Compatibility ignores detail fields; a transcript and a text note
    /// describing the same moment are mergeable, an image descriptor is not
    /// mergeable with either.
    #[must_use]
    pub fn merge_compatible(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Text | Self::AudioTranscript { .. },
                Self::Text | Self::AudioTranscript { .. },
            ) => true,
            (Self::ImageDescriptor { .. }, Self::ImageDescriptor { .. })
            | (Self::DocumentExcerpt { .. }, Self::DocumentExcerpt { .. }) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a memory unit.
///
/// `Merged`, `Evicted`, and `Deleted` are terminal: such units are never
/// returned by queries but are retained for audit until the retention
/// window expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStatus {
    /// Live and queryable.
    #[default]
    Active,
    /// Absorbed into a higher-salience near-duplicate.
    Merged,
    /// Removed by consolidation for low salience.
    Evicted,
    /// Soft-deleted by explicit user request.
    Deleted,
}

impl MemoryStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Merged => "merged",
            Self::Evicted => "evicted",
            Self::Deleted => "deleted",
        }
    }

    /// Returns true if units in this status are excluded from queries.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for MemoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An atomic, embedded, tenant-owned record of ingested content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryUnit {
    /// Unique identifier, immutable.
    pub id: MemoryId,
    /// Owning tenant; all operations are scoped by this field.
    pub tenant_id: TenantId,
    /// Content modality.
    pub modality: Modality,
    /// Short human-readable digest, used for display, not for search.
    pub content_summary: String,
    /// Normalized embedding vector, produced once at creation.
    pub embedding: Vec<f32>,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
    /// Last retrieval-hit timestamp (Unix epoch seconds).
    pub last_accessed_at: u64,
    /// Retention priority in `[0.0, 1.0]`; decayed by consolidation,
    /// boosted on retrieval hits.
    pub salience: f32,
    /// Lifecycle status.
    pub status: MemoryStatus,
    /// Timestamp of the most recent status change (Unix epoch seconds).
    ///
    /// Drives the audit retention window for terminal units.
    pub status_changed_at: u64,
    /// Opaque external collaborator identifiers (uploaded file keys etc.).
    pub source_refs: Vec<String>,
    /// SHA-256 digest of the raw content, used for exact-duplicate detection.
    pub content_hash: String,
    /// Optional tags for categorization.
    pub tags: Vec<String>,
    /// Version counter for optimistic concurrency; bumped on every write.
    pub version: u64,
}

impl MemoryUnit {
    /// Creates a new active unit with the given embedding.
    ///
    /// Timestamps are set to `created_at`; the version starts at 1.
    #[must_use]
    pub fn new(
        id: MemoryId,
        tenant_id: TenantId,
        modality: Modality,
        content_summary: impl Into<String>,
        embedding: Vec<f32>,
        initial_salience: f32,
        created_at: u64,
    ) -> Self {
        let summary = content_summary.into();
        let hash = content_hash(&summary);
        Self {
            id,
            tenant_id,
            modality,
            content_summary: summary,
            embedding,
            created_at,
            last_accessed_at: created_at,
            salience: initial_salience.clamp(0.0, 1.0),
            status: MemoryStatus::Active,
            status_changed_at: created_at,
            source_refs: Vec::new(),
            content_hash: hash,
            tags: Vec::new(),
            version: 1,
        }
    }

    /// Adds source references.
    #[must_use]
    pub fn with_source_refs(mut self, refs: impl IntoIterator<Item = String>) -> Self {
        self.source_refs.extend(refs);
        self
    }

    /// Adds tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Returns true if the unit is live and queryable.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, MemoryStatus::Active)
    }

    /// Transitions the unit to a terminal status.
    pub fn mark(&mut self, status: MemoryStatus, now: u64) {
        self.status = status;
        self.status_changed_at = now;
    }

    /// Creation time as a UTC datetime, for host-side display.
    ///
    /// `None` only for timestamps outside chrono's representable range.
    #[must_use]
    pub fn created_at_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(i64::try_from(self.created_at).ok()?, 0)
    }

    /// Most recent status change as a UTC datetime.
    #[must_use]
    pub fn status_changed_at_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(i64::try_from(self.status_changed_at).ok()?, 0)
    }
}

/// Computes the SHA-256 content hash used for exact-duplicate detection.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_memory_id_roundtrip() {
        let id = MemoryId::new("mem-42");
        assert_eq!(id.as_str(), "mem-42");
        assert_eq!(id.to_string(), "mem-42");
        assert_eq!(MemoryId::from("mem-42"), id);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(MemoryId::generate(), MemoryId::generate());
    }

    #[test_case("text", Some("text"); "text modality")]
    #[test_case("audio-transcript", Some("audio-transcript"); "audio modality")]
    #[test_case("image", Some("image-descriptor"); "image shorthand")]
    #[test_case("document-excerpt", Some("document-excerpt"); "document modality")]
    #[test_case("video", None; "unknown modality")]
    fn test_modality_parse(input: &str, expected: Option<&str>) {
        assert_eq!(Modality::parse(input).map(|m| m.as_str()), expected);
    }

    #[test]
    fn test_modality_merge_compatibility() {
        let text = Modality::Text;
        let audio = Modality::AudioTranscript {
            duration_secs: Some(30),
        };
        let image = Modality::ImageDescriptor { dimensions: None };

        assert!(text.merge_compatible(&audio));
        assert!(audio.merge_compatible(&text));
        assert!(image.merge_compatible(&image));
        assert!(!text.merge_compatible(&image));
        assert!(!image.merge_compatible(&audio));
    }

    #[test]
    fn test_status_terminality() {
        assert!(!MemoryStatus::Active.is_terminal());
        assert!(MemoryStatus::Merged.is_terminal());
        assert!(MemoryStatus::Evicted.is_terminal());
        assert!(MemoryStatus::Deleted.is_terminal());
    }

    #[test]
    fn test_new_unit_clamps_salience() {
        let unit = MemoryUnit::new(
            MemoryId::new("m1"),
            TenantId::new("t1"),
            Modality::Text,
            "hello",
            vec![1.0, 0.0],
            1.7,
            100,
        );
        assert!((unit.salience - 1.0).abs() < f32::EPSILON);
        assert_eq!(unit.version, 1);
        assert_eq!(unit.last_accessed_at, 100);
        assert_eq!(unit.content_hash, content_hash("hello"));
    }

    #[test]
    fn test_utc_accessors() {
        let unit = MemoryUnit::new(
            MemoryId::new("m1"),
            TenantId::new("t1"),
            Modality::Text,
            "hello",
            vec![1.0],
            0.5,
            1_700_000_000,
        );
        let Some(created) = unit.created_at_utc() else {
            unreachable!("in-range timestamp");
        };
        assert_eq!(created.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash("same"), content_hash("same"));
        assert_ne!(content_hash("same"), content_hash("different"));
    }

    #[test]
    fn test_mark_updates_status_timestamp() {
        let mut unit = MemoryUnit::new(
            MemoryId::new("m1"),
            TenantId::new("t1"),
            Modality::Text,
            "hello",
            vec![1.0],
            0.5,
            100,
        );
        unit.mark(MemoryStatus::Evicted, 500);
        assert_eq!(unit.status, MemoryStatus::Evicted);
        assert_eq!(unit.status_changed_at, 500);
        assert!(!unit.is_active());
    }
}
