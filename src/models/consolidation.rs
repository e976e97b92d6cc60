//! Consolidation pass types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy for choosing the surviving unit of a near-duplicate merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurvivorPolicy {
    /// Higher salience wins; lexicographic id breaks exact ties.
    #[default]
    Salience,
    /// Higher salience wins; salience ties go to the more recent unit.
    SalienceThenRecency,
}

impl SurvivorPolicy {
    /// Returns the policy as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Salience => "salience",
            Self::SalienceThenRecency => "salience-then-recency",
        }
    }

    /// Parses a policy from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "salience" => Some(Self::Salience),
            "salience-then-recency" | "salience_then_recency" => Some(Self::SalienceThenRecency),
            _ => None,
        }
    }
}

impl fmt::Display for SurvivorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Statistics from a single tenant consolidation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Number of active units examined.
    pub processed: usize,
    /// Number of units whose salience was decayed.
    pub decayed: usize,
    /// Number of units absorbed into a near-duplicate survivor.
    pub merged: usize,
    /// Number of units evicted for low salience.
    pub evicted: usize,
    /// Number of terminal units purged past the audit retention window.
    pub purged: usize,
}

impl PassStats {
    /// Returns true if the pass touched nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.decayed == 0 && self.merged == 0 && self.evicted == 0 && self.purged == 0
    }

    /// Returns a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            format!("Processed: {}, no changes", self.processed)
        } else {
            format!(
                "Processed: {}, Decayed: {}, Merged: {}, Evicted: {}, Purged: {}",
                self.processed, self.decayed, self.merged, self.evicted, self.purged
            )
        }
    }
}
