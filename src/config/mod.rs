//! Configuration management.
//!
//! All decay, merge, and eviction tunables live here rather than as
//! hardcoded constants, so deployments can adjust retention behavior
//! without recompiling.

use crate::models::SurvivorPolicy;
use crate::{Error, Result};
use serde::Deserialize;

/// Seconds in one day, used by the window defaults below.
const SECONDS_PER_DAY: u64 = 86_400;

/// Main configuration for mnemo.
#[derive(Debug, Clone, Default)]
pub struct MnemoConfig {
    /// Ingestion settings.
    pub ingest: IngestConfig,
    /// Retrieval settings.
    pub retrieval: RetrievalConfig,
    /// Consolidation settings.
    pub consolidation: ConsolidationConfig,
}

/// Ingestion settings.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Salience assigned to freshly ingested units.
    pub initial_salience: f32,
    /// Whether an exact content-hash duplicate short-circuits ingestion,
    /// returning the existing unit instead of creating a new one.
    pub dedup_exact: bool,
    /// Weight of the temporal adjacency edge linked at ingestion.
    pub adjacency_weight: f32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            initial_salience: 0.5,
            dedup_exact: true,
            adjacency_weight: 1.0,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Default minimum similarity for index search.
    pub min_score: f32,
    /// Minimum path weight for graph-expanded candidates.
    pub min_path_weight: f32,
    /// Salience boost applied to every returned unit, capped at 1.0.
    pub reinforcement: f32,
    /// Maximum `k` a caller may request.
    pub max_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_score: 0.1,
            min_path_weight: 0.25,
            reinforcement: 0.05,
            max_k: 100,
        }
    }
}

/// Consolidation settings.
#[derive(Debug, Clone)]
pub struct ConsolidationConfig {
    /// Multiplier applied to the salience of idle units, per pass.
    pub decay_factor: f32,
    /// A unit is idle if not accessed within this many seconds.
    pub decay_window_secs: u64,
    /// Cosine similarity at or above which two units are merge candidates.
    pub merge_threshold: f32,
    /// Units with salience strictly below this are eviction candidates.
    pub eviction_threshold: f32,
    /// Minimum age in seconds before a unit may be evicted.
    pub min_retention_secs: u64,
    /// How long terminal units are retained for audit before purging.
    pub audit_retention_secs: u64,
    /// How merge survivors are chosen.
    pub survivor_policy: SurvivorPolicy,
    /// Scheduler interval between tenant passes, in seconds.
    pub interval_secs: u64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            decay_factor: 0.95,
            decay_window_secs: SECONDS_PER_DAY,
            merge_threshold: 0.97,
            eviction_threshold: 0.05,
            min_retention_secs: 7 * SECONDS_PER_DAY,
            audit_retention_secs: 30 * SECONDS_PER_DAY,
            survivor_policy: SurvivorPolicy::default(),
            interval_secs: 3600,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Ingestion section.
    pub ingest: Option<ConfigFileIngest>,
    /// Retrieval section.
    pub retrieval: Option<ConfigFileRetrieval>,
    /// Consolidation section.
    pub consolidation: Option<ConfigFileConsolidation>,
}

/// Ingestion section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileIngest {
    /// Initial salience.
    pub initial_salience: Option<f32>,
    /// Exact-duplicate short circuit.
    pub dedup_exact: Option<bool>,
    /// Temporal adjacency edge weight.
    pub adjacency_weight: Option<f32>,
}

/// Retrieval section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRetrieval {
    /// Minimum similarity.
    pub min_score: Option<f32>,
    /// Minimum path weight for expansion.
    pub min_path_weight: Option<f32>,
    /// Reinforcement increment.
    pub reinforcement: Option<f32>,
    /// Maximum k.
    pub max_k: Option<usize>,
}

/// Consolidation section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileConsolidation {
    /// Decay factor.
    pub decay_factor: Option<f32>,
    /// Decay idle window in seconds.
    pub decay_window_secs: Option<u64>,
    /// Merge threshold.
    pub merge_threshold: Option<f32>,
    /// Eviction threshold.
    pub eviction_threshold: Option<f32>,
    /// Minimum retention age in seconds.
    pub min_retention_secs: Option<u64>,
    /// Audit retention window in seconds.
    pub audit_retention_secs: Option<u64>,
    /// Survivor policy name.
    pub survivor_policy: Option<String>,
    /// Scheduler interval in seconds.
    pub interval_secs: Option<u64>,
}

impl MnemoConfig {
    /// Parses configuration from TOML content, starting from defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the TOML is malformed, a
    /// threshold is out of range, or the survivor policy is unknown.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| Error::InvalidArgument(format!("config parse error: {e}")))?;
        Self::default().merged_with(&file)
    }

    /// Applies a parsed config file over this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] on out-of-range values.
    pub fn merged_with(mut self, file: &ConfigFile) -> Result<Self> {
        if let Some(ref ingest) = file.ingest {
            if let Some(v) = ingest.initial_salience {
                self.ingest.initial_salience = unit_range("ingest.initial_salience", v)?;
            }
            if let Some(v) = ingest.dedup_exact {
                self.ingest.dedup_exact = v;
            }
            if let Some(v) = ingest.adjacency_weight {
                self.ingest.adjacency_weight = edge_weight("ingest.adjacency_weight", v)?;
            }
        }
        if let Some(ref retrieval) = file.retrieval {
            if let Some(v) = retrieval.min_score {
                self.retrieval.min_score = unit_range("retrieval.min_score", v)?;
            }
            if let Some(v) = retrieval.min_path_weight {
                self.retrieval.min_path_weight = unit_range("retrieval.min_path_weight", v)?;
            }
            if let Some(v) = retrieval.reinforcement {
                self.retrieval.reinforcement = unit_range("retrieval.reinforcement", v)?;
            }
            if let Some(v) = retrieval.max_k {
                self.retrieval.max_k = v;
            }
        }
        if let Some(ref cons) = file.consolidation {
            if let Some(v) = cons.decay_factor {
                self.consolidation.decay_factor = unit_range("consolidation.decay_factor", v)?;
            }
            if let Some(v) = cons.decay_window_secs {
                self.consolidation.decay_window_secs = v;
            }
            if let Some(v) = cons.merge_threshold {
                self.consolidation.merge_threshold = unit_range("consolidation.merge_threshold", v)?;
            }
            if let Some(v) = cons.eviction_threshold {
                self.consolidation.eviction_threshold =
                    unit_range("consolidation.eviction_threshold", v)?;
            }
            if let Some(v) = cons.min_retention_secs {
                self.consolidation.min_retention_secs = v;
            }
            if let Some(v) = cons.audit_retention_secs {
                self.consolidation.audit_retention_secs = v;
            }
            if let Some(ref name) = cons.survivor_policy {
                self.consolidation.survivor_policy = SurvivorPolicy::parse(name).ok_or_else(|| {
                    Error::InvalidArgument(format!("unknown survivor policy: {name}"))
                })?;
            }
            if let Some(v) = cons.interval_secs {
                self.consolidation.interval_secs = v;
            }
        }
        Ok(self)
    }

    /// Applies `MNEMO_`-prefixed environment variable overrides.
    ///
    /// Unparseable values are ignored rather than fatal, matching the
    /// behavior of the config loaders elsewhere in the stack.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("MNEMO_DECAY_FACTOR")
            && let Ok(v) = val.parse::<f32>()
            && (0.0..=1.0).contains(&v)
        {
            self.consolidation.decay_factor = v;
        }
        if let Ok(val) = std::env::var("MNEMO_MERGE_THRESHOLD")
            && let Ok(v) = val.parse::<f32>()
            && (0.0..=1.0).contains(&v)
        {
            self.consolidation.merge_threshold = v;
        }
        if let Ok(val) = std::env::var("MNEMO_EVICTION_THRESHOLD")
            && let Ok(v) = val.parse::<f32>()
            && (0.0..=1.0).contains(&v)
        {
            self.consolidation.eviction_threshold = v;
        }
        if let Ok(val) = std::env::var("MNEMO_CONSOLIDATION_INTERVAL_SECS")
            && let Ok(v) = val.parse()
        {
            self.consolidation.interval_secs = v;
        }
        if let Ok(val) = std::env::var("MNEMO_REINFORCEMENT")
            && let Ok(v) = val.parse::<f32>()
            && (0.0..=1.0).contains(&v)
        {
            self.retrieval.reinforcement = v;
        }
        self
    }
}

/// Validates a value in `[0.0, 1.0]`.
fn unit_range(field: &str, value: f32) -> Result<f32> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidArgument(format!(
            "{field} must be between 0.0 and 1.0, got {value}"
        )))
    }
}

/// Validates an edge weight in `(0.0, 1.0]`.
fn edge_weight(field: &str, value: f32) -> Result<f32> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(Error::InvalidArgument(format!(
            "{field} must be in (0.0, 1.0], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = MnemoConfig::default();
        assert!((config.consolidation.decay_factor - 0.95).abs() < f32::EPSILON);
        assert!((config.consolidation.merge_threshold - 0.97).abs() < f32::EPSILON);
        assert!((config.consolidation.eviction_threshold - 0.05).abs() < f32::EPSILON);
        assert!((config.retrieval.reinforcement - 0.05).abs() < f32::EPSILON);
        assert_eq!(config.consolidation.survivor_policy, SurvivorPolicy::Salience);
    }

    #[test]
    fn test_from_toml_overrides_sections() {
        let toml = r#"
            [consolidation]
            decay_factor = 0.9
            merge_threshold = 0.99
            survivor_policy = "salience-then-recency"

            [retrieval]
            min_score = 0.3
        "#;
        let config = MnemoConfig::from_toml_str(toml);
        let Ok(config) = config else {
            assert!(config.is_ok());
            return;
        };
        assert!((config.consolidation.decay_factor - 0.9).abs() < f32::EPSILON);
        assert!((config.consolidation.merge_threshold - 0.99).abs() < f32::EPSILON);
        assert_eq!(
            config.consolidation.survivor_policy,
            SurvivorPolicy::SalienceThenRecency
        );
        assert!((config.retrieval.min_score - 0.3).abs() < f32::EPSILON);
        // Untouched sections keep their defaults.
        assert!((config.ingest.initial_salience - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let toml = "[consolidation]\ndecay_factor = 1.5\n";
        assert!(MnemoConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_unknown_survivor_policy_rejected() {
        let toml = "[consolidation]\nsurvivor_policy = \"coin-flip\"\n";
        assert!(MnemoConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(MnemoConfig::from_toml_str("not [valid").is_err());
    }
}
