//! Retention policy for committed historical versions.

use serde::{Deserialize, Serialize};

/// Strategy deciding which committed versions a multistore retains.
///
/// Exactly one strategy is bound to a multistore at construction and applied
/// uniformly to every sub-store after each commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruningStrategy {
    /// Retain every committed version.
    Nothing,
    /// Retain only the latest committed version.
    Everything,
    /// Retain a sliding window of recent versions plus periodic checkpoints,
    /// enough to serve state-sync snapshots.
    Syncable { keep_recent: u64, keep_every: u64 },
}

impl PruningStrategy {
    pub const DEFAULT_KEEP_RECENT: u64 = 100;
    pub const DEFAULT_KEEP_EVERY: u64 = 10_000;

    /// `Syncable` with the default window and checkpoint interval.
    pub fn syncable_default() -> Self {
        Self::Syncable {
            keep_recent: Self::DEFAULT_KEEP_RECENT,
            keep_every: Self::DEFAULT_KEEP_EVERY,
        }
    }

    /// Resolve a strategy selector string.
    ///
    /// Unrecognized selectors fall back to the default `Syncable` strategy so
    /// that state-sync data stays available even under a misconfiguration.
    pub fn from_selector(selector: &str) -> Self {
        match selector {
            "nothing" => Self::Nothing,
            "everything" => Self::Everything,
            "syncable" => Self::syncable_default(),
            other => {
                tracing::warn!(
                    selector = other,
                    "unknown pruning strategy, defaulting to syncable"
                );
                Self::syncable_default()
            }
        }
    }

    /// Pure retention predicate: should `candidate` still be kept once
    /// `current` is the latest committed version?
    pub fn retains(&self, candidate: u64, current: u64) -> bool {
        match *self {
            Self::Nothing => true,
            Self::Everything => candidate == current,
            Self::Syncable {
                keep_recent,
                keep_every,
            } => {
                let in_window = candidate + keep_recent > current;
                let checkpoint = keep_every > 0 && candidate % keep_every == 0;
                in_window || checkpoint
            }
        }
    }
}

impl Default for PruningStrategy {
    fn default() -> Self {
        Self::syncable_default()
    }
}

/// Deployment-facing pruning configuration, deserializable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruningConfig {
    /// Strategy selector: `nothing`, `everything` or `syncable`.
    #[serde(default = "default_strategy_selector")]
    pub strategy: String,
    /// Sliding window size for `syncable`.
    #[serde(default = "default_keep_recent")]
    pub keep_recent: u64,
    /// Checkpoint interval for `syncable`; `0` disables checkpoints.
    #[serde(default = "default_keep_every")]
    pub keep_every: u64,
}

fn default_strategy_selector() -> String {
    "syncable".to_string()
}

fn default_keep_recent() -> u64 {
    PruningStrategy::DEFAULT_KEEP_RECENT
}

fn default_keep_every() -> u64 {
    PruningStrategy::DEFAULT_KEEP_EVERY
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy_selector(),
            keep_recent: default_keep_recent(),
            keep_every: default_keep_every(),
        }
    }
}

impl PruningConfig {
    /// Parse a `[pruning]`-style TOML fragment.
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Resolve the configured strategy, applying the tuned window for
    /// `syncable` and the default fallback for unknown selectors.
    pub fn strategy(&self) -> PruningStrategy {
        match PruningStrategy::from_selector(&self.strategy) {
            PruningStrategy::Syncable { .. } => PruningStrategy::Syncable {
                keep_recent: self.keep_recent,
                keep_every: self.keep_every,
            },
            fixed => fixed,
        }
    }
}
