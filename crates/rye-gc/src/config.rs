//! Configuration Module - Heap Tuning Parameters
//!
//! Manages all configuration parameters for the heap and collector.
//! Most parameters have sensible defaults; the environment variables the
//! original runtime consults are honored by [`GcConfig::from_env`].

use crate::error::{GcError, Result};

/// Occupancy fraction above which the node/vector budgets grow after a full
/// collection.
pub const GROW_FRAC: f64 = 0.70;

/// Occupancy fraction below which the budgets shrink after a full collection.
pub const SHRINK_FRAC: f64 = 0.30;

/// Minimum fraction of a budget that must be free when a collection finishes;
/// below this the collector retries at the next level.
pub const MIN_FREE_FRAC: f64 = 0.20;

/// Fraction of old-node capacity kept as slack when releasing empty pages.
pub const MAX_KEEP_FRAC: f64 = 0.50;

/// Level-1 and level-2 collection frequencies: a level-(k+1) collection runs
/// after this many collections of level k.
pub const LEVEL_FREQ: [u32; 2] = [20, 5];

/// Full collections during which the early-growth heuristic stays active.
pub const EARLY_GROWTH_GCS: u64 = 50;

/// Main configuration for the rye heap
///
/// Stores all parameters affecting allocation and collection behavior.
///
/// # Examples
///
/// ```rust
/// use rye_gc::GcConfig;
///
/// // Use default configuration
/// let config = GcConfig::default();
///
/// // Small heap for tests
/// let config = GcConfig {
///     node_budget: 20_000,
///     vector_budget: 100_000,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Initial node budget (cells of any kind)
    ///
    /// The collector is triggered when the number of nodes in use reaches
    /// the current budget; the budget itself is adjusted after full
    /// collections between `node_budget` and `max_node_budget`.
    pub node_budget: usize,

    /// Hard limit for node budget growth
    pub max_node_budget: usize,

    /// Initial vector budget in 8-byte vector units
    pub vector_budget: usize,

    /// Hard limit for vector budget growth
    pub max_vector_budget: usize,

    /// Maximum length accepted for a single vector
    pub max_vector_length: usize,

    /// Additive node-budget growth per adjustment
    pub node_grow_incr_min: usize,

    /// Multiplicative node-budget growth per adjustment
    pub node_grow_incr_frac: f64,

    /// Additive vector-budget growth per adjustment
    pub vector_grow_incr_min: usize,

    /// Multiplicative vector-budget growth per adjustment
    pub vector_grow_incr_frac: f64,

    /// Maintain reference counts on slot stores
    pub track_refcounts: bool,

    /// Run ready finalizers as soon as a collection finishes
    pub immediate_finalizers: bool,

    /// Rebuild per-class free lists in address order after a full collection
    pub sort_free_lists: bool,

    /// Abort on internal collector errors instead of logging and continuing
    pub fail_on_error: bool,

    /// Keep the preserve list in a hashed index for near-constant deletion
    pub hash_precious: bool,

    /// Never release empty pages back to the allocator (torture aid)
    pub inhibit_page_release: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            node_budget: 350_000,
            max_node_budget: usize::MAX / 2,
            vector_budget: 8_000_000,
            max_vector_budget: usize::MAX / 2,
            max_vector_length: 1 << 52,
            node_grow_incr_min: 40_000,
            node_grow_incr_frac: 0.2,
            vector_grow_incr_min: 80_000,
            vector_grow_incr_frac: 0.2,
            track_refcounts: true,
            immediate_finalizers: true,
            sort_free_lists: true,
            fail_on_error: false,
            hash_precious: false,
            inhibit_page_release: false,
        }
    }
}

impl GcConfig {
    /// Build a configuration from the process environment
    ///
    /// Honors the knobs the original runtime reads at startup:
    ///
    /// - `R_GC_MEM_GROW` - growth presets `0..=3` (larger grows faster)
    /// - `R_GC_GROWINCRFRAC` - both growth increment fractions
    /// - `R_GC_NGROWINCRFRAC` / `R_GC_VGROWINCRFRAC` - per-budget overrides
    /// - `_R_GC_FAIL_ON_ERROR_` - abort on internal collector errors
    /// - `R_HASH_PRECIOUS` - hashed preserve list
    /// - `R_GCTORTURE_INHIBIT_RELEASE` - keep empty pages mapped
    ///
    /// Unparsable values are ignored with a log record, matching the
    /// original's forgiving startup behavior.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(preset) = read_env_f64("R_GC_MEM_GROW") {
            let frac = match preset as i64 {
                1 => Some(0.3),
                2 => Some(0.4),
                3 => Some(0.5),
                _ => None,
            };
            if let Some(frac) = frac {
                config.node_grow_incr_frac = frac;
                config.vector_grow_incr_frac = frac;
            }
        }
        if let Some(frac) = read_env_frac("R_GC_GROWINCRFRAC") {
            config.node_grow_incr_frac = frac;
            config.vector_grow_incr_frac = frac;
        }
        if let Some(frac) = read_env_frac("R_GC_NGROWINCRFRAC") {
            config.node_grow_incr_frac = frac;
        }
        if let Some(frac) = read_env_frac("R_GC_VGROWINCRFRAC") {
            config.vector_grow_incr_frac = frac;
        }
        if env_flag("_R_GC_FAIL_ON_ERROR_") {
            config.fail_on_error = true;
        }
        if env_flag("R_HASH_PRECIOUS") {
            config.hash_precious = true;
        }
        if env_flag("R_GCTORTURE_INHIBIT_RELEASE") {
            config.inhibit_page_release = true;
        }

        config
    }

    /// Torture parameters from the environment: `(gap, wait)`
    ///
    /// `R_GCTORTURE` enables collection every `gap` allocations once
    /// `R_GCTORTURE_WAIT` allocations have happened.
    pub fn torture_from_env() -> Option<(usize, usize)> {
        let gap = read_env_f64("R_GCTORTURE")? as usize;
        if gap == 0 {
            return None;
        }
        let wait = read_env_f64("R_GCTORTURE_WAIT")
            .map(|w| w as usize)
            .unwrap_or(gap);
        Some((gap, wait))
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    /// Returns `Configuration` if any limit is inconsistent.
    pub fn validate(&self) -> Result<()> {
        if self.node_budget == 0 {
            return Err(GcError::Configuration(
                "node_budget must be positive".to_string(),
            ));
        }
        if self.node_budget > self.max_node_budget {
            return Err(GcError::Configuration(format!(
                "node_budget {} exceeds max_node_budget {}",
                self.node_budget, self.max_node_budget
            )));
        }
        if self.vector_budget > self.max_vector_budget {
            return Err(GcError::Configuration(format!(
                "vector_budget {} exceeds max_vector_budget {}",
                self.vector_budget, self.max_vector_budget
            )));
        }
        for (name, frac) in [
            ("node_grow_incr_frac", self.node_grow_incr_frac),
            ("vector_grow_incr_frac", self.vector_grow_incr_frac),
        ] {
            if !(0.0..=1.0).contains(&frac) {
                return Err(GcError::Configuration(format!(
                    "{} must lie in [0, 1], got {}",
                    name, frac
                )));
            }
        }
        Ok(())
    }
}

fn read_env_f64(name: &str) -> Option<f64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            log::warn!("ignoring unparsable {}={:?}", name, raw);
            None
        }
    }
}

fn read_env_frac(name: &str) -> Option<f64> {
    let v = read_env_f64(name)?;
    (0.0..=1.0).contains(&v).then_some(v)
}

fn env_flag(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => {
            let v = v.trim();
            !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false")
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GcConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_node_budget_rejected() {
        let config = GcConfig {
            node_budget: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_budget_ordering_enforced() {
        let config = GcConfig {
            node_budget: 100,
            max_node_budget: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_grow_frac_range_enforced() {
        let config = GcConfig {
            node_grow_incr_frac: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
