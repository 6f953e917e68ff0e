//! Solver configuration.
use ferrosat_internal_macros::DocDefault;

/// Restart scheduling strategy, selected by [`SolverConfig::restart_policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Geometrically growing intervals, as in early MiniSat.
    Geometric,
    /// Glucose-style restarts driven by a moving average of learnt clause glue levels.
    Glue,
    /// CryptoMiniSat-style restarts gated on the assignment agility.
    Agility,
}

/// Initial polarity used for a variable that has no saved phase yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolarityMode {
    /// Always decide positive.
    True,
    /// Always decide negative.
    False,
    /// Decide uniformly at random.
    Random,
    /// Use the last assigned phase, defaulting to negative the first time.
    Saved,
    /// Use a precomputed default polarity from Jeroslow-Wang-style tallying.
    Auto,
}

/// Metric used to decide which Local tier clauses survive a reduction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseCleanType {
    /// Keep clauses with the lowest glue level.
    Glue,
    /// Keep the shortest clauses.
    Size,
    /// Keep clauses with the highest propagation/conflict participation count.
    PropConfl,
}

/// Configurable parameters used during solving.
#[derive(DocDefault)]
pub struct SolverConfig {
    /// Multiplicative decay for the VSIDS decision heuristic, i.e. `var_decay`. (Default: 0.95)
    pub vsids_decay: f32,

    /// Multiplicative decay for clause activities. (Default: 0.999)
    pub clause_activity_decay: f32,

    /// Number of conflicts between local clause reductions. (Default: 15000)
    pub reduce_locals_interval: u64,

    /// Number of conflicts between mid clause reductions. (Default: 10000)
    pub reduce_mids_interval: u64,

    /// Scaling factor for luby sequence based restarts (number of conflicts), used when
    /// `restart_policy` is [`RestartPolicy::Geometric`]. (Default: 128)
    pub luby_restart_interval_scale: u64,

    /// Restart scheduling strategy. (Default: RestartPolicy::Glue)
    pub restart_policy: RestartPolicy,

    /// First restart interval in conflicts, for the geometric policy. (Default: 100)
    pub restart_first: u64,

    /// Multiplier applied to the restart interval after each geometric restart. (Default: 2.0)
    pub restart_inc: f32,

    /// Window size for the short-term glue moving average. (Default: 50)
    pub glue_history_short: usize,

    /// Window size for the long-term glue moving average. (Default: 5000)
    pub glue_history_long: usize,

    /// Probability that a decision is made uniformly at random instead of following VSIDS.
    /// (Default: 0.02)
    pub random_var_freq: f32,

    /// Initial polarity for variables without a saved phase. (Default: PolarityMode::Saved)
    pub polarity_mode: PolarityMode,

    /// Enable failed-literal probing with hyper-binary resolution. (Default: true)
    pub do_probe: bool,

    /// Enable bounded-resolution variable elimination. (Default: true)
    pub do_elim: bool,

    /// Enable clause vivification. (Default: true)
    pub do_vivify: bool,

    /// Enable SCC-based equivalent-literal substitution. (Default: true)
    pub do_scc: bool,

    /// Bogo-prop budget for a single probing pass. (Default: 2_000_000)
    pub probe_budget: u64,

    /// Bogo-prop budget for a single variable elimination pass. (Default: 4_000_000)
    pub elim_budget: u64,

    /// Bogo-prop budget for a single vivification pass. (Default: 2_000_000)
    pub vivify_budget: u64,

    /// Maximum number of variables eliminated in a single pass, 0 for unlimited.
    /// (Default: 0)
    pub elim_var_limit: usize,

    /// Metric used when reducing the Local clause tier. (Default: ClauseCleanType::Glue)
    pub cl_clean_type: ClauseCleanType,

    /// Enable the transitive binary-implication cache used by probing and vivification.
    /// (Default: true)
    pub cache_on: bool,

    /// Skip caching transitive implications for literals with more than this many direct binary
    /// implications. (Default: 10)
    pub cache_cutoff: usize,
}

/// A partial update to a [`SolverConfig`].
///
/// Every field is optional; unset fields leave the current configuration unchanged. Passed to
/// [`crate::solver::Solver::set_configuration`].
#[derive(Default)]
pub struct SolverConfigUpdate {
    pub vsids_decay: Option<f32>,
    pub clause_activity_decay: Option<f32>,
    pub reduce_locals_interval: Option<u64>,
    pub reduce_mids_interval: Option<u64>,
    pub luby_restart_interval_scale: Option<u64>,
    pub restart_policy: Option<RestartPolicy>,
    pub restart_first: Option<u64>,
    pub restart_inc: Option<f32>,
    pub glue_history_short: Option<usize>,
    pub glue_history_long: Option<usize>,
    pub random_var_freq: Option<f32>,
    pub polarity_mode: Option<PolarityMode>,
    pub do_probe: Option<bool>,
    pub do_elim: Option<bool>,
    pub do_vivify: Option<bool>,
    pub do_scc: Option<bool>,
    pub probe_budget: Option<u64>,
    pub elim_budget: Option<u64>,
    pub vivify_budget: Option<u64>,
    pub elim_var_limit: Option<usize>,
    pub cl_clean_type: Option<ClauseCleanType>,
    pub cache_on: Option<bool>,
    pub cache_cutoff: Option<usize>,
}

impl SolverConfigUpdate {
    pub fn new() -> SolverConfigUpdate {
        SolverConfigUpdate::default()
    }

    /// Apply this update to a configuration in place.
    pub fn apply_to(&self, config: &mut SolverConfig) {
        macro_rules! apply {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    config.$field = value;
                })*
            };
        }

        apply!(
            vsids_decay,
            clause_activity_decay,
            reduce_locals_interval,
            reduce_mids_interval,
            luby_restart_interval_scale,
            restart_policy,
            restart_first,
            restart_inc,
            glue_history_short,
            glue_history_long,
            random_var_freq,
            polarity_mode,
            do_probe,
            do_elim,
            do_vivify,
            do_scc,
            probe_budget,
            elim_budget,
            vivify_budget,
            elim_var_limit,
            cl_clean_type,
            cache_on,
            cache_cutoff,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = SolverConfig::default();
        assert!(config.vsids_decay > 0.0 && config.vsids_decay < 1.0);
        assert!(config.do_probe);
        assert_eq!(config.restart_policy, RestartPolicy::Glue);
    }

    #[test]
    fn update_overrides_only_set_fields() {
        let mut config = SolverConfig::default();
        let original_decay = config.clause_activity_decay;

        let mut update = SolverConfigUpdate::new();
        update.do_probe = Some(false);
        update.apply_to(&mut config);

        assert!(!config.do_probe);
        assert_eq!(config.clause_activity_decay, original_decay);
    }
}
