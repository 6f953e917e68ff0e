//! Scheduling of processing and solving steps.
use log::info;

use partial_ref::{partial, PartialRef};

use crate::cdcl::conflict_step;
use crate::clause::reduce::{reduce_locals, reduce_mids};
use crate::clause::Tier;
use crate::config::{RestartPolicy, SolverConfig};
use crate::context::{
    AnalyzeConflictP, AssignmentP, BinaryClausesP, ClauseActivityP, ClauseAllocP, ClauseDbP,
    Context, ImplGraphP, IncrementalP, ProofP, ScheduleP, SolverConfigP, SolverStateP, TmpDataP,
    TrailP, VsidsP, WatchlistsP,
};
use crate::prop::restart;
use crate::state::SatState;

mod luby;

use luby::LubySequence;

/// Exponential moving average, used to approximate Glucose's windowed glue averages without
/// keeping the full window of samples around.
#[derive(Default)]
struct MovingAverage {
    value: f32,
    initialized: bool,
}

impl MovingAverage {
    fn update(&mut self, sample: f32, window: usize) {
        if !self.initialized {
            self.value = sample;
            self.initialized = true;
            return;
        }
        let alpha = 2.0 / (window as f32 + 1.0);
        self.value += (sample - self.value) * alpha;
    }

    fn get(&self) -> f32 {
        self.value
    }
}

/// Margin `RestartPolicy::Glue` requires the short-term glue average to exceed the long-term one
/// by before a restart is worthwhile, mirroring Glucose's `K` restart constant.
const GLUE_RESTART_MARGIN: f32 = 0.8;

/// Agility below which `RestartPolicy::Agility` lets a due restart through. Above it the search
/// is still exploring fresh territory and a restart would just discard that progress.
const AGILITY_RESTART_THRESHOLD: f32 = 0.25;

/// Decay applied to the agility estimate on every decision, chosen so that it reacts within a few
/// hundred decisions, the same order of magnitude CryptoMiniSat uses.
const AGILITY_DECAY: f32 = 0.9999;

/// Scheduling of processing and solving steps.
#[derive(Default)]
pub struct Schedule {
    conflicts: u64,
    next_restart: u64,
    restart_interval: u64,
    conflicts_since_restart: u64,
    restarts: u64,
    luby: LubySequence,
    glue_short: MovingAverage,
    glue_long: MovingAverage,
    agility: f32,
}

impl Schedule {
    /// Number of conflicts handled by the search so far.
    pub fn conflicts(&self) -> u64 {
        self.conflicts
    }

    /// Fold a newly learned clause's glue level into the short and long term moving averages.
    pub fn record_conflict_glue(&mut self, glue: u32, short_window: usize, long_window: usize) {
        self.glue_short.update(glue as f32, short_window);
        self.glue_long.update(glue as f32, long_window);
    }

    /// Fold a decision's agreement with the variable's saved phase into the agility estimate.
    ///
    /// `flipped` is whether the decided polarity differs from the saved one. A decision that
    /// follows the saved phase nudges agility down, one that overrides it nudges it up.
    pub fn record_decision_agility(&mut self, flipped: bool) {
        self.agility = self.agility * AGILITY_DECAY + if flipped { 1.0 - AGILITY_DECAY } else { 0.0 };
    }
}

/// A decrementing counter of simplified propagation-equivalent work units.
///
/// Probing, elimination and vivification all charge this for every literal they touch so that
/// a single inprocessing episode can be bounded without needing a wall-clock timer. The unit
/// doesn't need to be exact, it just needs to be roughly proportional across passes so that
/// `probe_budget`/`elim_budget`/`vivify_budget` are comparable knobs.
pub struct Budget {
    remaining: i64,
}

impl Budget {
    /// A fresh budget with `amount` bogo-props available.
    pub fn new(amount: u64) -> Budget {
        Budget {
            remaining: amount as i64,
        }
    }

    /// Charge `amount` bogo-props against the budget.
    pub fn charge(&mut self, amount: u64) {
        self.remaining -= amount as i64;
    }

    /// Whether the budget has been exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.remaining <= 0
    }
}

/// Outcome of a single budget-limited inprocessing pass.
///
/// Used so the orchestrator can decide whether re-running the same pass immediately is likely to
/// find more, or whether it should move on to the next technique.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every candidate was considered before the budget ran out.
    Complete,
    /// The budget ran out before every candidate was considered.
    Partial,
}

/// Whether a restart due per the interval counter should actually happen now, per policy.
fn restart_due(schedule: &Schedule, config: &SolverConfig) -> bool {
    if schedule.next_restart > schedule.conflicts {
        return false;
    }

    match config.restart_policy {
        RestartPolicy::Geometric => true,
        RestartPolicy::Glue => {
            schedule.conflicts_since_restart >= config.glue_history_short as u64
                && schedule.glue_short.get() > schedule.glue_long.get() * (1.0 / GLUE_RESTART_MARGIN)
        }
        RestartPolicy::Agility => schedule.agility < AGILITY_RESTART_THRESHOLD,
    }
}

/// Perform one step of the schedule.
pub fn schedule_step<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseActivityP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ProofP<'a>,
        mut ScheduleP,
        SolverConfigP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
    ),
) -> bool {
    if ctx.part(SolverStateP).sat_state != SatState::Unknown {
        return false;
    }

    // Run the step first, with the full context still intact: `conflict_step` reaches all the
    // way down to decision-making, which itself touches the schedule (for agility tracking), so
    // `ScheduleP`/`SolverConfigP` can't be split off of `ctx` until this call has returned.
    let glue = conflict_step(ctx.borrow());

    let (config, mut ctx) = ctx.split_part(SolverConfigP);
    let (schedule, mut ctx) = ctx.split_part_mut(ScheduleP);

    if schedule.restart_interval == 0 {
        schedule.restart_interval = config.restart_first;
        schedule.next_restart = config.restart_first;
    }

    if let Some(glue) = glue {
        schedule.record_conflict_glue(glue, config.glue_history_short, config.glue_history_long);
    }

    if schedule.conflicts > 0 && schedule.conflicts % 5000 == 0 {
        let db = ctx.part(ClauseDbP);
        let units = ctx.part(TrailP).top_level_assignment_count();
        info!(
            "confl: {}k rest: {} vars: {} bin: {} irred: {} core: {} mid: {} local: {}",
            schedule.conflicts / 1000,
            schedule.restarts,
            ctx.part(AssignmentP).assignment().len() - units,
            ctx.part(BinaryClausesP).count(),
            db.count_by_tier(Tier::Irred),
            db.count_by_tier(Tier::Core),
            db.count_by_tier(Tier::Mid),
            db.count_by_tier(Tier::Local)
        );
    }

    if restart_due(schedule, config) {
        restart(ctx.borrow());
        schedule.restarts += 1;
        schedule.conflicts_since_restart = 0;

        match config.restart_policy {
            RestartPolicy::Geometric => {
                schedule.next_restart +=
                    config.luby_restart_interval_scale * schedule.luby.advance();
            }
            RestartPolicy::Glue | RestartPolicy::Agility => {
                schedule.next_restart = schedule.conflicts + schedule.restart_interval;
                schedule.restart_interval =
                    (schedule.restart_interval as f32 * config.restart_inc) as u64;
            }
        }
    } else if schedule.next_restart <= schedule.conflicts {
        // Due but blocked by the policy's own condition (e.g. agility still high): check again
        // soon rather than waiting for the next geometric/glue interval.
        schedule.next_restart = schedule.conflicts + 50;
    }

    if config.reduce_locals_interval != 0
        && schedule.conflicts > 0
        && schedule.conflicts % config.reduce_locals_interval == 0
    {
        reduce_locals(ctx.borrow(), config.cl_clean_type);
    }
    if config.reduce_mids_interval != 0
        && schedule.conflicts > 0
        && schedule.conflicts % config.reduce_mids_interval == 0
    {
        reduce_mids(ctx.borrow());
    }

    schedule.conflicts += 1;
    schedule.conflicts_since_restart += 1;
    true
}
