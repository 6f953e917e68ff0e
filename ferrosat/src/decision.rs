//! Decision heuristics.
pub mod vsids;

use partial_ref::{partial, PartialRef};

use crate::config::PolarityMode;
use crate::context::{AssignmentP, Context, ImplGraphP, ScheduleP, SolverConfigP, TrailP, VsidsP};
use crate::lit::{Lit, Var};
use crate::prop::{enqueue_assignment, Reason};

/// Make a variable available for future decisions again.
///
/// Called when a variable becomes unassigned by backtracking.
pub fn make_available(mut ctx: partial!(Context, mut VsidsP), var: Var) {
    ctx.part_mut(VsidsP).make_available(var);
}

/// Make a newly allocated solver variable decidable.
///
/// `available` is false when the variable already has a known unit value, in which case it
/// must not participate in decisions until that value is retracted.
pub fn initialize_var(mut ctx: partial!(Context, mut VsidsP), var: Var, available: bool) {
    if available {
        ctx.part_mut(VsidsP).make_available(var);
    }
}

/// Remove a variable from future decisions.
///
/// Called when a solver variable is released, e.g. because its global variable was eliminated
/// or substituted by an equivalent literal.
pub fn remove_var(mut ctx: partial!(Context, mut VsidsP), var: Var) {
    ctx.part_mut(VsidsP).remove(var);
}

/// A small, fast, non-cryptographic pseudo-random generator.
///
/// Used only to pick occasional random decisions and random polarities, the same role
/// CryptoMiniSat's internal RNG plays for `random_var_freq`. Reseeded from the trail length each
/// decision, so a solve stays deterministic given the same sequence of prior decisions.
fn next_random(state: &mut u64) -> u64 {
    // xorshift64*
    let mut x = *state;
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    *state = x;
    x.wrapping_mul(0x2545_f491_4f6c_dd1d)
}

fn random_unit(state: &mut u64) -> f32 {
    (next_random(state) >> 40) as f32 / (1u32 << 24) as f32
}

fn random_bool(state: &mut u64) -> bool {
    next_random(state) & 1 == 1
}

fn random_below(state: &mut u64, bound: usize) -> usize {
    (next_random(state) % bound as u64) as usize
}

/// Pick an initial polarity for a variable that has no saved phase yet.
fn default_polarity(mode: PolarityMode, rng: &mut u64) -> bool {
    match mode {
        PolarityMode::True => true,
        PolarityMode::False | PolarityMode::Saved => false,
        PolarityMode::Random => random_bool(rng),
        // Without a cheap Jeroslow-Wang tally at hand, fall back to the same default as `Saved`.
        PolarityMode::Auto => false,
    }
}

/// Make a decision and enqueue it.
///
/// Picks an unassigned variable using VSIDS, unless a random decision is due per
/// [`crate::config::SolverConfig::random_var_freq`], in which case a uniformly random unassigned
/// variable is picked instead. The polarity used is the variable's last saved phase, which
/// defaults to the polarity picked by [`crate::config::SolverConfig::polarity_mode`] for a
/// variable that was never assigned before.
///
/// Returns `false` if no decision was made because all variables are assigned.
pub fn make_decision(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut ScheduleP,
        mut TrailP,
        mut VsidsP,
        SolverConfigP,
    ),
) -> bool {
    let mut rng_state = (ctx.part(TrailP).trail().len() as u64).wrapping_add(0x9e37_79b9_7f4a_7c15);

    let random_var_freq = ctx.part(SolverConfigP).random_var_freq;
    let polarity_mode = ctx.part(SolverConfigP).polarity_mode;

    let decision_var = if random_var_freq > 0.0 && random_unit(&mut rng_state) < random_var_freq {
        random_unassigned_var(ctx.part(AssignmentP).assignment(), &mut rng_state)
            .or_else(|| next_vsids_var(ctx.borrow()))
    } else {
        next_vsids_var(ctx.borrow())
    };

    let decision_var = match decision_var {
        Some(var) => var,
        None => return false,
    };

    let polarity = if polarity_mode == PolarityMode::Saved {
        ctx.part(AssignmentP).last_var_value(decision_var)
    } else {
        default_polarity(polarity_mode, &mut rng_state)
    };

    let flipped = polarity != ctx.part(AssignmentP).last_var_value(decision_var);
    ctx.part_mut(ScheduleP).record_decision_agility(flipped);

    let decision = Lit::from_var(decision_var, polarity);

    ctx.part_mut(TrailP).new_decision_level();

    enqueue_assignment(ctx.borrow(), decision, Reason::Unit);

    true
}

/// Pop the highest-activity unassigned variable from the VSIDS heap, discarding stale entries for
/// variables that got assigned since they were last made available.
fn next_vsids_var(mut ctx: partial!(Context, AssignmentP, mut VsidsP)) -> Option<Var> {
    loop {
        let var = ctx.part_mut(VsidsP).next()?;

        if ctx.part(AssignmentP).var_value(var).is_none() {
            return Some(var);
        }
    }
}

/// Pick a uniformly random unassigned variable, or `None` if all variables are assigned.
fn random_unassigned_var(assignment: &[Option<bool>], rng: &mut u64) -> Option<Var> {
    let unassigned: Vec<Var> = assignment
        .iter()
        .enumerate()
        .filter(|&(_, value)| value.is_none())
        .map(|(index, _)| Var::from_index(index))
        .collect();

    if unassigned.is_empty() {
        None
    } else {
        Some(unassigned[random_below(rng, unassigned.len())])
    }
}
