//! Top level search/simplify orchestration.
//!
//! Grounded on CryptoMiniSat's `Solver::solve`: an always-run simplification episode before the
//! first decision is made, then alternating bounded search episodes and simplification episodes
//! for as long as the search stays unresolved. Each search episode runs longer than the last, the
//! same geometric growth CryptoMiniSat applies to the conflict budget between simplification
//! rounds, so that simplification's share of total work shrinks as a hard instance gets deeper.

use partial_ref::{partial, PartialRef};

use crate::context::{parts::*, Context};
use crate::elim::eliminate_variables;
use crate::probe::probe_variables;
use crate::scc::find_equivalences;
use crate::schedule::{schedule_step, Budget};
use crate::state::SatState;
use crate::vivify::vivify_clauses;

/// Length in conflicts of the first search episode, before any simplification has run.
const INITIAL_SEARCH_EPISODE_CONFLICTS: u64 = 5_000;

/// Growth factor applied to the search episode length after each simplification episode.
const SEARCH_EPISODE_GROWTH: f32 = 1.5;

/// Run one simplification episode: equivalent literal substitution, failed-literal probing,
/// variable elimination and vivification, each gated by its own `do_*` flag and bounded by its
/// own budget.
///
/// Bails out early as soon as a pass decides the formula, since there is no point running the
/// remaining passes on a formula that is already known sat or unsat.
fn simplify_episode<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut EliminationLogP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ProofP<'a>,
        SolverConfigP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut TransitiveCacheP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
) {
    if ctx.part(SolverConfigP).do_scc {
        find_equivalences(ctx.borrow());
        if ctx.part(SolverStateP).sat_state != SatState::Unknown {
            return;
        }
    }

    if ctx.part(SolverConfigP).do_probe {
        let mut budget = Budget::new(ctx.part(SolverConfigP).probe_budget);
        probe_variables(ctx.borrow(), &mut budget);
        if ctx.part(SolverStateP).sat_state != SatState::Unknown {
            return;
        }
    }

    if ctx.part(SolverConfigP).do_elim {
        let mut budget = Budget::new(ctx.part(SolverConfigP).elim_budget);
        eliminate_variables(ctx.borrow(), &mut budget);
        if ctx.part(SolverStateP).sat_state != SatState::Unknown {
            return;
        }
    }

    if ctx.part(SolverConfigP).do_vivify {
        let mut budget = Budget::new(ctx.part(SolverConfigP).vivify_budget);
        vivify_clauses(ctx.borrow(), &mut budget);
    }
}

/// Drive the solver to a decided [`crate::state::SatState`], alternating bounded search episodes
/// with simplification episodes.
///
/// [`crate::schedule::schedule_step`] remains the inner loop for a single search episode; this is
/// only responsible for when to stop a search episode and hand control back to simplification.
pub fn run<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseActivityP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut EliminationLogP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ProofP<'a>,
        mut ScheduleP,
        SolverConfigP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut TransitiveCacheP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
) {
    run_simplify_episode(ctx.borrow());

    let mut episode_conflicts = INITIAL_SEARCH_EPISODE_CONFLICTS;

    while ctx.part(SolverStateP).sat_state == SatState::Unknown {
        let target = ctx.part(ScheduleP).conflicts() + episode_conflicts;

        while ctx.part(SolverStateP).sat_state == SatState::Unknown
            && ctx.part(ScheduleP).conflicts() < target
        {
            schedule_step(ctx.borrow());
        }

        if ctx.part(SolverStateP).sat_state == SatState::Unknown {
            run_simplify_episode(ctx.borrow());
            episode_conflicts = (episode_conflicts as f32 * SEARCH_EPISODE_GROWTH) as u64;
        }
    }
}

/// Run a simplification episode, restoring VSIDS activities and saved phases to their
/// pre-episode values afterwards.
///
/// Simplification passes bump activities and leave behind saved phases from probing's trial
/// assignments as a side effect of the work they do to shrink the formula, not because either
/// signal is meaningful for the search that resumes afterwards. Restoring them keeps a
/// simplification episode from perturbing the search heuristics, the same way CryptoMiniSat
/// resets `var_act_vsids`/polarities around its own simplification rounds.
fn run_simplify_episode<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut EliminationLogP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ProofP<'a>,
        SolverConfigP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut TransitiveCacheP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
) {
    let activity = ctx.part(VsidsP).snapshot_activity();
    let phases = ctx.part(AssignmentP).snapshot_phases();

    simplify_episode(ctx.borrow());

    ctx.part_mut(VsidsP).restore_activity(&activity);
    ctx.part_mut(AssignmentP).restore_phases(&phases);
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::test::{sat_formula, sgen_unsat_formula};

    use proptest::prelude::*;

    #[test]
    fn level_0_unsat() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let formula = cnf_formula![
            1, 2, 3;
            -1;
            1, -2;
            2, -3;
        ];

        set_var_count(ctx.borrow(), formula.var_count());

        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }

        run(ctx.borrow());

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), formula.var_count());

            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause);
            }

            run(ctx.borrow());

            prop_assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), formula.var_count());

            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause);
            }

            run(ctx.borrow());

            prop_assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Sat);

            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|&lit| ctx.part(AssignmentP).lit_is_true(lit)));
            }
        }
    }
}
