//! Failed-literal probing and hyper-binary resolution.
//!
//! Grounded on CryptoMiniSat's `Prober.cpp`: push a candidate literal to decision level 1 and run
//! a full propagation, recording for every level-1 assignment the single antecedent literal that
//! caused it (collapsing a clause with several antecedents to their deepest common ancestor). A
//! conflict refutes the candidate, or a weaker literal found via the same ancestor walk; a
//! fixpoint reached under both polarities of a variable with some other literal assigned the same
//! way both times ("bothprop") proves that literal unconditionally.
//!
//! Every long or ternary clause that propagates during a round is immediately backed by a direct
//! binary clause to its deepest common ancestor, the hyper-binary resolution step, so that a
//! repeat of the same propagation next time is cheaper and visible to [`crate::scc`].

use partial_ref::{partial, PartialRef};

use ferrosat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::load::load_clause;
use crate::proof::{self, ProofStep};
use crate::prop::{backtrack, enqueue_assignment, propagate, Conflict, Reason};
use crate::schedule::{Budget, PassOutcome};
use crate::state::SatState;

/// Bookkeeping for one literal forced during a single probing round.
///
/// Forms a tree rooted at the round's decision literal: every level-1 assignment points to the
/// antecedent literal that caused it. A propagation with more than one antecedent (a long or
/// ternary clause) is collapsed to their deepest common ancestor, which is what lets hyper-binary
/// resolution emit a direct edge for it.
pub struct AncestorInfo {
    parent: Option<Lit>,
    via_redundant_binary: bool,
}

/// Outcome of probing a single literal.
enum RoundOutcome {
    /// Propagation reached a fixpoint without conflict; carries every literal assigned at level 1,
    /// in trail order, for the caller's `bothprop` comparison.
    Fixpoint(Vec<Lit>),
    /// Propagation conflicted; carries the literal that must hold at level 0 to avoid it again.
    Conflict(Lit),
}

/// Run one probing round for `candidate`: decide it at a fresh level, propagate to fixpoint, and
/// undo the decision again before returning.
fn probe_round<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut ProofP<'a>,
        SolverConfigP,
        mut TrailP,
        mut TransitiveCacheP,
        VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    candidate: Lit,
    ancestors: &mut [Option<AncestorInfo>],
    budget: &mut Budget,
) -> RoundOutcome {
    let start = ctx.part(TrailP).trail().len();

    ctx.part_mut(TrailP).new_decision_level();
    enqueue_assignment(ctx.borrow(), candidate, Reason::Unit);
    ancestors[candidate.var().index()] = Some(AncestorInfo {
        parent: None,
        via_redundant_binary: false,
    });

    let result = propagate(ctx.borrow());

    let suffix: Vec<Lit> = ctx.part(TrailP).trail()[start + 1..].to_vec();
    budget.charge(suffix.len() as u64 + 1);

    for &lit in &suffix {
        record_ancestor(ctx.borrow(), ancestors, candidate, lit, budget);
    }

    if result.is_ok() {
        cache_round_result(ctx.borrow(), candidate, &suffix);
    }

    let outcome = match result {
        Ok(()) => RoundOutcome::Fixpoint(suffix),
        Err(conflict) => {
            let conflict_lits: Vec<Lit> = match conflict {
                Conflict::Binary(lits) => lits.to_vec(),
                Conflict::Long(cref) => ctx.part(ClauseAllocP).clause(cref).lits().to_vec(),
            };
            let true_antecedents: Vec<Lit> = conflict_lits.iter().map(|&lit| !lit).collect();
            let common = lca_of_true_lits(ctx.borrow(), ancestors, candidate, &true_antecedents);
            RoundOutcome::Conflict(!common)
        }
    };

    backtrack(ctx.borrow(), 0);

    outcome
}

/// Snapshot a fixpoint round's assigned literals into the transitive-implication cache.
///
/// Skips literals whose direct binary-clause degree already exceeds `cache_cutoff`: those are hit
/// often enough that the cached set would constantly go stale, so it is cheaper to re-derive them
/// by propagation each time than to keep refreshing a cache entry for them.
fn cache_round_result(
    mut ctx: partial!(Context, mut BinaryClausesP, SolverConfigP, mut TransitiveCacheP),
    candidate: Lit,
    suffix: &[Lit],
) {
    let config = ctx.part(SolverConfigP);
    if !config.cache_on {
        return;
    }
    let cutoff = config.cache_cutoff;
    if ctx.part(BinaryClausesP).implied(candidate).len() > cutoff {
        return;
    }
    ctx.part_mut(TransitiveCacheP)
        .set_implied(candidate, suffix.to_vec());
}

/// Record `lit`'s ancestor, emitting a hyper-binary resolvent if it was propagated by a clause
/// with more than one antecedent.
fn record_ancestor<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut BinaryClausesP,
        ClauseAllocP,
        ImplGraphP,
        mut ProofP<'a>,
        VariablesP,
    ),
    ancestors: &mut [Option<AncestorInfo>],
    decision: Lit,
    lit: Lit,
    budget: &mut Budget,
) {
    let reason = *ctx.part(ImplGraphP).reason(lit.var());

    let (parent, via_redundant_binary) = match reason {
        Reason::Unit => (Some(decision), false),
        Reason::Binary([false_lit]) => {
            let antecedent = !false_lit;
            let via_redundant = ancestors[antecedent.var().index()]
                .as_ref()
                .map_or(false, |info| info.via_redundant_binary);
            (Some(antecedent), via_redundant)
        }
        Reason::Long(cref) => {
            let false_lits: Vec<Lit> = ctx.part(ClauseAllocP).clause(cref).lits()[1..].to_vec();
            let true_antecedents: Vec<Lit> = false_lits.iter().map(|&l| !l).collect();

            budget.charge(true_antecedents.len() as u64);

            let common = lca_of_true_lits(ctx.borrow(), ancestors, decision, &true_antecedents);

            if common != lit {
                let new_binary = [!common, lit];
                proof::add_step(
                    ctx.borrow(),
                    false,
                    &ProofStep::AtClause {
                        redundant: true,
                        clause: &new_binary,
                        propagation_hashes: &[],
                    },
                );
                ctx.part_mut(BinaryClausesP).add_binary_clause(new_binary);
            }

            (Some(common), true)
        }
    };

    ancestors[lit.var().index()] = Some(AncestorInfo {
        parent,
        via_redundant_binary,
    });
}

/// The deepest common ancestor of `a` and `b` in the tree built by [`record_ancestor`].
///
/// Walks the shallower of the two up to the other's depth, then both up together, using the
/// trail position recorded in [`crate::prop::ImplGraph`] to tell which side is shallower without
/// having to walk the whole chain on every step.
fn lca_pair(
    ctx: partial!(Context, ImplGraphP),
    ancestors: &[Option<AncestorInfo>],
    mut a: Lit,
    mut b: Lit,
) -> Lit {
    loop {
        if a == b {
            return a;
        }

        let depth_a = ctx.part(ImplGraphP).depth(a.var());
        let depth_b = ctx.part(ImplGraphP).depth(b.var());

        if depth_a >= depth_b {
            a = ancestors[a.var().index()]
                .as_ref()
                .and_then(|info| info.parent)
                .expect("probing ancestor chain must reach a common root");
        } else {
            b = ancestors[b.var().index()]
                .as_ref()
                .and_then(|info| info.parent)
                .expect("probing ancestor chain must reach a common root");
        }
    }
}

/// The deepest common ancestor of every literal in `true_lits` that is part of the current
/// probing round's ancestor tree.
///
/// Literals already fixed before the round started (permanent level-0 assignments) have no entry
/// in `ancestors` and are ignored, since they hold regardless of the probed decision. Falls back
/// to `decision` itself if every literal turns out to be one of those.
fn lca_of_true_lits(
    ctx: partial!(Context, ImplGraphP),
    ancestors: &[Option<AncestorInfo>],
    decision: Lit,
    true_lits: &[Lit],
) -> Lit {
    let mut grounded = true_lits
        .iter()
        .cloned()
        .filter(|lit| ancestors[lit.var().index()].is_some());

    let mut result = match grounded.next() {
        Some(lit) => lit,
        None => return decision,
    };

    for lit in grounded {
        result = lca_pair(ctx.borrow(), ancestors, result, lit);
    }

    result
}

/// Assert `forced` as a level-0 unit, propagating it immediately.
///
/// Returns `Err` if this makes the formula unsatisfiable, after recording that in
/// [`crate::state::SolverState`].
fn assert_forced<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    forced: Lit,
) -> Result<(), ()> {
    load_clause(ctx.borrow(), &[forced]);

    if ctx.part(SolverStateP).sat_state == SatState::Unsat {
        return Err(());
    }

    if propagate(ctx.borrow()).is_err() {
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        return Err(());
    }

    Ok(())
}

/// Enqueue every literal assigned the same way by both `pos_assigned` and `neg_assigned` as a
/// level-0 unit.
fn bothprop<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    pos_assigned: &[Lit],
    neg_assigned: &[Lit],
) -> Result<(), ()> {
    let watermark = ctx.part(AssignmentP).assignment().len();
    let mut pos_value: Vec<Option<bool>> = vec![None; watermark];
    for &lit in pos_assigned {
        pos_value[lit.var().index()] = Some(lit.is_positive());
    }

    for &lit in neg_assigned {
        if pos_value[lit.var().index()] == Some(lit.is_positive()) {
            assert_forced(ctx.borrow(), lit)?;
        }
    }

    Ok(())
}

/// Probe `var`, trying both polarities and forcing whatever the ancestor walk proves along the
/// way.
fn probe_var<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ProofP<'a>,
        SolverConfigP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut TransitiveCacheP,
        VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    var: Var,
    ancestors: &mut [Option<AncestorInfo>],
    budget: &mut Budget,
) -> Result<(), ()> {
    if ctx.part(AssignmentP).var_value(var).is_some() {
        return Ok(());
    }

    for slot in ancestors.iter_mut() {
        *slot = None;
    }

    let pos_assigned = match probe_round(ctx.borrow(), var.positive(), ancestors, budget) {
        RoundOutcome::Conflict(forced) => return assert_forced(ctx.borrow(), forced),
        RoundOutcome::Fixpoint(assigned) => assigned,
    };

    if ctx.part(AssignmentP).var_value(var).is_some() {
        return Ok(());
    }

    for slot in ancestors.iter_mut() {
        *slot = None;
    }

    let neg_assigned = match probe_round(ctx.borrow(), var.negative(), ancestors, budget) {
        RoundOutcome::Conflict(forced) => return assert_forced(ctx.borrow(), forced),
        RoundOutcome::Fixpoint(assigned) => assigned,
    };

    bothprop(ctx.borrow(), &pos_assigned, &neg_assigned)
}

/// Run one probing episode over every currently unassigned variable, ordered by binary-clause
/// degree (CryptoMiniSat's stand-in for "pointed to by the binary cache" when no fuller
/// binary-implication cache is in use, see [`crate::vivify`]).
pub fn probe_variables<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ProofP<'a>,
        SolverConfigP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut TransitiveCacheP,
        VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    budget: &mut Budget,
) -> PassOutcome {
    let watermark = ctx.part(AssignmentP).assignment().len();
    if watermark == 0 {
        return PassOutcome::Complete;
    }

    ctx.part_mut(TransitiveCacheP).clear();

    let mut order: Vec<Var> = (0..watermark)
        .map(Var::from_index)
        .filter(|&var| ctx.part(AssignmentP).var_value(var).is_none())
        .collect();

    {
        let binary = ctx.part(BinaryClausesP);
        order.sort_by_key(|&var| {
            std::cmp::Reverse(
                binary.implied(var.positive()).len() + binary.implied(var.negative()).len(),
            )
        });
    }

    let mut ancestors: Vec<Option<AncestorInfo>> = vec![None; watermark];

    for var in order {
        if budget.is_exhausted() {
            return PassOutcome::Partial;
        }

        if ctx.part(AssignmentP).var_value(var).is_some() {
            continue;
        }

        if probe_var(ctx.borrow(), var, &mut ancestors, budget).is_err() {
            return PassOutcome::Complete;
        }
    }

    PassOutcome::Complete
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::variables;

    #[test]
    fn failed_literal_forces_negation_at_level_zero() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let mut solver_lits = vec![];

        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[Lit::from_dimacs(-1), Lit::from_dimacs(2)],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());
        let var1 = solver_lits[0].var();

        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[Lit::from_dimacs(-1), Lit::from_dimacs(-2)],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());

        let mut ancestors: Vec<Option<AncestorInfo>> =
            vec![None; ctx.part(AssignmentP).assignment().len()];
        let mut budget = Budget::new(1000);

        match probe_round(ctx.borrow(), var1.positive(), &mut ancestors, &mut budget) {
            RoundOutcome::Conflict(forced) => assert_eq!(forced, var1.negative()),
            RoundOutcome::Fixpoint(_) => panic!("expected a conflict"),
        }
    }

    #[test]
    fn hyper_binary_resolution_emits_direct_binary() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let mut solver_lits = vec![];

        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[Lit::from_dimacs(-1), Lit::from_dimacs(2)],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());
        let var1 = solver_lits[0].var();

        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[Lit::from_dimacs(-1), Lit::from_dimacs(3)],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());

        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[
                Lit::from_dimacs(-2),
                Lit::from_dimacs(-3),
                Lit::from_dimacs(4),
            ],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());
        let var4 = solver_lits[2].var();

        let mut ancestors: Vec<Option<AncestorInfo>> =
            vec![None; ctx.part(AssignmentP).assignment().len()];
        let mut budget = Budget::new(1000);

        match probe_round(ctx.borrow(), var1.positive(), &mut ancestors, &mut budget) {
            RoundOutcome::Fixpoint(_) => {}
            RoundOutcome::Conflict(_) => panic!("expected a fixpoint"),
        }

        assert!(ctx
            .part(BinaryClausesP)
            .implied(var1.positive())
            .contains(&var4.positive()));
    }

    #[test]
    fn bothprop_literal_is_enqueued_at_level_zero() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let mut solver_lits = vec![];

        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[Lit::from_dimacs(-1), Lit::from_dimacs(3)],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());

        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[Lit::from_dimacs(1), Lit::from_dimacs(3)],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());
        let var3 = solver_lits[1].var();

        let mut budget = Budget::new(1000);
        let outcome = probe_variables(ctx.borrow(), &mut budget);
        assert_eq!(outcome, PassOutcome::Complete);

        assert_eq!(ctx.part(AssignmentP).var_value(var3), Some(true));
    }
}
