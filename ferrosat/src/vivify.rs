//! Clause vivification.
//!
//! Grounded on CryptoMiniSat's `ClauseVivifier`: for each long clause, negate its literals one at
//! a time at fresh decision levels and propagate. A literal forced false by the negations tried
//! so far is redundant and can be dropped (strengthening); a literal forced *true* proves the
//! clause already follows from a strict prefix of itself (subsumption by implication); a conflict
//! while negating a literal proves the clause follows from the literals tried up to and including
//! it. Whichever of these fires first shrinks the clause; if none ever fires the clause is left
//! untouched.
//!
//! The cache-based fast path (see [`crate::binary::cache`]) answers "does negating an earlier kept
//! literal already force this one false?" from the cached probing snapshot instead of running
//! propagation, when [`crate::config::SolverConfig::cache_on`] is set.

use partial_ref::{partial, PartialRef};

use ferrosat_formula::Lit;

use crate::clause::db::{delete_clause_unwatched, filter_clauses};
use crate::context::{parts::*, Context};
use crate::load::load_clause;
use crate::proof::{self, DeleteClauseProof, ProofStep};
use crate::prop::{backtrack, enqueue_assignment, propagate, Reason};
use crate::schedule::{Budget, PassOutcome};

/// Try to shrink `lits` by propagating the negation of a prefix of them.
///
/// Returns `Some(shorter)` when a strict, still-implying subset was found, `None` when every
/// literal had to be kept.
fn vivify_literals(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        BinaryClausesP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut TrailP,
        SolverConfigP,
        TransitiveCacheP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    lits: &[Lit],
    budget: &mut Budget,
) -> Option<Vec<Lit>> {
    let cache_on = ctx.part(SolverConfigP).cache_on;

    let mut kept: Vec<Lit> = vec![];
    let mut conflicted = false;

    for &lit in lits {
        match ctx.part(AssignmentP).lit_value(lit) {
            Some(true) => {
                // Already forced true by the negations decided so far: the clause follows from
                // `kept` plus this literal, everything else is unneeded.
                kept.push(lit);
                break;
            }
            Some(false) => {
                // Already forced false: redundant, drop without deciding anything for it.
                continue;
            }
            None => {}
        }

        if cache_on
            && kept
                .iter()
                .any(|&k| ctx.part(TransitiveCacheP).implies(!k, !lit))
        {
            continue;
        }

        budget.charge(1);
        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), !lit, Reason::Unit);

        match propagate(ctx.borrow()) {
            Ok(()) => kept.push(lit),
            Err(_) => {
                kept.push(lit);
                conflicted = true;
                break;
            }
        }
    }

    backtrack(ctx.borrow(), 0);

    if !conflicted && kept.len() == lits.len() {
        None
    } else {
        Some(kept)
    }
}

/// Run one vivification episode over every current long clause.
pub fn vivify_clauses<'a>(
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
        TransitiveCacheP,
        VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    budget: &mut Budget,
) -> PassOutcome {
    let mut candidates: Vec<(crate::clause::ClauseRef, Vec<Lit>)> = vec![];

    filter_clauses(ctx.borrow(), |alloc, cref| {
        candidates.push((cref, alloc.clause(cref).lits().to_vec()));
        true
    });

    let mut outcome = PassOutcome::Complete;

    for (cref, lits) in candidates {
        if budget.is_exhausted() {
            outcome = PassOutcome::Partial;
            break;
        }

        budget.charge(lits.len() as u64);

        let shrunk = vivify_literals(ctx.borrow(), &lits, budget);

        let shorter = match shrunk {
            Some(shorter) => shorter,
            None => continue,
        };

        delete_clause_unwatched(ctx.borrow(), cref);
        proof::add_step(
            ctx.borrow(),
            false,
            &ProofStep::DeleteClause {
                clause: &lits,
                proof: DeleteClauseProof::Simplified,
            },
        );

        load_clause(ctx.borrow(), &shorter);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::clause::Tier;
    use crate::variables;

    #[test]
    fn drops_a_literal_forced_false_by_the_rest() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let mut solver_lits = vec![];

        // (-1 v 2): so deciding -1 forces 2, which also appears (redundantly) in the long clause
        // below alongside 3 and 4.
        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[Lit::from_dimacs(-1), Lit::from_dimacs(2)],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());

        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[
                Lit::from_dimacs(1),
                Lit::from_dimacs(2),
                Lit::from_dimacs(3),
                Lit::from_dimacs(4),
            ],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());

        let before = ctx.part(ClauseDbP).count_by_tier(Tier::Irred);
        assert_eq!(before, 1);

        let mut budget = Budget::new(10_000);
        let outcome = vivify_clauses(ctx.borrow(), &mut budget);
        assert_eq!(outcome, PassOutcome::Complete);

        // The 4-literal clause (1 v 2 v 3 v 4) should have shrunk: deciding -1 forces 2 true, so
        // the clause already follows from (1 v 2), proving 3 and 4 are not needed for it.
        assert_eq!(ctx.part(BinaryClausesP).count(), 2);
    }

    #[test]
    fn leaves_a_clause_with_no_redundancy_untouched() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let mut solver_lits = vec![];

        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[
                Lit::from_dimacs(1),
                Lit::from_dimacs(2),
                Lit::from_dimacs(3),
            ],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());

        let mut budget = Budget::new(10_000);
        vivify_clauses(ctx.borrow(), &mut budget);

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 1);
    }
}
