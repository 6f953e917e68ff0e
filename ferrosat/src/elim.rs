//! Variable elimination, blocked-clause elimination and self-subsuming resolution.
//!
//! Grounded on CryptoMiniSat's `Simplifier.cpp`: per-variable occurrence lists drive a
//! cheapest-first elimination order, resolvents are counted and checked for tautology before an
//! elimination is committed, and an independent pass removes clauses blocked on one of their own
//! literals. Every removed variable or clause is appended to [`crate::extend::EliminationLog`] so
//! a satisfying assignment of the reduced formula can be extended back to the original one.

use partial_ref::{partial, PartialRef};

use ferrosat_formula::{Lit, Var};

use crate::binary::BinaryClauses;
use crate::clause::db::{delete_clause_unwatched, filter_clauses, strengthen_in_place};
use crate::clause::ClauseRef;
use crate::context::{parts::*, Context};
use crate::load::load_clause;
use crate::proof::{self, DeleteClauseProof, ProofStep};
use crate::schedule::{Budget, PassOutcome};
use crate::variables;

/// Occurrence lists over long clauses, indexed by literal code.
///
/// Binary clauses already have their own per-literal index in [`BinaryClauses`]; this only
/// covers the long-clause side, rebuilt fresh at the start of every elimination pass the way
/// CryptoMiniSat's `OccurLists` are rebuilt for each `Simplifier` run.
struct OccurLists {
    by_lit: Vec<Vec<ClauseRef>>,
}

fn build_occur_lists(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP),
    lit_count: usize,
) -> OccurLists {
    let mut occur = OccurLists {
        by_lit: vec![vec![]; lit_count],
    };

    filter_clauses(ctx.borrow(), |alloc, cref| {
        for &lit in alloc.clause(cref).lits() {
            occur.by_lit[lit.code()].push(cref);
        }
        true
    });

    occur
}

/// Whether `var` is a candidate for elimination: currently unassigned, still a live solver
/// variable, and not part of the active assumptions (eliminating an assumption variable would
/// make it impossible to report a failed core in terms of it).
fn is_eligible(ctx: partial!(Context, AssignmentP, VariablesP), var: Var) -> bool {
    if ctx.part(AssignmentP).var_value(var).is_some() {
        return false;
    }

    let variables = ctx.part(VariablesP);
    match variables.global_from_solver().get(var) {
        Some(global) => !variables.var_data_global(global).assumed,
        None => false,
    }
}

/// Product of positive and negative occurrence counts, the same cheapness heuristic
/// `Simplifier::orderVarsForElim` uses: a variable with few occurrences of either polarity
/// produces few resolvents.
fn elimination_cost(occur: &OccurLists, binary: &BinaryClauses, var: Var) -> usize {
    let pos = occur.by_lit[var.positive().code()].len() + binary.implied(var.negative()).len();
    let neg = occur.by_lit[var.negative().code()].len() + binary.implied(var.positive()).len();
    pos * neg
}

/// Resolve `c` (containing `pos_lit`) against `d` (containing `neg_lit == !pos_lit`).
///
/// Returns `None` if the resolvent is tautological, i.e. contains both some literal and its
/// negation.
fn resolve(c: &[Lit], pos_lit: Lit, d: &[Lit], neg_lit: Lit) -> Option<Vec<Lit>> {
    let mut resolvent: Vec<Lit> = c.iter().cloned().filter(|&lit| lit != pos_lit).collect();

    for &lit in d {
        if lit == neg_lit {
            continue;
        }
        if resolvent.contains(&!lit) {
            return None;
        }
        if !resolvent.contains(&lit) {
            resolvent.push(lit);
        }
    }

    Some(resolvent)
}

fn to_global_clause(ctx: partial!(Context, VariablesP), clause: &[Lit]) -> Vec<Lit> {
    let variables = ctx.part(VariablesP);
    clause
        .iter()
        .map(|&lit| variables.global_lit_from_solver(lit))
        .collect()
}

/// Try to eliminate `var`, appending to `occur`'s backing clauses and the elimination log if it
/// is profitable.
fn try_eliminate<'a>(
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
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    occur: &OccurLists,
    var: Var,
    budget: &mut Budget,
) {
    let pos_lit = var.positive();
    let neg_lit = var.negative();

    let mut pos_clauses: Vec<Vec<Lit>> = vec![];
    let mut neg_clauses: Vec<Vec<Lit>> = vec![];
    let mut pos_crefs = vec![];
    let mut neg_crefs = vec![];

    {
        let alloc = ctx.part(ClauseAllocP);
        for &cref in &occur.by_lit[pos_lit.code()] {
            if !alloc.header(cref).deleted() {
                pos_clauses.push(alloc.clause(cref).lits().to_vec());
                pos_crefs.push(cref);
            }
        }
        for &cref in &occur.by_lit[neg_lit.code()] {
            if !alloc.header(cref).deleted() {
                neg_clauses.push(alloc.clause(cref).lits().to_vec());
                neg_crefs.push(cref);
            }
        }
    }

    for &companion in ctx.part(BinaryClausesP).implied(neg_lit) {
        pos_clauses.push(vec![pos_lit, companion]);
    }
    for &companion in ctx.part(BinaryClausesP).implied(pos_lit) {
        neg_clauses.push(vec![neg_lit, companion]);
    }

    budget.charge((pos_clauses.len() * neg_clauses.len()) as u64);

    let mut resolvents = vec![];
    for c in &pos_clauses {
        for d in &neg_clauses {
            if let Some(resolvent) = resolve(c, pos_lit, d, neg_lit) {
                resolvents.push(resolvent);
            }
        }
    }

    if resolvents.len() > pos_clauses.len() + neg_clauses.len() {
        return;
    }

    for clause in pos_clauses.iter().chain(neg_clauses.iter()) {
        proof::add_step(
            ctx.borrow(),
            false,
            &ProofStep::DeleteClause {
                clause,
                proof: DeleteClauseProof::Simplified,
            },
        );
    }

    let global_clauses: Vec<Vec<Lit>> = pos_clauses
        .iter()
        .chain(neg_clauses.iter())
        .map(|clause| to_global_clause(ctx.borrow(), clause))
        .collect();
    let global_var = ctx.part(VariablesP).global_lit_from_solver(pos_lit).var();

    for &cref in pos_crefs.iter().chain(neg_crefs.iter()) {
        delete_clause_unwatched(ctx.borrow(), cref);
    }
    ctx.part_mut(BinaryClausesP).remove_var(var);

    ctx.part_mut(EliminationLogP)
        .push_eliminated(global_var, global_clauses);

    for resolvent in resolvents {
        load_clause(ctx.borrow(), &resolvent);
    }

    variables::remove_solver_var(ctx.borrow(), var);
}

fn is_blocked(
    ctx: partial!(Context, BinaryClausesP, ClauseAllocP),
    occur: &OccurLists,
    clause: &[Lit],
    lit: Lit,
    neg: Lit,
) -> bool {
    for &companion_cref in &occur.by_lit[neg.code()] {
        if ctx.part(ClauseAllocP).header(companion_cref).deleted() {
            continue;
        }
        let companion = ctx.part(ClauseAllocP).clause(companion_cref).lits();
        if resolve(clause, lit, companion, neg).is_some() {
            return false;
        }
    }

    for &companion_lit in ctx.part(BinaryClausesP).implied(lit) {
        let companion = [neg, companion_lit];
        if resolve(clause, lit, &companion, neg).is_some() {
            return false;
        }
    }

    true
}

/// Remove every long clause that is blocked on one of its own literals.
///
/// A clause `C` containing literal `l` is blocked on `l` if every clause containing `!l`
/// resolves against `C` on `l` to a tautology, meaning `C` can never be the sole reason a
/// satisfying assignment has to flip `l`'s side.
fn block_clauses<'a>(
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
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    occur: &OccurLists,
    budget: &mut Budget,
) -> PassOutcome {
    for code in 0..occur.by_lit.len() {
        if budget.is_exhausted() {
            return PassOutcome::Partial;
        }

        let lit = Lit::from_code(code);
        let neg = !lit;

        let crefs = occur.by_lit[code].clone();
        for &cref in &crefs {
            if ctx.part(ClauseAllocP).header(cref).deleted() {
                continue;
            }

            let clause = ctx.part(ClauseAllocP).clause(cref).lits().to_vec();
            budget.charge(clause.len() as u64);

            if is_blocked(ctx.borrow(), occur, &clause, lit, neg) {
                proof::add_step(
                    ctx.borrow(),
                    false,
                    &ProofStep::DeleteClause {
                        clause: &clause,
                        proof: DeleteClauseProof::Simplified,
                    },
                );

                let global_clause = to_global_clause(ctx.borrow(), &clause);
                let global_lit = ctx.part(VariablesP).global_lit_from_solver(lit);

                delete_clause_unwatched(ctx.borrow(), cref);

                ctx.part_mut(EliminationLogP)
                    .push_blocked(global_lit, global_clause);
            }
        }
    }

    PassOutcome::Complete
}

/// Strengthen clauses by self-subsuming resolution.
///
/// For a clause `c` and a literal `l` in it, any other clause `d` that contains `!l` and every
/// other literal of `c` can be resolved with `c` on `l`'s variable to yield `d` with `!l` removed:
/// the resolvent is `(c \ {l}) ∪ (d \ {!l})`, and `c \ {l} ⊆ d` already, so that union is just
/// `d \ {!l}`. Following `Simplifier::subsume1`, the scan for each clause starts from the literal
/// whose negation has the fewest candidate occurrences, since that bounds the work.
fn subsume1(
    mut ctx: partial!(Context, mut ClauseAllocP),
    occur: &OccurLists,
    budget: &mut Budget,
) -> PassOutcome {
    for crefs in &occur.by_lit {
        for &cref in crefs {
            if budget.is_exhausted() {
                return PassOutcome::Partial;
            }

            if ctx.part(ClauseAllocP).header(cref).deleted() {
                continue;
            }

            let clause = ctx.part(ClauseAllocP).clause(cref).lits().to_vec();
            budget.charge(clause.len() as u64);

            let pivot = match clause
                .iter()
                .cloned()
                .min_by_key(|&lit| occur.by_lit[(!lit).code()].len())
            {
                Some(pivot) => pivot,
                None => continue,
            };

            for &other_cref in &occur.by_lit[(!pivot).code()] {
                if other_cref == cref {
                    continue;
                }

                let other_header = *ctx.part(ClauseAllocP).header(other_cref);
                if other_header.deleted() || other_header.len() <= 3 {
                    continue;
                }

                let other_lits = ctx.part(ClauseAllocP).clause(other_cref).lits();
                if other_lits.len() < clause.len() {
                    continue;
                }

                let remove_pos = match other_lits.iter().position(|&lit| lit == !pivot) {
                    Some(pos) => pos,
                    None => continue,
                };
                if remove_pos < 2 {
                    continue;
                }

                let subsumes = clause
                    .iter()
                    .all(|&lit| lit == pivot || other_lits.contains(&lit));
                if !subsumes {
                    continue;
                }

                strengthen_in_place(ctx.borrow(), other_cref, remove_pos);
            }
        }
    }

    PassOutcome::Complete
}

/// Run one elimination episode: eliminate cheap variables by resolution, then remove blocked
/// clauses, all under a shared [`Budget`].
pub fn eliminate_variables<'a>(
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
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    budget: &mut Budget,
) -> PassOutcome {
    let watermark = ctx.part(AssignmentP).assignment().len();
    let lit_count = watermark * 2;

    if lit_count == 0 {
        return PassOutcome::Complete;
    }

    let occur = build_occur_lists(ctx.borrow(), lit_count);

    let mut order: Vec<Var> = (0..watermark)
        .map(Var::from_index)
        .filter(|&var| is_eligible(ctx.borrow(), var))
        .collect();

    let binary = ctx.part(BinaryClausesP);
    order.sort_by_key(|&var| elimination_cost(&occur, binary, var));

    let mut outcome = PassOutcome::Complete;

    for var in order {
        if budget.is_exhausted() {
            outcome = PassOutcome::Partial;
            break;
        }

        if !is_eligible(ctx.borrow(), var) {
            continue;
        }

        try_eliminate(ctx.borrow(), &occur, var, budget);
    }

    if block_clauses(ctx.borrow(), &occur, budget) == PassOutcome::Partial {
        outcome = PassOutcome::Partial;
    }

    if subsume1(ctx.borrow(), &occur, budget) == PassOutcome::Partial {
        outcome = PassOutcome::Partial;
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::clause::Tier;
    use crate::state::SatState;

    #[test]
    fn resolve_merges_non_tautological_clauses() {
        let a = Var::from_index(0).positive();
        let b = Var::from_index(1).positive();
        let c = Var::from_index(2).positive();
        let d = Var::from_index(3).positive();

        let resolvent = resolve(&[a, b], a, &[!a, c, d], !a).unwrap();
        assert_eq!(resolvent, vec![b, c, d]);
    }

    #[test]
    fn resolve_detects_tautology() {
        let a = Var::from_index(0).positive();
        let b = Var::from_index(1).positive();

        assert!(resolve(&[a, b], a, &[!a, !b], !a).is_none());
    }

    #[test]
    fn eliminates_all_variables_of_a_tautological_resolution() {
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

        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[
                Lit::from_dimacs(-1),
                Lit::from_dimacs(-2),
                Lit::from_dimacs(-3),
            ],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());

        let mut budget = Budget::new(1000);
        let outcome = eliminate_variables(ctx.borrow(), &mut budget);
        assert_eq!(outcome, PassOutcome::Complete);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 0);
        assert!(!ctx.part(EliminationLogP).is_empty());
    }

    #[test]
    fn blocks_clause_with_no_resolving_partner() {
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

        let lit_count = ctx.part(AssignmentP).assignment().len() * 2;
        let occur = build_occur_lists(ctx.borrow(), lit_count);
        let mut budget = Budget::new(1000);

        let outcome = block_clauses(ctx.borrow(), &occur, &mut budget);
        assert_eq!(outcome, PassOutcome::Complete);

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 0);
        assert!(!ctx.part(EliminationLogP).is_empty());
    }

    #[test]
    fn subsume1_strengthens_clause_sharing_all_but_one_literal() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let mut solver_lits = vec![];

        // c = (1 2 4), d = (1 2 -4 3): c and d resolve on var 4 to (1 2 3), which is exactly d
        // with -4 dropped, so -4 is redundant in d.
        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[Lit::from_dimacs(1), Lit::from_dimacs(2), Lit::from_dimacs(4)],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());
        let c = solver_lits.clone();

        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[
                Lit::from_dimacs(1),
                Lit::from_dimacs(2),
                Lit::from_dimacs(-4),
                Lit::from_dimacs(3),
            ],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());
        let d = solver_lits.clone();

        // The literal that gets resolved away: the one in d whose negation is in c.
        let removed_lit = *d.iter().find(|&&lit| c.contains(&!lit)).unwrap();

        let lit_count = ctx.part(AssignmentP).assignment().len() * 2;
        let occur = build_occur_lists(ctx.borrow(), lit_count);
        let mut budget = Budget::new(1000);

        let outcome = subsume1(ctx.borrow(), &occur, &mut budget);
        assert_eq!(outcome, PassOutcome::Complete);

        let mut survivors: Vec<Vec<Lit>> = vec![];
        filter_clauses(ctx.borrow(), |alloc, cref| {
            survivors.push(alloc.clause(cref).lits().to_vec());
            true
        });

        assert!(!survivors
            .iter()
            .any(|lits| lits.contains(&removed_lit)));
        assert_eq!(survivors.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 3]);
    }

    #[test]
    fn subsume1_leaves_unrelated_clauses_alone() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let mut solver_lits = vec![];

        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[Lit::from_dimacs(1), Lit::from_dimacs(2), Lit::from_dimacs(3)],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());

        variables::solver_from_user_lits(
            ctx.borrow(),
            &mut solver_lits,
            &[
                Lit::from_dimacs(4),
                Lit::from_dimacs(5),
                Lit::from_dimacs(6),
                Lit::from_dimacs(7),
            ],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());

        let lit_count = ctx.part(AssignmentP).assignment().len() * 2;
        let occur = build_occur_lists(ctx.borrow(), lit_count);
        let mut budget = Budget::new(1000);

        let outcome = subsume1(ctx.borrow(), &occur, &mut budget);
        assert_eq!(outcome, PassOutcome::Complete);

        let mut lengths: Vec<usize> = vec![];
        filter_clauses(ctx.borrow(), |alloc, cref| {
            lengths.push(alloc.clause(cref).lits().len());
            true
        });
        lengths.sort_unstable();

        assert_eq!(lengths, vec![3, 4]);
    }
}
