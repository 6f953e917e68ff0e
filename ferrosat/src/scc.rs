//! Equivalent literal substitution.
//!
//! Binary clauses form an implication graph over literals: a clause `(a v b)` contributes edges
//! `!a -> b` and `!b -> a`. A strongly connected component of that graph is a set of literals
//! that are all forced to the same truth value whenever any one of them is. Finding those
//! components with Tarjan's algorithm and rewriting every clause to use one representative
//! literal per component removes redundant variables without losing any information, the way
//! CryptoMiniSat's `SCCFinder` does.

use partial_ref::{partial, PartialRef};

use ferrosat_formula::{Lit, Var};

use crate::clause::db::{delete_clause_unwatched, filter_clauses};
use crate::context::{parts::*, Context};
use crate::load::load_clause;
use crate::proof::{self, DeleteClauseProof, ProofStep};
use crate::schedule::PassOutcome;
use crate::state::SatState;
use crate::variables;

/// Find equivalent literals and rewrite the formula to use a single representative per class.
///
/// Runs a full pass over the current solver variables every time; there is no incremental state
/// kept between calls, since binary clauses are cheap to re-scan and equivalences found here feed
/// straight into [`crate::elim`] and [`crate::vivify`] on the same simplification episode.
pub fn find_equivalences<'a>(
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
) -> PassOutcome {
    // `Variables::solver_watermark` tracks the global<->solver bimap, which tests that poke
    // `AssignmentP` directly never populate; the assignment array length is always authoritative
    // for how many solver variable slots actually exist.
    let watermark = ctx.part(AssignmentP).assignment().len();
    let lit_count = watermark * 2;

    if lit_count == 0 {
        return PassOutcome::Complete;
    }

    let comp_of = match tarjan_scc(ctx.borrow(), lit_count) {
        Some(comp_of) => comp_of,
        None => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            return PassOutcome::Complete;
        }
    };

    let comp_count = comp_of.iter().cloned().max().map_or(0, |max| max + 1);
    let mut representative: Vec<Option<Lit>> = vec![None; comp_count as usize];
    for code in 0..lit_count {
        let comp = comp_of[code] as usize;
        if representative[comp].is_none() {
            representative[comp] = Some(Lit::from_code(code));
        }
    }

    let mut remap: Vec<Option<Lit>> = vec![None; watermark];
    for var_index in 0..watermark {
        let var = Var::from_index(var_index);
        let comp = comp_of[var.positive().code()] as usize;
        let rep = representative[comp].expect("every component has a representative");
        if rep.var() != var {
            remap[var_index] = Some(rep);
        }
    }

    if remap.iter().all(Option::is_none) {
        return PassOutcome::Complete;
    }

    // Translate to global-space identities before logging: the solver-space `var`/`rep` indices
    // below get recycled by `remove_solver_var`, but the log must keep referring to the same
    // global variables no matter what the solver later reuses their old indices for.
    for var_index in 0..watermark {
        if let Some(rep) = remap[var_index] {
            let var = Var::from_index(var_index);
            let variables = ctx.part(VariablesP);
            let global_var = variables.global_lit_from_solver(var.positive()).var();
            let global_rep = variables.global_lit_from_solver(rep);
            ctx.part_mut(EliminationLogP)
                .push_equivalence(global_var, global_rep);
        }
    }

    rewrite_binary_clauses(ctx.borrow(), &remap);
    rewrite_long_clauses(ctx.borrow(), &remap);

    for var_index in 0..watermark {
        if remap[var_index].is_some() {
            let var = Var::from_index(var_index);
            variables::remove_solver_var(ctx.borrow(), var);
        }
    }

    PassOutcome::Complete
}

fn substitute(lit: Lit, remap: &[Option<Lit>]) -> Lit {
    match remap[lit.var().index()] {
        Some(rep) => rep ^ lit.is_negative(),
        None => lit,
    }
}

fn rewrite_binary_clauses<'a>(
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
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    remap: &[Option<Lit>],
) {
    let mut removed = vec![];
    for var_index in 0..remap.len() {
        if remap[var_index].is_some() {
            let var = Var::from_index(var_index);
            removed.extend(ctx.part_mut(BinaryClausesP).remove_var(var));
        }
    }

    for [lit_0, lit_1] in removed {
        let new_lits = [substitute(lit_0, remap), substitute(lit_1, remap)];
        load_clause(ctx.borrow(), &new_lits);
    }
}

fn rewrite_long_clauses<'a>(
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
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    remap: &[Option<Lit>],
) {
    let mut to_rewrite = vec![];

    filter_clauses(ctx.borrow(), |alloc, cref| {
        let needs_rewrite = alloc
            .clause(cref)
            .lits()
            .iter()
            .any(|lit| remap[lit.var().index()].is_some());
        if needs_rewrite {
            to_rewrite.push((cref, alloc.clause(cref).lits().to_vec()));
        }
        true
    });

    let mut new_lits = vec![];
    for (cref, old_lits) in to_rewrite {
        new_lits.clear();
        new_lits.extend(old_lits.iter().map(|&lit| substitute(lit, remap)));

        delete_clause_unwatched(ctx.borrow(), cref);
        proof::add_step(
            ctx.borrow(),
            false,
            &ProofStep::DeleteClause {
                clause: &old_lits,
                proof: DeleteClauseProof::Simplified,
            },
        );

        load_clause(ctx.borrow(), &new_lits);
    }
}

/// Tarjan's strongly connected components algorithm over the literal implication graph.
///
/// Returns `None` if some component contains both a literal and its negation, which proves the
/// formula unsatisfiable. Otherwise returns the component index for every literal code.
fn tarjan_scc<'a>(
    ctx: partial!(Context<'a>, BinaryClausesP),
    lit_count: usize,
) -> Option<Vec<u32>> {
    let mut index: Vec<Option<u32>> = vec![None; lit_count];
    let mut lowlink: Vec<u32> = vec![0; lit_count];
    let mut on_stack: Vec<bool> = vec![false; lit_count];
    let mut stack: Vec<usize> = vec![];
    let mut comp_of: Vec<u32> = vec![u32::max_value(); lit_count];
    let mut next_index: u32 = 0;
    let mut next_comp: u32 = 0;

    for start in 0..lit_count {
        if index[start].is_some() {
            continue;
        }

        let mut work: Vec<(usize, usize)> = vec![(start, 0)];
        index[start] = Some(next_index);
        lowlink[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;

        while let Some(&mut (node, ref mut pos)) = work.last_mut() {
            let lit = Lit::from_code(node);
            let neighbors = ctx.part(BinaryClausesP).implied(lit);

            if *pos < neighbors.len() {
                let next = neighbors[*pos].code();
                *pos += 1;

                if index[next].is_none() {
                    index[next] = Some(next_index);
                    lowlink[next] = next_index;
                    next_index += 1;
                    stack.push(next);
                    on_stack[next] = true;
                    work.push((next, 0));
                } else if on_stack[next] {
                    lowlink[node] = lowlink[node].min(index[next].unwrap());
                }
            } else {
                work.pop();

                if let Some(&mut (parent, _)) = work.last_mut() {
                    lowlink[parent] = lowlink[parent].min(lowlink[node]);
                }

                if lowlink[node] == index[node].unwrap() {
                    loop {
                        let w = stack.pop().unwrap();
                        on_stack[w] = false;
                        comp_of[w] = next_comp;
                        if w == node {
                            break;
                        }
                    }
                    next_comp += 1;
                }
            }
        }
    }

    for var_code in (0..lit_count).step_by(2) {
        if comp_of[var_code] == comp_of[var_code + 1] {
            return None;
        }
    }

    Some(comp_of)
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::context::set_var_count;

    #[test]
    fn finds_simple_equivalence() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        // Go through the user/global/solver variable pipeline instead of the raw
        // `context::set_var_count` used by lower-level tests, since `find_equivalences` relies on
        // `Variables` being populated to remove the substituted-away variable afterwards.
        let mut solver_lits = vec![];

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
            &[Lit::from_dimacs(-2), Lit::from_dimacs(1)],
            false,
        );
        load_clause(ctx.borrow(), &solver_lits.clone());

        let outcome = find_equivalences(ctx.borrow());
        assert_eq!(outcome, PassOutcome::Complete);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
        assert!(!ctx.part(EliminationLogP).is_empty());
    }

    #[test]
    fn detects_trivial_contradiction() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let solver_var = variables::solver_from_user(ctx.borrow(), Var::from_index(0), false);
        let one = solver_var.positive();

        // Directly wire up a cycle `1 -> -1 -> 1` in the implication graph: var 0 would have to
        // equal its own negation. `load_clause` would reject these as degenerate unit clauses,
        // so the binary clause store is populated directly instead.
        ctx.part_mut(BinaryClausesP).add_binary_clause([!one, !one]);
        ctx.part_mut(BinaryClausesP).add_binary_clause([one, one]);

        find_equivalences(ctx.borrow());

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }
}
