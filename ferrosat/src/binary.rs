//! Binary clauses.

use partial_ref::{partial, PartialRef};

use crate::context::{BinaryClausesP, Context};
use crate::lit::{Lit, Var};

pub mod cache;

/// Binary clauses.
#[derive(Default)]
pub struct BinaryClauses {
    by_lit: Vec<Vec<Lit>>,
    count: usize,
}

impl BinaryClauses {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.by_lit.resize(count * 2, vec![]);
    }

    /// Add a binary clause.
    pub fn add_binary_clause(&mut self, lits: [Lit; 2]) {
        for i in 0..2 {
            self.by_lit[(!lits[i]).code()].push(lits[i ^ 1]);
        }
        self.count += 1;
    }

    /// Implications of a given literal
    pub fn implied(&self, lit: Lit) -> &[Lit] {
        &self.by_lit[lit.code()]
    }

    /// Number of binary clauses.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Remove every binary clause containing `var`, returning them.
    ///
    /// Used by [`crate::elim`] and [`crate::scc`] once a variable has been eliminated or
    /// substituted and its binary clauses are no longer needed.
    pub fn remove_var(&mut self, var: Var) -> Vec<[Lit; 2]> {
        let mut removed = vec![];

        for lit in [var.positive(), var.negative()] {
            let companions = std::mem::take(&mut self.by_lit[(!lit).code()]);
            for companion in companions {
                let side = &mut self.by_lit[(!companion).code()];
                if let Some(pos) = side.iter().position(|&l| l == lit) {
                    side.swap_remove(pos);
                }
                removed.push([lit, companion]);
            }
        }

        self.count -= removed.len();
        removed
    }
}

/// Remove duplicate binary clauses.
///
/// Binary clauses accumulate duplicates as simplification passes rediscover the same
/// implication through different routes. This just dedups the per-literal implication lists;
/// it does not touch the watchlists, since binary clauses are never watched separately.
pub fn simplify_binary(mut ctx: partial!(Context, mut BinaryClausesP)) {
    let binary_clauses = ctx.part_mut(BinaryClausesP);

    for implied in &mut binary_clauses.by_lit {
        implied.sort_unstable();
        implied.dedup();
    }

    let count: usize = binary_clauses.by_lit.iter().map(Vec::len).sum();
    binary_clauses.count = count / 2;
}
