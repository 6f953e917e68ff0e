//! Boolean satisfiability solver.
use std::io;

use partial_ref::{IntoPartialRef, IntoPartialRefMut, PartialRef};

use anyhow::Error;
use log::info;

use ferrosat_dimacs::DimacsParser;
use ferrosat_formula::ExtendFormula;

pub use crate::proof::ProofFormat;

use crate::checker::ProofProcessor;
use crate::cnf::CnfFormula;
use crate::config::{SolverConfig, SolverConfigUpdate};
use crate::context::{config_changed, parts::*, Context};
use crate::extend::extend_model;
use crate::incremental::set_assumptions;
use crate::lit::{Lit, Var};
use crate::load::load_clause;
use crate::model::reconstruct_global_model;
use crate::orchestrate;
use crate::state::SatState;
use crate::variables;
use crate::variables::data::SamplingMode;

/// A boolean satisfiability solver.
pub struct Solver<'a> {
    ctx: Box<Context<'a>>,
}

impl<'a> Default for Solver<'a> {
    fn default() -> Solver<'a> {
        Solver { ctx: Box::default() }
    }
}

impl<'a> Solver<'a> {
    /// Create a new solver.
    pub fn new() -> Solver<'a> {
        Solver::default()
    }

    /// Update the solver's configuration.
    ///
    /// Fields left unset in `update` keep their current value.
    pub fn set_configuration(&mut self, update: &SolverConfigUpdate) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        update.apply_to(ctx.part_mut(SolverConfigP));
        config_changed(ctx.borrow(), update);
    }

    /// Read back the current configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.ctx.solver_config
    }

    /// Allocate a fresh variable not yet used by the formula.
    pub fn new_var(&mut self) -> Var {
        let mut ctx = self.ctx.into_partial_ref_mut();
        variables::new_user_var(ctx.borrow())
    }

    /// Append a single clause to the formula.
    fn load_user_clause(&mut self, clause: &[Lit]) {
        let mut ctx = self.ctx.into_partial_ref_mut();

        ctx.part_mut(ProofP).add_clause(clause);

        let mut solver_lits = vec![];
        variables::solver_from_user_lits(ctx.borrow(), &mut solver_lits, clause, false);

        load_clause(ctx.borrow(), &solver_lits);
    }

    /// Add a formula to the solver.
    pub fn add_formula(&mut self, formula: &CnfFormula) {
        for clause in formula.iter() {
            self.load_user_clause(clause);
        }
    }

    /// Reads and adds a formula in DIMACS CNF format.
    ///
    /// Using this avoids creating a temporary [`CnfFormula`].
    pub fn add_dimacs_cnf(&mut self, input: impl io::Read) -> Result<(), Error> {
        use io::BufRead;

        let mut buffer = io::BufReader::new(input);
        let mut parser = DimacsParser::new();

        loop {
            let data = buffer.fill_buf()?;
            if data.is_empty() {
                break;
            }
            parser.parse_chunk(data)?;
            let len = data.len();
            buffer.consume(len);

            self.add_formula(&parser.take_formula());
        }
        parser.eof()?;
        self.add_formula(&parser.take_formula());
        parser.check_header()?;

        info!(
            "Parsed formula with {} variables and {} clauses",
            parser.var_count(),
            parser.clause_count()
        );

        Ok(())
    }

    /// Set the assumptions used for future calls to [`Solver::solve`].
    ///
    /// Replaces any assumptions set by a previous call.
    pub fn assume(&mut self, assumptions: &[Lit]) {
        let mut ctx = self.ctx.into_partial_ref_mut();

        let mut solver_lits = vec![];
        variables::solver_from_user_lits(ctx.borrow(), &mut solver_lits, assumptions, true);

        set_assumptions(ctx.borrow(), &solver_lits);
    }

    /// Check the satisfiability of the current formula, honoring any assumptions set via
    /// [`Solver::assume`].
    pub fn solve(&mut self) -> Result<bool, Error> {
        let mut ctx = self.ctx.into_partial_ref_mut();

        orchestrate::run(ctx.borrow());

        if ctx.part(SolverStateP).sat_state == SatState::Sat {
            reconstruct_global_model(ctx.borrow());
            extend_model(ctx.borrow());
        }

        ctx.part_mut(ProofP).solve_finished();

        Ok(match ctx.part(SolverStateP).sat_state {
            SatState::Sat => true,
            SatState::Unsat | SatState::UnsatUnderAssumptions => false,
            SatState::Unknown => unreachable!("search always decides the formula"),
        })
    }

    /// Set of literals that satisfy the formula, valid only after [`Solver::solve`] returned
    /// `Ok(true)`.
    pub fn model(&self) -> Option<Vec<Lit>> {
        let mut ctx = self.ctx.into_partial_ref();

        if ctx.part(SolverStateP).sat_state != SatState::Sat {
            return None;
        }

        let variables = ctx.part(VariablesP);
        let model = ctx.part(ModelP);

        Some(
            variables
                .user_var_iter()
                .flat_map(|user_var| {
                    let global_var = variables.global_from_user().get(user_var)?;
                    let value = model.assignment()[global_var.index()]?;
                    Some(Lit::from_var(user_var, value))
                })
                .collect(),
        )
    }

    /// Subset of the assumptions that made the formula unsatisfiable, valid only after
    /// [`Solver::solve`] returned `Ok(false)` with assumptions set via [`Solver::assume`].
    pub fn failed_core(&self) -> Option<Vec<Lit>> {
        let mut ctx = self.ctx.into_partial_ref();

        if ctx.part(SolverStateP).sat_state != SatState::UnsatUnderAssumptions {
            return None;
        }

        let variables = ctx.part(VariablesP);

        Some(
            ctx.part(IncrementalP)
                .failed_core()
                .iter()
                .map(|&solver_lit| {
                    let user_var = variables.existing_user_from_solver(solver_lit.var());
                    Lit::from_var(user_var, solver_lit.is_positive())
                })
                .collect(),
        )
    }

    /// Hide a variable from the visible model.
    ///
    /// Hidden variables are free for the solver to eliminate or substitute away; only use this
    /// for variables whose value the caller genuinely doesn't need, as it breaks equivalence with
    /// the unmodified formula restricted to that variable.
    pub fn hide_var(&mut self, var: Var) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let global = variables::global_from_user(ctx.borrow(), var, false);
        variables::set_sampling_mode(ctx.borrow(), global, SamplingMode::Hide);
    }

    /// Mark a variable as a witness variable.
    ///
    /// Witness variables appear in the model but, unlike sampled variables, the solver is still
    /// free to choose their value as long as the sampled part of the formula is satisfied.
    pub fn witness_var(&mut self, var: Var) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let global = variables::global_from_user(ctx.borrow(), var, false);
        variables::set_sampling_mode(ctx.borrow(), global, SamplingMode::Witness);
    }

    /// Turn all currently hidden variables into witness variables and return them.
    ///
    /// Useful right before adding the next incremental formula, so that internal variables
    /// introduced while processing the previous one can still be inspected if needed, without
    /// having to track which ones they were.
    pub fn observe_internal_vars(&mut self) -> Vec<Var> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        variables::observe_internal_vars(ctx.borrow())
    }

    /// Enable checking every proof step the solver produces against the formula as loaded so far.
    pub fn enable_self_checking(&mut self) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(ProofP).begin_checking();
    }

    /// Start writing proof steps to `target` in the given format.
    pub fn write_proof(&mut self, target: impl io::Write + 'a, format: ProofFormat) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(ProofP).write_proof(target, format);
    }

    /// Stop writing proof steps and flush the output written so far.
    pub fn close_proof(&mut self) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(ProofP).close_proof();
    }

    /// Add a processor that gets called for every proof step the solver produces.
    ///
    /// Enables on-the-fly checking of every step, in addition to whatever external proof is
    /// being written.
    pub fn add_proof_processor(&mut self, processor: &'a mut dyn ProofProcessor) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(ProofP).add_processor(processor);
    }
}

impl<'a> ExtendFormula for Solver<'a> {
    fn new_var(&mut self) -> Var {
        Solver::new_var(self)
    }

    fn add_clause(&mut self, clause: &[Lit]) {
        self.load_user_clause(clause);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::cnf::CnfFormula;
    use ferrosat_dimacs::write_dimacs;

    use crate::test::{sat_formula, sgen_unsat_formula};

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve().ok(), Some(false));
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve().ok(), Some(true));

            let model = solver.model().unwrap();

            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }
        }

        #[test]
        fn sat_via_dimacs(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();

            let mut dimacs = vec![];

            write_dimacs(&mut dimacs, &formula).unwrap();

            solver.add_dimacs_cnf(&mut &dimacs[..]).unwrap();

            prop_assert_eq!(solver.solve().ok(), Some(true));

            let model = solver.model().unwrap();

            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }
        }

        #[test]
        fn sgen_unsat_incremetal_clauses(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();

            let mut last_state = Some(true);

            for clause in formula.iter() {
                let single_clause = CnfFormula::from(Some(clause));
                solver.add_formula(&single_clause);

                let state = solver.solve().ok();
                if state != last_state {
                    prop_assert_eq!(state, Some(false));
                    prop_assert_eq!(last_state, Some(true));
                    last_state = state;
                }
            }

            prop_assert_eq!(last_state, Some(false));
        }

        #[test]
        fn unsat_under_assumptions_reports_a_failed_core(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve().ok(), Some(false));
            prop_assert!(solver.failed_core().is_none());
        }
    }
}
