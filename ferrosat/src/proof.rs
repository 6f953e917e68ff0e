//! Proof generation.
//!
//! Clause steps produced by the solver use solver-local variable names, while proofs and the
//! on-the-fly checker need to talk about global variable names that stay stable across
//! incremental solve calls. This module maps steps between the two spaces before writing or
//! checking them.
use std::io::{sink, BufWriter, Write};

use partial_ref::{partial, PartialRef};

use ferrosat_formula::Lit;

use ferrosat_checker::internal::SelfChecker;
use ferrosat_checker::{Checker, ProofProcessor};

pub use ferrosat_internal_proof::{clause_hash, lit_hash, ClauseHash, DeleteClauseProof, ProofStep};

use crate::context::{parts::*, Context};

mod drat;
mod map_step;

use map_step::MapStep;

/// Proof formats that can be generated during solving.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ProofFormat {
    Ferrosat,
    Drat,
    BinaryDrat,
}

/// Proof generation.
pub struct Proof<'a> {
    format: Option<ProofFormat>,
    target: BufWriter<Box<dyn Write + 'a>>,
    checker: Option<Checker<'a>>,
}

impl<'a> Default for Proof<'a> {
    fn default() -> Proof<'a> {
        Proof {
            format: None,
            target: BufWriter::new(Box::new(sink())),
            checker: None,
        }
    }
}

impl<'a> Proof<'a> {
    /// Start writing proof steps to the given target with the given format.
    pub fn write_proof(&mut self, target: impl Write + 'a, format: ProofFormat) {
        self.format = Some(format);
        self.target = BufWriter::new(Box::new(target))
    }

    /// Stop writing proof steps.
    pub fn close_proof(&mut self) {
        // We need to explicitly flush to handle IO errors.
        handle_io_errors(self.target.flush());
        self.format = None;
        self.target = BufWriter::new(Box::new(sink()));
    }

    /// Begin checking proof steps.
    pub fn begin_checking(&mut self) {
        if self.checker.is_none() {
            self.checker = Some(Checker::new())
        }
    }

    /// Called before solve returns to trigger delayed unit conflict processing.
    pub fn solve_finished(&mut self) {
        if let Some(checker) = &mut self.checker {
            checker.self_check_delayed_steps().unwrap();
            // TODO error handling
        }
    }

    /// Add a [`ProofProcessor`].
    pub fn add_processor(&mut self, processor: &'a mut dyn ProofProcessor) {
        self.begin_checking();
        self.checker.as_mut().unwrap().add_processor(processor);
    }

    /// Whether proof generation is active.
    pub fn is_active(&self) -> bool {
        self.checker.is_some() || self.format.is_some()
    }

    /// Whether a model is recorded in the proof, requiring a [`ProofStep::Model`] step whenever a
    /// satisfying assignment is found.
    pub fn models_in_proof(&self) -> bool {
        self.checker.is_some() || self.format == Some(ProofFormat::Ferrosat)
    }

    /// Whether clause hashes are required for steps that support them.
    pub fn clause_hashes_required(&self) -> bool {
        self.checker.is_some()
            || match self.format {
                Some(ProofFormat::Ferrosat) => true,
                Some(ProofFormat::Drat) | Some(ProofFormat::BinaryDrat) => false,
                None => false,
            }
    }

    /// Whether unit clauses discovered through unit propagation have to be proven.
    pub fn prove_propagated_unit_clauses(&self) -> bool {
        self.checker.is_some()
            || match self.format {
                Some(ProofFormat::Ferrosat) => true,
                Some(ProofFormat::Drat) | Some(ProofFormat::BinaryDrat) => false,
                None => false,
            }
    }

    /// Call when adding an external clause.
    ///
    /// This is ignored for writing proof files but required for on-the-fly checking.
    pub fn add_clause(&mut self, clause: &[Lit]) {
        if let Some(checker) = &mut self.checker {
            checker.add_clause(clause).unwrap();
            // TODO error handling
        }
    }

    /// Writes a proof step in the native format.
    fn write_ferrosat_step<'s>(&mut self, step: &'s ProofStep<'s>) {
        handle_io_errors(ferrosat_internal_proof::binary_format::write_step(
            &mut self.target,
            step,
        ));
    }

    /// Writes a proof step in DRAT or binary DRAT format.
    fn write_drat_step<'s>(&mut self, step: &'s ProofStep<'s>) {
        let result = if self.format == Some(ProofFormat::BinaryDrat) {
            drat::write_binary_step(&mut self.target, step)
        } else {
            drat::write_step(&mut self.target, step)
        };
        handle_io_errors(result);
    }
}

/// Handles IO errors.
///
/// Right now this panics. In the future it should set an error flag that will be checked in the
/// solver main loop to abort when proof writing failed.
fn handle_io_errors<V, E: std::fmt::Debug>(result: Result<V, E>) -> Option<V> {
    // TODO better error handling
    // on error we want to abort solving eventually but not panic
    // we also don't want to force error handling on proof generating code
    Some(result.expect("unable to write to proof file"))
}

/// Add a step to the proof, mapping solver-local variable names to global ones first.
///
/// `checker_check` selects whether this step must be verified by the on-the-fly checker. Steps
/// that only record bookkeeping (like variable name changes) can skip that and still be written
/// to the external proof file.
pub fn add_step<'a>(
    mut ctx: partial!(Context<'a>, mut ProofP<'a>, VariablesP),
    checker_check: bool,
    step: &ProofStep,
) {
    let proof = ctx.part_mut(ProofP);

    if !proof.is_active() {
        return;
    }

    let variables = ctx.part(VariablesP);

    let map_lit = |lit: Lit| -> Lit {
        let global = variables
            .global_from_solver()
            .get(lit.var())
            .unwrap_or(lit.var());
        global.lit(lit.is_positive())
    };

    let mut map_step = MapStep::default();
    let mapped = map_step.map(step, map_lit, |hash| hash);

    let proof = ctx.part_mut(ProofP);

    match proof.format {
        None => (),
        Some(ProofFormat::Ferrosat) => proof.write_ferrosat_step(&mapped),
        Some(ProofFormat::Drat) | Some(ProofFormat::BinaryDrat) => proof.write_drat_step(&mapped),
    }

    if checker_check {
        if let Some(checker) = &mut proof.checker {
            checker.self_check_step(mapped).unwrap();
            // TODO error handling
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use std::fs::File;
    use std::process::Command;

    use tempfile::TempDir;

    use ferrosat_dimacs::write_dimacs;

    use crate::solver::Solver;

    use crate::test::sgen_unsat_formula;

    proptest! {

        #[cfg_attr(not(test_drat_trim), ignore)]
        #[test]
        fn sgen_unsat_drat(
            formula in sgen_unsat_formula(1..7usize),
        ) {
            let mut solver = Solver::new();

            let tmp = TempDir::new()?;

            let drat_proof = tmp.path().join("proof.drat");
            let cnf_file = tmp.path().join("input.cnf");

            write_dimacs(&mut File::create(&cnf_file)?, &formula)?;

            solver.write_proof(File::create(&drat_proof)?, ProofFormat::Drat);

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), Some(false));

            solver.close_proof();

            let output = Command::new("drat-trim")
                .arg(&cnf_file)
                .arg(&drat_proof)
                .output()?;

            prop_assert!(std::str::from_utf8(&output.stdout)?.contains("s VERIFIED"));
        }

        #[cfg_attr(not(test_drat_trim), ignore)]
        #[test]
        fn sgen_unsat_binary_drat(
            formula in sgen_unsat_formula(1..7usize),
        ) {
            let mut solver = Solver::new();

            let tmp = TempDir::new()?;

            let drat_proof = tmp.path().join("proof.bdrat");
            let cnf_file = tmp.path().join("input.cnf");

            write_dimacs(&mut File::create(&cnf_file)?, &formula)?;

            solver.write_proof(File::create(&drat_proof)?, ProofFormat::BinaryDrat);

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), Some(false));

            solver.close_proof();

            let output = Command::new("drat-trim")
                .arg(&cnf_file)
                .arg(&drat_proof)
                .arg("-i")
                .output()?;

            prop_assert!(std::str::from_utf8(&output.stdout)?.contains("s VERIFIED"));
        }
    }
}
