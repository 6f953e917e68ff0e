//! LRAT proof output for the Ferrosat SAT solver.
//!
//! Implements [`ProofProcessor`] so that [`ferrosat::solver::Solver::add_proof_processor`] can
//! drive it directly from the checker's replayed, id-assigned view of a proof, which already
//! carries everything an LRAT proof needs: a clause id for every added or deleted clause and, for
//! every asymmetric tautology step, the ids of the clauses unit propagation used to derive it.
use std::io::{self, Write};

use failure::Error;

use ferrosat_checker::{CheckedProofStep, CheckerData, ProofProcessor};
use ferrosat_formula::Lit;

/// Writes checked proof steps as an LRAT proof.
///
/// Set `compressed` in [`WriteLrat::new`] to write the binary CLRAT encoding instead of the plain
/// text one.
pub struct WriteLrat<W> {
    target: W,
    compressed: bool,
    last_id: u64,
}

impl<W: Write> WriteLrat<W> {
    /// Create a new LRAT writer that writes to `target`.
    pub fn new(target: W, compressed: bool) -> WriteLrat<W> {
        WriteLrat {
            target,
            compressed,
            last_id: 0,
        }
    }

    fn write_id(&mut self, id: u64) -> io::Result<()> {
        if self.compressed {
            leb128::write::unsigned(&mut self.target, id)?;
        } else {
            let mut buf = [0u8; 20];
            let len = itoa::write(&mut buf[..], id)?;
            self.target.write_all(&buf[..len])?;
            self.target.write_all(b" ")?;
        }
        Ok(())
    }

    fn write_lit(&mut self, lit: Lit) -> io::Result<()> {
        if self.compressed {
            // Zero is reserved as the clause terminator, so literals are shifted by two and the
            // sign moved into the low bit, the same trick `ferrosat_formula::Lit::code` uses.
            leb128::write::unsigned(&mut self.target, lit.code() as u64 + 2)?;
        } else {
            let mut buf = [0u8; 21];
            let len = itoa::write(&mut buf[..], lit.to_dimacs())?;
            self.target.write_all(&buf[..len])?;
            self.target.write_all(b" ")?;
        }
        Ok(())
    }

    fn write_terminator(&mut self) -> io::Result<()> {
        if self.compressed {
            self.target.write_all(&[0])
        } else {
            self.target.write_all(b"0\n")
        }
    }

    /// Write a clause addition line, with `propagations` the ids of the clauses that derived it.
    ///
    /// An empty `propagations` slice is used for clauses of the input formula, which need no
    /// justification.
    fn write_addition(&mut self, id: u64, clause: &[Lit], propagations: &[u64]) -> io::Result<()> {
        if self.compressed {
            self.target.write_all(b"a")?;
        }
        self.write_id(id)?;
        for &lit in clause {
            self.write_lit(lit)?;
        }
        if self.compressed {
            self.target.write_all(&[0])?;
        } else {
            self.target.write_all(b"0 ")?;
        }
        for &antecedent in propagations {
            self.write_id(antecedent)?;
        }
        self.write_terminator()?;

        self.last_id = id;
        Ok(())
    }

    /// Write a deletion line for the given clause ids.
    ///
    /// The leading id is whatever clause was most recently added, matching the convention that a
    /// deletion line doesn't itself introduce a clause and so doesn't need its own id.
    fn write_deletion(&mut self, deleted: &[u64]) -> io::Result<()> {
        if self.compressed {
            self.target.write_all(b"d")?;
            self.write_id(self.last_id)?;
        } else {
            self.write_id(self.last_id)?;
            self.target.write_all(b"d ")?;
        }
        for &id in deleted {
            self.write_id(id)?;
        }
        self.write_terminator()
    }
}

impl<W: Write> ProofProcessor for WriteLrat<W> {
    fn process_step(&mut self, step: &CheckedProofStep, _data: CheckerData) -> Result<(), Error> {
        match *step {
            CheckedProofStep::AddClause { id, clause }
            | CheckedProofStep::TautologicalClause { id, clause } => {
                self.write_addition(id, clause, &[])?;
            }

            // Proof steps referring to the duplicate use the id of the original clause instead,
            // so the duplicate's own id never needs a line of its own.
            CheckedProofStep::DuplicatedClause { .. } => {}

            CheckedProofStep::AtClause {
                id,
                clause,
                propagations,
                ..
            } => {
                self.write_addition(id, clause, propagations)?;
            }

            CheckedProofStep::DeleteClause { id, .. }
            | CheckedProofStep::DeleteAtClause { id, .. } => {
                self.write_deletion(&[id])?;
            }

            // Resolution based deletion isn't representable as an LRAT RUP hint.
            CheckedProofStep::DeleteRatClause { id, .. } => {
                self.write_deletion(&[id])?;
            }

            CheckedProofStep::MakeIrredundant { .. }
            | CheckedProofStep::UserVar { .. }
            | CheckedProofStep::Model { .. }
            | CheckedProofStep::Assumptions { .. }
            | CheckedProofStep::FailedAssumptions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ferrosat_formula::Var;

    fn lit(index: usize, positive: bool) -> Lit {
        Lit::from_var(Var::from_index(index), positive)
    }

    #[test]
    fn text_addition_then_deletion() {
        let mut buf = vec![];
        let mut writer = WriteLrat::new(&mut buf, false);

        writer.write_addition(1, &[lit(0, true), lit(1, false)], &[]).unwrap();
        writer.write_addition(2, &[lit(0, true)], &[1]).unwrap();
        writer.write_deletion(&[1]).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "1 1 -2 0 0");
        assert_eq!(lines[1], "2 1 0 1 0");
        assert_eq!(lines[2], "2 d 1 0");
    }

    #[test]
    fn compressed_addition_starts_with_tag() {
        let mut buf = vec![];
        let mut writer = WriteLrat::new(&mut buf, true);

        writer.write_addition(1, &[lit(0, true)], &[]).unwrap();

        assert_eq!(buf[0], b'a');
    }
}
