//! Solution extension.
//!
//! Inprocessing passes that remove variables from the solver (elimination, blocked clause
//! removal, equivalent literal substitution) make the solver work on an equisatisfiable, not an
//! equivalent, formula. [`EliminationLog`] records enough of what each pass did to recover a
//! full model of the original formula from a model of the reduced one, the way
//! `SolutionExtender` does in CryptoMiniSat: walk the log in the reverse order the steps were
//! taken and fix up each removed variable's value so every clause it used to appear in is
//! satisfied.

use partial_ref::{partial, PartialRef};

use ferrosat_formula::{Lit, Var};

use crate::context::{parts::*, Context};

/// One step removed from the formula by an inprocessing pass, in the order it was taken.
enum Step {
    /// `var` was resolved away; `clauses` are the clauses (in global-variable lits) that
    /// mentioned it right before elimination.
    Eliminated { var: Var, clauses: Vec<Vec<Lit>> },
    /// `var` was found equivalent to `representative` (see [`crate::scc`]) and rewritten away.
    Equivalence { var: Var, representative: Lit },
    /// `clause` was removed because `lit` blocked it (see [`crate::elim`]).
    Blocked { lit: Lit, clause: Vec<Lit> },
}

/// Log of variables and clauses removed by inprocessing, used to extend a model back to the full
/// variable set.
#[derive(Default)]
pub struct EliminationLog {
    steps: Vec<Step>,
}

impl EliminationLog {
    /// Record that `var` was eliminated, with `clauses` its occurrences right before removal.
    pub fn push_eliminated(&mut self, var: Var, clauses: Vec<Vec<Lit>>) {
        self.steps.push(Step::Eliminated { var, clauses });
    }

    /// Record that `var` was substituted by `representative` everywhere.
    pub fn push_equivalence(&mut self, var: Var, representative: Lit) {
        self.steps.push(Step::Equivalence { var, representative });
    }

    /// Record that `clause` was removed as blocked on `lit`.
    pub fn push_blocked(&mut self, lit: Lit, clause: Vec<Lit>) {
        self.steps.push(Step::Blocked { lit, clause });
    }

    /// Whether any steps have been recorded.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Extend the current global model to cover every variable removed by inprocessing.
///
/// Must run after [`crate::model::reconstruct_global_model`], which leaves a placeholder value
/// for every removed variable. Processes the log newest-step-first, which guarantees that
/// whenever a step is extended, every variable its clauses/representative refer to has already
/// been assigned, either because it is still present in the reduced solver or because a later
/// (and thus already-processed) step fixed it.
pub fn extend_model(mut ctx: partial!(Context, mut ModelP, EliminationLogP)) {
    let (log, mut ctx) = ctx.split_part(EliminationLogP);
    let model = ctx.part_mut(ModelP);
    let assignment = model.assignment_mut();

    for step in log.steps.iter().rev() {
        apply_step(step, assignment);
    }
}

/// Fix up `assignment` for the variable removed by a single step.
///
/// Split out from [`extend_model`] so it can be exercised directly in tests without a full
/// [`Context`].
fn apply_step(step: &Step, assignment: &mut [Option<bool>]) {
    match step {
        Step::Equivalence { var, representative } => {
            let value = assignment[representative.var().index()]
                .map(|value| value ^ representative.is_negative());
            assignment[var.index()] = value;
        }
        Step::Eliminated { var, clauses } => {
            let mut value = true;
            for clause in clauses {
                let already_satisfied = clause
                    .iter()
                    .any(|&lit| lit.var() != *var && assignment[lit.var().index()] == Some(lit.is_positive()));
                if !already_satisfied {
                    if let Some(&lit) = clause.iter().find(|lit| lit.var() == *var) {
                        value = lit.is_positive();
                    }
                }
            }
            assignment[var.index()] = Some(value);
        }
        Step::Blocked { lit, clause } => {
            let already_satisfied = clause
                .iter()
                .any(|&other| other != *lit && assignment[other.var().index()] == Some(other.is_positive()));
            if !already_satisfied {
                assignment[lit.var().index()] = Some(lit.is_positive());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extends_eliminated_variable() {
        let a = Var::from_index(0);
        let b = Var::from_index(1);

        // (a v b) & (-a v b): eliminating a forces b, a is then free to pick.
        let step = Step::Eliminated {
            var: a,
            clauses: vec![vec![a.positive(), b.positive()], vec![a.negative(), b.positive()]],
        };

        let mut assignment = vec![None, Some(true)];
        apply_step(&step, &mut assignment);

        assert_eq!(assignment[a.index()], Some(true));
    }

    #[test]
    fn extends_eliminated_variable_forced_by_unsatisfied_clause() {
        let a = Var::from_index(0);
        let b = Var::from_index(1);

        // (-a v -b): b is true, so -b is false and a must be set false to satisfy the clause.
        let step = Step::Eliminated {
            var: a,
            clauses: vec![vec![a.negative(), b.negative()]],
        };

        let mut assignment = vec![None, Some(true)];
        apply_step(&step, &mut assignment);

        assert_eq!(assignment[a.index()], Some(false));
    }

    #[test]
    fn extends_equivalence() {
        let a = Var::from_index(0);
        let b = Var::from_index(1);

        let step = Step::Equivalence {
            var: a,
            representative: b.negative(),
        };

        let mut assignment = vec![None, Some(true)];
        apply_step(&step, &mut assignment);

        assert_eq!(assignment[a.index()], Some(false));
    }

    #[test]
    fn extends_blocked_clause() {
        let a = Var::from_index(0);
        let b = Var::from_index(1);

        // clause (a v b) was removed as blocked on a; b ends up false so a must be forced true.
        let step = Step::Blocked {
            lit: a.positive(),
            clause: vec![a.positive(), b.positive()],
        };

        let mut assignment = vec![None, Some(false)];
        apply_step(&step, &mut assignment);

        assert_eq!(assignment[a.index()], Some(true));
    }
}
