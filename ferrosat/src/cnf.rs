//! CNF formulas.
//!
//! Re-exported from `ferrosat-formula`, see [`crate::lit`] for why this crate keeps a local path
//! for a type it no longer defines.
pub use ferrosat_formula::cnf::{CnfFormula, ExtendFormula};

#[cfg(test)]
pub use ferrosat_formula::cnf::strategy;
