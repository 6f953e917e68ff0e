//! Literals and variables.
//!
//! These used to be defined directly in this crate. They now live in `ferrosat-formula` so that
//! `ferrosat-dimacs` and other downstream crates can depend on the data model without pulling in
//! the solver itself. This module re-exports them under their historical path and keeps the
//! test-only convenience macros that the rest of this crate's test suites use.
pub use ferrosat_formula::lit::{Lit, LitIdx, Var};

#[cfg(test)]
pub use ferrosat_formula::lit::strategy;

/// Shortcut for tests
#[cfg(test)]
#[allow(unused_macros)]
macro_rules! lit {
    ($x:expr) => {
        $crate::lit::Lit::from_dimacs($x)
    };
}

/// Shortcut for tests
#[cfg(test)]
#[allow(unused_macros)]
macro_rules! var {
    ($x:expr) => {
        $crate::lit::Var::from_dimacs($x)
    };
}

/// Shortcut for tests
#[cfg(test)]
#[allow(unused_macros)]
macro_rules! lits {
    ( $( $x:expr ),* ) => { [ $( lit!( $x ) ),* ] };
    ( $( $x:expr ),* , ) => { lits! [ $( $ x),* ] };
}

/// Shortcut for tests
#[cfg(test)]
#[allow(unused_macros)]
macro_rules! vars {
    ( $( $x:expr ),* ) => { [ $( var!( $x ) ),* ] };
    ( $( $x:expr ),* , ) => { vars! [ $( $ x),* ] };
}

/// Shortcut for tests
#[cfg(test)]
#[allow(unused_macros)]
macro_rules! cnf {
    ( $( $( $x:expr ),* );* ; ) => { [ $( &[ $( lit!( $x ) ),* ] as &[$crate::lit::Lit] ),* ] };
}

/// Shortcut for tests
#[cfg(test)]
#[allow(unused_macros)]
macro_rules! cnf_formula {
    ( $( $t:tt )* ) => { $crate::cnf::CnfFormula::from(cnf![ $($t)* ].iter().cloned()) };
}
