//! Check unsatisfiability proofs.
//!
//! The actual checker lives in the standalone [`ferrosat_checker`] crate, shared with
//! `ferrosat-lrat` and other downstream tools. This module re-exports the pieces the solver
//! itself needs for on-the-fly checking while solving.
pub use ferrosat_checker::{
    Checker, CheckerError, CheckedProofStep, ProofProcessor, ProofTranscriptProcessor,
    ProofTranscriptStep,
};
