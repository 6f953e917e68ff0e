//! Unit propagation.
use partial_ref::{partial, PartialRef};

use crate::context::{
    AssignmentP, BinaryClausesP, ClauseAllocP, Context, ImplGraphP, TrailP, WatchlistsP,
};

pub mod assignment;
pub mod binary;
pub mod graph;
pub mod long;
pub mod watch;

pub use assignment::{backtrack, enqueue_assignment, full_restart, restart, Assignment, Trail};
pub use binary::propagate_binary;
pub use graph::{Conflict, ImplGraph, ImplNode, Reason};
pub use long::propagate_long;
pub use watch::{Watch, Watchlists};

/// Propagate all literals on the trail to fixpoint, across both binary and long clauses.
///
/// Returns `Err` as soon as a conflicting clause is found. The trail's queue head is left pointing
/// past every literal that was processed before the conflict, so [`crate::clause::gc`] and
/// conflict analysis see a consistent state.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
        mut ClauseAllocP,
        BinaryClausesP,
    ),
) -> Result<(), Conflict> {
    loop {
        let lit = match ctx.part_mut(TrailP).pop_queue() {
            Some(lit) => lit,
            None => return Ok(()),
        };

        propagate_binary(ctx.borrow(), lit)?;
        propagate_long(ctx.borrow(), lit)?;
    }
}
