//! Clause database reduction.
use std::mem::replace;

use partial_ref::{partial, PartialRef};

use crate::config::ClauseCleanType;
use crate::context::{AssignmentP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, WatchlistsP};
use crate::vec_mut_scan::VecMutScan;

use super::db::{set_clause_tier, try_delete_clause, Tier};
use super::ClauseHeader;

/// Sort key for a Local tier clause under a given cleaning metric.
///
/// Clauses sort with the *worst* ones first, since [`reduce_locals`] deletes off the front of the
/// sorted list: highest glue first for [`ClauseCleanType::Glue`], longest first for
/// [`ClauseCleanType::Size`], least-used first for [`ClauseCleanType::PropConfl`].
fn clean_key(header: &ClauseHeader, clean_type: ClauseCleanType) -> isize {
    match clean_type {
        ClauseCleanType::Glue => -(header.glue() as isize),
        ClauseCleanType::Size => -(header.len() as isize),
        ClauseCleanType::PropConfl => header.props_and_confl() as isize,
    }
}

/// Remove deleted and duplicate entries from the by_tier clause lists.
///
/// This has the side effect of setting the mark bit on all clauses of the tier.
pub fn dedup_and_mark_by_tier(
    mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP),
    tier: Tier,
) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let by_tier = &mut ctx.part_mut(ClauseDbP).by_tier[tier as usize];

    by_tier.retain(|&cref| {
        let header = alloc.header_mut(cref);
        let retain = !header.deleted() && !header.mark() && header.tier() == tier;
        if retain {
            header.set_mark(true);
        }
        retain
    })
}

/// Reduce the number of local tier clauses by deleting half of them, ranked by `clean_type`.
pub fn reduce_locals(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut WatchlistsP,
        AssignmentP,
        ImplGraphP
    ),
    clean_type: ClauseCleanType,
) {
    dedup_and_mark_by_tier(ctx.borrow(), Tier::Local);

    let mut locals = replace(
        &mut ctx.part_mut(ClauseDbP).by_tier[Tier::Local as usize],
        vec![],
    );

    locals.sort_unstable_by_key(|&cref| clean_key(ctx.part(ClauseAllocP).header(cref), clean_type));

    let mut to_delete = locals.len() / 2;

    let mut scan = VecMutScan::new(&mut locals);

    if to_delete > 0 {
        while let Some(cref) = scan.next() {
            ctx.part_mut(ClauseAllocP).header_mut(*cref).set_mark(false);

            if try_delete_clause(ctx.borrow(), *cref) {
                cref.remove();
                to_delete -= 1;
                if to_delete == 0 {
                    break;
                }
            }
        }
    }

    // Make sure to clear all marks
    while let Some(cref) = scan.next() {
        ctx.part_mut(ClauseAllocP).header_mut(*cref).set_mark(false);
    }

    drop(scan);

    ctx.part_mut(ClauseDbP).count_by_tier[Tier::Local as usize] = locals.len();
    ctx.part_mut(ClauseDbP).by_tier[Tier::Local as usize] = locals;
}

/// Reduce the number of mid tier clauses by moving inactive ones to the local tier.
pub fn reduce_mids(mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP)) {
    dedup_and_mark_by_tier(ctx.borrow(), Tier::Mid);

    let mut mids = replace(
        &mut ctx.part_mut(ClauseDbP).by_tier[Tier::Mid as usize],
        vec![],
    );

    mids.retain(|&cref| {
        let header = ctx.part_mut(ClauseAllocP).header_mut(cref);
        header.set_mark(false);

        if header.active() {
            header.set_active(false);
            true
        } else {
            set_clause_tier(ctx.borrow(), cref, Tier::Local);
            false
        }
    });

    ctx.part_mut(ClauseDbP).count_by_tier[Tier::Mid as usize] = mids.len();
    ctx.part_mut(ClauseDbP).by_tier[Tier::Mid as usize] = mids;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_key_orders_worst_first() {
        let mut low_glue = ClauseHeader::new();
        low_glue.set_glue(2);
        let mut high_glue = ClauseHeader::new();
        high_glue.set_glue(9);
        assert!(clean_key(&high_glue, ClauseCleanType::Glue) < clean_key(&low_glue, ClauseCleanType::Glue));

        let mut short = ClauseHeader::new();
        short.set_len(3);
        let mut long = ClauseHeader::new();
        long.set_len(8);
        assert!(clean_key(&long, ClauseCleanType::Size) < clean_key(&short, ClauseCleanType::Size));

        let mut rarely_used = ClauseHeader::new();
        rarely_used.set_props_and_confl(1);
        let mut often_used = ClauseHeader::new();
        often_used.set_props_and_confl(50);
        assert!(
            clean_key(&rarely_used, ClauseCleanType::PropConfl)
                < clean_key(&often_used, ClauseCleanType::PropConfl)
        );
    }
}
