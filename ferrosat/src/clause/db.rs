//! Database for long clauses.
use std::mem::transmute;

use partial_ref::{partial, PartialRef};

use crate::context::{AssignmentP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, WatchlistsP};
use crate::lit::Lit;

use super::{ClauseAlloc, ClauseHeader, ClauseRef, HEADER_LEN};

/// Partitions of the clause database.
///
/// The long clauses are partitioned into 4 [`Tier`]s. This follows the approach described by
/// Chanseok Oh in ["Between SAT and UNSAT: The Fundamental Difference in CDCL
/// SAT"](https://doi.org/10.1007/978-3-319-24318-4_23), section 4.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Tier {
    Irred = 0,
    Core = 1,
    Mid = 2,
    Local = 3,
}

impl Tier {
    /// Total number of tiers.
    pub const fn count() -> usize {
        4
    }

    /// Cast an index into the corresponding tier.
    pub unsafe fn from_index(index: usize) -> Tier {
        debug_assert!(index < Tier::count());
        transmute(index as u8)
    }
}

#[derive(Default)]
/// Database for long clauses.
///
/// Removal of clauses from the `clauses` and the `by_tier` fields can be delayed. The clause
/// header's deleted and tier fields need to be checked when iterating over these. `by_tier` may
/// also contain duplicate entries.
pub struct ClauseDb {
    /// May contain deleted clauses, see above
    pub(super) clauses: Vec<ClauseRef>,
    /// May contain deleted and moved clauses, see above
    pub(super) by_tier: [Vec<ClauseRef>; Tier::count()],
    /// These counts should always be up to date
    pub(super) count_by_tier: [usize; Tier::count()],
    /// Size of deleted but not collected clauses
    pub(super) garbage_size: usize,
}

impl ClauseDb {
    /// The number of long clauses of a given tier.
    pub fn count_by_tier(&self, tier: Tier) -> usize {
        self.count_by_tier[tier as usize]
    }

    /// Total size in [`crate::lit::LitIdx`] words of not-yet-collected garbage.
    pub fn garbage_size(&self) -> usize {
        self.garbage_size
    }
}

/// Add a long clause to the database.
///
/// Watches the clause on its first two literals, which is why they have to be non-false (an
/// asserting clause must have its asserted literal first, see [`crate::analyze_conflict`]).
pub fn add_clause(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP, mut WatchlistsP),
    header: ClauseHeader,
    lits: &[Lit],
) -> ClauseRef {
    let tier = header.tier();

    let cref = ctx.part_mut(ClauseAllocP).add_clause(header, lits);

    ctx.part_mut(WatchlistsP)
        .watch_clause(cref, [lits[0], lits[1]]);

    let db = ctx.part_mut(ClauseDbP);

    db.clauses.push(cref);
    db.by_tier[tier as usize].push(cref);
    db.count_by_tier[tier as usize] += 1;

    cref
}

/// Change the tier of a long clause.
///
/// This is a noop for a clause already of the specified tier.
pub fn set_clause_tier(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP),
    cref: ClauseRef,
    tier: Tier,
) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let db = ctx.part_mut(ClauseDbP);

    let old_tier = alloc.header(cref).tier();
    if old_tier != tier {
        db.count_by_tier[old_tier as usize] -= 1;
        db.count_by_tier[tier as usize] += 1;

        alloc.header_mut(cref).set_tier(tier);
        db.by_tier[tier as usize].push(cref);
    }
}

/// Delete a long clause from the database.
///
/// The clause keeps its storage until the next garbage collection.
pub fn delete_clause(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP),
    cref: ClauseRef,
) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let db = ctx.part_mut(ClauseDbP);

    let header = alloc.header_mut(cref);

    debug_assert!(
        !header.deleted(),
        "delete_clause for already deleted clause"
    );

    header.set_deleted(true);

    db.count_by_tier[header.tier() as usize] -= 1;

    db.garbage_size += header.len() + HEADER_LEN;
}

/// Delete a clause unless it is currently active in the implication graph.
///
/// Returns whether the clause was deleted. Used by reduction passes, which must not remove the
/// reason clause of an implied literal still on the trail.
pub fn try_delete_clause(
    mut ctx: partial!(
        Context,
        mut ClauseDbP,
        mut ClauseAllocP,
        mut WatchlistsP,
        AssignmentP,
        ImplGraphP
    ),
    cref: ClauseRef,
) -> bool {
    let header = ctx.part(ClauseAllocP).header(cref);

    if header.active() {
        return false;
    }

    delete_clause(ctx.borrow(), cref);
    true
}

/// Delete a long clause and immediately remove its watch entries.
///
/// Plain [`delete_clause`] leaves watches in place until the next garbage collection, which is
/// fine for ordinary learnt-clause cleanup: a stale watch to a deleted *learnt* clause still
/// points at literals that were never changed, so it is merely wasted work, never unsound.
/// Passes that change what a clause's literals *mean* instead of just forgetting it — equivalent
/// literal substitution, variable elimination — cannot rely on that, since the freed words may
/// describe an unrelated clause by the time the stale watch is next followed. Those callers must
/// unwatch before deleting.
pub fn delete_clause_unwatched(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP, mut WatchlistsP),
    cref: ClauseRef,
) {
    let lits = ctx.part(ClauseAllocP).clause(cref).lits();
    let (watched_0, watched_1) = (lits[0], lits[1]);

    let watchlists = ctx.part_mut(WatchlistsP);
    watchlists
        .watched_by_mut(!watched_0)
        .retain(|watch| watch.cref != cref);
    watchlists
        .watched_by_mut(!watched_1)
        .retain(|watch| watch.cref != cref);

    delete_clause(ctx.borrow(), cref);
}

/// Shrink a long clause in place by dropping the literal at `lits()[remove_pos]`.
///
/// Used by on-the-fly subsumption (see [`crate::analyze_conflict`]) and by [`crate::vivify`] to
/// drop a literal shown redundant without reallocating the clause. The removed literal is
/// swapped to the end and the stored length decremented; the freed word is reclaimed by the next
/// garbage collection.
///
/// `remove_pos` must not be 0 or 1: those literals are watched, and moving them would require
/// updating the watchlists. Callers needing to drop a watched literal should reorder the
/// clause's literals first, or fall back to deleting and re-adding the clause. The clause must
/// have more than 3 literals, since a ternary clause losing a literal becomes a binary clause,
/// which lives outside the clause database.
pub fn strengthen_in_place(mut ctx: partial!(Context, mut ClauseAllocP), cref: ClauseRef, remove_pos: usize) {
    let alloc = ctx.part_mut(ClauseAllocP);
    let clause = alloc.clause_mut(cref);
    let len = clause.header().len();

    debug_assert!(len > 3, "cannot shrink a ternary clause in place");
    debug_assert!(remove_pos >= 2, "cannot remove a watched literal in place");

    let lits = clause.lits_mut();
    lits.swap(remove_pos, len - 1);
    clause.header_mut().set_len(len - 1);
    clause.update_abstraction();
}

/// Call `f` for every non-deleted long clause, removing it from the database when `f` returns
/// `false`.
///
/// `f` may mutate the clause's literals (but not grow it) and must keep the length field
/// consistent.
pub fn filter_clauses(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP),
    mut f: impl FnMut(&mut ClauseAlloc, ClauseRef) -> bool,
) {
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let alloc = ctx.part_mut(ClauseAllocP);

    db.clauses.retain(|&cref| {
        if alloc.header(cref).deleted() {
            return false;
        }

        if f(alloc, cref) {
            true
        } else {
            let header = alloc.header_mut(cref);
            header.set_deleted(true);
            db.count_by_tier[header.tier() as usize] -= 1;
            db.garbage_size += header.len() + HEADER_LEN;
            false
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;
    use proptest::*;
    use std::cmp::max;

    use crate::clause::gc::collect_garbage;
    use crate::cnf::strategy::*;
    use crate::context::set_var_count;

    #[test]
    fn set_tiers_and_deletes() {
        let mut ctx = Context::default();

        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        let clauses = cnf_formula![
            1, 2, 3;
            4, -5, 6;
            -2, 3, -4;
            -3, 5, 2, 7, 5;
        ];

        let tiers = vec![Tier::Irred, Tier::Core, Tier::Mid, Tier::Local];
        let new_tiers = vec![Tier::Irred, Tier::Local, Tier::Local, Tier::Core];

        let mut crefs = vec![];

        for (clause, &tier) in clauses.iter().zip(tiers.iter()) {
            let mut header = ClauseHeader::new();
            header.set_tier(tier);
            let cref = add_clause(ctx.borrow(), header, clause);
            crefs.push(cref);
        }

        for (&cref, &tier) in crefs.iter().rev().zip(new_tiers.iter().rev()) {
            set_clause_tier(ctx.borrow(), cref, tier);
        }

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Core), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Mid), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Local), 2);

        delete_clause(ctx.borrow(), crefs[0]);
        delete_clause(ctx.borrow(), crefs[2]);

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Core), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Mid), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Local), 1);
    }

    proptest! {
        #[test]
        fn garbage_collection(
            input_a in cnf_formula(2..100usize, 500..1000, 3..30),
            input_b in cnf_formula(2..100usize, 0..500, 3..30),
        ) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), max(input_a.var_count(), input_b.var_count()));

            let mut crefs_a = vec![];

            for lits in input_a.iter() {
                let header = ClauseHeader::new();
                let cref = add_clause(ctx.borrow(), header, lits);
                crefs_a.push(cref);
            }

            for lits in input_b.iter() {
                let header = ClauseHeader::new();
                add_clause(ctx.borrow(), header, lits);
            }

            for cref in crefs_a {
                delete_clause(ctx.borrow(), cref);
                prop_assert!(ctx.part(ClauseDbP).garbage_size > 0);
                collect_garbage(ctx.borrow());
            }

            prop_assert!(
                ctx.part(ClauseDbP).garbage_size * 2 < ctx.part(ClauseAllocP).buffer_size()
            );
        }
    }
}
