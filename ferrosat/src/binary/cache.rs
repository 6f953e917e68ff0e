//! Transitive binary-implication cache.
//!
//! Probing derives, for each probed literal, the full set of literals forced true along the way
//! to a fixpoint (see [`crate::probe`]) — a strict superset of what a single binary clause would
//! give directly. Caching that set per literal lets [`crate::vivify`] and later probing rounds
//! answer "does `a` transitively imply `b`?" with a lookup instead of replaying propagation, the
//! way CryptoMiniSat's implication cache backs its own vivifier fast path.
//!
//! The cache is a snapshot, not a live index: it goes stale the moment a clause is added, removed
//! or rewritten, so callers must only trust it within a single simplification episode and must
//! [`TransitiveCache::clear`] it before the next one.

use ferrosat_formula::Lit;

/// Per-literal set of literals known to be implied transitively.
#[derive(Default)]
pub struct TransitiveCache {
    implied: Vec<Vec<Lit>>,
}

impl TransitiveCache {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.implied.resize(count * 2, vec![]);
    }

    /// Literals known to be forced true whenever `lit` is true.
    pub fn implied(&self, lit: Lit) -> &[Lit] {
        &self.implied[lit.code()]
    }

    /// Whether `lit` transitively implies `other`, per the cached snapshot.
    pub fn implies(&self, lit: Lit, other: Lit) -> bool {
        self.implied[lit.code()].binary_search(&other).is_ok()
    }

    /// Record the full set of literals implied by `lit`, replacing any previous entry.
    ///
    /// `lits` need not be sorted or deduplicated; this does both so [`TransitiveCache::implies`]
    /// can binary search.
    pub fn set_implied(&mut self, lit: Lit, mut lits: Vec<Lit>) {
        lits.sort_unstable();
        lits.dedup();
        self.implied[lit.code()] = lits;
    }

    /// Drop every cached entry.
    ///
    /// Every inprocessing pass that changes clauses invalidates the cache; this is called once
    /// per simplification episode rather than threaded through every mutation site.
    pub fn clear(&mut self) {
        for entry in &mut self.implied {
            entry.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ferrosat_formula::Var;

    #[test]
    fn records_and_queries_implications() {
        let mut cache = TransitiveCache::default();
        cache.set_var_count(3);

        let a = Var::from_index(0).positive();
        let b = Var::from_index(1).positive();
        let c = Var::from_index(2).negative();

        cache.set_implied(a, vec![c, b, b]);

        assert!(cache.implies(a, b));
        assert!(cache.implies(a, c));
        assert!(!cache.implies(a, !b));
        assert_eq!(cache.implied(a).len(), 2);
    }

    #[test]
    fn clear_drops_every_entry() {
        let mut cache = TransitiveCache::default();
        cache.set_var_count(2);

        let a = Var::from_index(0).positive();
        let b = Var::from_index(1).positive();
        cache.set_implied(a, vec![b]);

        cache.clear();

        assert!(cache.implied(a).is_empty());
    }
}
