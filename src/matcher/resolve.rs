//! Reduce a many-to-many candidate list to a one-to-one correspondence.
//!
//! Each pass is keyed on one side (image or catalog). Among the candidates
//! that share a source on that side, only the one with the smallest
//! separation survives; on an exact tie the later candidate wins. Survivors
//! keep their input order.
//!
//! Running an image-keyed pass followed by a catalog-keyed pass (or the
//! reverse) leaves a list unique on both sides: a pass only removes entries,
//! and removal never reintroduces a duplicate on the side already resolved.
//!
//! This is a greedy, local resolution. It does not search for the assignment
//! with minimum total separation, and the two pass orders can disagree on
//! ambiguous input, which is why the order is an explicit [`PassOrder`].

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::join::SourceMatch;

/// Which source of a candidate a resolution pass is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchSide {
    Image,
    Catalog,
}

impl MatchSide {
    #[inline]
    fn key(self, candidate: &SourceMatch) -> usize {
        match self {
            MatchSide::Image => candidate.image,
            MatchSide::Catalog => candidate.catalog,
        }
    }
}

/// Order of the two resolution passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassOrder {
    /// Remove one-to-many (image duplicates) first, then many-to-one.
    #[default]
    ImageFirst,
    /// Remove many-to-one (catalog duplicates) first, then one-to-many.
    CatalogFirst,
}

impl PassOrder {
    /// The sides in the order they are resolved.
    pub fn sides(self) -> [MatchSide; 2] {
        match self {
            PassOrder::ImageFirst => [MatchSide::Image, MatchSide::Catalog],
            PassOrder::CatalogFirst => [MatchSide::Catalog, MatchSide::Image],
        }
    }
}

/// Keep, for every source on `side`, only its closest candidate.
///
/// Linear in the number of candidates. An empty input yields an empty output.
pub fn resolve_side(candidates: Vec<SourceMatch>, side: MatchSide) -> Vec<SourceMatch> {
    let mut best: HashMap<usize, usize> = HashMap::with_capacity(candidates.len());
    for (pos, candidate) in candidates.iter().enumerate() {
        match best.entry(side.key(candidate)) {
            Entry::Vacant(slot) => {
                slot.insert(pos);
            }
            Entry::Occupied(mut slot) => {
                // An earlier candidate survives only if strictly closer.
                if candidate.distance <= candidates[*slot.get()].distance {
                    slot.insert(pos);
                }
            }
        }
    }

    let mut keep = vec![false; candidates.len()];
    for &pos in best.values() {
        keep[pos] = true;
    }

    candidates
        .into_iter()
        .zip(keep)
        .filter_map(|(candidate, kept)| kept.then_some(candidate))
        .collect()
}

/// Resolve both sides in `order`, yielding a list where no image source and
/// no catalog source appears more than once.
pub fn resolve_one_to_one(candidates: Vec<SourceMatch>, order: PassOrder) -> Vec<SourceMatch> {
    order
        .sides()
        .into_iter()
        .fold(candidates, |remaining, side| resolve_side(remaining, side))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn c(image: usize, catalog: usize, distance: f64) -> SourceMatch {
        SourceMatch {
            image,
            catalog,
            distance,
        }
    }

    /// In-place pairwise elimination: for every i < j sharing a key, drop the
    /// farther one, re-scanning position i whenever entry i is dropped.
    fn pairwise_reference(mut list: Vec<SourceMatch>, side: MatchSide) -> Vec<SourceMatch> {
        let mut i = 0;
        while i < list.len() {
            let mut j = i + 1;
            let mut removed_i = false;
            while j < list.len() {
                if side.key(&list[i]) == side.key(&list[j]) {
                    if list[i].distance < list[j].distance {
                        list.remove(j);
                        continue;
                    }
                    list.remove(i);
                    removed_i = true;
                    break;
                }
                j += 1;
            }
            if !removed_i {
                i += 1;
            }
        }
        list
    }

    fn assert_unique(list: &[SourceMatch]) {
        let mut images = HashSet::new();
        let mut catalogs = HashSet::new();
        for m in list {
            assert!(images.insert(m.image), "image {} matched twice", m.image);
            assert!(catalogs.insert(m.catalog), "catalog {} matched twice", m.catalog);
        }
    }

    #[test]
    fn many_to_one_keeps_closest_image() {
        // I1, I2, I3 all candidates for C1
        let candidates = vec![c(1, 1, 2.0), c(2, 1, 1.0), c(3, 1, 3.0)];
        let resolved = resolve_side(candidates, MatchSide::Catalog);
        assert_eq!(resolved, vec![c(2, 1, 1.0)]);
    }

    #[test]
    fn one_to_many_keeps_closest_catalog() {
        let candidates = vec![c(1, 1, 0.5), c(1, 2, 0.9)];
        let resolved = resolve_side(candidates, MatchSide::Image);
        assert_eq!(resolved, vec![c(1, 1, 0.5)]);
    }

    #[test]
    fn empty_input() {
        assert!(resolve_side(Vec::new(), MatchSide::Image).is_empty());
        assert!(resolve_one_to_one(Vec::new(), PassOrder::CatalogFirst).is_empty());
    }

    #[test]
    fn tie_goes_to_later_candidate() {
        let candidates = vec![c(0, 5, 1.0), c(0, 6, 1.0), c(0, 7, 1.0)];
        let resolved = resolve_side(candidates.clone(), MatchSide::Image);
        assert_eq!(resolved, vec![c(0, 7, 1.0)]);
        assert_eq!(resolved, pairwise_reference(candidates, MatchSide::Image));
    }

    #[test]
    fn survivors_keep_input_order() {
        let candidates = vec![c(4, 0, 0.1), c(1, 1, 0.7), c(1, 2, 0.2), c(0, 3, 0.3)];
        let resolved = resolve_side(candidates, MatchSide::Image);
        assert_eq!(resolved, vec![c(4, 0, 0.1), c(1, 2, 0.2), c(0, 3, 0.3)]);
    }

    #[test]
    fn pass_order_matters_on_ambiguous_input() {
        // I0 - C0 (1.0), I0 - C1 (0.5), I1 - C1 (0.4)
        let candidates = vec![c(0, 0, 1.0), c(0, 1, 0.5), c(1, 1, 0.4)];

        // Image pass drops I0-C0, catalog pass then drops I0-C1: I0 unmatched.
        let image_first = resolve_one_to_one(candidates.clone(), PassOrder::ImageFirst);
        assert_eq!(image_first, vec![c(1, 1, 0.4)]);

        // Catalog pass drops I0-C1 first, leaving I0-C0 for the image pass.
        let catalog_first = resolve_one_to_one(candidates, PassOrder::CatalogFirst);
        assert_eq!(catalog_first, vec![c(0, 0, 1.0), c(1, 1, 0.4)]);
    }

    #[test]
    fn agrees_with_pairwise_elimination() {
        let mut state: u64 = 88172645463325252;
        let mut next = || -> u64 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        for _ in 0..200 {
            let n = (next() % 60) as usize;
            let candidates: Vec<SourceMatch> = (0..n)
                .map(|_| {
                    c(
                        (next() % 12) as usize,
                        (next() % 12) as usize,
                        // coarse distances so ties actually occur
                        (next() % 8) as f64 * 0.25,
                    )
                })
                .collect();

            for side in [MatchSide::Image, MatchSide::Catalog] {
                assert_eq!(
                    resolve_side(candidates.clone(), side),
                    pairwise_reference(candidates.clone(), side),
                );
            }

            for order in [PassOrder::ImageFirst, PassOrder::CatalogFirst] {
                let resolved = resolve_one_to_one(candidates.clone(), order);
                assert_unique(&resolved);
                let [first, second] = order.sides();
                let expected =
                    pairwise_reference(pairwise_reference(candidates.clone(), first), second);
                assert_eq!(resolved, expected);
            }
        }
    }
}
