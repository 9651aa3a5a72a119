// Standard Library Imports
use std::collections::BTreeSet;

// External Crate Imports
use itertools::Itertools;
use molkit::{BondIdentifier, MoleculeToolkit};

// Local Crate Imports
use crate::record::CutSet;

/// How many combinations are generated between checks for cancellation
pub const COMBINATION_BATCH: usize = 256;

// Public API ==========================================================================================================

/// The bonds that are worth trying to cut `cut_count` at a time. Any bond matching `pattern` can be cut on its own,
/// but cutting several bonds at once only leaves `cut_count + 1` pieces if every one of them is acyclic
pub fn cuttable_bonds<T: MoleculeToolkit>(
    toolkit: &T,
    molecule: &T::Molecule,
    pattern: &T::Pattern,
    cut_count: usize,
) -> molkit::Result<BTreeSet<BondIdentifier>> {
    let matching = toolkit.matching_bonds(molecule, pattern);
    match cut_count {
        0 => Ok(BTreeSet::new()),
        1 => Ok(matching),
        _ => matching
            .into_iter()
            .filter_map(|bond| match toolkit.is_ring_bond(molecule, &bond) {
                Ok(true) => None,
                Ok(false) => Some(Ok(bond)),
                Err(error) => Some(Err(error)),
            })
            .collect(),
    }
}

/// Every way of picking `k` of the `candidates`
#[must_use]
pub fn combinations(candidates: &BTreeSet<BondIdentifier>, k: usize) -> BTreeSet<CutSet> {
    combination_batches(candidates, k).flatten().collect()
}

/// The same combinations as [`combinations()`], but produced lazily, [`COMBINATION_BATCH`] at a time
pub fn combination_batches(
    candidates: &BTreeSet<BondIdentifier>,
    k: usize,
) -> impl Iterator<Item = Vec<CutSet>> + '_ {
    candidates
        .iter()
        .copied()
        .combinations(k)
        // NOTE: Choosing zero bonds yields a single empty combination, which isn't a cut at all
        .filter(|bonds| !bonds.is_empty())
        .map(CutSet::from_iter)
        .batching(|combinations| {
            let batch: Vec<_> = combinations.take(COMBINATION_BATCH).collect();
            (!batch.is_empty()).then_some(batch)
        })
}

/// Drops every cut set that `is_valid` rejects; nothing is ever added
pub fn prune<E>(
    cut_sets: impl IntoIterator<Item = CutSet>,
    mut is_valid: impl FnMut(&CutSet) -> Result<bool, E>,
) -> Result<BTreeSet<CutSet>, E> {
    cut_sets
        .into_iter()
        .filter_map(|cut_set| is_valid(&cut_set).map(|valid| valid.then_some(cut_set)).transpose())
        .collect()
}

/// Given how many attachment points each piece of a cut would have, could those pieces make a key and a value? For
/// a single cut, that's any cut giving two pieces. Otherwise, there must be `cut_count + 1` pieces: one value holding
/// every attachment point, and `cut_count` key pieces holding one each
#[must_use]
pub fn is_valid_split(attachment_counts: &[usize], cut_count: usize) -> bool {
    if attachment_counts.len() != cut_count + 1 {
        return false;
    }
    if cut_count == 1 {
        return true;
    }
    let (values, keys): (Vec<_>, Vec<_>) = attachment_counts.iter().partition(|&&c| c == cut_count);
    values.len() == 1 && keys.iter().all(|&&c| c == 1)
}

/// The extra double-cut set for every candidate bond, in which the bond itself becomes the value
#[must_use]
pub fn bond_as_value_cut_sets(candidates: &BTreeSet<BondIdentifier>) -> BTreeSet<CutSet> {
    candidates.iter().copied().map(CutSet::BondAsValue).collect()
}

/// `n` choose `k`, saturating at `usize::MAX`
#[must_use]
pub fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k) as u128;
    let n = n as u128;
    // NOTE: Every partial product is itself a binomial coefficient, so the division is always exact
    let result = (0..k).try_fold(1u128, |acc, i| acc.checked_mul(n - i).map(|product| product / (i + 1)));
    result.and_then(|r| usize::try_from(r).ok()).unwrap_or(usize::MAX)
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use molkit::SmilesToolkit;

    use super::*;

    const TOOLKIT: SmilesToolkit = SmilesToolkit;

    fn chain(n: usize) -> BTreeSet<BondIdentifier> {
        (0..n).map(|i| BondIdentifier::new(i, i + 1, i)).collect()
    }

    #[test]
    fn binomials() {
        assert_eq!(binomial(5, 0), 1);
        assert_eq!(binomial(5, 2), 10);
        assert_eq!(binomial(10, 3), 120);
        assert_eq!(binomial(52, 5), 2_598_960);
        assert_eq!(binomial(3, 4), 0);
        assert_eq!(binomial(0, 0), 1);
    }

    #[test]
    fn combination_counts() {
        for n in 0..8 {
            for k in 1..=4 {
                assert_eq!(combinations(&chain(n), k).len(), binomial(n, k), "C({n}, {k})");
            }
        }
        assert!(combinations(&chain(2), 3).is_empty());
        assert!(combinations(&chain(5), 0).is_empty());

        let pairs = combinations(&chain(3), 2);
        assert!(pairs.iter().all(|cut_set| cut_set.cut_count() == 2));
    }

    #[test]
    fn batches_cover_every_combination() {
        let candidates = chain(20);
        let batches: Vec<_> = combination_batches(&candidates, 3).collect();
        let sizes: Vec<_> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![256, 256, 256, 256, 116]);

        let flattened: BTreeSet<_> = batches.into_iter().flatten().collect();
        assert_eq!(flattened, combinations(&candidates, 3));
        assert_eq!(combination_batches(&chain(2), 3).count(), 0);
    }

    #[test]
    fn pruning_only_removes() {
        let all = combinations(&chain(6), 2);
        let kept = prune(all.clone(), |cut_set| {
            Ok::<_, ()>(cut_set.bonds().iter().all(|b| b.index % 2 == 0))
        })
        .unwrap();
        assert_eq!(kept.len(), 3);
        assert!(kept.is_subset(&all));

        let everything = prune(all.clone(), |_| Ok::<_, ()>(true)).unwrap();
        assert_eq!(everything, all);

        let failed = prune(all, |cut_set| if cut_set.bonds()[0].index == 3 { Err("bad") } else { Ok(true) });
        assert_eq!(failed, Err("bad"));
    }

    #[test]
    fn valid_splits() {
        assert!(is_valid_split(&[1, 1], 1));
        assert!(!is_valid_split(&[2], 1));
        assert!(is_valid_split(&[1, 2, 1], 2));
        assert!(is_valid_split(&[1, 3, 1, 1], 3));
        // Three pieces in a row don't leave a single value holding every attachment point
        assert!(!is_valid_split(&[1, 2, 2, 1], 3));
        assert!(!is_valid_split(&[2, 2], 2));
        assert!(!is_valid_split(&[1, 1, 2], 1));
    }

    #[test]
    fn cuttable_bonds_depend_on_the_cut_count() {
        let molecule = TOOLKIT.parse("C1CCCCC1CC").unwrap();
        let pattern = TOOLKIT.parse_pattern("[#6]-[#6]").unwrap();
        assert_eq!(cuttable_bonds(&TOOLKIT, &molecule, &pattern, 1).unwrap().len(), 8);
        assert_eq!(cuttable_bonds(&TOOLKIT, &molecule, &pattern, 2).unwrap().len(), 2);
        assert_eq!(cuttable_bonds(&TOOLKIT, &molecule, &pattern, 3).unwrap().len(), 2);
        assert!(cuttable_bonds(&TOOLKIT, &molecule, &pattern, 0).unwrap().is_empty());
    }

    #[test]
    fn bond_as_value_is_its_own_cut_set() {
        let candidates = chain(3);
        let extra = bond_as_value_cut_sets(&candidates);
        assert_eq!(extra.len(), 3);
        assert!(extra.is_disjoint(&combinations(&candidates, 2)));
    }
}
