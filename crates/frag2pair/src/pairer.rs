// Standard Library Imports
use std::collections::BTreeMap;

// External Crate Imports
use ahash::{HashSet, HashSetExt};
use fragmenter::{FragmentKey, FragmentationRecord};
use rayon::prelude::*;
use tracing::debug;

// Local Crate Imports
use crate::{
    errors::{PairError, Result},
    group::ValueGroup,
    settings::PairSettings,
    transform::{ReactionNotation, TransformPair},
};

// Public API ==========================================================================================================

/// Pairs up records that arrive sorted by key, holding only one group in memory at a time
pub struct StreamingPairer<N> {
    settings: PairSettings,
    notation: N,
    current: Option<(FragmentKey, ValueGroup)>,
    // NOTE: Only filled when sortedness is being verified
    finished_keys: HashSet<FragmentKey>,
    groups: usize,
}

impl<N: ReactionNotation> StreamingPairer<N> {
    pub fn new(settings: PairSettings, notation: N) -> Self {
        Self {
            settings,
            notation,
            current: None,
            finished_keys: HashSet::new(),
            groups: 0,
        }
    }

    /// Adds `record` to the current group. A record with a new key closes that group, and its pairs are returned
    pub fn push(&mut self, record: FragmentationRecord) -> Result<Vec<TransformPair>> {
        let FragmentationRecord { key, value } = record;

        let same_key = self.current.as_ref().is_some_and(|(current, _)| *current == key);
        if same_key {
            if let Some((_, group)) = &mut self.current {
                group.insert(value);
            }
            return Ok(Vec::new());
        }

        if self.settings.verify_sorted && self.finished_keys.contains(&key) {
            return Err(PairError::SortOrderViolation {
                key: key.smiles,
                id: value.id,
            });
        }

        let pairs = self.flush()?;
        let mut group = ValueGroup::new(self.settings.ignore_ids);
        group.insert(value);
        self.current = Some((key, group));
        Ok(pairs)
    }

    /// Closes the last group and returns its pairs
    pub fn finish(mut self) -> Result<Vec<TransformPair>> {
        let pairs = self.flush()?;
        debug!(groups = self.groups, "finished streaming pairs");
        Ok(pairs)
    }

    #[must_use]
    pub const fn groups(&self) -> usize {
        self.groups
    }

    fn flush(&mut self) -> Result<Vec<TransformPair>> {
        let Some((key, group)) = self.current.take() else {
            return Ok(Vec::new());
        };
        self.groups += 1;
        let pairs = group.transforms(&key, &self.settings, &self.notation)?;
        if self.settings.verify_sorted {
            self.finished_keys.insert(key);
        }
        Ok(pairs)
    }
}

/// Pairs up records that arrive in any order, holding every group in memory until the end
pub struct BatchPairer<N> {
    settings: PairSettings,
    notation: N,
    groups: BTreeMap<FragmentKey, ValueGroup>,
}

impl<N: ReactionNotation> BatchPairer<N> {
    pub fn new(settings: PairSettings, notation: N) -> Self {
        Self {
            settings,
            notation,
            groups: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, record: FragmentationRecord) {
        let FragmentationRecord { key, value } = record;
        let ignore_ids = self.settings.ignore_ids;
        self.groups
            .entry(key)
            .or_insert_with(|| ValueGroup::new(ignore_ids))
            .insert(value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Pairs every group, in key order
    pub fn finish(self) -> Result<Vec<TransformPair>> {
        let mut pairs = Vec::new();
        for (key, group) in &self.groups {
            pairs.extend(group.transforms(key, &self.settings, &self.notation)?);
        }
        debug!(groups = self.groups.len(), pairs = pairs.len(), "finished batch pairs");
        Ok(pairs)
    }

    /// The same pairs as [`BatchPairer::finish()`], in the same order, but with groups paired on the `rayon` thread
    /// pool
    pub fn finish_parallel(self) -> Result<Vec<TransformPair>> {
        let groups: Vec<_> = self.groups.iter().collect();
        debug!(groups = groups.len(), "pairing groups in parallel");
        let grouped_pairs: Vec<_> = groups
            .par_iter()
            .map(|(key, group)| group.transforms(key, &self.settings, &self.notation))
            .collect::<Result<_>>()?;
        let pairs: Vec<_> = grouped_pairs.into_iter().flatten().collect();
        debug!(groups = groups.len(), pairs = pairs.len(), "finished batch pairs");
        Ok(pairs)
    }
}

impl<N: ReactionNotation> Extend<FragmentationRecord> for BatchPairer<N> {
    fn extend<I: IntoIterator<Item = FragmentationRecord>>(&mut self, records: I) {
        for record in records {
            self.insert(record);
        }
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use fragmenter::{
        CancellationToken, FragmentValue, FragmentationEngine, FragmentationSettings, HeavyAtoms,
    };
    use molkit::{MoleculeToolkit, SmilesToolkit};
    use once_cell::sync::Lazy;

    use super::*;

    const TOOLKIT: SmilesToolkit = SmilesToolkit;

    static MOLECULES: Lazy<BTreeSet<FragmentationRecord>> = Lazy::new(|| {
        let settings = FragmentationSettings {
            cut_count: 1,
            ..FragmentationSettings::default()
        };
        let engine = FragmentationEngine::new(TOOLKIT, "[!#1]!@!=!#[!#1]", settings).unwrap();
        let cancellation = CancellationToken::new();
        let molecules = [
            ("toluene", "Cc1ccccc1"),
            ("phenol", "Oc1ccccc1"),
            ("aniline", "Nc1ccccc1"),
            ("ethylbenzene", "CCc1ccccc1"),
            ("benzoic-acid", "OC(=O)c1ccccc1"),
        ];
        let mut records = BTreeSet::new();
        for (id, smiles) in molecules {
            let molecule = TOOLKIT.parse(smiles).unwrap();
            let mut factory = engine.factory(id, molecule, &cancellation).unwrap();
            records.extend(factory.fragment().unwrap());
        }
        records
    });

    fn record(key: &str, value: &str, id: &str) -> FragmentationRecord {
        FragmentationRecord::new(
            FragmentKey::new(key, 1),
            FragmentValue::new(value, id, HeavyAtoms::default()),
        )
    }

    fn stream(settings: PairSettings, records: impl IntoIterator<Item = FragmentationRecord>) -> Result<Vec<TransformPair>> {
        let mut pairer = StreamingPairer::new(settings, TOOLKIT);
        let mut pairs = Vec::new();
        for record in records {
            pairs.extend(pairer.push(record)?);
        }
        pairs.extend(pairer.finish()?);
        Ok(pairs)
    }

    fn batch(settings: PairSettings, records: impl IntoIterator<Item = FragmentationRecord>) -> BatchPairer<SmilesToolkit> {
        let mut pairer = BatchPairer::new(settings, TOOLKIT);
        pairer.extend(records);
        pairer
    }

    #[test]
    fn one_key_two_values() {
        let records = [record("K1", "A", "1"), record("K1", "B", "2")];
        let pairs = stream(PairSettings::default(), records.clone()).unwrap();
        assert_eq!(pairs.len(), 1);
        let pair = &pairs[0];
        assert_eq!(pair.key.as_deref(), Some("K1"));
        assert_eq!((pair.left.smiles.as_str(), pair.left.id.as_str()), ("A", "1"));
        assert_eq!((pair.right.smiles.as_str(), pair.right.id.as_str()), ("B", "2"));

        let settings = PairSettings {
            include_reverse: true,
            ..PairSettings::default()
        };
        let pairs = batch(settings, records).finish().unwrap();
        let sides: Vec<_> = pairs.iter().map(|p| (p.left.id.as_str(), p.right.id.as_str())).collect();
        assert_eq!(sides, vec![("1", "2"), ("2", "1")]);
    }

    #[test]
    fn identical_values_are_not_paired() {
        let records = [record("K1", "A", "1"), record("K1", "A", "2")];
        assert!(stream(PairSettings::default(), records.clone()).unwrap().is_empty());
        let settings = PairSettings {
            allow_self_transforms: true,
            ..PairSettings::default()
        };
        assert_eq!(stream(settings, records).unwrap().len(), 1);
    }

    #[test]
    fn streaming_matches_batch() {
        let records = MOLECULES.clone();
        // Every substituent of benzene can be swapped for every other
        let settings = PairSettings {
            include_heavy_atom_counts: true,
            include_reaction_pattern: true,
            ..PairSettings::default()
        };
        let streamed = stream(settings, records.iter().cloned()).unwrap();
        assert!(streamed.len() >= 10);

        // Batch mode doesn't care about order
        let reversed: Vec<_> = records.iter().rev().cloned().collect();
        let batched = batch(settings, reversed.clone()).finish().unwrap();
        let parallel = batch(settings, reversed).finish_parallel().unwrap();
        assert_eq!(streamed, batched);
        assert_eq!(batched, parallel);
    }

    #[test]
    fn unsorted_streams_fail_fast() {
        let records = [
            record("X", "A", "1"),
            record("X", "B", "2"),
            record("Y", "A", "1"),
            record("Y", "B", "2"),
            record("X", "C", "3"),
        ];
        let mut pairer = StreamingPairer::new(PairSettings::default(), TOOLKIT);
        let mut flushed = Vec::new();
        for record in records.iter().take(4).cloned() {
            flushed.extend(pairer.push(record).unwrap());
        }
        // Only the first "X" group has been flushed so far
        assert_eq!(flushed.len(), 1);
        assert_eq!(
            pairer.push(records[4].clone()),
            Err(PairError::SortOrderViolation {
                key: "X".to_owned(),
                id: "3".to_owned()
            })
        );

        // Without verification, the second "X" group is quietly treated as a new group
        let settings = PairSettings {
            verify_sorted: false,
            ..PairSettings::default()
        };
        let pairs = stream(settings, records).unwrap();
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn counting_groups() {
        let records = [record("X", "A", "1"), record("Y", "A", "1"), record("Y", "B", "2")];
        let mut pairer = StreamingPairer::new(PairSettings::default(), TOOLKIT);
        for record in records.clone() {
            pairer.push(record).unwrap();
        }
        assert_eq!(pairer.groups(), 1);
        assert_eq!(pairer.finish().unwrap().len(), 1);

        let pairer = batch(PairSettings::default(), records);
        assert_eq!(pairer.len(), 2);
        assert!(!pairer.is_empty());
        assert!(BatchPairer::new(PairSettings::default(), TOOLKIT).finish().unwrap().is_empty());
        assert!(stream(PairSettings::default(), []).unwrap().is_empty());
    }
}
