// Standard Library Imports
use std::collections::{BTreeMap, btree_map::Entry};

// External Crate Imports
use fragmenter::{FragmentKey, FragmentValue};
use itertools::Itertools;
use tracing::debug;

// Local Crate Imports
use crate::{
    errors::Result,
    settings::PairSettings,
    transform::{ReactionNotation, TransformPair},
};

// Public API ==========================================================================================================

/// Every value seen for one key, in canonical order. Each value is stored once per molecule, or once overall when IDs
/// are being ignored
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ValueGroup {
    ignore_ids: bool,
    values: BTreeMap<(String, Option<String>), FragmentValue>,
}

impl ValueGroup {
    #[must_use]
    pub const fn new(ignore_ids: bool) -> Self {
        Self {
            ignore_ids,
            values: BTreeMap::new(),
        }
    }

    /// Returns `false` if an equivalent value was already present, in which case the first one is kept
    pub fn insert(&mut self, value: FragmentValue) -> bool {
        let id = (!self.ignore_ids).then(|| value.id.clone());
        match self.values.entry((value.smiles.clone(), id)) {
            Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &FragmentValue> {
        self.values.values()
    }

    /// Pairs up the values in this group: each `i < j` pair once, and then its mirror image too if reverse transforms
    /// were asked for
    pub fn transforms(
        &self,
        key: &FragmentKey,
        settings: &PairSettings,
        notation: &impl ReactionNotation,
    ) -> Result<Vec<TransformPair>> {
        let mut pairs = Vec::new();
        for (left, right) in self.values.values().tuple_combinations() {
            if !settings.allow_self_transforms && is_self_transform(left, right, settings.ignore_ids) {
                continue;
            }
            let pair = TransformPair::new(key, left, right, settings, notation)?;
            if settings.include_reverse {
                let reversed = pair.reversed(notation)?;
                pairs.extend([pair, reversed]);
            } else {
                pairs.push(pair);
            }
        }

        debug!(key = %key, values = self.len(), pairs = pairs.len(), "paired group");
        Ok(pairs)
    }
}

// Private Helper Functions ============================================================================================

/// The same substituent, or the same molecule cut two different ways
fn is_self_transform(left: &FragmentValue, right: &FragmentValue, ignore_ids: bool) -> bool {
    left.smiles == right.smiles || (!ignore_ids && left.id == right.id)
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use fragmenter::HeavyAtoms;
    use molkit::SmilesToolkit;

    use super::*;

    fn value(smiles: &str, id: &str) -> FragmentValue {
        FragmentValue::new(smiles, id, HeavyAtoms::default())
    }

    fn sides(pairs: &[TransformPair]) -> Vec<(&str, &str)> {
        pairs
            .iter()
            .map(|p| (p.left.smiles.as_str(), p.right.smiles.as_str()))
            .collect()
    }

    fn group(ignore_ids: bool, values: &[(&str, &str)]) -> ValueGroup {
        let mut group = ValueGroup::new(ignore_ids);
        for &(smiles, id) in values {
            group.insert(value(smiles, id));
        }
        group
    }

    #[test]
    fn grouping_by_id() {
        let mut group = ValueGroup::new(false);
        assert!(group.insert(value("A", "1")));
        assert!(group.insert(value("A", "2")));
        assert!(!group.insert(value("A", "1")));
        assert_eq!(group.len(), 2);

        let mut group = ValueGroup::new(true);
        assert!(group.insert(value("A", "1")));
        assert!(!group.insert(value("A", "2")));
        assert_eq!(group.len(), 1);
        // The first ID seen is the one that's kept
        assert_eq!(group.values().next().unwrap().id, "1");
    }

    #[test]
    fn pairs_each_combination_once() {
        let key = FragmentKey::new("K", 1);
        let group = group(false, &[("C", "3"), ("A", "1"), ("B", "2")]);
        let pairs = group.transforms(&key, &PairSettings::default(), &SmilesToolkit).unwrap();
        assert_eq!(sides(&pairs), vec![("A", "B"), ("A", "C"), ("B", "C")]);
        assert!(pairs.iter().all(|p| p.key.as_deref() == Some("K") && p.reverse.is_none()));

        let settings = PairSettings {
            include_reverse: true,
            ..PairSettings::default()
        };
        let pairs = group.transforms(&key, &settings, &SmilesToolkit).unwrap();
        assert_eq!(
            sides(&pairs),
            vec![("A", "B"), ("B", "A"), ("A", "C"), ("C", "A"), ("B", "C"), ("C", "B")]
        );
        assert_eq!(pairs.iter().filter(|p| p.reverse == Some(true)).count(), 3);
    }

    #[test]
    fn self_transforms() {
        let key = FragmentKey::new("K", 1);
        let twins = group(false, &[("A", "1"), ("A", "2")]);
        assert!(twins.transforms(&key, &PairSettings::default(), &SmilesToolkit).unwrap().is_empty());

        let allowed = PairSettings {
            allow_self_transforms: true,
            ..PairSettings::default()
        };
        assert_eq!(twins.transforms(&key, &allowed, &SmilesToolkit).unwrap().len(), 1);
        let both = PairSettings {
            include_reverse: true,
            ..allowed
        };
        assert_eq!(twins.transforms(&key, &both, &SmilesToolkit).unwrap().len(), 2);

        // One molecule, cut two ways, isn't a transform either
        let cut_twice = group(false, &[("A", "1"), ("B", "1")]);
        assert!(cut_twice.transforms(&key, &PairSettings::default(), &SmilesToolkit).unwrap().is_empty());
        let ignoring_ids = PairSettings {
            ignore_ids: true,
            ..PairSettings::default()
        };
        assert_eq!(cut_twice.transforms(&key, &ignoring_ids, &SmilesToolkit).unwrap().len(), 1);
    }

    #[test]
    fn reaction_errors_propagate() {
        let key = FragmentKey::new("K", 1);
        let broken = group(false, &[("[*:1]C", "1"), ("C(", "2")]);
        let settings = PairSettings {
            include_reaction_pattern: true,
            ..PairSettings::default()
        };
        assert!(broken.transforms(&key, &settings, &SmilesToolkit).is_err());
    }
}
