// Standard Library Imports
use std::{
    cmp::Ordering,
    collections::BTreeSet,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
};

// External Crate Imports
use derive_more::{AsRef, Deref, From};
use itertools::Itertools;
use molkit::BondIdentifier;
use rust_decimal::Decimal;

// Public API ==========================================================================================================

/// One way of dissecting a molecule: the bonds that are broken at the same time
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum CutSet {
    Bonds(BTreeSet<BondIdentifier>),
    /// Both sides of a single bond become key, leaving the bond itself as a `[*:1]-[*:2]` value
    BondAsValue(BondIdentifier),
}

impl CutSet {
    #[must_use]
    pub fn single(bond: BondIdentifier) -> Self {
        Self::Bonds(BTreeSet::from([bond]))
    }

    /// The number of attachment points this cut leaves on the key
    #[must_use]
    pub fn cut_count(&self) -> usize {
        match self {
            Self::Bonds(bonds) => bonds.len(),
            Self::BondAsValue(_) => 2,
        }
    }

    #[must_use]
    pub fn bonds(&self) -> Vec<BondIdentifier> {
        match self {
            Self::Bonds(bonds) => bonds.iter().copied().collect(),
            Self::BondAsValue(bond) => vec![*bond],
        }
    }
}

impl FromIterator<BondIdentifier> for CutSet {
    fn from_iter<I: IntoIterator<Item = BondIdentifier>>(iter: I) -> Self {
        Self::Bonds(iter.into_iter().collect())
    }
}

impl Display for CutSet {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Bonds(bonds) => write!(f, "{{{}}}", bonds.iter().join(", ")),
            Self::BondAsValue(bond) => write!(f, "{{{bond} as value}}"),
        }
    }
}

/// The unchanging part of a molecule, with one attachment point per cut bond
#[derive(Clone, Debug)]
pub struct FragmentKey {
    pub smiles: String,
    pub cut_count: usize,
}

impl FragmentKey {
    #[must_use]
    pub fn new(smiles: impl Into<String>, cut_count: usize) -> Self {
        let smiles = smiles.into();
        Self { smiles, cut_count }
    }
}

// NOTE: Keys sort lexically by their canonical string first, so that a stream of records sorted by key groups
// together everything that can be paired
impl Ord for FragmentKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.smiles
            .cmp(&other.smiles)
            .then_with(|| self.cut_count.cmp(&other.cut_count))
    }
}

impl PartialOrd for FragmentKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FragmentKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FragmentKey {}

impl Hash for FragmentKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.smiles.hash(state);
        self.cut_count.hash(state);
    }
}

impl Display for FragmentKey {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.smiles)
    }
}

/// Heavy atoms in the changing (value) and unchanging (key) parts of a molecule
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct HeavyAtoms {
    pub changing: usize,
    pub unchanging: usize,
}

impl HeavyAtoms {
    /// Changing over unchanging heavy atoms, or `None` if nothing is left unchanged
    #[must_use]
    pub fn ratio(&self) -> Option<Decimal> {
        Decimal::from(self.changing).checked_div(Decimal::from(self.unchanging))
    }
}

/// A folded bit-vector describing the environment around one attachment point of a key
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default, AsRef, Deref, From)]
pub struct Fingerprint(Vec<u8>);

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        self.0.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
    }
}

/// The changing part of one molecule, tagged with the ID of the molecule it came from
#[derive(Clone, Debug)]
pub struct FragmentValue {
    pub smiles: String,
    pub id: String,
    pub heavy_atoms: HeavyAtoms,
    /// One per key attachment point, in label order (if fingerprints were requested)
    pub fingerprints: Vec<Fingerprint>,
}

impl FragmentValue {
    #[must_use]
    pub fn new(smiles: impl Into<String>, id: impl Into<String>, heavy_atoms: HeavyAtoms) -> Self {
        Self {
            smiles: smiles.into(),
            id: id.into(),
            heavy_atoms,
            fingerprints: Vec::new(),
        }
    }
}

// NOTE: Metadata (heavy atom counts and fingerprints) never takes part in comparisons
impl Ord for FragmentValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.smiles
            .cmp(&other.smiles)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for FragmentValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FragmentValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FragmentValue {}

impl Hash for FragmentValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.smiles.hash(state);
        self.id.hash(state);
    }
}

impl Display for FragmentValue {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.smiles)
    }
}

/// One accepted cut of one molecule
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FragmentationRecord {
    pub key: FragmentKey,
    pub value: FragmentValue,
}

impl FragmentationRecord {
    #[must_use]
    pub const fn new(key: FragmentKey, value: FragmentValue) -> Self {
        Self { key, value }
    }

    #[must_use]
    pub const fn cut_count(&self) -> usize {
        self.key.cut_count
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.value.id
    }
}

impl Ord for FragmentationRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .smiles
            .cmp(&other.key.smiles)
            .then_with(|| self.value.cmp(&other.value))
            .then_with(|| self.key.cut_count.cmp(&other.key.cut_count))
    }
}

impl PartialOrd for FragmentationRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Tab-separated: key, value, ID, cut count, changing and unchanging heavy atoms, then any fingerprints
impl Display for FragmentationRecord {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let Self { key, value } = self;
        let HeavyAtoms {
            changing,
            unchanging,
        } = value.heavy_atoms;
        write!(
            f,
            "{key}\t{value}\t{}\t{}\t{changing}\t{unchanging}",
            value.id, key.cut_count
        )?;
        if !value.fingerprints.is_empty() {
            write!(f, "\t{}", value.fingerprints.iter().join(","))?;
        }
        Ok(())
    }
}

// Module Tests ========================================================================================================
