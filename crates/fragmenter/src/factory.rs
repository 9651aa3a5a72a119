// Standard Library Imports
use std::collections::{BTreeMap, BTreeSet};

// External Crate Imports
use itertools::Itertools;
use molkit::{BondIdentifier, CanonicalOptions, MoleculeToolkit};
use tracing::{debug, trace};

// Local Crate Imports
use crate::{
    cache::LeafCache,
    cancellation::CancellationToken,
    combinations::{
        binomial, bond_as_value_cut_sets, combination_batches, cuttable_bonds, is_valid_split, prune,
    },
    errors::{ConfigurationError, FactoryError, IncomingMoleculeError, Result},
    record::{CutSet, Fingerprint, FragmentKey, FragmentValue, FragmentationRecord, HeavyAtoms},
    settings::{FingerprintSettings, FragmentationSettings, MAX_CUTS},
};

/// Every bond between a hydrogen and a heavier atom
const HYDROGEN_PATTERN: &str = "[#1]-[!#1]";
/// Tied key pieces are numbered every possible way, up to this many numberings
const MAX_LABELLINGS: usize = 720;

// Public API ==========================================================================================================

/// Everything that stays the same from one molecule to the next: the toolkit, the (already validated) bond pattern,
/// and the fragmentation settings. One engine can be shared by any number of threads
pub struct FragmentationEngine<T: MoleculeToolkit> {
    toolkit: T,
    pattern: T::Pattern,
    hydrogen_pattern: T::Pattern,
    settings: FragmentationSettings,
}

impl<T: MoleculeToolkit> FragmentationEngine<T> {
    pub fn new(toolkit: T, pattern: &str, settings: FragmentationSettings) -> Result<Self, ConfigurationError> {
        if !(1..=MAX_CUTS).contains(&settings.cut_count) {
            return Err(ConfigurationError::CutCount {
                cuts: settings.cut_count,
                max: MAX_CUTS,
            });
        }

        let parse_pattern = |pattern: &str| {
            toolkit
                .parse_pattern(pattern)
                .map_err(|source| ConfigurationError::Pattern {
                    pattern: pattern.to_owned(),
                    source,
                })
        };
        let pattern = parse_pattern(pattern)?;
        let hydrogen_pattern = parse_pattern(HYDROGEN_PATTERN)?;

        Ok(Self {
            toolkit,
            pattern,
            hydrogen_pattern,
            settings,
        })
    }

    #[must_use]
    pub const fn toolkit(&self) -> &T {
        &self.toolkit
    }

    #[must_use]
    pub const fn settings(&self) -> &FragmentationSettings {
        &self.settings
    }

    /// Binds a new factory to `molecule`. Empty and multi-component molecules are rejected before anything is cut
    pub fn factory<'t>(
        &'t self,
        id: impl Into<String>,
        molecule: T::Molecule,
        cancellation: &'t CancellationToken,
    ) -> Result<FragmentationFactory<'t, T>> {
        FragmentationFactory::new(self, id.into(), molecule, cancellation)
    }
}

/// Cuts up a single molecule. Every toolkit object the factory holds is released when it's closed or dropped
pub struct FragmentationFactory<'t, T: MoleculeToolkit> {
    engine: &'t FragmentationEngine<T>,
    cancellation: &'t CancellationToken,
    id: String,
    state: Option<OpenFactory<T>>,
}

impl<'t, T: MoleculeToolkit> FragmentationFactory<'t, T> {
    fn new(
        engine: &'t FragmentationEngine<T>,
        id: String,
        molecule: T::Molecule,
        cancellation: &'t CancellationToken,
    ) -> Result<Self> {
        let toolkit = &engine.toolkit;
        if toolkit.is_empty(&molecule) {
            return Err(IncomingMoleculeError::NoStructure.into());
        }
        if toolkit.is_multi_component(&molecule) {
            return Err(IncomingMoleculeError::MultiComponent.into());
        }

        let settings = &engine.settings;
        let hydrogenated = settings
            .adds_hydrogens()
            .then(|| toolkit.add_explicit_hydrogens(&molecule))
            .transpose()?;
        let options = settings.canonical_options(toolkit.has_stereocentres(&molecule));
        let leaves = LeafCache::new(settings.leaf_cache_size);

        Ok(Self {
            engine,
            cancellation,
            id,
            state: Some(OpenFactory {
                molecule,
                hydrogenated,
                options,
                leaves,
            }),
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.state.is_none()
    }

    /// Releases the molecule and everything derived from it; any further cutting fails with
    /// [`FactoryError::Closed`]
    pub fn close(&mut self) {
        if let Some(open) = self.state.take() {
            trace!(
                id = %self.id,
                hits = open.leaves.hits(),
                misses = open.leaves.misses(),
                "closing fragmentation factory"
            );
        }
    }

    /// Leaf cache hits and misses so far, or `None` once closed
    #[must_use]
    pub fn cache_statistics(&self) -> Option<(usize, usize)> {
        let leaves = &self.state.as_ref()?.leaves;
        Some((leaves.hits(), leaves.misses()))
    }

    /// A quick check that could rule out cutting this molecule `n` times, without building any fragments. A `true`
    /// doesn't promise that any cut will pass the filters
    pub fn can_cut_n_times(&self, n: usize, allow_bond_as_value: bool) -> Result<bool> {
        let engine = self.engine;
        let bonds = if n == 1 {
            self.single_cut_bonds()?
        } else {
            let (parent, _) = self.parent(false)?;
            cuttable_bonds(&engine.toolkit, parent, &engine.pattern, n)?
        };
        let bond_as_value = n == 2 && allow_bond_as_value && !bonds.is_empty();
        Ok(n > 0 && (bonds.len() >= n || bond_as_value))
    }

    /// Cuts each matching bond in turn, keeping both readings of every cut: each side takes a turn as the key,
    /// unless it has no heavy atoms
    pub fn cut_along_matching_bonds(&mut self) -> Result<BTreeSet<FragmentationRecord>> {
        let bonds = self.single_cut_bonds()?;
        let bond_count = bonds.len();

        let mut cutter = self.cutter(true)?;
        let mut records = BTreeSet::new();
        for bond in bonds {
            records.extend(cutter.single_cut(bond)?);
        }

        debug!(id = %self.id, bonds = bond_count, records = records.len(), "cut along matching bonds");
        Ok(records)
    }

    /// Cuts every bond in `cut_set` at once, returning `None` if that doesn't give a key and value or if they're
    /// rejected by the filters. A single bond is read with the smaller side as the value
    pub fn cut_along_combination(&mut self, cut_set: &CutSet) -> Result<Option<FragmentationRecord>> {
        self.cutter(cut_set.cut_count() == 1)?.combination_cut(cut_set)
    }

    /// Prunes `cut_sets` down to those that split the molecule into a key and a value, then cuts along each
    pub fn cut_along_combinations(
        &mut self,
        cut_sets: impl IntoIterator<Item = CutSet>,
    ) -> Result<BTreeSet<FragmentationRecord>> {
        let cut_sets: Vec<_> = cut_sets.into_iter().collect();
        let candidates = cut_sets.len();
        let valid = prune(cut_sets, |cut_set| self.is_valid(cut_set))?;
        trace!(id = %self.id, kept = valid.len(), pruned = candidates - valid.len(), "pruned cut sets");

        let mut records = BTreeSet::new();
        for cut_set in &valid {
            records.extend(self.cut_along_combination(cut_set)?);
        }
        Ok(records)
    }

    /// Every record for the configured number of cuts
    pub fn fragment(&mut self) -> Result<BTreeSet<FragmentationRecord>> {
        self.check_cancelled()?;
        let engine = self.engine;
        let cut_count = engine.settings.cut_count;

        let records = if cut_count == 1 {
            self.cut_along_matching_bonds()?
        } else {
            let (parent, _) = self.parent(false)?;
            let candidates = cuttable_bonds(&engine.toolkit, parent, &engine.pattern, cut_count)?;
            debug!(
                id = %self.id,
                candidates = candidates.len(),
                combinations = binomial(candidates.len(), cut_count),
                "enumerating cut sets"
            );

            let mut records = BTreeSet::new();
            for batch in combination_batches(&candidates, cut_count) {
                self.check_cancelled()?;
                records.extend(self.cut_along_combinations(batch)?);
            }
            if engine.settings.allows_bond_as_value() {
                records.extend(self.cut_along_combinations(bond_as_value_cut_sets(&candidates))?);
            }
            records
        };

        if let Some((hits, misses)) = self.cache_statistics() {
            trace!(id = %self.id, hits, misses, "leaf cache usage");
        }
        Ok(records)
    }
}

// Private Types =======================================================================================================

struct OpenFactory<T: MoleculeToolkit> {
    molecule: T::Molecule,
    // NOTE: Only present when single cuts should also cut off hydrogens
    hydrogenated: Option<T::Molecule>,
    options: CanonicalOptions,
    leaves: LeafCache<LeafId<T>, Leaf>,
}

/// Fragments of the hydrogenated parent never share an identity with those of the plain parent
type LeafId<T> = (bool, <T as MoleculeToolkit>::FragmentId);

#[derive(Clone, Eq, PartialEq, Debug)]
struct Leaf {
    smiles: String,
    heavy_atoms: usize,
}

/// A piece of the key, still labelled with the position of the bond it was cut from
struct KeyPiece<'m, M> {
    molecule: &'m M,
    label: u16,
    unlabelled: Leaf,
}

/// Borrows everything needed to cut one parent molecule
struct Cutter<'a, T: MoleculeToolkit> {
    engine: &'a FragmentationEngine<T>,
    id: &'a str,
    parent: &'a T::Molecule,
    hydrogenated: bool,
    options: CanonicalOptions,
    leaves: &'a mut LeafCache<LeafId<T>, Leaf>,
}

// Private Helper Functions ============================================================================================

impl<T: MoleculeToolkit> FragmentationFactory<'_, T> {
    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            Err(FactoryError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn parent(&self, with_hydrogens: bool) -> Result<(&T::Molecule, bool)> {
        let open = self.state.as_ref().ok_or(FactoryError::Closed)?;
        Ok(match &open.hydrogenated {
            Some(hydrogenated) if with_hydrogens => (hydrogenated, true),
            _ => (&open.molecule, false),
        })
    }

    fn cutter(&mut self, with_hydrogens: bool) -> Result<Cutter<'_, T>> {
        let open = self.state.as_mut().ok_or(FactoryError::Closed)?;
        let (parent, hydrogenated) = match &open.hydrogenated {
            Some(hydrogenated) if with_hydrogens => (hydrogenated, true),
            _ => (&open.molecule, false),
        };
        Ok(Cutter {
            engine: self.engine,
            id: &self.id,
            parent,
            hydrogenated,
            options: open.options,
            leaves: &mut open.leaves,
        })
    }

    fn single_cut_bonds(&self) -> Result<BTreeSet<BondIdentifier>> {
        let toolkit = &self.engine.toolkit;
        let (parent, hydrogenated) = self.parent(true)?;
        let mut bonds = toolkit.matching_bonds(parent, &self.engine.pattern);
        if hydrogenated {
            bonds.extend(toolkit.matching_bonds(parent, &self.engine.hydrogen_pattern));
        }
        Ok(bonds)
    }

    fn is_valid(&self, cut_set: &CutSet) -> Result<bool> {
        let (parent, _) = self.parent(cut_set.cut_count() == 1)?;
        let attachment_counts = self.engine.toolkit.attachment_counts(parent, &cut_set.bonds())?;
        // NOTE: When a bond becomes the value, cutting it once is enough to separate the two halves of the key
        let cut_count = match cut_set {
            CutSet::Bonds(bonds) => bonds.len(),
            CutSet::BondAsValue(_) => 1,
        };
        Ok(is_valid_split(&attachment_counts, cut_count))
    }
}

impl<T: MoleculeToolkit> Cutter<'_, T> {
    fn single_cut(&mut self, bond: BondIdentifier) -> Result<Vec<FragmentationRecord>> {
        let pieces = self.engine.toolkit.split(self.parent, &[bond])?;
        let [first, second] = pieces.as_slice() else {
            return Ok(Vec::new());
        };

        let mut records = Vec::with_capacity(2);
        for (key, value) in [(first, second), (second, first)] {
            records.extend(self.assemble(&[key], value, 1)?);
        }
        Ok(records)
    }

    fn combination_cut(&mut self, cut_set: &CutSet) -> Result<Option<FragmentationRecord>> {
        let engine = self.engine;
        let toolkit = &engine.toolkit;
        let pieces = toolkit.split(self.parent, &cut_set.bonds())?;

        match cut_set {
            CutSet::BondAsValue(bond) => {
                let [first, second] = pieces.as_slice() else {
                    return Ok(None);
                };
                // NOTE: Both halves were labelled 1 by the cut, but the value needs to tell them apart
                let second = toolkit.relabel_attachments(second, &BTreeMap::from([(1, 2)]));
                let value = toolkit.bond_fragment(self.parent, bond)?;
                self.assemble(&[first, &second], &value, 2)
            }
            CutSet::Bonds(bonds) if bonds.len() == 1 => {
                let [first, second] = pieces.as_slice() else {
                    return Ok(None);
                };
                let readings = [self.assemble(&[first], second, 1)?, self.assemble(&[second], first, 1)?];
                Ok(readings.into_iter().flatten().min_by(|a, b| {
                    let size = |r: &FragmentationRecord| r.value.heavy_atoms.changing;
                    size(a).cmp(&size(b)).then_with(|| a.value.smiles.cmp(&b.value.smiles))
                }))
            }
            CutSet::Bonds(bonds) => {
                let cut_count = bonds.len();
                let attachment_counts: Vec<_> =
                    pieces.iter().map(|p| toolkit.attachment_labels(p).len()).collect();
                if !is_valid_split(&attachment_counts, cut_count) {
                    return Ok(None);
                }

                let (values, keys): (Vec<_>, Vec<_>) =
                    pieces.iter().zip(attachment_counts).partition(|&(_, count)| count == cut_count);
                let [(value, _)] = values.as_slice() else {
                    return Ok(None);
                };
                let keys: Vec<_> = keys.into_iter().map(|(piece, _)| piece).collect();
                self.assemble(&keys, value, cut_count)
            }
        }
    }

    /// Numbers the attachment points of the key pieces, then writes out the key and value. Key pieces are numbered
    /// from smallest to largest (then by their unlabelled canonical strings); pieces that still tie are numbered
    /// whichever way gives the lexically smallest value
    fn assemble(
        &mut self,
        key_pieces: &[&T::Molecule],
        value: &T::Molecule,
        cut_count: usize,
    ) -> Result<Option<FragmentationRecord>> {
        let engine = self.engine;
        let toolkit = &engine.toolkit;

        let mut pieces = Vec::with_capacity(key_pieces.len());
        for &molecule in key_pieces {
            let Some(&label) = toolkit.attachment_labels(molecule).first() else {
                return Ok(None);
            };
            let unlabelled = self.leaf(&toolkit.relabel_attachments(molecule, &BTreeMap::from([(label, 0)])))?;
            pieces.push(KeyPiece {
                molecule,
                label,
                unlabelled,
            });
        }

        let heavy_atoms = HeavyAtoms {
            changing: toolkit.heavy_atom_count(value),
            unchanging: pieces.iter().map(|p| p.unlabelled.heavy_atoms).sum(),
        };
        if heavy_atoms.unchanging == 0 || !engine.settings.passes_filters(heavy_atoms) {
            trace!(id = self.id, ?heavy_atoms, "rejected by filters");
            return Ok(None);
        }

        pieces.sort_by(|a, b| {
            let rank = |p: &KeyPiece<_>| (p.unlabelled.heavy_atoms, p.unlabelled.smiles.clone());
            rank(a).cmp(&rank(b))
        });

        let mut best: Option<(Leaf, Vec<usize>)> = None;
        for order in labellings(&pieces) {
            let relabelled = toolkit.relabel_attachments(value, &value_labels(&pieces, &order));
            let leaf = self.leaf(&relabelled)?;
            if best.as_ref().is_none_or(|(best, _)| leaf.smiles < best.smiles) {
                best = Some((leaf, order));
            }
        }
        let Some((value_leaf, order)) = best else {
            return Ok(None);
        };

        let mut key_smiles = Vec::with_capacity(order.len());
        let mut fingerprints = Vec::new();
        for (position, &index) in order.iter().enumerate() {
            let piece = &pieces[index];
            let label = attachment_label(position);
            let relabelled = toolkit.relabel_attachments(piece.molecule, &BTreeMap::from([(piece.label, label)]));
            key_smiles.push(self.leaf(&relabelled)?.smiles);

            if let Some(FingerprintSettings { radius, bits }) = engine.settings.fingerprint {
                let bits = toolkit.attachment_fingerprint(&relabelled, label, radius, bits)?;
                fingerprints.push(Fingerprint::from(bits));
            }
        }

        let key = FragmentKey::new(key_smiles.join("."), cut_count);
        let value = FragmentValue {
            smiles: value_leaf.smiles,
            id: self.id.to_owned(),
            heavy_atoms,
            fingerprints,
        };
        Ok(Some(FragmentationRecord::new(key, value)))
    }

    fn leaf(&mut self, fragment: &T::Molecule) -> Result<Leaf> {
        let engine = self.engine;
        let toolkit = &engine.toolkit;
        let options = self.options;
        let id = (self.hydrogenated, toolkit.fragment_identity(fragment));
        let leaf = self.leaves.get_or_try_insert_with(id, || {
            Ok::<_, molkit::ToolkitError>(Leaf {
                smiles: toolkit.canonicalize(fragment, options)?,
                heavy_atoms: toolkit.heavy_atom_count(fragment),
            })
        })?;
        Ok(leaf)
    }
}

/// Every order the (sorted) key pieces could be numbered in: runs of pieces that tie can be shuffled among
/// themselves, but no piece moves past one it doesn't tie with
fn labellings<M>(pieces: &[KeyPiece<'_, M>]) -> impl Iterator<Item = Vec<usize>> {
    let mut runs: Vec<Vec<usize>> = Vec::new();
    for (index, piece) in pieces.iter().enumerate() {
        match runs.last_mut() {
            Some(run) if pieces[run[0]].unlabelled == piece.unlabelled => run.push(index),
            _ => runs.push(vec![index]),
        }
    }

    runs.into_iter()
        .map(|run| {
            let length = run.len();
            run.into_iter().permutations(length)
        })
        .multi_cartesian_product()
        .map(|choice| choice.concat())
        .take(MAX_LABELLINGS)
}

fn value_labels<M>(pieces: &[KeyPiece<'_, M>], order: &[usize]) -> BTreeMap<u16, u16> {
    order
        .iter()
        .enumerate()
        .map(|(position, &index)| (pieces[index].label, attachment_label(position)))
        .collect()
}

fn attachment_label(position: usize) -> u16 {
    u16::try_from(position + 1).unwrap_or(u16::MAX)
}

// Module Tests ========================================================================================================
