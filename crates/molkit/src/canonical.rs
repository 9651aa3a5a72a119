// External Crate Imports
use itertools::Itertools;

// Local Crate Imports
use crate::{
    Element,
    molecule::{Atom, BondOrder, Chirality, Molecule, StereoRef},
    writer::{Style, write_smiles},
};

/// The number of complete labellings tried before ties are broken by taking the first candidate only
const SEARCH_BUDGET: usize = 2048;

// Public API ==========================================================================================================

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CanonicalOptions {
    /// Keep tetrahedral stereo tags (those on centres with four different substituents)
    pub chirality: bool,
    /// Give untagged centres a fixed configuration when they only have four different substituents because one of
    /// them is an attachment point
    pub prochiral_as_chiral: bool,
    /// Fold plain explicit hydrogens back into the atoms they're bonded to
    pub strip_hydrogens: bool,
}

impl Default for CanonicalOptions {
    fn default() -> Self {
        Self {
            chirality: true,
            prochiral_as_chiral: false,
            strip_hydrogens: true,
        }
    }
}

pub(crate) fn canonical_string(molecule: &Molecule, options: CanonicalOptions, style: Style) -> String {
    let mut molecule = if options.strip_hydrogens {
        molecule.without_explicit_hydrogens()
    } else {
        molecule.clone()
    };
    if !options.chirality {
        for atom in molecule.atoms_mut() {
            atom.chirality = None;
        }
    }

    molecule
        .into_components()
        .into_iter()
        .map(|component| canonical_component(component, options, style))
        .sorted()
        .join(".")
}

// Private Helper Functions ============================================================================================

fn canonical_component(mut molecule: Molecule, options: CanonicalOptions, style: Style) -> String {
    let ranks = refine(&molecule, initial_ranks(&molecule));
    perceive_stereo(&mut molecule, &ranks, options);

    let mut search = Search::new(&molecule, style);
    search.run(ranks);
    search.best.unwrap_or_default()
}

fn initial_ranks(molecule: &Molecule) -> Vec<usize> {
    let invariants: Vec<_> = molecule
        .atoms()
        .iter()
        .enumerate()
        .map(|(index, atom)| {
            (
                atom.element.map_or(0, Element::atomic_number),
                molecule.degree(index),
                atom.isotope,
                atom.charge,
                atom.hydrogens,
                atom.aromatic,
                atom.map,
            )
        })
        .collect();
    rank_by(&invariants)
}

/// Splits classes by their neighbours' classes (and the bonds to them) until nothing changes
fn refine(molecule: &Molecule, mut ranks: Vec<usize>) -> Vec<usize> {
    let mut classes = ranks.iter().unique().count();
    loop {
        let keys: Vec<(usize, Vec<(usize, BondOrder)>)> = (0..molecule.atom_count())
            .map(|atom| {
                let neighbors = molecule
                    .neighbors(atom)
                    .map(|(neighbor, bond)| (ranks[neighbor], molecule.bonds()[bond].order()))
                    .sorted()
                    .collect();
                (ranks[atom], neighbors)
            })
            .collect();
        ranks = rank_by(&keys);

        let refined_classes = ranks.iter().unique().count();
        if refined_classes == classes {
            return ranks;
        }
        classes = refined_classes;
    }
}

// NOTE: Atoms with equal keys share the rank of the first of them, so ranks aren't consecutive
fn rank_by<K: Ord>(keys: &[K]) -> Vec<usize> {
    let order = (0..keys.len()).sorted_by(|&a, &b| keys[a].cmp(&keys[b])).collect_vec();
    let mut ranks = vec![0; keys.len()];
    let mut rank = 0;
    for (position, &atom) in order.iter().enumerate() {
        if position > 0 && keys[order[position - 1]] != keys[atom] {
            rank = position;
        }
        ranks[atom] = rank;
    }
    ranks
}

// Implicit hydrogens are `None`, so they sort before every neighbouring atom
fn substituents(molecule: &Molecule, ranks: &[usize], atom: usize) -> Vec<Option<usize>> {
    let hydrogens = usize::from(molecule.atoms()[atom].hydrogens);
    std::iter::repeat_n(None, hydrogens)
        .chain(molecule.neighbors(atom).map(|(neighbor, _)| Some(ranks[neighbor])))
        .collect()
}

fn perceive_stereo(molecule: &mut Molecule, ranks: &[usize], options: CanonicalOptions) {
    let mut assignments = Vec::new();
    for atom in 0..molecule.atom_count() {
        let substituents = substituents(molecule, ranks, atom);
        let distinct = substituents.iter().all_unique();
        let this = &molecule.atoms()[atom];

        if this.chirality.is_some() {
            if !distinct {
                assignments.push((atom, None));
            }
            continue;
        }

        let tetrahedral = this.element.is_some()
            && !this.aromatic
            && substituents.len() == 4
            && molecule
                .neighbors(atom)
                .all(|(_, bond)| molecule.bonds()[bond].order() == BondOrder::Single);
        let prochiral = molecule
            .neighbors(atom)
            .any(|(neighbor, _)| molecule.atoms()[neighbor].is_attachment());
        if options.chirality && options.prochiral_as_chiral && distinct && tetrahedral && prochiral {
            let neighbors = molecule
                .neighbors(atom)
                .map(|(neighbor, _)| (Some(ranks[neighbor]), StereoRef::Atom(neighbor)))
                .chain((this.hydrogens == 1).then_some((None, StereoRef::Hydrogen)))
                .sorted_by_key(|&(rank, _)| rank)
                .map(|(_, neighbor)| neighbor)
                .collect();
            let chirality = Chirality {
                neighbors,
                clockwise: false,
            };
            assignments.push((atom, Some(chirality)));
        }
    }

    for (atom, chirality) in assignments {
        molecule.atoms_mut()[atom].chirality = chirality;
    }
}

/// Two tied atoms hanging off the same neighbour, by the same kind of bond, can be swapped without changing the
/// molecule, so promoting either one leads to the same strings
fn interchangeable(molecule: &Molecule, a: usize, b: usize) -> bool {
    let [Ok((a_neighbor, a_bond)), Ok((b_neighbor, b_bond))] =
        [a, b].map(|atom| molecule.neighbors(atom).exactly_one())
    else {
        return false;
    };
    let (a, b) = (&molecule.atoms()[a], &molecule.atoms()[b]);
    let identity = |atom: &Atom| (atom.element, atom.isotope, atom.charge, atom.hydrogens, atom.aromatic, atom.map);
    a_neighbor == b_neighbor
        && molecule.bonds()[a_bond].order() == molecule.bonds()[b_bond].order()
        && a.chirality.is_none()
        && b.chirality.is_none()
        && identity(a) == identity(b)
}

/// Breaks ties in the lowest tied class by promoting each of its atoms in turn, keeping the smallest string written
/// once every atom has a rank of its own
struct Search<'m> {
    molecule: &'m Molecule,
    style: Style,
    best: Option<String>,
    leaves: usize,
}

impl<'m> Search<'m> {
    const fn new(molecule: &'m Molecule, style: Style) -> Self {
        Self {
            molecule,
            style,
            best: None,
            leaves: 0,
        }
    }

    fn run(&mut self, ranks: Vec<usize>) {
        let ranks = refine(self.molecule, ranks);
        let Some(tied) = ranks.iter().copied().duplicates().min() else {
            let smiles = write_smiles(self.molecule, &ranks, self.style);
            self.leaves += 1;
            if self.best.as_ref().is_none_or(|best| smiles < *best) {
                self.best = Some(smiles);
            }
            return;
        };

        let mut candidates: Vec<usize> = Vec::new();
        for atom in (0..ranks.len()).filter(|&atom| ranks[atom] == tied) {
            if !candidates.iter().any(|&seen| interchangeable(self.molecule, seen, atom)) {
                candidates.push(atom);
            }
        }
        for (nth, &chosen) in candidates.iter().enumerate() {
            if nth > 0 && self.leaves >= SEARCH_BUDGET {
                break;
            }
            let promoted = ranks
                .iter()
                .enumerate()
                .map(|(atom, &rank)| 2 * rank + usize::from(rank == tied && atom != chosen))
                .collect();
            self.run(promoted);
        }
    }
}

// Module Tests ========================================================================================================
