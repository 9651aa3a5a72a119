// Standard Library Imports
use std::collections::BTreeMap;

// External Crate Imports
use derive_more::Display;

// Local Crate Imports
use crate::Element;

// Public API ==========================================================================================================

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum BondOrder {
    #[display("-")]
    Single,
    #[display("=")]
    Double,
    #[display("#")]
    Triple,
    #[display(":")]
    Aromatic,
}

/// A bond within one specific molecule: its endpoint atoms (`start < end`) and its index in that molecule
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
#[display("{start}-{end}")]
pub struct BondIdentifier {
    pub start: usize,
    pub end: usize,
    pub index: usize,
}

impl BondIdentifier {
    #[must_use]
    pub fn new(a: usize, b: usize, index: usize) -> Self {
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        Self { start, end, index }
    }
}

/// A neighbour of a stereocentre, as listed in its written chirality
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum StereoRef {
    Atom(usize),
    Hydrogen,
}

/// Tetrahedral chirality: looking from the first neighbour, are the rest listed clockwise (`@@`) or not (`@`)?
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Chirality {
    pub(crate) neighbors: Vec<StereoRef>,
    pub(crate) clockwise: bool,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Atom {
    // NOTE: `None` is the `*` wildcard, which doubles as the attachment point left behind by a cut
    pub(crate) element: Option<Element>,
    pub(crate) isotope: Option<u16>,
    pub(crate) charge: i8,
    pub(crate) hydrogens: u8,
    pub(crate) aromatic: bool,
    pub(crate) map: u16,
    pub(crate) chirality: Option<Chirality>,
    // NOTE: The index of the parent atom this one came from (or, for attachment points, the atom it replaced)
    pub(crate) origin: usize,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Bond {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) order: BondOrder,
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Molecule {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl Atom {
    #[must_use]
    pub const fn element(&self) -> Option<Element> {
        self.element
    }

    #[must_use]
    pub const fn is_attachment(&self) -> bool {
        self.element.is_none()
    }

    #[must_use]
    pub const fn is_heavy(&self) -> bool {
        matches!(self.element, Some(e) if e.atomic_number() > 1)
    }

    #[must_use]
    pub const fn map(&self) -> u16 {
        self.map
    }

    #[must_use]
    pub const fn hydrogens(&self) -> u8 {
        self.hydrogens
    }

    #[must_use]
    pub const fn charge(&self) -> i8 {
        self.charge
    }

    #[must_use]
    pub const fn is_aromatic(&self) -> bool {
        self.aromatic
    }

    pub(crate) const fn new(element: Option<Element>) -> Self {
        Self {
            element,
            isotope: None,
            charge: 0,
            hydrogens: 0,
            aromatic: false,
            map: 0,
            chirality: None,
            origin: 0,
        }
    }

    fn attachment(label: u16, origin: usize) -> Self {
        Self {
            map: label,
            origin,
            ..Self::new(None)
        }
    }

    const fn is_strippable_hydrogen(&self) -> bool {
        matches!(self.element, Some(Element::H))
            && self.isotope.is_none()
            && self.charge == 0
            && self.map == 0
            && self.hydrogens == 0
    }
}

impl Bond {
    #[must_use]
    pub const fn order(&self) -> BondOrder {
        self.order
    }

    #[must_use]
    pub const fn other(&self, atom: usize) -> usize {
        if self.start == atom { self.end } else { self.start }
    }
}

impl Chirality {
    fn replace(&mut self, old: StereoRef, new: StereoRef) {
        if let Some(neighbor) = self.neighbors.iter_mut().find(|n| **n == old) {
            *neighbor = new;
        }
    }
}

impl Molecule {
    #[must_use]
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    #[must_use]
    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    #[must_use]
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn neighbors(&self, atom: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adjacency[atom].iter().copied()
    }

    #[must_use]
    pub fn degree(&self, atom: usize) -> usize {
        self.adjacency[atom].len()
    }

    #[must_use]
    pub fn bond_identifier(&self, index: usize) -> BondIdentifier {
        let Bond { start, end, .. } = self.bonds[index];
        BondIdentifier::new(start, end, index)
    }

    /// Implicit and explicit hydrogens together
    #[must_use]
    pub fn total_hydrogens(&self, atom: usize) -> usize {
        let explicit = self
            .neighbors(atom)
            .filter(|&(n, _)| self.atoms[n].element == Some(Element::H))
            .count();
        usize::from(self.atoms[atom].hydrogens) + explicit
    }

    #[must_use]
    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| a.is_heavy()).count()
    }

    #[must_use]
    pub fn has_stereocentres(&self) -> bool {
        self.atoms.iter().any(|a| a.chirality.is_some())
    }

    #[must_use]
    pub fn attachment_labels(&self) -> Vec<u16> {
        let mut labels: Vec<_> = self
            .atoms
            .iter()
            .filter(|a| a.is_attachment() && a.map != 0)
            .map(|a| a.map)
            .collect();
        labels.sort_unstable();
        labels
    }

    /// Assigns every atom to a connected component, returning the per-atom component numbers and the component count
    #[must_use]
    pub fn components(&self) -> (Vec<usize>, usize) {
        self.components_without(&[])
    }

    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components().1
    }

    /// Ring bonds are exactly the bonds that aren't bridges, found with a single iterative Tarjan pass
    #[must_use]
    pub fn ring_bonds(&self) -> Vec<bool> {
        const UNSEEN: usize = usize::MAX;

        let atom_count = self.atoms.len();
        let mut discovered = vec![UNSEEN; atom_count];
        let mut low = vec![0; atom_count];
        let mut in_ring = vec![true; self.bonds.len()];
        let mut time = 0;

        for root in 0..atom_count {
            if discovered[root] != UNSEEN {
                continue;
            }
            discovered[root] = time;
            low[root] = time;
            time += 1;

            // NOTE: Each frame is (atom, the bond we arrived by, the next neighbour to look at)
            let mut stack = vec![(root, UNSEEN, 0)];
            while let Some(frame) = stack.last_mut() {
                let (atom, arrived_by, next) = *frame;
                frame.2 += 1;

                if let Some(&(neighbor, bond)) = self.adjacency[atom].get(next) {
                    if bond == arrived_by {
                        continue;
                    }
                    if discovered[neighbor] == UNSEEN {
                        discovered[neighbor] = time;
                        low[neighbor] = time;
                        time += 1;
                        stack.push((neighbor, bond, 0));
                    } else {
                        low[atom] = low[atom].min(discovered[neighbor]);
                    }
                } else {
                    stack.pop();
                    if let Some(&(parent, _, _)) = stack.last() {
                        low[parent] = low[parent].min(low[atom]);
                        if low[atom] > discovered[parent] {
                            in_ring[arrived_by] = false;
                        }
                    }
                }
            }
        }

        in_ring
    }

    #[must_use]
    pub fn ring_atoms(&self) -> Vec<bool> {
        let ring_bonds = self.ring_bonds();
        let mut ring_atoms = vec![false; self.atoms.len()];
        for (bond, _) in self.bonds.iter().zip(ring_bonds).filter(|(_, r)| *r) {
            ring_atoms[bond.start] = true;
            ring_atoms[bond.end] = true;
        }
        ring_atoms
    }

    /// The number of attachment points each piece would carry if `cuts` were all broken at once
    #[must_use]
    pub fn attachment_counts(&self, cuts: &[usize]) -> Vec<usize> {
        let (component_of, count) = self.components_without(cuts);
        let mut attachments = vec![0; count];
        for &cut in cuts {
            let Bond { start, end, .. } = self.bonds[cut];
            attachments[component_of[start]] += 1;
            attachments[component_of[end]] += 1;
        }
        attachments
    }

    /// Breaks every bond in `cuts`, capping both sides with attachment points labelled by their position in `cuts`
    /// (starting at 1), and returns the resulting pieces ordered by their lowest-numbered parent atom
    #[must_use]
    pub fn split(&self, cuts: &[usize]) -> Vec<Self> {
        let mut atoms = self.atoms.clone();
        let mut bonds: Vec<_> = self
            .bonds
            .iter()
            .enumerate()
            .filter(|(i, _)| !cuts.contains(i))
            .map(|(_, &b)| b)
            .collect();

        for (position, &cut) in cuts.iter().enumerate() {
            let Bond { start, end, order } = self.bonds[cut];
            let label = u16::try_from(position + 1).unwrap_or(u16::MAX);
            for (anchor, replaced) in [(start, end), (end, start)] {
                let attachment = atoms.len();
                atoms.push(Atom::attachment(label, self.atoms[replaced].origin));
                bonds.push(Bond {
                    start: anchor,
                    end: attachment,
                    order,
                });
                if let Some(chirality) = &mut atoms[anchor].chirality {
                    chirality.replace(StereoRef::Atom(replaced), StereoRef::Atom(attachment));
                }
            }
        }

        Self::from_parts(atoms, bonds).into_components()
    }

    /// Splits a molecule into one molecule per connected component
    #[must_use]
    pub fn into_components(self) -> Vec<Self> {
        let (component_of, count) = self.components();
        let mut members = vec![Vec::new(); count];
        for (atom, &component) in component_of.iter().enumerate() {
            members[component].push(atom);
        }
        members.iter().map(|atoms| self.extract(atoms)).collect()
    }

    /// Just the two atoms of a bond, both replaced by attachment points: `[*:1]-[*:2]`
    #[must_use]
    pub fn bond_fragment(&self, bond: usize) -> Self {
        let Bond { start, end, order } = self.bonds[bond];
        let atoms = vec![
            Atom::attachment(1, self.atoms[start].origin),
            Atom::attachment(2, self.atoms[end].origin),
        ];
        let bonds = vec![Bond { start: 0, end: 1, order }];
        Self::from_parts(atoms, bonds)
    }

    #[must_use]
    pub fn with_explicit_hydrogens(&self) -> Self {
        let mut atoms = self.atoms.clone();
        let mut bonds = self.bonds.clone();

        for atom in 0..self.atoms.len() {
            let hydrogens = atoms[atom].hydrogens;
            atoms[atom].hydrogens = 0;
            for nth in 0..hydrogens {
                let hydrogen = atoms.len();
                atoms.push(Atom {
                    origin: hydrogen,
                    ..Atom::new(Some(Element::H))
                });
                bonds.push(Bond {
                    start: atom,
                    end: hydrogen,
                    order: BondOrder::Single,
                });
                if nth == 0 {
                    if let Some(chirality) = &mut atoms[atom].chirality {
                        chirality.replace(StereoRef::Hydrogen, StereoRef::Atom(hydrogen));
                    }
                }
            }
        }

        Self::from_parts(atoms, bonds)
    }

    /// Folds plain explicit hydrogens back into their heavy atom's hydrogen count, leaving hydrogens attached to
    /// attachment points (or other hydrogens) alone
    #[must_use]
    pub fn without_explicit_hydrogens(&self) -> Self {
        let mut atoms = self.atoms.clone();
        let mut keep = vec![true; atoms.len()];

        for (atom, hydrogen) in self.atoms.iter().enumerate() {
            if !hydrogen.is_strippable_hydrogen() || self.degree(atom) != 1 {
                continue;
            }
            let (parent, bond) = self.adjacency[atom][0];
            let parent_atom = &self.atoms[parent];
            if parent_atom.element.is_none_or(|e| e == Element::H)
                || self.bonds[bond].order != BondOrder::Single
            {
                continue;
            }

            keep[atom] = false;
            atoms[parent].hydrogens += 1;
            if let Some(chirality) = &mut atoms[parent].chirality {
                chirality.replace(StereoRef::Atom(atom), StereoRef::Hydrogen);
            }
        }

        let kept: Vec<_> = (0..atoms.len()).filter(|&a| keep[a]).collect();
        Self::from_parts(atoms, self.bonds.clone()).extract(&kept)
    }

    /// Renumbers attachment points; labels missing from `labels` are left as they are
    #[must_use]
    pub fn relabel_attachments(&self, labels: &BTreeMap<u16, u16>) -> Self {
        let mut molecule = self.clone();
        for atom in molecule.atoms.iter_mut().filter(|a| a.is_attachment()) {
            if let Some(&label) = labels.get(&atom.map) {
                atom.map = label;
            }
        }
        molecule
    }

    /// Undoes `split`: every pair of attachment points sharing a label is removed and their neighbours are bonded
    /// directly. Labels without exactly two attachment points are left alone
    #[must_use]
    pub fn join_attachments(&self) -> Self {
        let mut molecule = self.clone();
        while let Some((a, b)) = molecule.next_attachment_pair() {
            molecule = molecule.join_pair(a, b);
        }
        molecule
    }

    /// Identifies a fragment by where its atoms came from in the parent molecule
    #[must_use]
    pub fn identity(&self) -> Vec<(usize, bool, u16)> {
        let mut identity: Vec<_> = self
            .atoms
            .iter()
            .map(|a| (a.origin, a.is_attachment(), a.map))
            .collect();
        identity.sort_unstable();
        identity
    }

    /// The hydrogen count an organic-subset atom would be given if written without brackets, or `None` if it can
    /// only be written inside brackets
    #[must_use]
    pub fn implicit_hydrogens(&self, atom: usize) -> Option<u8> {
        let element = self.atoms[atom].element?;
        let valences = element.default_valences();
        let used = self.used_valence(atom);
        let target = valences
            .iter()
            .copied()
            .find(|&v| v >= used)
            .or_else(|| valences.last().copied())?;
        Some(target.saturating_sub(used))
    }

    /// Whether an organic-subset atom has more bonds than its largest standard valence allows
    #[must_use]
    pub fn exceeds_valence(&self, atom: usize) -> bool {
        let used = self.used_valence(atom);
        self.atoms[atom]
            .element
            .and_then(|e| e.default_valences().last().copied())
            .is_some_and(|max| used > max)
    }

    pub(crate) fn from_parts(atoms: Vec<Atom>, bonds: Vec<Bond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (index, bond) in bonds.iter().enumerate() {
            adjacency[bond.start].push((bond.end, index));
            adjacency[bond.end].push((bond.start, index));
        }
        Self {
            atoms,
            bonds,
            adjacency,
        }
    }

    pub(crate) fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub(crate) fn add_atom(&mut self, atom: Atom) -> usize {
        let index = self.atoms.len();
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        index
    }

    pub(crate) fn add_bond(&mut self, start: usize, end: usize, order: BondOrder) -> usize {
        let index = self.bonds.len();
        self.bonds.push(Bond { start, end, order });
        self.adjacency[start].push((end, index));
        self.adjacency[end].push((start, index));
        index
    }

    pub(crate) fn set_bond_order(&mut self, bond: usize, order: BondOrder) {
        self.bonds[bond].order = order;
    }

    pub(crate) fn bond_between(&self, a: usize, b: usize) -> Option<usize> {
        self.neighbors(a).find(|&(n, _)| n == b).map(|(_, bond)| bond)
    }
}

// Private Helper Functions ============================================================================================

impl Molecule {
    pub(crate) fn used_valence(&self, atom: usize) -> u8 {
        let mut used = 0u8;
        let mut aromatic_bonds = 0u8;
        for (_, bond) in self.neighbors(atom) {
            match self.bonds[bond].order {
                BondOrder::Single => used += 1,
                BondOrder::Double => used += 2,
                BondOrder::Triple => used += 3,
                BondOrder::Aromatic => aromatic_bonds += 1,
            }
        }
        let this = &self.atoms[atom];
        let pi_bond = this.aromatic && this.element.is_some_and(Element::aromatic_pi_bond);
        used + aromatic_bonds + u8::from(pi_bond && aromatic_bonds > 0)
    }

    fn next_attachment_pair(&self) -> Option<(usize, usize)> {
        let mut labels = self.attachment_labels();
        labels.dedup();
        labels.into_iter().find_map(|label| {
            let ends: Vec<_> = (0..self.atoms.len())
                .filter(|&a| self.atoms[a].is_attachment() && self.atoms[a].map == label && self.degree(a) == 1)
                .collect();
            let &[a, b] = ends.as_slice() else {
                return None;
            };
            let (anchor_a, anchor_b) = (self.adjacency[a][0].0, self.adjacency[b][0].0);
            (anchor_a != b && anchor_a != anchor_b && self.bond_between(anchor_a, anchor_b).is_none())
                .then_some((a, b))
        })
    }

    fn join_pair(&self, a: usize, b: usize) -> Self {
        let (anchor_a, bond) = self.adjacency[a][0];
        let (anchor_b, _) = self.adjacency[b][0];

        let mut atoms = self.atoms.clone();
        for (anchor, old, new) in [(anchor_a, a, anchor_b), (anchor_b, b, anchor_a)] {
            if let Some(chirality) = &mut atoms[anchor].chirality {
                chirality.replace(StereoRef::Atom(old), StereoRef::Atom(new));
            }
        }
        let mut bonds = self.bonds.clone();
        bonds.push(Bond {
            start: anchor_a,
            end: anchor_b,
            order: self.bonds[bond].order,
        });

        let kept: Vec<_> = (0..atoms.len()).filter(|&atom| atom != a && atom != b).collect();
        Self::from_parts(atoms, bonds).extract(&kept)
    }

    fn components_without(&self, cuts: &[usize]) -> (Vec<usize>, usize) {
        const UNSEEN: usize = usize::MAX;

        let mut component_of = vec![UNSEEN; self.atoms.len()];
        let mut count = 0;
        for root in 0..self.atoms.len() {
            if component_of[root] != UNSEEN {
                continue;
            }
            component_of[root] = count;
            let mut stack = vec![root];
            while let Some(atom) = stack.pop() {
                for (neighbor, bond) in self.neighbors(atom) {
                    if component_of[neighbor] == UNSEEN && !cuts.contains(&bond) {
                        component_of[neighbor] = count;
                        stack.push(neighbor);
                    }
                }
            }
            count += 1;
        }
        (component_of, count)
    }

    // NOTE: Bonds leaving the selected atoms are dropped, so callers should only extract whole components
    fn extract(&self, selected: &[usize]) -> Self {
        let mut new_index = vec![None; self.atoms.len()];
        for (new, &old) in selected.iter().enumerate() {
            new_index[old] = Some(new);
        }

        let atoms = selected
            .iter()
            .map(|&old| {
                let mut atom = self.atoms[old].clone();
                if let Some(chirality) = &mut atom.chirality {
                    for neighbor in &mut chirality.neighbors {
                        if let StereoRef::Atom(n) = neighbor {
                            if let Some(new) = new_index[*n] {
                                *n = new;
                            }
                        }
                    }
                }
                atom
            })
            .collect();

        let bonds = self
            .bonds
            .iter()
            .filter_map(|bond| {
                let start = new_index[bond.start]?;
                let end = new_index[bond.end]?;
                Some(Bond { start, end, ..*bond })
            })
            .collect();

        Self::from_parts(atoms, bonds)
    }
}

// Module Tests ========================================================================================================
