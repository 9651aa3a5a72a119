// Standard Library Imports
use std::{
    collections::{BTreeMap, BTreeSet},
    hash::Hash,
};

// Local Crate Imports
use crate::{
    BondIdentifier, BondPattern, CanonicalOptions, Molecule,
    canonical::canonical_string,
    errors::{Result, ToolkitError},
    fingerprint,
    parsers::smiles::parse_smiles,
    writer::Style,
};

// Public API ==========================================================================================================

/// Everything the fragmentation and pairing engines need from a cheminformatics toolkit. Molecules and patterns are
/// owned values, so they're released as soon as they're dropped
pub trait MoleculeToolkit: Send + Sync {
    type Molecule: Send;
    type Pattern: Send + Sync;
    /// Identifies a fragment by the parent atoms (and attachment points) it's made of
    type FragmentId: Clone + Eq + Hash + Send;

    /// The empty string parses to the empty molecule
    fn parse(&self, input: &str) -> Result<Self::Molecule>;
    /// A pattern matching exactly two bonded atoms
    fn parse_pattern(&self, input: &str) -> Result<Self::Pattern>;

    fn is_empty(&self, molecule: &Self::Molecule) -> bool;
    fn is_multi_component(&self, molecule: &Self::Molecule) -> bool;
    fn has_stereocentres(&self, molecule: &Self::Molecule) -> bool;
    fn heavy_atom_count(&self, molecule: &Self::Molecule) -> usize;

    fn add_explicit_hydrogens(&self, molecule: &Self::Molecule) -> Result<Self::Molecule>;
    fn matching_bonds(&self, molecule: &Self::Molecule, pattern: &Self::Pattern) -> BTreeSet<BondIdentifier>;
    fn is_ring_bond(&self, molecule: &Self::Molecule, bond: &BondIdentifier) -> Result<bool>;

    /// How many attachment points each piece would have if every bond in `bonds` was cut
    fn attachment_counts(&self, molecule: &Self::Molecule, bonds: &[BondIdentifier]) -> Result<Vec<usize>>;
    /// Cuts every bond in `bonds`, labelling both new attachment points with the bond's position in `bonds` (plus
    /// one), and returns the pieces
    fn split(&self, molecule: &Self::Molecule, bonds: &[BondIdentifier]) -> Result<Vec<Self::Molecule>>;
    /// `[*:1]-[*:2]`, joined by the same kind of bond as `bond`
    fn bond_fragment(&self, molecule: &Self::Molecule, bond: &BondIdentifier) -> Result<Self::Molecule>;

    /// Sorted attachment-point labels
    fn attachment_labels(&self, fragment: &Self::Molecule) -> Vec<u16>;
    fn relabel_attachments(&self, fragment: &Self::Molecule, labels: &BTreeMap<u16, u16>) -> Self::Molecule;
    fn fragment_identity(&self, fragment: &Self::Molecule) -> Self::FragmentId;

    fn canonicalize(&self, fragment: &Self::Molecule, options: CanonicalOptions) -> Result<String>;
    fn attachment_fingerprint(
        &self,
        fragment: &Self::Molecule,
        label: u16,
        radius: usize,
        bits: usize,
    ) -> Result<Vec<u8>>;
    /// A `left>>right` reaction SMARTS built from two canonical fragment strings
    fn reaction_smarts(&self, left: &str, right: &str) -> Result<String>;
}

/// The toolkit built into this crate: SMILES in, canonical SMILES out
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct SmilesToolkit;

impl MoleculeToolkit for SmilesToolkit {
    type Molecule = Molecule;
    type Pattern = BondPattern;
    type FragmentId = Vec<(usize, bool, u16)>;

    fn parse(&self, input: &str) -> Result<Molecule> {
        parse_smiles(input)
    }

    fn parse_pattern(&self, input: &str) -> Result<BondPattern> {
        BondPattern::new(input)
    }

    fn is_empty(&self, molecule: &Molecule) -> bool {
        molecule.is_empty()
    }

    fn is_multi_component(&self, molecule: &Molecule) -> bool {
        molecule.component_count() > 1
    }

    fn has_stereocentres(&self, molecule: &Molecule) -> bool {
        molecule.has_stereocentres()
    }

    fn heavy_atom_count(&self, molecule: &Molecule) -> usize {
        molecule.heavy_atom_count()
    }

    fn add_explicit_hydrogens(&self, molecule: &Molecule) -> Result<Molecule> {
        Ok(molecule.with_explicit_hydrogens())
    }

    fn matching_bonds(&self, molecule: &Molecule, pattern: &BondPattern) -> BTreeSet<BondIdentifier> {
        pattern.matching_bonds(molecule)
    }

    fn is_ring_bond(&self, molecule: &Molecule, bond: &BondIdentifier) -> Result<bool> {
        let index = bond_index(molecule, bond)?;
        Ok(molecule.ring_bonds()[index])
    }

    fn attachment_counts(&self, molecule: &Molecule, bonds: &[BondIdentifier]) -> Result<Vec<usize>> {
        let indices = bond_indices(molecule, bonds)?;
        Ok(molecule.attachment_counts(&indices))
    }

    fn split(&self, molecule: &Molecule, bonds: &[BondIdentifier]) -> Result<Vec<Molecule>> {
        let indices = bond_indices(molecule, bonds)?;
        Ok(molecule.split(&indices))
    }

    fn bond_fragment(&self, molecule: &Molecule, bond: &BondIdentifier) -> Result<Molecule> {
        let index = bond_index(molecule, bond)?;
        Ok(molecule.bond_fragment(index))
    }

    fn attachment_labels(&self, fragment: &Molecule) -> Vec<u16> {
        fragment.attachment_labels()
    }

    fn relabel_attachments(&self, fragment: &Molecule, labels: &BTreeMap<u16, u16>) -> Molecule {
        fragment.relabel_attachments(labels)
    }

    fn fragment_identity(&self, fragment: &Molecule) -> Self::FragmentId {
        fragment.identity()
    }

    fn canonicalize(&self, fragment: &Molecule, options: CanonicalOptions) -> Result<String> {
        Ok(canonical_string(fragment, options, Style::Smiles))
    }

    fn attachment_fingerprint(&self, fragment: &Molecule, label: u16, radius: usize, bits: usize) -> Result<Vec<u8>> {
        fingerprint::attachment_fingerprint(fragment, label, radius, bits)
    }

    fn reaction_smarts(&self, left: &str, right: &str) -> Result<String> {
        let options = CanonicalOptions {
            strip_hydrogens: false,
            ..CanonicalOptions::default()
        };
        let left = canonical_string(&parse_smiles(left)?, options, Style::Smarts);
        let right = canonical_string(&parse_smiles(right)?, options, Style::Smarts);
        Ok(format!("{left}>>{right}"))
    }
}

// Private Helper Functions ============================================================================================

fn bond_index(molecule: &Molecule, bond: &BondIdentifier) -> Result<usize> {
    let index = bond.index;
    (index < molecule.bonds().len() && molecule.bond_identifier(index) == *bond)
        .then_some(index)
        .ok_or(ToolkitError::MissingBond { index })
}

fn bond_indices(molecule: &Molecule, bonds: &[BondIdentifier]) -> Result<Vec<usize>> {
    bonds.iter().map(|bond| bond_index(molecule, bond)).collect()
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TOOLKIT: SmilesToolkit = SmilesToolkit;

    fn canonical(molecule: &Molecule) -> String {
        TOOLKIT.canonicalize(molecule, CanonicalOptions::default()).unwrap()
    }

    #[test]
    fn molecule_properties() {
        let molecule = TOOLKIT.parse("CC(=O)O").unwrap();
        assert!(!TOOLKIT.is_empty(&molecule));
        assert!(!TOOLKIT.is_multi_component(&molecule));
        assert!(!TOOLKIT.has_stereocentres(&molecule));
        assert_eq!(TOOLKIT.heavy_atom_count(&molecule), 4);

        assert!(TOOLKIT.is_empty(&TOOLKIT.parse("").unwrap()));
        assert!(TOOLKIT.is_multi_component(&TOOLKIT.parse("CCO.O").unwrap()));
        assert!(TOOLKIT.has_stereocentres(&TOOLKIT.parse("N[C@@H](C)C(=O)O").unwrap()));
    }

    #[test]
    fn cutting() {
        let molecule = TOOLKIT.parse("c1ccccc1CC(=O)O").unwrap();
        let pattern = TOOLKIT.parse_pattern("[!#1]!@!=!#[!#1]").unwrap();
        let bonds: Vec<_> = TOOLKIT.matching_bonds(&molecule, &pattern).into_iter().collect();
        assert_eq!(bonds.len(), 3);
        assert!(!TOOLKIT.is_ring_bond(&molecule, &bonds[0]).unwrap());

        let counts = TOOLKIT.attachment_counts(&molecule, &bonds[..2]).unwrap();
        assert_eq!(counts, vec![1, 2, 1]);

        let pieces = TOOLKIT.split(&molecule, &bonds[..1]).unwrap();
        let mut smiles: Vec<_> = pieces.iter().map(canonical).collect();
        smiles.sort();
        assert_eq!(smiles, ["[*:1]CC(=O)O", "[*:1]c1ccccc1"]);

        let bond = TOOLKIT.bond_fragment(&molecule, &bonds[0]).unwrap();
        assert_eq!(canonical(&bond), "[*:1][*:2]");
    }

    #[test]
    fn missing_bonds() {
        let molecule = TOOLKIT.parse("CCO").unwrap();
        let stale = BondIdentifier::new(0, 2, 1);
        assert_eq!(
            TOOLKIT.split(&molecule, &[stale]),
            Err(ToolkitError::MissingBond { index: 1 })
        );
        let out_of_range = BondIdentifier::new(0, 1, 9);
        assert_eq!(
            TOOLKIT.is_ring_bond(&molecule, &out_of_range),
            Err(ToolkitError::MissingBond { index: 9 })
        );
    }

    #[test]
    fn hydrogens_can_be_cut_off() {
        let methanol = TOOLKIT.parse("CO").unwrap();
        let explicit = TOOLKIT.add_explicit_hydrogens(&methanol).unwrap();
        let pattern = TOOLKIT.parse_pattern("[#1]-*").unwrap();
        let bonds: Vec<_> = TOOLKIT.matching_bonds(&explicit, &pattern).into_iter().collect();
        assert_eq!(bonds.len(), 4);

        let pieces = TOOLKIT.split(&explicit, &bonds[..1]).unwrap();
        let mut smiles: Vec<_> = pieces.iter().map(canonical).collect();
        smiles.sort();
        assert_eq!(smiles, ["[*:1]CO", "[*:1][H]"]);
    }

    #[test]
    fn fragment_identity_and_relabelling() {
        let molecule = TOOLKIT.parse("CCC").unwrap();
        let bonds: Vec<_> = (0..2).map(|b| molecule.bond_identifier(b)).collect();
        let pieces = TOOLKIT.split(&molecule, &bonds).unwrap();
        let linker = &pieces[1];
        assert_eq!(TOOLKIT.attachment_labels(linker), vec![1, 2]);

        let swapped = TOOLKIT.relabel_attachments(linker, &BTreeMap::from([(1, 2), (2, 1)]));
        assert_eq!(TOOLKIT.attachment_labels(&swapped), vec![1, 2]);
        assert_ne!(TOOLKIT.fragment_identity(&swapped), TOOLKIT.fragment_identity(linker));
        assert_eq!(canonical(&swapped), canonical(linker));
    }

    #[test]
    fn reaction_smarts() {
        let reaction = TOOLKIT.reaction_smarts("[*:1]C", "[*:1]O").unwrap();
        assert_eq!(reaction, "[*:1][CH3]>>[*:1][OH]");
        assert!(TOOLKIT.reaction_smarts("[*:1]C", "C(").is_err());
    }

    #[test]
    fn attachment_fingerprints() {
        let fragment = TOOLKIT.parse("[*:1]CCO").unwrap();
        let bits = TOOLKIT.attachment_fingerprint(&fragment, 1, 2, 32).unwrap();
        assert_eq!(bits.len(), 4);
        assert!(TOOLKIT.attachment_fingerprint(&fragment, 7, 2, 32).is_err());
    }
}
