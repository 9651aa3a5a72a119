// External Crate Imports
use itertools::Itertools;

// Local Crate Imports
use crate::{
    Element,
    errors::{Result, ToolkitError},
    molecule::{BondOrder, Molecule},
};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

// Public API ==========================================================================================================

/// A folded circular fingerprint of the environment around one attachment point: the hashed environment at every
/// radius from 0 up to `radius` sets one of `bits` bits. The attachment point's own label is never hashed, so two
/// fragments can be compared however their attachment points are numbered
pub(crate) fn attachment_fingerprint(molecule: &Molecule, label: u16, radius: usize, bits: usize) -> Result<Vec<u8>> {
    let attachment = molecule
        .atoms()
        .iter()
        .position(|a| a.is_attachment() && a.map() == label)
        .ok_or(ToolkitError::MissingAttachment { label })?;

    let mut fingerprint = vec![0; bits.div_ceil(8)];
    let mut set_bit = |hash: u64| {
        if let Some(bit) = fold(hash, bits) {
            fingerprint[bit / 8] |= 1 << (bit % 8);
        }
    };

    let mut identifiers: Vec<_> = molecule
        .atoms()
        .iter()
        .enumerate()
        .map(|(index, atom)| {
            fnv1a(&[
                u64::from(atom.element().map_or(0, Element::atomic_number)),
                molecule.degree(index) as u64,
                u64::from(atom.hydrogens()),
                // NOTE: Sign-extended, then reinterpreted, so negative charges get their own values
                i64::from(atom.charge()) as u64,
                u64::from(atom.is_aromatic()),
            ])
        })
        .collect();
    set_bit(identifiers[attachment]);

    for _ in 0..radius {
        identifiers = (0..molecule.atom_count())
            .map(|atom| {
                let environment = molecule
                    .neighbors(atom)
                    .map(|(neighbor, bond)| (identifiers[neighbor], bond_code(molecule.bonds()[bond].order())))
                    .sorted()
                    .flat_map(|(identifier, order)| [identifier, order]);
                fnv1a(&[identifiers[atom]].into_iter().chain(environment).collect_vec())
            })
            .collect();
        set_bit(identifiers[attachment]);
    }

    Ok(fingerprint)
}

// Private Helper Functions ============================================================================================

fn fnv1a(values: &[u64]) -> u64 {
    values
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}

fn fold(hash: u64, bits: usize) -> Option<usize> {
    let bits = u64::try_from(bits).ok().filter(|&b| b > 0)?;
    usize::try_from(hash % bits).ok()
}

const fn bond_code(order: BondOrder) -> u64 {
    match order {
        BondOrder::Single => 1,
        BondOrder::Double => 2,
        BondOrder::Triple => 3,
        BondOrder::Aromatic => 4,
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use crate::parsers::smiles::parse_smiles;

    use super::*;

    fn fingerprint(smiles: &str, label: u16, radius: usize) -> Vec<u8> {
        attachment_fingerprint(&parse_smiles(smiles).unwrap(), label, radius, 64).unwrap()
    }

    #[test]
    fn same_environment_same_bits() {
        assert_eq!(fingerprint("[*:1]CC", 1, 2), fingerprint("CC[*:1]", 1, 2));
        // Labels aren't part of the environment
        assert_eq!(fingerprint("[*:1]CCO", 1, 2), fingerprint("[*:3]CCO", 3, 2));
        // Anything beyond the radius doesn't matter
        assert_eq!(fingerprint("[*:1]CC", 1, 1), fingerprint("[*:1]CO", 1, 1));
        assert_ne!(fingerprint("[*:1]CC", 1, 2), fingerprint("[*:1]CO", 1, 2));
    }

    #[test]
    fn bit_counts() {
        let bits = fingerprint("[*:1]c1ccccc1", 1, 2);
        assert_eq!(bits.len(), 8);
        let set: u32 = bits.iter().map(|b| b.count_ones()).sum();
        assert!((1..=3).contains(&set));

        let molecule = parse_smiles("[*:1]C").unwrap();
        assert_eq!(attachment_fingerprint(&molecule, 1, 2, 12).unwrap().len(), 2);
        assert_eq!(attachment_fingerprint(&molecule, 1, 2, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn missing_attachment() {
        let molecule = parse_smiles("[*:1]C").unwrap();
        assert_eq!(
            attachment_fingerprint(&molecule, 2, 1, 64),
            Err(ToolkitError::MissingAttachment { label: 2 })
        );
    }

    #[test]
    fn fnv1a_is_stable() {
        assert_eq!(fnv1a(&[]), FNV_OFFSET);
        assert_ne!(fnv1a(&[1, 2]), fnv1a(&[2, 1]));
        assert_eq!(fold(10, 4), Some(2));
        assert_eq!(fold(10, 0), None);
    }
}
