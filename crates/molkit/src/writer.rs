// Standard Library Imports
use std::fmt::Write;

// External Crate Imports
use ahash::{HashMap, HashSet};
use itertools::Itertools;

// Local Crate Imports
use crate::molecule::{BondOrder, Chirality, Molecule, StereoRef};

// Public API ==========================================================================================================

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub(crate) enum Style {
    /// Plain SMILES: organic-subset atoms with their usual hydrogen counts are written without brackets
    Smiles,
    /// Every atom in brackets, so that (read as SMARTS) atoms only match themselves
    Smarts,
}

/// Writes `molecule` by depth-first search, always starting from (and moving to) the lowest-ranked atom available.
/// With a unique rank per atom, the output only depends on the ranks, never on the order atoms are stored in
pub(crate) fn write_smiles(molecule: &Molecule, ranks: &[usize], style: Style) -> String {
    let mut writer = Writer::new(molecule, ranks, style);
    let roots = (0..molecule.atom_count()).sorted_by_key(|&atom| ranks[atom]);

    let mut components = Vec::new();
    for root in roots {
        if writer.visited[root] {
            continue;
        }
        writer.explore(root, None);
        let mut output = String::new();
        writer.write(root, None, &mut output);
        components.push(output);
    }
    components.join(".")
}

// Private Helper Functions ============================================================================================

struct Writer<'m> {
    molecule: &'m Molecule,
    ranks: &'m [usize],
    style: Style,
    visited: Vec<bool>,
    // NOTE: All of these are (neighbour, bond) pairs
    children: Vec<Vec<(usize, usize)>>,
    ring_openings: Vec<Vec<(usize, usize)>>,
    ring_closings: Vec<Vec<(usize, usize)>>,
    ring_bonds: HashSet<usize>,
    ring_digits: HashMap<usize, u16>,
    digits_in_use: Vec<u16>,
}

impl<'m> Writer<'m> {
    fn new(molecule: &'m Molecule, ranks: &'m [usize], style: Style) -> Self {
        let atom_count = molecule.atom_count();
        Self {
            molecule,
            ranks,
            style,
            visited: vec![false; atom_count],
            children: vec![Vec::new(); atom_count],
            ring_openings: vec![Vec::new(); atom_count],
            ring_closings: vec![Vec::new(); atom_count],
            ring_bonds: HashSet::default(),
            ring_digits: HashMap::default(),
            digits_in_use: Vec::new(),
        }
    }

    // Builds the spanning tree, marking every bond back to an already-visited atom as a ring closure
    fn explore(&mut self, atom: usize, arrived_by: Option<usize>) {
        self.visited[atom] = true;
        let molecule = self.molecule;
        let neighbors = molecule
            .neighbors(atom)
            .sorted_by_key(|&(neighbor, _)| self.ranks[neighbor]);
        for (neighbor, bond) in neighbors {
            if Some(bond) == arrived_by || self.ring_bonds.contains(&bond) {
                continue;
            }
            if self.visited[neighbor] {
                self.ring_bonds.insert(bond);
                self.ring_openings[neighbor].push((atom, bond));
                self.ring_closings[atom].push((neighbor, bond));
            } else {
                self.children[atom].push((neighbor, bond));
                self.explore(neighbor, Some(bond));
            }
        }
    }

    fn write(&mut self, atom: usize, parent: Option<(usize, usize)>, output: &mut String) {
        if let Some((parent, bond)) = parent {
            output.push_str(self.bond_symbol(parent, atom, bond));
        }

        // NOTE: Digits closed here aren't reused by rings opened at the same atom
        let mut ring_text = String::new();
        let mut ring_partners = Vec::new();
        let mut closed = Vec::new();
        let closings = self.ring_closings[atom]
            .iter()
            .filter_map(|&(partner, bond)| Some((self.ring_digits.remove(&bond)?, partner)))
            .sorted()
            .collect_vec();
        for (digit, partner) in closings {
            write_ring_digit(&mut ring_text, digit);
            ring_partners.push(partner);
            closed.push(digit);
        }
        let openings = self.ring_openings[atom]
            .iter()
            .copied()
            .sorted_by_key(|&(partner, _)| self.ranks[partner])
            .collect_vec();
        for (partner, bond) in openings {
            let digit = (1..).find(|d| !self.digits_in_use.contains(d)).unwrap_or(1);
            self.digits_in_use.push(digit);
            self.ring_digits.insert(bond, digit);
            ring_text.push_str(self.bond_symbol(atom, partner, bond));
            write_ring_digit(&mut ring_text, digit);
            ring_partners.push(partner);
        }
        self.digits_in_use.retain(|d| !closed.contains(d));

        let children = self.children[atom].clone();
        let this = &self.molecule.atoms()[atom];
        let clockwise = this.chirality.as_ref().and_then(|chirality| {
            let written_order: Vec<_> = parent
                .map(|(parent, _)| StereoRef::Atom(parent))
                .into_iter()
                .chain((this.hydrogens > 0).then_some(StereoRef::Hydrogen))
                .chain(ring_partners.iter().map(|&p| StereoRef::Atom(p)))
                .chain(children.iter().map(|&(child, _)| StereoRef::Atom(child)))
                .collect();
            written_clockwise(chirality, &written_order)
        });

        self.write_atom(atom, clockwise, output);
        output.push_str(&ring_text);

        let last = children.len().saturating_sub(1);
        for (nth, (child, bond)) in children.into_iter().enumerate() {
            if nth < last {
                output.push('(');
                self.write(child, Some((atom, bond)), output);
                output.push(')');
            } else {
                self.write(child, Some((atom, bond)), output);
            }
        }
    }

    fn write_atom(&self, atom: usize, clockwise: Option<bool>, output: &mut String) {
        let molecule = self.molecule;
        let this = &molecule.atoms()[atom];
        let plain = this.charge == 0 && this.isotope.is_none() && this.map == 0 && clockwise.is_none();
        let bare = self.style == Style::Smiles
            && plain
            && match this.element {
                None => this.hydrogens == 0,
                Some(element) => {
                    element.is_organic_subset()
                        && !molecule.exceeds_valence(atom)
                        && molecule.implicit_hydrogens(atom) == Some(this.hydrogens)
                }
            };

        let symbol = match this.element {
            None => "*".to_owned(),
            Some(element) if this.aromatic => element.symbol().to_ascii_lowercase(),
            Some(element) => element.symbol().to_owned(),
        };
        if bare {
            output.push_str(&symbol);
            return;
        }

        output.push('[');
        if let Some(isotope) = this.isotope {
            let _ = write!(output, "{isotope}");
        }
        output.push_str(&symbol);
        match clockwise {
            Some(true) => output.push_str("@@"),
            Some(false) => output.push('@'),
            None => (),
        }
        match this.hydrogens {
            0 => (),
            1 => output.push('H'),
            n => {
                let _ = write!(output, "H{n}");
            }
        }
        match this.charge {
            0 => (),
            1 => output.push('+'),
            -1 => output.push('-'),
            c => {
                let _ = write!(output, "{c:+}");
            }
        }
        if this.map != 0 {
            let _ = write!(output, ":{}", this.map);
        }
        output.push(']');
    }

    fn bond_symbol(&self, a: usize, b: usize, bond: usize) -> &'static str {
        let atoms = self.molecule.atoms();
        let both_aromatic = atoms[a].aromatic && atoms[b].aromatic;
        match self.molecule.bonds()[bond].order() {
            BondOrder::Single if both_aromatic => "-",
            BondOrder::Single => "",
            BondOrder::Double => "=",
            BondOrder::Triple => "#",
            BondOrder::Aromatic if both_aromatic => "",
            BondOrder::Aromatic => ":",
        }
    }
}

fn write_ring_digit(output: &mut String, digit: u16) {
    if digit < 10 {
        let _ = write!(output, "{digit}");
    } else {
        let _ = write!(output, "%{digit}");
    }
}

/// The `@@`-ness of a stereocentre once its neighbours are written in `written_order`, or `None` if the stored
/// neighbours can't be matched up with the written ones
fn written_clockwise(chirality: &Chirality, written_order: &[StereoRef]) -> Option<bool> {
    if chirality.neighbors.len() != written_order.len() {
        return None;
    }
    let positions: Vec<_> = written_order
        .iter()
        .map(|r| chirality.neighbors.iter().position(|n| n == r))
        .collect::<Option<_>>()?;
    if !positions.iter().all_unique() {
        return None;
    }
    let inversions = positions
        .iter()
        .tuple_combinations()
        .filter(|(a, b)| a > b)
        .count();
    Some(chirality.clockwise ^ (inversions % 2 == 1))
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use crate::parsers::smiles::parse_smiles;

    use super::*;

    // Ranks in storage order, so the output follows the input as closely as the writer allows
    fn rewrite(smiles: &str, style: Style) -> String {
        let molecule = parse_smiles(smiles).unwrap();
        let ranks: Vec<_> = (0..molecule.atom_count()).collect();
        write_smiles(&molecule, &ranks, style)
    }

    #[test]
    fn chains_and_branches() {
        assert_eq!(rewrite("CCO", Style::Smiles), "CCO");
        assert_eq!(rewrite("CC(=O)O", Style::Smiles), "CC(=O)O");
        assert_eq!(rewrite("CC(C)(C)C#N", Style::Smiles), "CC(C)(C)C#N");
        assert_eq!(rewrite("[Na+].[Cl-]", Style::Smiles), "[Na+].[Cl-]");
        assert_eq!(rewrite("", Style::Smiles), "");
    }

    #[test]
    fn rings() {
        assert_eq!(rewrite("c1ccccc1", Style::Smiles), "c1ccccc1");
        assert_eq!(rewrite("C1CC1C1CC1", Style::Smiles), "C1CC1C1CC1");
        assert_eq!(rewrite("c1ccccc1-c1ccccc1", Style::Smiles), "c1ccccc1-c1ccccc1");
        assert_eq!(rewrite("C1=CCCC1", Style::Smiles), "C1=CCCC1");
        assert_eq!(rewrite("C=1CCCC1", Style::Smiles), "C=1CCCC1");
        assert_eq!(rewrite("c1ccc2ccccc2c1", Style::Smiles), "c1ccc2ccccc2c1");
    }

    #[test]
    fn bracket_atoms() {
        assert_eq!(rewrite("[13CH4]", Style::Smiles), "[13CH4]");
        assert_eq!(rewrite("[NH4+]", Style::Smiles), "[NH4+]");
        assert_eq!(rewrite("[O-2]", Style::Smiles), "[O-2]");
        assert_eq!(rewrite("c1cc[nH]c1", Style::Smiles), "c1cc[nH]c1");
        assert_eq!(rewrite("[*:1]C[*:2]", Style::Smiles), "[*:1]C[*:2]");
        assert_eq!(rewrite("*C", Style::Smiles), "*C");
        assert_eq!(rewrite("[H]C", Style::Smiles), "[H]C");
        assert_eq!(rewrite("C[CH2]C", Style::Smiles), "CCC");
        assert_eq!(rewrite("C[CH]C", Style::Smiles), "C[CH]C");
    }

    #[test]
    fn everything_bracketed_for_smarts() {
        assert_eq!(rewrite("[*:1]CO", Style::Smarts), "[*:1][CH2][OH]");
        assert_eq!(rewrite("c1ccccc1", Style::Smarts), "[cH]1[cH][cH][cH][cH][cH]1");
    }

    #[test]
    fn stereo_follows_the_written_order() {
        assert_eq!(rewrite("N[C@@H](C)C(=O)O", Style::Smiles), "N[C@@H](C)C(=O)O");
        assert_eq!(rewrite("F[C@](Cl)(Br)I", Style::Smiles), "F[C@](Cl)(Br)I");

        // Starting from the methyl group reorders the centre's neighbours (an even permutation here)
        let molecule = parse_smiles("N[C@@H](C)C(=O)O").unwrap();
        let ranks = [3, 2, 0, 1, 4, 5];
        assert_eq!(
            write_smiles(&molecule, &ranks, Style::Smiles),
            "C[C@@H](C(=O)O)N"
        );

        // Swapping two neighbours (an odd permutation) flips the tag
        let ranks = [3, 2, 0, 4, 5, 6];
        let swapped = parse_smiles("N[C@@H](C)C(=O)O").unwrap();
        assert_eq!(write_smiles(&swapped, &ranks, Style::Smiles), "C[C@H](N)C(=O)O");
    }
}
