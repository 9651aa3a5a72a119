// Standard Library Imports
use std::{
    collections::BTreeSet,
    fmt::{self, Display, Formatter},
};

// Local Crate Imports
use crate::{
    BondIdentifier, Element,
    errors::Result,
    molecule::{BondOrder, Molecule},
    parsers::pattern::bond_pattern,
};

// Public API ==========================================================================================================

/// A tiny SMARTS: two atom queries joined by one bond query, matching the bonds that are eligible for cutting
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct BondPattern {
    source: String,
    first: Query<AtomPrimitive>,
    bond: Query<BondPrimitive>,
    second: Query<AtomPrimitive>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Query<P> {
    Primitive(P),
    Not(Box<Self>),
    And(Vec<Self>),
    Or(Vec<Self>),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AtomPrimitive {
    Any,
    AtomicNumber(u8),
    Element { element: Element, aromatic: bool },
    Aromatic,
    Aliphatic,
    InRing(bool),
    TotalHydrogens(u8),
    Degree(u8),
    Connectivity(u8),
    Charge(i8),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BondPrimitive {
    Order(BondOrder),
    Any,
    Ring,
}

impl BondPattern {
    pub fn new(source: &str) -> Result<Self> {
        let (first, bond, second) = bond_pattern(source)?;
        let source = source.to_owned();
        Ok(Self {
            source,
            first,
            bond,
            second,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every bond matching the pattern in either direction
    #[must_use]
    pub fn matching_bonds(&self, molecule: &Molecule) -> BTreeSet<BondIdentifier> {
        let ring_bonds = molecule.ring_bonds();
        let ring_atoms = molecule.ring_atoms();
        let context = Context {
            molecule,
            ring_bonds: &ring_bonds,
            ring_atoms: &ring_atoms,
        };

        molecule
            .bonds()
            .iter()
            .enumerate()
            .filter(|&(index, bond)| {
                let bond_matches = self.bond.matches(&|p| context.bond_matches(*p, index));
                let atom_matches =
                    |query: &Query<AtomPrimitive>, atom| query.matches(&|p| context.atom_matches(*p, atom));
                bond_matches
                    && ((atom_matches(&self.first, bond.start) && atom_matches(&self.second, bond.end))
                        || (atom_matches(&self.first, bond.end) && atom_matches(&self.second, bond.start)))
            })
            .map(|(index, _)| molecule.bond_identifier(index))
            .collect()
    }
}

impl<P> Query<P> {
    pub fn matches(&self, primitive: &impl Fn(&P) -> bool) -> bool {
        match self {
            Self::Primitive(p) => primitive(p),
            Self::Not(query) => !query.matches(primitive),
            Self::And(queries) => queries.iter().all(|q| q.matches(primitive)),
            Self::Or(queries) => queries.iter().any(|q| q.matches(primitive)),
        }
    }

    pub(crate) fn all(mut queries: Vec<Self>) -> Self {
        if queries.len() == 1 {
            queries.remove(0)
        } else {
            Self::And(queries)
        }
    }

    pub(crate) fn any(mut queries: Vec<Self>) -> Self {
        if queries.len() == 1 {
            queries.remove(0)
        } else {
            Self::Or(queries)
        }
    }
}

impl Display for BondPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// Private Helper Functions ============================================================================================

struct Context<'m> {
    molecule: &'m Molecule,
    ring_bonds: &'m [bool],
    ring_atoms: &'m [bool],
}

impl Context<'_> {
    fn atom_matches(&self, primitive: AtomPrimitive, atom: usize) -> bool {
        let this = &self.molecule.atoms()[atom];
        let total_hydrogens = self.molecule.total_hydrogens(atom);
        let degree = self.molecule.degree(atom);
        match primitive {
            AtomPrimitive::Any => true,
            AtomPrimitive::AtomicNumber(n) => this.element().is_some_and(|e| e.atomic_number() == n),
            AtomPrimitive::Element { element, aromatic } => {
                this.element() == Some(element) && this.is_aromatic() == aromatic
            }
            AtomPrimitive::Aromatic => this.is_aromatic(),
            AtomPrimitive::Aliphatic => !this.is_aromatic() && !this.is_attachment(),
            AtomPrimitive::InRing(in_ring) => self.ring_atoms[atom] == in_ring,
            AtomPrimitive::TotalHydrogens(n) => total_hydrogens == usize::from(n),
            AtomPrimitive::Degree(n) => degree == usize::from(n),
            AtomPrimitive::Connectivity(n) => degree + usize::from(this.hydrogens()) == usize::from(n),
            AtomPrimitive::Charge(c) => this.charge() == c,
        }
    }

    fn bond_matches(&self, primitive: BondPrimitive, bond: usize) -> bool {
        match primitive {
            BondPrimitive::Order(order) => self.molecule.bonds()[bond].order() == order,
            BondPrimitive::Any => true,
            BondPrimitive::Ring => self.ring_bonds[bond],
        }
    }
}

// Module Tests ========================================================================================================
