// Standard Library Imports
use std::collections::BTreeMap;

// External Crate Imports
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while_m_n},
    character::complete::{char, one_of, satisfy, u16},
    combinator::{cut, map, not, opt, recognize, value},
    multi::{many0, many0_count, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
};
use nom_miette::{expect, final_parser, map_res, wrap_err};

// Local Crate Imports
use super::errors::{MolkitErrorKind, ParseResult, UnknownElement};
use crate::{
    Element,
    errors::{Result, ToolkitError},
    molecule::{Atom, BondOrder, Chirality, Molecule, StereoRef},
};

// Public API ==========================================================================================================

/// Parses a SMILES string; the empty string is the empty molecule
pub fn parse_smiles(input: &str) -> Result<Molecule> {
    let chains = final_parser(smiles)(input)?;
    let mut builder = Builder::default();
    for chain in &chains {
        builder.add_chain(None, chain)?;
    }
    builder.finish()
}

// Parse Tree ==========================================================================================================

#[derive(Clone, Eq, PartialEq, Debug)]
struct AtomSpec {
    element: Option<Element>,
    aromatic: bool,
    bracket: Option<BracketSpec>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
struct BracketSpec {
    isotope: Option<u16>,
    clockwise: Option<bool>,
    hydrogens: u8,
    charge: i8,
    class: u16,
}

#[derive(Clone, Eq, PartialEq, Debug)]
struct Chain {
    head: AtomSpec,
    links: Vec<Link>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
enum Link {
    Atom(Option<BondOrder>, AtomSpec),
    Ring(Option<BondOrder>, u16),
    Branch(Option<BondOrder>, Chain),
}

// Private Sub-Parsers =================================================================================================

/// SMILES = [ Chain , { "." , Chain } ] ;
fn smiles(i: &str) -> ParseResult<Vec<Chain>> {
    let parser = separated_list0(char('.'), chain);
    wrap_err(parser, MolkitErrorKind::ExpectedSmiles)(i)
}

/// Chain = Atom , { Link } ;
fn chain(i: &str) -> ParseResult<Chain> {
    map(pair(atom, many0(link)), |(head, links)| Chain { head, links })(i)
}

/// Link
///   = Branch
///   | [ Bond ] , Ring Number
///   | [ Bond ] , Atom
///   ;
fn link(i: &str) -> ParseResult<Link> {
    alt((
        map(branch, |(bond, chain)| Link::Branch(bond, chain)),
        map(pair(opt(bond), ring_number), |(bond, n)| Link::Ring(bond, n)),
        map(pair(opt(bond), atom), |(bond, atom)| Link::Atom(bond, atom)),
    ))(i)
}

/// Branch = "(" , [ Bond ] , Chain , ")" ;
fn branch(i: &str) -> ParseResult<(Option<BondOrder>, Chain)> {
    let close = expect(char(')'), MolkitErrorKind::ExpectedBranchEnd);
    delimited(char('('), pair(opt(bond), cut(chain)), cut(close))(i)
}

/// Bond = "-" | "=" | "#" | ":" | "/" | "\" ;
fn bond(i: &str) -> ParseResult<BondOrder> {
    // NOTE: Directional bonds only describe double-bond geometry, which isn't kept, so they're plain single bonds
    map(one_of("-=#:/\\"), |c| match c {
        '=' => BondOrder::Double,
        '#' => BondOrder::Triple,
        ':' => BondOrder::Aromatic,
        _ => BondOrder::Single,
    })(i)
}

/// Ring Number = digit | "%" , digit , digit ;
fn ring_number(i: &str) -> ParseResult<u16> {
    let single = map(satisfy(|c| c.is_ascii_digit()), digit_value);
    let digits = take_while_m_n(2, 2, |c: char| c.is_ascii_digit());
    let double = preceded(
        char('%'),
        cut(expect(
            map(digits, |ds: &str| ds.chars().fold(0, |n, c| n * 10 + digit_value(c))),
            MolkitErrorKind::ExpectedRingNumber,
        )),
    );
    alt((single, double))(i)
}

/// Atom = Bracket Atom | Organic Atom | Aromatic Atom | "*" ;
fn atom(i: &str) -> ParseResult<AtomSpec> {
    let wildcard = value(
        AtomSpec {
            element: None,
            aromatic: false,
            bracket: None,
        },
        char('*'),
    );
    let parser = alt((bracket_atom, organic_atom, aromatic_atom, wildcard));
    expect(parser, MolkitErrorKind::ExpectedAtom)(i)
}

/// Organic Atom = "Br" | "Cl" | "B" | "C" | "N" | "O" | "P" | "S" | "F" | "I" ;
fn organic_atom(i: &str) -> ParseResult<AtomSpec> {
    let symbol = alt((tag("Br"), tag("Cl"), recognize(one_of("BCNOPSFI"))));
    map(map_res(symbol, element), |element| AtomSpec {
        element: Some(element),
        aromatic: false,
        bracket: None,
    })(i)
}

/// Aromatic Atom = "b" | "c" | "n" | "o" | "p" | "s" ;
fn aromatic_atom(i: &str) -> ParseResult<AtomSpec> {
    map(map_res(recognize(one_of("bcnops")), aromatic_element), |element| AtomSpec {
        element: Some(element),
        aromatic: true,
        bracket: None,
    })(i)
}

/// Bracket Atom = "[" , [ Isotope ] , Bracket Symbol , [ Chirality ] , [ Hydrogens ] , [ Charge ] , [ Class ] , "]" ;
fn bracket_atom(i: &str) -> ParseResult<AtomSpec> {
    let contents = tuple((
        opt(u16),
        bracket_symbol,
        opt(chirality),
        opt(hydrogens),
        opt(charge),
        opt(class),
    ));
    let close = expect(char(']'), MolkitErrorKind::ExpectedBracketEnd);
    let parser = delimited(char('['), cut(contents), cut(close));
    map(
        parser,
        |(isotope, (element, aromatic), clockwise, hydrogens, charge, class)| AtomSpec {
            element,
            aromatic,
            bracket: Some(BracketSpec {
                isotope,
                clockwise,
                hydrogens: hydrogens.unwrap_or_default(),
                charge: charge.unwrap_or_default(),
                class: class.unwrap_or_default(),
            }),
        },
    )(i)
}

/// Bracket Symbol = "*" | "se" | "as" | Aromatic Atom | uppercase , [ lowercase ] ;
fn bracket_symbol(i: &str) -> ParseResult<(Option<Element>, bool)> {
    let wildcard = value((None, false), char('*'));
    let aromatic = map(
        map_res(
            alt((tag("se"), tag("as"), recognize(one_of("bcnops")))),
            aromatic_element,
        ),
        |e| (Some(e), true),
    );
    let symbol = recognize(pair(
        satisfy(|c| c.is_ascii_uppercase()),
        opt(satisfy(|c| c.is_ascii_lowercase())),
    ));
    let aliphatic = map(map_res(symbol, element), |e| (Some(e), false));
    let parser = alt((wildcard, aromatic, aliphatic));
    expect(parser, MolkitErrorKind::ExpectedElementSymbol)(i)
}

/// Chirality = ( "@@" | "@" ) ;
fn chirality(i: &str) -> ParseResult<bool> {
    let tetrahedral = alt((value(true, tag("@@")), value(false, char('@'))));
    // NOTE: Catches the `@TH1`, `@SP2` and friends, without tripping over a following hydrogen count
    let other_classes = not(satisfy(|c| c.is_ascii_uppercase() && c != 'H'));
    let unsupported = cut(expect(other_classes, MolkitErrorKind::UnsupportedChirality));
    terminated(tetrahedral, unsupported)(i)
}

/// Hydrogens = "H" , [ digit ] ;
fn hydrogens(i: &str) -> ParseResult<u8> {
    let count = map(satisfy(|c| c.is_ascii_digit()), |c| {
        u8::try_from(digit_value(c)).unwrap_or_default()
    });
    map(preceded(char('H'), opt(count)), |n| n.unwrap_or(1))(i)
}

/// Charge = ( "+" | "-" ) , { same sign } , [ number ] ;
pub(super) fn charge(i: &str) -> ParseResult<i8> {
    let (i, sign) = one_of("+-")(i)?;
    let (i, repeats) = many0_count(char(sign))(i)?;
    let (i, magnitude) = opt(nom::character::complete::u8)(i)?;
    let magnitude = magnitude.map_or(repeats + 1, usize::from);
    let magnitude = i8::try_from(magnitude).unwrap_or(i8::MAX);
    Ok((i, if sign == '-' { -magnitude } else { magnitude }))
}

/// Class = ":" , number ;
fn class(i: &str) -> ParseResult<u16> {
    let number = expect(u16, MolkitErrorKind::ExpectedAtomClass);
    preceded(char(':'), cut(number))(i)
}

// Private Helper Functions ============================================================================================

pub(super) fn digit_value(c: char) -> u16 {
    c.to_digit(10)
        .and_then(|d| u16::try_from(d).ok())
        .unwrap_or_default()
}

pub(super) fn element(symbol: &str) -> std::result::Result<Element, UnknownElement> {
    Element::from_symbol(symbol).ok_or_else(|| UnknownElement(symbol.to_owned()))
}

pub(super) fn aromatic_element(symbol: &str) -> std::result::Result<Element, UnknownElement> {
    let mut chars = symbol.chars();
    let capitalised: String = chars
        .next()
        .map(|c| c.to_ascii_uppercase())
        .into_iter()
        .chain(chars)
        .collect();
    Element::from_symbol(&capitalised)
        .filter(|e| e.can_be_aromatic())
        .ok_or_else(|| UnknownElement(symbol.to_owned()))
}

// Molecule Builder ====================================================================================================

// NOTE: A ring bond opened at an atom holds a place in that atom's neighbour order until it's closed
const PLACEHOLDER: StereoRef = StereoRef::Atom(usize::MAX);

#[derive(Copy, Clone, Debug)]
struct OpenRing {
    atom: usize,
    bond: Option<BondOrder>,
    slot: usize,
}

#[derive(Debug, Default)]
struct Builder {
    molecule: Molecule,
    bracketed: Vec<bool>,
    clockwise: Vec<Option<bool>>,
    neighbor_order: Vec<Vec<StereoRef>>,
    open_rings: BTreeMap<u16, OpenRing>,
    implicit_bonds: Vec<usize>,
}

impl Builder {
    fn add_chain(&mut self, previous: Option<(usize, Option<BondOrder>)>, chain: &Chain) -> Result<()> {
        let mut current = self.add_atom(&chain.head, previous);
        for link in &chain.links {
            match link {
                Link::Atom(bond, spec) => current = self.add_atom(spec, Some((current, *bond))),
                Link::Branch(bond, branch) => self.add_chain(Some((current, *bond)), branch)?,
                Link::Ring(bond, number) => self.ring_closure(current, *bond, *number)?,
            }
        }
        Ok(())
    }

    fn add_atom(&mut self, spec: &AtomSpec, previous: Option<(usize, Option<BondOrder>)>) -> usize {
        let bracket = spec.bracket.unwrap_or_default();
        let index = self.molecule.atom_count();
        let atom = Atom {
            isotope: bracket.isotope,
            charge: bracket.charge,
            hydrogens: bracket.hydrogens,
            aromatic: spec.aromatic,
            map: bracket.class,
            origin: index,
            ..Atom::new(spec.element)
        };
        self.molecule.add_atom(atom);
        self.bracketed.push(spec.bracket.is_some());
        self.clockwise.push(bracket.clockwise);
        self.neighbor_order.push(Vec::new());

        if let Some((previous, bond)) = previous {
            self.add_bond(previous, index, bond);
            self.neighbor_order[previous].push(StereoRef::Atom(index));
            self.neighbor_order[index].push(StereoRef::Atom(previous));
        }
        if bracket.hydrogens > 0 {
            self.neighbor_order[index].push(StereoRef::Hydrogen);
        }
        index
    }

    fn add_bond(&mut self, a: usize, b: usize, bond: Option<BondOrder>) {
        let atoms = self.molecule.atoms();
        let both_aromatic = atoms[a].aromatic && atoms[b].aromatic;
        let order = bond.unwrap_or(if both_aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        });
        let index = self.molecule.add_bond(a, b, order);
        if bond.is_none() && both_aromatic {
            self.implicit_bonds.push(index);
        }
    }

    fn ring_closure(&mut self, atom: usize, bond: Option<BondOrder>, number: u16) -> Result<()> {
        let Some(open) = self.open_rings.remove(&number) else {
            let slot = self.neighbor_order[atom].len();
            self.neighbor_order[atom].push(PLACEHOLDER);
            self.open_rings.insert(number, OpenRing { atom, bond, slot });
            return Ok(());
        };

        if open.atom == atom || self.molecule.bond_between(open.atom, atom).is_some() {
            return Err(ToolkitError::InvalidRingClosure { number });
        }
        let bond = match (open.bond, bond) {
            (Some(a), Some(b)) if a != b => return Err(ToolkitError::ConflictingRingBond { number }),
            (a, b) => a.or(b),
        };

        self.add_bond(open.atom, atom, bond);
        self.neighbor_order[open.atom][open.slot] = StereoRef::Atom(atom);
        self.neighbor_order[atom].push(StereoRef::Atom(open.atom));
        Ok(())
    }

    fn finish(mut self) -> Result<Molecule> {
        if let Some(&number) = self.open_rings.keys().next() {
            return Err(ToolkitError::UnclosedRing { number });
        }

        // NOTE: An unwritten bond between two aromatic atoms is only aromatic if it's in a ring (like the bond
        // joining the two halves of biphenyl, c1ccccc1c1ccccc1)
        let ring_bonds = self.molecule.ring_bonds();
        for &bond in &self.implicit_bonds {
            if !ring_bonds[bond] {
                self.molecule.set_bond_order(bond, BondOrder::Single);
            }
        }

        let ring_atoms = self.molecule.ring_atoms();
        for (index, atom) in self.molecule.atoms().iter().enumerate() {
            if atom.aromatic && !ring_atoms[index] {
                let symbol = atom.element.map_or("*", Element::symbol).to_owned();
                return Err(ToolkitError::AromaticOutsideRing { atom: index, symbol });
            }
        }

        for index in 0..self.molecule.atom_count() {
            if self.bracketed[index] {
                continue;
            }
            if self.molecule.exceeds_valence(index) {
                let symbol = self.molecule.atoms()[index]
                    .element
                    .map_or("*", Element::symbol)
                    .to_owned();
                let valence = usize::from(self.molecule.used_valence(index));
                return Err(ToolkitError::Valence {
                    atom: index,
                    symbol,
                    valence,
                });
            }
            let implicit = self.molecule.implicit_hydrogens(index).unwrap_or_default();
            self.molecule.atoms_mut()[index].hydrogens = implicit;
        }

        let Self {
            mut molecule,
            clockwise,
            neighbor_order,
            ..
        } = self;
        for ((atom, clockwise), neighbors) in molecule.atoms_mut().iter_mut().zip(clockwise).zip(neighbor_order) {
            // NOTE: Anything but three or four neighbours can't be a tetrahedral centre, so the mark is dropped
            if let Some(clockwise) = clockwise {
                if (3..=4).contains(&neighbors.len()) {
                    atom.chirality = Some(Chirality {
                        neighbors,
                        clockwise,
                    });
                }
            }
        }

        Ok(molecule)
    }
}

// Module Tests ========================================================================================================
