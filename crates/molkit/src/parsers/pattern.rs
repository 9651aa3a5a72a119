// External Crate Imports
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, one_of, satisfy, u8},
    combinator::{cut, map, opt, peek, recognize, value},
    multi::{many0, many0_count, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
};
use nom_miette::{expect, final_parser, map_res, wrap_err};

// Local Crate Imports
use super::{
    errors::{MolkitErrorKind, ParseError, ParseResult},
    smiles::{aromatic_element, charge, element},
};
use crate::{
    Element,
    molecule::BondOrder,
    pattern::{AtomPrimitive, BondPrimitive, Query},
};

type AtomQuery = Query<AtomPrimitive>;
type BondQuery = Query<BondPrimitive>;

// Public API ==========================================================================================================

pub fn bond_pattern(input: &str) -> Result<(AtomQuery, BondQuery, AtomQuery), ParseError> {
    let parser = tuple((atom_query, opt(expression(bond_primitive)), atom_query));
    let parser = map(parser, |(first, bond, second)| {
        let single_or_aromatic = Query::Or(vec![
            Query::Primitive(BondPrimitive::Order(BondOrder::Single)),
            Query::Primitive(BondPrimitive::Order(BondOrder::Aromatic)),
        ]);
        (first, bond.unwrap_or(single_or_aromatic), second)
    });
    final_parser(wrap_err(parser, MolkitErrorKind::ExpectedBondPattern))(input)
}

// Private Sub-Parsers =================================================================================================

/// Atom Query = "*" | Organic Symbol | Aromatic Symbol | "[" , Expression , "]" ;
fn atom_query(i: &str) -> ParseResult<AtomQuery> {
    let wildcard = value(Query::Primitive(AtomPrimitive::Any), char('*'));
    let organic = map(
        map_res(alt((tag("Br"), tag("Cl"), recognize(one_of("BCNOPSFI")))), element),
        |element| Query::Primitive(AtomPrimitive::Element { element, aromatic: false }),
    );
    let aromatic = map(
        map_res(recognize(one_of("bcnops")), aromatic_element),
        |element| Query::Primitive(AtomPrimitive::Element { element, aromatic: true }),
    );
    let close = expect(char(']'), MolkitErrorKind::ExpectedBracketEnd);
    // NOTE: `[H]` is a hydrogen atom, though `H` anywhere else in a bracket is a hydrogen count
    let hydrogen = value(
        Query::Primitive(AtomPrimitive::AtomicNumber(Element::H.atomic_number())),
        terminated(char('H'), peek(char(']'))),
    );
    let contents = expect(
        alt((hydrogen, expression(atom_primitive))),
        MolkitErrorKind::ExpectedAtomPrimitive,
    );
    let bracketed = delimited(char('['), cut(contents), cut(close));
    let parser = alt((wildcard, bracketed, organic, aromatic));
    expect(parser, MolkitErrorKind::ExpectedAtomQuery)(i)
}

/// Expression = Or Expression , { ";" , Or Expression } ;
/// Or Expression = And Expression , { "," , And Expression } ;
/// And Expression = Negation , { [ "&" ] , Negation } ;
fn expression<P>(primitive: fn(&str) -> ParseResult<P>) -> impl FnMut(&str) -> ParseResult<Query<P>> {
    move |i| {
        let high_and = map(
            pair(negation(primitive), many0(preceded(opt(char('&')), negation(primitive)))),
            |(first, mut rest)| {
                rest.insert(0, first);
                Query::all(rest)
            },
        );
        let or = map(separated_list1(char(','), high_and), Query::any);
        map(separated_list1(char(';'), or), Query::all)(i)
    }
}

/// Negation = { "!" } , Primitive ;
fn negation<P>(primitive: fn(&str) -> ParseResult<P>) -> impl FnMut(&str) -> ParseResult<Query<P>> {
    move |i| {
        map(pair(many0_count(char('!')), primitive), |(nots, p)| {
            let query = Query::Primitive(p);
            if nots % 2 == 1 { Query::Not(Box::new(query)) } else { query }
        })(i)
    }
}

/// Atom Primitive
///   = "*" | "#" , number | "a" | "A"
///   | "R" , [ number ] | "H" , [ digit ] | "D" , [ digit ] | "X" , [ digit ]
///   | Charge | Element Symbol | Aromatic Symbol
///   ;
fn atom_primitive(i: &str) -> ParseResult<AtomPrimitive> {
    let count = |c| preceded(char(c), map(opt(u8), |n| n.unwrap_or(1)));
    let two_letter = map(
        map_res(
            recognize(pair(
                satisfy(|c| c.is_ascii_uppercase()),
                satisfy(|c| c.is_ascii_lowercase()),
            )),
            element,
        ),
        |element| AtomPrimitive::Element { element, aromatic: false },
    );
    let one_letter = map(
        map_res(recognize(satisfy(|c| c.is_ascii_uppercase())), element),
        |element| AtomPrimitive::Element { element, aromatic: false },
    );
    let aromatic = map(
        map_res(alt((tag("se"), tag("as"), recognize(one_of("bcnops")))), aromatic_element),
        |element| AtomPrimitive::Element { element, aromatic: true },
    );
    let ring = map(preceded(char('R'), opt(u8)), |n| AtomPrimitive::InRing(n != Some(0)));

    let parser = alt((
        value(AtomPrimitive::Any, char('*')),
        map(preceded(char('#'), u8), AtomPrimitive::AtomicNumber),
        // NOTE: Two-letter symbols go first so that `Cl` isn't read as `C` followed by something else
        two_letter,
        ring,
        map(count('H'), AtomPrimitive::TotalHydrogens),
        map(count('D'), AtomPrimitive::Degree),
        map(count('X'), AtomPrimitive::Connectivity),
        value(AtomPrimitive::Aliphatic, char('A')),
        aromatic,
        value(AtomPrimitive::Aromatic, char('a')),
        map(charge, AtomPrimitive::Charge),
        one_letter,
    ));
    expect(parser, MolkitErrorKind::ExpectedAtomPrimitive)(i)
}

/// Bond Primitive = "-" | "=" | "#" | ":" | "~" | "@" | "/" | "\" ;
fn bond_primitive(i: &str) -> ParseResult<BondPrimitive> {
    let parser = map(one_of("-=#:~@/\\"), |c| match c {
        '=' => BondPrimitive::Order(BondOrder::Double),
        '#' => BondPrimitive::Order(BondOrder::Triple),
        ':' => BondPrimitive::Order(BondOrder::Aromatic),
        '~' => BondPrimitive::Any,
        '@' => BondPrimitive::Ring,
        _ => BondPrimitive::Order(BondOrder::Single),
    });
    expect(parser, MolkitErrorKind::ExpectedBondPrimitive)(i)
}

// Module Tests ========================================================================================================
