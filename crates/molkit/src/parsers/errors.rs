use miette::Diagnostic;
use nom::{IResult, error::ErrorKind};
use nom_miette::{FromExternalError, LabeledError, LabeledErrorKind, LabeledParseError};
use thiserror::Error;

pub type ParseError = LabeledError<MolkitErrorKind>;
pub type ParseResult<'a, O> = IResult<&'a str, O, LabeledParseError<'a, MolkitErrorKind>>;

#[derive(Clone, Eq, PartialEq, Debug, Diagnostic, Error)]
pub enum MolkitErrorKind {
    #[error("expected a SMILES string: atoms, bonds, branches and ring closures, separated by '.'")]
    ExpectedSmiles,

    #[error(
        "expected an atom: an organic-subset symbol (like C or Cl), an aromatic symbol (like c), '*', or a \
        bracket atom (like [NH4+])"
    )]
    ExpectedAtom,

    #[error("expected an element symbol inside the atom's brackets")]
    ExpectedElementSymbol,

    #[diagnostic(help("you've probably forgotten to close an earlier '[' bracket"))]
    #[error("expected ']' to close the bracket atom")]
    ExpectedBracketEnd,

    #[diagnostic(help("you've probably forgotten to close an earlier '(' branch"))]
    #[error("expected ')' to close the branch")]
    ExpectedBranchEnd,

    #[error("expected a ring-closure number: a single digit, or '%' followed by two digits")]
    ExpectedRingNumber,

    #[error("expected an atom-class number after ':'")]
    ExpectedAtomClass,

    #[diagnostic(help("only tetrahedral chirality ('@' or '@@') is supported"))]
    #[error("unsupported chirality specification")]
    UnsupportedChirality,

    #[diagnostic(help(
        "the symbol may be a typo, or an element that can't be aromatic, like cl (aromatic atoms are written in \
        lowercase)"
    ))]
    #[error("{0:?} is not a known element symbol")]
    UnknownElement(String),

    #[error("expected a bond pattern: exactly two atoms joined by one (optional) bond, like [#6]-!@[#7]")]
    ExpectedBondPattern,

    #[error("expected an atom query: '*', an element symbol, or a bracketed expression (like [#6;!R])")]
    ExpectedAtomQuery,

    #[error("expected an atom primitive (like #6, C, a, A, R, H1, D2, X4 or +1)")]
    ExpectedAtomPrimitive,

    #[error("expected a bond primitive: one of - = # : ~ @")]
    ExpectedBondPrimitive,

    #[diagnostic(help(
        "this is an internal error that you shouldn't ever see! If you have gotten this error, \
        then please report it as a bug!"
    ))]
    #[error("internal `nom` error: {0:?}")]
    NomError(ErrorKind),

    #[diagnostic(help("check the unparsed region for errors, or remove it from the rest of the input"))]
    #[error("could not interpret the full input")]
    Incomplete,
}

/// An element symbol that doesn't name an element, or names one that can't be written the way it was
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct UnknownElement(pub String);

impl LabeledErrorKind for MolkitErrorKind {
    fn label(&self) -> Option<&'static str> {
        Some(match self {
            Self::ExpectedAtom => "expected an atom",
            Self::ExpectedElementSymbol => "expected an element",
            Self::ExpectedBracketEnd => "expected ']'",
            Self::ExpectedBranchEnd => "expected ')'",
            Self::ExpectedRingNumber => "expected a ring number",
            Self::ExpectedAtomClass => "expected a number",
            Self::UnsupportedChirality => "unsupported chirality",
            Self::UnknownElement(_) => "unknown element",
            Self::ExpectedAtomQuery => "expected an atom query",
            Self::ExpectedAtomPrimitive => "expected a primitive",
            Self::ExpectedBondPrimitive => "expected a bond",
            Self::Incomplete => "input was valid up until this point",
            Self::NomError(_) => "the region that triggered this bug!",
            _ => return None,
        })
    }
}

impl<'a> FromExternalError<'a, UnknownElement> for MolkitErrorKind {
    const FATAL: bool = true;

    fn from_external_error(input: &'a str, e: UnknownElement) -> LabeledParseError<'a, Self> {
        LabeledParseError::new(input, Self::UnknownElement(e.0))
    }
}

impl From<ErrorKind> for MolkitErrorKind {
    fn from(value: ErrorKind) -> Self {
        match value {
            ErrorKind::Eof => Self::Incomplete,
            kind => Self::NomError(kind),
        }
    }
}
