use miette::Diagnostic;
use thiserror::Error;

use crate::parsers::errors::ParseError;

pub type Result<T, E = ToolkitError> = std::result::Result<T, E>;

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum ToolkitError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] Box<ParseError>),

    #[diagnostic(help("every ring-closure number needs to appear twice: once to open the ring, once to close it"))]
    #[error("ring closure {number} was opened but never closed")]
    UnclosedRing { number: u16 },

    #[error("ring closure {number} would bond an atom to itself or to an atom it's already bonded to")]
    InvalidRingClosure { number: u16 },

    #[error("the two ends of ring closure {number} were given different bond orders")]
    ConflictingRingBond { number: u16 },

    #[diagnostic(help("write the atom in brackets, with an explicit charge, if this valence is intentional"))]
    #[error("atom {atom} ({symbol}) has a valence of {valence}, which is more than it allows")]
    Valence {
        atom: usize,
        symbol: String,
        valence: usize,
    },

    #[diagnostic(help("aromatic (lowercase) atoms must be part of a ring"))]
    #[error("atom {atom} ({symbol}) is marked aromatic, but isn't in a ring")]
    AromaticOutsideRing { atom: usize, symbol: String },

    #[error("there is no attachment point labelled {label} in this fragment")]
    MissingAttachment { label: u16 },

    #[error("bond {index} doesn't exist in this molecule")]
    MissingBond { index: usize },
}

impl From<ParseError> for ToolkitError {
    fn from(value: ParseError) -> Self {
        Self::Parse(Box::new(value))
    }
}
