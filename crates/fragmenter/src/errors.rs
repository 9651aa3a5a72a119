use miette::Diagnostic;
use molkit::ToolkitError;
use thiserror::Error;

pub type Result<T, E = FactoryError> = std::result::Result<T, E>;

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum FactoryError {
    #[diagnostic(help("a factory can't be used again once it has been closed"))]
    #[error("attempted to cut a molecule with a closed fragmentation factory")]
    Closed,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Toolkit(#[from] ToolkitError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    IncomingMolecule(#[from] IncomingMoleculeError),

    #[error("fragmentation was cancelled")]
    Cancelled,
}

/// The molecule handed to a factory can't be fragmented at all
#[derive(Debug, Diagnostic, Copy, Clone, Eq, PartialEq, Error)]
pub enum IncomingMoleculeError {
    #[error("the molecule doesn't contain any atoms")]
    NoStructure,

    #[diagnostic(help("strip salts and solvents so that only a single connected structure remains"))]
    #[error("the molecule is made of more than one disconnected component")]
    MultiComponent,
}

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum ConfigurationError {
    #[diagnostic(help("molecules can be cut between 1 and {max} times"))]
    #[error("{cuts} is not a supported number of cuts")]
    CutCount { cuts: usize, max: usize },

    #[error("failed to parse the bond pattern {pattern:?}")]
    Pattern {
        pattern: String,
        #[source]
        #[diagnostic_source]
        source: ToolkitError,
    },
}
