use miette::Diagnostic;
use molkit::ToolkitError;
use thiserror::Error;

pub type Result<T, E = PairError> = std::result::Result<T, E>;

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum PairError {
    #[diagnostic(help(
        "sort the fragmentation records by key before streaming them, or pair them in batch mode instead"
    ))]
    #[error("the key {key:?} (from molecule {id:?}) turned up again after a different key")]
    SortOrderViolation { key: String, id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Toolkit(#[from] ToolkitError),
}
