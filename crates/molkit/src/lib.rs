//! Just enough cheminformatics to fragment molecules: a SMILES reader and writer, two-atom bond patterns, and a
//! canonicaliser, all hidden behind the [`MoleculeToolkit`] trait

mod canonical;
mod element;
pub mod errors;
mod fingerprint;
pub mod molecule;
pub mod parsers;
pub mod pattern;
mod toolkit;
mod writer;

pub use canonical::CanonicalOptions;
pub use element::Element;
pub use errors::{Result, ToolkitError};
pub use molecule::{BondIdentifier, BondOrder, Molecule};
pub use pattern::BondPattern;
pub use toolkit::{MoleculeToolkit, SmilesToolkit};
