pub mod errors;
pub(crate) mod pattern;
pub mod smiles;
