//! Turns fragmentation records into matched molecular pairs: every two values that share a key make a transform.
//! Records that are already sorted by key can be streamed through a [`StreamingPairer`]; anything else goes through a
//! [`BatchPairer`]

pub mod errors;
mod group;
mod pairer;
mod settings;
mod transform;

pub use errors::PairError;
pub use group::ValueGroup;
pub use pairer::{BatchPairer, StreamingPairer};
pub use settings::PairSettings;
pub use transform::{ReactionNotation, TransformPair, TransformSide};
