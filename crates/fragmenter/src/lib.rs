//! Cuts molecules into (key, value) fragmentation records for matched-molecular-pair analysis. A
//! [`FragmentationEngine`] holds everything shared between molecules; each molecule gets its own short-lived
//! [`FragmentationFactory`]

mod cache;
mod cancellation;
pub mod combinations;
pub mod errors;
mod factory;
pub mod record;
mod rules;
pub mod settings;

pub use cache::LeafCache;
pub use cancellation::CancellationToken;
pub use errors::{ConfigurationError, FactoryError, IncomingMoleculeError};
pub use factory::{FragmentationEngine, FragmentationFactory};
pub use record::{CutSet, Fingerprint, FragmentKey, FragmentValue, FragmentationRecord, HeavyAtoms};
pub use rules::{CutRule, CutRules};
pub use settings::{FingerprintSettings, FragmentationSettings, MAX_CUTS};
