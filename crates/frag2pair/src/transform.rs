// Standard Library Imports
use std::fmt::{self, Display, Formatter};

// External Crate Imports
use fragmenter::{FragmentKey, FragmentValue};
use molkit::MoleculeToolkit;
use rust_decimal::Decimal;

// Local Crate Imports
use crate::{errors::Result, settings::PairSettings};

/// Ratios are written with this many decimal places
const RATIO_PLACES: u32 = 3;

// Public API ==========================================================================================================

/// Turns the two sides of a transform into a chemical reaction string
pub trait ReactionNotation: Sync {
    fn reaction(&self, left: &str, right: &str) -> molkit::Result<String>;
}

impl<T: MoleculeToolkit> ReactionNotation for T {
    fn reaction(&self, left: &str, right: &str) -> molkit::Result<String> {
        self.reaction_smarts(left, right)
    }
}

/// One side of a transform
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct TransformSide {
    pub smiles: String,
    pub id: String,
}

/// Two values that share a key. Optional columns are `None` unless they were asked for
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct TransformPair {
    pub key: Option<String>,
    pub left: TransformSide,
    pub right: TransformSide,
    /// Changing heavy atoms on the left and right
    pub heavy_atoms: Option<(usize, usize)>,
    /// Changing over unchanging heavy atoms on the left and right (`None` for a side with no unchanging atoms)
    pub ratios: Option<(Option<Decimal>, Option<Decimal>)>,
    pub reverse: Option<bool>,
    pub reaction: Option<String>,
}

impl TransformPair {
    pub(crate) fn new(
        key: &FragmentKey,
        left: &FragmentValue,
        right: &FragmentValue,
        settings: &PairSettings,
        notation: &impl ReactionNotation,
    ) -> Result<Self> {
        let side = |value: &FragmentValue| TransformSide {
            smiles: value.smiles.clone(),
            id: value.id.clone(),
        };
        let reaction = if settings.include_reaction_pattern {
            Some(notation.reaction(&left.smiles, &right.smiles)?)
        } else {
            None
        };

        Ok(Self {
            key: settings.include_key.then(|| key.smiles.clone()),
            left: side(left),
            right: side(right),
            heavy_atoms: settings
                .include_heavy_atom_counts
                .then_some((left.heavy_atoms.changing, right.heavy_atoms.changing)),
            ratios: settings
                .include_heavy_atom_ratio
                .then(|| (left.heavy_atoms.ratio(), right.heavy_atoms.ratio())),
            reverse: settings.include_reverse.then_some(false),
            reaction,
        })
    }

    /// The same transform read right to left. Only the reaction string is worked out again
    pub(crate) fn reversed(&self, notation: &impl ReactionNotation) -> Result<Self> {
        let reaction = match self.reaction {
            Some(_) => Some(notation.reaction(&self.right.smiles, &self.left.smiles)?),
            None => None,
        };
        Ok(Self {
            key: self.key.clone(),
            left: self.right.clone(),
            right: self.left.clone(),
            heavy_atoms: self.heavy_atoms.map(|(left, right)| (right, left)),
            ratios: self.ratios.map(|(left, right)| (right, left)),
            reverse: Some(true),
            reaction,
        })
    }

    /// Column names matching [`TransformPair`]'s `Display` output under `settings`
    #[must_use]
    pub fn header(settings: &PairSettings) -> String {
        let mut columns = Vec::new();
        if settings.include_key {
            columns.push("key");
        }
        columns.extend(["left", "left_id", "right", "right_id"]);
        if settings.include_heavy_atom_counts {
            columns.extend(["left_heavy_atoms", "right_heavy_atoms"]);
        }
        if settings.include_heavy_atom_ratio {
            columns.extend(["left_ratio", "right_ratio"]);
        }
        if settings.include_reverse {
            columns.push("reverse");
        }
        if settings.include_reaction_pattern {
            columns.push("reaction");
        }
        columns.join("\t")
    }
}

/// Tab-separated, skipping any column that wasn't asked for
impl Display for TransformPair {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if let Some(key) = &self.key {
            write!(f, "{key}\t")?;
        }
        let Self { left, right, .. } = self;
        write!(f, "{}\t{}\t{}\t{}", left.smiles, left.id, right.smiles, right.id)?;
        if let Some((left, right)) = self.heavy_atoms {
            write!(f, "\t{left}\t{right}")?;
        }
        if let Some((left, right)) = self.ratios {
            write!(f, "\t{}\t{}", Ratio(left), Ratio(right))?;
        }
        if let Some(reverse) = self.reverse {
            write!(f, "\t{reverse}")?;
        }
        if let Some(reaction) = &self.reaction {
            write!(f, "\t{reaction}")?;
        }
        Ok(())
    }
}

// Private Helper Functions ============================================================================================

struct Ratio(Option<Decimal>);

impl Display for Ratio {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.0 {
            Some(ratio) => write!(f, "{}", ratio.round_dp(RATIO_PLACES).normalize()),
            None => f.write_str("inf"),
        }
    }
}

// Module Tests ========================================================================================================
