// External Crate Imports
use molkit::CanonicalOptions;
use rust_decimal::Decimal;

// Local Crate Imports
use crate::record::HeavyAtoms;

/// The most bonds that can be cut at once
pub const MAX_CUTS: usize = 10;

// Public API ==========================================================================================================

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FragmentationSettings {
    /// How many bonds are cut at once (`1..=MAX_CUTS`)
    pub cut_count: usize,
    /// For single cuts only: make hydrogens explicit so they can be cut off too, giving `[*:1][H]` values
    pub add_hydrogens: bool,
    /// For double cuts only: also try leaving each cuttable bond as a `[*:1]-[*:2]` value
    pub allow_bond_as_value: bool,
    /// Fold explicit hydrogens back into their heavy atoms before writing canonical strings
    pub strip_hydrogens: bool,
    pub max_changing_heavy_atoms: Option<usize>,
    pub min_heavy_atom_ratio: Option<Decimal>,
    pub use_chirality: bool,
    /// If a molecule has no stereocentres, give prochiral centres a fixed configuration anyway
    pub prochiral_as_chiral: bool,
    /// Canonical strings of this many fragments are remembered per molecule (`0` turns the cache off)
    pub leaf_cache_size: usize,
    pub fingerprint: Option<FingerprintSettings>,
}

impl Default for FragmentationSettings {
    fn default() -> Self {
        Self {
            cut_count: 1,
            add_hydrogens: false,
            allow_bond_as_value: false,
            strip_hydrogens: true,
            max_changing_heavy_atoms: None,
            min_heavy_atom_ratio: None,
            use_chirality: true,
            prochiral_as_chiral: false,
            leaf_cache_size: 50,
            fingerprint: None,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct FingerprintSettings {
    pub radius: usize,
    pub bits: usize,
}

impl Default for FingerprintSettings {
    fn default() -> Self {
        Self { radius: 2, bits: 64 }
    }
}

impl FragmentationSettings {
    /// Values may be no larger than `max_changing_heavy_atoms`, and no smaller (relative to their key) than
    /// `min_heavy_atom_ratio`; hitting either limit exactly still passes
    #[must_use]
    pub fn passes_filters(&self, heavy_atoms: HeavyAtoms) -> bool {
        let small_enough = self
            .max_changing_heavy_atoms
            .is_none_or(|max| heavy_atoms.changing <= max);
        // NOTE: A value with no key to compare against has an infinite ratio, so can't fall below the minimum
        let large_enough = self
            .min_heavy_atom_ratio
            .zip(heavy_atoms.ratio())
            .is_none_or(|(min, ratio)| ratio >= min);
        small_enough && large_enough
    }

    #[must_use]
    pub const fn canonical_options(&self, parent_has_stereocentres: bool) -> CanonicalOptions {
        CanonicalOptions {
            chirality: self.use_chirality,
            prochiral_as_chiral: self.prochiral_as_chiral && !parent_has_stereocentres,
            strip_hydrogens: self.strip_hydrogens,
        }
    }

    /// Explicit hydrogens are only ever added for single cuts
    #[must_use]
    pub const fn adds_hydrogens(&self) -> bool {
        self.add_hydrogens && self.cut_count == 1
    }

    /// The bond-as-value cut only exists for double cuts
    #[must_use]
    pub const fn allows_bond_as_value(&self) -> bool {
        self.allow_bond_as_value && self.cut_count == 2
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn heavy_atoms(changing: usize, unchanging: usize) -> HeavyAtoms {
        HeavyAtoms {
            changing,
            unchanging,
        }
    }

    #[test]
    fn no_filters_pass_everything() {
        let settings = FragmentationSettings::default();
        assert!(settings.passes_filters(heavy_atoms(100, 1)));
        assert!(settings.passes_filters(heavy_atoms(0, 0)));
    }

    #[test]
    fn boundary_values_pass() {
        let settings = FragmentationSettings {
            max_changing_heavy_atoms: Some(3),
            min_heavy_atom_ratio: Some(dec!(0.5)),
            ..FragmentationSettings::default()
        };
        assert!(settings.passes_filters(heavy_atoms(3, 6)));
        assert!(!settings.passes_filters(heavy_atoms(4, 6)));
        assert!(!settings.passes_filters(heavy_atoms(2, 6)));
        assert!(settings.passes_filters(heavy_atoms(3, 0)));
    }

    #[test]
    fn filters_toggle_independently() {
        let max_only = FragmentationSettings {
            max_changing_heavy_atoms: Some(1),
            ..FragmentationSettings::default()
        };
        assert!(max_only.passes_filters(heavy_atoms(1, 100)));
        assert!(!max_only.passes_filters(heavy_atoms(2, 2)));

        let ratio_only = FragmentationSettings {
            min_heavy_atom_ratio: Some(dec!(0.25)),
            ..FragmentationSettings::default()
        };
        assert!(ratio_only.passes_filters(heavy_atoms(50, 1)));
        assert!(!ratio_only.passes_filters(heavy_atoms(1, 5)));
    }

    #[test]
    fn prochiral_centres_need_an_achiral_parent() {
        let settings = FragmentationSettings {
            prochiral_as_chiral: true,
            ..FragmentationSettings::default()
        };
        assert!(settings.canonical_options(false).prochiral_as_chiral);
        assert!(!settings.canonical_options(true).prochiral_as_chiral);
        assert!(settings.canonical_options(true).chirality);
    }

    #[test]
    fn cut_count_gates_options() {
        let settings = FragmentationSettings {
            add_hydrogens: true,
            allow_bond_as_value: true,
            ..FragmentationSettings::default()
        };
        assert!(settings.adds_hydrogens());
        assert!(!settings.allows_bond_as_value());

        let double = FragmentationSettings {
            cut_count: 2,
            ..settings
        };
        assert!(!double.adds_hydrogens());
        assert!(double.allows_bond_as_value());
    }
}
