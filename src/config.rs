// Standard Library Imports
use std::num::NonZero;

// External Crate Imports
use frag2pair::PairSettings;
use fragmenter::{CutRules, FingerprintSettings, FragmentationSettings, MAX_CUTS};
use knus::{
    Decode, DecodeScalar,
    ast::{self, Integer, Literal, Radix, TypeName},
    decode::{Context, Kind},
    errors::{DecodeError, ExpectedType},
    span::{Span, Spanned},
    traits::ErrorSpan,
};
use miette::{Diagnostic, LabeledSpan, NamedSource, Result};
use molkit::{BondPattern, ToolkitError};
use rust_decimal::Decimal;
use thiserror::Error;

// Local Crate Imports
use crate::orchestrator::{FailedRowPolicy, RunSettings};

/// The rule used when a configuration names neither a rule nor a pattern
pub const DEFAULT_RULE: &str = "non-ring-single";

// Public API ==========================================================================================================

/// Everything needed to fragment a set of molecules and pair up the results
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RunConfig {
    /// The bond pattern (SMARTS) matching cuttable bonds
    pub pattern: String,
    pub fragmentation: FragmentationSettings,
    pub pairing: PairSettings,
    pub run: RunSettings,
}

impl RunConfig {
    pub fn new(rules: &CutRules, file_name: impl AsRef<str>, kdl_text: impl AsRef<str>) -> Result<Self> {
        let parsed_config: RunConfigKdl = knus::parse(file_name.as_ref(), kdl_text.as_ref())?;
        parsed_config
            .validate(rules)
            .map_err(|e| e.finalize(file_name, kdl_text).into())
    }

    /// The configuration of an empty KDL file
    pub fn with_defaults(rules: &CutRules) -> Result<Self> {
        Self::new(rules, "defaults.kdl", "")
    }
}

// KDL File Schema =====================================================================================================

#[derive(Debug, Decode)]
#[knus(span_type=Span)]
struct RunConfigKdl {
    #[knus(child)]
    fragmentation: Option<FragmentationKdl>,
    #[knus(child)]
    pairing: Option<PairingKdl>,
    #[knus(child)]
    run: Option<RunKdl>,
}

// ---------------------------------------------------------------------------------------------------------------------

#[derive(Debug, Decode)]
#[knus(span_type=Span)]
struct FragmentationKdl {
    #[knus(child, unwrap(argument))]
    rule: Option<Spanned<String, Span>>,
    #[knus(child, unwrap(argument))]
    pattern: Option<Spanned<String, Span>>,
    #[knus(child, unwrap(argument))]
    cuts: Option<Spanned<usize, Span>>,
    #[knus(child, unwrap(argument))]
    add_hydrogens: Option<bool>,
    #[knus(child, unwrap(argument))]
    allow_bond_as_value: Option<bool>,
    #[knus(child, unwrap(argument))]
    strip_hydrogens: Option<bool>,
    #[knus(child, unwrap(argument))]
    max_changing_heavy_atoms: Option<usize>,
    #[knus(child, unwrap(argument))]
    min_heavy_atom_ratio: Option<Spanned<DecimalKdl, Span>>,
    #[knus(child, unwrap(argument))]
    use_chirality: Option<bool>,
    #[knus(child, unwrap(argument))]
    prochiral_as_chiral: Option<bool>,
    #[knus(child, unwrap(argument))]
    leaf_cache_size: Option<usize>,
    #[knus(child)]
    fingerprint: Option<FingerprintKdl>,
}

#[derive(Debug, Decode)]
#[knus(span_type=Span)]
struct FingerprintKdl {
    #[knus(span)]
    span: Span,
    #[knus(property, default = 2)]
    radius: usize,
    #[knus(property, default = 64)]
    bits: usize,
}

// ---------------------------------------------------------------------------------------------------------------------

#[derive(Debug, Decode)]
#[knus(span_type=Span)]
struct PairingKdl {
    #[knus(child, unwrap(argument))]
    include_unchanging_portion: Option<bool>,
    #[knus(child, unwrap(argument))]
    include_heavy_atom_counts: Option<bool>,
    #[knus(child, unwrap(argument))]
    include_heavy_atom_ratio: Option<bool>,
    #[knus(child, unwrap(argument))]
    include_reverse_transforms: Option<bool>,
    #[knus(child, unwrap(argument))]
    include_reaction_pattern: Option<bool>,
    #[knus(child, unwrap(argument))]
    allow_self_transforms: Option<bool>,
    #[knus(child, unwrap(argument))]
    ignore_ids: Option<bool>,
    #[knus(child, unwrap(argument))]
    verify_sorted: Option<bool>,
}

// ---------------------------------------------------------------------------------------------------------------------

#[derive(Debug, Decode)]
#[knus(span_type=Span)]
struct RunKdl {
    #[knus(child, unwrap(argument))]
    threads: Option<Spanned<usize, Span>>,
    #[knus(child, unwrap(argument))]
    queue_size: Option<Spanned<usize, Span>>,
    #[knus(child, unwrap(argument))]
    keep_order: Option<bool>,
    #[knus(child, unwrap(argument))]
    failed_rows: Option<Spanned<String, Span>>,
}

// Lossless Parsing of KDL Numbers to Decimal =========================================================================

#[derive(Copy, Clone, Debug, Default)]
struct DecimalKdl(Decimal);

impl<S: ErrorSpan> DecodeScalar<S> for DecimalKdl {
    fn type_check(type_name: &Option<Spanned<TypeName, S>>, ctx: &mut Context<S>) {
        if let Some(t) = type_name {
            ctx.emit_error(DecodeError::TypeName {
                span: t.span().clone(),
                found: Some((**t).clone()),
                expected: ExpectedType::no_type(),
                rust_type: "Decimal",
            });
        }
    }

    fn raw_decode(value: &Spanned<Literal, S>, ctx: &mut Context<S>) -> Result<Self, DecodeError<S>> {
        match &**value {
            Literal::Decimal(ast::Decimal(s)) | Literal::Int(Integer(Radix::Dec, s)) => {
                let decimal = if s.contains(['e', 'E']) {
                    Decimal::from_scientific(s)
                } else {
                    Decimal::from_str_exact(s)
                };
                Ok(Self(decimal.unwrap_or_else(|e| {
                    ctx.emit_error(DecodeError::conversion(value, Box::new(e)));
                    Decimal::default()
                })))
            }
            unsupported => {
                let message = format!("expected a decimal number, found {}", Kind::from(unsupported));
                ctx.emit_error(DecodeError::unsupported(value, message));
                Ok(Self::default())
            }
        }
    }
}

// Contextual Validation Trait  ========================================================================================

type ConfigResult<T> = std::result::Result<T, ConfigErrorKind>;

trait ValidateInto<'c, T> {
    type Context: 'c;

    fn validate(self, ctx: Self::Context) -> ConfigResult<T>;
}

// Run Configuration Validation ========================================================================================

impl<'r> ValidateInto<'r, RunConfig> for RunConfigKdl {
    type Context = &'r CutRules;

    fn validate(self, ctx: Self::Context) -> ConfigResult<RunConfig> {
        let (pattern, fragmentation) = match self.fragmentation {
            Some(fragmentation) => fragmentation.validate(ctx)?,
            None => (default_pattern(ctx)?, FragmentationSettings::default()),
        };
        let pairing = self.pairing.map_or_else(PairSettings::default, PairingKdl::into_settings);
        let run = self.run.map_or_else(|| Ok(RunSettings::default()), |r| r.validate(()))?;
        Ok(RunConfig {
            pattern,
            fragmentation,
            pairing,
            run,
        })
    }
}

// Validate Fragmentation Settings =====================================================================================

impl<'r> ValidateInto<'r, (String, FragmentationSettings)> for FragmentationKdl {
    type Context = &'r CutRules;

    fn validate(self, ctx: Self::Context) -> ConfigResult<(String, FragmentationSettings)> {
        let pattern = match (self.rule, self.pattern) {
            (Some(rule), Some(pattern)) => {
                return Err(ConfigErrorKind::RuleAndPattern(*rule.span(), *pattern.span()));
            }
            (Some(rule), None) => ctx
                .get(&rule)
                .map(|r| r.pattern.clone())
                .ok_or_else(|| ConfigErrorKind::UnknownRule(*rule.span(), rule.as_str().to_owned()))?,
            (None, Some(pattern)) => {
                BondPattern::new(&pattern).map_err(|e| ConfigErrorKind::InvalidPattern(*pattern.span(), e))?;
                (*pattern).clone()
            }
            (None, None) => default_pattern(ctx)?,
        };

        let defaults = FragmentationSettings::default();
        let cut_count = match self.cuts {
            Some(cuts) if !(1..=MAX_CUTS).contains(&*cuts) => {
                return Err(ConfigErrorKind::CutCount(*cuts.span(), *cuts));
            }
            Some(cuts) => *cuts,
            None => defaults.cut_count,
        };
        let min_heavy_atom_ratio = self.min_heavy_atom_ratio.map(|ratio| ratio.validate(())).transpose()?;
        let fingerprint = self.fingerprint.map(|f| f.validate(())).transpose()?;

        let settings = FragmentationSettings {
            cut_count,
            add_hydrogens: self.add_hydrogens.unwrap_or(defaults.add_hydrogens),
            allow_bond_as_value: self.allow_bond_as_value.unwrap_or(defaults.allow_bond_as_value),
            strip_hydrogens: self.strip_hydrogens.unwrap_or(defaults.strip_hydrogens),
            max_changing_heavy_atoms: self.max_changing_heavy_atoms,
            min_heavy_atom_ratio,
            use_chirality: self.use_chirality.unwrap_or(defaults.use_chirality),
            prochiral_as_chiral: self.prochiral_as_chiral.unwrap_or(defaults.prochiral_as_chiral),
            leaf_cache_size: self.leaf_cache_size.unwrap_or(defaults.leaf_cache_size),
            fingerprint,
        };
        Ok((pattern, settings))
    }
}

// ---------------------------------------------------------------------------------------------------------------------

impl ValidateInto<'_, Decimal> for Spanned<DecimalKdl, Span> {
    type Context = ();

    fn validate(self, _ctx: Self::Context) -> ConfigResult<Decimal> {
        let DecimalKdl(ratio) = *self;
        if ratio.is_sign_negative() {
            return Err(ConfigErrorKind::HeavyAtomRatio(*self.span(), ratio));
        }
        Ok(ratio)
    }
}

impl ValidateInto<'_, FingerprintSettings> for FingerprintKdl {
    type Context = ();

    fn validate(self, _ctx: Self::Context) -> ConfigResult<FingerprintSettings> {
        if self.bits == 0 || self.bits % 8 != 0 {
            return Err(ConfigErrorKind::FingerprintBits(self.span, self.bits));
        }
        Ok(FingerprintSettings {
            radius: self.radius,
            bits: self.bits,
        })
    }
}

// Validate Pairing and Run Settings ===================================================================================

// NOTE: Every combination of pairing options is valid, so this can't fail
impl PairingKdl {
    fn into_settings(self) -> PairSettings {
        let defaults = PairSettings::default();
        PairSettings {
            include_key: self.include_unchanging_portion.unwrap_or(defaults.include_key),
            include_heavy_atom_counts: self
                .include_heavy_atom_counts
                .unwrap_or(defaults.include_heavy_atom_counts),
            include_heavy_atom_ratio: self
                .include_heavy_atom_ratio
                .unwrap_or(defaults.include_heavy_atom_ratio),
            include_reverse: self.include_reverse_transforms.unwrap_or(defaults.include_reverse),
            include_reaction_pattern: self
                .include_reaction_pattern
                .unwrap_or(defaults.include_reaction_pattern),
            allow_self_transforms: self.allow_self_transforms.unwrap_or(defaults.allow_self_transforms),
            ignore_ids: self.ignore_ids.unwrap_or(defaults.ignore_ids),
            verify_sorted: self.verify_sorted.unwrap_or(defaults.verify_sorted),
        }
    }
}

impl ValidateInto<'_, RunSettings> for RunKdl {
    type Context = ();

    fn validate(self, _ctx: Self::Context) -> ConfigResult<RunSettings> {
        let defaults = RunSettings::default();
        let non_zero = |count: Spanned<usize, Span>, name: &'static str| {
            NonZero::new(*count)
                .map(NonZero::get)
                .ok_or(ConfigErrorKind::Zero(*count.span(), name))
        };

        let threads = self.threads.map(|t| non_zero(t, "threads")).transpose()?;
        let queue_size = self.queue_size.map(|q| non_zero(q, "queue-size")).transpose()?;
        let failed_rows = match self.failed_rows {
            Some(policy) => match policy.as_str() {
                "route" => FailedRowPolicy::Route,
                "drop" => FailedRowPolicy::Drop,
                _ => return Err(ConfigErrorKind::FailedRowPolicy(*policy.span(), (*policy).clone())),
            },
            None => defaults.failed_rows,
        };

        Ok(RunSettings {
            threads: threads.unwrap_or(defaults.threads),
            queue_size: queue_size.unwrap_or(defaults.queue_size),
            keep_order: self.keep_order.unwrap_or(defaults.keep_order),
            failed_rows,
        })
    }
}

// Private Helper Functions ============================================================================================

fn default_pattern(rules: &CutRules) -> ConfigResult<String> {
    rules
        .get(DEFAULT_RULE)
        .map(|rule| rule.pattern.clone())
        .ok_or(ConfigErrorKind::MissingDefaultRule)
}

// Validation Error Types and Trait Implementations  ===================================================================

#[derive(Debug, Error)]
#[error("failed to validate run configuration")]
struct ConfigError {
    kdl: NamedSource<String>,
    #[source]
    kind: ConfigErrorKind,
}

// NOTE: This is manually implemented because the list of labels is dynamic and needs to be extracted from `self.kind`
impl Diagnostic for ConfigError {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.kdl)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(self.kind.labels().into_iter().map(|(s, l)| {
            LabeledSpan::new_with_span(Some(l.to_owned()), *s)
        })))
    }

    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        Some(&self.kind)
    }
}

#[derive(Clone, Debug, Diagnostic, Error)]
enum ConfigErrorKind {
    #[error("a bond pattern can come from a cut rule or be given directly, but not both")]
    #[diagnostic(help("remove either the rule or the pattern"))]
    RuleAndPattern(Span, Span),

    #[error("there is no cut rule named {1:?}")]
    #[diagnostic(help("the bundled rules are non-ring-single, carbon-hetero, any-acyclic and peptide-amide"))]
    UnknownRule(Span, String),

    #[error("configuration contained an invalid bond pattern")]
    InvalidPattern(
        Span,
        #[source]
        #[diagnostic_source]
        ToolkitError,
    ),

    #[error("molecules can't be cut {1} times")]
    #[diagnostic(help("choose a number of cuts between 1 and 10"))]
    CutCount(Span, usize),

    #[error("{1} is not a valid minimum heavy atom ratio")]
    #[diagnostic(help("the ratio of changing to unchanging heavy atoms can't be negative"))]
    HeavyAtomRatio(Span, Decimal),

    #[error("fingerprints can't be {1} bits long")]
    #[diagnostic(help("use a positive multiple of 8"))]
    FingerprintBits(Span, usize),

    #[error("{1} must be at least 1")]
    Zero(Span, &'static str),

    #[error("{1:?} is not a failed row policy")]
    #[diagnostic(help("failed rows can be \"route\"d to the failure output, or \"drop\"ped"))]
    FailedRowPolicy(Span, String),

    #[error("the bundled cut rules are missing the default rule, {DEFAULT_RULE:?}")]
    MissingDefaultRule,
}

impl ConfigErrorKind {
    fn labels(&self) -> Vec<(&Span, &'static str)> {
        match self {
            Self::RuleAndPattern(s1, s2) => vec![(s1, "rule given here"), (s2, "pattern given here")],
            Self::UnknownRule(s, _) => vec![(s, "unknown rule")],
            Self::InvalidPattern(s, _) => vec![(s, "invalid bond pattern")],
            Self::CutCount(s, _) => vec![(s, "unsupported number of cuts")],
            Self::HeavyAtomRatio(s, _) => vec![(s, "invalid ratio")],
            Self::FingerprintBits(s, _) => vec![(s, "invalid fingerprint length")],
            Self::Zero(s, _) => vec![(s, "can't be zero")],
            Self::FailedRowPolicy(s, _) => vec![(s, "unknown policy")],
            Self::MissingDefaultRule => Vec::new(),
        }
    }

    fn finalize(self, file_name: impl AsRef<str>, kdl: impl AsRef<str>) -> ConfigError {
        let kdl = NamedSource::new(file_name, kdl.as_ref().to_owned());
        ConfigError { kdl, kind: self }
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use insta::assert_snapshot;
    use once_cell::sync::Lazy;
    use rust_decimal_macros::dec;

    use super::*;

    static RULES: Lazy<CutRules> = Lazy::new(|| CutRules::bundled().unwrap());

    fn parse_config(kdl: &str) -> std::result::Result<RunConfig, ConfigError> {
        let config: RunConfigKdl = knus::parse("test", kdl).unwrap();
        config.validate(&RULES).map_err(|e| e.finalize("test", kdl))
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = RunConfig::with_defaults(&RULES).unwrap();
        assert_eq!(config.pattern, "[!#1]!@!=!#[!#1]");
        assert_eq!(config.fragmentation, FragmentationSettings::default());
        assert_eq!(config.pairing, PairSettings::default());
        assert_eq!(config.run, RunSettings::default());
    }

    #[test]
    fn full_config() {
        let kdl = indoc! {r#"
            fragmentation {
                rule "carbon-hetero"
                cuts 2
                add-hydrogens true
                allow-bond-as-value true
                strip-hydrogens false
                max-changing-heavy-atoms 10
                min-heavy-atom-ratio 0.3
                prochiral-as-chiral true
                leaf-cache-size 0
                fingerprint radius=1 bits=32
            }
            pairing {
                include-unchanging-portion false
                include-heavy-atom-counts true
                include-heavy-atom-ratio true
                include-reverse-transforms true
                include-reaction-pattern true
                allow-self-transforms true
                ignore-ids true
                verify-sorted false
            }
            run {
                threads 3
                queue-size 16
                keep-order false
                failed-rows "drop"
            }
        "#};
        let config = parse_config(kdl).unwrap();
        assert_eq!(config.pattern, "[#6]!@-[!#6;!#1]");
        assert_eq!(
            config.fragmentation,
            FragmentationSettings {
                cut_count: 2,
                add_hydrogens: true,
                allow_bond_as_value: true,
                strip_hydrogens: false,
                max_changing_heavy_atoms: Some(10),
                min_heavy_atom_ratio: Some(dec!(0.3)),
                use_chirality: true,
                prochiral_as_chiral: true,
                leaf_cache_size: 0,
                fingerprint: Some(FingerprintSettings { radius: 1, bits: 32 }),
            }
        );
        assert_eq!(
            config.pairing,
            PairSettings {
                include_key: false,
                include_heavy_atom_counts: true,
                include_heavy_atom_ratio: true,
                include_reverse: true,
                include_reaction_pattern: true,
                allow_self_transforms: true,
                ignore_ids: true,
                verify_sorted: false,
            }
        );
        assert_eq!(
            config.run,
            RunSettings {
                threads: 3,
                queue_size: 16,
                keep_order: false,
                failed_rows: FailedRowPolicy::Drop,
            }
        );
    }

    #[test]
    fn explicit_patterns() {
        let kdl = indoc! {r#"
            fragmentation {
                pattern "[#6]!@-[#8]"
            }
        "#};
        let config = parse_config(kdl).unwrap();
        assert_eq!(config.pattern, "[#6]!@-[#8]");
        assert_eq!(config.fragmentation.fingerprint, None);

        let kdl = indoc! {r#"
            fragmentation {
                fingerprint
            }
        "#};
        let fingerprint = parse_config(kdl).unwrap().fragmentation.fingerprint;
        assert_eq!(fingerprint, Some(FingerprintSettings::default()));
    }

    #[test]
    fn invalid_fragmentation() {
        let both = indoc! {r#"
            fragmentation {
                rule "any-acyclic"
                pattern "*!@*"
            }
        "#};
        let error = parse_config(both).unwrap_err();
        assert!(matches!(error.kind, ConfigErrorKind::RuleAndPattern(..)));
        assert_eq!(error.labels().unwrap().count(), 2);

        let unknown = indoc! {r#"
            fragmentation {
                rule "every-bond"
            }
        "#};
        let error = parse_config(unknown).unwrap_err();
        assert_snapshot!(error.kind.to_string(), @r#"there is no cut rule named "every-bond""#);

        let broken = indoc! {r#"
            fragmentation {
                pattern "C-C-C"
            }
        "#};
        let error = parse_config(broken).unwrap_err();
        assert!(matches!(error.kind, ConfigErrorKind::InvalidPattern(..)));
        assert!(error.diagnostic_source().is_some());

        for cuts in ["0", "11"] {
            let error = parse_config(&format!("fragmentation {{\n    cuts {cuts}\n}}")).unwrap_err();
            assert!(matches!(error.kind, ConfigErrorKind::CutCount(..)));
        }

        let negative = "fragmentation {\n    min-heavy-atom-ratio -0.5\n}";
        let error = parse_config(negative).unwrap_err();
        assert_snapshot!(error.kind.to_string(), @"-0.5 is not a valid minimum heavy atom ratio");

        let odd_bits = "fragmentation {\n    fingerprint bits=12\n}";
        let error = parse_config(odd_bits).unwrap_err();
        assert_snapshot!(error.kind.to_string(), @"fingerprints can't be 12 bits long");
    }

    #[test]
    fn invalid_run_settings() {
        let error = parse_config("run {\n    threads 0\n}").unwrap_err();
        assert_snapshot!(error.kind.to_string(), @"threads must be at least 1");
        let error = parse_config("run {\n    queue-size 0\n}").unwrap_err();
        assert_snapshot!(error.kind.to_string(), @"queue-size must be at least 1");

        let error = parse_config("run {\n    failed-rows \"ignore\"\n}").unwrap_err();
        assert_snapshot!(error.kind.to_string(), @r#""ignore" is not a failed row policy"#);
        assert_eq!(error.labels().unwrap().count(), 1);
    }

    #[test]
    fn unknown_nodes_are_rejected() {
        assert!(RunConfig::new(&RULES, "test", "fragmentation {\n    cut 2\n}").is_err());
    }
}
