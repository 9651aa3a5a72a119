// Standard Library Imports
use std::collections::hash_map::Entry;

// External Crate Imports
use ahash::{HashMap, HashMapExt};
use knus::{
    Decode,
    span::{Span, Spanned},
};
use miette::{Diagnostic, LabeledSpan, NamedSource, Result};
use molkit::{BondPattern, ToolkitError};
use thiserror::Error;

const BUNDLED_RULES: &str = include_str!("../data/cut_rules.kdl");

// Public API ==========================================================================================================

/// A named library of bond patterns, so common choices of cuttable bond don't have to be spelled out as SMARTS
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CutRules {
    rules: Vec<CutRule>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CutRule {
    pub name: String,
    pub description: String,
    pub pattern: String,
}

impl CutRules {
    pub fn new(file_name: impl AsRef<str>, kdl_text: impl AsRef<str>) -> Result<Self> {
        let parsed_rules: CutRulesKdl = knus::parse(file_name.as_ref(), kdl_text.as_ref())?;
        parsed_rules
            .validate(())
            .map_err(|e| e.finalize(file_name, kdl_text).into())
    }

    /// The rules shipped with this crate
    pub fn bundled() -> Result<Self> {
        Self::new("cut_rules.kdl", BUNDLED_RULES)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CutRule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    /// Rules in the order they were defined
    pub fn iter(&self) -> impl Iterator<Item = &CutRule> {
        self.rules.iter()
    }
}

// KDL File Schema =====================================================================================================

#[derive(Debug, Decode)]
#[knus(span_type=Span)]
struct CutRulesKdl {
    #[knus(children)]
    rules: Vec<CutRuleKdl>,
}

#[derive(Debug, Decode)]
#[knus(span_type=Span)]
struct CutRuleKdl {
    #[knus(span)]
    span: Span,
    #[knus(node_name)]
    name: String,
    #[knus(argument)]
    description: String,
    #[knus(child, unwrap(argument))]
    pattern: Spanned<String, Span>,
}

// Contextual Validation Trait  ========================================================================================

type RuleResult<T> = std::result::Result<T, CutRuleErrorKind>;

trait ValidateInto<'c, T> {
    type Context: 'c;

    fn validate(self, ctx: Self::Context) -> RuleResult<T>;
}

// Cut Rule Validation =================================================================================================

impl ValidateInto<'_, CutRules> for CutRulesKdl {
    type Context = ();

    fn validate(self, _ctx: Self::Context) -> RuleResult<CutRules> {
        let mut seen: HashMap<String, Span> = HashMap::new();
        let mut rules = Vec::with_capacity(self.rules.len());
        for rule in self.rules {
            match seen.entry(rule.name.clone()) {
                Entry::Occupied(first) => {
                    return Err(CutRuleErrorKind::DuplicateRule(*first.get(), rule.span, rule.name));
                }
                Entry::Vacant(entry) => {
                    entry.insert(rule.span);
                }
            }
            rules.push(rule.validate(())?);
        }
        Ok(CutRules { rules })
    }
}

// ---------------------------------------------------------------------------------------------------------------------

impl ValidateInto<'_, CutRule> for CutRuleKdl {
    type Context = ();

    fn validate(self, _ctx: Self::Context) -> RuleResult<CutRule> {
        BondPattern::new(&self.pattern).map_err(|e| CutRuleErrorKind::InvalidPattern(*self.pattern.span(), e))?;
        Ok(CutRule {
            name: self.name,
            description: self.description,
            pattern: self.pattern.as_str().to_owned(),
        })
    }
}

// Validation Error Types and Trait Implementations  ===================================================================

#[derive(Debug, Error)]
#[error("failed to validate cut rule file")]
struct CutRuleError {
    kdl: NamedSource<String>,
    #[source]
    kind: CutRuleErrorKind,
}

// NOTE: This is manually implemented because the list of labels is dynamic and needs to be extracted from `self.kind`
impl Diagnostic for CutRuleError {
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
enum CutRuleErrorKind {
    #[error("the cut rule {2:?} has already been defined")]
    #[diagnostic(help("rename one of the rules, or remove the duplicate"))]
    DuplicateRule(Span, Span, String),

    #[error("cut rule file contained an invalid bond pattern")]
    InvalidPattern(
        Span,
        #[source]
        #[diagnostic_source]
        ToolkitError,
    ),
}

impl CutRuleErrorKind {
    fn labels(&self) -> Vec<(&Span, &'static str)> {
        match self {
            Self::DuplicateRule(s1, s2, _) => vec![(s1, "first defined here"), (s2, "then again here")],
            Self::InvalidPattern(s, _) => vec![(s, "invalid bond pattern")],
        }
    }

    fn finalize(self, file_name: impl AsRef<str>, kdl: impl AsRef<str>) -> CutRuleError {
        let kdl = NamedSource::new(file_name, kdl.as_ref().to_owned());
        CutRuleError { kdl, kind: self }
    }
}

// Module Tests ========================================================================================================
