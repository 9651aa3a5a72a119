//! Glue for turning `nom` parse failures into labelled `miette` diagnostics

// Standard Library Imports
use std::{fmt, iter};

// External Crate Imports
use miette::{Diagnostic, LabeledSpan, SourceSpan};
use nom::{
    Err, Finish, IResult, Parser,
    combinator::{all_consuming, complete},
    error::{ErrorKind, ParseError},
};
use thiserror::Error;

// Public API ==========================================================================================================

pub trait LabeledErrorKind: Diagnostic + Clone + Eq + From<ErrorKind> {
    fn label(&self) -> Option<&'static str> {
        None
    }
}

pub trait FromExternalError<'a, E>: LabeledErrorKind {
    // NOTE: Fatal errors are returned as `nom::Err::Failure`, which stops `alt` from trying other branches
    const FATAL: bool = false;

    fn from_external_error(input: &'a str, error: E) -> LabeledParseError<'a, Self>;
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("{tree}")]
pub struct LabeledError<E: LabeledErrorKind> {
    source_code: String,
    labels: Vec<LabeledSpan>,
    tree: ErrorTree<E>,
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum ErrorTree<E: LabeledErrorKind> {
    #[error("{kind}")]
    Node {
        kind: E,
        #[source]
        cause: Option<Box<LabeledError<E>>>,
    },
    #[error("none of the {} alternatives could be parsed", .0.len())]
    Branch(Vec<LabeledError<E>>),
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct LabeledParseError<'a, E> {
    input: &'a str,
    length: usize,
    kind: E,
    source: Option<Box<Self>>,
    alternatives: Vec<Self>,
}

impl<E: LabeledErrorKind> LabeledError<E> {
    #[must_use]
    pub const fn tree(&self) -> &ErrorTree<E> {
        &self.tree
    }

    /// The kind of the outermost error, or `None` if parsing failed on several alternatives
    #[must_use]
    pub const fn kind(&self) -> Option<&E> {
        match &self.tree {
            ErrorTree::Node { kind, .. } => Some(kind),
            ErrorTree::Branch(_) => None,
        }
    }

    /// The kind of the innermost error in the chain of causes
    #[must_use]
    pub fn root_kind(&self) -> Option<&E> {
        match &self.tree {
            ErrorTree::Node {
                cause: Some(cause), ..
            } => cause.root_kind(),
            ErrorTree::Node { kind, cause: None } => Some(kind),
            ErrorTree::Branch(_) => None,
        }
    }
}

impl<'a, E: LabeledErrorKind> LabeledParseError<'a, E> {
    pub const fn new(input: &'a str, kind: E) -> Self {
        Self {
            input,
            length: 0,
            kind,
            source: None,
            alternatives: Vec::new(),
        }
    }

    pub fn new_with_source(input: &'a str, kind: E, source: Option<Self>) -> Self {
        Self {
            source: source.map(Box::new),
            ..Self::new(input, kind)
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &E {
        &self.kind
    }
}

pub fn final_parser<'a, O, P, E>(parser: P) -> impl FnMut(&'a str) -> Result<O, LabeledError<E>>
where
    E: LabeledErrorKind,
    P: Parser<&'a str, O, LabeledParseError<'a, E>>,
{
    let mut parser = all_consuming(complete(parser));
    move |input| {
        parser
            .parse(input)
            .finish()
            .map(|(_, output)| output)
            .map_err(|error| {
                let mut error = error.finalize(input);
                error.bubble_labels();
                error
            })
    }
}

pub fn map_res<'a, O1, O2, E1, E2, F, G>(
    mut parser: F,
    mut f: G,
) -> impl FnMut(&'a str) -> IResult<&'a str, O2, LabeledParseError<'a, E1>>
where
    E1: FromExternalError<'a, E2>,
    F: Parser<&'a str, O1, LabeledParseError<'a, E1>>,
    G: FnMut(O1) -> Result<O2, E2>,
{
    move |input| {
        let (rest, output) = parser.parse(input)?;
        f(output).map(|o| (rest, o)).map_err(|e| {
            let error = LabeledParseError {
                length: input.len() - rest.len(),
                ..E1::from_external_error(input, e)
            };
            if E1::FATAL {
                Err::Failure(error)
            } else {
                Err::Error(error)
            }
        })
    }
}

/// Wraps any error from `parser` in a new error of `kind`, keeping the original as its cause
pub fn wrap_err<'a, O, P, E>(
    mut parser: P,
    kind: E,
) -> impl FnMut(&'a str) -> IResult<&'a str, O, LabeledParseError<'a, E>>
where
    E: LabeledErrorKind,
    P: Parser<&'a str, O, LabeledParseError<'a, E>>,
{
    move |input| {
        parser.parse(input).map_err(|e| {
            e.map(|cause| LabeledParseError::new_with_source(input, kind.clone(), Some(cause)))
        })
    }
}

/// Replaces a recoverable error from `parser` with a new error of `kind`, discarding the original. Failures are
/// passed through untouched, since they already describe what went wrong after the parser committed
pub fn expect<'a, O, P, E>(
    mut parser: P,
    kind: E,
) -> impl FnMut(&'a str) -> IResult<&'a str, O, LabeledParseError<'a, E>>
where
    E: LabeledErrorKind,
    P: Parser<&'a str, O, LabeledParseError<'a, E>>,
{
    move |input| {
        parser.parse(input).map_err(|e| match e {
            Err::Error(_) => Err::Error(LabeledParseError::new(input, kind.clone())),
            e => e,
        })
    }
}

// Trait Implementations ===============================================================================================

impl<E: LabeledErrorKind> Diagnostic for LabeledError<E> {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.kind().and_then(Diagnostic::help)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(self.labels.iter().cloned()))
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn Diagnostic> + 'a>> {
        if let ErrorTree::Branch(branches) = &self.tree {
            Some(Box::new(branches.iter().map(|e| e as &dyn Diagnostic)))
        } else {
            None
        }
    }

    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        if let ErrorTree::Node {
            cause: Some(cause), ..
        } = &self.tree
        {
            Some(&**cause)
        } else {
            None
        }
    }
}

impl<'a, E: LabeledErrorKind> ParseError<&'a str> for LabeledParseError<'a, E> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self::new(input, kind.into())
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    fn or(mut self, other: Self) -> Self {
        self.alternatives.push(other);
        self
    }
}

// Private Methods =====================================================================================================

impl<E: LabeledErrorKind> LabeledParseError<'_, E> {
    fn finalize(self, full_input: &str) -> LabeledError<E> {
        let Self {
            input,
            length,
            kind,
            source,
            alternatives,
        } = self;
        // NOTE: The trailing space lets labels point one character past the end of the input
        let source_code = format!("{full_input} ");

        if alternatives.is_empty() {
            // NOTE: `nom` only ever hands back suffixes of the original input, so the offset falls out of the lengths
            let start = full_input.len().saturating_sub(input.len());
            let span = SourceSpan::from(start..start + length);
            let labels = kind
                .label()
                .map(|label| LabeledSpan::new_with_span(Some(label.to_owned()), span))
                .into_iter()
                .collect();
            let cause = source.map(|e| Box::new(e.finalize(full_input)));
            LabeledError {
                source_code,
                labels,
                tree: ErrorTree::Node { kind, cause },
            }
        } else {
            let first = Self {
                input,
                length,
                kind,
                source,
                alternatives: Vec::new(),
            };
            let branches = iter::once(first)
                .chain(alternatives)
                .map(|e| e.finalize(full_input))
                .collect();
            LabeledError {
                source_code,
                labels: Vec::new(),
                tree: ErrorTree::Branch(branches),
            }
        }
    }
}

impl<E: LabeledErrorKind> LabeledError<E> {
    // NOTE: Labels from children that share a span are merged into a single "a or b" label
    fn bubble_labels(&mut self) {
        if !self.labels.is_empty() {
            return;
        }

        let children: Vec<&mut Self> = match &mut self.tree {
            ErrorTree::Node {
                cause: Some(cause), ..
            } => vec![&mut **cause],
            ErrorTree::Node { cause: None, .. } => Vec::new(),
            ErrorTree::Branch(branches) => branches.iter_mut().collect(),
        };

        let mut merged: Vec<(SourceSpan, Vec<String>)> = Vec::new();
        for child in children {
            child.bubble_labels();
            for labeled_span in child.labels.drain(..) {
                let label = labeled_span.label().unwrap_or_default().to_owned();
                let span = *labeled_span.inner();
                match merged.iter_mut().find(|(s, _)| *s == span) {
                    Some((_, labels)) => labels.push(label),
                    None => merged.push((span, vec![label])),
                }
            }
        }

        self.labels = merged
            .into_iter()
            .map(|(span, labels)| LabeledSpan::new_with_span(Some(labels.join(" or ")), span))
            .collect();
    }
}

// Module Tests ========================================================================================================
