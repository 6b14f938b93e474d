//! Argument extraction: matching a call site against a declared signature.
//!
//! Extraction is purely static. It succeeds only when every argument the
//! selected constructor needs is present, every supplied argument is
//! consumed, and each argument meets its parameter's constraint according
//! to the oracle. Failure is local and non-fatal: the call stays generic.

use std::fmt;

use crate::expr::{CallSite, Expr};
use crate::oracle::ShapeOracle;
use crate::shape::Shape;
use crate::table::{ArgConstraint, EmptyCase, OperationSpec};

/// Successful extraction.
#[derive(Clone, Debug, PartialEq)]
pub enum Extracted {
    /// Arguments in constructor order.
    Args(Vec<Expr>),
    /// The call supplied no arguments and the entry has a special result.
    Empty(EmptyCase),
}

/// Why a call site does not fit a signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// The entry declares no constructor for the target.
    NoOperation,
    TooManyPositional { accepted: usize, found: usize },
    KeywordsNotAccepted,
    UnexpectedKeyword(String),
    DuplicateArgument(&'static str),
    MissingArgument(&'static str),
    /// Supplied, but the selected constructor has no slot for it.
    ArgumentNotTaken(&'static str),
    ConstraintFailed { param: &'static str, shape: Shape },
    /// Keyword order differs from parameter order and an argument may have
    /// side effects, so reordering would change evaluation order.
    ReorderedSideEffects,
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOperation => write!(f, "no specialized constructor"),
            Self::TooManyPositional { accepted, found } => {
                write!(f, "takes at most {accepted} positional arguments, {found} given")
            }
            Self::KeywordsNotAccepted => write!(f, "takes no keyword arguments"),
            Self::UnexpectedKeyword(name) => write!(f, "unexpected keyword argument '{name}'"),
            Self::DuplicateArgument(name) => write!(f, "argument '{name}' given twice"),
            Self::MissingArgument(name) => write!(f, "missing argument '{name}'"),
            Self::ArgumentNotTaken(name) => {
                write!(f, "argument '{name}' not taken by the selected variation")
            }
            Self::ConstraintFailed { param, shape } => {
                write!(f, "argument '{param}' not proven to be {shape}")
            }
            Self::ReorderedSideEffects => {
                write!(f, "keyword reordering would change evaluation order")
            }
        }
    }
}

impl std::error::Error for ExtractionFailure {}

/// Match `site`'s arguments against `spec`'s declared parameters, keeping
/// those at the indices in `mapping`, in that order.
///
/// `mapping` must come from a constructor of `spec`; table construction
/// rejects indices outside the declared parameters.
pub(crate) fn extract_call_args(
    site: &CallSite,
    spec: &OperationSpec,
    mapping: &[usize],
    oracle: &dyn ShapeOracle,
) -> Result<Extracted, ExtractionFailure> {
    if site.arg_count() == 0 {
        if let Some(case) = spec.empty_case {
            return Ok(Extracted::Empty(case));
        }
    }

    if site.args.len() > spec.params.len() {
        return Err(ExtractionFailure::TooManyPositional {
            accepted: spec.params.len(),
            found: site.args.len(),
        });
    }

    let mut slots: Vec<Option<&Expr>> = vec![None; spec.params.len()];
    let mut order: Vec<usize> = Vec::with_capacity(site.arg_count());
    for (index, arg) in site.args.iter().enumerate() {
        slots[index] = Some(arg);
        order.push(index);
    }

    if !site.kwargs.is_empty() && !spec.keywords {
        return Err(ExtractionFailure::KeywordsNotAccepted);
    }
    for (name, value) in &site.kwargs {
        let index = spec
            .params
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| ExtractionFailure::UnexpectedKeyword(name.clone()))?;
        if slots[index].is_some() {
            return Err(ExtractionFailure::DuplicateArgument(spec.params[index].name));
        }
        slots[index] = Some(value);
        order.push(index);
    }

    let reordered = order.windows(2).any(|w| w[0] > w[1]);
    if reordered && !slots.iter().flatten().all(|arg| arg.is_side_effect_free()) {
        return Err(ExtractionFailure::ReorderedSideEffects);
    }

    for (index, slot) in slots.iter().enumerate() {
        if slot.is_some() && !mapping.contains(&index) {
            return Err(ExtractionFailure::ArgumentNotTaken(spec.params[index].name));
        }
    }

    let mut extracted = Vec::with_capacity(mapping.len());
    for &index in mapping {
        let param = &spec.params[index];
        let arg = slots[index].ok_or(ExtractionFailure::MissingArgument(param.name))?;
        if let ArgConstraint::ExactShape(shape) = param.constraint {
            if !oracle.proven_shape(arg, shape) {
                return Err(ExtractionFailure::ConstraintFailed {
                    param: param.name,
                    shape,
                });
            }
        }
        extracted.push(arg.clone());
    }
    Ok(Extracted::Args(extracted))
}
