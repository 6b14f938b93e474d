//! Call rewrite resolver.
//!
//! Given a call whose callee is a shape-specialized attribute and the table
//! entry for that (attribute, shape), pick the constructor, extract the
//! arguments, and replace the whole call with one operation node. Any
//! mismatch leaves the call exactly as it was.

use std::borrow::Cow;

use shale_common::{Miss, MissKind};

use crate::args::{extract_call_args, Extracted, ExtractionFailure};
use crate::expr::{CallSite, Expr, RewriteResult};
use crate::pass::PassEnv;
use crate::shape::TargetGeneration;
use crate::table::{Constructors, EmptyCase, OperationSpec, VariationTest};
use crate::trace::{ChangeTag, ExceptionKind, TraceCollection};

/// Does the call supply the declared parameter at `index`?
fn supplies(site: &CallSite, spec: &OperationSpec, index: usize) -> bool {
    site.args.len() > index
        || site
            .kwargs
            .iter()
            .any(|(name, _)| spec.params.get(index).is_some_and(|p| name == p.name))
}

/// Pick the constructor name and its parameter mapping for this call.
///
/// Version splits are decided by the target alone. Variations are tried in
/// table order (most specific first); the first satisfied test wins and the
/// base variation is the default.
pub(crate) fn select_constructor<'s>(
    spec: &'s OperationSpec,
    site: &CallSite,
    target: TargetGeneration,
) -> Option<(&'static str, Cow<'s, [usize]>)> {
    match spec.constructors.as_ref()? {
        Constructors::Single(op) => Some((*op, Cow::Owned(spec.all_params()))),
        Constructors::VersionSplit { legacy, modern } => {
            let op = match target {
                TargetGeneration::Legacy => *legacy,
                TargetGeneration::Modern => *modern,
            };
            Some((op, Cow::Owned(spec.all_params())))
        }
        Constructors::Variations(variations) => {
            let chosen = variations
                .iter()
                .find(|v| match v.test {
                    VariationTest::Supplied(index) => supplies(site, spec, index),
                    VariationTest::Base => false,
                })
                .or_else(|| variations.iter().find(|v| v.test == VariationTest::Base))?;
            Some((chosen.op, Cow::Borrowed(chosen.args.as_slice())))
        }
    }
}

/// Rewrite `site` into a specialized operation on `owning_source`, or hand
/// the call back untouched.
///
/// `owning_source` is the value the operation acts on: the specialized
/// lookup's source for direct calls, or the bound-self slot of a variable
/// for calls through a binding.
pub(crate) fn resolve_call(
    spec: &OperationSpec,
    site: CallSite,
    owning_source: Expr,
    env: &PassEnv<'_>,
    trace: &mut TraceCollection,
) -> RewriteResult {
    // Extraction may reject the call partway; the context must already
    // reflect the worst case.
    trace.on_exception_raise_exit(ExceptionKind::Any);

    let extracted = select_constructor(spec, &site, env.target)
        .ok_or(ExtractionFailure::NoOperation)
        .and_then(|(op, mapping)| {
            extract_call_args(&site, spec, &mapping, env.oracle).map(|e| (op, e))
        });

    let (op, extracted) = match extracted {
        Ok(found) => found,
        Err(failure) => {
            trace.record_miss(Miss::new(
                MissKind::UnmatchedCallShape {
                    reason: failure.to_string(),
                },
                spec.attribute,
                site.span,
            ));
            return RewriteResult::unchanged(site.into_expr());
        }
    };

    match extracted {
        Extracted::Args(args) => {
            let node = Expr::operation(
                spec.operation_id(op),
                owning_source,
                args,
                spec.returns,
                site.span,
            );
            trace.computed_expression_result(
                node,
                ChangeTag::NewExpression,
                format!("Call to '{}' of {} recognized.", spec.attribute, spec.shape),
            )
        }
        Extracted::Empty(EmptyCase::NoneWithSourceEffects) => {
            let node = Expr::side_effects(vec![owning_source], Expr::none(), site.span);
            trace.computed_expression_result(
                node,
                ChangeTag::NewConstant,
                format!(
                    "Call to '{}' of {} without arguments has no effect.",
                    spec.attribute, spec.shape
                ),
            )
        }
    }
}
