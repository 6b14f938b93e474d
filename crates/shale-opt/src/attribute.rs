//! Attribute lookup nodes: the generic dispatcher and its shape-specialized
//! replacement.
//!
//! A generic lookup narrows to `AttributeLookupSpecialized` on the first
//! shape, in priority order, that both has a table entry admitted for the
//! target and is proven exact by the oracle. Otherwise the source's own
//! attribute handling decides. A specialized lookup is final: evaluated on
//! its own it stays as it is, and its only further rewrite is absorbing the
//! call it is the callee of.

use shale_common::{Miss, MissKind, Span};

use crate::call::resolve_call;
use crate::expr::{CallSite, Expr, ExprKind, RewriteResult};
use crate::pass::PassEnv;
use crate::shape::Shape;
use crate::table::OperationSpec;
use crate::trace::{ChangeTag, ExceptionKind, TraceCollection};

/// Compute a generic `source.attribute` whose source is already computed.
pub fn compute_attribute_lookup(
    source: Box<Expr>,
    attribute: String,
    span: Span,
    env: &PassEnv<'_>,
    trace: &mut TraceCollection,
) -> RewriteResult {
    let matched = env
        .table
        .shapes_for(&attribute)
        .find(|spec| {
            spec.applicable.admits(env.target) && env.oracle.proven_shape(&source, spec.shape)
        })
        .map(|spec| spec.shape);

    if let Some(shape) = matched {
        let description = format!("Attribute lookup '{attribute}' of {shape} specialized.");
        let node = Expr::new(
            ExprKind::AttributeLookupSpecialized {
                source,
                attribute,
                shape,
            },
            span,
        );
        return trace.computed_expression_result(node, ChangeTag::NewExpression, description);
    }

    if env.table.knows_attribute(&attribute) {
        trace.record_miss(Miss::new(MissKind::UnresolvedShape, attribute.as_str(), span));
    }
    let lookup = Expr::new(ExprKind::AttributeLookup { source, attribute }, span);
    compute_expression_attribute(lookup, env, trace)
}

/// The source's own, shape-agnostic handling of an attribute lookup.
///
/// Nothing is folded here; the lookup is kept and, unless the source is
/// known to have the attribute, an attribute error exit is recorded.
pub fn compute_expression_attribute(
    lookup: Expr,
    env: &PassEnv<'_>,
    trace: &mut TraceCollection,
) -> RewriteResult {
    if let ExprKind::AttributeLookup { source, attribute } = &lookup.kind {
        let kind = ExceptionKind::AttributeError;
        if source.may_raise_exception_attribute_lookup(env, kind, attribute) {
            trace.on_exception_raise_exit(kind);
        }
    }
    RewriteResult::unchanged(lookup)
}

/// Table entry for a specialized lookup, if it can intercept calls.
fn intercepting_spec<'t>(
    env: &PassEnv<'t>,
    attribute: &str,
    shape: Shape,
) -> Option<&'t OperationSpec> {
    env.table
        .lookup(attribute, shape)
        .filter(|spec| spec.has_operation(env.target))
}

/// A call whose callee is a specialized lookup: `source.attribute(...)`.
pub fn compute_specialized_call(
    site: CallSite,
    env: &PassEnv<'_>,
    trace: &mut TraceCollection,
) -> RewriteResult {
    let ExprKind::AttributeLookupSpecialized {
        source,
        attribute,
        shape,
    } = &site.callee.kind
    else {
        return RewriteResult::unchanged(site.into_expr());
    };

    let Some(spec) = intercepting_spec(env, attribute, *shape) else {
        trace.record_miss(Miss::new(MissKind::VersionUnavailable, attribute.as_str(), site.span));
        return RewriteResult::unchanged(site.into_expr());
    };
    let owning_source = source.as_ref().clone();
    resolve_call(spec, site, owning_source, env, trace)
}

/// A call through a variable bound to a specialized lookup:
/// `let m = source.attribute in m(...)`.
///
/// The operation acts on the bound method's `__self__`, read through the
/// variable, so the original source is not evaluated again.
pub fn compute_call_via_variable(
    site: CallSite,
    attribute: &str,
    shape: Shape,
    env: &PassEnv<'_>,
    trace: &mut TraceCollection,
) -> RewriteResult {
    let Some(spec) = intercepting_spec(env, attribute, shape) else {
        trace.record_miss(Miss::new(MissKind::VersionUnavailable, attribute, site.span));
        return RewriteResult::unchanged(site.into_expr());
    };
    let variable_ref = site.callee.as_ref().clone();
    let span = variable_ref.span;
    let owning_source = Expr::attribute(variable_ref, "__self__").with_span(span);
    resolve_call(spec, site, owning_source, env, trace)
}
