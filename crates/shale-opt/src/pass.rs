//! Pass driver: a post-order walk that computes every node once per pass,
//! repeated until a pass changes nothing.
//!
//! Children are computed before their parent, so a rewrite is visible to
//! the enclosing nodes of the same pass. `let` bindings keep the shape
//! knowledge of their value and, when the value is a specialized lookup,
//! the bound method, so calls through the variable can still be rewritten.

use log::info;
use rustc_hash::FxHashMap;
use shale_common::Miss;

use crate::attribute::{
    compute_attribute_lookup, compute_call_via_variable, compute_specialized_call,
};
use crate::config::OptimizerConfig;
use crate::expr::{CallSite, Expr, ExprKind, RewriteResult};
use crate::oracle::ShapeOracle;
use crate::shape::{Shape, ShapeKnowledge, TargetGeneration};
use crate::table::SpecializationTable;
use crate::trace::{ExceptionKind, RewriteRecord, TraceCollection};

/// Read-only inputs shared by every node computed in a pass.
#[derive(Clone, Copy)]
pub struct PassEnv<'t> {
    pub table: &'t SpecializationTable,
    pub oracle: &'t dyn ShapeOracle,
    pub target: TargetGeneration,
}

#[derive(Clone, Debug)]
struct Binding {
    knowledge: ShapeKnowledge,
    /// Attribute and shape of a specialized lookup bound to the name.
    method: Option<(String, Shape)>,
}

enum CallTarget {
    Specialized,
    Bound { attribute: String, shape: Shape },
    Generic,
}

struct Walker<'a, 't> {
    env: &'a PassEnv<'t>,
    trace: &'a mut TraceCollection,
    scopes: Vec<FxHashMap<String, Binding>>,
}

impl<'a, 't> Walker<'a, 't> {
    fn new(env: &'a PassEnv<'t>, trace: &'a mut TraceCollection) -> Self {
        Walker {
            env,
            trace,
            scopes: Vec::new(),
        }
    }

    fn binding(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn compute_all(&mut self, exprs: Vec<Expr>) -> Vec<Expr> {
        exprs.into_iter().map(|e| self.compute(e)).collect()
    }

    fn compute_boxed(&mut self, expr: Box<Expr>) -> Box<Expr> {
        Box::new(self.compute(*expr))
    }

    fn compute(&mut self, expr: Expr) -> Expr {
        let Expr { kind, span } = expr;
        let kind = match kind {
            ExprKind::Constant(_) | ExprKind::Opaque { .. } => kind,
            ExprKind::Variable { name, shape } => {
                let shape = self.binding(&name).map_or(shape, |b| b.knowledge);
                ExprKind::Variable { name, shape }
            }
            ExprKind::Let { name, value, body } => {
                let value = self.compute_boxed(value);
                let method = match &value.kind {
                    ExprKind::AttributeLookupSpecialized {
                        attribute, shape, ..
                    } => Some((attribute.clone(), *shape)),
                    _ => None,
                };
                let binding = Binding {
                    knowledge: value.shape_knowledge(),
                    method,
                };
                let mut scope = FxHashMap::default();
                scope.insert(name.clone(), binding);
                self.scopes.push(scope);
                let body = self.compute_boxed(body);
                self.scopes.pop();
                ExprKind::Let { name, value, body }
            }
            ExprKind::AttributeLookup { source, attribute } => {
                let source = self.compute_boxed(source);
                return compute_attribute_lookup(source, attribute, span, self.env, self.trace).expr;
            }
            ExprKind::AttributeLookupSpecialized {
                source,
                attribute,
                shape,
            } => ExprKind::AttributeLookupSpecialized {
                source: self.compute_boxed(source),
                attribute,
                shape,
            },
            ExprKind::Call {
                callee,
                args,
                kwargs,
            } => {
                let site = CallSite {
                    callee: self.compute_boxed(callee),
                    args: self.compute_all(args),
                    kwargs: kwargs
                        .into_iter()
                        .map(|(name, value)| (name, self.compute(value)))
                        .collect(),
                    span,
                };
                return self.compute_call(site);
            }
            ExprKind::Operation {
                op,
                source,
                args,
                shape,
            } => ExprKind::Operation {
                op,
                source: self.compute_boxed(source),
                args: self.compute_all(args),
                shape,
            },
            ExprKind::SideEffects { effects, value } => ExprKind::SideEffects {
                effects: self.compute_all(effects),
                value: self.compute_boxed(value),
            },
            ExprKind::Sequence(items) => ExprKind::Sequence(self.compute_all(items)),
        };
        Expr { kind, span }
    }

    fn compute_call(&mut self, site: CallSite) -> Expr {
        let target = match &site.callee.kind {
            ExprKind::AttributeLookupSpecialized { .. } => CallTarget::Specialized,
            ExprKind::Variable { name, .. } => {
                match self.binding(name).and_then(|b| b.method.clone()) {
                    Some((attribute, shape)) => CallTarget::Bound { attribute, shape },
                    None => CallTarget::Generic,
                }
            }
            _ => CallTarget::Generic,
        };

        let result = match target {
            CallTarget::Specialized => compute_specialized_call(site, self.env, self.trace),
            CallTarget::Bound { attribute, shape } => {
                compute_call_via_variable(site, &attribute, shape, self.env, self.trace)
            }
            CallTarget::Generic => RewriteResult::unchanged(site.into_expr()),
        };
        if !result.is_changed() {
            self.trace.on_exception_raise_exit(ExceptionKind::Any);
        }
        result.expr
    }
}

/// Compute every node of `tree` once, recording into `trace`.
pub fn run_pass(tree: Expr, env: &PassEnv<'_>, trace: &mut TraceCollection) -> Expr {
    Walker::new(env, trace).compute(tree)
}

/// What a full optimization run did.
#[derive(Clone, Debug, Default)]
pub struct OptimizationReport {
    pub passes: usize,
    pub reached_fixpoint: bool,
    /// Rewrites of every pass, in order.
    pub rewrites: Vec<RewriteRecord>,
    /// Misses of the last pass only; earlier misses may have been resolved.
    pub misses: Vec<Miss>,
}

impl OptimizationReport {
    /// Plain-text rendering, one line per rewrite and miss.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "passes: {}{}",
            self.passes,
            if self.reached_fixpoint { " (fixpoint)" } else { "" }
        )];
        for rewrite in &self.rewrites {
            lines.push(format!(
                "{} {}..{}: {}",
                rewrite.tag, rewrite.span.start, rewrite.span.end, rewrite.description
            ));
        }
        for miss in &self.misses {
            lines.push(format!(
                "{} {}..{}: {}",
                miss.kind.code(),
                miss.span.start,
                miss.span.end,
                miss
            ));
        }
        lines.join("\n")
    }
}

/// Run passes over `tree` until one records no rewrite or the configured
/// pass limit is reached.
pub fn optimize(
    mut tree: Expr,
    table: &SpecializationTable,
    oracle: &dyn ShapeOracle,
    config: &OptimizerConfig,
) -> (Expr, OptimizationReport) {
    let env = PassEnv {
        table,
        oracle,
        target: config.target,
    };
    let mut report = OptimizationReport::default();
    while report.passes < config.max_passes {
        let mut trace = TraceCollection::with_misses(config.collect_remarks);
        tree = run_pass(tree, &env, &mut trace);
        report.passes += 1;

        let (rewrites, misses) = trace.into_parts();
        info!(
            "pass {} ({}): {} rewrites, {} misses",
            report.passes,
            config.target,
            rewrites.len(),
            misses.len()
        );
        let settled = rewrites.is_empty();
        report.rewrites.extend(rewrites);
        report.misses = misses;
        if settled {
            report.reached_fixpoint = true;
            break;
        }
    }
    (tree, report)
}
