//! The rewrite tree the pass operates on.
//!
//! Every node exclusively owns its children and carries the span of the
//! source it was built from. Nodes are replaced wholesale: a rewrite hands
//! back a new `Expr` for the parent to store in place of the old one.

use std::fmt;

use shale_common::Span;

use crate::pass::PassEnv;
use crate::shape::{Shape, ShapeKnowledge};
use crate::table::OperationId;
use crate::trace::{ChangeTag, ExceptionKind};

/// A compile-time constant value.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    Dict(Vec<(Constant, Constant)>),
}

impl Constant {
    pub fn shape(&self) -> Option<Shape> {
        match self {
            Constant::Str(_) => Some(Shape::Str),
            Constant::Bytes(_) => Some(Shape::Bytes),
            Constant::Dict(_) => Some(Shape::Dict),
            Constant::None | Constant::Bool(_) | Constant::Int(_) => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::None => write!(f, "None"),
            Constant::Bool(true) => write!(f, "True"),
            Constant::Bool(false) => write!(f, "False"),
            Constant::Int(n) => write!(f, "{n}"),
            Constant::Str(s) => write!(f, "{s:?}"),
            Constant::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            Constant::Dict(items) => {
                write!(f, "{{")?;
                for (i, (k, v)) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// A node in the rewrite tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Constant(Constant),
    /// A value computed elsewhere, known only through its shape knowledge.
    Opaque { name: String, shape: ShapeKnowledge },
    /// A variable reference; the pass refreshes `shape` from the binding.
    Variable { name: String, shape: ShapeKnowledge },
    /// `let name = value in body`. Bindings are immutable.
    Let {
        name: String,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    /// `source.attribute` with nothing proven about `source`.
    AttributeLookup {
        source: Box<Expr>,
        attribute: String,
    },
    /// `source.attribute` where `source` is proven to be exactly `shape`.
    AttributeLookupSpecialized {
        source: Box<Expr>,
        attribute: String,
        shape: Shape,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    /// A specialized operation replacing `source.attribute(args...)`.
    Operation {
        op: OperationId,
        source: Box<Expr>,
        args: Vec<Expr>,
        shape: ShapeKnowledge,
    },
    /// Evaluate `effects` in order, then yield `value`.
    SideEffects { effects: Vec<Expr>, value: Box<Expr> },
    Sequence(Vec<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn constant(value: Constant) -> Self {
        Expr::new(ExprKind::Constant(value), Span::synthetic())
    }

    pub fn none() -> Self {
        Expr::constant(Constant::None)
    }

    pub fn int(value: i64) -> Self {
        Expr::constant(Constant::Int(value))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expr::constant(Constant::Str(value.into()))
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Expr::constant(Constant::Bytes(value.into()))
    }

    pub fn dict(items: Vec<(Constant, Constant)>) -> Self {
        Expr::constant(Constant::Dict(items))
    }

    pub fn opaque(name: impl Into<String>, shape: ShapeKnowledge) -> Self {
        Expr::new(
            ExprKind::Opaque {
                name: name.into(),
                shape,
            },
            Span::synthetic(),
        )
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::new(
            ExprKind::Variable {
                name: name.into(),
                shape: ShapeKnowledge::Unknown,
            },
            Span::synthetic(),
        )
    }

    pub fn let_in(name: impl Into<String>, value: Expr, body: Expr) -> Self {
        Expr::new(
            ExprKind::Let {
                name: name.into(),
                value: Box::new(value),
                body: Box::new(body),
            },
            Span::synthetic(),
        )
    }

    pub fn attribute(source: Expr, attribute: impl Into<String>) -> Self {
        Expr::new(
            ExprKind::AttributeLookup {
                source: Box::new(source),
                attribute: attribute.into(),
            },
            Span::synthetic(),
        )
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::call_kw(callee, args, Vec::new())
    }

    pub fn call_kw(callee: Expr, args: Vec<Expr>, kwargs: Vec<(&str, Expr)>) -> Self {
        Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
                kwargs: kwargs
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect(),
            },
            Span::synthetic(),
        )
    }

    /// `source.attribute(args...)` in one step.
    pub fn method_call(source: Expr, attribute: &str, args: Vec<Expr>) -> Self {
        Expr::call(Expr::attribute(source, attribute), args)
    }

    /// Build a specialized operation node.
    pub fn operation(
        op: OperationId,
        source: Expr,
        args: Vec<Expr>,
        returns: Option<Shape>,
        span: Span,
    ) -> Self {
        Expr::new(
            ExprKind::Operation {
                op,
                source: Box::new(source),
                args,
                shape: returns.map_or(ShapeKnowledge::Unknown, ShapeKnowledge::Exact),
            },
            span,
        )
    }

    pub fn side_effects(effects: Vec<Expr>, value: Expr, span: Span) -> Self {
        Expr::new(
            ExprKind::SideEffects {
                effects,
                value: Box::new(value),
            },
            span,
        )
    }

    pub fn sequence(items: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Sequence(items), Span::synthetic())
    }

    /// What this node's value is known to be.
    pub fn shape_knowledge(&self) -> ShapeKnowledge {
        match &self.kind {
            ExprKind::Constant(c) => c
                .shape()
                .map_or(ShapeKnowledge::Unknown, ShapeKnowledge::Exact),
            ExprKind::Opaque { shape, .. }
            | ExprKind::Variable { shape, .. }
            | ExprKind::Operation { shape, .. } => *shape,
            ExprKind::Let { body, .. } => body.shape_knowledge(),
            ExprKind::SideEffects { value, .. } => value.shape_knowledge(),
            ExprKind::Sequence(items) => items
                .last()
                .map_or(ShapeKnowledge::Unknown, Expr::shape_knowledge),
            ExprKind::AttributeLookup { .. }
            | ExprKind::AttributeLookupSpecialized { .. }
            | ExprKind::Call { .. } => ShapeKnowledge::Unknown,
        }
    }

    /// Structural check used before reordering argument evaluation.
    pub fn is_side_effect_free(&self) -> bool {
        match &self.kind {
            ExprKind::Constant(_) | ExprKind::Opaque { .. } | ExprKind::Variable { .. } => true,
            ExprKind::AttributeLookupSpecialized { source, .. } => source.is_side_effect_free(),
            _ => false,
        }
    }

    /// Can evaluating this node raise an exception of `kind`?
    pub fn may_raise_exception(&self, env: &PassEnv<'_>, kind: ExceptionKind) -> bool {
        match &self.kind {
            ExprKind::Constant(_) | ExprKind::Opaque { .. } | ExprKind::Variable { .. } => false,
            ExprKind::Let { value, body, .. } => {
                value.may_raise_exception(env, kind) || body.may_raise_exception(env, kind)
            }
            ExprKind::AttributeLookup { source, attribute } => {
                source.may_raise_exception(env, kind)
                    || source.may_raise_exception_attribute_lookup(env, kind, attribute)
            }
            ExprKind::AttributeLookupSpecialized { source, .. } => {
                source.may_raise_exception(env, kind)
            }
            ExprKind::Call { .. } | ExprKind::Operation { .. } => true,
            ExprKind::SideEffects { effects, value } => {
                effects.iter().any(|e| e.may_raise_exception(env, kind))
                    || value.may_raise_exception(env, kind)
            }
            ExprKind::Sequence(items) => items.iter().any(|e| e.may_raise_exception(env, kind)),
        }
    }

    /// Can looking up `attribute` on this node's value raise `kind`?
    ///
    /// Only a value of exact shape with a table entry admitted for the
    /// target is known to have the attribute.
    pub fn may_raise_exception_attribute_lookup(
        &self,
        env: &PassEnv<'_>,
        kind: ExceptionKind,
        attribute: &str,
    ) -> bool {
        if !kind.covers(ExceptionKind::AttributeError) {
            return false;
        }
        match self.shape_knowledge().exact() {
            Some(shape) => !env
                .table
                .lookup(attribute, shape)
                .is_some_and(|spec| spec.applicable.admits(env.target)),
            None => true,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Constant(c) => write!(f, "{c}"),
            ExprKind::Opaque { name, .. } | ExprKind::Variable { name, .. } => write!(f, "{name}"),
            ExprKind::Let { name, value, body } => write!(f, "let {name} = {value} in {body}"),
            ExprKind::AttributeLookup { source, attribute } => write!(f, "{source}.{attribute}"),
            ExprKind::AttributeLookupSpecialized {
                source,
                attribute,
                shape,
            } => write!(f, "{source}.{attribute}@{shape}"),
            ExprKind::Call {
                callee,
                args,
                kwargs,
            } => {
                write!(f, "{callee}(")?;
                let mut first = true;
                for arg in args {
                    if !first {
                        write!(f, ", ")?;
                    }
                    first = false;
                    write!(f, "{arg}")?;
                }
                for (name, value) in kwargs {
                    if !first {
                        write!(f, ", ")?;
                    }
                    first = false;
                    write!(f, "{name}={value}")?;
                }
                write!(f, ")")
            }
            ExprKind::Operation { op, source, args, .. } => {
                write!(f, "{op}({source}")?;
                for arg in args {
                    write!(f, ", {arg}")?;
                }
                write!(f, ")")
            }
            ExprKind::SideEffects { effects, value } => {
                write!(f, "(")?;
                for effect in effects {
                    write!(f, "{effect}; ")?;
                }
                write!(f, "{value})")
            }
            ExprKind::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// Outcome of any rewrite attempt: the (possibly replaced) node plus, when
/// something changed, a tag and a human-readable description.
#[derive(Clone, Debug, PartialEq)]
pub struct RewriteResult {
    pub expr: Expr,
    pub tag: Option<ChangeTag>,
    pub description: Option<String>,
}

impl RewriteResult {
    pub fn unchanged(expr: Expr) -> Self {
        RewriteResult {
            expr,
            tag: None,
            description: None,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.tag.is_some()
    }
}

/// A call expression taken apart so resolvers can inspect its pieces and
/// reassemble it unchanged when no rewrite applies.
#[derive(Clone, Debug, PartialEq)]
pub struct CallSite {
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
    pub kwargs: Vec<(String, Expr)>,
    pub span: Span,
}

impl CallSite {
    pub fn arg_count(&self) -> usize {
        self.args.len() + self.kwargs.len()
    }

    pub fn into_expr(self) -> Expr {
        Expr::new(
            ExprKind::Call {
                callee: self.callee,
                args: self.args,
                kwargs: self.kwargs,
            },
            self.span,
        )
    }
}
