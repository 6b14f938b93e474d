//! The mutation/trace context threaded through one optimization pass.
//!
//! A `TraceCollection` accumulates the facts one pass learns: which rewrites
//! happened, which exception exits became possible, and (optionally) which
//! specializations were missed. It is rebuilt fresh for every pass.

use std::fmt;

use log::{debug, trace};
use shale_common::{Miss, Span};

use crate::expr::{Expr, RewriteResult};

/// Classes of exceptions the effect tracker distinguishes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// Anything at all may be raised.
    Any,
    AttributeError,
}

impl ExceptionKind {
    /// Does a possible exit of kind `self` include `other`?
    pub fn covers(self, other: ExceptionKind) -> bool {
        self == ExceptionKind::Any || self == other
    }
}

/// Tag attached to a rewrite.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChangeTag {
    NewExpression,
    NewConstant,
}

impl fmt::Display for ChangeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeTag::NewExpression => write!(f, "new_expression"),
            ChangeTag::NewConstant => write!(f, "new_constant"),
        }
    }
}

/// One rewrite performed during a pass.
#[derive(Clone, Debug, PartialEq)]
pub struct RewriteRecord {
    pub tag: ChangeTag,
    pub description: String,
    pub span: Span,
}

#[derive(Debug, Default)]
pub struct TraceCollection {
    rewrites: Vec<RewriteRecord>,
    raise_exits: Vec<ExceptionKind>,
    misses: Vec<Miss>,
    collect_misses: bool,
}

impl TraceCollection {
    pub fn new() -> Self {
        Self::with_misses(true)
    }

    pub fn with_misses(collect_misses: bool) -> Self {
        TraceCollection {
            collect_misses,
            ..Default::default()
        }
    }

    /// Record that control may leave through an exception of `kind`.
    pub fn on_exception_raise_exit(&mut self, kind: ExceptionKind) {
        if !self.raise_exits.contains(&kind) {
            self.raise_exits.push(kind);
        }
    }

    /// Has any recorded exit been possible for `kind`?
    pub fn may_raise(&self, kind: ExceptionKind) -> bool {
        self.raise_exits
            .iter()
            .any(|exit| exit.covers(kind) || kind.covers(*exit))
    }

    /// Record a rewrite and wrap the replacement as a tagged result.
    pub fn computed_expression_result(
        &mut self,
        expr: Expr,
        tag: ChangeTag,
        description: impl Into<String>,
    ) -> RewriteResult {
        let description = description.into();
        debug!("{tag}: {description}");
        self.rewrites.push(RewriteRecord {
            tag,
            description: description.clone(),
            span: expr.span,
        });
        RewriteResult {
            expr,
            tag: Some(tag),
            description: Some(description),
        }
    }

    pub fn record_miss(&mut self, miss: Miss) {
        trace!("missed specialization {miss}");
        if self.collect_misses {
            self.misses.push(miss);
        }
    }

    pub fn rewrite_count(&self) -> usize {
        self.rewrites.len()
    }

    pub fn rewrites(&self) -> &[RewriteRecord] {
        &self.rewrites
    }

    pub fn misses(&self) -> &[Miss] {
        &self.misses
    }

    pub fn raise_exits(&self) -> &[ExceptionKind] {
        &self.raise_exits
    }

    pub fn into_parts(self) -> (Vec<RewriteRecord>, Vec<Miss>) {
        (self.rewrites, self.misses)
    }
}
