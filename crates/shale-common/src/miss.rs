use std::fmt;

use crate::span::Span;

/// A specialization that was considered but not performed.
///
/// Misses are never errors: the node they describe keeps its fully general
/// semantics. They are collected so an optimization report can explain why
/// a lookup or call stayed generic.
#[derive(Debug, Clone, PartialEq)]
pub struct Miss {
    pub kind: MissKind,
    pub attribute: String,
    pub span: Span,
}

impl Miss {
    pub fn new(kind: MissKind, attribute: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            attribute: attribute.into(),
            span,
        }
    }
}

/// Why a specialization did not happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissKind {
    /// The table knows the attribute for some shape, but the source
    /// expression was not proven to be exactly any of those shapes.
    UnresolvedShape,
    /// The call arguments fit no declared variation signature.
    UnmatchedCallShape { reason: String },
    /// No specialized operation exists for the targeted generation, so the
    /// specialized attribute node cannot intercept calls.
    VersionUnavailable,
}

impl MissKind {
    /// Stable remark code used in rendered reports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnresolvedShape => "R0001",
            Self::UnmatchedCallShape { .. } => "R0002",
            Self::VersionUnavailable => "R0003",
        }
    }
}

impl fmt::Display for MissKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedShape => write!(f, "source shape not proven exact"),
            Self::UnmatchedCallShape { reason } => {
                write!(f, "call arguments do not fit: {reason}")
            }
            Self::VersionUnavailable => {
                write!(f, "no specialized operation for the target generation")
            }
        }
    }
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.attribute, self.kind)
    }
}
