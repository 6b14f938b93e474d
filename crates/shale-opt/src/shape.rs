//! Shapes, shape knowledge, and target generations.
//!
//! A `Shape` names an exact runtime representation the oracle can certify.
//! The set is closed: adding a shape means adding table entries for it and
//! a slot in [`SHAPE_PRIORITY`].

use std::fmt;

use serde::Deserialize;

/// An exact runtime representation class.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Associative mapping (dictionary).
    Dict,
    /// Unicode text.
    Str,
    /// Byte sequence.
    Bytes,
}

/// Order in which the generic attribute node tries shapes.
pub const SHAPE_PRIORITY: [Shape; 3] = [Shape::Dict, Shape::Str, Shape::Bytes];

impl Shape {
    /// Short human-readable name used in rewrite descriptions.
    pub fn nice_name(self) -> &'static str {
        match self {
            Shape::Dict => "dict",
            Shape::Str => "str",
            Shape::Bytes => "bytes",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.nice_name())
    }
}

/// What the tree knows about a value's representation.
///
/// Only `Exact` is proof. `Possibly` covers subtypes and unions that include
/// the shape; it never licenses a specialization.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ShapeKnowledge {
    Exact(Shape),
    Possibly(Shape),
    #[default]
    Unknown,
}

impl ShapeKnowledge {
    pub fn exact(self) -> Option<Shape> {
        match self {
            ShapeKnowledge::Exact(shape) => Some(shape),
            _ => None,
        }
    }
}

/// The target-language generation a compilation unit is built for.
///
/// Fixed once per compilation unit; selects version-split constructors and
/// gates generation-specific attributes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetGeneration {
    Legacy,
    #[default]
    Modern,
}

impl fmt::Display for TargetGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetGeneration::Legacy => write!(f, "legacy"),
            TargetGeneration::Modern => write!(f, "modern"),
        }
    }
}

/// A static predicate over target generations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum VersionPredicate {
    #[default]
    Always,
    LegacyOnly,
    ModernOnly,
}

impl VersionPredicate {
    pub fn admits(self, target: TargetGeneration) -> bool {
        match self {
            VersionPredicate::Always => true,
            VersionPredicate::LegacyOnly => target == TargetGeneration::Legacy,
            VersionPredicate::ModernOnly => target == TargetGeneration::Modern,
        }
    }
}
