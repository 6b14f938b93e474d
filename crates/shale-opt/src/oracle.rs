//! Shape oracle: the source of exact-shape proofs.
//!
//! The pass never infers shapes itself. It asks an oracle whether an
//! expression is proven to be exactly a given shape, and the oracle must
//! answer `false` whenever it only knows "possibly".

use crate::expr::Expr;
use crate::shape::Shape;

pub trait ShapeOracle {
    /// Is `expr` statically proven to evaluate to a value of exactly `shape`?
    fn proven_shape(&self, expr: &Expr, shape: Shape) -> bool;
}

/// Oracle over the tree's own shape knowledge: constants, declared opaque
/// values, pass-refreshed variables, and operations with a known result.
#[derive(Copy, Clone, Debug, Default)]
pub struct ExactShapeOracle;

impl ShapeOracle for ExactShapeOracle {
    fn proven_shape(&self, expr: &Expr, shape: Shape) -> bool {
        expr.shape_knowledge().exact() == Some(shape)
    }
}
