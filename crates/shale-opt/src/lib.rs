//! Shale optimizer: shape-driven specialization of attribute access.
//!
//! A generic `source.attribute` whose source is proven to be exactly one of
//! a small set of built-in shapes is narrowed to a shape-specialized lookup,
//! and a call through that lookup is replaced by a direct operation node
//! when its arguments fit a declared signature. Nothing is rewritten on
//! anything less than exact proof; every miss leaves the tree as it was.
//!
//! # Architecture
//!
//! - [`shape`]: Shapes, shape knowledge, target generations
//! - [`table`]: Specialization table and its process-wide registry
//! - [`builtins`]: Declarative catalog of built-in entries
//! - [`expr`]: Rewrite tree and rewrite results
//! - [`oracle`]: Exact-shape proofs
//! - [`trace`]: Per-pass record of rewrites, exception exits, and misses
//! - [`args`]: Call argument extraction
//! - [`attribute`]: Generic and shape-specialized attribute nodes
//! - [`call`]: Call rewrite resolver
//! - [`pass`]: Tree walk and fixpoint driver
//! - [`config`]: TOML configuration
//! - [`diagnostics`]: Remark rendering

pub mod args;
pub mod attribute;
pub mod builtins;
pub mod call;
pub mod config;
pub mod diagnostics;
pub mod expr;
pub mod oracle;
pub mod pass;
pub mod shape;
pub mod table;
pub mod trace;

pub use shale_common::{Miss, MissKind, Span};

pub use config::{ConfigError, OptimizerConfig};
pub use expr::{Constant, Expr, ExprKind, RewriteResult};
pub use oracle::{ExactShapeOracle, ShapeOracle};
pub use pass::{OptimizationReport, PassEnv};
pub use shape::{Shape, ShapeKnowledge, TargetGeneration};
pub use table::{SpecializationTable, TableError};

use log::warn;

/// An optimizer bound to a table, an oracle, and a configuration.
pub struct Optimizer<'t> {
    table: &'t SpecializationTable,
    oracle: &'t dyn ShapeOracle,
    config: OptimizerConfig,
}

impl Optimizer<'static> {
    /// Optimizer over the built-in table, initializing it on first use.
    pub fn new(config: OptimizerConfig) -> Result<Self, TableError> {
        Ok(Optimizer {
            table: table::init_builtin_table()?,
            oracle: &ExactShapeOracle,
            config,
        })
    }
}

impl<'t> Optimizer<'t> {
    /// Optimizer over a caller-supplied table and oracle.
    pub fn with_table(
        table: &'t SpecializationTable,
        oracle: &'t dyn ShapeOracle,
        config: OptimizerConfig,
    ) -> Self {
        if table.is_empty() {
            warn!("optimizer built over an empty specialization table");
        }
        Optimizer {
            table,
            oracle,
            config,
        }
    }

    /// Run passes over `tree` to a fixpoint or the configured limit.
    pub fn optimize(&self, tree: Expr) -> (Expr, OptimizationReport) {
        pass::optimize(tree, self.table, self.oracle, &self.config)
    }
}
