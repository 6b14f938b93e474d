//! Types shared by every shale crate: source spans and the taxonomy of
//! specialization misses.

pub mod miss;
pub mod span;

pub use miss::{Miss, MissKind};
pub use span::Span;
