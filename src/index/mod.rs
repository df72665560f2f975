//! Derived index structures. The primary record is authoritative; every
//! index is recomputable from it.

pub mod keys;
pub mod maintainer;
pub mod score;

pub use maintainer::IndexMaintainer;
pub use score::{ScoreIndex, ZCond};
