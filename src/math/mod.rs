//! Mathematical utilities: grids, summary statistics and small dense linear algebra.

pub mod grid;
pub mod linalg;
pub mod stats;

pub use grid::*;
pub use linalg::*;
pub use stats::*;
