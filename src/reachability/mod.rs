//! Reachability module.
//!
//! Decides whether two devices can exchange traffic given the current
//! wiring, addressing and routing tables.

pub mod types;
pub mod evaluator;
pub mod matrix;

pub use evaluator::Evaluator;
pub use matrix::{connectivity_ratio, reachability_matrix, MatrixEntry};
pub use types::Reachability;
