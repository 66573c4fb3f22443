//! Generate module - Synthetic point-cloud sampling.

mod generator;

pub use generator::*;
