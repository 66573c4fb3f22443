//! Schema module - Configuration and cloud parameter types.

mod cloud;
mod config;

pub use cloud::*;
pub use config::*;
