//! Stream module - Chunked delivery of binary files over HTTP.

mod server;
mod session;

pub use server::*;
pub use session::*;
