//! Binary record format for synthetic point clouds.
//!
//! A point-cloud file is a bare concatenation of fixed-width records with no
//! header, footer, or length prefix. Its length is always a multiple of
//! [`RECORD_SIZE`].
//!
//! # Record Layout
//!
//! ```text
//! offset  size  field
//! 0       4     X  (f32, little-endian)
//! 4       4     Y  (f32, little-endian)
//! 8       4     Z  (f32, little-endian)
//! 12      4     R  (f32, little-endian)
//! 16      4     G  (f32, little-endian)
//! 20      4     B  (f32, little-endian)
//! ```

mod assembler;
mod record;
mod stats;

pub use assembler::{PointBuffers, RecordAssembler};
pub use record::{RECORD_FLOATS, RECORD_SIZE, Record, RecordReader, RecordWriter};
pub use stats::RecordStats;
