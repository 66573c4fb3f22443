//! cloudstream - Synthetic point clouds, written once and streamed on demand.
//!
//! This crate generates clusters of colored 3D points, stores them in a flat
//! fixed-width binary format, and serves such files to HTTP clients one chunk
//! at a time.
//!
//! # Architecture
//!
//! - `format`: The 24-byte record codec plus readers, writers and an
//!   incremental decoder for network chunks
//! - `schema`: Configuration types and cloud parameters
//! - `generate`: Seeded Gaussian cloud sampling into a record sink
//! - `stream`: Per-request streaming sessions and the HTTP server
//!
//! The write path and the read path only meet through the file on disk. A
//! file must be completely generated before it is served.
//!
//! # Example
//!
//! ```rust,no_run
//! use cloudstream::{
//!     generate::generate_file,
//!     schema::{GeneratorConfig, StreamerConfig},
//!     stream::serve,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GeneratorConfig {
//!     cloud_count: 3,
//!     points_per_cloud: 1000,
//!     output_path: "points.bin".into(),
//!     seed: Some(42),
//! };
//! let stats = generate_file(&config)?;
//! println!("{}", stats);
//!
//! serve(StreamerConfig {
//!     source_path: "points.bin".into(),
//!     ..Default::default()
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod format;
pub mod generate;
pub mod schema;
pub mod stream;

// Re-export commonly used types
pub use format::{RECORD_SIZE, Record};
pub use generate::{CloudGenerator, GenerationStats};
pub use schema::{GeneratorConfig, StreamerConfig};
pub use stream::{StreamSession, router, serve};
