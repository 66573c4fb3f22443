//! Configuration types for generation and streaming.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default chunk size for streaming (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// Settings for one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Number of Gaussian clouds to generate.
    pub cloud_count: usize,
    /// Records per cloud.
    pub points_per_cloud: usize,
    /// Destination file. Truncated if it already exists.
    pub output_path: PathBuf,
    /// Fixed random seed. When absent, a seed is derived from the wall clock.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            cloud_count: 1,
            points_per_cloud: 1000,
            output_path: PathBuf::from("points.bin"),
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// Total records a run with this configuration produces.
    #[inline]
    pub fn total_records(&self) -> u64 {
        self.cloud_count as u64 * self.points_per_cloud as u64
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cloud_count == 0 {
            return Err(ConfigError::InvalidCloudCount);
        }
        if self.points_per_cloud == 0 {
            return Err(ConfigError::InvalidPointCount);
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingOutputPath);
        }
        Ok(())
    }
}

/// Settings for the streaming server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerConfig {
    /// Address to listen on, e.g. `0.0.0.0:8080` or `:8080`.
    pub listen_address: String,
    /// Binary file served to every request.
    pub source_path: PathBuf,
    /// Bytes read and flushed per cycle.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8080".to_string(),
            source_path: PathBuf::from("points.bin"),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl StreamerConfig {
    /// Address in a form the socket layer accepts.
    ///
    /// A bare `:port` binds every interface.
    pub fn bind_address(&self) -> String {
        let addr = self.listen_address.trim();
        if addr.starts_with(':') {
            format!("0.0.0.0{}", addr)
        } else {
            addr.to_string()
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_address.trim().is_empty() {
            return Err(ConfigError::InvalidListenAddress);
        }
        if self.source_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingSourcePath);
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Cloud count must be positive")]
    InvalidCloudCount,
    #[error("Points per cloud must be positive")]
    InvalidPointCount,
    #[error("Output path is required")]
    MissingOutputPath,
    #[error("Source path is required")]
    MissingSourcePath,
    #[error("Chunk size must be positive")]
    InvalidChunkSize,
    #[error("Listen address is required")]
    InvalidListenAddress,
}
