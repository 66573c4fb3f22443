//! Gaussian cloud sampling.
//!
//! Each cloud draws a center, a per-axis spread, and a base color once, then
//! samples its points around them. Clouds are written one after another, so
//! every record of cloud 0 precedes every record of cloud 1.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::prelude::*;
use rand_distr::StandardNormal;

use crate::format::{RECORD_SIZE, Record, RecordWriter};
use crate::schema::{
    BASE_COLOR_RANGE, CENTER_RANGE, COLOR_JITTER, CloudSpec, ConfigError, GeneratorConfig,
    SPREAD_RANGE, clamp_unit,
};

/// Output buffer size for generated files (1 MiB).
const WRITE_BUFFER_SIZE: usize = 1 << 20;

/// Errors from a generation run.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to create output {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Write error: {0}")]
    Write(#[source] io::Error),
}

/// Seeded cloud sampler.
///
/// Owns its random source, so independent generators never interfere.
pub struct CloudGenerator {
    rng: StdRng,
    seed: u64,
}

impl CloudGenerator {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Create from configuration, falling back to a wall-clock seed.
    pub fn from_config(config: &GeneratorConfig) -> Self {
        let seed = config.seed.unwrap_or_else(wall_clock_seed);
        Self::new(seed)
    }

    /// Seed this generator was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform sample in a half-open range.
    fn uniform(&mut self, (lo, hi): (f64, f64)) -> f64 {
        self.rng.gen_range(lo..hi)
    }

    fn normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    /// Draw the parameters of a new cloud.
    pub fn sample_cloud(&mut self) -> CloudSpec {
        let center = [
            self.uniform(CENTER_RANGE),
            self.uniform(CENTER_RANGE),
            self.uniform(CENTER_RANGE),
        ];
        let spread = [
            self.uniform(SPREAD_RANGE),
            self.uniform(SPREAD_RANGE),
            self.uniform(SPREAD_RANGE),
        ];
        let base_color = [
            self.uniform(BASE_COLOR_RANGE),
            self.uniform(BASE_COLOR_RANGE),
            self.uniform(BASE_COLOR_RANGE),
        ];

        CloudSpec {
            center,
            spread,
            base_color,
        }
    }

    /// Draw one point from a cloud.
    ///
    /// Arithmetic is done in f64; values are narrowed to f32 only when the
    /// record is built.
    pub fn sample_point(&mut self, cloud: &CloudSpec) -> Record {
        let mut position = [0.0f32; 3];
        for (axis, out) in position.iter_mut().enumerate() {
            *out = (cloud.center[axis] + self.normal() * cloud.spread[axis]) as f32;
        }

        let mut color = [0.0f32; 3];
        for (channel, out) in color.iter_mut().enumerate() {
            let jittered = cloud.base_color[channel] + self.normal() * COLOR_JITTER;
            *out = clamp_unit(jittered) as f32;
        }

        Record::new(position, color)
    }

    /// Sample `cloud_count` clouds of `points_per_cloud` records each into `sink`.
    ///
    /// Stops at the first write failure; bytes already written stay in the sink.
    pub fn write_clouds<W: Write>(
        &mut self,
        cloud_count: usize,
        points_per_cloud: usize,
        sink: &mut W,
    ) -> io::Result<GenerationStats> {
        let mut writer = RecordWriter::new(sink);

        for cloud_index in 0..cloud_count {
            let cloud = self.sample_cloud();
            log::debug!(
                "Cloud {}: center=({:.2}, {:.2}, {:.2}) spread=({:.2}, {:.2}, {:.2})",
                cloud_index,
                cloud.center[0],
                cloud.center[1],
                cloud.center[2],
                cloud.spread[0],
                cloud.spread[1],
                cloud.spread[2]
            );

            for _ in 0..points_per_cloud {
                let record = self.sample_point(&cloud);
                writer.write_record(&record)?;
            }
        }

        Ok(GenerationStats {
            clouds: cloud_count as u64,
            records: writer.records_written(),
            bytes: writer.bytes_written(),
            seed: self.seed,
        })
    }
}

/// Run a complete generation into the configured output file.
///
/// Configuration is validated before the file is created.
pub fn generate_file(config: &GeneratorConfig) -> Result<GenerationStats, GenerateError> {
    config.validate()?;

    let file = File::create(&config.output_path).map_err(|source| GenerateError::Create {
        path: config.output_path.clone(),
        source,
    })?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

    let mut generator = CloudGenerator::from_config(config);
    log::info!(
        "Generating {} clouds x {} points into {} (seed {})",
        config.cloud_count,
        config.points_per_cloud,
        config.output_path.display(),
        generator.seed()
    );

    let stats = generator
        .write_clouds(config.cloud_count, config.points_per_cloud, &mut writer)
        .map_err(GenerateError::Write)?;
    writer.flush().map_err(GenerateError::Write)?;

    log::info!("Generation complete: {}", stats);
    Ok(stats)
}

fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// Statistics from a generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationStats {
    /// Clouds generated.
    pub clouds: u64,
    /// Records written.
    pub records: u64,
    /// Bytes written.
    pub bytes: u64,
    /// Seed used, for replaying the run.
    pub seed: u64,
}

impl GenerationStats {
    /// Expected file size for a run of the given shape.
    pub fn expected_bytes(cloud_count: usize, points_per_cloud: usize) -> u64 {
        cloud_count as u64 * points_per_cloud as u64 * RECORD_SIZE as u64
    }
}

impl std::fmt::Display for GenerationStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} clouds, {} records, {} bytes (seed {})",
            self.clouds, self.records, self.bytes, self.seed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::RecordReader;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn generate_bytes(seed: u64, clouds: usize, points: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        CloudGenerator::new(seed)
            .write_clouds(clouds, points, &mut bytes)
            .unwrap();
        bytes
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let a = generate_bytes(42, 4, 250);
        let b = generate_bytes(42, 4, 250);
        assert_eq!(a, b);

        let c = generate_bytes(43, 4, 250);
        assert_ne!(a, c);
    }

    #[test]
    fn test_colors_stay_in_unit_range() {
        let mut generator = CloudGenerator::new(7);
        // Base colors at the extremes make clamping likely
        let cloud = CloudSpec {
            center: [0.0; 3],
            spread: [1.0; 3],
            base_color: [0.0, 1.0, 0.98],
        };

        let mut clamped_low = false;
        let mut clamped_high = false;
        for _ in 0..10_000 {
            let record = generator.sample_point(&cloud);
            for c in record.color() {
                assert!((0.0..=1.0).contains(&c), "color {} out of range", c);
            }
            clamped_low |= record.r == 0.0;
            clamped_high |= record.g == 1.0;
        }
        assert!(clamped_low && clamped_high);
    }

    #[test]
    fn test_generated_colors_in_unit_range() {
        let bytes = generate_bytes(11, 5, 2000);
        for record in RecordReader::new(Cursor::new(bytes)) {
            let record = record.unwrap();
            for c in record.color() {
                assert!((0.0..=1.0).contains(&c));
            }
        }
    }

    #[test]
    fn test_sampled_clouds_within_ranges() {
        let mut generator = CloudGenerator::new(3);
        for _ in 0..1000 {
            assert!(generator.sample_cloud().in_sampling_bounds());
        }
    }

    #[test]
    fn test_spread_matches_sample_deviation() {
        let mut generator = CloudGenerator::new(1234);
        let cloud = CloudSpec {
            center: [10.0, -20.0, 30.0],
            spread: [2.0, 5.0, 9.5],
            base_color: [0.5; 3],
        };

        let n = 50_000;
        let points: Vec<Record> = (0..n).map(|_| generator.sample_point(&cloud)).collect();

        for axis in 0..3 {
            let values: Vec<f64> = points.iter().map(|p| p.position()[axis] as f64).collect();
            let mean = values.iter().sum::<f64>() / n as f64;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            let std = var.sqrt();

            let sigma = cloud.spread[axis];
            assert!(
                (std - sigma).abs() / sigma < 0.03,
                "axis {}: sample std {} vs spread {}",
                axis,
                std,
                sigma
            );
            assert!((mean - cloud.center[axis]).abs() < 5.0 * sigma / (n as f64).sqrt());
        }
    }

    #[test]
    fn test_generate_file_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clouds.bin");

        let config = GeneratorConfig {
            cloud_count: 3,
            points_per_cloud: 1000,
            output_path: path.clone(),
            seed: Some(99),
        };
        let stats = generate_file(&config).unwrap();

        assert_eq!(stats.records, 3000);
        assert_eq!(stats.bytes, 72_000);
        assert_eq!(fs::metadata(&path).unwrap().len(), 72_000);
        assert_eq!(GenerationStats::expected_bytes(3, 1000), 72_000);
    }

    #[test]
    fn test_generate_file_rejects_config_before_creating() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("never.bin");

        let config = GeneratorConfig {
            cloud_count: 0,
            points_per_cloud: 10,
            output_path: path.clone(),
            seed: Some(1),
        };

        assert!(matches!(
            generate_file(&config),
            Err(GenerateError::Config(ConfigError::InvalidCloudCount))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_generate_file_missing_directory() {
        let dir = tempdir().unwrap();
        let config = GeneratorConfig {
            output_path: dir.path().join("missing").join("out.bin"),
            seed: Some(1),
            ..Default::default()
        };
        assert!(matches!(
            generate_file(&config),
            Err(GenerateError::Create { .. })
        ));
    }

    /// Accepts `limit` bytes, then fails every write.
    struct LimitedWriter {
        data: Vec<u8>,
        limit: usize,
    }

    impl Write for LimitedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.limit - self.data.len();
            if room == 0 {
                return Err(io::Error::other("disk full"));
            }
            let n = room.min(buf.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_leaves_truncated_output() {
        let mut sink = LimitedWriter {
            data: Vec::new(),
            limit: 100,
        };

        let err = CloudGenerator::new(5)
            .write_clouds(2, 50, &mut sink)
            .unwrap_err();
        assert_eq!(err.to_string(), "disk full");

        // Bytes before the failure are kept, including the partial record
        assert_eq!(sink.data.len(), 100);
        let expected = generate_bytes(5, 2, 50);
        assert_eq!(&sink.data[..], &expected[..100]);
    }
}
