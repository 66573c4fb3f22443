//! Summary statistics over a record sequence.

use super::record::{RECORD_SIZE, Record};

/// Bounds and mean color of a set of records.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordStats {
    /// Number of records seen.
    pub count: u64,
    /// Per-axis minimum position.
    pub min: [f32; 3],
    /// Per-axis maximum position.
    pub max: [f32; 3],
    /// Mean color (accumulated in f64).
    pub mean_color: [f64; 3],
}

impl Default for RecordStats {
    fn default() -> Self {
        Self {
            count: 0,
            min: [f32::INFINITY; 3],
            max: [f32::NEG_INFINITY; 3],
            mean_color: [0.0; 3],
        }
    }
}

impl RecordStats {
    pub fn from_records<'a, I: IntoIterator<Item = &'a Record>>(records: I) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.accumulate(record);
        }
        stats
    }

    /// Fold one record into the running statistics.
    pub fn accumulate(&mut self, record: &Record) {
        self.count += 1;
        let n = self.count as f64;

        for (axis, value) in record.position().into_iter().enumerate() {
            self.min[axis] = self.min[axis].min(value);
            self.max[axis] = self.max[axis].max(value);
        }
        for (channel, value) in record.color().into_iter().enumerate() {
            self.mean_color[channel] += (value as f64 - self.mean_color[channel]) / n;
        }
    }

    /// Encoded size of the records seen.
    pub fn byte_len(&self) -> u64 {
        self.count * RECORD_SIZE as u64
    }
}

impl std::fmt::Display for RecordStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return write!(f, "0 records");
        }
        write!(
            f,
            "{} records ({} bytes), bounds [{:.3}, {:.3}, {:.3}] .. [{:.3}, {:.3}, {:.3}], mean color ({:.3}, {:.3}, {:.3})",
            self.count,
            self.byte_len(),
            self.min[0],
            self.min[1],
            self.min[2],
            self.max[0],
            self.max[1],
            self.max[2],
            self.mean_color[0],
            self.mean_color[1],
            self.mean_color[2]
        )
    }
}
