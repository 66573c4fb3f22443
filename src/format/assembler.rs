//! Incremental decoding of records from arbitrarily split byte chunks.
//!
//! Network reads rarely line up with record boundaries. The assembler keeps
//! the unfinished tail of each chunk and prepends it to the next one.

use super::record::{RECORD_SIZE, Record};

/// Decoded points split into separate position and color arrays.
///
/// Both arrays hold three floats per point, in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointBuffers {
    pub positions: Vec<f32>,
    pub colors: Vec<f32>,
}

impl PointBuffers {
    pub fn with_capacity(points: usize) -> Self {
        Self {
            positions: Vec::with_capacity(points * 3),
            colors: Vec::with_capacity(points * 3),
        }
    }

    /// Number of points held.
    pub fn len(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn push(&mut self, record: &Record) {
        self.positions.extend_from_slice(&record.position());
        self.colors.extend_from_slice(&record.color());
    }

    /// Reassemble the record at `index`.
    pub fn get(&self, index: usize) -> Option<Record> {
        let p = self.positions.get(index * 3..index * 3 + 3)?;
        let c = self.colors.get(index * 3..index * 3 + 3)?;
        Some(Record::new([p[0], p[1], p[2]], [c[0], c[1], c[2]]))
    }
}

/// Stateful chunk-to-record decoder.
#[derive(Debug, Default)]
pub struct RecordAssembler {
    pending: Vec<u8>,
    records: u64,
}

impl RecordAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every complete record available after appending `chunk`.
    ///
    /// Returns the number of records appended to `out`.
    pub fn push(&mut self, chunk: &[u8], out: &mut PointBuffers) -> usize {
        let mut decoded = 0;
        let mut rest = chunk;

        // Complete a record left over from the previous chunk first
        if !self.pending.is_empty() {
            let needed = RECORD_SIZE - self.pending.len();
            let take = needed.min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if let Some(record) = Record::from_slice(&self.pending) {
                out.push(&record);
                self.pending.clear();
                decoded += 1;
            }
        }

        let mut records = rest.chunks_exact(RECORD_SIZE);
        for bytes in &mut records {
            if let Some(record) = Record::from_slice(bytes) {
                out.push(&record);
                decoded += 1;
            }
        }
        self.pending.extend_from_slice(records.remainder());

        self.records += decoded as u64;
        decoded
    }

    /// Bytes of an incomplete record still waiting for more input.
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    /// Total records decoded so far.
    pub fn records_decoded(&self) -> u64 {
        self.records
    }

    /// End the stream, returning the number of orphaned trailing bytes.
    pub fn finish(self) -> usize {
        if !self.pending.is_empty() {
            log::warn!(
                "Stream ended with {} bytes of an incomplete record",
                self.pending.len()
            );
        }
        self.pending.len()
    }
}
