//! Fixed-width record encoding.

use std::io::{self, Read, Write};

/// Number of `f32` fields in one record.
pub const RECORD_FLOATS: usize = 6;

/// Size of one encoded record in bytes.
pub const RECORD_SIZE: usize = RECORD_FLOATS * 4;

/// One colored point.
///
/// Color channels are expected in `[0, 1]` but the codec never checks them;
/// clamping is the generator's job.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Record {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Record {
    pub fn new(position: [f32; 3], color: [f32; 3]) -> Self {
        Self {
            x: position[0],
            y: position[1],
            z: position[2],
            r: color[0],
            g: color[1],
            b: color[2],
        }
    }

    /// Position as `[x, y, z]`.
    #[inline]
    pub fn position(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Color as `[r, g, b]`.
    #[inline]
    pub fn color(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    #[inline]
    fn fields(&self) -> [f32; RECORD_FLOATS] {
        [self.x, self.y, self.z, self.r, self.g, self.b]
    }

    /// Encode into a caller-owned buffer.
    #[inline]
    pub fn encode_into(&self, dst: &mut [u8; RECORD_SIZE]) {
        for (slot, value) in dst.chunks_exact_mut(4).zip(self.fields()) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Encode to a fresh 24-byte array.
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        self.encode_into(&mut bytes);
        bytes
    }

    /// Decode a record. Any bit pattern is accepted, NaN and infinities included.
    #[inline]
    pub fn decode(bytes: &[u8; RECORD_SIZE]) -> Self {
        let field = |i: usize| {
            f32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]])
        };
        Self {
            x: field(0),
            y: field(1),
            z: field(2),
            r: field(3),
            g: field(4),
            b: field(5),
        }
    }

    /// Decode from a slice, or `None` if it is not exactly [`RECORD_SIZE`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: &[u8; RECORD_SIZE] = bytes.try_into().ok()?;
        Some(Self::decode(array))
    }

    /// Write the encoded record using `scratch` as the staging buffer.
    pub fn write_to<W: Write>(&self, w: &mut W, scratch: &mut [u8; RECORD_SIZE]) -> io::Result<()> {
        self.encode_into(scratch);
        w.write_all(scratch)
    }

    /// Read one record from input.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut bytes = [0u8; RECORD_SIZE];
        r.read_exact(&mut bytes)?;
        Ok(Self::decode(&bytes))
    }
}

/// Record sink with a reusable encode buffer.
///
/// ```ignore
/// let mut writer = RecordWriter::new(BufWriter::new(File::create("points.bin")?));
/// writer.write_record(&record)?;
/// writer.flush()?;
/// ```
pub struct RecordWriter<W: Write> {
    inner: W,
    scratch: [u8; RECORD_SIZE],
    records_written: u64,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            scratch: [0u8; RECORD_SIZE],
            records_written: 0,
        }
    }

    /// Encode and write one record. Fails only if the destination fails.
    pub fn write_record(&mut self, record: &Record) -> io::Result<()> {
        record.write_to(&mut self.inner, &mut self.scratch)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    /// Records successfully handed to the destination so far.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Bytes successfully handed to the destination so far.
    pub fn bytes_written(&self) -> u64 {
        self.records_written * RECORD_SIZE as u64
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Iterator over the records of a binary source.
///
/// A trailing partial record produces one `InvalidData` error, after which
/// iteration ends.
pub struct RecordReader<R: Read> {
    inner: R,
    buffer: [u8; RECORD_SIZE],
    done: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: [0u8; RECORD_SIZE],
            done: false,
        }
    }

    /// Fill the record buffer, returning how many bytes were read before EOF.
    fn fill(&mut self) -> io::Result<usize> {
        let mut filled = 0;
        while filled < RECORD_SIZE {
            match self.inner.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = io::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.fill() {
            Ok(RECORD_SIZE) => Some(Ok(Record::decode(&self.buffer))),
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(n) => {
                self.done = true;
                Some(Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Trailing partial record: {} of {} bytes", n, RECORD_SIZE),
                )))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
