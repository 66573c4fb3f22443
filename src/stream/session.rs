//! Per-request streaming session.
//!
//! A session owns one read handle and one chunk buffer. Each [`StreamSession::step`]
//! reads up to one chunk, hands it to a [`ChunkSink`], and waits for the sink
//! to flush it before reading again, so memory per session stays at one chunk
//! however large the source or slow the client.
//!
//! ```text
//! Idle -> Opening -> Streaming -> Completed
//!            |           |
//!            +-----------+------> Aborted
//! ```

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Destination for streamed chunks.
///
/// `send_chunk` must deliver the whole chunk and flush it before resolving.
/// An error means the receiver is gone.
pub trait ChunkSink {
    fn send_chunk(&mut self, chunk: &[u8]) -> impl Future<Output = io::Result<()>> + Send;
}

impl<W: AsyncWrite + Unpin + Send> ChunkSink for W {
    async fn send_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.write_all(chunk).await?;
        self.flush().await
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no source yet.
    Idle,
    /// Source open in progress.
    Opening,
    /// Source open, chunks flowing.
    Streaming,
    /// Whole source delivered.
    Completed,
    /// Stopped by an open, read, or write failure.
    Aborted,
}

impl SessionState {
    /// True for `Completed` and `Aborted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Aborted)
    }
}

/// Session failures. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Source read failed: {0}")]
    Read(#[source] io::Error),
    #[error("Client write failed: {0}")]
    Write(#[source] io::Error),
}

/// Progress of a session at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub state: SessionState,
    /// Chunks delivered to the sink.
    pub chunks: u64,
    /// Bytes delivered to the sink.
    pub bytes: u64,
}

impl std::fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}: {} chunks, {} bytes",
            self.state, self.chunks, self.bytes
        )
    }
}

/// Streaming state for one request.
pub struct StreamSession<R> {
    source: Option<R>,
    buffer: Vec<u8>,
    state: SessionState,
    chunks: u64,
    bytes: u64,
}

impl StreamSession<File> {
    /// Create an idle session that will stream a file.
    pub fn new(chunk_size: usize) -> Self {
        Self::with_source(None, chunk_size, SessionState::Idle)
    }

    /// Open `path` read-only and move to `Streaming`.
    ///
    /// On failure the session is `Aborted` and nothing has been sent.
    pub async fn open_path<P: AsRef<Path>>(&mut self, path: P) -> Result<(), SessionError> {
        let path = path.as_ref();
        self.state = SessionState::Opening;

        match File::open(path).await {
            Ok(file) => {
                log::debug!("Stream session opened {}", path.display());
                self.source = Some(file);
                self.state = SessionState::Streaming;
                Ok(())
            }
            Err(source) => {
                self.state = SessionState::Aborted;
                Err(SessionError::Open {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Create a session and open `path` in one go.
    pub async fn open<P: AsRef<Path>>(path: P, chunk_size: usize) -> Result<Self, SessionError> {
        let mut session = Self::new(chunk_size);
        session.open_path(path).await?;
        Ok(session)
    }
}

impl<R: AsyncRead + Unpin> StreamSession<R> {
    /// Stream from an already-open source.
    pub fn from_reader(source: R, chunk_size: usize) -> Self {
        Self::with_source(Some(source), chunk_size, SessionState::Streaming)
    }

    fn with_source(source: Option<R>, chunk_size: usize, state: SessionState) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self {
            source,
            buffer: vec![0u8; chunk_size],
            state,
            chunks: 0,
            bytes: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn chunk_size(&self) -> usize {
        self.buffer.len()
    }

    /// True once the source handle has been dropped.
    pub fn is_released(&self) -> bool {
        self.source.is_none()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            state: self.state,
            chunks: self.chunks,
            bytes: self.bytes,
        }
    }

    /// Enter a terminal state and drop the source.
    fn finish(&mut self, state: SessionState) {
        self.state = state;
        self.source = None;
    }

    /// Perform one read/send cycle.
    ///
    /// Returns the state after the cycle. Outside `Streaming` this does nothing.
    pub async fn step<S: ChunkSink>(&mut self, sink: &mut S) -> Result<SessionState, SessionError> {
        if self.state != SessionState::Streaming {
            return Ok(self.state);
        }
        let Some(source) = self.source.as_mut() else {
            self.finish(SessionState::Aborted);
            return Ok(self.state);
        };

        let filled = match fill_buffer(source, &mut self.buffer).await {
            Ok(n) => n,
            Err(e) => {
                self.finish(SessionState::Aborted);
                return Err(SessionError::Read(e));
            }
        };

        if filled > 0 {
            if let Err(e) = sink.send_chunk(&self.buffer[..filled]).await {
                self.finish(SessionState::Aborted);
                return Err(SessionError::Write(e));
            }
            self.chunks += 1;
            self.bytes += filled as u64;
        }

        // A short fill means the source is exhausted
        if filled < self.buffer.len() {
            self.finish(SessionState::Completed);
        }

        Ok(self.state)
    }

    /// Step until the session reaches a terminal state.
    pub async fn run<S: ChunkSink>(&mut self, sink: &mut S) -> Result<SessionSummary, SessionError> {
        while self.state == SessionState::Streaming {
            self.step(sink).await?;
        }
        Ok(self.summary())
    }
}

/// Read until `buffer` is full or the source ends. Returns bytes read.
async fn fill_buffer<R: AsyncRead + Unpin>(source: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match source.read(&mut buffer[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
