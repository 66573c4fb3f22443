//! HTTP front end for chunked file streaming.
//!
//! One route, `GET /stream`, serves the full current contents of the
//! configured file. Every request gets its own [`StreamSession`] and file
//! handle; nothing is shared between requests except the configuration.

use std::convert::Infallible;
use std::io;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::stream;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use super::session::{ChunkSink, StreamSession};
use crate::format::RECORD_SIZE;
use crate::schema::{ConfigError, StreamerConfig};

/// Path of the streaming route.
pub const STREAM_ROUTE: &str = "/stream";

/// Server startup failures.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("Server error: {0}")]
    Io(#[from] io::Error),
}

/// Sink that feeds a streaming response body.
///
/// The channel holds a single chunk, so a slow client holds back its own
/// session's reads. When the response is dropped (client disconnect) the
/// next send fails.
pub struct BodySink {
    tx: mpsc::Sender<Bytes>,
}

impl BodySink {
    /// Create a sink and the body that drains it.
    pub fn channel() -> (Self, Body) {
        let (tx, rx) = mpsc::channel::<Bytes>(1);
        let chunks = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
        });
        (Self { tx }, Body::from_stream(chunks))
    }
}

impl ChunkSink for BodySink {
    async fn send_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.tx
            .send(Bytes::copy_from_slice(chunk))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))
    }
}

/// Build the router. Each call captures only its own configuration.
pub fn router(config: StreamerConfig) -> Router {
    Router::new()
        .route(STREAM_ROUTE, get(stream_handler))
        .with_state(Arc::new(config))
}

async fn stream_handler(State(config): State<Arc<StreamerConfig>>) -> Response {
    let mut session = match StreamSession::open(&config.source_path, config.chunk_size).await {
        Ok(session) => session,
        Err(e) => {
            log::error!("{}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to open data file").into_response();
        }
    };

    let (mut sink, body) = BodySink::channel();
    tokio::spawn(async move {
        match session.run(&mut sink).await {
            Ok(summary) => log::debug!("Stream session finished ({})", summary),
            Err(e) => log::warn!("Stream session aborted ({}): {}", session.summary(), e),
        }
    });

    (
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response()
}

/// Bind the configured address and serve until the process stops.
pub async fn serve(config: StreamerConfig) -> Result<(), ServeError> {
    config.validate()?;

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;

    serve_with_listener(listener, config).await
}

/// Serve on an already-bound listener.
pub async fn serve_with_listener(
    listener: TcpListener,
    config: StreamerConfig,
) -> Result<(), ServeError> {
    config.validate()?;
    check_source(&config.source_path).await;

    log::info!(
        "Streaming {} on http://{}{} ({} byte chunks)",
        config.source_path.display(),
        listener.local_addr()?,
        STREAM_ROUTE,
        config.chunk_size
    );

    axum::serve(listener, router(config)).await?;
    Ok(())
}

/// Warn about sources that will fail or are not record-aligned.
///
/// Alignment is only reported; the file must be fully generated before it
/// is served.
async fn check_source(path: &Path) {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() % RECORD_SIZE as u64 != 0 => log::warn!(
            "{} is {} bytes, not a multiple of the {}-byte record size",
            path.display(),
            meta.len(),
            RECORD_SIZE
        ),
        Ok(meta) => log::info!(
            "{} holds {} records",
            path.display(),
            meta.len() / RECORD_SIZE as u64
        ),
        Err(e) => log::warn!(
            "{} is not readable yet ({}); requests will fail until it exists",
            path.display(),
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{PointBuffers, RecordAssembler};
    use crate::generate::CloudGenerator;
    use axum::http::Request;
    use futures::StreamExt;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};
    use tower::ServiceExt;

    fn write_source(len: usize) -> (TempDir, PathBuf, Vec<u8>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("source.bin");
        let data: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
        std::fs::write(&path, &data).unwrap();
        (dir, path, data)
    }

    fn config_for(path: PathBuf, chunk_size: usize) -> StreamerConfig {
        StreamerConfig {
            listen_address: "127.0.0.1:0".to_string(),
            source_path: path,
            chunk_size,
        }
    }

    fn stream_request() -> Request<Body> {
        Request::builder()
            .uri(STREAM_ROUTE)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_stream_delivers_whole_file() {
        for len in [0usize, 10, 95, 1000] {
            let (_dir, path, data) = write_source(len);
            let app = router(config_for(path, 10));

            let response = app.oneshot(stream_request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "application/octet-stream"
            );
            assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(&body[..], &data[..], "length {}", len);
        }
    }

    #[tokio::test]
    async fn test_body_frames_are_chunk_sized() {
        let (_dir, path, data) = write_source(95);
        let app = router(config_for(path, 10));

        let response = app.oneshot(stream_request()).await.unwrap();
        let mut frames = response.into_body().into_data_stream();

        let mut sizes = Vec::new();
        let mut received = Vec::new();
        while let Some(frame) = frames.next().await {
            let frame = frame.unwrap();
            sizes.push(frame.len());
            received.extend_from_slice(&frame);
        }

        assert_eq!(sizes, vec![10, 10, 10, 10, 10, 10, 10, 10, 10, 5]);
        assert_eq!(received, data);
    }

    #[tokio::test]
    async fn test_missing_source_is_server_error() {
        let dir = tempdir().unwrap();
        let app = router(config_for(dir.path().join("missing.bin"), 10));

        let response = app.oneshot(stream_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_ne!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"failed to open data file");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (_dir, path, _) = write_source(10);
        let app = router(config_for(path, 10));

        let request = Request::builder()
            .uri("/other")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_concurrent_sessions_are_isolated() {
        let (_dir, path, data) = write_source(5000);
        let app = router(config_for(path, 64));

        let slow = app.clone().oneshot(stream_request()).await.unwrap();
        let fast = app.oneshot(stream_request()).await.unwrap();

        let mut slow_frames = slow.into_body().into_data_stream();
        let mut slow_received = Vec::new();

        // Start the slow reader, then let the fast one finish first
        let first = slow_frames.next().await.unwrap().unwrap();
        slow_received.extend_from_slice(&first);

        let fast_body = axum::body::to_bytes(fast.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&fast_body[..], &data[..]);

        while let Some(frame) = slow_frames.next().await {
            tokio::time::sleep(Duration::from_millis(1)).await;
            slow_received.extend_from_slice(&frame.unwrap());
        }
        assert_eq!(slow_received, data);
    }

    #[tokio::test]
    async fn test_body_sink_fails_after_disconnect() {
        let (mut sink, body) = BodySink::channel();
        sink.send_chunk(b"first").await.unwrap();
        drop(body);
        let err = sink.send_chunk(b"late").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_streamed_records_decode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clouds.bin");
        let mut bytes = Vec::new();
        CloudGenerator::new(21)
            .write_clouds(2, 300, &mut bytes)
            .unwrap();
        std::fs::write(&path, &bytes).unwrap();

        // 100 is deliberately not a multiple of the record size
        let app = router(config_for(path, 100));
        let response = app.oneshot(stream_request()).await.unwrap();
        let mut frames = response.into_body().into_data_stream();

        let mut assembler = RecordAssembler::new();
        let mut points = PointBuffers::default();
        while let Some(frame) = frames.next().await {
            assembler.push(&frame.unwrap(), &mut points);
        }

        assert_eq!(points.len(), 600);
        assert_eq!(assembler.finish(), 0);
        for c in &points.colors {
            assert!((0.0..=1.0).contains(c));
        }
    }

    #[tokio::test]
    async fn test_serve_rejects_invalid_config() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = StreamerConfig {
            chunk_size: 0,
            ..config_for(PathBuf::from("x.bin"), 1)
        };
        assert!(matches!(
            serve_with_listener(listener, config).await,
            Err(ServeError::Config(ConfigError::InvalidChunkSize))
        ));
    }
}
