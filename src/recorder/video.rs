//! Screen recording that runs alongside step capture.

use async_trait::async_trait;
use tokio::sync::mpsc;

pub const DEFAULT_MIME_TYPE: &str = "video/webm";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VideoError {
    #[error("screen capture permission denied")]
    PermissionDenied,
    #[error("screen capture is not available")]
    Unsupported,
    #[error("screen capture already running")]
    AlreadyCapturing,
    #[error("screen capture failed: {0}")]
    Failed(String),
}

/// Releases the capture hardware behind a stream.
pub trait StreamTracks: Send {
    fn stop(&mut self);
}

/// A live screen-capture stream. The chunk channel closing means the
/// stream ended on its own (e.g. sharing stopped from the browser UI).
pub struct MediaStream {
    pub mime_type: String,
    pub chunks: mpsc::Receiver<Vec<u8>>,
    pub tracks: Box<dyn StreamTracks>,
}

#[async_trait]
pub trait ScreenSource: Send + Sync {
    async fn acquire(&self, audio: bool) -> Result<MediaStream, VideoError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub size: usize,
}

enum VideoState {
    Inactive,
    Capturing {
        stream: MediaStream,
        chunks: Vec<Vec<u8>>,
    },
}

pub struct VideoController {
    state: VideoState,
}

impl Default for VideoController {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoController {
    pub fn new() -> Self {
        Self {
            state: VideoState::Inactive,
        }
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.state, VideoState::Capturing { .. })
    }

    pub async fn start(&mut self, source: &dyn ScreenSource, audio: bool) -> Result<(), VideoError> {
        if self.is_capturing() {
            return Err(VideoError::AlreadyCapturing);
        }
        let stream = source.acquire(audio).await?;
        tracing::info!(mime = %stream.mime_type, audio, "screen capture started");
        self.state = VideoState::Capturing {
            stream,
            chunks: Vec::new(),
        };
        Ok(())
    }

    /// Next recorded chunk; `None` once the stream has ended.
    /// Never resolves while inactive.
    pub async fn next_chunk(&mut self) -> Option<Vec<u8>> {
        match &mut self.state {
            VideoState::Capturing { stream, .. } => stream.chunks.recv().await,
            VideoState::Inactive => std::future::pending().await,
        }
    }

    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        if let VideoState::Capturing { chunks, .. } = &mut self.state {
            if !chunk.is_empty() {
                chunks.push(chunk);
            }
        }
    }

    /// Finalises the buffer and releases the stream. Used both for an
    /// explicit stop and for a stream that ended externally.
    pub fn stop(&mut self) -> Option<VideoArtifact> {
        let VideoState::Capturing {
            mut stream,
            mut chunks,
        } = std::mem::replace(&mut self.state, VideoState::Inactive)
        else {
            return None;
        };
        while let Ok(chunk) = stream.chunks.try_recv() {
            if !chunk.is_empty() {
                chunks.push(chunk);
            }
        }
        stream.tracks.stop();
        let bytes = chunks.concat();
        let size = bytes.len();
        tracing::info!(size, "screen capture finalised");
        Some(VideoArtifact {
            bytes,
            mime_type: stream.mime_type,
            size,
        })
    }
}
