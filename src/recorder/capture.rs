use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("screenshot permission denied")]
    PermissionDenied,
    #[error("no visible tab to capture")]
    NoVisibleTab,
    #[error("screenshot request got no response")]
    NoResponse,
    #[error("screenshot failed: {0}")]
    Failed(String),
}

/// Screenshot acquisition from the privileged extension context.
///
/// The page itself cannot read pixels; implementations forward the request
/// (e.g. to `tabs.captureVisibleTab`) and return a `data:` URL.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    async fn capture_visible_tab(&self) -> Result<String, CaptureError>;
}
