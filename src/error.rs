use crate::control::ControlError;
use crate::export::ExportError;
use crate::recorder::capture::CaptureError;
use crate::recorder::manual::OutOfRange;
use crate::recorder::state::RecorderStateError;
use crate::recorder::storage::StorageError;
use crate::recorder::video::VideoError;
use crate::relay::RelayError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    State(#[from] RecorderStateError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Video(#[from] VideoError),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error(transparent)]
    OutOfRange(#[from] OutOfRange),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config directory not found")]
    NoConfigDir,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
