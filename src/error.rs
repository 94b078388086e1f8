//! Failure taxonomy for the capture pipeline.
//!
//! Operations return `anyhow::Result`; a `CaptureError` travels inside the
//! `anyhow::Error` (directly or as context) so callers can classify a failure
//! with `downcast_ref::<CaptureError>()` without string matching.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureError {
    /// Enumeration returned no devices.
    NoCameraAvailable,
    /// A selection was requested from an empty registry.
    NoSelection,
    /// The capability refused to attach a decode stream to the named camera.
    CameraAttachError(String),
    /// The operator (or platform) denied camera access.
    CameraPermissionDenied,
    /// Network or payload failure talking to the remote endpoint.
    TransportError(String),
    /// The remote endpoint says the scanned code is invalid or unknown.
    ResolutionRejected(String),
    /// A submission arrived inside the debounce window, or was incomplete.
    DuplicateSuppressed,
    /// The remote endpoint refused to record the attendance.
    SaveRejected(String),
}

impl CaptureError {
    /// Whether the failure should ever reach the operator as an error toast.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            CaptureError::CameraPermissionDenied | CaptureError::DuplicateSuppressed
        )
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NoCameraAvailable => write!(f, "no cameras found"),
            CaptureError::NoSelection => write!(f, "no camera selected"),
            CaptureError::CameraAttachError(camera) => {
                write!(f, "failed to attach camera '{}'", camera)
            }
            CaptureError::CameraPermissionDenied => write!(f, "camera permission denied"),
            CaptureError::TransportError(reason) => write!(f, "transport error: {}", reason),
            CaptureError::ResolutionRejected(reason) => {
                write!(f, "code rejected by roster: {}", reason)
            }
            CaptureError::DuplicateSuppressed => write!(f, "duplicate submission suppressed"),
            CaptureError::SaveRejected(reason) => write!(f, "save rejected: {}", reason),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Returns the `CaptureError` carried anywhere in an error chain.
pub fn capture_error(err: &anyhow::Error) -> Option<&CaptureError> {
    err.downcast_ref::<CaptureError>()
        .or_else(|| err.chain().find_map(|cause| cause.downcast_ref::<CaptureError>()))
}
