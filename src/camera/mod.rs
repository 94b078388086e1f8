//! Camera capability and session plumbing.
//!
//! This module provides:
//! - The `CameraCapability` seam over the platform camera/decoder
//! - `CameraRegistry` (device enumeration + selection)
//! - `ScannerSession` (one decode stream bound to one device)
//! - `StubCamera` (scripted capability for tests and the operator console)
//!
//! The capability layer is responsible for:
//! - Listing devices in whatever order the platform reports them
//! - Attaching a decode stream with the fixed `ScanConfig`
//! - Invoking the decode callback with raw decoded text
//!
//! The capability layer MUST NOT:
//! - Hold more than one attach per session handle
//! - Treat "no code in this frame" as an error
//! - Interpret decoded text

use anyhow::Result;
use std::fmt;

pub mod registry;
pub mod session;
pub mod stub;

pub use registry::CameraRegistry;
pub use session::{ScanEvent, ScannerSession, SessionState};
pub use stub::{StubCall, StubCamera};

/// One enumerated camera device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraDescriptor {
    /// Opaque device identifier handed back to `attach`.
    pub id: String,
    /// Human-readable label, used to prefer rear-facing devices.
    pub label: String,
}

impl CameraDescriptor {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Decoder settings passed on every attach.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanConfig {
    pub fps: u32,
    /// Side of the square detection box, in pixels.
    pub qrbox: u32,
    pub aspect_ratio: f32,
    pub show_torch_button_if_supported: bool,
    /// Mirrored codes are decoded unless this is set.
    pub disable_flip: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            fps: 10,
            qrbox: 250,
            aspect_ratio: 1.0,
            show_torch_button_if_supported: true,
            disable_flip: false,
        }
    }
}

/// Opaque handle to an attached decode stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttachHandle(pub u64);

/// Fired with the raw text of each decoded code.
pub type DecodeCallback = Box<dyn FnMut(String) + Send>;
/// Fired for frames without a readable code.
pub type NoDecodeCallback = Box<dyn FnMut(String) + Send>;

/// Typed faults a capability may report instead of free-form errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraFault {
    PermissionDenied,
    /// Stop/detach raced with a stream that was already gone.
    NotRunning,
    Device(String),
}

impl fmt::Display for CameraFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraFault::PermissionDenied => write!(f, "Permission denied"),
            CameraFault::NotRunning => write!(f, "Scanner is not running"),
            CameraFault::Device(reason) => write!(f, "{}", reason),
        }
    }
}

impl std::error::Error for CameraFault {}

/// The platform camera/decoder, consumed but not implemented here.
pub trait CameraCapability {
    fn enumerate_devices(&mut self) -> Result<Vec<CameraDescriptor>>;

    fn attach(
        &mut self,
        device_id: &str,
        config: &ScanConfig,
        on_decode: DecodeCallback,
        on_no_decode: NoDecodeCallback,
    ) -> Result<AttachHandle>;

    fn detach(&mut self, handle: AttachHandle) -> Result<()>;
}

fn has_fault(err: &anyhow::Error, fault: &CameraFault) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<CameraFault>() == Some(fault))
        || err.downcast_ref::<CameraFault>() == Some(fault)
}

/// Permission denial is expected and never shown to the operator.
pub fn is_permission_denied(err: &anyhow::Error) -> bool {
    has_fault(err, &CameraFault::PermissionDenied)
        || matches!(
            crate::error::capture_error(err),
            Some(crate::error::CaptureError::CameraPermissionDenied)
        )
}

pub fn is_not_running(err: &anyhow::Error) -> bool {
    has_fault(err, &CameraFault::NotRunning)
}
