//! Attendance capture
//!
//! This crate drives QR-based attendance capture: a camera session decodes a
//! code, the roster service resolves it to one or more names, the operator
//! confirms a name and a uniform-compliance state, and the record is saved.
//!
//! # Architecture
//!
//! The capture pipeline holds these guarantees:
//!
//! 1. **Single stream**: at most one decode stream is attached at any time;
//!    a new attach always follows full teardown of the previous one.
//! 2. **No stale decodes**: a decode from a stopped or replaced session never
//!    reaches the roster service.
//! 3. **Global debounce**: accepted submissions are at least two seconds
//!    apart, across all identities.
//! 4. **Always recoverable**: every failure leaves the controller idle or
//!    resumable; nothing is fatal.
//!
//! # Module Structure
//!
//! - `camera`: capability seam, device registry, scanner session, stub camera
//! - `resolution`: decoded text → single / ambiguous / rejected
//! - `confirmation`: identity and compliance selection steps
//! - `submission`: debounced save and response interpretation
//! - `controller`: the owning session context, event pump and timers
//! - `remote`: roster service seam and its HTTP implementation
//! - `config`, `notify`, `clock`, `ui`: ambient plumbing

pub mod camera;
pub mod clock;
pub mod config;
pub mod confirmation;
pub mod controller;
pub mod error;
pub mod notify;
pub mod remote;
pub mod resolution;
pub mod submission;
pub mod ui;

pub use camera::{
    CameraCapability, CameraDescriptor, CameraFault, CameraRegistry, ScanConfig, ScanEvent,
    ScannerSession, SessionState, StubCamera,
};
pub use clock::{Clock, ManualClock, Scheduler, SystemClock};
pub use config::ScannerConfig;
pub use confirmation::{ComplianceState, ConfirmationFlow, ConfirmationState, FlowStep};
pub use controller::{CaptureController, Placeholder};
pub use error::CaptureError;
pub use notify::{LogNotifier, Notifier, RecordingNotifier, Severity};
pub use remote::{AttendanceEndpoint, AttendanceRecord, HttpEndpoint, ScriptedEndpoint};
pub use resolution::{ResolutionPipeline, ResolutionResult};
pub use submission::{SubmissionGuard, DEBOUNCE_WINDOW};
pub use ui::{ModalView, Stage, ViewState};
