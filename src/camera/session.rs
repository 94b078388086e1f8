use anyhow::Result;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;

use super::{is_permission_denied, AttachHandle, CameraCapability, CameraDescriptor, ScanConfig};
use crate::clock::Clock;
use crate::error::CaptureError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
}

/// One successful decode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanEvent {
    pub raw_text: String,
    pub timestamp: Instant,
}

/// A decode as delivered through the event channel, tagged with the
/// generation of the session that produced it.
#[derive(Clone, Debug)]
pub struct DecodeMessage {
    pub generation: u64,
    pub event: ScanEvent,
}

/// Lifecycle of a single decode stream bound to one camera.
///
/// Each successful `start` bumps the generation; decode messages from any
/// other generation, or arriving while not `Active`, are not actionable.
#[derive(Debug)]
pub struct ScannerSession {
    state: SessionState,
    handle: Option<AttachHandle>,
    camera: Option<CameraDescriptor>,
    generation: u64,
}

impl ScannerSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            handle: None,
            camera: None,
            generation: 0,
        }
    }

    /// Attach `camera` and forward its decodes into `events`.
    ///
    /// A running stream is torn down first; the capability never sees two
    /// attaches from this session at once. On attach failure the session is
    /// back to `Idle` and the error carries `CaptureError::CameraAttachError`.
    pub fn start(
        &mut self,
        capability: &mut dyn CameraCapability,
        camera: &CameraDescriptor,
        config: &ScanConfig,
        events: Sender<DecodeMessage>,
        clock: Arc<dyn Clock>,
    ) -> Result<()> {
        if self.handle.is_some() || self.state != SessionState::Idle {
            self.stop(capability);
        }

        self.state = SessionState::Starting;
        self.generation += 1;
        let generation = self.generation;

        let on_decode = Box::new(move |raw_text: String| {
            let message = DecodeMessage {
                generation,
                event: ScanEvent {
                    raw_text,
                    timestamp: clock.now(),
                },
            };
            // Receiver gone means the controller is shutting down.
            let _ = events.send(message);
        });
        // Frames without a code are the normal case while aiming.
        let on_no_decode = Box::new(|_reason: String| {});

        match capability.attach(&camera.id, config, on_decode, on_no_decode) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.camera = Some(camera.clone());
                self.state = SessionState::Active;
                log::info!(
                    "scanner session {} active on '{}'",
                    generation,
                    camera.label
                );
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::Idle;
                self.camera = None;
                let failure = if is_permission_denied(&err) {
                    CaptureError::CameraPermissionDenied
                } else {
                    CaptureError::CameraAttachError(camera.label.clone())
                };
                Err(err.context(failure))
            }
        }
    }

    /// Tear down the stream. Calling this while idle is a no-op; a detach
    /// failure is logged and the session still ends up `Idle`.
    pub fn stop(&mut self, capability: &mut dyn CameraCapability) {
        let Some(handle) = self.handle.take() else {
            self.state = SessionState::Idle;
            return;
        };
        self.state = SessionState::Stopping;
        if let Err(err) = capability.detach(handle) {
            log::warn!("error stopping scanner session {}: {:#}", self.generation, err);
        } else {
            log::debug!("scanner session {} stopped", self.generation);
        }
        self.camera = None;
        self.state = SessionState::Idle;
    }

    /// Whether a decode from `generation` belongs to the live stream.
    pub fn accepts(&self, generation: u64) -> bool {
        self.state == SessionState::Active && generation == self.generation
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn camera(&self) -> Option<&CameraDescriptor> {
        self.camera.as_ref()
    }
}

impl Default for ScannerSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraFault, StubCall, StubCamera};
    use crate::clock::ManualClock;
    use crate::error::capture_error;
    use std::sync::mpsc;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new())
    }

    #[test]
    fn restart_detaches_before_attaching_again() {
        let mut camera = StubCamera::with_labels(&["front", "back"]);
        let devices = camera.enumerate_devices().unwrap();
        let (tx, _rx) = mpsc::channel();
        let mut session = ScannerSession::new();
        let config = ScanConfig::default();

        session
            .start(&mut camera, &devices[0], &config, tx.clone(), clock())
            .unwrap();
        session
            .start(&mut camera, &devices[1], &config, tx, clock())
            .unwrap();

        assert_eq!(camera.max_active(), 1);
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.camera().unwrap().label, "back");
        assert_eq!(
            &camera.calls()[1..],
            &[
                StubCall::Attach {
                    device_id: "stub://camera/0".into()
                },
                StubCall::Detach {
                    handle: AttachHandle(0)
                },
                StubCall::Attach {
                    device_id: "stub://camera/1".into()
                },
            ]
        );
    }

    #[test]
    fn attach_failure_returns_to_idle() {
        let mut camera = StubCamera::with_labels(&["back"]);
        let devices = camera.enumerate_devices().unwrap();
        camera.fail_next_attach(CameraFault::PermissionDenied);
        let (tx, _rx) = mpsc::channel();
        let mut session = ScannerSession::new();

        let err = session
            .start(&mut camera, &devices[0], &ScanConfig::default(), tx, clock())
            .unwrap_err();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(is_permission_denied(&err));
        assert_eq!(
            capture_error(&err),
            Some(&CaptureError::CameraPermissionDenied)
        );

        camera.fail_next_attach(CameraFault::Device("device busy".into()));
        let (tx, _rx) = mpsc::channel();
        let err = session
            .start(&mut camera, &devices[0], &ScanConfig::default(), tx, clock())
            .unwrap_err();
        assert!(!is_permission_denied(&err));
        assert_eq!(
            capture_error(&err),
            Some(&CaptureError::CameraAttachError("back".into()))
        );
        assert!(format!("{:#}", err).contains("device busy"));
    }

    #[test]
    fn stop_is_idempotent_and_forces_idle() {
        let mut camera = StubCamera::with_labels(&["back"]);
        let devices = camera.enumerate_devices().unwrap();
        let (tx, _rx) = mpsc::channel();
        let mut session = ScannerSession::new();

        session.stop(&mut camera);
        assert_eq!(session.state(), SessionState::Idle);

        session
            .start(&mut camera, &devices[0], &ScanConfig::default(), tx, clock())
            .unwrap();
        camera.fail_next_detach(CameraFault::Device("usb reset".into()));
        session.stop(&mut camera);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(camera.active_count(), 0);

        session.stop(&mut camera);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn decodes_carry_generation_and_no_decode_is_silent() {
        let mut camera = StubCamera::with_labels(&["back"]);
        let devices = camera.enumerate_devices().unwrap();
        let (tx, rx) = mpsc::channel();
        let mut session = ScannerSession::new();
        session
            .start(&mut camera, &devices[0], &ScanConfig::default(), tx, clock())
            .unwrap();

        camera.emit_no_decode();
        assert!(rx.try_recv().is_err());

        assert!(camera.emit_decode("EMP-0042"));
        let message = rx.try_recv().unwrap();
        assert_eq!(message.event.raw_text, "EMP-0042");
        assert!(session.accepts(message.generation));

        session.stop(&mut camera);
        assert!(!session.accepts(message.generation));
    }
}
