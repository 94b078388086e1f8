//! Capture controller: the single owner of the scanning context.
//!
//! Everything mutable about a capture session lives here: the camera
//! registry and the one `ScannerSession`, the scanning flag, confirmation
//! selections, the submission debounce and pending timers. Collaborators
//! (camera, roster endpoint, notifier, clock) are injected.
//!
//! Decodes arrive over a channel fed by the capability's callback and are
//! processed in `pump()`, together with any timers that fell due. A decode
//! from a stopped or replaced session is discarded there.

use anyhow::Result;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::camera::session::DecodeMessage;
use crate::camera::{
    is_not_running, is_permission_denied, CameraCapability, CameraDescriptor, CameraRegistry,
    ScanConfig, ScanEvent, ScannerSession, SessionState,
};
use crate::clock::{Clock, Scheduler};
use crate::confirmation::{
    ComplianceState, ConfirmationFlow, ConfirmationState, FlowOutcome, FlowStep, FlowTimer,
};
use crate::error::{capture_error, CaptureError};
use crate::notify::{Notifier, Severity, DEFAULT_NOTIFY_DURATION};
use crate::remote::AttendanceEndpoint;
use crate::resolution::{ResolutionPipeline, ResolutionResult};
use crate::submission::SubmissionGuard;
use crate::ui::{ModalView, Stage, Ui, ViewState};

/// Delay before the scanner comes back after a rejected code.
pub const RESOLUTION_RETRY_DELAY: Duration = Duration::from_millis(1000);
/// Delay before the scanner comes back after a recorded attendance.
pub const SAVE_RESTART_DELAY: Duration = Duration::from_millis(1000);
const SCAN_NOTIFY_DURATION: Duration = Duration::from_millis(2000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Deferred {
    RestartScanning,
    Flow(FlowTimer),
}

/// What the capture surface shows while no stream is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placeholder {
    /// Start failed; the operator has to press start again.
    AwaitingStart,
    /// Stopped normally.
    Ready,
}

impl Placeholder {
    pub fn text(self) -> &'static str {
        match self {
            Placeholder::AwaitingStart => "Click Start to begin",
            Placeholder::Ready => "Ready to scan",
        }
    }
}

pub struct CaptureController {
    camera: Box<dyn CameraCapability>,
    notifier: Box<dyn Notifier>,
    clock: Arc<dyn Clock>,
    scan_config: ScanConfig,
    ui: Option<Ui>,
    registry: CameraRegistry,
    session: ScannerSession,
    pipeline: ResolutionPipeline,
    flow: ConfirmationFlow,
    guard: SubmissionGuard,
    scheduler: Scheduler<Deferred>,
    decode_tx: Sender<DecodeMessage>,
    decode_rx: Receiver<DecodeMessage>,
    scanning: bool,
    placeholder: Option<Placeholder>,
    last_scan: Option<ScanEvent>,
}

impl CaptureController {
    pub fn new(
        camera: Box<dyn CameraCapability>,
        endpoint: Arc<dyn AttendanceEndpoint>,
        notifier: Box<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (decode_tx, decode_rx) = mpsc::channel();
        Self {
            camera,
            notifier,
            clock,
            scan_config: ScanConfig::default(),
            ui: None,
            registry: CameraRegistry::new(),
            session: ScannerSession::new(),
            pipeline: ResolutionPipeline::new(endpoint.clone()),
            flow: ConfirmationFlow::new(),
            guard: SubmissionGuard::new(endpoint),
            scheduler: Scheduler::new(),
            decode_tx,
            decode_rx,
            scanning: false,
            placeholder: Some(Placeholder::Ready),
            last_scan: None,
        }
    }

    pub fn with_scan_config(mut self, scan_config: ScanConfig) -> Self {
        self.scan_config = scan_config;
        self
    }

    /// Show progress for network round-trips on the terminal.
    pub fn with_ui(mut self, ui: Ui) -> Self {
        self.ui = Some(ui);
        self
    }

    /// Enumerate cameras, reporting failures to the operator.
    pub fn refresh_cameras(&mut self) -> Result<&[CameraDescriptor]> {
        match self.registry.enumerate(self.camera.as_mut()) {
            Ok(devices) => {
                log::info!("available cameras: {}", devices.len());
                Ok(devices)
            }
            Err(err) => {
                log::error!("error getting cameras: {:#}", err);
                let message = match capture_error(&err) {
                    Some(CaptureError::NoCameraAvailable) => "No cameras detected",
                    _ => "Error detecting cameras",
                };
                self.notifier
                    .notify(message, Severity::Error, DEFAULT_NOTIFY_DURATION);
                Err(err)
            }
        }
    }

    /// Attach the selected camera, enumerating first if needed.
    ///
    /// On failure the controller is idle with the "start" placeholder up;
    /// the error is reported unless it is a permission denial.
    pub fn start_scanning(&mut self) -> Result<()> {
        if self.registry.is_empty() {
            if let Err(err) = self.refresh_cameras().map(|_| ()) {
                self.settle_idle(Placeholder::AwaitingStart);
                return Err(err);
            }
        }
        self.attach_selected()
            .map_err(|err| self.report_start_failure(err, false))
    }

    pub fn stop_scanning(&mut self) {
        let was_scanning = self.scanning;
        self.session.stop(self.camera.as_mut());
        self.scanning = false;
        if was_scanning {
            self.placeholder = Some(Placeholder::Ready);
        }
    }

    /// Move to the next camera. With one camera (or none) this does nothing.
    pub fn switch_camera(&mut self) -> Result<()> {
        if !self.registry.can_switch() {
            return Ok(());
        }
        self.session.stop(self.camera.as_mut());
        self.scanning = false;
        if let Some(camera) = self.registry.advance_selection() {
            log::info!("switching to camera '{}'", camera.label);
        }
        self.attach_selected()
            .map_err(|err| self.report_start_failure(err, true))
    }

    /// Process queued decodes, then every timer that is due. Returns the
    /// number of items handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.decode_rx.try_recv() {
            self.on_decode(message);
            handled += 1;
        }
        while let Some(action) = self.scheduler.pop_due(self.clock.now()) {
            self.run_deferred(action);
            handled += 1;
        }
        handled
    }

    /// Operator picked the candidate at `index` (zero-based).
    pub fn select_candidate(&mut self, index: usize) -> Result<()> {
        let timer = self.flow.select_candidate(index)?;
        self.schedule(timer.delay(), Deferred::Flow(timer));
        Ok(())
    }

    pub fn select_compliance(&mut self, compliance: ComplianceState) -> Result<()> {
        let timer = self.flow.select_compliance(compliance)?;
        self.schedule(timer.delay(), Deferred::Flow(timer));
        Ok(())
    }

    /// Close the open confirmation step. Scanning stays off until the
    /// operator starts it again.
    pub fn dismiss(&mut self) {
        if self.flow.dismiss() {
            self.last_scan = None;
            log::info!("confirmation dismissed");
        }
    }

    pub fn on_visibility_restored(&self) {
        if !self.scanning {
            log::info!("visible again, ready to start scanner");
        }
    }

    /// Release the camera and drop in-progress selections.
    pub fn shutdown(&mut self) {
        self.session.stop(self.camera.as_mut());
        self.scanning = false;
        self.flow.reset();
        log::info!("capture controller shut down");
    }

    pub fn view(&self) -> ViewState {
        let modal = match self.flow.step() {
            FlowStep::Closed => ModalView::Closed,
            FlowStep::Identity {
                candidates,
                highlighted,
            } => ModalView::Names {
                candidates: candidates.clone(),
                highlighted: *highlighted,
            },
            FlowStep::Compliance {
                identity,
                highlighted,
            } => ModalView::Compliance {
                identity: identity.clone(),
                options: ComplianceState::ALL.to_vec(),
                highlighted: *highlighted,
            },
        };
        ViewState {
            scanning: self.scanning,
            placeholder: self.placeholder.map(Placeholder::text),
            camera_label: self.session.camera().map(|camera| camera.label.clone()),
            can_switch: self.registry.can_switch(),
            last_scan: self.last_scan.as_ref().map(|scan| scan.raw_text.clone()),
            modal,
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn cameras(&self) -> &[CameraDescriptor] {
        self.registry.devices()
    }

    pub fn confirmation(&self) -> &ConfirmationState {
        self.flow.state()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_due()
    }

    fn attach_selected(&mut self) -> Result<()> {
        self.session.stop(self.camera.as_mut());
        self.scanning = false;
        let camera = self.registry.current_selection()?.clone();
        self.session.start(
            self.camera.as_mut(),
            &camera,
            &self.scan_config,
            self.decode_tx.clone(),
            self.clock.clone(),
        )?;
        self.scanning = true;
        self.placeholder = None;
        Ok(())
    }

    fn report_start_failure(&mut self, err: anyhow::Error, switching: bool) -> anyhow::Error {
        log::error!("scanner start error: {:#}", err);
        self.session.stop(self.camera.as_mut());
        self.settle_idle(Placeholder::AwaitingStart);
        if is_permission_denied(&err) {
            log::info!("camera permission denied; waiting for operator");
        } else if switching && is_not_running(&err) {
            log::debug!("camera switch raced a stopped stream");
        } else {
            self.notifier.notify(
                &format!("Camera error: {:#}", err),
                Severity::Error,
                DEFAULT_NOTIFY_DURATION,
            );
        }
        err
    }

    fn settle_idle(&mut self, placeholder: Placeholder) {
        self.scanning = false;
        self.placeholder = Some(placeholder);
    }

    fn on_decode(&mut self, message: DecodeMessage) {
        if !self.scanning || !self.session.accepts(message.generation) {
            log::debug!(
                "discarding decode from inactive session {}",
                message.generation
            );
            return;
        }
        self.stop_scanning();
        self.notifier
            .notify("QR Code scanned!", Severity::Success, SCAN_NOTIFY_DURATION);

        let raw_text = message.event.raw_text.clone();
        self.last_scan = Some(message.event);
        let result = {
            let _stage = self.ui.as_ref().map(|ui| ui.stage(Stage::ResolvingCode));
            self.pipeline.resolve(&raw_text)
        };
        self.route_resolution(result);
    }

    fn route_resolution(&mut self, result: ResolutionResult) {
        match result {
            ResolutionResult::Single(identity) => {
                log::info!("code resolved to a single name");
                self.flow.begin_single(identity);
            }
            ResolutionResult::Ambiguous(candidates) => {
                log::info!("code resolved to {} candidate names", candidates.len());
                if let Err(err) = self.flow.begin_ambiguous(candidates) {
                    log::warn!("cannot open name selection: {:#}", err);
                }
            }
            ResolutionResult::Rejected(reason) => {
                log::warn!("{}", CaptureError::ResolutionRejected(reason.clone()));
                self.notifier
                    .notify(&reason, Severity::Error, DEFAULT_NOTIFY_DURATION);
                self.last_scan = None;
                self.schedule(RESOLUTION_RETRY_DELAY, Deferred::RestartScanning);
            }
        }
    }

    fn run_deferred(&mut self, action: Deferred) {
        match action {
            Deferred::RestartScanning => {
                if self.scanning || self.flow.is_open() {
                    log::debug!("scheduled restart skipped");
                    return;
                }
                if let Err(err) = self.start_scanning() {
                    log::warn!("scheduled restart failed: {:#}", err);
                }
            }
            Deferred::Flow(timer) => match self.flow.on_timer(timer) {
                FlowOutcome::Stale => log::debug!("ignoring superseded {:?}", timer),
                FlowOutcome::Advanced => log::debug!("advanced to compliance step"),
                FlowOutcome::Submit(state) => self.submit(state),
            },
        }
    }

    fn submit(&mut self, state: ConfirmationState) {
        let now = self.clock.now();
        let outcome = {
            let _stage = self.ui.as_ref().map(|ui| ui.stage(Stage::SavingAttendance));
            self.guard.submit(state, now)
        };
        match outcome {
            Ok(record) => {
                self.notifier.notify(
                    &format!("Attendance for {} recorded successfully", record.identity),
                    Severity::Success,
                    DEFAULT_NOTIFY_DURATION,
                );
                self.reset_form();
            }
            Err(rejected) if !rejected.error.is_user_visible() => {
                log::debug!("submission not sent: {}", rejected.error);
                self.flow.restore(rejected.state);
            }
            Err(rejected) => {
                log::error!("save error: {}", rejected.error);
                self.notifier.notify(
                    "Save failed - please try again",
                    Severity::Error,
                    DEFAULT_NOTIFY_DURATION,
                );
                self.flow.restore(rejected.state);
            }
        }
    }

    fn reset_form(&mut self) {
        self.last_scan = None;
        self.flow.reset();
        self.schedule(SAVE_RESTART_DELAY, Deferred::RestartScanning);
    }

    fn schedule(&mut self, delay: Duration, action: Deferred) {
        let due = self.clock.now() + delay;
        self.scheduler.schedule(due, action);
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.session.stop(self.camera.as_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::StubCamera;
    use crate::clock::ManualClock;
    use crate::notify::RecordingNotifier;
    use crate::remote::ScriptedEndpoint;

    fn controller(labels: &[&str]) -> (CaptureController, StubCamera, Arc<ManualClock>) {
        let camera = StubCamera::with_labels(labels);
        let clock = Arc::new(ManualClock::new());
        let controller = CaptureController::new(
            Box::new(camera.clone()),
            Arc::new(ScriptedEndpoint::new()),
            Box::new(RecordingNotifier::new()),
            clock.clone(),
        );
        (controller, camera, clock)
    }

    #[test]
    fn idle_view_before_start() {
        let (controller, _camera, _clock) = controller(&["Front Camera", "Back Camera"]);
        let view = controller.view();
        assert!(!view.scanning);
        assert_eq!(view.placeholder, Some(Placeholder::Ready.text()));
        assert_eq!(view.modal, ModalView::Closed);
        assert!(!view.can_switch);
    }

    #[test]
    fn visibility_never_starts_the_camera() {
        let (controller, camera, _clock) = controller(&["Back Camera"]);
        controller.on_visibility_restored();
        assert_eq!(camera.attach_count(), 0);
        assert_eq!(controller.session_state(), SessionState::Idle);
    }

    #[test]
    fn rejection_timer_is_visible_as_next_deadline() {
        let (mut controller, camera, clock) = controller(&["Back Camera"]);
        controller.start_scanning().unwrap();
        assert_eq!(controller.session_state(), SessionState::Active);

        assert!(camera.emit_decode("EMP-1"));
        controller.pump();

        assert_eq!(
            controller.next_deadline(),
            Some(clock.now() + RESOLUTION_RETRY_DELAY)
        );
        clock.advance(RESOLUTION_RETRY_DELAY);
        assert_eq!(controller.pump(), 1);
        assert!(controller.is_scanning());
        assert_eq!(controller.next_deadline(), None);
    }

    #[test]
    fn drop_detaches_the_stream() {
        let (mut controller, camera, _clock) = controller(&["Back Camera"]);
        controller.start_scanning().unwrap();
        assert_eq!(camera.active_count(), 1);
        drop(controller);
        assert_eq!(camera.active_count(), 0);
    }
}
