//! Scripted camera capability.
//!
//! `StubCamera` stands in for the platform camera the way `stub://` URLs stand
//! in for real streams: devices are a fixed list, "frames" are decoded strings
//! pushed in by the caller, and faults can be queued for the next call.
//! Clones share state, so a test (or the operator console) keeps a handle
//! while the controller owns another.

use anyhow::{anyhow, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    AttachHandle, CameraCapability, CameraDescriptor, CameraFault, DecodeCallback,
    NoDecodeCallback, ScanConfig,
};

/// Every capability call, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StubCall {
    Enumerate,
    Attach { device_id: String },
    Detach { handle: AttachHandle },
}

struct Stream {
    device_id: String,
    on_decode: DecodeCallback,
    on_no_decode: NoDecodeCallback,
}

#[derive(Default)]
struct StubState {
    devices: Vec<CameraDescriptor>,
    enumerate_faults: VecDeque<CameraFault>,
    attach_faults: VecDeque<CameraFault>,
    detach_faults: VecDeque<CameraFault>,
    streams: HashMap<AttachHandle, Stream>,
    /// Last detached stream; its callback can still fire before teardown settles.
    lingering: Option<Stream>,
    calls: Vec<StubCall>,
    next_handle: u64,
    max_active: usize,
}

#[derive(Clone, Default)]
pub struct StubCamera {
    inner: Arc<Mutex<StubState>>,
}

impl StubCamera {
    pub fn new(devices: Vec<CameraDescriptor>) -> Self {
        let camera = Self::default();
        camera.state().devices = devices;
        camera
    }

    /// Devices with ids `stub://camera/<n>` and the given labels.
    pub fn with_labels(labels: &[&str]) -> Self {
        Self::new(
            labels
                .iter()
                .enumerate()
                .map(|(index, label)| CameraDescriptor::new(format!("stub://camera/{}", index), *label))
                .collect(),
        )
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_devices(&self, devices: Vec<CameraDescriptor>) {
        self.state().devices = devices;
    }

    pub fn fail_next_enumerate(&self, fault: CameraFault) {
        self.state().enumerate_faults.push_back(fault);
    }

    pub fn fail_next_attach(&self, fault: CameraFault) {
        self.state().attach_faults.push_back(fault);
    }

    pub fn fail_next_detach(&self, fault: CameraFault) {
        self.state().detach_faults.push_back(fault);
    }

    /// Deliver a decoded code to every attached stream. Returns false when
    /// nothing is attached.
    pub fn emit_decode(&self, text: &str) -> bool {
        let mut state = self.state();
        let mut delivered = false;
        for stream in state.streams.values_mut() {
            (stream.on_decode)(text.to_string());
            delivered = true;
        }
        delivered
    }

    /// Deliver a frame with no readable code.
    pub fn emit_no_decode(&self) {
        let mut state = self.state();
        for stream in state.streams.values_mut() {
            (stream.on_no_decode)("No QR code found".to_string());
        }
    }

    /// Fire the callback of the most recently detached stream, as a decoder
    /// does when a frame was mid-flight during teardown.
    pub fn emit_late_decode(&self, text: &str) -> bool {
        let mut state = self.state();
        match state.lingering.as_mut() {
            Some(stream) => {
                (stream.on_decode)(text.to_string());
                true
            }
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<StubCall> {
        self.state().calls.clone()
    }

    pub fn attach_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, StubCall::Attach { .. }))
            .count()
    }

    pub fn active_count(&self) -> usize {
        self.state().streams.len()
    }

    /// Highest number of simultaneously attached streams ever observed.
    pub fn max_active(&self) -> usize {
        self.state().max_active
    }

    pub fn active_device(&self) -> Option<String> {
        self.state()
            .streams
            .values()
            .next()
            .map(|stream| stream.device_id.clone())
    }
}

impl CameraCapability for StubCamera {
    fn enumerate_devices(&mut self) -> Result<Vec<CameraDescriptor>> {
        let mut state = self.state();
        state.calls.push(StubCall::Enumerate);
        if let Some(fault) = state.enumerate_faults.pop_front() {
            return Err(anyhow!(fault));
        }
        Ok(state.devices.clone())
    }

    fn attach(
        &mut self,
        device_id: &str,
        config: &ScanConfig,
        on_decode: DecodeCallback,
        on_no_decode: NoDecodeCallback,
    ) -> Result<AttachHandle> {
        let mut state = self.state();
        state.calls.push(StubCall::Attach {
            device_id: device_id.to_string(),
        });
        if let Some(fault) = state.attach_faults.pop_front() {
            return Err(anyhow!(fault));
        }
        if !state.devices.iter().any(|device| device.id == device_id) {
            return Err(anyhow!(CameraFault::Device(format!(
                "unknown device '{}'",
                device_id
            ))));
        }
        let handle = AttachHandle(state.next_handle);
        state.next_handle += 1;
        state.streams.insert(
            handle,
            Stream {
                device_id: device_id.to_string(),
                on_decode,
                on_no_decode,
            },
        );
        state.max_active = state.max_active.max(state.streams.len());
        log::info!(
            "StubCamera: attached {} at {} fps (synthetic)",
            device_id,
            config.fps
        );
        Ok(handle)
    }

    fn detach(&mut self, handle: AttachHandle) -> Result<()> {
        let mut state = self.state();
        state.calls.push(StubCall::Detach { handle });
        let stream = state.streams.remove(&handle);
        if let Some(fault) = state.detach_faults.pop_front() {
            state.lingering = stream;
            return Err(anyhow!(fault));
        }
        match stream {
            Some(stream) => {
                state.lingering = Some(stream);
                Ok(())
            }
            None => Err(anyhow!(CameraFault::NotRunning)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn attach(camera: &mut StubCamera, device_id: &str) -> (AttachHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel();
        let handle = camera
            .attach(
                device_id,
                &ScanConfig::default(),
                Box::new(move |text: String| {
                    let _ = tx.send(text);
                }),
                Box::new(|_: String| {}),
            )
            .expect("attach");
        (handle, rx)
    }

    #[test]
    fn detached_stream_lingers_for_late_decodes() {
        let mut camera = StubCamera::with_labels(&["back"]);
        let (handle, rx) = attach(&mut camera, "stub://camera/0");

        assert!(!camera.emit_late_decode("too early"));
        camera.detach(handle).unwrap();
        assert!(!camera.emit_decode("nobody listening"));
        assert!(camera.emit_late_decode("EMP-9"));
        assert_eq!(rx.try_recv().unwrap(), "EMP-9");
    }

    #[test]
    fn unknown_handles_and_devices_fail() {
        let mut camera = StubCamera::with_labels(&["back"]);
        let err = camera.detach(AttachHandle(7)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CameraFault>(),
            Some(&CameraFault::NotRunning)
        );

        let (tx, _rx) = mpsc::channel::<String>();
        let result = camera.attach(
            "stub://camera/9",
            &ScanConfig::default(),
            Box::new(move |text: String| {
                let _ = tx.send(text);
            }),
            Box::new(|_: String| {}),
        );
        assert!(result.is_err());
        assert_eq!(camera.active_count(), 0);
    }

    #[test]
    fn queued_faults_apply_once() {
        let mut camera = StubCamera::with_labels(&["back"]);
        camera.fail_next_enumerate(CameraFault::Device("bus reset".into()));
        assert!(camera.enumerate_devices().is_err());
        assert_eq!(camera.enumerate_devices().unwrap().len(), 1);

        camera.fail_next_attach(CameraFault::PermissionDenied);
        assert!(camera
            .attach(
                "stub://camera/0",
                &ScanConfig::default(),
                Box::new(|_: String| {}),
                Box::new(|_: String| {}),
            )
            .is_err());
        let (_handle, _rx) = attach(&mut camera, "stub://camera/0");
        assert_eq!(camera.active_device().as_deref(), Some("stub://camera/0"));
        assert_eq!(camera.attach_count(), 2);
    }
}
