use anyhow::{anyhow, Result};

use super::{CameraCapability, CameraDescriptor};
use crate::error::CaptureError;

const PREFERRED_LABEL_HINTS: [&str; 3] = ["back", "rear", "environment"];

/// Enumerated camera devices plus the current selection.
///
/// `selected` is always a valid index while `devices` is non-empty.
#[derive(Clone, Debug, Default)]
pub struct CameraRegistry {
    devices: Vec<CameraDescriptor>,
    selected: Option<usize>,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the device list with a fresh enumeration.
    ///
    /// Fails with `NoCameraAvailable` when the capability reports no devices;
    /// the previous list is kept in that case. Prefers a rear-facing device.
    pub fn enumerate(&mut self, capability: &mut dyn CameraCapability) -> Result<&[CameraDescriptor]> {
        let devices = capability.enumerate_devices()?;
        if devices.is_empty() {
            return Err(anyhow!(CaptureError::NoCameraAvailable));
        }
        log::debug!("enumerated cameras: {:?}", devices);
        self.selected = Some(preferred_index(&devices));
        self.devices = devices;
        Ok(&self.devices)
    }

    pub fn current_selection(&self) -> Result<&CameraDescriptor> {
        self.selected
            .and_then(|index| self.devices.get(index))
            .ok_or_else(|| anyhow!(CaptureError::NoSelection))
    }

    /// Rotate the selection forward by one.
    ///
    /// With one device or none there is nothing to switch to; the current
    /// selection is returned unchanged.
    pub fn advance_selection(&mut self) -> Option<&CameraDescriptor> {
        if self.devices.len() > 1 {
            let next = self.selected.map_or(0, |index| (index + 1) % self.devices.len());
            self.selected = Some(next);
        }
        self.selected.and_then(|index| self.devices.get(index))
    }

    pub fn devices(&self) -> &[CameraDescriptor] {
        &self.devices
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn can_switch(&self) -> bool {
        self.devices.len() > 1
    }
}

fn preferred_index(devices: &[CameraDescriptor]) -> usize {
    devices
        .iter()
        .position(|device| {
            let label = device.label.to_lowercase();
            PREFERRED_LABEL_HINTS.iter().any(|hint| label.contains(hint))
        })
        .unwrap_or(0)
}
