//! Mock probe and mounter for testing
//!
//! # Example
//! ```
//! use glean_boot::volume::mock::MockProbe;
//!
//! let probe = MockProbe::new().with_device("config-2", "/dev/sr0", "iso9660");
//! ```

use super::mount::{MountOptions, Mounter};
use super::{BlockDevice, BlockProbe};
use crate::BootError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Probe answering from a fixed label table
#[derive(Debug, Default)]
pub struct MockProbe {
    devices: HashMap<String, BlockDevice>,
    errors: HashMap<String, String>,
    probed: Mutex<Vec<String>>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device carrying `label`
    pub fn with_device(mut self, label: &str, path: &str, fs_type: &str) -> Self {
        self.devices.insert(
            label.to_string(),
            BlockDevice {
                path: PathBuf::from(path),
                fs_type: Some(fs_type.to_string()),
            },
        );
        self
    }

    /// Make probing for `label` fail
    pub fn with_error(mut self, label: &str, message: &str) -> Self {
        self.errors.insert(label.to_string(), message.to_string());
        self
    }

    /// Labels probed so far, in order
    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BlockProbe for MockProbe {
    async fn probe_by_label(&self, label: &str) -> Result<Option<BlockDevice>, BootError> {
        if let Ok(mut probed) = self.probed.lock() {
            probed.push(label.to_string());
        }

        if let Some(message) = self.errors.get(label) {
            return Err(BootError::Command(message.clone()));
        }

        Ok(self.devices.get(label).cloned())
    }
}

/// A recorded mount call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountCall {
    pub device: PathBuf,
    pub mount_point: PathBuf,
    pub options: MountOptions,
}

/// Mounter that records calls and optionally fails
#[derive(Debug, Default)]
pub struct MockMounter {
    failure: Option<String>,
    calls: Mutex<Vec<MountCall>>,
}

impl MockMounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every mount with `message`
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Mount calls so far, in order
    pub fn calls(&self) -> Vec<MountCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mounter for MockMounter {
    async fn mount(
        &self,
        device: &Path,
        mount_point: &Path,
        options: &MountOptions,
    ) -> Result<(), BootError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MountCall {
                device: device.to_path_buf(),
                mount_point: mount_point.to_path_buf(),
                options: options.clone(),
            });
        }

        match &self.failure {
            Some(message) => Err(BootError::Command(message.clone())),
            None => Ok(()),
        }
    }
}
