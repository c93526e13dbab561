//! Recording engine for testing
//!
//! # Example
//! ```
//! use glean_boot::engine::mock::RecordingEngine;
//! use glean_boot::plan::Purpose;
//!
//! let engine = RecordingEngine::new().with_status(Purpose::Network, 3);
//! assert!(engine.calls().is_empty());
//! ```

use super::{EngineRunner, EngineStatus};
use crate::BootError;
use crate::plan::{EngineInvocation, Purpose};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Engine that records invocations instead of running anything
#[derive(Debug, Default)]
pub struct RecordingEngine {
    statuses: HashMap<Purpose, u8>,
    spawn_error: bool,
    calls: Mutex<Vec<EngineInvocation>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit with `code` for every invocation of `purpose`
    pub fn with_status(mut self, purpose: Purpose, code: u8) -> Self {
        self.statuses.insert(purpose, code);
        self
    }

    /// Fail to start, as if the engine binary were missing
    pub fn missing(mut self) -> Self {
        self.spawn_error = true;
        self
    }

    /// Invocations so far, in order
    pub fn calls(&self) -> Vec<EngineInvocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EngineRunner for RecordingEngine {
    async fn run(&self, invocation: &EngineInvocation) -> Result<EngineStatus, BootError> {
        if self.spawn_error {
            return Err(BootError::engine(
                "glean",
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }

        let code = self.statuses.get(&invocation.purpose).copied().unwrap_or(0);
        Ok(EngineStatus::from_code(code))
    }
}
