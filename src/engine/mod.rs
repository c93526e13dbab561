//! External configuration engine
//!
//! The engine parses the metadata and writes the distro network files.
//! glean-boot only decides how it is called: one attempt per invocation,
//! no retries, and its exit status becomes ours.

pub mod mock;

use crate::BootError;
use crate::config::EngineConfig;
use crate::plan::EngineInvocation;
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Exit status of one engine run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus {
    code: u8,
}

impl EngineStatus {
    pub const SUCCESS: Self = Self { code: 0 };

    pub fn from_code(code: u8) -> Self {
        Self { code }
    }

    /// Convert a child exit status, using `128 + signal` for a killed child
    pub fn from_exit_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self {
                code: u8::try_from(code & 0xff).unwrap_or(1),
            };
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self {
                    code: u8::try_from(128 + signal).unwrap_or(255),
                };
            }
        }

        Self { code: 1 }
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Trait for engine runners
#[async_trait]
pub trait EngineRunner: Send + Sync {
    /// Run the engine once with the invocation's arguments
    async fn run(&self, invocation: &EngineInvocation) -> Result<EngineStatus, BootError>;
}

/// Runs the engine as a child process
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    search_path: String,
}

impl CommandEngine {
    pub fn new(config: &EngineConfig, search_path: impl Into<String>) -> Self {
        Self {
            program: config.program.clone(),
            search_path: search_path.into(),
        }
    }
}

#[async_trait]
impl EngineRunner for CommandEngine {
    async fn run(&self, invocation: &EngineInvocation) -> Result<EngineStatus, BootError> {
        info!(
            "Running {} pass: {} {}",
            invocation.purpose,
            self.program,
            invocation.args.join(" ")
        );

        // The engine's own output goes straight to the journal
        let status = Command::new(&self.program)
            .args(&invocation.args)
            .env("PATH", &self.search_path)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| BootError::engine(&self.program, e))?;

        let status = EngineStatus::from_exit_status(status);
        if status.success() {
            debug!("{} pass completed", invocation.purpose);
        } else {
            warn!(
                "{} pass failed: {} exited with status {}",
                invocation.purpose,
                self.program,
                status.code()
            );
        }
        Ok(status)
    }
}
