//! Error types for glean-boot

use thiserror::Error;

/// Main error type for glean-boot operations
#[derive(Error, Debug)]
pub enum BootError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Command execution failed: {0}")]
    Command(String),

    #[error("Failed to start engine '{program}': {source}")]
    Engine {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Lock error for interface '{interface}': {message}")]
    Lock { interface: String, message: String },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl BootError {
    /// Create an engine spawn error
    pub fn engine(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Engine {
            program: program.into(),
            source,
        }
    }

    /// Create a lock error
    pub fn lock(interface: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lock {
            interface: interface.into(),
            message: message.into(),
        }
    }

    /// Process exit code to report for this error
    ///
    /// Follows the shell convention for commands that could not be run:
    /// 127 when the engine was not found, 126 when it could not be executed.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Engine { source, .. } if source.kind() == std::io::ErrorKind::NotFound => 127,
            Self::Engine { .. } => 126,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_engine_exit_codes() {
        let missing = BootError::engine("glean", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(missing.exit_code(), 127);

        let denied = BootError::engine("glean", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(denied.exit_code(), 126);

        assert_eq!(BootError::Config("bad".into()).exit_code(), 1);
    }

    #[test]
    fn test_lock_error_display() {
        let err = BootError::lock("eth0", "permission denied");
        assert_eq!(
            err.to_string(),
            "Lock error for interface 'eth0': permission denied"
        );
    }
}
