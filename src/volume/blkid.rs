//! blkid-backed block-device probe

use super::{BlockDevice, BlockProbe};
use crate::BootError;
use crate::config::DEFAULT_SEARCH_PATH;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, warn};

/// blkid exits with 2 when the requested token matched nothing
const BLKID_NOT_FOUND: i32 = 2;

/// Probe that shells out to util-linux `blkid`
#[derive(Debug, Clone)]
pub struct Blkid {
    program: String,
    search_path: String,
}

impl Blkid {
    pub fn new(search_path: impl Into<String>) -> Self {
        Self {
            program: "blkid".to_string(),
            search_path: search_path.into(),
        }
    }

    /// Use a different blkid executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Run blkid; `Ok(None)` when it reports no match
    async fn query(&self, args: &[&str]) -> Result<Option<String>, BootError> {
        debug!("Running {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .env("PATH", &self.search_path)
            .output()
            .await?;

        match output.status.code() {
            Some(0) => Ok(first_value(&String::from_utf8_lossy(&output.stdout))),
            Some(BLKID_NOT_FOUND) => Ok(None),
            code => Err(BootError::Command(format!(
                "{} {} exited with {:?}: {}",
                self.program,
                args.join(" "),
                code,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }
}

impl Default for Blkid {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_PATH)
    }
}

#[async_trait]
impl BlockProbe for Blkid {
    async fn probe_by_label(&self, label: &str) -> Result<Option<BlockDevice>, BootError> {
        let device = match self.query(&["-L", label]).await {
            Ok(Some(device)) => device,
            Ok(None) => return Ok(None),
            Err(BootError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                warn!("{} is not available, cannot probe for config drive", self.program);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        // A device without a detectable type still gets the default mount options
        let fs_type = match self.query(&["-s", "TYPE", "-o", "value", &device]).await {
            Ok(fs_type) => fs_type,
            Err(e) => {
                debug!("Could not determine filesystem type of {}: {}", device, e);
                None
            }
        };

        Ok(Some(BlockDevice {
            path: PathBuf::from(device),
            fs_type,
        }))
    }
}

/// First non-empty line of blkid output
fn first_value(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    /// Stand-in blkid that knows one labelled device
    fn fake_blkid(dir: &Path, type_probe: &str) -> String {
        let script = dir.join("blkid");
        let body = format!(
            "#!/bin/sh\n\
             case \"$1\" in\n\
             -L) [ \"$2\" = config-2 ] && {{ echo /dev/sr0; exit 0; }}; exit 2 ;;\n\
             -s) {type_probe} ;;\n\
             esac\n"
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.display().to_string()
    }

    #[test]
    fn test_first_value() {
        assert_eq!(first_value("/dev/sr0\n"), Some("/dev/sr0".to_string()));
        assert_eq!(first_value("\n  vfat  \n"), Some("vfat".to_string()));
        assert_eq!(first_value(""), None);
        assert_eq!(first_value("\n\n"), None);
    }

    #[tokio::test]
    async fn test_missing_blkid_reports_absence() {
        let probe = Blkid::new("/nonexistent").with_program("/nonexistent/blkid");
        let result = probe.probe_by_label("config-2").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_label_resolves_device_and_type() {
        let temp = TempDir::new().unwrap();
        let probe = Blkid::default().with_program(fake_blkid(temp.path(), "echo vfat"));

        let device = probe.probe_by_label("config-2").await.unwrap().unwrap();
        assert_eq!(device.path, PathBuf::from("/dev/sr0"));
        assert_eq!(device.fs_type.as_deref(), Some("vfat"));
    }

    #[tokio::test]
    async fn test_unknown_label_is_absent() {
        let temp = TempDir::new().unwrap();
        let probe = Blkid::default().with_program(fake_blkid(temp.path(), "echo vfat"));

        assert!(probe.probe_by_label("CONFIG-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_undetectable_type_keeps_device() {
        let temp = TempDir::new().unwrap();
        let probe = Blkid::default().with_program(fake_blkid(temp.path(), "exit 4"));

        let device = probe.probe_by_label("config-2").await.unwrap().unwrap();
        assert_eq!(device.path, PathBuf::from("/dev/sr0"));
        assert!(device.fs_type.is_none());
    }
}
