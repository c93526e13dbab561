//! Config-drive mounting
//!
//! FAT has no permission bits, so access is restricted with a umask at mount
//! time. Everything else (iso9660 in practice) gets a restrictive mode.
//! A failed mount is recorded and logged, never propagated: an unreadable
//! config drive must still leave the DHCP fallback reachable.

use super::ConfigVolumeHandle;
use crate::BootError;
use crate::config::{DEFAULT_SEARCH_PATH, MountConfig};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Filesystem types in the FAT family
const FAT_FAMILY: &[&str] = &["vfat", "fat", "msdos", "fat12", "fat16", "fat32", "umsdos", "exfat"];

/// What happened to the config drive mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    /// No config drive was found, so nothing was mounted
    NotAttempted,
    /// Mounted by this run
    Mounted,
    /// The mount point was already mounted (an earlier run this boot)
    AlreadyMounted,
    /// Mount was attempted and failed
    Failed(String),
}

impl MountOutcome {
    /// Whether metadata on the mount point can be used
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Mounted | Self::AlreadyMounted)
    }
}

impl std::fmt::Display for MountOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAttempted => write!(f, "not attempted"),
            Self::Mounted => write!(f, "mounted"),
            Self::AlreadyMounted => write!(f, "already mounted"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// `mount` arguments for one volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOptions {
    /// Explicit `-t` type, only passed for FAT volumes
    pub fs_type: Option<String>,
    /// `-o` option string
    pub options: String,
}

impl MountOptions {
    /// Select options by filesystem type
    pub fn for_fs_type(fs_type: Option<&str>, config: &MountConfig) -> Self {
        match fs_type {
            Some(t) if is_fat_family(t) => Self {
                fs_type: Some(t.to_string()),
                options: config.fat_options.clone(),
            },
            _ => Self {
                fs_type: None,
                options: config.default_options.clone(),
            },
        }
    }

    /// Arguments preceding the device and mount point
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(fs_type) = &self.fs_type {
            args.push("-t".to_string());
            args.push(fs_type.clone());
        }
        args.push("-o".to_string());
        args.push(self.options.clone());
        args
    }
}

pub fn is_fat_family(fs_type: &str) -> bool {
    FAT_FAMILY.contains(&fs_type.to_ascii_lowercase().as_str())
}

/// Trait for the mount facility
#[async_trait]
pub trait Mounter: Send + Sync {
    async fn mount(
        &self,
        device: &Path,
        mount_point: &Path,
        options: &MountOptions,
    ) -> Result<(), BootError>;
}

/// Mounts with util-linux `mount`
#[derive(Debug, Clone)]
pub struct SystemMount {
    search_path: String,
}

impl SystemMount {
    pub fn new(search_path: impl Into<String>) -> Self {
        Self {
            search_path: search_path.into(),
        }
    }
}

impl Default for SystemMount {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_PATH)
    }
}

#[async_trait]
impl Mounter for SystemMount {
    async fn mount(
        &self,
        device: &Path,
        mount_point: &Path,
        options: &MountOptions,
    ) -> Result<(), BootError> {
        let mut cmd = Command::new("mount");
        cmd.args(options.args())
            .arg(device)
            .arg(mount_point)
            .env("PATH", &self.search_path);
        debug!("Running {:?}", cmd);

        let output = cmd
            .output()
            .await
            .map_err(|e| BootError::Command(format!("mount: {}", e)))?;

        if !output.status.success() {
            return Err(BootError::Command(format!(
                "mount exited with status {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }
}

/// Mount a located config drive, recording the outcome
pub async fn mount_volume(
    mounter: &dyn Mounter,
    handle: &ConfigVolumeHandle,
    config: &MountConfig,
    mounts_table: &Path,
) -> MountOutcome {
    let mount_point = &handle.mount_point;

    if let Err(e) = fs::create_dir_all(mount_point).await {
        warn!(
            "Cannot create mount point {}: {}; continuing without config drive",
            mount_point.display(),
            e
        );
        return MountOutcome::Failed(e.to_string());
    }

    if is_mounted(mounts_table, mount_point).await {
        info!("{} is already mounted", mount_point.display());
        return MountOutcome::AlreadyMounted;
    }

    let options = MountOptions::for_fs_type(handle.device.fs_type.as_deref(), config);
    match mounter.mount(&handle.device.path, mount_point, &options).await {
        Ok(()) => {
            info!(
                "Mounted {} on {} ({})",
                handle.device.path.display(),
                mount_point.display(),
                options.options
            );
            MountOutcome::Mounted
        }
        Err(e) => {
            warn!(
                "Failed to mount {}: {}; continuing without config drive",
                handle.device.path.display(),
                e
            );
            MountOutcome::Failed(e.to_string())
        }
    }
}

/// Check the mounts table for an entry on `mount_point`
async fn is_mounted(mounts_table: &Path, mount_point: &Path) -> bool {
    let content = match fs::read_to_string(mounts_table).await {
        Ok(content) => content,
        Err(e) => {
            debug!("Cannot read {}: {}", mounts_table.display(), e);
            return false;
        }
    };

    let target = mount_point.to_string_lossy();
    let target = target.trim_end_matches('/');
    content
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|field| unescape_mount_field(field) == target)
}

/// Undo the octal escaping the kernel applies to mount table fields
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits.iter().fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::super::mock::MockMounter;
    use super::super::{BlockDevice, ConfigVolumeHandle};
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn handle(fs_type: &str, mount_point: &Path) -> ConfigVolumeHandle {
        ConfigVolumeHandle {
            candidates: vec!["config-2".to_string()],
            label: "config-2".to_string(),
            device: BlockDevice {
                path: PathBuf::from("/dev/sr0"),
                fs_type: Some(fs_type.to_string()),
            },
            mount_point: mount_point.to_path_buf(),
        }
    }

    #[test]
    fn test_fat_options() {
        let options = MountOptions::for_fs_type(Some("vfat"), &MountConfig::default());
        assert_eq!(options.args(), vec!["-t", "vfat", "-o", "umask=0077"]);
        assert!(is_fat_family("VFAT"));
        assert!(is_fat_family("msdos"));
    }

    #[test]
    fn test_iso_options() {
        let options = MountOptions::for_fs_type(Some("iso9660"), &MountConfig::default());
        assert_eq!(options.args(), vec!["-o", "mode=0700"]);

        let unknown = MountOptions::for_fs_type(None, &MountConfig::default());
        assert_eq!(unknown.args(), vec!["-o", "mode=0700"]);
    }

    #[test]
    fn test_unescape_mount_field() {
        assert_eq!(unescape_mount_field("/mnt/config"), "/mnt/config");
        assert_eq!(unescape_mount_field("/mnt/my\\040drive"), "/mnt/my drive");
        assert_eq!(unescape_mount_field("trailing\\"), "trailing\\");
    }

    #[tokio::test]
    async fn test_mount_creates_mount_point() {
        let temp = TempDir::new().unwrap();
        let mount_point = temp.path().join("mnt/config");
        let mounter = MockMounter::new();

        let outcome = mount_volume(
            &mounter,
            &handle("iso9660", &mount_point),
            &MountConfig::default(),
            &temp.path().join("mounts"),
        )
        .await;

        assert_eq!(outcome, MountOutcome::Mounted);
        assert!(mount_point.is_dir());
        let calls = mounter.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].options.options, "mode=0700");
    }

    #[tokio::test]
    async fn test_mount_failure_is_recorded_not_raised() {
        let temp = TempDir::new().unwrap();
        let mounter = MockMounter::new().failing("device busy");

        let outcome = mount_volume(
            &mounter,
            &handle("vfat", &temp.path().join("mnt")),
            &MountConfig::default(),
            &temp.path().join("mounts"),
        )
        .await;

        assert!(matches!(outcome, MountOutcome::Failed(ref r) if r.contains("device busy")));
        assert!(!outcome.is_usable());
    }

    #[tokio::test]
    async fn test_already_mounted_skips_mount() {
        let temp = TempDir::new().unwrap();
        let mount_point = temp.path().join("mnt");
        let mounts = temp.path().join("mounts");
        fs::write(
            &mounts,
            format!(
                "proc /proc proc rw 0 0\n/dev/sr0 {} iso9660 ro 0 0\n",
                mount_point.display()
            ),
        )
        .await
        .unwrap();
        let mounter = MockMounter::new();

        let outcome = mount_volume(
            &mounter,
            &handle("iso9660", &mount_point),
            &MountConfig::default(),
            &mounts,
        )
        .await;

        assert_eq!(outcome, MountOutcome::AlreadyMounted);
        assert!(outcome.is_usable());
        assert!(mounter.calls().is_empty());
    }
}
