//! Config-drive discovery
//!
//! The config drive is a small block device attached by the cloud, carrying
//! instance metadata. It is found by filesystem label. Some providers format
//! it as FAT, whose labels come back upper-cased, so several spellings are
//! tried in priority order. No matching device is the normal state on
//! DHCP-only clouds, not an error.

pub mod blkid;
pub mod mock;
pub mod mount;

pub use blkid::Blkid;
pub use mount::{MountOutcome, Mounter, SystemMount, mount_volume};

use crate::BootError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A block device found by label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    /// Device node, e.g. `/dev/sr0`
    pub path: PathBuf,
    /// Filesystem type as reported by the probe, e.g. `iso9660`
    pub fs_type: Option<String>,
}

/// Trait for block-device probes
#[async_trait]
pub trait BlockProbe: Send + Sync {
    /// Look up a block device by filesystem label
    ///
    /// Returns `Ok(None)` when no device carries the label.
    async fn probe_by_label(&self, label: &str) -> Result<Option<BlockDevice>, BootError>;
}

/// A located config drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigVolumeHandle {
    /// Label candidates in the order they were tried
    pub candidates: Vec<String>,
    /// The first candidate that matched a device
    pub label: String,
    /// The matching device
    pub device: BlockDevice,
    /// Where the volume gets mounted
    pub mount_point: PathBuf,
}

/// Result of a locate pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigVolume {
    /// No candidate label matched any block device
    Absent,
    Present(ConfigVolumeHandle),
}

impl ConfigVolume {
    pub fn handle(&self) -> Option<&ConfigVolumeHandle> {
        match self {
            Self::Absent => None,
            Self::Present(handle) => Some(handle),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// Probe for the config drive, trying label candidates in order
///
/// A probe error for one candidate is logged and treated as no match for
/// that candidate, so a flaky probe degrades to the DHCP path instead of
/// failing the boot.
pub async fn locate(
    probe: &dyn BlockProbe,
    candidates: &[String],
    mount_point: &Path,
) -> ConfigVolume {
    for label in candidates {
        debug!("Probing for block device labelled '{}'", label);

        match probe.probe_by_label(label).await {
            Ok(Some(device)) => {
                info!(
                    "Found config drive '{}' at {} ({})",
                    label,
                    device.path.display(),
                    device.fs_type.as_deref().unwrap_or("unknown type")
                );
                return ConfigVolume::Present(ConfigVolumeHandle {
                    candidates: candidates.to_vec(),
                    label: label.clone(),
                    device,
                    mount_point: mount_point.to_path_buf(),
                });
            }
            Ok(None) => debug!("No block device labelled '{}'", label),
            Err(e) => warn!("Probe for label '{}' failed: {}", label, e),
        }
    }

    info!("No config drive present, assuming DHCP networking");
    ConfigVolume::Absent
}

#[cfg(test)]
mod tests {
    use super::mock::MockProbe;
    use super::*;

    fn labels() -> Vec<String> {
        vec!["config-2".to_string(), "CONFIG-2".to_string()]
    }

    #[tokio::test]
    async fn test_locate_canonical_label() {
        let probe = MockProbe::new().with_device("config-2", "/dev/sr0", "iso9660");
        let volume = locate(&probe, &labels(), Path::new("/mnt/config")).await;

        let handle = volume.handle().unwrap();
        assert_eq!(handle.label, "config-2");
        assert_eq!(handle.device.path, PathBuf::from("/dev/sr0"));
        assert_eq!(handle.device.fs_type.as_deref(), Some("iso9660"));
        assert_eq!(handle.candidates, labels());
    }

    #[tokio::test]
    async fn test_locate_uppercase_label() {
        let probe = MockProbe::new().with_device("CONFIG-2", "/dev/vdb", "vfat");
        let volume = locate(&probe, &labels(), Path::new("/mnt/config")).await;

        assert_eq!(volume.handle().unwrap().label, "CONFIG-2");
        assert_eq!(probe.probed(), labels());
    }

    #[tokio::test]
    async fn test_locate_prefers_earlier_candidate() {
        let probe = MockProbe::new()
            .with_device("CONFIG-2", "/dev/vdb", "vfat")
            .with_device("config-2", "/dev/sr0", "iso9660");
        let volume = locate(&probe, &labels(), Path::new("/mnt/config")).await;

        assert_eq!(volume.handle().unwrap().label, "config-2");
        // Stops at the first match
        assert_eq!(probe.probed(), vec!["config-2".to_string()]);
    }

    #[tokio::test]
    async fn test_locate_absent() {
        let probe = MockProbe::new();
        let volume = locate(&probe, &labels(), Path::new("/mnt/config")).await;

        assert_eq!(volume, ConfigVolume::Absent);
        assert!(!volume.is_present());
    }

    #[tokio::test]
    async fn test_probe_error_falls_through_to_next_candidate() {
        let probe = MockProbe::new()
            .with_error("config-2", "blkid crashed")
            .with_device("CONFIG-2", "/dev/vdb", "vfat");
        let volume = locate(&probe, &labels(), Path::new("/mnt/config")).await;

        assert_eq!(volume.handle().unwrap().label, "CONFIG-2");
    }
}
