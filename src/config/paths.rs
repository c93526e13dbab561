//! Filesystem locations consulted by glean-boot
//!
//! Every path resolves under a configurable root so the whole decision
//! path can run against a scratch directory.

use std::path::{Path, PathBuf};

/// Paths derived from the configured filesystem root
#[derive(Debug, Clone)]
pub struct BootPaths {
    /// Filesystem root (default: /)
    pub root: PathBuf,
}

impl Default for BootPaths {
    fn default() -> Self {
        Self::new()
    }
}

impl BootPaths {
    /// Paths on the live system
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }

    /// Paths under a custom root (useful for testing)
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve an absolute system path under the root
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        self.root.join(path.strip_prefix("/").unwrap_or(path))
    }

    // ==================== System Information ====================

    /// /etc/os-release
    pub fn os_release(&self) -> PathBuf {
        self.resolve("/etc/os-release")
    }

    /// /usr/lib/os-release, used when /etc/os-release is missing
    pub fn os_release_fallback(&self) -> PathBuf {
        self.resolve("/usr/lib/os-release")
    }

    /// /proc/self/mounts
    pub fn mounts_table(&self) -> PathBuf {
        self.resolve("/proc/self/mounts")
    }

    /// /mnt/config, where the engine reads config-drive metadata
    pub fn config_drive(&self) -> PathBuf {
        self.resolve("/mnt/config")
    }

    // ==================== Network Artifacts ====================

    /// /etc/sysconfig/network-scripts/ifcfg-<name> (Red Hat family)
    pub fn redhat_ifcfg(&self, interface: &str) -> PathBuf {
        self.resolve("/etc/sysconfig/network-scripts")
            .join(format!("ifcfg-{interface}"))
    }

    /// /etc/sysconfig/network/ifcfg-<name> (SUSE family)
    pub fn suse_ifcfg(&self, interface: &str) -> PathBuf {
        self.resolve("/etc/sysconfig/network")
            .join(format!("ifcfg-{interface}"))
    }

    /// /etc/network/interfaces.d/<name>.cfg (Debian family)
    pub fn eni_fragment(&self, interface: &str) -> PathBuf {
        self.resolve("/etc/network/interfaces.d")
            .join(format!("{interface}.cfg"))
    }

    /// /etc/network/interfaces (single shared ENI file)
    pub fn eni_file(&self) -> PathBuf {
        self.resolve("/etc/network/interfaces")
    }

    /// /etc/conf.d/net (Gentoo netifrc)
    pub fn gentoo_conf_net(&self) -> PathBuf {
        self.resolve("/etc/conf.d/net")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let paths = BootPaths::new();
        assert_eq!(paths.os_release(), PathBuf::from("/etc/os-release"));
        assert_eq!(paths.mounts_table(), PathBuf::from("/proc/self/mounts"));
        assert_eq!(paths.config_drive(), PathBuf::from("/mnt/config"));
    }

    #[test]
    fn test_custom_root() {
        let paths = BootPaths::with_root("/tmp/root");
        assert_eq!(
            paths.os_release(),
            PathBuf::from("/tmp/root/etc/os-release")
        );
        assert_eq!(
            paths.config_drive(),
            PathBuf::from("/tmp/root/mnt/config")
        );
        assert_eq!(
            paths.resolve("relative/file"),
            PathBuf::from("/tmp/root/relative/file")
        );
    }

    #[test]
    fn test_artifact_paths() {
        let paths = BootPaths::new();
        assert_eq!(
            paths.redhat_ifcfg("eth0"),
            PathBuf::from("/etc/sysconfig/network-scripts/ifcfg-eth0")
        );
        assert_eq!(
            paths.suse_ifcfg("eth1"),
            PathBuf::from("/etc/sysconfig/network/ifcfg-eth1")
        );
        assert_eq!(
            paths.eni_fragment("ens3"),
            PathBuf::from("/etc/network/interfaces.d/ens3.cfg")
        );
        assert_eq!(paths.eni_file(), PathBuf::from("/etc/network/interfaces"));
        assert_eq!(paths.gentoo_conf_net(), PathBuf::from("/etc/conf.d/net"));
    }
}
