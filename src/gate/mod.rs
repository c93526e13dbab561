//! Per-interface idempotency gate
//!
//! A hotplug-triggered run for an interface that already has a persistent
//! network configuration does nothing. That configuration was written by an
//! earlier engine run (or by an administrator) and must not be clobbered.
//!
//! Where the configuration lives depends on the platform:
//! - Red Hat family: `/etc/sysconfig/network-scripts/ifcfg-<if>`
//! - SUSE family: `/etc/sysconfig/network/ifcfg-<if>`
//! - Debian family: `/etc/network/interfaces.d/<if>.cfg`
//! - Alpine: `iface <if>` stanza in `/etc/network/interfaces`
//! - Gentoo: `config_<if>=` in `/etc/conf.d/net`

pub mod lock;
pub mod matcher;

pub use lock::{InterfaceLock, LockAttempt};
pub use matcher::SharedFileSyntax;

use crate::BootError;
use crate::config::BootPaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info, warn};

/// Platform family, selecting the artifact layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    RedHat,
    Suse,
    Debian,
    Alpine,
    Gentoo,
}

impl Platform {
    /// Map an os-release `ID` / `ID_LIKE` token to a platform
    pub fn from_os_id(id: &str) -> Option<Self> {
        match id.to_lowercase().as_str() {
            "rhel" | "redhat" | "centos" | "fedora" | "rocky" | "almalinux" | "ol" | "amzn" => {
                Some(Self::RedHat)
            }
            "suse" | "opensuse" | "opensuse-leap" | "opensuse-tumbleweed" | "sles" | "sled" => {
                Some(Self::Suse)
            }
            "debian" | "ubuntu" => Some(Self::Debian),
            "alpine" => Some(Self::Alpine),
            "gentoo" => Some(Self::Gentoo),
            _ => None,
        }
    }

    /// Detect the running platform
    ///
    /// Reads os-release (`ID` first, then `ID_LIKE`), then falls back to
    /// distribution marker files. Unknown systems are treated as Debian.
    pub async fn detect(paths: &BootPaths) -> Self {
        for path in [paths.os_release(), paths.os_release_fallback()] {
            if let Ok(content) = fs::read_to_string(&path).await {
                if let Some(platform) = from_os_release(&content) {
                    debug!("Detected platform {} from {}", platform, path.display());
                    return platform;
                }
            }
        }

        let markers = [
            ("/etc/gentoo-release", Self::Gentoo),
            ("/etc/redhat-release", Self::RedHat),
            ("/etc/SuSE-release", Self::Suse),
            ("/etc/alpine-release", Self::Alpine),
            ("/etc/debian_version", Self::Debian),
        ];
        for (marker, platform) in markers {
            if paths.resolve(marker).exists() {
                debug!("Detected platform {} from {}", platform, marker);
                return platform;
            }
        }

        warn!("Could not detect platform, assuming debian");
        Self::Debian
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RedHat => write!(f, "redhat"),
            Self::Suse => write!(f, "suse"),
            Self::Debian => write!(f, "debian"),
            Self::Alpine => write!(f, "alpine"),
            Self::Gentoo => write!(f, "gentoo"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_os_id(s).ok_or_else(|| {
            format!("unknown platform '{s}' (expected redhat, suse, debian, alpine or gentoo)")
        })
    }
}

/// Parse os-release content into a platform
fn from_os_release(content: &str) -> Option<Platform> {
    let value = |key: &str| {
        content.lines().find_map(|line| {
            let (k, v) = line.trim().split_once('=')?;
            (k == key).then(|| v.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        })
    };

    if let Some(platform) = value("ID").as_deref().and_then(Platform::from_os_id) {
        return Some(platform);
    }

    value("ID_LIKE")?
        .split_whitespace()
        .find_map(Platform::from_os_id)
}

/// Where the persistent configuration for one interface lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// One file per interface; existence is the signal
    PerInterfaceFile(PathBuf),
    /// One file for all interfaces; a matching entry is the signal
    SharedFile {
        path: PathBuf,
        syntax: SharedFileSyntax,
    },
}

/// Checks whether an interface is already configured
#[derive(Debug, Clone)]
pub struct InterfaceGate {
    platform: Platform,
    paths: BootPaths,
}

impl InterfaceGate {
    pub fn new(platform: Platform, paths: BootPaths) -> Self {
        Self { platform, paths }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Artifact location for `interface` on this platform
    pub fn artifact(&self, interface: &str) -> Artifact {
        match self.platform {
            Platform::RedHat => Artifact::PerInterfaceFile(self.paths.redhat_ifcfg(interface)),
            Platform::Suse => Artifact::PerInterfaceFile(self.paths.suse_ifcfg(interface)),
            Platform::Debian => Artifact::PerInterfaceFile(self.paths.eni_fragment(interface)),
            Platform::Alpine => Artifact::SharedFile {
                path: self.paths.eni_file(),
                syntax: SharedFileSyntax::Eni,
            },
            Platform::Gentoo => Artifact::SharedFile {
                path: self.paths.gentoo_conf_net(),
                syntax: SharedFileSyntax::ConfNet,
            },
        }
    }

    /// Whether a persistent configuration exists for `interface`
    pub async fn is_configured(&self, interface: &str) -> Result<bool, BootError> {
        let configured = match self.artifact(interface) {
            Artifact::PerInterfaceFile(path) => {
                let exists = fs::try_exists(&path).await?;
                debug!(
                    "Artifact check for {}: {} -> {}",
                    interface,
                    path.display(),
                    if exists { "present" } else { "absent" }
                );
                exists
            }
            Artifact::SharedFile { path, syntax } => match fs::read_to_string(&path).await {
                Ok(content) => matcher::declares_interface(&content, syntax, interface),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("{} does not exist", path.display());
                    false
                }
                Err(e) => return Err(e.into()),
            },
        };

        if configured {
            info!("{} is already configured ({} layout)", interface, self.platform);
        }
        Ok(configured)
    }
}
