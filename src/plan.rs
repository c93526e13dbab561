//! Invocation planning
//!
//! Decides how the engine runs for one process invocation, from two
//! inputs: whether the config drive is usable and whether a single
//! interface was named.
//!
//! | config drive | interface | mode |
//! |---|---|---|
//! | usable | none | full discovery from metadata |
//! | usable | named | that interface, from metadata |
//! | unusable | none | full discovery, DHCP on live interfaces |
//! | unusable | named | that interface, DHCP |
//!
//! With a usable config drive an identity pass (SSH keys and hostname, no
//! network) always runs first. The engine reads metadata from
//! `<root>/mnt/config`, so a non-default root is passed along with `--root`.

use crate::BootError;
use crate::volume::MountOutcome;
use std::path::PathBuf;

/// Engine flags
pub const FLAG_SSH: &str = "--ssh";
pub const FLAG_SKIP_NETWORK: &str = "--skip-network";
pub const FLAG_HOSTNAME: &str = "--hostname";
pub const FLAG_INTERFACE: &str = "--interface";
pub const FLAG_NOOP: &str = "--noop";
pub const FLAG_ROOT: &str = "--root";

/// Longest interface name the kernel accepts (IFNAMSIZ - 1)
const MAX_INTERFACE_NAME: usize = 15;

/// Where interface configuration comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSource {
    /// Metadata on the mounted config drive
    ConfigDrive,
    /// No metadata: DHCP
    Absent,
}

/// How the engine configures networking for this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationMode {
    FullDiscovery { metadata: MetadataSource },
    SingleInterface { name: String, metadata: MetadataSource },
}

impl InvocationMode {
    /// Select the mode for a run
    pub fn select(mount: &MountOutcome, interface: Option<&str>) -> Self {
        let metadata = if mount.is_usable() {
            MetadataSource::ConfigDrive
        } else {
            MetadataSource::Absent
        };

        match interface {
            Some(name) => Self::SingleInterface {
                name: name.to_string(),
                metadata,
            },
            None => Self::FullDiscovery { metadata },
        }
    }

    pub fn metadata(&self) -> MetadataSource {
        match self {
            Self::FullDiscovery { metadata } | Self::SingleInterface { metadata, .. } => *metadata,
        }
    }

    pub fn interface(&self) -> Option<&str> {
        match self {
            Self::FullDiscovery { .. } => None,
            Self::SingleInterface { name, .. } => Some(name),
        }
    }
}

impl std::fmt::Display for InvocationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match self.metadata() {
            MetadataSource::ConfigDrive => "config drive",
            MetadataSource::Absent => "dhcp",
        };
        match self {
            Self::FullDiscovery { .. } => write!(f, "full discovery ({source})"),
            Self::SingleInterface { name, .. } => write!(f, "interface {name} ({source})"),
        }
    }
}

/// Why an engine invocation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// SSH keys and hostname only
    Identity,
    /// Network configuration
    Network,
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// One engine command line (arguments only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    pub purpose: Purpose,
    pub args: Vec<String>,
}

/// Options that shape every invocation
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Filesystem root for the engine; `None` means `/`
    pub root: Option<PathBuf>,
    /// Appended to every invocation
    pub extra_args: Vec<String>,
    /// Ask the engine not to write anything
    pub noop: bool,
}

/// Ordered engine invocations for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub mode: InvocationMode,
    pub invocations: Vec<EngineInvocation>,
}

impl Plan {
    /// Build the plan for a run
    pub fn build(mount: &MountOutcome, interface: Option<&str>, options: &PlanOptions) -> Self {
        let mode = InvocationMode::select(mount, interface);
        let mut invocations = Vec::with_capacity(2);

        if mode.metadata() == MetadataSource::ConfigDrive {
            invocations.push(EngineInvocation {
                purpose: Purpose::Identity,
                args: with_common(vec![FLAG_SSH, FLAG_SKIP_NETWORK, FLAG_HOSTNAME], options),
            });
        }

        let network_args = match mode.interface() {
            Some(name) => with_common(vec![FLAG_INTERFACE, name], options),
            None => with_common(Vec::new(), options),
        };
        invocations.push(EngineInvocation {
            purpose: Purpose::Network,
            args: network_args,
        });

        Self { mode, invocations }
    }

    pub fn identity_pass(&self) -> Option<&EngineInvocation> {
        self.invocations
            .iter()
            .find(|inv| inv.purpose == Purpose::Identity)
    }
}

fn with_common(args: Vec<&str>, options: &PlanOptions) -> Vec<String> {
    let mut args: Vec<String> = args.into_iter().map(str::to_string).collect();
    if let Some(root) = &options.root {
        args.push(FLAG_ROOT.to_string());
        args.push(root.display().to_string());
    }
    if options.noop {
        args.push(FLAG_NOOP.to_string());
    }
    args.extend(options.extra_args.iter().cloned());
    args
}

/// Reject names that cannot be a kernel interface
///
/// The name ends up in file paths (artifacts, lock files), so path
/// separators and dot entries are refused along with anything the kernel
/// itself would refuse.
pub fn validate_interface_name(name: &str) -> Result<(), BootError> {
    let invalid = |why: &str| -> Result<(), BootError> {
        Err(BootError::InvalidData(format!("interface name '{name}' {why}")))
    };

    if name.is_empty() {
        return invalid("is empty");
    }
    if name.len() > MAX_INTERFACE_NAME {
        return invalid("is too long");
    }
    if name == "." || name == ".." {
        return invalid("is reserved");
    }
    if name
        .chars()
        .any(|c| c == '/' || c == ':' || c.is_whitespace() || c.is_control())
    {
        return invalid("contains invalid characters");
    }
    Ok(())
}
