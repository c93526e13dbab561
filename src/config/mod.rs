//! glean-boot configuration
//!
//! Everything the orchestrator would otherwise pick up from the ambient
//! process environment (search path, root, label candidates) lives here
//! and is passed in explicitly.

pub mod loader;
pub mod merge;
pub mod paths;

pub use loader::ConfigLoader;
pub use paths::BootPaths;

use crate::gate::Platform;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Canonical config-drive label
pub const CONFIG_DRIVE_LABEL: &str = "config-2";

/// Default directory for per-interface lock files
pub const DEFAULT_LOCK_DIR: &str = "/run/glean-boot";

/// `PATH` handed to every child process
pub const DEFAULT_SEARCH_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Top-level orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Volume labels to probe for, in priority order
    pub labels: Vec<String>,

    /// Filesystem root; the config drive mounts at `<root>/mnt/config`
    /// and the engine is pointed at the same root
    pub root: PathBuf,

    /// Search path for blkid, mount and the engine
    pub search_path: String,

    /// External configuration engine
    pub engine: EngineConfig,

    /// Artifact layout override (auto-detected when unset)
    pub platform: Option<Platform>,

    /// Directory for per-interface lock files; `None` disables locking
    pub lock_dir: Option<PathBuf>,

    /// Mount option strings
    pub mount: MountConfig,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            // FAT-formatted drives come back upper-cased on some clouds
            labels: vec![
                CONFIG_DRIVE_LABEL.to_string(),
                CONFIG_DRIVE_LABEL.to_uppercase(),
            ],
            root: PathBuf::from("/"),
            search_path: DEFAULT_SEARCH_PATH.to_string(),
            engine: EngineConfig::default(),
            platform: None,
            lock_dir: Some(PathBuf::from(DEFAULT_LOCK_DIR)),
            mount: MountConfig::default(),
        }
    }
}

/// External engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine executable, resolved through `search_path`
    pub program: String,

    /// Arguments appended to every engine invocation
    pub extra_args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "glean".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Mount option strings, selected by filesystem type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    /// Options for FAT-family volumes (no native permission bits)
    pub fat_options: String,

    /// Options for everything else (iso9660 in practice)
    pub default_options: String,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            fat_options: "umask=0077".to_string(),
            default_options: "mode=0700".to_string(),
        }
    }
}

/// Values supplied on the command line, applied over the loaded file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root: Option<PathBuf>,
    pub platform: Option<Platform>,
    pub engine: Option<String>,
    pub no_lock: bool,
}

impl BootConfig {
    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(root) = &overrides.root {
            self.root = root.clone();
        }
        if let Some(platform) = overrides.platform {
            self.platform = Some(platform);
        }
        if let Some(engine) = &overrides.engine {
            self.engine.program = engine.clone();
        }
        if overrides.no_lock {
            self.lock_dir = None;
        }
    }

    /// Paths derived from `root`
    pub fn paths(&self) -> BootPaths {
        BootPaths::with_root(&self.root)
    }

    /// Root to hand the engine, `None` for the live system
    pub fn engine_root(&self) -> Option<&Path> {
        let root = self.root.as_path();
        (root != Path::new("/")).then_some(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_labels_include_uppercase() {
        let config = BootConfig::default();
        assert_eq!(config.labels, vec!["config-2", "CONFIG-2"]);
        assert_eq!(config.paths().config_drive(), PathBuf::from("/mnt/config"));
        assert_eq!(config.engine_root(), None);
        assert_eq!(config.engine.program, "glean");
    }

    #[test]
    fn test_parse_partial_config() {
        let yaml = r#"
labels:
  - cidata
root: /srv/image
engine:
  extra_args: ["--distro", "debian"]
platform: gentoo
"#;
        let config = BootConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.labels, vec!["cidata"]);
        assert_eq!(
            config.paths().config_drive(),
            PathBuf::from("/srv/image/mnt/config")
        );
        assert_eq!(config.engine_root(), Some(Path::new("/srv/image")));
        assert_eq!(config.engine.program, "glean");
        assert_eq!(config.engine.extra_args, vec!["--distro", "debian"]);
        assert_eq!(config.platform, Some(Platform::Gentoo));
        assert_eq!(config.mount.fat_options, "umask=0077");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(BootConfig::from_yaml("").unwrap(), BootConfig::default());
    }

    #[test]
    fn test_null_lock_dir_disables_locking() {
        let config = BootConfig::from_yaml("lock_dir: null\n").unwrap();
        assert!(config.lock_dir.is_none());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = BootConfig::default();
        config.apply(&ConfigOverrides {
            root: Some(PathBuf::from("/tmp/root")),
            platform: Some(Platform::RedHat),
            engine: Some("/opt/glean/bin/glean".to_string()),
            no_lock: true,
        });

        assert_eq!(config.root, PathBuf::from("/tmp/root"));
        assert_eq!(config.platform, Some(Platform::RedHat));
        assert_eq!(config.engine.program, "/opt/glean/bin/glean");
        assert!(config.lock_dir.is_none());
    }
}
