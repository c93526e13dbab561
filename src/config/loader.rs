//! Config loader
//!
//! Loads the main config file and its drop-ins. A broken file in the
//! default location never stops the boot path: it is logged and the
//! defaults apply. A file named explicitly on the command line must load.

use super::{BootConfig, ConfigOverrides, merge};
use crate::BootError;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Default main config file
pub const CONFIG_FILE: &str = "/etc/glean-boot/config.yaml";

/// Default drop-in directory
pub const CONFIG_DROPIN_DIR: &str = "/etc/glean-boot/config.d";

/// Configuration loader builder
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    main: PathBuf,
    dropin_dir: Option<PathBuf>,
    required: bool,
    overrides: ConfigOverrides,
}

impl ConfigLoader {
    /// Create a loader for the default locations
    pub fn new() -> Self {
        Self {
            main: PathBuf::from(CONFIG_FILE),
            dropin_dir: Some(PathBuf::from(CONFIG_DROPIN_DIR)),
            required: false,
            overrides: ConfigOverrides::default(),
        }
    }

    /// Load a single, explicitly requested file (no drop-ins)
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.main = path.as_ref().to_path_buf();
        self.dropin_dir = None;
        self.required = true;
        self
    }

    /// Use a custom drop-in directory
    pub fn with_dropin_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dropin_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Apply command-line overrides after loading
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Load, merge and apply overrides
    pub async fn load(self) -> Result<BootConfig, BootError> {
        let mut layers = Vec::new();

        match load_layer(&self.main).await {
            Ok(Some(layer)) => {
                debug!("Loaded config from {}", self.main.display());
                layers.push(layer);
            }
            Ok(None) if self.required => {
                return Err(BootError::Config(format!(
                    "config file {} does not exist",
                    self.main.display()
                )));
            }
            Ok(None) => debug!("No config file at {}", self.main.display()),
            Err(e) if self.required => return Err(e),
            Err(e) => warn!("Ignoring {}: {}", self.main.display(), e),
        }

        if let Some(dir) = &self.dropin_dir {
            match load_dropins(dir).await {
                Ok(dropins) => layers.extend(dropins),
                Err(e) if self.required => return Err(e),
                Err(e) => warn!("Ignoring drop-in directory {}: {}", dir.display(), e),
            }
        }

        let mut config = match merge::merge_all(&layers) {
            Value::Null => BootConfig::default(),
            merged => match serde_yaml::from_value::<BootConfig>(merged) {
                Ok(config) => config,
                Err(e) if self.required => return Err(e.into()),
                Err(e) => {
                    warn!("Invalid configuration, using defaults: {}", e);
                    BootConfig::default()
                }
            },
        };

        config.apply(&self.overrides);
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Read one YAML layer; `Ok(None)` when the file does not exist
async fn load_layer(path: &Path) -> Result<Option<Value>, BootError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if content.trim().is_empty() {
        return Ok(Some(Value::Null));
    }

    let value: Value = serde_yaml::from_str(&content)?;
    match value {
        Value::Mapping(_) | Value::Null => Ok(Some(value)),
        _ => Err(BootError::Config(format!(
            "{} must contain a mapping",
            path.display()
        ))),
    }
}

/// Load all `*.yaml` drop-ins from a directory (sorted alphabetically)
async fn load_dropins(dir: &Path) -> Result<Vec<Value>, BootError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "yaml" || e == "yml") {
            entries.push(path);
        }
    }
    entries.sort();

    let mut layers = Vec::new();
    for path in entries {
        match load_layer(&path).await {
            Ok(Some(layer)) => {
                debug!("Loaded drop-in config from {}", path.display());
                layers.push(layer);
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring drop-in {}: {}", path.display(), e),
        }
    }

    info!("Loaded {} drop-in configs", layers.len());
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_default_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        // with_file makes the file required
        let explicit = ConfigLoader::new().with_file(temp.path().join("nope.yaml"));
        assert!(matches!(explicit.load().await, Err(BootError::Config(_))));

        let mut loader = ConfigLoader::new().with_dropin_dir(temp.path().join("config.d"));
        loader.main = temp.path().join("missing.yaml");
        assert_eq!(loader.load().await.unwrap(), BootConfig::default());
    }

    #[tokio::test]
    async fn test_broken_default_file_is_ignored() {
        let temp = TempDir::new().unwrap();
        let main = temp.path().join("config.yaml");
        fs::write(&main, "labels: [unterminated\n").await.unwrap();

        let mut loader = ConfigLoader::new().with_dropin_dir(temp.path().join("config.d"));
        loader.main = main;
        assert_eq!(loader.load().await.unwrap(), BootConfig::default());
    }

    #[tokio::test]
    async fn test_broken_explicit_file_is_error() {
        let temp = TempDir::new().unwrap();
        let main = temp.path().join("config.yaml");
        fs::write(&main, "- just\n- a list\n").await.unwrap();

        let result = ConfigLoader::new().with_file(&main).load().await;
        assert!(matches!(result, Err(BootError::Config(_))));
    }

    #[tokio::test]
    async fn test_dropins_layer_in_order() {
        let temp = TempDir::new().unwrap();
        let main = temp.path().join("config.yaml");
        let dir = temp.path().join("config.d");
        fs::create_dir_all(&dir).await.unwrap();

        fs::write(&main, "root: /srv/base\nsearch_path: /bin\n")
            .await
            .unwrap();
        fs::write(dir.join("10-first.yaml"), "root: /srv/first\n")
            .await
            .unwrap();
        fs::write(dir.join("20-second.yaml"), "root: /srv/second\n")
            .await
            .unwrap();
        fs::write(dir.join("ignored.txt"), "root: /srv/ignored\n")
            .await
            .unwrap();

        let mut loader = ConfigLoader::new().with_dropin_dir(&dir);
        loader.main = main;
        let config = loader.load().await.unwrap();

        assert_eq!(config.root, PathBuf::from("/srv/second"));
        assert_eq!(config.search_path, "/bin");
    }

    #[tokio::test]
    async fn test_unusable_dropin_dir_is_ignored() {
        let temp = TempDir::new().unwrap();
        let main = temp.path().join("config.yaml");
        let not_a_dir = temp.path().join("config.d");
        fs::write(&main, "search_path: /bin\n").await.unwrap();
        fs::write(&not_a_dir, "root: /srv\n").await.unwrap();

        let mut loader = ConfigLoader::new().with_dropin_dir(&not_a_dir);
        loader.main = main;
        let config = loader.load().await.unwrap();

        assert_eq!(config.search_path, "/bin");
        assert_eq!(config.root, PathBuf::from("/"));
    }

    #[tokio::test]
    async fn test_dropin_null_disables_locking() {
        let temp = TempDir::new().unwrap();
        let main = temp.path().join("config.yaml");
        let dir = temp.path().join("config.d");
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(&main, "lock_dir: /run/custom\nplatform: suse\n")
            .await
            .unwrap();
        fs::write(dir.join("50-nolock.yaml"), "lock_dir: null\nplatform: ~\n")
            .await
            .unwrap();
        fs::write(dir.join("60-empty.yaml"), "").await.unwrap();

        let mut loader = ConfigLoader::new().with_dropin_dir(&dir);
        loader.main = main;
        let config = loader.load().await.unwrap();

        assert!(config.lock_dir.is_none());
        assert!(config.platform.is_none());
    }

    #[tokio::test]
    async fn test_overrides_win_over_file() {
        let temp = TempDir::new().unwrap();
        let main = temp.path().join("config.yaml");
        fs::write(&main, "engine:\n  program: from-file\n").await.unwrap();

        let config = ConfigLoader::new()
            .with_file(&main)
            .with_overrides(ConfigOverrides {
                engine: Some("from-cli".to_string()),
                ..Default::default()
            })
            .load()
            .await
            .unwrap();

        assert_eq!(config.engine.program, "from-cli");
    }
}
