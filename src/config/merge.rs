//! Config merging
//!
//! Drop-in files are layered over the main config file:
//! 1. /etc/glean-boot/config.yaml (base)
//! 2. /etc/glean-boot/config.d/*.yaml (sorted alphabetically)
//!
//! Mappings merge key by key. Scalars, lists and explicit nulls from a
//! later layer replace the earlier value outright, so a drop-in that sets
//! `labels` defines the whole candidate list and `lock_dir: null` turns
//! locking off. An empty layer changes nothing.

use serde_yaml::Value;
use tracing::debug;

/// Merge two YAML values, `overlay` taking precedence
pub fn merge_yaml_values(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut result = base_map.clone();

            for (key, overlay_value) in overlay_map {
                let merged = match result.get(key) {
                    Some(base_value) => merge_yaml_values(base_value, overlay_value),
                    None => overlay_value.clone(),
                };
                result.insert(key.clone(), merged);
            }

            Value::Mapping(result)
        }

        (_, overlay) => overlay.clone(),
    }
}

/// Merge an ordered list of layers, later layers winning
pub fn merge_all(layers: &[Value]) -> Value {
    debug!("Merging {} config layers", layers.len());

    // An empty file parses to null
    layers
        .iter()
        .filter(|layer| !layer.is_null())
        .fold(Value::Null, |acc, layer| merge_yaml_values(&acc, layer))
}
