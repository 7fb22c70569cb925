//! Deep merge for JSON settings trees.
//!
//! Later layers are merged on top of earlier ones:
//! - Objects are merged recursively, base key order first
//! - Arrays are concatenated (base elements, then overlay elements)
//! - Scalars are replaced by the overlay
//!
//! Both sides must have the same shape. An object can never be merged with an
//! array or a scalar.

use crate::error::{SettingsError, SettingsResult};
use serde_json::{Map, Value};

/// Deep merge two JSON values, with `overlay` taking precedence over `base`.
///
/// # Example
/// ```
/// use serde_json::json;
/// use build_settings::config::deep_merge;
///
/// let base = json!({
///     "app_name": "MyApp",
///     "hidden_imports": ["a"]
/// });
/// let overlay = json!({
///     "app_name": "Other",
///     "hidden_imports": ["b"]
/// });
/// let result = deep_merge(base, overlay).unwrap();
/// assert_eq!(result, json!({"app_name": "Other", "hidden_imports": ["a", "b"]}));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> SettingsResult<Value> {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                // get_mut keeps the base key at its original position
                match base_map.get_mut(&key) {
                    Some(slot) => {
                        let base_value = std::mem::take(slot);
                        *slot = deep_merge(base_value, overlay_value)?;
                    }
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
            Ok(Value::Object(base_map))
        }
        (Value::Array(mut base_items), Value::Array(overlay_items)) => {
            base_items.extend(overlay_items);
            Ok(Value::Array(base_items))
        }
        (base, overlay) if is_scalar(&base) && is_scalar(&overlay) => Ok(overlay),
        (base, overlay) => Err(SettingsError::MergeType { base, overlay }),
    }
}

/// Merge multiple values in order, with later values taking precedence.
///
/// The fold starts from an empty object, so every layer must be an object.
pub fn merge_all(layers: impl IntoIterator<Item = Value>) -> SettingsResult<Value> {
    layers
        .into_iter()
        .try_fold(Value::Object(Map::new()), deep_merge)
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}
