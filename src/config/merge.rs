//! Key-level merging of configuration documents.
//!
//! Mappings merge recursively so that an override file only needs to name
//! the keys it changes. Lists and scalars are replaced wholesale.

use serde_json::Value;

/// Merge `overlay` into `base` in place.
///
/// - Mappings merge key by key; keys missing from the overlay keep their value
/// - Lists, strings, numbers and booleans in the overlay replace the base value
/// - A `null` in the overlay leaves the base value untouched
/// - A mapping in the overlay replaces a non-mapping base value
///
/// # Example
/// ```
/// use serde_json::json;
/// use layered_config::config::merge_into;
///
/// let mut base = json!({"database": {"host": "localhost", "port": 5432}});
/// merge_into(&mut base, json!({"database": {"host": "db.internal"}}));
/// assert_eq!(base, json!({"database": {"host": "db.internal", "port": 5432}}));
/// ```
pub fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        if !value.is_null() {
                            base_map.insert(key, value);
                        }
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Merge documents in order, later documents taking precedence.
pub fn merge_all(documents: impl IntoIterator<Item = Value>) -> Value {
    documents.into_iter().fold(Value::Null, |mut merged, doc| {
        merge_into(&mut merged, doc);
        merged
    })
}
