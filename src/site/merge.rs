//! Deep merge of site model fragments.
//!
//! | left      | right     | result                                  |
//! |-----------|-----------|-----------------------------------------|
//! | mapping   | mapping   | keys unioned, shared keys merged        |
//! | sequence  | sequence  | concatenated, left items first          |
//! | scalar    | equal     | the scalar                              |
//! | otherwise |           | [`ConfigError::Merge`]                  |

use crate::error::ConfigError;
use serde_json::{Map, Value};

/// Merge `right` into a copy of `left`. Neither operand is modified.
pub fn merge(left: &Value, right: &Value) -> Result<Value, ConfigError> {
    let mut merged = left.clone();
    merge_into(&mut merged, right.clone())?;
    Ok(merged)
}

/// In-place variant used when folding loader fragments into the site.
///
/// On error `target` may be partially merged.
pub(crate) fn merge_into(target: &mut Value, other: Value) -> Result<(), ConfigError> {
    match (target, other) {
        (Value::Object(target), Value::Object(other)) => merge_map_into(target, other),
        (Value::Array(target), Value::Array(other)) => {
            target.extend(other);
            Ok(())
        }
        (target, other) if *target == other => Ok(()),
        (target, other) => Err(ConfigError::Merge {
            left: target.to_string(),
            right: other.to_string(),
        }),
    }
}

pub(crate) fn merge_map_into(
    target: &mut Map<String, Value>,
    other: Map<String, Value>,
) -> Result<(), ConfigError> {
    for (key, value) in other {
        match target.get_mut(&key) {
            Some(existing) => merge_into(existing, value)?,
            None => {
                target.insert(key, value);
            }
        }
    }
    Ok(())
}
