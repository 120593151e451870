use serde::Serialize;
use serde_json::{Map, Value};

/// One leaf that differs between two JSON documents. `path` is dot-separated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct JsonChange {
    pub path: String,
    pub old: Value,
    pub new: Value,
}

/// Leaf-level differences from `previous` to `current`. Keys that vanished
/// are reported with a `null` new value.
pub(crate) fn diff_json(previous: &Value, current: &Value) -> Vec<JsonChange> {
    let mut changes = Vec::new();
    diff_into(previous, current, "", &mut changes);
    changes
}

fn diff_into(previous: &Value, current: &Value, prefix: &str, changes: &mut Vec<JsonChange>) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            let empty = Value::Object(Map::new());
            for (key, curr_val) in curr_map {
                let path = join(prefix, key);
                match prev_map.get(key) {
                    Some(prev_val) => diff_into(prev_val, curr_val, &path, changes),
                    None if curr_val.is_object() => diff_into(&empty, curr_val, &path, changes),
                    None => changes.push(JsonChange {
                        path,
                        old: Value::Null,
                        new: curr_val.clone(),
                    }),
                }
            }
            for (key, prev_val) in prev_map {
                if !curr_map.contains_key(key) {
                    changes.push(JsonChange {
                        path: join(prefix, key),
                        old: prev_val.clone(),
                        new: Value::Null,
                    });
                }
            }
        }
        (prev, curr) if prev != curr => changes.push(JsonChange {
            path: prefix.to_string(),
            old: prev.clone(),
            new: curr.clone(),
        }),
        _ => {}
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
