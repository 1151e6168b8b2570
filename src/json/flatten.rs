//! Dotted-path flattening/unflattening and the fold/unfold passes that
//! bridge nested documents and the `PathMap` intermediary.

use serde_json::{Map, Value};

use super::{header, infer, PathMap};

/// Flattens a document into `(dotted path, leaf value)` pairs. A leaf is any
/// non-document value; nested objects are the only thing recursed into.
/// Keys containing a literal `.` are not escaped, so the flatten/denormalize
/// round trip can collide for pathological keys. Documented, not fixed.
#[must_use]
pub(crate) fn normalize(doc: &Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    normalize_into(doc, String::new(), &mut out);
    out
}

fn normalize_into(doc: &Value, prefix: String, out: &mut Vec<(String, Value)>) {
    let Value::Object(map) = doc else {
        return;
    };
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if value.is_object() {
            normalize_into(value, path, out);
        } else {
            out.push((path, value.clone()));
        }
    }
}

/// Reverses [`normalize`]: splits each dotted key and rebuilds the nested
/// document, creating intermediate objects as needed.
#[must_use]
pub(crate) fn denormalize(flat: &[(String, Value)]) -> Value {
    let mut root = Map::new();
    for (key, value) in flat {
        let parts: Vec<&str> = key.split('.').collect();
        insert_path(&mut root, &parts, value.clone());
    }
    Value::Object(root)
}

fn insert_path(map: &mut Map<String, Value>, parts: &[&str], value: Value) {
    if let [only] = parts {
        map.insert((*only).to_string(), value);
        return;
    }
    let entry = map
        .entry(parts[0].to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(inner) = entry {
        insert_path(inner, &parts[1..], value);
    }
}

/// Scatters every bucket's values back into `n_items` rows by position, then
/// denormalizes each row's flat leaves into a nested document.
#[must_use]
pub(crate) fn fold(n_items: usize, path_map: &PathMap) -> Vec<Value> {
    let mut flats: Vec<Vec<(String, Value)>> = vec![Vec::new(); n_items];
    for (path, spec_map) in &path_map.paths {
        for bucket in spec_map.specs.values() {
            for (value, &row) in bucket.values.iter().zip(&bucket.positions) {
                if let Some(flat) = flats.get_mut(row) {
                    flat.push((path.clone(), value.clone()));
                }
            }
        }
    }
    flats.iter().map(|flat| denormalize(flat)).collect()
}

/// Builds a `PathMap` from `items` at recursion depth `depth`: flattens each
/// row, buckets each leaf by `(path, inferred spec)`, then recurses into any
/// `Tuple(...)`/`Array(...)` bucket that embeds `JSON` to build its nested
/// header eagerly (both the header and value codecs need it).
#[must_use]
pub(crate) fn unfold(items: &[Value], depth: u32) -> PathMap {
    let mut path_map = PathMap::new();
    for (row, doc) in items.iter().enumerate() {
        for (path, leaf) in normalize(doc) {
            if leaf.is_null() {
                continue;
            }
            let spec = infer::spec_for_value(&leaf, depth);
            let bucket = path_map.bucket_mut(&path, &spec);
            bucket.values.push(leaf);
            bucket.positions.push(row);
        }
    }
    build_nested_headers(&mut path_map, depth);
    path_map
}

fn build_nested_headers(path_map: &mut PathMap, depth: u32) {
    for spec_map in path_map.paths.values_mut() {
        let spec_names: Vec<String> = spec_map.specs.keys().cloned().collect();
        for spec in spec_names {
            if spec.starts_with("Array(") && spec.contains("JSON") {
                let elements: Vec<Value> = spec_map.specs[&spec]
                    .values
                    .iter()
                    .flat_map(|v| v.as_array().cloned().unwrap_or_default())
                    .collect();
                let nested = unfold(&elements, depth + 1);
                spec_map
                    .specs
                    .get_mut(&spec)
                    .expect("spec present")
                    .array_header = Some(nested);
            } else if spec.starts_with("Tuple(") && spec.contains("JSON") {
                let subspecs = header::split_tuple_subspecs(&spec);
                let mut slots = Vec::with_capacity(subspecs.len());
                for (idx, subspec) in subspecs.iter().enumerate() {
                    if subspec.starts_with("JSON") {
                        let collected: Vec<Value> = spec_map.specs[&spec]
                            .values
                            .iter()
                            .map(|v| {
                                v.as_array()
                                    .and_then(|a| a.get(idx).cloned())
                                    .unwrap_or(Value::Null)
                            })
                            .collect();
                        slots.push(Some(unfold(&collected, depth + 1)));
                    } else {
                        slots.push(None);
                    }
                }
                spec_map
                    .specs
                    .get_mut(&spec)
                    .expect("spec present")
                    .tuple_header = Some(slots);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_flattens_nested_objects_only() {
        let doc = json!({"profile": {"first_name": "John", "age": 30}, "roles": ["admin", "user"]});
        let mut flat = normalize(&doc);
        flat.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            flat,
            vec![
                ("profile.age".to_string(), json!(30)),
                ("profile.first_name".to_string(), json!("John")),
                ("roles".to_string(), json!(["admin", "user"])),
            ]
        );
    }

    #[test]
    fn denormalize_reverses_normalize() {
        let flat = vec![
            ("profile.age".to_string(), json!(30)),
            ("profile.first_name".to_string(), json!("John")),
        ];
        assert_eq!(
            denormalize(&flat),
            json!({"profile": {"age": 30, "first_name": "John"}})
        );
    }

    #[test]
    fn unfold_sorts_paths_and_specs_lexicographically() {
        let items = vec![json!({"key": 1}), json!({"key": "val"}), json!({"key": 2.0})];
        let path_map = unfold(&items, 0);
        let paths: Vec<&String> = path_map.paths.keys().collect();
        assert_eq!(paths, vec!["key"]);
        let specs: Vec<&String> = path_map.paths["key"].specs.keys().collect();
        assert_eq!(specs, vec!["Float64", "Int64", "String"]);
    }
}
