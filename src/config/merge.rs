//! Map merging for layered configuration sources.
//!
//! [`merge_maps`] folds one decoded document into the accumulator leaf by leaf and
//! reports which keys it wrote. [`deep_merge`] overlays a finished tree onto another
//! and is used to lay the accumulator over values already held by the destination.

use crate::error::{LoadError, LoadResult};
use crate::key::{AliasedKey, Key, eq_fold};
use crate::schema::{Kind, Schema, SchemaExtractor};
use serde_json::{Map, Value};

/// Write `value` at `key`, creating intermediate tables as needed.
///
/// Segments are respelled with the preferred spelling of the longest prefix of `key`
/// known to `reference`, and an existing entry whose name matches a segment
/// case-insensitively is reused. Returns the key as written.
pub fn set_by_key(
    dst: &mut Map<String, Value>,
    key: &Key,
    value: Value,
    reference: &Schema,
    origin: &str,
) -> LoadResult<Key> {
    if !key.is_well_formed() {
        return Err(LoadError::invalid_argument(format!(
            "{origin}: malformed key '{key}'"
        )));
    }

    let parts = normalize(key, reference);
    let (leaf, branches) = parts
        .split_last()
        .ok_or_else(|| LoadError::invalid_argument(format!("{origin}: empty key")))?;

    let mut written = Key::default();
    let mut current = dst;
    for part in branches {
        let slot = existing_key(current, part).unwrap_or_else(|| part.clone());
        written.push(slot.clone());
        let entry = current.entry(slot).or_insert(Value::Null);
        if entry.is_null() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => {
                return Err(LoadError::StructureConflict {
                    origin: origin.to_string(),
                    key: key.to_string(),
                    at: written.to_string(),
                });
            }
        };
    }

    let slot = existing_key(current, leaf).unwrap_or_else(|| leaf.clone());
    written.push(slot.clone());
    current.insert(slot, value);
    Ok(written)
}

fn normalize(key: &Key, reference: &Schema) -> Vec<String> {
    let parts = key.parts();
    for len in (1..=parts.len()).rev() {
        let prefix = AliasedKey::from(&Key::new(parts[..len].iter().cloned()));
        if let Some(field) = reference.field(&prefix) {
            let mut normalized = field.key.preferred().parts().to_vec();
            normalized.extend_from_slice(&parts[len..]);
            return normalized;
        }
    }
    parts.to_vec()
}

fn existing_key(map: &Map<String, Value>, part: &str) -> Option<String> {
    map.keys().find(|k| eq_fold(k, part)).cloned()
}

/// Merge the leaves of `src` into `dst`, overwriting values at the same key.
///
/// Non-empty tables are never copied as a whole; an empty table is copied only when
/// `dst` has nothing at that key yet. Returns the source keys of every leaf written.
pub fn merge_maps(
    dst: &mut Map<String, Value>,
    src: &Map<String, Value>,
    reference: &Schema,
    extractor: &SchemaExtractor<'_>,
    origin: &str,
) -> LoadResult<Vec<Key>> {
    let src_fields = extractor.extract(src);
    let dst_fields = extractor.extract(&*dst);

    let mut merged = Vec::new();
    for field in &src_fields {
        if field.kind == Kind::Map {
            if !field.is_leaf() {
                continue;
            }
            if dst_fields.find(&field.key).is_some() {
                continue;
            }
        }

        let key = field.key.declared();
        let Some(value) = lookup(src, &key) else {
            continue;
        };
        set_by_key(dst, &key, value.clone(), reference, origin)?;
        merged.push(key);
    }
    Ok(merged)
}

/// Value at `key`, following nested tables by exact spelling.
pub fn lookup<'a>(map: &'a Map<String, Value>, key: &Key) -> Option<&'a Value> {
    let (last, branches) = key.parts().split_last()?;
    let mut current = map;
    for part in branches {
        current = current.get(part)?.as_object()?;
    }
    current.get(last)
}

/// Deep merge two JSON values, with `overlay` taking precedence over `base`.
///
/// - Objects are merged recursively: keys in overlay override keys in base
/// - Arrays, strings, numbers, booleans are replaced entirely
/// - An explicit null in overlay replaces the base value; an omitted key keeps it
///
/// # Example
/// ```
/// use serde_json::json;
/// use layerconf::config::deep_merge;
///
/// let encoded = json!({
///     "server": { "port": 8080, "host": "localhost" },
///     "peers": ["a", "b"]
/// });
/// let loaded = json!({
///     "server": { "port": 9000 },
///     "peers": ["c"]
/// });
/// let result = deep_merge(encoded, loaded);
/// assert_eq!(result, json!({ "server": { "port": 9000, "host": "localhost" }, "peers": ["c"] }));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = if let Some(base_value) = base_map.remove(&key) {
                    deep_merge(base_value, overlay_value)
                } else {
                    overlay_value
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Remove null entries from a tree, for formats that cannot write them.
pub fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => {
            items.retain(|v| !v.is_null());
            items.iter_mut().for_each(strip_nulls);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TomlCodec;
    use crate::describe_record;
    use crate::schema::{DEFAULT_TAG_NAME, extract};
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn merge(dst: &mut Map<String, Value>, src: Value) -> Vec<String> {
        let extractor = SchemaExtractor::new(DEFAULT_TAG_NAME, &TomlCodec);
        merge_maps(dst, &obj(src), &Schema::default(), &extractor, "test")
            .unwrap()
            .iter()
            .map(|k| k.to_string())
            .collect()
    }

    struct Db {
        password: String,
    }

    describe_record!(Db {
        password { toml = "pass" },
    });

    struct Conf {
        db: Db,
        labels: std::collections::HashMap<String, String>,
    }

    describe_record!(Conf {
        db { toml = "database" },
        labels,
    });

    fn conf_schema() -> Schema {
        let conf = Conf {
            db: Db {
                password: String::new(),
            },
            labels: Default::default(),
        };
        extract(&conf, DEFAULT_TAG_NAME, &TomlCodec)
    }

    #[test]
    fn test_set_by_key_prefers_alias() {
        let mut dst = Map::new();
        let written =
            set_by_key(&mut dst, &Key::parse("DB.Password"), json!("x"), &conf_schema(), "t")
                .unwrap();
        assert_eq!(written.to_string(), "database.pass");
        assert_eq!(Value::Object(dst), json!({"database": {"pass": "x"}}));
    }

    #[test]
    fn test_set_by_key_normalizes_prefix_under_map() {
        let mut dst = Map::new();
        set_by_key(&mut dst, &Key::parse("LABELS.Env"), json!("prod"), &conf_schema(), "t")
            .unwrap();
        assert_eq!(Value::Object(dst), json!({"labels": {"Env": "prod"}}));
    }

    #[test]
    fn test_set_by_key_reuses_existing_spelling() {
        let mut dst = obj(json!({"Sect": {"Key": 1}}));
        let written =
            set_by_key(&mut dst, &Key::parse("sect.key"), json!(2), &Schema::default(), "t")
                .unwrap();
        assert_eq!(written.to_string(), "Sect.Key");
        assert_eq!(Value::Object(dst), json!({"Sect": {"Key": 2}}));
    }

    #[test]
    fn test_set_by_key_replaces_null_intermediate() {
        let mut dst = obj(json!({"a": null}));
        set_by_key(&mut dst, &Key::parse("a.b"), json!(1), &Schema::default(), "t").unwrap();
        assert_eq!(Value::Object(dst), json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_set_by_key_scalar_intermediate_conflicts() {
        let mut dst = obj(json!({"a": 5}));
        let err = set_by_key(&mut dst, &Key::parse("a.b"), json!(1), &Schema::default(), "t")
            .unwrap_err();
        match err {
            LoadError::StructureConflict { key, at, .. } => {
                assert_eq!(key, "a.b");
                assert_eq!(at, "a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_set_by_key_rejects_empty_key() {
        let mut dst = Map::new();
        let err = set_by_key(&mut dst, &Key::default(), json!(1), &Schema::default(), "t")
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidArgument(_)));
    }

    #[test]
    fn test_merge_copies_leaves_only() {
        let mut dst = obj(json!({"a": {"x": 1, "y": 2}}));
        let merged = merge(&mut dst, json!({"a": {"x": 10}, "b": true}));
        assert_eq!(merged, vec!["a.x", "b"]);
        assert_eq!(Value::Object(dst), json!({"a": {"x": 10, "y": 2}, "b": true}));
    }

    #[test]
    fn test_empty_table_does_not_clobber() {
        let mut dst = obj(json!({"sect1": {"a1": "default"}}));
        let merged = merge(&mut dst, json!({"sect1": {}}));
        assert!(merged.is_empty());
        assert_eq!(Value::Object(dst), json!({"sect1": {"a1": "default"}}));
    }

    #[test]
    fn test_empty_table_is_copied_when_new() {
        let mut dst = Map::new();
        let merged = merge(&mut dst, json!({"sect": {}}));
        assert_eq!(merged, vec!["sect"]);
        assert_eq!(Value::Object(dst), json!({"sect": {}}));
    }

    #[test]
    fn test_arrays_replaced_not_merged() {
        let mut dst = obj(json!({"items": [1, 2, 3]}));
        merge(&mut dst, json!({"items": [4, 5]}));
        assert_eq!(Value::Object(dst), json!({"items": [4, 5]}));
    }

    #[test]
    fn test_later_source_wins() {
        let mut dst = Map::new();
        merge(&mut dst, json!({"a": {"x": 1}}));
        merge(&mut dst, json!({"a": {"x": 2}}));
        assert_eq!(Value::Object(dst), json!({"a": {"x": 2}}));
    }

    #[test]
    fn test_lookup() {
        let map = obj(json!({"a": {"b": {"c": 3}}, "d": 4}));
        assert_eq!(lookup(&map, &Key::parse("a.b.c")), Some(&json!(3)));
        assert_eq!(lookup(&map, &Key::parse("d.x")), None);
        assert_eq!(lookup(&map, &Key::default()), None);
    }

    #[test]
    fn test_deep_merge_null_clears_base() {
        let base = json!({"a": 1, "b": {"c": 2, "d": 3}});
        let overlay = json!({"a": null, "b": {"c": null}});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"a": null, "b": {"c": null, "d": 3}})
        );
    }

    #[test]
    fn test_strip_nulls() {
        let mut tree = json!({"a": null, "b": {"c": null, "d": [1, null]}, "e": 0});
        strip_nulls(&mut tree);
        assert_eq!(tree, json!({"b": {"d": [1]}, "e": 0}));
    }

    #[test]
    fn test_deep_merge_nested() {
        let base = json!({"server": {"host": "localhost", "port": 8080}, "debug": true});
        let overlay = json!({"server": {"port": 9000}});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"server": {"host": "localhost", "port": 9000}, "debug": true})
        );
    }

    #[test]
    fn test_deep_merge_replaces_primitive_with_object() {
        let base = json!({"value": 42});
        let overlay = json!({"value": {"nested": true}});
        assert_eq!(deep_merge(base, overlay), json!({"value": {"nested": true}}));
    }
}
