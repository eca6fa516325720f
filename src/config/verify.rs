//! Consistency checks between decoded input and the destination's schema.

use crate::codec::{Codec, Recursion};
use crate::error::{LoadError, LoadResult};
use crate::key::AliasedKey;
use crate::schema::{FieldDescriptor, Kind, Schema};

/// Check every `candidate` field against `reference`.
///
/// Fails on the first field that is unknown to the reference or has an incompatible
/// type. On success returns the indices of reference fields the candidate did not
/// supply, leaving out anything beneath a field whose contents are not checked.
pub fn verify<C: Codec>(
    candidate: &Schema,
    reference: &Schema,
    codec: &C,
    origin: &str,
) -> LoadResult<Vec<usize>> {
    let mut supplied = vec![false; reference.len()];
    let mut stops: Vec<&AliasedKey> = Vec::new();

    for field in candidate {
        if stops.iter().any(|prefix| field.key.has_prefix(prefix)) {
            continue;
        }

        let index = reference
            .find(&field.key)
            .ok_or_else(|| LoadError::unknown_field(origin, field.key.declared()))?;
        supplied[index] = true;

        let gold = &reference[index];
        match field_types_consistent(field, gold, codec) {
            Some(Recursion::Stop) => stops.push(&field.key),
            Some(Recursion::Descend) => {}
            None => return Err(mismatch(field, gold, origin)),
        }
    }

    Ok(reference
        .iter()
        .enumerate()
        .filter(|(i, f)| !supplied[*i] && !stops.iter().any(|p| f.key.has_prefix(p)))
        .map(|(i, _)| i)
        .collect())
}

/// Whether a decoded `candidate` can populate `reference`, and if so, whether the
/// fields beneath it still need checking. `None` means the types are incompatible.
pub fn field_types_consistent<C: Codec>(
    candidate: &FieldDescriptor,
    reference: &FieldDescriptor,
    codec: &C,
) -> Option<Recursion> {
    // An explicit type must match exactly, and nothing beneath it is compared.
    if let Some(expected) = &reference.expected_type {
        let expected = expected.as_str();
        let matches = candidate.declared_type == expected || candidate.kind.as_str() == expected;
        return matches.then_some(Recursion::Stop);
    }

    if reference.value_kind() == Kind::Any {
        return Some(Recursion::Stop);
    }

    // JSON and YAML null leaves an optional field unset.
    if candidate.kind == Kind::Any && reference.optional {
        return Some(Recursion::Stop);
    }

    // Map entries have no structure to compare against.
    let below = if reference.value_kind() == Kind::Map {
        Recursion::Stop
    } else {
        Recursion::Descend
    };

    if candidate.declared_type == reference.declared_type || candidate.kind == reference.kind {
        return Some(below);
    }

    if reference.kind == Kind::Pointer
        && let Some(inner) = reference.inner
        && (inner.name == candidate.declared_type
            || inner.kind == candidate.kind
            || inner.kind.same_numeric_family(&candidate.kind)
            || (inner.kind == Kind::Struct && candidate.kind == Kind::Map))
    {
        return Some(below);
    }

    if reference.kind == Kind::Struct && candidate.kind == Kind::Map {
        return Some(below);
    }

    // Widths are checked when the destination is decoded.
    if reference.kind.same_numeric_family(&candidate.kind) {
        return Some(below);
    }

    // Sequence elements are not checked.
    if reference.kind == Kind::Slice && candidate.kind == Kind::Slice {
        return Some(Recursion::Stop);
    }

    codec.type_exception(candidate, reference)
}

fn mismatch(candidate: &FieldDescriptor, reference: &FieldDescriptor, origin: &str) -> LoadError {
    let expected = match &reference.expected_type {
        Some(expected) => expected.clone(),
        None => format!("{} ({})", reference.declared_type, reference.value_kind()),
    };
    LoadError::TypeMismatch {
        origin: origin.to_string(),
        key: candidate.key.declared().to_string(),
        found: candidate.kind.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{JsonCodec, TomlCodec};
    use crate::describe_record;
    use crate::schema::{DEFAULT_TAG_NAME, extract};
    use serde_json::{Value, json};
    use std::collections::HashMap;

    #[derive(Default)]
    struct Sect {
        a: String,
        b: Option<i64>,
    }

    describe_record!(default Sect {
        a { toml = "aa" },
        b,
    });

    struct Conf {
        name: String,
        count: u16,
        ratio: f64,
        tags: Vec<String>,
        when: chrono::NaiveDate,
        sect: Sect,
        extra: Option<Sect>,
        labels: HashMap<String, i32>,
        anything: Value,
    }

    describe_record!(Conf {
        name,
        count,
        ratio,
        tags,
        when,
        sect,
        extra,
        labels,
        anything,
    });

    fn reference() -> Schema {
        let conf = Conf {
            name: String::new(),
            count: 0,
            ratio: 0.0,
            tags: Vec::new(),
            when: chrono::NaiveDate::default(),
            sect: Sect::default(),
            extra: None,
            labels: HashMap::new(),
            anything: Value::Null,
        };
        extract(&conf, DEFAULT_TAG_NAME, &TomlCodec)
    }

    fn check(doc: Value) -> LoadResult<Vec<String>> {
        check_with(doc, &TomlCodec)
    }

    fn check_with<C: Codec>(doc: Value, codec: &C) -> LoadResult<Vec<String>> {
        let reference = reference();
        let candidate = extract(&doc, DEFAULT_TAG_NAME, codec);
        let absent = verify(&candidate, &reference, codec, "doc")?;
        Ok(absent
            .into_iter()
            .map(|i| reference[i].key.declared().to_string())
            .collect())
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = check(json!({"sect": {"nope": 1}})).unwrap_err();
        match err {
            LoadError::UnknownField { key, origin } => {
                assert_eq!(key, "sect.nope");
                assert_eq!(origin, "doc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_absent_fields_reported() {
        let absent = check(json!({"name": "x", "sect": {"AA": "y"}})).unwrap();
        assert!(absent.contains(&"count".to_string()));
        assert!(absent.contains(&"sect.b".to_string()));
        assert!(!absent.contains(&"sect.a".to_string()));
        assert!(!absent.contains(&"name".to_string()));
    }

    #[test]
    fn test_integer_widths_are_one_family() {
        assert!(check(json!({"count": -5})).is_ok());
    }

    #[test]
    fn test_string_for_integer_is_mismatch() {
        let err = check(json!({"count": "five"})).unwrap_err();
        match err {
            LoadError::TypeMismatch { key, found, .. } => {
                assert_eq!(key, "count");
                assert_eq!(found, "string");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_text_field_needs_string() {
        assert!(check(json!({"when": "2020-01-02"})).is_ok());
        let err = check(json!({"when": {"year": 2020}})).unwrap_err();
        assert!(matches!(err, LoadError::TypeMismatch { .. }));
    }

    #[test]
    fn test_slices_are_not_descended() {
        let absent = check(json!({"tags": ["a", 1]})).unwrap();
        assert!(!absent.contains(&"tags".to_string()));
    }

    #[test]
    fn test_map_entries_are_not_checked() {
        let absent = check(json!({"labels": {"anything": "goes"}})).unwrap();
        assert!(!absent.contains(&"labels".to_string()));
    }

    #[test]
    fn test_absent_optional_section_still_validates_keys() {
        assert!(check(json!({"extra": {"a": "x", "b": 3}})).is_ok());
        let err = check(json!({"extra": {"c": 1}})).unwrap_err();
        assert!(matches!(err, LoadError::UnknownField { .. }));
    }

    #[test]
    fn test_dynamic_field_accepts_anything() {
        assert!(check(json!({"anything": {"deep": [1, {"x": null}]}})).is_ok());
    }

    #[test]
    fn test_float_into_integer_depends_on_codec() {
        assert!(check_with(json!({"count": 1.5}), &JsonCodec).is_ok());
        assert!(matches!(
            check_with(json!({"count": 1.5}), &TomlCodec),
            Err(LoadError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_integer_into_float_accepted() {
        assert!(check(json!({"ratio": 2})).is_ok());
    }

    #[test]
    fn test_null_only_for_optional() {
        assert!(check(json!({"sect": {"b": null}})).is_ok());
        assert!(matches!(
            check(json!({"name": null})),
            Err(LoadError::TypeMismatch { .. })
        ));
    }
}
