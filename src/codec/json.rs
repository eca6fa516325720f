use super::{Codec, FieldNaming, Recursion};
use crate::error::CodecError;
use crate::schema::{FieldDescriptor, Kind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

/// JSON documents via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl FieldNaming for JsonCodec {
    fn tag_name(&self) -> &'static str {
        "json"
    }
}

impl Codec for JsonCodec {
    fn format_name(&self) -> &'static str {
        "JSON"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec_pretty(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Whole floats like `2.0` become integers so they can fill integer fields.
    fn decode_map(&self, bytes: &[u8]) -> Result<Map<String, Value>, CodecError> {
        let mut map: Map<String, Value> = serde_json::from_slice(bytes)?;
        map.values_mut().for_each(integral_floats_to_integers);
        Ok(map)
    }

    /// JSON has a single number type, so any number satisfies any numeric field.
    fn type_exception(
        &self,
        candidate: &FieldDescriptor,
        reference: &FieldDescriptor,
    ) -> Option<Recursion> {
        let target = reference.value_kind();
        let numeric = |k: Kind| k.is_integer() || k.is_float();
        (numeric(candidate.kind) && numeric(target)).then_some(Recursion::Stop)
    }
}

fn integral_floats_to_integers(value: &mut Value) {
    match value {
        Value::Number(n) => {
            if let Some(int) = integral(n) {
                *n = int;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(integral_floats_to_integers),
        Value::Object(map) => map.values_mut().for_each(integral_floats_to_integers),
        _ => {}
    }
}

fn integral(n: &Number) -> Option<Number> {
    let f = n.as_f64().filter(|f| n.is_f64() && f.fract() == 0.0)?;
    if f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(Number::from(f as i64))
    } else if f >= 0.0 && f < u64::MAX as f64 {
        Some(Number::from(f as u64))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_map() {
        let map = JsonCodec.decode_map(br#"{"a": {"b": 1}}"#).unwrap();
        assert_eq!(map["a"], json!({"b": 1}));
    }

    #[test]
    fn test_decode_map_whole_floats_become_integers() {
        let map = JsonCodec
            .decode_map(br#"{"b": 2.0, "c": 2.5, "d": [-0.0, 3.0], "e": {"f": 1e3}}"#)
            .unwrap();
        assert_eq!(map["b"], json!(2));
        assert!(map["b"].is_i64());
        assert_eq!(map["c"], json!(2.5));
        assert_eq!(map["d"], json!([0, 3]));
        assert_eq!(map["e"]["f"], json!(1000));
    }

    #[test]
    fn test_decode_map_rejects_non_object() {
        assert!(JsonCodec.decode_map(b"[1, 2]").is_err());
    }
}
