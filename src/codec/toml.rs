use super::{Codec, FieldNaming, Recursion, integer_into_float};
use crate::error::CodecError;
use crate::schema::FieldDescriptor;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// TOML documents via the `toml` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlCodec;

impl FieldNaming for TomlCodec {
    fn tag_name(&self) -> &'static str {
        "toml"
    }
}

impl Codec for TomlCodec {
    fn format_name(&self) -> &'static str {
        "TOML"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(toml::to_string(value)?.into_bytes())
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(toml::from_str(std::str::from_utf8(bytes)?)?)
    }

    /// Datetimes become strings; everything else maps one-to-one.
    fn decode_map(&self, bytes: &[u8]) -> Result<Map<String, Value>, CodecError> {
        let table: toml::Table = toml::from_str(std::str::from_utf8(bytes)?)?;
        Ok(table_to_map(table))
    }

    fn supports_null(&self) -> bool {
        false
    }

    /// TOML has no null, so a tree holding unset `Option` or `Value` fields is decoded
    /// directly instead of round-tripping through TOML text.
    fn decode_tree<T: DeserializeOwned>(&self, tree: &Value) -> Result<T, CodecError> {
        Ok(serde_json::from_value(tree.clone())?)
    }

    fn type_exception(
        &self,
        candidate: &FieldDescriptor,
        reference: &FieldDescriptor,
    ) -> Option<Recursion> {
        integer_into_float(candidate, reference)
    }
}

fn table_to_map(table: toml::Table) -> Map<String, Value> {
    table
        .into_iter()
        .map(|(k, v)| (k, toml_to_json(v)))
        .collect()
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(table_to_map(table)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_map_converts_values() {
        let doc = br#"
            name = "x"
            when = 1979-05-27T07:32:00Z
            ratio = 0.5

            [sect]
            list = [1, 2]
        "#;
        let map = TomlCodec.decode_map(doc).unwrap();
        assert_eq!(map["name"], json!("x"));
        assert_eq!(map["when"], json!("1979-05-27T07:32:00Z"));
        assert_eq!(map["ratio"], json!(0.5));
        assert_eq!(map["sect"], json!({"list": [1, 2]}));
    }

    #[test]
    fn test_decode_map_invalid_utf8() {
        assert!(matches!(
            TomlCodec.decode_map(&[0xff, 0xfe]),
            Err(CodecError::Utf8(_))
        ));
    }

    #[test]
    fn test_decode_tree_accepts_null() {
        #[derive(serde::Deserialize)]
        struct Opt {
            a: Option<i64>,
            extra: Value,
        }

        let tree = json!({"a": null, "extra": null});
        assert!(TomlCodec.encode(&tree).is_err());
        let opt: Opt = TomlCodec.decode_tree(&tree).unwrap();
        assert_eq!(opt.a, None);
        assert_eq!(opt.extra, Value::Null);
    }

    #[test]
    fn test_encode_nested_table() {
        let bytes = TomlCodec.encode(&json!({"a": 1, "sect": {"b": "c"}})).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("[sect]"));
        assert!(text.contains("b = \"c\""));
    }
}
