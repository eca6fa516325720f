use super::{Codec, FieldNaming, Recursion, integer_into_float};
use crate::error::CodecError;
use crate::schema::FieldDescriptor;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// YAML documents via `serde_yaml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl FieldNaming for YamlCodec {
    fn tag_name(&self) -> &'static str {
        "yaml"
    }
}

impl Codec for YamlCodec {
    fn format_name(&self) -> &'static str {
        "YAML"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_yaml::to_string(value)?.into_bytes())
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_yaml::from_slice(bytes)?)
    }

    fn type_exception(
        &self,
        candidate: &FieldDescriptor,
        reference: &FieldDescriptor,
    ) -> Option<Recursion> {
        integer_into_float(candidate, reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_map() {
        let map = YamlCodec.decode_map(b"log:\n  level: debug\nport: 80\n").unwrap();
        assert_eq!(map["log"], json!({"level": "debug"}));
        assert_eq!(map["port"], json!(80));
    }

    #[test]
    fn test_encode_round_trips_through_decode_map() {
        let bytes = YamlCodec.encode(&json!({"a": [1, 2]})).unwrap();
        assert_eq!(YamlCodec.decode_map(&bytes).unwrap()["a"], json!([1, 2]));
    }
}
