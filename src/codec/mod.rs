//! Document format collaborators.
//!
//! The loader never parses document syntax itself. A [`Codec`] turns bytes into the
//! generic `serde_json` tree and back, decodes the final destination, and supplies the
//! format's field-naming rules and type quirks.

mod json;
mod toml;
mod yaml;

pub use self::json::JsonCodec;
pub use self::toml::TomlCodec;
pub use self::yaml::YamlCodec;

use crate::error::CodecError;
use crate::schema::{FieldAttrs, FieldDescriptor};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Format-neutral annotation namespace consulted after the codec's own.
pub const SERDE_NAMESPACE: &str = "serde";

/// Whether a consistency check should look beneath a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recursion {
    Descend,
    Stop,
}

/// Field renaming and skipping rules of a document format.
pub trait FieldNaming {
    /// Annotation namespace owned by this format, like `"toml"`.
    fn tag_name(&self) -> &'static str;

    /// The raw annotation for this format, falling back to the `serde` namespace.
    fn annotation(&self, attrs: &FieldAttrs) -> Option<&'static str> {
        attrs
            .get(self.tag_name())
            .or_else(|| attrs.get(SERDE_NAMESPACE))
    }

    fn is_field_ignored(&self, attrs: &FieldAttrs) -> bool {
        self.annotation(attrs) == Some("-")
    }

    /// The renamed spelling of a field, if it has one.
    fn field_alias(&self, attrs: &FieldAttrs) -> Option<String> {
        if self.is_field_ignored(attrs) {
            return None;
        }
        self.annotation(attrs)
            .and_then(|tag| tag.split(',').next())
            .filter(|alias| !alias.is_empty())
            .map(str::to_string)
    }
}

/// A document format.
pub trait Codec: FieldNaming {
    /// Human-readable format name for logs.
    fn format_name(&self) -> &'static str;

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;

    /// Decode a document into the generic tree.
    fn decode_map(&self, bytes: &[u8]) -> Result<Map<String, Value>, CodecError> {
        self.decode(bytes)
    }

    /// Whether the format can write an explicit null.
    fn supports_null(&self) -> bool {
        true
    }

    /// Decode a merged tree into its destination type. The default round-trips the
    /// tree through this format so the format's own decoding rules apply.
    fn decode_tree<T: DeserializeOwned>(&self, tree: &Value) -> Result<T, CodecError> {
        self.decode(&self.encode(tree)?)
    }

    /// Format-specific leniency applied after the built-in type rules reject a pair.
    /// `None` rejects it.
    fn type_exception(
        &self,
        _candidate: &FieldDescriptor,
        _reference: &FieldDescriptor,
    ) -> Option<Recursion> {
        None
    }
}

/// Integers decode into float fields under every serde format.
pub(crate) fn integer_into_float(
    candidate: &FieldDescriptor,
    reference: &FieldDescriptor,
) -> Option<Recursion> {
    (candidate.kind.is_integer() && reference.value_kind().is_float()).then_some(Recursion::Stop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_from_own_namespace() {
        let attrs = FieldAttrs::new().with("toml", "db_pass,omitempty");
        assert_eq!(TomlCodec.field_alias(&attrs).as_deref(), Some("db_pass"));
        assert_eq!(JsonCodec.field_alias(&attrs), None);
    }

    #[test]
    fn test_alias_falls_back_to_serde_namespace() {
        let attrs = FieldAttrs::new().with("serde", "eh");
        assert_eq!(TomlCodec.field_alias(&attrs).as_deref(), Some("eh"));
        assert_eq!(JsonCodec.field_alias(&attrs).as_deref(), Some("eh"));
        assert_eq!(YamlCodec.field_alias(&attrs).as_deref(), Some("eh"));
    }

    #[test]
    fn test_ignored_field() {
        let attrs = FieldAttrs::new().with("json", "-");
        assert!(JsonCodec.is_field_ignored(&attrs));
        assert!(!TomlCodec.is_field_ignored(&attrs));
        assert_eq!(JsonCodec.field_alias(&attrs), None);
    }

    #[test]
    fn test_empty_alias_is_none() {
        let attrs = FieldAttrs::new().with("toml", ",omitempty");
        assert_eq!(TomlCodec.field_alias(&attrs), None);
    }
}
