//! Value-shape introspection.
//!
//! Rust has no runtime reflection, so every type that can act as a configuration
//! destination (or appear inside one) describes itself through [`Describe`]. The schema
//! extractor walks these descriptions to build the field list.

use serde_json::{Map, Value};
use std::any::type_name;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Semantic type tag of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    /// Signed integer of the given bit width.
    Int(u8),
    /// Unsigned integer of the given bit width.
    Uint(u8),
    Float(u8),
    String,
    Struct,
    Map,
    Slice,
    /// An optional wrapper with no value.
    Pointer,
    /// A dynamically typed value (`serde_json::Value`, including JSON `null`).
    Any,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int(8) => "int8",
            Kind::Int(16) => "int16",
            Kind::Int(32) => "int32",
            Kind::Int(64) => "int64",
            Kind::Int(_) => "int",
            Kind::Uint(8) => "uint8",
            Kind::Uint(16) => "uint16",
            Kind::Uint(32) => "uint32",
            Kind::Uint(64) => "uint64",
            Kind::Uint(_) => "uint",
            Kind::Float(32) => "float32",
            Kind::Float(_) => "float64",
            Kind::String => "string",
            Kind::Struct => "struct",
            Kind::Map => "map",
            Kind::Slice => "slice",
            Kind::Pointer => "ptr",
            Kind::Any => "interface",
        }
    }

    /// Signed and unsigned integers of any width form one family.
    pub fn is_integer(&self) -> bool {
        matches!(self, Kind::Int(_) | Kind::Uint(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Kind::Float(_))
    }

    /// Both kinds are integers, or both are floats.
    pub fn same_numeric_family(&self, other: &Kind) -> bool {
        (self.is_integer() && other.is_integer()) || (self.is_float() && other.is_float())
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static type information: the declared type name and its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: &'static str,
    pub kind: Kind,
}

impl TypeInfo {
    pub fn new(name: &'static str, kind: Kind) -> Self {
        Self { name, kind }
    }

    /// Type information for `T`, named by `std::any::type_name`.
    pub fn named<T: ?Sized>(kind: Kind) -> Self {
        Self::new(type_name::<T>(), kind)
    }

    pub fn of<T: Describe>() -> Self {
        T::type_info()
    }
}

/// Annotations attached to a record field, grouped by namespace.
///
/// `("toml", "db_pass")` renames the field for the TOML codec, `("serde", ...)` for
/// every codec, and `("conf", "optional,string")` marks it optional with an explicit
/// expected type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldAttrs(Vec<(&'static str, &'static str)>);

impl FieldAttrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, namespace: &'static str, value: &'static str) -> Self {
        self.0.push((namespace, value));
        self
    }

    /// The value for `namespace`, if annotated.
    pub fn get(&self, namespace: &str) -> Option<&'static str> {
        self.0
            .iter()
            .find(|(ns, _)| *ns == namespace)
            .map(|(_, value)| *value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One named field of a record.
pub struct Field<'a> {
    pub name: &'static str,
    pub attrs: FieldAttrs,
    pub value: &'a dyn Describe,
    /// Fields that are not exposed to documents are skipped entirely.
    pub exposed: bool,
}

impl<'a> Field<'a> {
    pub fn new(name: &'static str, value: &'a dyn Describe) -> Self {
        Self {
            name,
            attrs: FieldAttrs::new(),
            value,
            exposed: true,
        }
    }

    /// A field that exists on the type but is never read from documents.
    pub fn hidden(name: &'static str, value: &'a dyn Describe) -> Self {
        Self {
            exposed: false,
            ..Self::new(name, value)
        }
    }

    pub fn attr(mut self, namespace: &'static str, value: &'static str) -> Self {
        self.attrs = self.attrs.with(namespace, value);
        self
    }
}

/// Produces a stand-in instance used to describe an absent optional value.
pub type Placeholder = fn() -> Option<Box<dyn Describe>>;

/// How a value looks to the schema extractor.
pub enum Shape<'a> {
    /// A scalar or a sequence. Never recursed into.
    Leaf(TypeInfo),
    /// Decodes from a single string regardless of its internal structure.
    Text(TypeInfo),
    /// Named fields.
    Record(TypeInfo, Vec<Field<'a>>),
    /// String-keyed entries and the static type of their values.
    Map(TypeInfo, TypeInfo, Vec<(&'a str, &'a dyn Describe)>),
    /// An optional wrapper; `None` payload means the value is absent.
    Wrapped {
        wrapper: TypeInfo,
        inner: TypeInfo,
        payload: Option<&'a dyn Describe>,
        placeholder: Placeholder,
    },
}

impl Shape<'_> {
    pub fn type_info(&self) -> TypeInfo {
        match self {
            Shape::Leaf(info) | Shape::Text(info) | Shape::Record(info, _) => *info,
            Shape::Map(info, _, _) => *info,
            Shape::Wrapped { wrapper, .. } => *wrapper,
        }
    }
}

/// Self-description of a configuration value.
pub trait Describe {
    /// Type information available without an instance.
    fn type_info() -> TypeInfo
    where
        Self: Sized;

    /// The shape of this particular value.
    fn shape(&self) -> Shape<'_>;

    /// A default-constructed instance, used to describe the fields of an optional
    /// section that is currently `None`.
    fn placeholder() -> Option<Box<dyn Describe>>
    where
        Self: Sized,
    {
        None
    }

    /// Dynamic-map destinations expose their map so loading can merge into it directly.
    fn as_dynamic_map(&mut self) -> Option<&mut Map<String, Value>> {
        None
    }
}

macro_rules! describe_leaf {
    ($($ty:ty => $kind:expr),* $(,)?) => {
        $(
            impl Describe for $ty {
                fn type_info() -> TypeInfo {
                    TypeInfo::named::<$ty>($kind)
                }

                fn shape(&self) -> Shape<'_> {
                    Shape::Leaf(Self::type_info())
                }
            }
        )*
    };
}

describe_leaf! {
    bool => Kind::Bool,
    i8 => Kind::Int(8),
    i16 => Kind::Int(16),
    i32 => Kind::Int(32),
    i64 => Kind::Int(64),
    isize => Kind::Int(0),
    u8 => Kind::Uint(8),
    u16 => Kind::Uint(16),
    u32 => Kind::Uint(32),
    u64 => Kind::Uint(64),
    usize => Kind::Uint(0),
    f32 => Kind::Float(32),
    f64 => Kind::Float(64),
    char => Kind::String,
    String => Kind::String,
    PathBuf => Kind::String,
}

macro_rules! describe_text {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Describe for $ty {
                fn type_info() -> TypeInfo {
                    TypeInfo::named::<$ty>(Kind::Struct)
                }

                fn shape(&self) -> Shape<'_> {
                    Shape::Text(Self::type_info())
                }
            }
        )*
    };
}

describe_text! {
    IpAddr,
    SocketAddr,
    chrono::NaiveDate,
    chrono::NaiveDateTime,
}

impl<Tz: chrono::TimeZone> Describe for chrono::DateTime<Tz> {
    fn type_info() -> TypeInfo {
        TypeInfo::named::<Self>(Kind::Struct)
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Text(Self::type_info())
    }
}

impl<T: Describe> Describe for Option<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::named::<Self>(Kind::Pointer)
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Wrapped {
            wrapper: Self::type_info(),
            inner: T::type_info(),
            payload: self.as_ref().map(|v| v as &dyn Describe),
            placeholder: T::placeholder,
        }
    }
}

impl<T: Describe> Describe for Box<T> {
    fn type_info() -> TypeInfo {
        T::type_info()
    }

    fn shape(&self) -> Shape<'_> {
        (**self).shape()
    }

    fn placeholder() -> Option<Box<dyn Describe>> {
        T::placeholder()
    }
}

impl<T> Describe for Vec<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::named::<Self>(Kind::Slice)
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Leaf(Self::type_info())
    }
}

impl<V: Describe> Describe for HashMap<String, V> {
    fn type_info() -> TypeInfo {
        TypeInfo::named::<Self>(Kind::Map)
    }

    fn shape(&self) -> Shape<'_> {
        let entries = self
            .iter()
            .map(|(k, v)| (k.as_str(), v as &dyn Describe))
            .collect();
        Shape::Map(Self::type_info(), V::type_info(), entries)
    }
}

impl<V: Describe> Describe for BTreeMap<String, V> {
    fn type_info() -> TypeInfo {
        TypeInfo::named::<Self>(Kind::Map)
    }

    fn shape(&self) -> Shape<'_> {
        let entries = self
            .iter()
            .map(|(k, v)| (k.as_str(), v as &dyn Describe))
            .collect();
        Shape::Map(Self::type_info(), V::type_info(), entries)
    }
}

impl Describe for Value {
    fn type_info() -> TypeInfo {
        TypeInfo::named::<Value>(Kind::Any)
    }

    fn shape(&self) -> Shape<'_> {
        match self {
            Value::Null => Shape::Leaf(Self::type_info()),
            Value::Bool(_) => Shape::Leaf(bool::type_info()),
            Value::Number(n) if n.is_i64() => Shape::Leaf(i64::type_info()),
            Value::Number(n) if n.is_u64() => Shape::Leaf(u64::type_info()),
            Value::Number(_) => Shape::Leaf(f64::type_info()),
            Value::String(_) => Shape::Leaf(String::type_info()),
            Value::Array(_) => Shape::Leaf(TypeInfo::named::<Vec<Value>>(Kind::Slice)),
            Value::Object(map) => map.shape(),
        }
    }
}

impl Describe for Map<String, Value> {
    fn type_info() -> TypeInfo {
        TypeInfo::named::<Self>(Kind::Map)
    }

    fn shape(&self) -> Shape<'_> {
        let entries = self
            .iter()
            .map(|(k, v)| (k.as_str(), v as &dyn Describe))
            .collect();
        Shape::Map(Self::type_info(), Value::type_info(), entries)
    }

    fn as_dynamic_map(&mut self) -> Option<&mut Map<String, Value>> {
        Some(self)
    }
}

/// Implements [`Describe`] for a struct by listing its document-visible fields.
///
/// Each field may carry annotations as `namespace = "value"` pairs. A leading
/// `default` marker also lets an absent `Option<Self>` describe its fields through
/// `Default::default()`. A field marked `#[hidden]` is listed but never read from
/// documents.
///
/// ```
/// use layerconf::describe_record;
///
/// #[derive(Default)]
/// struct Database {
///     password: String,
///     pool_size: u32,
///     connections: u32,
/// }
///
/// describe_record!(default Database {
///     password { serde = "pass" },
///     pool_size { conf = "optional" },
///     #[hidden] connections,
/// });
/// ```
#[macro_export]
macro_rules! describe_record {
    (@field hidden $name:ident, $value:expr) => {
        $crate::schema::Field::hidden(stringify!($name), $value)
    };
    (@field $name:ident, $value:expr) => {
        $crate::schema::Field::new(stringify!($name), $value)
    };
    (@impl $ty:ident { $($extra:tt)* } {
        $(
            $(#[$marker:ident])? $field:ident $({ $($ns:ident = $val:literal),* $(,)? })?
        ),* $(,)?
    }) => {
        impl $crate::Describe for $ty {
            fn type_info() -> $crate::TypeInfo {
                $crate::TypeInfo::named::<$ty>($crate::Kind::Struct)
            }

            fn shape(&self) -> $crate::Shape<'_> {
                $crate::Shape::Record(
                    <Self as $crate::Describe>::type_info(),
                    ::std::vec![
                        $(
                            $crate::describe_record!(@field $($marker)? $field, &self.$field)
                                $($(.attr(stringify!($ns), $val))*)?
                        ),*
                    ],
                )
            }

            $($extra)*
        }
    };
    (default $ty:ident { $($body:tt)* }) => {
        $crate::describe_record!(@impl $ty {
            fn placeholder() -> ::core::option::Option<::std::boxed::Box<dyn $crate::Describe>> {
                ::core::option::Option::Some(::std::boxed::Box::new(
                    <$ty as ::core::default::Default>::default(),
                ))
            }
        } { $($body)* });
    };
    ($ty:ident { $($body:tt)* }) => {
        $crate::describe_record!(@impl $ty {} { $($body)* });
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_names() {
        assert_eq!(Kind::Int(64).as_str(), "int64");
        assert_eq!(Kind::Uint(16).as_str(), "uint16");
        assert_eq!(Kind::Float(32).as_str(), "float32");
        assert_eq!(Kind::Pointer.as_str(), "ptr");
        assert_eq!(Kind::Any.to_string(), "interface");
    }

    #[test]
    fn test_numeric_family() {
        assert!(Kind::Int(8).same_numeric_family(&Kind::Uint(64)));
        assert!(Kind::Float(32).same_numeric_family(&Kind::Float(64)));
        assert!(!Kind::Float(64).same_numeric_family(&Kind::Int(64)));
        assert!(!Kind::String.same_numeric_family(&Kind::String));
    }

    #[test]
    fn test_value_shapes() {
        assert_eq!(json!(1).shape().type_info().kind, Kind::Int(64));
        assert_eq!(json!(1.5).shape().type_info().kind, Kind::Float(64));
        assert_eq!(json!(u64::MAX).shape().type_info().kind, Kind::Uint(64));
        assert_eq!(json!("x").shape().type_info().kind, Kind::String);
        assert_eq!(json!([1]).shape().type_info().kind, Kind::Slice);
        assert_eq!(json!({}).shape().type_info().kind, Kind::Map);
        assert_eq!(Value::Null.shape().type_info().kind, Kind::Any);
    }

    #[test]
    fn test_option_shape() {
        let none: Option<String> = None;
        match none.shape() {
            Shape::Wrapped { inner, payload, .. } => {
                assert_eq!(inner.kind, Kind::String);
                assert!(payload.is_none());
            }
            _ => panic!("expected wrapped shape"),
        }

        let some = Some(3u16);
        match some.shape() {
            Shape::Wrapped { payload, .. } => {
                assert_eq!(payload.unwrap().shape().type_info().kind, Kind::Uint(16));
            }
            _ => panic!("expected wrapped shape"),
        }
    }

    #[test]
    fn test_field_attrs_lookup() {
        let attrs = FieldAttrs::new()
            .with("toml", "db_pass")
            .with("conf", "optional");
        assert_eq!(attrs.get("toml"), Some("db_pass"));
        assert_eq!(attrs.get("conf"), Some("optional"));
        assert_eq!(attrs.get("json"), None);
    }
}
