//! Schema extraction.
//!
//! A [`Schema`] is the flat, depth-first list of fields reachable from a value. Each
//! [`FieldDescriptor`] knows its aliased key, its declared type and whether it may be
//! left unset. Parents always precede their children, and a child points back to its
//! parent by index.

mod describe;

pub use describe::{Describe, Field, FieldAttrs, Kind, Placeholder, Shape, TypeInfo};

use crate::codec::FieldNaming;
use crate::key::{AliasedKey, KeyComponent};
use std::fmt;
use std::ops::Index;

/// Annotation namespace read for `optional` and explicit type markers.
pub const DEFAULT_TAG_NAME: &str = "conf";

/// One field of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub key: AliasedKey,
    pub optional: bool,
    /// Declared type name, for diagnostics.
    pub declared_type: &'static str,
    pub kind: Kind,
    /// Value type of a map, or pointee of an absent optional.
    pub inner: Option<TypeInfo>,
    /// Explicit expected type name from an annotation.
    pub expected_type: Option<String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl FieldDescriptor {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The kind of the value this field holds, looking through an absent optional.
    pub fn value_kind(&self) -> Kind {
        match (self.kind, self.inner) {
            (Kind::Pointer, Some(inner)) => inner.kind,
            (kind, _) => kind,
        }
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.key, self.declared_type)?;
        if let Some(expected) = &self.expected_type {
            write!(f, ", expects {expected}")?;
        }
        if self.optional {
            write!(f, ", optional")?;
        }
        write!(f, ")")
    }
}

/// Flat field list in depth-first order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldDescriptor> {
        self.fields.iter()
    }

    /// Index of the field whose key matches `key`.
    pub fn find(&self, key: &AliasedKey) -> Option<usize> {
        self.fields.iter().position(|f| f.key.matches(key))
    }

    pub fn field(&self, key: &AliasedKey) -> Option<&FieldDescriptor> {
        self.find(key).map(|i| &self.fields[i])
    }

    pub(crate) fn set_optional(&mut self, index: usize) {
        if let Some(field) = self.fields.get_mut(index) {
            field.optional = true;
        }
    }

    fn push(&mut self, field: FieldDescriptor) -> usize {
        let index = self.fields.len();
        if let Some(parent) = field.parent {
            self.fields[parent].children.push(index);
        }
        self.fields.push(field);
        index
    }
}

impl Index<usize> for Schema {
    type Output = FieldDescriptor;

    fn index(&self, index: usize) -> &FieldDescriptor {
        &self.fields[index]
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a FieldDescriptor;
    type IntoIter = std::slice::Iter<'a, FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Parsed `optional[,type]` annotation.
#[derive(Debug, Default, PartialEq, Eq)]
struct FieldTag {
    optional: bool,
    expected_type: Option<String>,
}

impl FieldTag {
    fn parse(tag: &str) -> Self {
        let mut parts = tag.split(',');
        let optional = parts.next().is_some_and(|p| p.trim() == "optional");
        let expected_type = parts
            .next()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Self {
            optional,
            expected_type,
        }
    }
}

/// Walks a value's [`Shape`] and produces its [`Schema`].
pub struct SchemaExtractor<'a> {
    tag_name: &'a str,
    naming: &'a dyn FieldNaming,
}

impl<'a> SchemaExtractor<'a> {
    pub fn new(tag_name: &'a str, naming: &'a dyn FieldNaming) -> Self {
        Self { tag_name, naming }
    }

    pub fn tag_name(&self) -> &str {
        self.tag_name
    }

    pub fn naming(&self) -> &dyn FieldNaming {
        self.naming
    }

    pub fn extract(&self, value: &dyn Describe) -> Schema {
        let mut schema = Schema::default();
        self.walk_children(value.shape(), &AliasedKey::default(), None, &mut schema);
        schema
    }

    fn walk_children(
        &self,
        shape: Shape<'_>,
        prefix: &AliasedKey,
        parent: Option<usize>,
        schema: &mut Schema,
    ) {
        match shape {
            Shape::Record(_, fields) => {
                for field in fields {
                    if !field.exposed || self.naming.is_field_ignored(&field.attrs) {
                        continue;
                    }
                    let mut component = KeyComponent::new(field.name);
                    if let Some(alias) = self.naming.field_alias(&field.attrs) {
                        component.push_alias(alias);
                    }
                    let tag = field
                        .attrs
                        .get(self.tag_name)
                        .map(FieldTag::parse)
                        .unwrap_or_default();
                    self.add_field(prefix.child(component), tag, field.value, parent, schema);
                }
            }
            Shape::Map(_, _, mut entries) => {
                entries.sort_by(|a, b| a.0.cmp(b.0));
                for (name, value) in entries {
                    let key = prefix.child(KeyComponent::new(name));
                    self.add_field(key, FieldTag::default(), value, parent, schema);
                }
            }
            Shape::Wrapped {
                payload: Some(inner),
                ..
            } => self.walk_children(inner.shape(), prefix, parent, schema),
            Shape::Leaf(_) | Shape::Text(_) | Shape::Wrapped { .. } => {}
        }
    }

    fn add_field(
        &self,
        key: AliasedKey,
        tag: FieldTag,
        value: &dyn Describe,
        parent: Option<usize>,
        schema: &mut Schema,
    ) {
        let mut shape = value.shape();
        let mut wrapped = false;
        loop {
            match shape {
                Shape::Wrapped {
                    payload: Some(inner),
                    ..
                } => {
                    wrapped = true;
                    shape = inner.shape();
                }
                other => {
                    shape = other;
                    break;
                }
            }
        }

        let info = shape.type_info();
        let mut field = FieldDescriptor {
            key,
            optional: tag.optional || wrapped,
            declared_type: info.name,
            kind: info.kind,
            inner: None,
            expected_type: tag.expected_type,
            parent,
            children: Vec::new(),
        };

        match shape {
            Shape::Leaf(_) => {
                schema.push(field);
            }
            Shape::Text(_) => {
                field.expected_type = Some("string".to_string());
                schema.push(field);
            }
            Shape::Map(_, value_info, _) => {
                field.inner = Some(value_info);
                let prefix = field.key.clone();
                let index = schema.push(field);
                self.walk_children(shape, &prefix, Some(index), schema);
            }
            Shape::Record(..) => {
                let prefix = field.key.clone();
                let index = schema.push(field);
                self.walk_children(shape, &prefix, Some(index), schema);
            }
            Shape::Wrapped {
                inner, placeholder, ..
            } => {
                field.optional = true;
                field.inner = Some(inner);
                let prefix = field.key.clone();
                let index = schema.push(field);
                if let Some(stand_in) = placeholder() {
                    self.walk_children(stand_in.shape(), &prefix, Some(index), schema);
                }
            }
        }
    }
}

/// Extract the schema of `value` under the given naming rules.
pub fn extract(value: &dyn Describe, tag_name: &str, naming: &dyn FieldNaming) -> Schema {
    SchemaExtractor::new(tag_name, naming).extract(value)
}
