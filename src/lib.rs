//! Layered configuration loading with per-field provenance.
//!
//! A destination type describes its fields through [`Describe`] (usually via
//! [`describe_record!`]). [`ConfigLoader`] merges defaults, documents and environment
//! overrides into it, rejecting unknown keys and mistyped values, and reports where
//! every field's value came from.

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod schema;

pub use codec::{Codec, FieldNaming, JsonCodec, TomlCodec, YamlCodec};
pub use config::{ConfigLoader, DefaultValue, Document, EnvOverride, Metadata, Source, load};
pub use error::{ErrorKind, LoadError, LoadResult};
pub use key::{AliasedKey, Key};
pub use schema::{Describe, Kind, Shape, TypeInfo};
