//! Layered configuration loading.
//!
//! Sources are applied lowest to highest priority:
//! 1. **Defaults** - programmatic values; a default makes its field optional
//! 2. **Documents** - decoded in order, later documents overriding earlier ones
//! 3. **Environment** - one variable per overridden key
//!
//! Every source is checked against the destination's schema before it is merged, so
//! misspelled keys and wrongly typed values fail the load with the source named.

use super::env::{EnvOverride, EnvSource, ProcessEnv};
use super::merge::{deep_merge, lookup, merge_maps, set_by_key, strip_nulls};
use super::provenance::{Provenances, Source};
use super::verify::verify;
use crate::codec::Codec;
use crate::error::{LoadError, LoadResult};
use crate::key::{AliasedKey, Key};
use crate::schema::{DEFAULT_TAG_NAME, Describe, FieldDescriptor, Schema, SchemaExtractor};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Read;
use tracing::{debug, info};

const DEFAULT_ORIGIN: &str = "[default]";
const MERGED_ORIGIN: &str = "merged configuration";
const DESTINATION_ORIGIN: &str = "destination";

/// One configuration document, read in full when the load runs.
pub struct Document<'a> {
    label: Option<String>,
    reader: Box<dyn Read + 'a>,
}

impl<'a> Document<'a> {
    /// An unnamed document, labelled by its position as `[i]`.
    pub fn new(reader: impl Read + 'a) -> Self {
        Self {
            label: None,
            reader: Box::new(reader),
        }
    }

    pub fn named(label: impl Into<String>, reader: impl Read + 'a) -> Self {
        Self {
            label: Some(label.into()),
            reader: Box::new(reader),
        }
    }

    /// An unnamed document over in-memory text.
    pub fn text(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl fmt::Debug for Document<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// A programmatic default for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultValue {
    pub key: Key,
    pub value: Value,
}

impl DefaultValue {
    pub fn new(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// What a successful load learned about the configuration.
#[derive(Debug, Clone)]
pub struct Metadata {
    config_map: Map<String, Value>,
    provenances: Provenances,
    fields: Schema,
    absent: Vec<usize>,
}

impl Metadata {
    /// The loaded configuration as a generic tree, including values the destination
    /// held before loading.
    pub fn config_map(&self) -> &Map<String, Value> {
        &self.config_map
    }

    pub fn into_config_map(self) -> Map<String, Value> {
        self.config_map
    }

    pub fn provenances(&self) -> &Provenances {
        &self.provenances
    }

    /// The destination's schema. Empty for dynamic destinations.
    pub fn fields(&self) -> &Schema {
        &self.fields
    }

    /// Fields no source supplied.
    pub fn absent_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.absent.iter().map(|&i| &self.fields[i])
    }

    /// Whether `key` received a value from a default, document, or environment variable.
    ///
    /// Errors if the destination has a schema and `key` is not part of it.
    pub fn is_defined(&self, key: impl Into<Key>) -> LoadResult<bool> {
        let key = key.into();
        let aliased = AliasedKey::from(&key);

        if self.absent_fields().any(|f| f.key.matches(&aliased)) {
            return Ok(false);
        }
        if self.fields.find(&aliased).is_some() {
            return Ok(true);
        }
        if self.fields.is_empty() {
            return Ok(lookup(&self.config_map, &key).is_some());
        }
        Err(LoadError::unknown_field("is_defined", key))
    }
}

/// Builder for a single load.
pub struct ConfigLoader<'a, C: Codec> {
    codec: C,
    tag_name: String,
    documents: Vec<Document<'a>>,
    defaults: Vec<DefaultValue>,
    env_overrides: Vec<EnvOverride>,
    env: Box<dyn EnvSource + 'a>,
}

impl<'a, C: Codec> ConfigLoader<'a, C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            tag_name: DEFAULT_TAG_NAME.to_string(),
            documents: Vec::new(),
            defaults: Vec::new(),
            env_overrides: Vec::new(),
            env: Box::new(ProcessEnv),
        }
    }

    /// Annotation namespace holding `optional[,type]` markers. Defaults to `conf`.
    pub fn with_tag_name(mut self, tag_name: impl Into<String>) -> Self {
        self.tag_name = tag_name.into();
        self
    }

    pub fn document(mut self, document: Document<'a>) -> Self {
        self.documents.push(document);
        self
    }

    pub fn documents(mut self, documents: impl IntoIterator<Item = Document<'a>>) -> Self {
        self.documents.extend(documents);
        self
    }

    pub fn default_value(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.defaults.push(DefaultValue::new(key, value));
        self
    }

    pub fn defaults(mut self, defaults: impl IntoIterator<Item = DefaultValue>) -> Self {
        self.defaults.extend(defaults);
        self
    }

    pub fn env_override(mut self, env_override: EnvOverride) -> Self {
        self.env_overrides.push(env_override);
        self
    }

    pub fn env_overrides(mut self, overrides: impl IntoIterator<Item = EnvOverride>) -> Self {
        self.env_overrides.extend(overrides);
        self
    }

    /// Read overrides from `env` instead of the process environment.
    pub fn with_env(mut self, env: impl EnvSource + 'a) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Run the load, populating `dest`.
    ///
    /// `dest` is either a fixed-shape value or a `serde_json::Map`. A map receives the
    /// merged sources on top of its existing entries without any schema checks.
    pub fn load<T>(self, dest: &mut T) -> LoadResult<Metadata>
    where
        T: Describe + Serialize + DeserializeOwned,
    {
        let ConfigLoader {
            codec,
            tag_name,
            documents,
            defaults,
            env_overrides,
            env,
        } = self;

        let extractor = SchemaExtractor::new(&tag_name, &codec);
        let dynamic = dest.as_dynamic_map().is_some();
        let reference = if dynamic {
            Schema::default()
        } else {
            extractor.extract(&*dest)
        };

        let mut run = LoadRun {
            codec: &codec,
            extractor: &extractor,
            reference,
            dynamic,
            accumulator: Map::new(),
            provenances: Provenances::default(),
        };

        debug!(
            format = codec.format_name(),
            fields = run.reference.len(),
            dynamic,
            "Loading configuration"
        );

        run.apply_defaults(&defaults)?;
        run.apply_documents(documents)?;
        run.apply_env_overrides(&env_overrides, &*env)?;

        let metadata = if let Some(map) = dest.as_dynamic_map() {
            run.finish_dynamic(map)?
        } else {
            run.finish_fixed(dest)?
        };

        info!(
            fields = metadata.provenances.len(),
            absent = metadata.absent.len(),
            "Configuration loaded"
        );
        debug!(provenance = %metadata.provenances, "Configuration sources");
        Ok(metadata)
    }
}

impl<C: Codec> fmt::Debug for ConfigLoader<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("format", &self.codec.format_name())
            .field("tag_name", &self.tag_name)
            .field("documents", &self.documents)
            .field("defaults", &self.defaults)
            .field("env_overrides", &self.env_overrides)
            .finish_non_exhaustive()
    }
}

/// Load `documents`, `defaults` and `env_overrides` into `dest`, reading the process
/// environment.
pub fn load<'a, C, T>(
    codec: C,
    documents: impl IntoIterator<Item = Document<'a>>,
    defaults: impl IntoIterator<Item = DefaultValue>,
    env_overrides: impl IntoIterator<Item = EnvOverride>,
    dest: &mut T,
) -> LoadResult<Metadata>
where
    C: Codec,
    T: Describe + Serialize + DeserializeOwned,
{
    ConfigLoader::new(codec)
        .documents(documents)
        .defaults(defaults)
        .env_overrides(env_overrides)
        .load(dest)
}

/// State owned by one load.
struct LoadRun<'r, C: Codec> {
    codec: &'r C,
    extractor: &'r SchemaExtractor<'r>,
    reference: Schema,
    dynamic: bool,
    accumulator: Map<String, Value>,
    provenances: Provenances,
}

impl<C: Codec> LoadRun<'_, C> {
    /// The key as the destination spells it. Fails if a fixed-shape destination has
    /// no such field.
    fn resolve(&self, key: &Key, origin: &str) -> LoadResult<(Key, Option<usize>)> {
        if !key.is_well_formed() {
            return Err(LoadError::invalid_argument(format!(
                "{origin}: malformed key '{key}'"
            )));
        }
        if self.dynamic {
            return Ok((key.clone(), None));
        }
        let index = self
            .reference
            .find(&AliasedKey::from(key))
            .ok_or_else(|| LoadError::unknown_field(origin, key))?;
        Ok((self.reference[index].key.preferred(), Some(index)))
    }

    fn check(&self, map: &Map<String, Value>, origin: &str) -> LoadResult<()> {
        if !self.dynamic {
            verify(&self.extractor.extract(map), &self.reference, self.codec, origin)?;
        }
        Ok(())
    }

    fn merge(
        &mut self,
        src: &Map<String, Value>,
        source: Source,
        origin: &str,
    ) -> LoadResult<usize> {
        let merged = merge_maps(
            &mut self.accumulator,
            src,
            &self.reference,
            self.extractor,
            origin,
        )?;
        for key in &merged {
            self.provenances.record(key, source.clone(), &self.reference);
        }
        Ok(merged.len())
    }

    fn apply_defaults(&mut self, defaults: &[DefaultValue]) -> LoadResult<()> {
        let mut scratch = Map::new();
        for default in defaults {
            let (key, index) = self.resolve(&default.key, DEFAULT_ORIGIN)?;
            if let Some(index) = index {
                self.reference.set_optional(index);
            }
            set_by_key(
                &mut scratch,
                &key,
                default.value.clone(),
                &self.reference,
                DEFAULT_ORIGIN,
            )?;
        }

        self.check(&scratch, DEFAULT_ORIGIN)?;
        let merged = self.merge(&scratch, Source::Default, DEFAULT_ORIGIN)?;
        debug!(defaults = defaults.len(), fields = merged, "Applied defaults");
        Ok(())
    }

    fn apply_documents(&mut self, documents: Vec<Document<'_>>) -> LoadResult<()> {
        for (i, document) in documents.into_iter().enumerate() {
            let Document { label, mut reader } = document;
            let label = label.unwrap_or_else(|| format!("[{i}]"));

            let mut bytes = Vec::new();
            reader
                .read_to_end(&mut bytes)
                .map_err(|source| LoadError::Io {
                    origin: label.clone(),
                    source,
                })?;
            let map = self
                .codec
                .decode_map(&bytes)
                .map_err(|e| LoadError::decode(&label, e))?;

            self.check(&map, &label)?;
            let merged = self.merge(&map, Source::Document(label.clone()), &label)?;
            debug!(document = %label, fields = merged, "Merged config document");
        }
        Ok(())
    }

    fn apply_env_overrides(
        &mut self,
        overrides: &[EnvOverride],
        env: &dyn EnvSource,
    ) -> LoadResult<()> {
        for env_override in overrides {
            if env_override.env_var.is_empty() {
                return Err(LoadError::invalid_argument(format!(
                    "empty environment variable name for '{}'",
                    env_override.key
                )));
            }
            let origin = format!("${}", env_override.env_var);
            let (key, _) = self.resolve(&env_override.key, &origin)?;

            let Some(raw) = env_override.read(env)? else {
                debug!(var = %env_override.env_var, "Environment override not set");
                continue;
            };
            let value = env_override.convert(&raw)?;

            let mut scratch = Map::new();
            set_by_key(&mut scratch, &key, value, &self.reference, &origin)?;
            self.check(&scratch, &origin)?;
            self.merge(&scratch, Source::Env(env_override.env_var.clone()), &origin)?;
            debug!(var = %env_override.env_var, key = %key, "Applied environment override");
        }
        Ok(())
    }

    fn finish_dynamic(self, dest: &mut Map<String, Value>) -> LoadResult<Metadata> {
        merge_maps(
            dest,
            &self.accumulator,
            &self.reference,
            self.extractor,
            MERGED_ORIGIN,
        )?;
        Ok(Metadata {
            config_map: dest.clone(),
            provenances: self.provenances,
            fields: self.reference,
            absent: Vec::new(),
        })
    }

    fn finish_fixed<T>(mut self, dest: &mut T) -> LoadResult<Metadata>
    where
        T: Serialize + DeserializeOwned,
    {
        let candidate = self.extractor.extract(&self.accumulator);
        let absent = verify(&candidate, &self.reference, self.codec, MERGED_ORIGIN)?;

        let mut missing = Vec::new();
        for &index in &absent {
            let field = &self.reference[index];
            let key = field.key.preferred();
            let optional = field.optional;
            let children = field.children.clone();

            if children.is_empty() {
                self.provenances.record(&key, Source::Absent, &self.reference);
            } else if optional {
                // An absent optional section does not require its children.
                for child in children {
                    self.reference.set_optional(child);
                }
            }
            if !optional {
                missing.push(key.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(LoadError::MissingRequiredFields(missing));
        }

        // Lay the accumulator over what the destination already holds, then decode
        // through the codec so its own coercions apply. An explicit null clears.
        let existing = destination_tree(dest)?;
        let accumulator = std::mem::take(&mut self.accumulator);
        let merged = deep_merge(Value::Object(existing), Value::Object(accumulator));
        *dest = self
            .codec
            .decode_tree(&merged)
            .map_err(|e| LoadError::decode(MERGED_ORIGIN, e))?;

        let mut config_map = destination_tree(dest)?;
        if !self.codec.supports_null() {
            config_map.retain(|_, v| !v.is_null());
            config_map.values_mut().for_each(strip_nulls);
        }
        Ok(Metadata {
            config_map,
            provenances: self.provenances,
            fields: self.reference,
            absent,
        })
    }
}

/// The destination as a generic tree, independent of any document format.
fn destination_tree<T: Serialize>(dest: &T) -> LoadResult<Map<String, Value>> {
    let tree = serde_json::to_value(dest).map_err(|e| LoadError::encode(DESTINATION_ORIGIN, e))?;
    match tree {
        Value::Object(map) => Ok(map),
        other => Err(LoadError::invalid_argument(format!(
            "destination must encode to a table, not {}",
            other.shape().type_info().kind
        ))),
    }
}
