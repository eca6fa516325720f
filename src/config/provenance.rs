//! Where each configuration value came from.

use crate::key::{AliasedKey, Key};
use crate::schema::Schema;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// The source of a field's final value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A document, by label.
    Document(String),
    Default,
    /// An environment variable, by name.
    Env(String),
    /// No source supplied the field.
    Absent,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Document(label) => write!(f, "{label}"),
            Source::Default => write!(f, "[default]"),
            Source::Env(var) => write!(f, "${var}"),
            Source::Absent => write!(f, "[absent]"),
        }
    }
}

impl Serialize for Source {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Source of one leaf field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    #[serde(skip)]
    aliased_key: AliasedKey,
    /// The key in preferred spelling.
    pub key: Key,
    pub source: Source,
}

impl Provenance {
    pub fn aliased_key(&self) -> &AliasedKey {
        &self.aliased_key
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}':'{}'", self.key, self.source)
    }
}

/// Sources of every leaf that was assigned or found absent.
///
/// Renders sorted by key, as `{ 'a.b':'conf.toml'; 'c':'[default]' }`, and serializes
/// as a map from key to source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provenances(Vec<Provenance>);

impl Provenances {
    /// Record `source` for `key`, replacing the entry of any key that matches it.
    ///
    /// When `reference` knows the key, the entry carries all of its spellings.
    pub fn record(&mut self, key: &Key, source: Source, reference: &Schema) {
        let mut aliased = AliasedKey::from(key);
        if let Some(field) = reference.field(&aliased) {
            aliased = field.key.clone();
        }

        if let Some(existing) = self.0.iter_mut().find(|p| p.aliased_key.matches(&aliased)) {
            existing.source = source;
            return;
        }

        self.0.push(Provenance {
            key: aliased.preferred(),
            aliased_key: aliased,
            source,
        });
    }

    /// The recorded source for `key`, under any of its spellings.
    pub fn get(&self, key: &Key) -> Option<&Source> {
        let aliased = AliasedKey::from(key);
        self.0
            .iter()
            .find(|p| p.aliased_key.matches(&aliased))
            .map(|p| &p.source)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in recording order.
    pub fn iter(&self) -> std::slice::Iter<'_, Provenance> {
        self.0.iter()
    }

    /// Entries ordered by dot-joined key.
    pub fn sorted(&self) -> Vec<&Provenance> {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by_cached_key(|p| p.key.to_string());
        entries
    }
}

impl fmt::Display for Provenances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self.sorted().iter().map(|p| p.to_string()).collect();
        write!(f, "{{ {} }}", entries.join("; "))
    }
}

impl Serialize for Provenances {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.sorted();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for p in entries {
            map.serialize_entry(&p.key, &p.source)?;
        }
        map.end()
    }
}

impl<'a> IntoIterator for &'a Provenances {
    type Item = &'a Provenance;
    type IntoIter = std::slice::Iter<'a, Provenance>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
