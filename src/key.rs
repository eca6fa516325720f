//! Key paths and alias-aware key matching.
//!
//! A plain [`Key`] is what callers write (`["DB", "Password"]`). An [`AliasedKey`] is
//! what the schema knows: every path segment may be spelled several ways (the Rust
//! field name, a rename annotation) and all spellings compare case-insensitively.

use serde::{Serialize, Serializer};
use std::fmt;

/// Case-insensitive string comparison using Unicode lowercase folding.
pub fn eq_fold(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// A plain field path, one spelling per segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Key(Vec<String>);

impl Key {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Parse a dot-separated path like `db.password`.
    pub fn parse(dotted: &str) -> Self {
        Self::new(dotted.split('.'))
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A key is well formed when it has at least one segment and no segment is empty.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|part| !part.is_empty())
    }

    pub fn push(&mut self, part: impl Into<String>) {
        self.0.push(part.into());
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<S: Into<String>> FromIterator<S> for Key {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl From<&str> for Key {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

impl From<&[&str]> for Key {
    fn from(parts: &[&str]) -> Self {
        Self::new(parts.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Key {
    fn from(parts: [&str; N]) -> Self {
        Self::new(parts)
    }
}

/// Equivalent spellings of one path segment.
///
/// The last spelling is the preferred one: an explicit rename is always pushed after
/// the declared field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyComponent(Vec<String>);

impl KeyComponent {
    pub fn new(spelling: impl Into<String>) -> Self {
        Self(vec![spelling.into()])
    }

    /// Add an alternative spelling, which becomes the preferred one.
    pub fn push_alias(&mut self, alias: impl Into<String>) {
        self.0.push(alias.into());
    }

    pub fn spellings(&self) -> &[String] {
        &self.0
    }

    pub fn preferred(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// The spelling the component was created with.
    pub fn declared(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    /// True iff any spelling of `self` case-insensitively equals any spelling of `other`.
    pub fn matches(&self, other: &KeyComponent) -> bool {
        self.0
            .iter()
            .any(|mine| other.0.iter().any(|theirs| eq_fold(mine, theirs)))
    }

    /// True iff any spelling case-insensitively equals `spelling`.
    pub fn matches_str(&self, spelling: &str) -> bool {
        self.0.iter().any(|mine| eq_fold(mine, spelling))
    }
}

/// A full path where each segment may carry several spellings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AliasedKey(Vec<KeyComponent>);

impl AliasedKey {
    pub fn new(components: Vec<KeyComponent>) -> Self {
        Self(components)
    }

    pub fn components(&self) -> &[KeyComponent] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new key one component longer than `self`.
    pub fn child(&self, component: KeyComponent) -> Self {
        let mut components = self.0.clone();
        components.push(component);
        Self(components)
    }

    /// Same length, and every position shares at least one spelling.
    pub fn matches(&self, other: &AliasedKey) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(&other.0).all(|(a, b)| a.matches(b))
    }

    /// True if the leading components of `self` match all of `prefix`.
    pub fn has_prefix(&self, prefix: &AliasedKey) -> bool {
        prefix.0.len() <= self.0.len()
            && self.0.iter().zip(&prefix.0).all(|(a, b)| a.matches(b))
    }

    /// The key spelled with each segment's preferred spelling.
    pub fn preferred(&self) -> Key {
        self.0.iter().map(|c| c.preferred().to_string()).collect()
    }

    /// The key spelled with each segment's original spelling.
    pub fn declared(&self) -> Key {
        self.0.iter().map(|c| c.declared().to_string()).collect()
    }

    /// Keep the first `len` components.
    pub fn truncated(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Append plain segments after this key.
    pub fn extended_with(&self, rest: &[String]) -> Self {
        let mut components = self.0.clone();
        components.extend(rest.iter().map(KeyComponent::new));
        Self(components)
    }
}

impl From<&Key> for AliasedKey {
    fn from(key: &Key) -> Self {
        Self(key.parts().iter().map(KeyComponent::new).collect())
    }
}

impl fmt::Display for AliasedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.preferred())
    }
}
