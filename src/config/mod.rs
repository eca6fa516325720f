//! Layered configuration loading.
//!
//! Sources are merged into one generic tree, checked against the destination's
//! schema, and decoded into the destination:
//! 1. **Defaults** - programmatic `(key, value)` pairs
//! 2. **Documents** - a primary file and optional overrides, see [`find_files`]
//! 3. **Environment** - [`EnvOverride`]s, one variable per key
//!
//! Every leaf remembers its [`Source`] in the resulting [`Metadata`].

pub mod env;
mod files;
mod loader;
mod merge;
mod provenance;
mod verify;

pub use env::{Converter, EnvOverride, EnvSource, ProcessEnv};
pub use files::{FileLocation, FoundFile, default_search_paths, find_file, find_files};
pub use loader::{ConfigLoader, DefaultValue, Document, Metadata, load};
pub use merge::{deep_merge, lookup, merge_maps, set_by_key, strip_nulls};
pub use provenance::{Provenance, Provenances, Source};
pub use verify::{field_types_consistent, verify};
