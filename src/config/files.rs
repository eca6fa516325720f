//! Configuration file discovery.
//!
//! Each [`FileLocation`] is resolved first-found-wins across its own search paths.
//! The first location is the primary document and must exist; the rest are optional
//! overrides applied in order.

use super::loader::Document;
use crate::error::{LoadError, LoadResult};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file name and the directories to look for it in, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLocation {
    pub filename: PathBuf,
    /// An empty path means the filename is used as given.
    pub search_paths: Vec<PathBuf>,
}

impl FileLocation {
    pub fn new<P, I, S>(filename: P, search_paths: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = S>,
        S: Into<PathBuf>,
    {
        Self {
            filename: filename.into(),
            search_paths: search_paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Look for `filename` in the current directory and the user config directory.
    pub fn in_default_paths(filename: impl Into<PathBuf>, app: &str) -> Self {
        Self {
            filename: filename.into(),
            search_paths: default_search_paths(app),
        }
    }

    fn candidates(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.search_paths.iter().map(|dir| {
            if dir.as_os_str().is_empty() {
                self.filename.clone()
            } else {
                dir.join(&self.filename)
            }
        })
    }
}

/// A discovered configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFile {
    pub path: PathBuf,
    /// Slash-separated path, used as the document's provenance label.
    pub label: String,
}

impl FoundFile {
    fn new(path: PathBuf) -> Self {
        let label = path.to_string_lossy().replace('\\', "/");
        Self { path, label }
    }

    /// Open the file as a labelled document.
    pub fn open(&self) -> LoadResult<Document<'static>> {
        let file = File::open(&self.path).map_err(|source| LoadError::Io {
            origin: self.label.clone(),
            source,
        })?;
        Ok(Document::named(self.label.clone(), file))
    }
}

/// `.` followed by `<user config dir>/<app>`.
pub fn default_search_paths(app: &str) -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(".")];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(app));
    }
    paths
}

/// Resolve every location, skipping optional ones that are not found.
pub fn find_files(locations: &[FileLocation]) -> LoadResult<Vec<FoundFile>> {
    if locations.is_empty() {
        return Err(LoadError::invalid_argument("no file locations provided"));
    }

    let mut found = Vec::with_capacity(locations.len());
    for (i, location) in locations.iter().enumerate() {
        if location.search_paths.is_empty() {
            return Err(LoadError::invalid_argument(format!(
                "no search paths provided for {}",
                location.filename.display()
            )));
        }

        match find_file(location)? {
            Some(file) => {
                debug!(file = %file.label, "Found config file");
                found.push(file);
            }
            None if i == 0 => {
                return Err(LoadError::FileNotFound {
                    filename: location.filename.display().to_string(),
                    search_paths: location.search_paths.clone(),
                });
            }
            None => {
                warn!(
                    file = %location.filename.display(),
                    "Optional override file not found, skipping"
                );
            }
        }
    }
    Ok(found)
}

/// The first existing candidate of `location`.
pub fn find_file(location: &FileLocation) -> LoadResult<Option<FoundFile>> {
    for path in location.candidates() {
        if is_file(&path)? {
            return Ok(Some(FoundFile::new(path)));
        }
    }
    Ok(None)
}

fn is_file(path: &Path) -> LoadResult<bool> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(LoadError::Io {
            origin: path.display().to_string(),
            source,
        }),
    }
}
