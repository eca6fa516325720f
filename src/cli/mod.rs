//! CLI definitions for layerconf.
//!
//! The binary discovers a primary config file plus optional overrides, loads them
//! into a generic tree together with any environment overrides, and reports the
//! result with its provenance.

use crate::codec::{Codec, JsonCodec, TomlCodec, YamlCodec};
use crate::config::{ConfigLoader, EnvOverride, FileLocation, Provenances, find_files};
use crate::key::Key;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Document format of the loaded files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DocumentFormat {
    Toml,
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "toml" => Some(DocumentFormat::Toml),
            "json" => Some(DocumentFormat::Json),
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            _ => None,
        }
    }
}

/// One `VAR=key.path` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvMapping {
    pub var: String,
    pub key: Key,
}

fn parse_env_mapping(s: &str) -> Result<EnvMapping, String> {
    let (var, key) = s
        .split_once('=')
        .ok_or_else(|| format!("expected VAR=key.path, got '{s}'"))?;
    let key = Key::parse(key.trim());
    if var.trim().is_empty() || !key.is_well_formed() {
        return Err(format!("expected VAR=key.path, got '{s}'"));
    }
    Ok(EnvMapping {
        var: var.trim().to_string(),
        key,
    })
}

/// Inspect a layered configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Primary config file (must exist)
    pub file: PathBuf,

    /// Override files applied in order, skipped when not found
    pub overrides: Vec<PathBuf>,

    /// Document format (default: from the primary file's extension, else toml)
    #[arg(short, long, value_enum)]
    pub format: Option<DocumentFormat>,

    /// Directory to search, in priority order (default: . and the user config dir)
    #[arg(short, long = "search", value_name = "DIR")]
    pub search_paths: Vec<PathBuf>,

    /// Environment override as VAR=key.path
    #[arg(short, long = "env", value_name = "VAR=KEY", value_parser = parse_env_mapping)]
    pub env: Vec<EnvMapping>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Logging output: 0/off, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2")]
    pub log: String,
}

impl Cli {
    pub fn format(&self) -> DocumentFormat {
        self.format
            .or_else(|| DocumentFormat::from_path(&self.file))
            .unwrap_or(DocumentFormat::Toml)
    }

    fn locations(&self) -> Vec<FileLocation> {
        let search_paths = if self.search_paths.is_empty() {
            crate::config::default_search_paths(env!("CARGO_PKG_NAME"))
        } else {
            self.search_paths.clone()
        };
        std::iter::once(&self.file)
            .chain(&self.overrides)
            .map(|file| FileLocation::new(file, search_paths.iter()))
            .collect()
    }
}

/// The loaded configuration and where each value came from.
#[derive(Debug, Serialize)]
pub struct Report {
    pub files: Vec<String>,
    pub config: Map<String, Value>,
    pub provenance: Provenances,
}

/// Discover and load the files named on the command line.
pub fn inspect(cli: &Cli) -> Result<Report> {
    match cli.format() {
        DocumentFormat::Toml => inspect_with(cli, TomlCodec),
        DocumentFormat::Json => inspect_with(cli, JsonCodec),
        DocumentFormat::Yaml => inspect_with(cli, YamlCodec),
    }
}

fn inspect_with<C: Codec>(cli: &Cli, codec: C) -> Result<Report> {
    let found = find_files(&cli.locations()).context("Failed to locate config files")?;
    let documents = found
        .iter()
        .map(|file| file.open())
        .collect::<Result<Vec<_>, _>>()?;
    let overrides = cli
        .env
        .iter()
        .map(|mapping| EnvOverride::new(mapping.var.clone(), mapping.key.clone()));

    let mut config = Map::new();
    let metadata = ConfigLoader::new(codec)
        .documents(documents)
        .env_overrides(overrides)
        .load(&mut config)
        .context("Failed to load configuration")?;

    Ok(Report {
        files: found.into_iter().map(|f| f.label).collect(),
        config,
        provenance: metadata.provenances().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_mapping() {
        let mapping = parse_env_mapping("APP_PORT=server.port").unwrap();
        assert_eq!(mapping.var, "APP_PORT");
        assert_eq!(mapping.key.to_string(), "server.port");
        assert!(parse_env_mapping("APP_PORT").is_err());
        assert!(parse_env_mapping("=a").is_err());
        assert!(parse_env_mapping("X=a..b").is_err());
    }

    #[test]
    fn test_format_from_extension() {
        let cli = Cli::parse_from(["layerconf", "conf.yml"]);
        assert_eq!(cli.format(), DocumentFormat::Yaml);
        let cli = Cli::parse_from(["layerconf", "--format", "json", "conf.yml"]);
        assert_eq!(cli.format(), DocumentFormat::Json);
        let cli = Cli::parse_from(["layerconf", "conf"]);
        assert_eq!(cli.format(), DocumentFormat::Toml);
    }

    #[test]
    fn test_args() {
        let cli = Cli::parse_from([
            "layerconf",
            "-s",
            "/etc/app",
            "--env",
            "PORT=port",
            "conf.toml",
            "local.toml",
        ]);
        assert_eq!(cli.search_paths, vec![PathBuf::from("/etc/app")]);
        assert_eq!(cli.overrides, vec![PathBuf::from("local.toml")]);
        assert_eq!(cli.env.len(), 1);
        assert_eq!(cli.locations().len(), 2);
    }
}
