//! Error types for every layer of a dump run.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Where a record came from: the input document and its 1-based position
/// (record index for documents, line number for JSON Lines).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOrigin {
    pub source: PathBuf,
    pub position: usize,
}

impl RecordOrigin {
    pub fn new(source: impl Into<PathBuf>, position: usize) -> Self {
        Self {
            source: source.into(),
            position,
        }
    }
}

impl fmt::Display for RecordOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source.display(), self.position)
    }
}

/// A record rejected during validation. The pass continues without it.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Malformed record at {origin}: missing required field '{field}' (plugin {})", plugin_label(.plugin_id))]
    MissingField {
        origin: RecordOrigin,
        field: &'static str,
        plugin_id: Option<String>,
    },

    #[error("Malformed record at {origin}: invalid '{field}' (plugin {}): {message}", plugin_label(.plugin_id))]
    InvalidField {
        origin: RecordOrigin,
        field: &'static str,
        plugin_id: Option<String>,
        message: String,
    },

    #[error("Malformed record at {origin}: {source}")]
    Decode {
        origin: RecordOrigin,
        #[source]
        source: serde_json::Error,
    },
}

fn plugin_label(plugin_id: &Option<String>) -> &str {
    plugin_id.as_deref().unwrap_or("unknown")
}

impl RecordError {
    pub fn origin(&self) -> &RecordOrigin {
        match self {
            RecordError::MissingField { origin, .. }
            | RecordError::InvalidField { origin, .. }
            | RecordError::Decode { origin, .. } => origin,
        }
    }

    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            RecordError::MissingField { plugin_id, .. }
            | RecordError::InvalidField { plugin_id, .. } => plugin_id.as_deref(),
            RecordError::Decode { .. } => None,
        }
    }
}

/// A failed persisted-list or file operation. Entries written by earlier
/// calls are left untouched.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum EmitError {
    #[error(transparent)]
    Writer(#[from] WriterError),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Plugin {plugin_id} ({plugin_name}) shares directory {} with plugin {existing_plugin_id}", .directory.display())]
    OutputConflict {
        directory: PathBuf,
        plugin_id: String,
        plugin_name: String,
        existing_plugin_id: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error reading config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error parsing config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Fatal errors that stop a whole run.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("Failed to read input {}: {source}", .path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse input {}: {source}", .path.display())]
    InputParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Output root is not a directory: {}", .0.display())]
    OutputRoot(PathBuf),

    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
