#![forbid(unsafe_code)]

//! Typed errors shared by the library. Binaries wrap these in `anyhow`.

use std::path::PathBuf;

/// Problems with the traversal configuration. Always fatal and always raised
/// before the first request goes out.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no categories to index: the include list is empty")]
    EmptyIncludeList,

    #[error("language code must not be empty")]
    EmptyLanguage,

    #[error("maximum quality must be positive (got {0})")]
    InvalidQuality(i64),

    #[error("minimum date {min} is after maximum date {max}")]
    InvertedDateWindow { min: i64, max: i64 },

    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDay(String),

    #[error("reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failure to fetch or decode a single remote resource. The traversal treats
/// every variant as non-fatal for the key that produced it.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{resource}: HTTP status {status}")]
    Status { resource: String, status: u16 },

    #[error("{resource}: {message}")]
    Transport { resource: String, message: String },

    #[error("{resource}: malformed response: {source}")]
    Decode {
        resource: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }
}

/// A timestamp string that matched none of the accepted shapes.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized timestamp {raw:?}")]
pub struct DateParseError {
    pub raw: String,
}

/// Offline import could not read its source directory.
#[derive(Debug, thiserror::Error)]
#[error("could not read import directory {path}: {source}")]
pub struct ImportError {
    pub path: PathBuf,
    #[source]
    pub source: walkdir::Error,
}

/// Anything that stops the index from being assembled.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Import(#[from] ImportError),
}
