//! Error taxonomy shared by every fallible surface of the crate.
//!
//! All public operations return [`Result`]; nothing is swallowed. Store and
//! runtime errors carry the offending entity ID or path so callers can report
//! failures without re-deriving context.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Ticker or ID segment fails the canonical grammar.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// Schema name is not part of the registered pack.
    #[error("unknown schema '{0}'")]
    UnknownSchema(String),

    /// Schema name is known but its file is absent under the schema root.
    #[error("schema file missing for '{name}' at {path}")]
    SchemaFileMissing { name: String, path: PathBuf },

    /// Payload failed JSON Schema validation. `detail` joins up to the first
    /// eight `<dotted.path>: <message>` entries.
    #[error("schema '{schema}' validation failed: {detail}")]
    SchemaValidation { schema: String, detail: String },

    /// Load or update addressed an entity that was never saved.
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// A schema could not be compiled into a validator.
    #[error("schema validator unavailable for '{schema}': {detail}")]
    ValidatorUnavailable { schema: String, detail: String },

    /// Date or datetime input did not parse.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed json at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
