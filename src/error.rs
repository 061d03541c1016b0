// ABOUTME: Error types with structured exit codes for CLI
// ABOUTME: Maps sync, cache, and conversion failures to specific exit codes

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote protocol version is not supported by this client")]
    ProtocolVersionMismatch,

    #[error("Rate limited: the notebook changed since the last sync, retry in {retry_after_secs}s (or pass --force)")]
    RateLimited { retry_after_secs: u64 },

    #[error("Notebook not found: {0}")]
    NotebookNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status} on {endpoint}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Corrupted cache entry {}", path.display())]
    CacheCorruption {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Conversion failed for note {guid}")]
    Conversion {
        guid: String,
        #[source]
        source: ConvertError,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Why a single note could not be turned into a publishable file.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unterminated code block opened with ```{language}")]
    UnterminatedCodeBlock { language: String },

    #[error("note has no en-note body")]
    MissingNoteBody,

    #[error("cannot derive a file name from {0:?}")]
    InvalidSlug(String),

    #[error("failed to serialize front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Auth(_) => 2,
            Error::Network(_) => 3,
            Error::Api { .. } => 4,
            Error::Parse(_) => 5,
            Error::Filesystem(_) => 6,
            Error::ProtocolVersionMismatch => 7,
            Error::RateLimited { .. } => 8,
            Error::NotebookNotFound(_) | Error::ResourceNotFound(_) => 9,
            Error::CacheCorruption { .. } => 10,
            Error::Conversion { .. } => 11,
            Error::Config(_) => 12,
        }
    }

    pub(crate) fn conversion(guid: &str, source: ConvertError) -> Self {
        Error::Conversion {
            guid: guid.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::Auth("test".into()).exit_code(), 2);
        assert_eq!(
            Error::Api {
                endpoint: "test".into(),
                status: 404,
                message: "not found".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(Error::RateLimited { retry_after_secs: 60 }.exit_code(), 8);
        assert_eq!(Error::NotebookNotFound("Blog".into()).exit_code(), 9);
        assert_eq!(Error::Config("blank".into()).exit_code(), 12);
    }

    #[test]
    fn test_conversion_error_keeps_cause() {
        let err = Error::conversion(
            "note-1",
            ConvertError::UnterminatedCodeBlock {
                language: "python".into(),
            },
        );
        assert_eq!(err.to_string(), "Conversion failed for note note-1");
        let cause = err.source().unwrap().to_string();
        assert!(cause.contains("unterminated code block"), "{}", cause);
    }
}
