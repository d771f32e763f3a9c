//! Error types for CiteForge
//!
//! Provides a single error enum shared by the sources and the crawler:
//! - Distinct variants for each source failure mode
//! - Resolution, corpus and indexing failures for the crawl core
//! - Error codes for machine-readable diagnostics

use crate::sources::SourceKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Source errors (1xxx)
    IdentifierNotFound,
    FetchFailed,
    ParseFailed,
    SourceTimeout,
    MissingCredentials,
    UpstreamError,

    // Crawl errors (2xxx)
    Unresolved,

    // Corpus & index errors (3xxx)
    NodeNotFound,
    CorpusNotBuilt,
    EmptyCorpus,
    IndexingFailed,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Sources (1xxx)
            ErrorCode::IdentifierNotFound => 1001,
            ErrorCode::FetchFailed => 1002,
            ErrorCode::ParseFailed => 1003,
            ErrorCode::SourceTimeout => 1004,
            ErrorCode::MissingCredentials => 1005,
            ErrorCode::UpstreamError => 1006,

            // Crawl (2xxx)
            ErrorCode::Unresolved => 2001,

            // Corpus & index (3xxx)
            ErrorCode::NodeNotFound => 3001,
            ErrorCode::CorpusNotBuilt => 3002,
            ErrorCode::EmptyCorpus => 3003,
            ErrorCode::IndexingFailed => 3004,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Source errors
    #[error("{provider}: no identifier found for title {title:?}")]
    IdentifierNotFound { provider: SourceKind, title: String },

    #[error("{provider}: fetch failed: {message}")]
    FetchFailed { provider: SourceKind, message: String },

    #[error("{provider}: parse failed: {message}")]
    ParseFailed { provider: SourceKind, message: String },

    #[error("{provider}: timed out after {timeout_ms}ms")]
    SourceTimeout { provider: SourceKind, timeout_ms: u64 },

    #[error("{provider}: credentials not configured")]
    MissingCredentials { provider: SourceKind },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Crawl errors
    #[error("Unresolved {title:?} (primary: {primary}; secondary: {secondary})")]
    Unresolved {
        title: String,
        primary: Box<AppError>,
        secondary: Box<AppError>,
    },

    // Corpus & index errors
    #[error("Node not found in graph: {title:?}")]
    NodeNotFound { title: String },

    #[error("Corpus not built for node: {title:?}")]
    CorpusNotBuilt { title: String },

    /// Indexing failure with nothing to train on
    #[error("Empty corpus for node: {title:?}")]
    EmptyCorpus { title: String },

    #[error("Indexing failed: {message}")]
    IndexingFailed { message: String },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::IdentifierNotFound { .. } => ErrorCode::IdentifierNotFound,
            AppError::FetchFailed { .. } => ErrorCode::FetchFailed,
            AppError::ParseFailed { .. } => ErrorCode::ParseFailed,
            AppError::SourceTimeout { .. } => ErrorCode::SourceTimeout,
            AppError::MissingCredentials { .. } => ErrorCode::MissingCredentials,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Unresolved { .. } => ErrorCode::Unresolved,
            AppError::NodeNotFound { .. } => ErrorCode::NodeNotFound,
            AppError::CorpusNotBuilt { .. } => ErrorCode::CorpusNotBuilt,
            AppError::EmptyCorpus { .. } => ErrorCode::EmptyCorpus,
            AppError::IndexingFailed { .. } => ErrorCode::IndexingFailed,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Check if this error came out of a single metadata source.
    ///
    /// These are the failures that trigger the secondary source.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            AppError::IdentifierNotFound { .. }
                | AppError::FetchFailed { .. }
                | AppError::ParseFailed { .. }
                | AppError::SourceTimeout { .. }
                | AppError::MissingCredentials { .. }
                | AppError::HttpClient(_)
        )
    }

    /// Check if an index could not be built from the given documents
    pub fn is_indexing_failure(&self) -> bool {
        matches!(
            self,
            AppError::EmptyCorpus { .. } | AppError::IndexingFailed { .. }
        )
    }

    /// Check if this error is a misuse of the crawl API rather than an
    /// expected data-dependent failure
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            AppError::NodeNotFound { .. } | AppError::CorpusNotBuilt { .. }
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
