//! CiteForge Common Library
//!
//! Shared code for the CiteForge crawler including:
//! - Scholarly metadata sources (PubMed Central, Elsevier, static fixtures)
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod metrics;
pub mod sources;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use sources::{MetadataSource, ParsedMetadata, SourceKind};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Literal section heading some parsers emit as if it were a reference
pub const REFERENCES_HEADING: &str = "references";
