//! Scholarly metadata sources
//!
//! Every source resolves a title in three steps:
//! - title → identifier (search endpoint)
//! - identifier → raw document (full-text endpoint)
//! - raw document → references + abstract (source-specific parser)
//!
//! Providers:
//! - PubMed Central via NCBI E-utilities and the BioC service
//! - Elsevier ScienceDirect (requires an API key)
//! - Static in-memory fixtures

mod elsevier;
mod pmc;

pub use elsevier::{parse_elsevier_xml, ElsevierSource};
pub use pmc::{parse_bioc_xml, PmcSource};

use crate::config::SourcesConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Which provider a source talks to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Pmc,
    Elsevier,
    Static,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Pmc => "pmc",
            SourceKind::Elsevier => "elsevier",
            SourceKind::Static => "static",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-specific handle for a paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub source: SourceKind,

    /// PMCID, DOI, or fixture title depending on the source
    pub id: String,

    /// Secondary handle (Elsevier PII) when the search returns one
    pub alternate: Option<String>,
}

/// Unparsed payload returned by a fetch
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub identifier: Identifier,
    pub body: String,
}

/// Structured metadata extracted from a raw document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMetadata {
    /// Reference titles in document order
    #[serde(default)]
    pub references: Vec<String>,

    /// Abstract text, if the document carries one
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
}

/// Trait for a scholarly metadata provider
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Which provider this is
    fn kind(&self) -> SourceKind;

    /// Find the provider identifier for a title
    async fn lookup_identifier(&self, title: &str) -> Result<Identifier>;

    /// Download the raw document for an identifier
    async fn fetch_raw_document(&self, identifier: &Identifier) -> Result<RawDocument>;

    /// Extract references and abstract from a raw document
    fn parse_metadata(&self, document: &RawDocument) -> Result<ParsedMetadata>;

    /// Run the full lookup → fetch → parse pipeline
    async fn fetch_metadata(&self, title: &str) -> Result<ParsedMetadata> {
        let identifier = self.lookup_identifier(title).await?;
        tracing::debug!(source = %self.kind(), title = %title, id = %identifier.id, "Identifier found");
        let document = self.fetch_raw_document(&identifier).await?;
        self.parse_metadata(&document)
    }
}

/// In-memory source keyed by exact title
///
/// Backed by fixtures; used in tests and by the `static` provider.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    papers: HashMap<String, ParsedMetadata>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a paper to the fixture set
    pub fn with_paper(mut self, title: &str, references: &[&str], abstract_text: Option<&str>) -> Self {
        self.papers.insert(
            title.to_string(),
            ParsedMetadata {
                references: references.iter().map(|r| r.to_string()).collect(),
                abstract_text: abstract_text.map(str::to_string),
            },
        );
        self
    }

    /// Load fixtures from a JSON object of title → `{ references, abstract }`
    pub fn from_json(json: &str) -> Result<Self> {
        let papers: HashMap<String, ParsedMetadata> = serde_json::from_str(json)?;
        Ok(Self { papers })
    }

    /// Load fixtures from a JSON file
    pub async fn from_json_file(path: &str) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }
}

#[async_trait]
impl MetadataSource for StaticSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Static
    }

    async fn lookup_identifier(&self, title: &str) -> Result<Identifier> {
        if !self.papers.contains_key(title) {
            return Err(AppError::IdentifierNotFound {
                provider: SourceKind::Static,
                title: title.to_string(),
            });
        }
        Ok(Identifier {
            source: SourceKind::Static,
            id: title.to_string(),
            alternate: None,
        })
    }

    async fn fetch_raw_document(&self, identifier: &Identifier) -> Result<RawDocument> {
        let paper = self.papers.get(&identifier.id).ok_or_else(|| AppError::FetchFailed {
            provider: SourceKind::Static,
            message: format!("no fixture for {:?}", identifier.id),
        })?;
        Ok(RawDocument {
            identifier: identifier.clone(),
            body: serde_json::to_string(paper)?,
        })
    }

    fn parse_metadata(&self, document: &RawDocument) -> Result<ParsedMetadata> {
        serde_json::from_str(&document.body).map_err(|e| AppError::ParseFailed {
            provider: SourceKind::Static,
            message: e.to_string(),
        })
    }
}

/// Shared HTTP client for network sources
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("citeforge/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(AppError::from)
}

/// Create a source by provider name
pub async fn create_source(
    provider: &str,
    config: &SourcesConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn MetadataSource>> {
    match provider {
        "pmc" => Ok(Arc::new(PmcSource::new(client, config.pmc.clone()))),
        "elsevier" => {
            if config.elsevier.api_key.is_none() {
                tracing::warn!("Elsevier API key not configured, every Elsevier lookup will fail");
            }
            Ok(Arc::new(ElsevierSource::new(client, config.elsevier.clone())))
        }
        "static" => {
            let source = match &config.fixtures_path {
                Some(path) => StaticSource::from_json_file(path).await?,
                None => {
                    tracing::warn!("sources.fixtures_path not set, static source is empty");
                    StaticSource::new()
                }
            };
            Ok(Arc::new(source))
        }
        other => Err(AppError::Configuration {
            message: format!("unknown source provider {:?}", other),
        }),
    }
}
