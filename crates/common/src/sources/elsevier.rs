//! Elsevier ScienceDirect source
//!
//! Lookup uses the ScienceDirect search API (JSON); the article is then
//! retrieved by DOI as full-text XML. Both calls need an API key.

use super::{Identifier, MetadataSource, ParsedMetadata, RawDocument, SourceKind};
use crate::config::ElsevierConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use serde::Deserialize;

const CE_NS: &[u8] = b"http://www.elsevier.com/xml/common/dtd";
const SB_NS: &[u8] = b"http://www.elsevier.com/xml/common/struct-bib/dtd";
const DC_NS: &[u8] = b"http://purl.org/dc/elements/1.1/";

/// Elsevier ScienceDirect client
pub struct ElsevierSource {
    client: reqwest::Client,
    config: ElsevierConfig,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(rename = "search-results", default)]
    search_results: SearchResults,
}

#[derive(Deserialize, Default)]
struct SearchResults {
    #[serde(default)]
    entry: Vec<SearchEntry>,
}

#[derive(Deserialize)]
struct SearchEntry {
    #[serde(rename = "prism:doi")]
    doi: Option<String>,
    pii: Option<String>,
}

impl ElsevierSource {
    pub fn new(client: reqwest::Client, config: ElsevierConfig) -> Self {
        Self { client, config }
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(AppError::MissingCredentials {
                provider: SourceKind::Elsevier,
            })
    }

    fn fetch_error(message: impl Into<String>) -> AppError {
        AppError::FetchFailed {
            provider: SourceKind::Elsevier,
            message: message.into(),
        }
    }
}

#[async_trait]
impl MetadataSource for ElsevierSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Elsevier
    }

    async fn lookup_identifier(&self, title: &str) -> Result<Identifier> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .get(&self.config.search_url)
            .header("X-ELS-APIKey", api_key)
            .header("Accept", "application/json")
            .query(&[("query", title), ("count", "1")])
            .send()
            .await
            .map_err(|e| Self::fetch_error(format!("search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::fetch_error(format!("search returned {}", response.status())));
        }

        let body: SearchResponse = response.json().await.map_err(|e| AppError::ParseFailed {
            provider: SourceKind::Elsevier,
            message: format!("search response: {}", e),
        })?;

        // An empty result set still comes back as a single entry carrying an error field
        let entry = body.search_results.entry.into_iter().next();
        match entry {
            Some(SearchEntry { doi: Some(doi), pii }) => Ok(Identifier {
                source: SourceKind::Elsevier,
                id: doi,
                alternate: pii,
            }),
            _ => Err(AppError::IdentifierNotFound {
                provider: SourceKind::Elsevier,
                title: title.to_string(),
            }),
        }
    }

    async fn fetch_raw_document(&self, identifier: &Identifier) -> Result<RawDocument> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/{}",
            self.config.article_url.trim_end_matches('/'),
            identifier.id
        );

        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", api_key), ("httpAccept", "text/xml")])
            .send()
            .await
            .map_err(|e| Self::fetch_error(format!("article request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::fetch_error(format!(
                "article returned {} for {}: {}",
                status,
                identifier.id,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Self::fetch_error(format!("article body: {}", e)))?;

        Ok(RawDocument {
            identifier: identifier.clone(),
            body,
        })
    }

    fn parse_metadata(&self, document: &RawDocument) -> Result<ParsedMetadata> {
        parse_elsevier_xml(&document.body)
    }
}

/// Full-text retrieval XML state machine
#[derive(Default)]
struct ArticleParser {
    saw_element: bool,

    in_bib_reference: bool,
    in_sb_title: bool,
    in_maintitle: bool,
    /// First maintitle of the current bib-reference
    reference_title: Option<String>,
    references: Vec<String>,

    in_description: bool,
    abstract_text: Option<String>,

    buffer: String,
}

impl ArticleParser {
    fn handle_start(&mut self, ns: Option<&[u8]>, local: &[u8]) {
        self.saw_element = true;
        match (ns, local) {
            (Some(CE_NS), b"bib-reference") => {
                self.in_bib_reference = true;
                self.reference_title = None;
            }
            (Some(SB_NS), b"title") if self.in_bib_reference => self.in_sb_title = true,
            (Some(SB_NS), b"maintitle") if self.in_sb_title && self.reference_title.is_none() => {
                self.in_maintitle = true;
                self.buffer.clear();
            }
            (Some(DC_NS), b"description") if self.abstract_text.is_none() => {
                self.in_description = true;
                self.buffer.clear();
            }
            _ => {}
        }
    }

    fn handle_text(&mut self, text: &str) {
        // Nested markup inside a maintitle (italics, sub/superscripts) keeps contributing text
        if self.in_maintitle || self.in_description {
            self.buffer.push_str(text);
        }
    }

    fn handle_end(&mut self, ns: Option<&[u8]>, local: &[u8]) {
        match (ns, local) {
            (Some(SB_NS), b"maintitle") if self.in_maintitle => {
                self.in_maintitle = false;
                self.reference_title = Some(self.buffer.trim().to_string());
                self.buffer.clear();
            }
            (Some(SB_NS), b"title") => self.in_sb_title = false,
            (Some(CE_NS), b"bib-reference") => {
                self.in_bib_reference = false;
                self.in_sb_title = false;
                if let Some(title) = self.reference_title.take().filter(|t| !t.is_empty()) {
                    self.references.push(title);
                }
            }
            (Some(DC_NS), b"description") if self.in_description => {
                self.in_description = false;
                let text = self.buffer.trim();
                if !text.is_empty() {
                    self.abstract_text = Some(text.to_string());
                }
                self.buffer.clear();
            }
            _ => {}
        }
    }

    fn finish(self) -> Result<ParsedMetadata> {
        if !self.saw_element {
            return Err(parse_error("no XML elements in article response"));
        }
        Ok(ParsedMetadata {
            references: self.references,
            abstract_text: self.abstract_text,
        })
    }
}

fn namespace(resolved: &ResolveResult<'_>) -> Option<Vec<u8>> {
    match resolved {
        ResolveResult::Bound(Namespace(ns)) => Some(ns.to_vec()),
        _ => None,
    }
}

fn parse_error(message: impl Into<String>) -> AppError {
    AppError::ParseFailed {
        provider: SourceKind::Elsevier,
        message: message.into(),
    }
}

/// Parse an Elsevier full-text retrieval response
///
/// References are the `sb:title/sb:maintitle` text of each
/// `ce:bib-reference`; references without a title are dropped. The
/// abstract is the first `dc:description`.
pub fn parse_elsevier_xml(xml: &str) -> Result<ParsedMetadata> {
    let mut reader = NsReader::from_str(xml);
    let mut parser = ArticleParser::default();

    loop {
        match reader.read_resolved_event() {
            Ok((resolved, Event::Start(e))) => {
                let ns = namespace(&resolved);
                parser.handle_start(ns.as_deref(), e.local_name().as_ref());
            }
            Ok((resolved, Event::Empty(e))) => {
                let ns = namespace(&resolved);
                parser.handle_start(ns.as_deref(), e.local_name().as_ref());
                parser.handle_end(ns.as_deref(), e.local_name().as_ref());
            }
            Ok((_, Event::Text(e))) => {
                let text = e.unescape().map_err(|err| parse_error(err.to_string()))?;
                parser.handle_text(&text);
            }
            Ok((_, Event::CData(e))) => {
                parser.handle_text(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok((resolved, Event::End(e))) => {
                let ns = namespace(&resolved);
                parser.handle_end(ns.as_deref(), e.local_name().as_ref());
            }
            Ok((_, Event::Eof)) => break,
            Ok(_) => {}
            Err(err) => return Err(parse_error(format!("malformed article XML: {}", err))),
        }
    }

    parser.finish()
}
