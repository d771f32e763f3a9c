//! PubMed Central source
//!
//! Title lookup goes through NCBI E-utilities (`esearch`, db=pmc); full
//! text comes from the BioC RESTful service as BioC XML.

use super::{Identifier, MetadataSource, ParsedMetadata, RawDocument, SourceKind};
use crate::config::PmcConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;

/// PubMed Central client
pub struct PmcSource {
    client: reqwest::Client,
    config: PmcConfig,
}

#[derive(Deserialize)]
struct ESearchResponse {
    #[serde(default)]
    esearchresult: ESearchResult,
}

#[derive(Deserialize, Default)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

impl PmcSource {
    pub fn new(client: reqwest::Client, config: PmcConfig) -> Self {
        Self { client, config }
    }

    fn fetch_error(message: impl Into<String>) -> AppError {
        AppError::FetchFailed {
            provider: SourceKind::Pmc,
            message: message.into(),
        }
    }
}

#[async_trait]
impl MetadataSource for PmcSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Pmc
    }

    async fn lookup_identifier(&self, title: &str) -> Result<Identifier> {
        let response = self
            .client
            .get(&self.config.esearch_url)
            .query(&[("db", "pmc"), ("term", title), ("retmode", "json"), ("retmax", "1")])
            .send()
            .await
            .map_err(|e| Self::fetch_error(format!("esearch request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::fetch_error(format!("esearch returned {}", response.status())));
        }

        let body: ESearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::ParseFailed {
                provider: SourceKind::Pmc,
                message: format!("esearch response: {}", e),
            })?;

        match body.esearchresult.idlist.into_iter().next() {
            Some(id) => Ok(Identifier {
                source: SourceKind::Pmc,
                id: format!("PMC{}", id),
                alternate: None,
            }),
            None => Err(AppError::IdentifierNotFound {
                provider: SourceKind::Pmc,
                title: title.to_string(),
            }),
        }
    }

    async fn fetch_raw_document(&self, identifier: &Identifier) -> Result<RawDocument> {
        let url = format!(
            "{}/BioC_xml/{}/unicode",
            self.config.bioc_base_url.trim_end_matches('/'),
            identifier.id
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::fetch_error(format!("BioC request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::fetch_error(format!(
                "BioC returned {} for {}",
                response.status(),
                identifier.id
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Self::fetch_error(format!("BioC body: {}", e)))?;

        Ok(RawDocument {
            identifier: identifier.clone(),
            body,
        })
    }

    fn parse_metadata(&self, document: &RawDocument) -> Result<ParsedMetadata> {
        parse_bioc_xml(&document.body)
    }
}

/// One `<passage>` being accumulated
#[derive(Default)]
struct Passage {
    section_type: Option<String>,
    texts: Vec<String>,
}

/// BioC XML state machine
#[derive(Default)]
struct BiocParser {
    saw_document: bool,
    passage: Option<Passage>,
    /// Key of the `<infon>` currently open inside a passage
    infon_key: Option<String>,
    in_text: bool,
    buffer: String,
    abstract_parts: Vec<String>,
    references: Vec<String>,
}

impl BiocParser {
    fn handle_start(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"document" => self.saw_document = true,
            b"passage" => self.passage = Some(Passage::default()),
            b"infon" if self.passage.is_some() => {
                self.infon_key = infon_key(e);
                self.buffer.clear();
            }
            b"text" if self.passage.is_some() => {
                self.in_text = true;
                self.buffer.clear();
            }
            _ => {}
        }
    }

    fn handle_text(&mut self, text: &str) {
        if self.in_text || self.infon_key.is_some() {
            self.buffer.push_str(text);
        }
    }

    fn handle_end(&mut self, local_name: &[u8]) {
        match local_name {
            b"infon" => {
                if let (Some(key), Some(passage)) = (self.infon_key.take(), self.passage.as_mut()) {
                    if key == "section_type" {
                        passage.section_type = Some(self.buffer.trim().to_string());
                    }
                }
                self.buffer.clear();
            }
            b"text" if self.in_text => {
                self.in_text = false;
                let text = self.buffer.trim();
                if !text.is_empty() {
                    if let Some(passage) = self.passage.as_mut() {
                        passage.texts.push(text.to_string());
                    }
                }
                self.buffer.clear();
            }
            b"passage" => {
                if let Some(passage) = self.passage.take() {
                    match passage.section_type.as_deref() {
                        Some("ABSTRACT") => self.abstract_parts.extend(passage.texts),
                        Some("REF") => self.references.extend(passage.texts),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> Result<ParsedMetadata> {
        if !self.saw_document {
            return Err(parse_error("no BioC <document> element"));
        }
        let abstract_text = if self.abstract_parts.is_empty() {
            None
        } else {
            Some(self.abstract_parts.join(" "))
        };
        Ok(ParsedMetadata {
            references: self.references,
            abstract_text,
        })
    }
}

fn infon_key(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == b"key")
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn parse_error(message: impl Into<String>) -> AppError {
    AppError::ParseFailed {
        provider: SourceKind::Pmc,
        message: message.into(),
    }
}

/// Parse a BioC XML collection into references and abstract
///
/// `ABSTRACT` passages are joined with a single space; `REF` passages
/// contribute one reference title each, in document order.
pub fn parse_bioc_xml(xml: &str) -> Result<ParsedMetadata> {
    let mut reader = Reader::from_str(xml);
    let mut parser = BiocParser::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => parser.handle_start(e),
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(|err| parse_error(err.to_string()))?;
                parser.handle_text(&text);
            }
            Ok(Event::CData(e)) => parser.handle_text(&String::from_utf8_lossy(&e.into_inner())),
            Ok(Event::End(ref e)) => parser.handle_end(e.local_name().as_ref()),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(parse_error(format!(
                    "malformed BioC XML at byte {}: {}",
                    reader.buffer_position(),
                    err
                )))
            }
        }
    }

    parser.finish()
}
