//! TF-IDF term weighting over a small document collection
//!
//! Tokens are runs of two or more Unicode word characters. Document vectors are
//! L2-normalized and stored sparse, keyed by term id.

use super::LexicalIndexer;
use citeforge_common::config::IndexConfig;
use citeforge_common::errors::{AppError, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

const TOKEN_PATTERN: &str = r"\b\w\w+\b";

/// Trained term weights for one corpus
#[derive(Debug, Clone)]
pub struct TermIndex {
    /// Terms in lexicographic order; position is the term id
    vocabulary: Vec<String>,
    term_ids: HashMap<String, usize>,
    idf: Vec<f64>,
    /// Per document: (term id, weight), ascending by term id
    rows: Vec<Vec<(usize, f64)>>,
}

impl TermIndex {
    pub fn document_count(&self) -> usize {
        self.rows.len()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn term_id(&self, term: &str) -> Option<usize> {
        self.term_ids.get(term).copied()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.term_id(term).map(|id| self.idf[id])
    }

    /// Normalized weight of `term` in document `doc`; zero when absent
    pub fn weight(&self, doc: usize, term: &str) -> f64 {
        let (Some(row), Some(id)) = (self.rows.get(doc), self.term_id(term)) else {
            return 0.0;
        };
        row.binary_search_by_key(&id, |(term_id, _)| *term_id)
            .map(|pos| row[pos].1)
            .unwrap_or(0.0)
    }

    /// Highest-weighted terms of a document, ties broken by term
    pub fn top_terms(&self, doc: usize, k: usize) -> Vec<(&str, f64)> {
        let Some(row) = self.rows.get(doc) else {
            return Vec::new();
        };
        let mut terms: Vec<(&str, f64)> = row
            .iter()
            .map(|(id, weight)| (self.vocabulary[*id].as_str(), *weight))
            .collect();
        terms.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        terms.truncate(k);
        terms
    }
}

/// Default lexical indexer
pub struct TfidfIndexer {
    config: IndexConfig,
    token: Regex,
}

impl TfidfIndexer {
    pub fn new(config: IndexConfig) -> Result<Self> {
        let token = Regex::new(TOKEN_PATTERN).map_err(|e| AppError::Configuration {
            message: format!("invalid token pattern: {}", e),
        })?;
        Ok(Self { config, token })
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let text = if self.config.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        self.token
            .find_iter(&text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl LexicalIndexer for TfidfIndexer {
    fn train(&self, documents: &[String]) -> Result<TermIndex> {
        if documents.is_empty() {
            return Err(AppError::EmptyCorpus {
                title: String::new(),
            });
        }

        let counts: Vec<BTreeMap<String, usize>> = documents
            .iter()
            .map(|doc| {
                let mut counts = BTreeMap::new();
                for token in self.tokenize(doc) {
                    *counts.entry(token).or_insert(0) += 1;
                }
                counts
            })
            .collect();

        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for doc in &counts {
            for term in doc.keys() {
                *document_frequency.entry(term.as_str()).or_insert(0) += 1;
            }
        }
        if document_frequency.is_empty() {
            return Err(AppError::IndexingFailed {
                message: "empty vocabulary; documents contain no tokens".to_string(),
            });
        }

        let n = documents.len() as f64;
        let vocabulary: Vec<String> = document_frequency.keys().map(|t| t.to_string()).collect();
        let idf: Vec<f64> = document_frequency
            .values()
            .map(|&df| {
                let df = df as f64;
                if self.config.smooth_idf {
                    ((1.0 + n) / (1.0 + df)).ln() + 1.0
                } else {
                    (n / df).ln() + 1.0
                }
            })
            .collect();
        let term_ids: HashMap<String, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(id, term)| (term.clone(), id))
            .collect();

        let rows = counts
            .iter()
            .map(|doc| {
                // BTreeMap iteration matches vocabulary order, so ids ascend
                let mut row: Vec<(usize, f64)> = doc
                    .iter()
                    .filter_map(|(term, &count)| {
                        let id = *term_ids.get(term)?;
                        let tf = if self.config.sublinear_tf {
                            1.0 + (count as f64).ln()
                        } else {
                            count as f64
                        };
                        Some((id, tf * idf[id]))
                    })
                    .collect();
                let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    row.iter_mut().for_each(|(_, w)| *w /= norm);
                }
                row
            })
            .collect();

        Ok(TermIndex {
            vocabulary,
            term_ids,
            idf,
            rows,
        })
    }
}
