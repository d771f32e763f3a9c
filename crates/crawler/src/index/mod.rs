//! Per-paper lexical indexes
//!
//! The indexer is injected, so a different weighting scheme can replace
//! TF-IDF without touching the builder.

mod tfidf;

pub use tfidf::{TermIndex, TfidfIndexer};

use crate::corpus::Corpora;
use citeforge_common::errors::{AppError, Result};
use citeforge_common::metrics::record_index_build;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Trains a term index over one collection of documents
pub trait LexicalIndexer: Send + Sync {
    /// Duplicate documents are allowed. An empty slice is rejected with
    /// `AppError::EmptyCorpus`; documents without any token are rejected
    /// with `AppError::IndexingFailed`.
    fn train(&self, documents: &[String]) -> Result<TermIndex>;
}

/// Outcome of indexing every corpus
#[derive(Debug, Default)]
pub struct IndexReport {
    /// Nodes indexed successfully, in node order
    pub built: Vec<String>,

    /// Nodes whose index could not be built
    pub failures: BTreeMap<String, AppError>,
}

/// Builds and holds one index per node
pub struct IndexBuilder {
    indexer: Arc<dyn LexicalIndexer>,
    indexes: BTreeMap<String, TermIndex>,
}

impl IndexBuilder {
    pub fn new(indexer: Arc<dyn LexicalIndexer>) -> Self {
        Self {
            indexer,
            indexes: BTreeMap::new(),
        }
    }

    /// Train an index over the node's corpus and keep it
    pub fn build_index(&mut self, node: &str, corpora: &Corpora) -> Result<&TermIndex> {
        let corpus = corpora.get(node).ok_or_else(|| AppError::CorpusNotBuilt {
            title: node.to_string(),
        })?;

        let trained = if corpus.is_empty() {
            Err(AppError::EmptyCorpus {
                title: node.to_string(),
            })
        } else {
            self.indexer.train(corpus).map_err(|e| match e {
                AppError::IndexingFailed { .. } => e,
                AppError::EmptyCorpus { .. } => AppError::EmptyCorpus {
                    title: node.to_string(),
                },
                other => AppError::IndexingFailed {
                    message: other.to_string(),
                },
            })
        };
        record_index_build(trained.is_ok());

        let index = trained?;
        self.indexes.insert(node.to_string(), index);
        self.index(node).ok_or_else(|| AppError::Internal {
            message: format!("index for {:?} missing after insert", node),
        })
    }

    /// Index every corpus; one node failing does not stop the others
    #[instrument(skip(self, corpora), fields(nodes = corpora.len()))]
    pub fn build_all_indexes(&mut self, corpora: &Corpora) -> IndexReport {
        let mut report = IndexReport::default();
        for node in corpora.keys() {
            match self.build_index(node, corpora) {
                Ok(_) => report.built.push(node.clone()),
                Err(e) => {
                    warn!(node = %node, error = %e, "Index build failed");
                    report.failures.insert(node.clone(), e);
                }
            }
        }
        info!(
            built = report.built.len(),
            failed = report.failures.len(),
            "Index pass complete"
        );
        report
    }

    pub fn index(&self, node: &str) -> Option<&TermIndex> {
        self.indexes.get(node)
    }

    pub fn indexes(&self) -> &BTreeMap<String, TermIndex> {
        &self.indexes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeforge_common::config::IndexConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn corpora(entries: &[(&str, &[&str])]) -> Corpora {
        entries
            .iter()
            .map(|(node, docs)| (node.to_string(), docs.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    fn tfidf() -> Arc<dyn LexicalIndexer> {
        Arc::new(TfidfIndexer::new(IndexConfig::default()).unwrap())
    }

    /// Always fails with a non-indexing error
    struct BrokenIndexer {
        calls: AtomicUsize,
    }

    impl LexicalIndexer for BrokenIndexer {
        fn train(&self, _documents: &[String]) -> Result<TermIndex> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Internal {
                message: "model unavailable".to_string(),
            })
        }
    }

    #[test]
    fn test_build_index() {
        let corpora = corpora(&[("Paper A", &["abs-B gene expression"])]);
        let mut builder = IndexBuilder::new(tfidf());

        let index = builder.build_index("Paper A", &corpora).unwrap();
        assert_eq!(index.document_count(), 1);
        assert!(builder.index("Paper A").is_some());
    }

    #[test]
    fn test_missing_corpus_is_programming_error() {
        let mut builder = IndexBuilder::new(tfidf());
        let err = builder.build_index("Paper Z", &Corpora::new()).unwrap_err();
        assert!(matches!(err, AppError::CorpusNotBuilt { .. }));
        assert!(err.is_programming_error());
    }

    #[test]
    fn test_empty_corpus_isolated() {
        let corpora = corpora(&[
            ("Paper A", &["protein folding dynamics"]),
            ("Paper B", &[]),
            ("Paper C", &["graph neural networks", "citation networks"]),
        ]);
        let mut builder = IndexBuilder::new(tfidf());
        let report = builder.build_all_indexes(&corpora);

        assert_eq!(report.built, vec!["Paper A".to_string(), "Paper C".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures["Paper B"], AppError::EmptyCorpus { .. }));
        assert_eq!(builder.indexes().len(), 2);
        assert!(builder.index("Paper B").is_none());
    }

    #[test]
    fn test_indexer_errors_become_indexing_failures() {
        let indexer = Arc::new(BrokenIndexer {
            calls: AtomicUsize::new(0),
        });
        let mut builder = IndexBuilder::new(indexer.clone());
        let corpora = corpora(&[("Paper A", &["text"]), ("Paper B", &[])]);

        let report = builder.build_all_indexes(&corpora);
        assert!(report.built.is_empty());
        assert!(matches!(report.failures["Paper A"], AppError::IndexingFailed { .. }));
        // Empty corpora never reach the indexer
        assert_eq!(indexer.calls.load(Ordering::SeqCst), 1);
    }
}
