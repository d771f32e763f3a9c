//! End-to-end crawl: seeds → graph → corpora → indexes

use crate::builder::{GraphBuilder, PassSummary};
use crate::corpus::{Corpora, CorpusAssembler};
use crate::graph::{AbstractStore, FailureRecord};
use crate::index::{IndexBuilder, LexicalIndexer, TermIndex};
use crate::resolver::PaperResolver;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Top terms kept per document in the snapshot
const SUMMARY_TERMS: usize = 5;

/// Shape of one trained index, for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSummary {
    pub documents: usize,
    pub vocabulary: usize,
    /// Highest-weighted terms of each document
    pub top_terms: Vec<Vec<String>>,
}

impl IndexSummary {
    fn from_index(index: &TermIndex) -> Self {
        Self {
            documents: index.document_count(),
            vocabulary: index.vocabulary_len(),
            top_terms: (0..index.document_count())
                .map(|doc| {
                    index
                        .top_terms(doc, SUMMARY_TERMS)
                        .into_iter()
                        .map(|(term, _)| term.to_string())
                        .collect()
                })
                .collect(),
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSnapshot {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub seed_pass: PassSummary,
    pub expansion_pass: PassSummary,
    /// Nested mapping view of the graph
    pub graph: serde_json::Value,
    pub abstracts: AbstractStore,
    pub failures: FailureRecord,
    pub corpora: Corpora,
    pub indexes: BTreeMap<String, IndexSummary>,
    pub index_failures: BTreeMap<String, String>,
}

/// One crawl over a set of seeds
pub struct Crawl {
    builder: GraphBuilder,
    indexes: IndexBuilder,
}

impl Crawl {
    pub fn new(
        resolver: Arc<dyn PaperResolver>,
        indexer: Arc<dyn LexicalIndexer>,
        concurrency: usize,
    ) -> Self {
        Self {
            builder: GraphBuilder::new(resolver, concurrency),
            indexes: IndexBuilder::new(indexer),
        }
    }

    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    pub fn indexes(&self) -> &IndexBuilder {
        &self.indexes
    }

    /// Resolve seeds, expand one level, then assemble corpora and indexes
    pub async fn run(&mut self, seeds: &[String]) -> CrawlSnapshot {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        info!(run_id = %run_id, seeds = seeds.len(), "Crawl started");

        let seed_pass = self.builder.extract_titles(seeds).await;
        let expansion_pass = self.builder.dig().await;

        let corpora = CorpusAssembler::new(self.builder.graph(), self.builder.abstracts())
            .build_all_corpora();
        let report = self.indexes.build_all_indexes(&corpora);

        let indexes = report
            .built
            .iter()
            .filter_map(|node| {
                self.indexes
                    .index(node)
                    .map(|index| (node.clone(), IndexSummary::from_index(index)))
            })
            .collect();
        let index_failures = report
            .failures
            .iter()
            .map(|(node, e)| (node.clone(), e.to_string()))
            .collect();

        let snapshot = CrawlSnapshot {
            run_id,
            started_at,
            finished_at: Utc::now(),
            seed_pass,
            expansion_pass,
            graph: self.builder.graph().to_json(),
            abstracts: self.builder.abstracts().clone(),
            failures: self.builder.failures().clone(),
            corpora,
            indexes,
            index_failures,
        };
        info!(
            run_id = %run_id,
            seeds = snapshot.seed_pass.resolved,
            unresolved_references = snapshot.failures.references().len(),
            indexes = snapshot.indexes.len(),
            "Crawl finished"
        );
        snapshot
    }
}

/// Parse a seed list: one title per line, blank lines and `#` comments skipped
pub fn parse_seed_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
