//! CiteForge Crawler
//!
//! Builds a two-level citation graph from seed titles, then derives a
//! per-paper corpus of abstracts and a TF-IDF index over each corpus.

pub mod builder;
pub mod corpus;
pub mod graph;
pub mod index;
pub mod pipeline;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{GraphBuilder, PassSummary};
pub use corpus::{Corpora, CorpusAssembler};
pub use graph::{AbstractStore, FailureRecord, PaperGraph, ReferenceState};
pub use index::{IndexBuilder, IndexReport, LexicalIndexer, TermIndex, TfidfIndexer};
pub use pipeline::{parse_seed_list, Crawl, CrawlSnapshot};
pub use resolver::{MetadataResolver, PaperResolver, ResolvedMetadata};
