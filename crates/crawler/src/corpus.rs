//! Per-paper document collections gathered from the two-level graph

use crate::graph::{AbstractStore, PaperGraph};
use citeforge_common::errors::{AppError, Result};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Node title → abstracts, in candidate order
pub type Corpora = BTreeMap<String, Vec<String>>;

/// Walks the frozen graph and collects abstracts for each seed
pub struct CorpusAssembler<'a> {
    graph: &'a PaperGraph,
    abstracts: &'a AbstractStore,
}

impl<'a> CorpusAssembler<'a> {
    pub fn new(graph: &'a PaperGraph, abstracts: &'a AbstractStore) -> Self {
        Self { graph, abstracts }
    }

    /// Node, then each level-1 title followed by its level-2 titles.
    /// Repeated titles keep their first position.
    pub fn candidates(&self, node: &str) -> Result<Vec<&'a str>> {
        let references = self.graph.references(node).ok_or_else(|| AppError::NodeNotFound {
            title: node.to_string(),
        })?;

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut push = |title: &'a str| {
            if seen.insert(title) {
                candidates.push(title);
            }
        };

        // Borrow from the graph so candidates outlive this call
        if let Some(seed) = self.graph.seeds().find(|seed| *seed == node) {
            push(seed);
        }
        for (title, state) in references.iter() {
            push(title);
            if let Some(children) = state.children() {
                children.iter().for_each(|child| push(child.as_str()));
            }
        }
        Ok(candidates)
    }

    /// Abstracts of every candidate present in the store.
    ///
    /// The node's own abstract is left out unless the node cites itself
    /// through one of its references.
    pub fn build_corpus(&self, node: &str) -> Result<Vec<String>> {
        let candidates = self.candidates(node)?;
        let self_cited = self.is_second_level(node);

        let corpus: Vec<String> = candidates
            .into_iter()
            .filter(|title| *title != node || self_cited)
            .filter_map(|title| self.abstracts.get(title))
            .map(str::to_string)
            .collect();

        debug!(node = %node, documents = corpus.len(), "Corpus assembled");
        Ok(corpus)
    }

    /// Corpus for every seed in the graph
    pub fn build_all_corpora(&self) -> Corpora {
        self.graph
            .seeds()
            .filter_map(|seed| {
                self.build_corpus(seed)
                    .ok()
                    .map(|corpus| (seed.to_string(), corpus))
            })
            .collect()
    }

    fn is_second_level(&self, node: &str) -> bool {
        self.graph
            .references(node)
            .map(|set| {
                set.iter()
                    .filter_map(|(_, state)| state.children())
                    .any(|children| children.iter().any(|child| child == node))
            })
            .unwrap_or(false)
    }
}
