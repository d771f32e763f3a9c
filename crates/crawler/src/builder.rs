//! Seed resolution and one-level graph expansion
//!
//! Resolutions within a pass run on a bounded pool; their outcomes are
//! applied afterwards in input order by a single writer, so the final
//! graph does not depend on completion order.

use crate::graph::{dedup_titles, AbstractStore, FailureRecord, PaperGraph, ReferenceState};
use crate::resolver::{PaperResolver, ResolvedMetadata};
use citeforge_common::metrics::{record_graph_size, record_unresolved};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Counts for one resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// External resolutions performed
    pub attempted: usize,
    /// Entries answered from earlier resolutions in this run
    pub reused: usize,
    /// Entries that ended resolved
    pub resolved: usize,
    /// Entries that ended failed
    pub failed: usize,
}

/// Owns the graph, the abstract store and the failure record for a run
pub struct GraphBuilder {
    resolver: Arc<dyn PaperResolver>,
    concurrency: usize,
    graph: PaperGraph,
    abstracts: AbstractStore,
    failures: FailureRecord,
    /// Outcome per title; `None` means every source failed
    memo: HashMap<String, Option<Arc<ResolvedMetadata>>>,
}

impl GraphBuilder {
    pub fn new(resolver: Arc<dyn PaperResolver>, concurrency: usize) -> Self {
        Self {
            resolver,
            concurrency: concurrency.max(1),
            graph: PaperGraph::new(),
            abstracts: AbstractStore::new(),
            failures: FailureRecord::default(),
            memo: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &PaperGraph {
        &self.graph
    }

    pub fn abstracts(&self) -> &AbstractStore {
        &self.abstracts
    }

    pub fn failures(&self) -> &FailureRecord {
        &self.failures
    }

    /// Resolve every seed once and record level-0 → level-1 entries
    #[instrument(skip(self, seeds), fields(seed_count = seeds.len()))]
    pub async fn extract_titles(&mut self, seeds: &[String]) -> PassSummary {
        let mut seen = HashSet::new();
        let pending: Vec<String> = seeds
            .iter()
            .filter(|title| seen.insert(title.as_str()))
            .filter(|title| {
                !self.graph.contains_seed(title) && !self.failures.seeds().contains(title)
            })
            .cloned()
            .collect();

        let attempted = self.resolve_all(&pending).await;
        let mut summary = PassSummary {
            attempted,
            reused: pending.len() - attempted,
            ..PassSummary::default()
        };

        for title in pending {
            match self.outcome(&title) {
                Some(resolved) => {
                    self.abstracts.insert(&title, &resolved.abstract_text);
                    self.graph.insert_seed(title, resolved.references.clone());
                    summary.resolved += 1;
                }
                None => {
                    self.failures.record_seed(&title);
                    record_unresolved("seed");
                    summary.failed += 1;
                }
            }
        }

        self.record_sizes();
        info!(
            attempted = summary.attempted,
            resolved = summary.resolved,
            failed = summary.failed,
            "Seed pass complete"
        );
        summary
    }

    /// Expand every unresolved level-1 reference by one level
    #[instrument(skip(self), fields(seed_count = self.graph.seed_count()))]
    pub async fn dig(&mut self) -> PassSummary {
        // Snapshot keys before any state is rewritten
        let work: Vec<(String, Vec<String>)> = self
            .graph
            .seeds()
            .map(|seed| {
                let pending = self
                    .graph
                    .references(seed)
                    .map(|set| set.pending())
                    .unwrap_or_default();
                (seed.to_string(), pending)
            })
            .collect();

        let mut seen = HashSet::new();
        let unique: Vec<String> = work
            .iter()
            .flat_map(|(_, references)| references.iter())
            .filter(|title| seen.insert(title.as_str()))
            .cloned()
            .collect();

        let mut summary = PassSummary {
            attempted: self.resolve_all(&unique).await,
            ..PassSummary::default()
        };

        for (seed, references) in work {
            for reference in references {
                let state = match self.outcome(&reference) {
                    Some(resolved) => {
                        self.abstracts.insert(&reference, &resolved.abstract_text);
                        summary.resolved += 1;
                        ReferenceState::Expanded(dedup_titles(&resolved.references))
                    }
                    None => {
                        self.failures.record_reference(&reference);
                        record_unresolved("reference");
                        summary.failed += 1;
                        ReferenceState::Failed
                    }
                };
                if let Some(set) = self.graph.references_mut(&seed) {
                    set.set_state(&reference, state);
                }
            }
        }
        summary.reused = (summary.resolved + summary.failed).saturating_sub(summary.attempted);

        self.record_sizes();
        info!(
            attempted = summary.attempted,
            reused = summary.reused,
            resolved = summary.resolved,
            failed = summary.failed,
            "Expansion pass complete"
        );
        summary
    }

    /// Resolve titles not yet in the memo. Returns how many were resolved.
    async fn resolve_all(&mut self, titles: &[String]) -> usize {
        let to_fetch: Vec<String> = titles
            .iter()
            .filter(|title| !self.memo.contains_key(*title))
            .cloned()
            .collect();
        if to_fetch.is_empty() {
            return 0;
        }

        let resolver = Arc::clone(&self.resolver);
        let outcomes: Vec<(String, _)> = stream::iter(to_fetch)
            .map(|title| {
                let resolver = Arc::clone(&resolver);
                async move {
                    let outcome = resolver.resolve(&title).await;
                    (title, outcome)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let count = outcomes.len();
        for (title, outcome) in outcomes {
            let entry = match outcome {
                Ok(resolved) => Some(Arc::new(resolved)),
                Err(e) => {
                    warn!(title = %title, error = %e, "Resolution failed");
                    None
                }
            };
            self.memo.insert(title, entry);
        }
        count
    }

    fn outcome(&self, title: &str) -> Option<Arc<ResolvedMetadata>> {
        self.memo.get(title).cloned().flatten()
    }

    fn record_sizes(&self) {
        record_graph_size(0, self.graph.seed_count());
        record_graph_size(1, self.graph.reference_count());
        record_graph_size(2, self.graph.second_level_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scenario_resolver, titles, CountingResolver};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_seed_pass_filters_heading() {
        let mut builder = GraphBuilder::new(scenario_resolver(), 4);
        let summary = builder.extract_titles(&titles(&["Paper A"])).await;

        assert_eq!(summary.resolved, 1);
        assert_eq!(
            builder.graph().to_json(),
            json!({ "Paper A": { "Paper B": null, "Paper C": null } })
        );
        assert_eq!(builder.abstracts().as_map().len(), 1);
        assert_eq!(builder.abstracts().get("Paper A"), Some("abs-A"));
        assert!(builder.failures().seeds().is_empty());
    }

    #[tokio::test]
    async fn test_dig_expands_and_records_failures() {
        let mut builder = GraphBuilder::new(scenario_resolver(), 4);
        builder.extract_titles(&titles(&["Paper A"])).await;
        let summary = builder.dig().await;

        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            builder.graph().to_json(),
            json!({ "Paper A": { "Paper B": { "Paper D": null }, "Paper C": null } })
        );
        assert_eq!(builder.failures().references(), &titles(&["Paper C"])[..]);
        assert_eq!(builder.abstracts().get("Paper B"), Some("abs-B"));
        assert!(!builder.abstracts().contains("Paper C"));

        // The failed key stays in the graph with an explicit state
        let set = builder.graph().references("Paper A").unwrap();
        assert_eq!(set.state("Paper C"), Some(&ReferenceState::Failed));
    }

    #[tokio::test]
    async fn test_failed_seed_never_in_store() {
        let mut builder = GraphBuilder::new(scenario_resolver(), 4);
        let summary = builder.extract_titles(&titles(&["Paper A", "Missing"])).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(builder.failures().seeds(), &titles(&["Missing"])[..]);
        assert!(!builder.abstracts().contains("Missing"));
        assert!(!builder.graph().contains_seed("Missing"));
    }

    #[tokio::test]
    async fn test_seed_pass_is_idempotent() {
        let resolver = Arc::new(CountingResolver::new(scenario_resolver()));
        let seeds = titles(&["Paper A", "Missing", "Paper A"]);

        let mut first = GraphBuilder::new(resolver.clone(), 2);
        first.extract_titles(&seeds).await;
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);

        // Same builder: nothing is attempted again
        let again = first.extract_titles(&seeds).await;
        assert_eq!(again, PassSummary::default());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);

        // Fresh builder: identical state
        let mut second = GraphBuilder::new(scenario_resolver(), 2);
        second.extract_titles(&seeds).await;
        assert_eq!(first.graph().to_json(), second.graph().to_json());
        assert_eq!(first.abstracts().as_map(), second.abstracts().as_map());
        assert_eq!(first.failures().seeds(), second.failures().seeds());
    }

    #[tokio::test]
    async fn test_shared_reference_resolved_once() {
        let resolver = Arc::new(CountingResolver::new(scenario_resolver()));
        let mut builder = GraphBuilder::new(resolver.clone(), 4);

        // Paper A and Paper X both cite Paper B
        builder.extract_titles(&titles(&["Paper A", "Paper X"])).await;
        let seed_calls = resolver.calls.load(Ordering::SeqCst);
        let summary = builder.dig().await;

        // Paper B, Paper C and Paper A (cited by Paper X) need no second fetch
        assert_eq!(resolver.calls.load(Ordering::SeqCst) - seed_calls, 2);
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.reused, 2);
        assert_eq!(
            builder.graph().to_json(),
            json!({
                "Paper A": { "Paper B": { "Paper D": null }, "Paper C": null },
                "Paper X": { "Paper B": { "Paper D": null }, "Paper A": { "Paper B": null, "Paper C": null } }
            })
        );
        assert_eq!(builder.failures().references(), &titles(&["Paper C"])[..]);
    }

    #[tokio::test]
    async fn test_second_dig_is_noop() {
        let resolver = Arc::new(CountingResolver::new(scenario_resolver()));
        let mut builder = GraphBuilder::new(resolver.clone(), 4);
        builder.extract_titles(&titles(&["Paper A"])).await;
        builder.dig().await;
        let calls = resolver.calls.load(Ordering::SeqCst);

        let summary = builder.dig().await;
        assert_eq!(summary, PassSummary::default());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_concurrency_cap_respected() {
        let resolver = Arc::new(CountingResolver::new(scenario_resolver()).with_delay_ms(20));
        let mut builder = GraphBuilder::new(resolver.clone(), 2);
        let seeds = titles(&["S1", "S2", "S3", "S4", "S5", "S6"]);

        let summary = builder.extract_titles(&seeds).await;
        assert_eq!(summary.attempted, 6);
        assert_eq!(resolver.max_in_flight.load(Ordering::SeqCst), 2);
        // Failures keep input order regardless of completion order
        assert_eq!(builder.failures().seeds(), &seeds[..]);
    }

    #[tokio::test]
    async fn test_zero_concurrency_clamps_to_one() {
        let resolver = Arc::new(CountingResolver::new(scenario_resolver()).with_delay_ms(5));
        let mut builder = GraphBuilder::new(resolver.clone(), 0);

        let summary = builder.extract_titles(&titles(&["Paper A", "Paper X"])).await;
        assert_eq!(summary.resolved, 2);
        assert_eq!(resolver.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_graph_independent_of_completion_order() {
        // Earlier titles finish last at every pass
        let resolver = Arc::new(
            CountingResolver::new(scenario_resolver())
                .with_title_delay_ms("Paper X", 80)
                .with_title_delay_ms("Missing", 60)
                .with_title_delay_ms("Paper A", 40)
                .with_title_delay_ms("Paper C", 50),
        );
        let seeds = titles(&["Paper X", "Missing", "Paper A", "Paper B"]);

        let mut concurrent = GraphBuilder::new(resolver, 4);
        concurrent.extract_titles(&seeds).await;
        concurrent.dig().await;

        let mut sequential = GraphBuilder::new(scenario_resolver(), 1);
        sequential.extract_titles(&seeds).await;
        sequential.dig().await;

        let graph = concurrent.graph();
        assert_eq!(graph.seeds().collect::<Vec<_>>(), vec!["Paper X", "Paper A", "Paper B"]);
        let json = graph.to_json();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Paper X", "Paper A", "Paper B"]);
        assert_eq!(
            graph.references("Paper X").unwrap().titles().collect::<Vec<_>>(),
            vec!["Paper B", "Paper A"]
        );
        assert_eq!(
            graph.references("Paper A").unwrap().titles().collect::<Vec<_>>(),
            vec!["Paper B", "Paper C"]
        );
        assert_eq!(concurrent.failures().seeds(), &titles(&["Missing"])[..]);
        assert_eq!(concurrent.failures().references(), &titles(&["Paper C", "Paper D"])[..]);

        assert_eq!(json, sequential.graph().to_json());
        assert_eq!(concurrent.abstracts().as_map(), sequential.abstracts().as_map());
        assert_eq!(concurrent.failures().references(), sequential.failures().references());
    }
}
