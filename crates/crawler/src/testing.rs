//! Shared fixtures for crawler tests

use crate::resolver::{MetadataResolver, PaperResolver, ResolvedMetadata};
use async_trait::async_trait;
use citeforge_common::errors::Result;
use citeforge_common::sources::StaticSource;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn titles(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Paper A cites B and C, B cites D, X cites B and A.
/// C, D and every other title are unknown to both sources.
pub(crate) fn scenario_source() -> StaticSource {
    StaticSource::new()
        .with_paper("Paper A", &["Paper B", "REFERENCES", "Paper C"], Some("abs-A"))
        .with_paper("Paper B", &["Paper D"], Some("abs-B"))
        .with_paper("Paper X", &["Paper B", "Paper A"], Some("abs-X"))
}

pub(crate) fn scenario_resolver() -> Arc<dyn PaperResolver> {
    Arc::new(MetadataResolver::new(
        Arc::new(scenario_source()),
        Arc::new(StaticSource::new()),
        Duration::from_secs(5),
    ))
}

/// Counts calls and the peak number of concurrent resolutions
pub(crate) struct CountingResolver {
    inner: Arc<dyn PaperResolver>,
    delay: Duration,
    title_delays: HashMap<String, Duration>,
    in_flight: AtomicUsize,
    pub calls: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl CountingResolver {
    pub fn new(inner: Arc<dyn PaperResolver>) -> Self {
        Self {
            inner,
            delay: Duration::ZERO,
            title_delays: HashMap::new(),
            in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    /// Delay one title instead of the default
    pub fn with_title_delay_ms(mut self, title: &str, ms: u64) -> Self {
        self.title_delays.insert(title.to_string(), Duration::from_millis(ms));
        self
    }
}

#[async_trait]
impl PaperResolver for CountingResolver {
    async fn resolve(&self, title: &str) -> Result<ResolvedMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = self.title_delays.get(title).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let outcome = self.inner.resolve(title).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}
