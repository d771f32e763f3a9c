//! Title → (references, abstract) resolution with source fallback

use async_trait::async_trait;
use citeforge_common::errors::{AppError, Result};
use citeforge_common::metrics::record_resolution;
use citeforge_common::sources::{MetadataSource, ParsedMetadata, SourceKind};
use citeforge_common::REFERENCES_HEADING;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Metadata for a successfully resolved paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMetadata {
    /// Reference titles in source order, heading entries removed
    pub references: Vec<String>,

    pub abstract_text: String,

    /// Source that produced this result
    pub source: SourceKind,
}

/// Capability the graph builder depends on
#[async_trait]
pub trait PaperResolver: Send + Sync {
    /// Resolve a title, or explain why no source could
    async fn resolve(&self, title: &str) -> Result<ResolvedMetadata>;
}

/// Primary source with a full fallback to a secondary source
pub struct MetadataResolver {
    primary: Arc<dyn MetadataSource>,
    secondary: Arc<dyn MetadataSource>,
    timeout: Duration,
}

impl MetadataResolver {
    pub fn new(
        primary: Arc<dyn MetadataSource>,
        secondary: Arc<dyn MetadataSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            timeout,
        }
    }

    /// One complete lookup → fetch → parse run against a single source
    async fn attempt(&self, source: &dyn MetadataSource, title: &str) -> Result<ResolvedMetadata> {
        let kind = source.kind();
        let start = Instant::now();

        let outcome = match tokio::time::timeout(self.timeout, source.fetch_metadata(title)).await {
            Ok(parsed) => parsed.and_then(|parsed| accept(kind, parsed)),
            Err(_) => Err(AppError::SourceTimeout {
                provider: kind,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };

        record_resolution(start.elapsed().as_secs_f64(), kind.as_str(), outcome.is_ok());
        outcome
    }
}

#[async_trait]
impl PaperResolver for MetadataResolver {
    #[instrument(skip(self))]
    async fn resolve(&self, title: &str) -> Result<ResolvedMetadata> {
        let primary = match self.attempt(self.primary.as_ref(), title).await {
            Ok(resolved) => return Ok(resolved),
            Err(e) => e,
        };
        debug!(error = %primary, "Primary source failed, trying secondary");

        self.attempt(self.secondary.as_ref(), title)
            .await
            .map_err(|secondary| AppError::Unresolved {
                title: title.to_string(),
                primary: Box::new(primary),
                secondary: Box::new(secondary),
            })
    }
}

/// Turn parsed metadata into a usable resolution.
///
/// A source that yields no abstract or no references has failed.
fn accept(kind: SourceKind, parsed: ParsedMetadata) -> Result<ResolvedMetadata> {
    let references = strip_reference_headings(parsed.references);
    let abstract_text = parsed
        .abstract_text
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| AppError::ParseFailed {
            provider: kind,
            message: "document has no abstract".to_string(),
        })?;

    if references.is_empty() {
        return Err(AppError::ParseFailed {
            provider: kind,
            message: "document has no references".to_string(),
        });
    }

    Ok(ResolvedMetadata {
        references,
        abstract_text,
        source: kind,
    })
}

/// Drop entries that are the literal "References" section heading
pub fn strip_reference_headings(references: Vec<String>) -> Vec<String> {
    references
        .into_iter()
        .filter(|reference| !reference.trim().eq_ignore_ascii_case(REFERENCES_HEADING))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeforge_common::sources::{Identifier, RawDocument, StaticSource};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps a source and counts lookups
    struct CountingSource {
        inner: StaticSource,
        lookups: AtomicUsize,
    }

    impl CountingSource {
        fn new(inner: StaticSource) -> Arc<Self> {
            Arc::new(Self {
                inner,
                lookups: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MetadataSource for CountingSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Elsevier
        }

        async fn lookup_identifier(&self, title: &str) -> Result<Identifier> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup_identifier(title).await
        }

        async fn fetch_raw_document(&self, identifier: &Identifier) -> Result<RawDocument> {
            self.inner.fetch_raw_document(identifier).await
        }

        fn parse_metadata(&self, document: &RawDocument) -> Result<ParsedMetadata> {
            self.inner.parse_metadata(document)
        }
    }

    /// Never answers within any reasonable timeout
    struct StalledSource;

    #[async_trait]
    impl MetadataSource for StalledSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Pmc
        }

        async fn lookup_identifier(&self, _title: &str) -> Result<Identifier> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(AppError::Internal {
                message: "unreachable".to_string(),
            })
        }

        async fn fetch_raw_document(&self, _identifier: &Identifier) -> Result<RawDocument> {
            unreachable!()
        }

        fn parse_metadata(&self, _document: &RawDocument) -> Result<ParsedMetadata> {
            unreachable!()
        }
    }

    fn resolver(primary: Arc<dyn MetadataSource>, secondary: Arc<dyn MetadataSource>) -> MetadataResolver {
        MetadataResolver::new(primary, secondary, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let primary = StaticSource::new().with_paper("Paper A", &["Paper B"], Some("abs-A"));
        let secondary = CountingSource::new(StaticSource::new());
        let resolver = resolver(Arc::new(primary), secondary.clone());

        let resolved = resolver.resolve("Paper A").await.unwrap();
        assert_eq!(resolved.references, vec!["Paper B".to_string()]);
        assert_eq!(resolved.abstract_text, "abs-A");
        assert_eq!(resolved.source, SourceKind::Static);
        assert_eq!(secondary.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_secondary() {
        let secondary = CountingSource::new(
            StaticSource::new().with_paper("Paper A", &["Paper B"], Some("abs-A")),
        );
        let resolver = resolver(Arc::new(StaticSource::new()), secondary.clone());

        let resolved = resolver.resolve("Paper A").await.unwrap();
        assert_eq!(resolved.source, SourceKind::Elsevier);
        assert_eq!(secondary.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_abstract_falls_back() {
        let primary = StaticSource::new().with_paper("Paper A", &["Paper B"], None);
        let secondary = StaticSource::new().with_paper("Paper A", &["Paper C"], Some("abs-A"));
        let resolver = resolver(Arc::new(primary), Arc::new(secondary));

        let resolved = resolver.resolve("Paper A").await.unwrap();
        assert_eq!(resolved.references, vec!["Paper C".to_string()]);
    }

    #[tokio::test]
    async fn test_both_sources_fail() {
        let resolver = resolver(Arc::new(StaticSource::new()), Arc::new(StaticSource::new()));

        let err = resolver.resolve("Paper C").await.unwrap_err();
        match err {
            AppError::Unresolved { title, primary, secondary } => {
                assert_eq!(title, "Paper C");
                assert!(primary.is_source_failure());
                assert!(secondary.is_source_failure());
            }
            other => panic!("expected Unresolved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_heading_filtered_and_only_heading_fails() {
        let primary = StaticSource::new()
            .with_paper("Paper A", &["Paper B", "REFERENCES", "Paper C", " references "], Some("abs-A"))
            .with_paper("Paper E", &["References"], Some("abs-E"));
        let resolver = resolver(Arc::new(primary), Arc::new(StaticSource::new()));

        let resolved = resolver.resolve("Paper A").await.unwrap();
        assert_eq!(resolved.references, vec!["Paper B".to_string(), "Paper C".to_string()]);

        // Nothing left after filtering counts as a failed resolution
        assert!(resolver.resolve("Paper E").await.is_err());
    }

    #[tokio::test]
    async fn test_primary_timeout_falls_back() {
        let secondary = StaticSource::new().with_paper("Paper A", &["Paper B"], Some("abs-A"));
        let resolver = MetadataResolver::new(
            Arc::new(StalledSource),
            Arc::new(secondary),
            Duration::from_millis(50),
        );

        let resolved = resolver.resolve("Paper A").await.unwrap();
        assert_eq!(resolved.abstract_text, "abs-A");
    }

    #[tokio::test]
    async fn test_timeout_is_reported_as_source_timeout() {
        let resolver = MetadataResolver::new(
            Arc::new(StalledSource),
            Arc::new(StaticSource::new()),
            Duration::from_millis(20),
        );

        let err = resolver.resolve("Paper A").await.unwrap_err();
        let AppError::Unresolved { primary, .. } = err else {
            panic!("expected Unresolved");
        };
        assert!(matches!(*primary, AppError::SourceTimeout { provider: SourceKind::Pmc, timeout_ms: 20 }));
    }
}
