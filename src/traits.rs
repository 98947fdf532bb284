//! Extension traits at the pipeline seams.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │               ExtractorRegistry                │
//! │  ┌──────────┐ ┌─────────┐ ┌──────┐ ┌────────┐  │
//! │  │ internal │ │ library │ │ ...  │ │fallback│  │
//! │  └──────────┘ └─────────┘ └──────┘ └────────┘  │
//! └──────────────────────┬─────────────────────────┘
//!                        ▼
//!        detail::resolve() → scrape::run_scrape_cycle()
//! ```
//!
//! [`Extractor`] is one site-specific parser. The registry tries them in
//! registration order and always ends with the fallback extractor, so
//! dispatch never comes back empty-handed.
//!
//! [`ArticleSource`] is what the orchestrator scrapes: the live portal
//! client in production, an in-memory fake in tests.

use async_trait::async_trait;
use tracing::warn;

use crate::config::PortalConfig;
use crate::error::ScrapeError;
use crate::extractor_career::CareerExtractor;
use crate::extractor_fallback::FallbackExtractor;
use crate::extractor_internal::InternalExtractor;
use crate::extractor_kybg::ResearchOfficeExtractor;
use crate::extractor_library::LibraryExtractor;
use crate::extractor_myhome::MyhomeExtractor;
use crate::extractor_table::SimpleTableExtractor;
use crate::fetch::Fetcher;
use crate::models::{ExtractedContent, ListingItem};

// ═══════════════════════════════════════════════════════════════════════
// Extractor Trait
// ═══════════════════════════════════════════════════════════════════════

/// A site-specific content extractor.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use info_harvest::error::ScrapeError;
/// use info_harvest::fetch::Fetcher;
/// use info_harvest::models::ExtractedContent;
/// use info_harvest::traits::Extractor;
///
/// pub struct NewsroomExtractor;
///
/// #[async_trait]
/// impl Extractor for NewsroomExtractor {
///     fn name(&self) -> &str { "newsroom" }
///
///     fn can_handle(&self, url: &str, _html: &str) -> bool {
///         url.contains("news.example.edu")
///     }
///
///     async fn extract(
///         &self,
///         _url: &str,
///         _html: &str,
///         _fetcher: &Fetcher,
///     ) -> Result<ExtractedContent, ScrapeError> {
///         Ok(ExtractedContent::default())
///     }
/// }
/// ```
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short identifier used in logs and `harvest extract` output.
    fn name(&self) -> &str;

    /// Whether this extractor understands the page at `url`.
    fn can_handle(&self, url: &str, html: &str) -> bool;

    /// Extract content from a page.
    ///
    /// `html` is the page as already fetched; extractors that need a
    /// different decoding or a JSON endpoint use `fetcher`, which shares
    /// the run's session, rate limiter and CSRF token.
    async fn extract(
        &self,
        url: &str,
        html: &str,
        fetcher: &Fetcher,
    ) -> Result<ExtractedContent, ScrapeError>;
}

// ═══════════════════════════════════════════════════════════════════════
// Article Source Trait
// ═══════════════════════════════════════════════════════════════════════

/// Detail page after redirects and extraction.
#[derive(Debug, Clone)]
pub struct ResolvedDetail {
    /// URL after redirects; departmental pages often end up off-portal.
    pub final_url: String,
    /// Name of the extractor whose output was used.
    pub extractor: String,
    pub content: ExtractedContent,
    /// The matching extractor failed and the fallback's output was used.
    pub degraded: bool,
}

/// The listing API plus detail resolution, as seen by the orchestrator.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Establish session state (cookies, CSRF token). Called once per run.
    async fn prepare(&mut self) -> Result<(), ScrapeError> {
        Ok(())
    }

    /// One page of the listing; empty at the end of data.
    async fn list_page(
        &self,
        column_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ListingItem>, ScrapeError>;

    /// Fetch and extract the item's detail page.
    async fn resolve(&self, item: &ListingItem) -> Result<ResolvedDetail, ScrapeError>;

    /// Absolute URL for a listing item's relative link.
    fn absolute_url(&self, relative_url: &str) -> String;
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Result of running a page through the registry.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub extractor: String,
    pub content: ExtractedContent,
    /// True when the chosen extractor failed and the fallback's output was
    /// used instead.
    pub degraded: bool,
}

/// Ordered extractor chain with a guaranteed catch-all.
///
/// The fallback is held apart from the registered list so it stays last no
/// matter what is registered afterwards.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
    fallback: FallbackExtractor,
}

impl ExtractorRegistry {
    /// A registry containing only the fallback.
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
            fallback: FallbackExtractor,
        }
    }

    /// A registry with every built-in site extractor, in priority order.
    pub fn with_builtins(portal: &PortalConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(InternalExtractor::new(portal)));
        registry.register(Box::new(LibraryExtractor));
        registry.register(Box::new(ResearchOfficeExtractor));
        registry.register(Box::new(MyhomeExtractor));
        registry.register(Box::new(CareerExtractor));
        registry.register(Box::new(SimpleTableExtractor));
        registry
    }

    /// Append an extractor (ahead of the fallback).
    pub fn register(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    /// Names in dispatch order, fallback included.
    pub fn names(&self) -> Vec<&str> {
        self.extractors
            .iter()
            .map(|e| e.name())
            .chain(std::iter::once(self.fallback.name()))
            .collect()
    }

    /// The first extractor that can handle the page.
    pub fn dispatch(&self, url: &str, html: &str) -> &dyn Extractor {
        self.extractors
            .iter()
            .find(|e| e.can_handle(url, html))
            .map(|e| e.as_ref())
            .unwrap_or(&self.fallback as &dyn Extractor)
    }

    /// Dispatch and extract. Never fails: an error inside the chosen
    /// extractor is logged with the URL and replaced by the fallback's
    /// body-text extraction.
    pub async fn extract(&self, url: &str, html: &str, fetcher: &Fetcher) -> Dispatched {
        let extractor = self.dispatch(url, html);
        match extractor.extract(url, html, fetcher).await {
            Ok(content) => Dispatched {
                extractor: extractor.name().to_string(),
                content,
                degraded: false,
            },
            Err(e) => {
                warn!(
                    %url,
                    extractor = extractor.name(),
                    error = %e,
                    "extractor failed, falling back to body text"
                );
                Dispatched {
                    extractor: self.fallback.name().to_string(),
                    content: self.fallback.extract_body(url, html),
                    degraded: true,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.extractors.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
