//! The live portal as an [`ArticleSource`].

use async_trait::async_trait;

use crate::config::{Config, PortalConfig};
use crate::detail;
use crate::error::ScrapeError;
use crate::fetch::{parse_candidates, Fetcher};
use crate::listing;
use crate::models::ListingItem;
use crate::session::Session;
use crate::traits::{ArticleSource, ExtractorRegistry, ResolvedDetail};

/// Session, fetcher and extractor registry for one run.
pub struct PortalClient {
    fetcher: Fetcher,
    registry: ExtractorRegistry,
    portal: PortalConfig,
}

impl PortalClient {
    pub fn new(config: &Config) -> Result<Self, ScrapeError> {
        let session = Session::new(&config.portal)?;
        let candidates = parse_candidates(&config.encoding.candidates)?;
        Ok(Self {
            fetcher: Fetcher::new(session, candidates),
            registry: ExtractorRegistry::with_builtins(&config.portal),
            portal: config.portal.clone(),
        })
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Resolve an arbitrary URL through the registry.
    pub async fn resolve_url(&self, url: &str) -> Result<ResolvedDetail, ScrapeError> {
        detail::resolve(&self.fetcher, &self.registry, url).await
    }
}

#[async_trait]
impl ArticleSource for PortalClient {
    async fn prepare(&mut self) -> Result<(), ScrapeError> {
        self.fetcher.session_mut().acquire_csrf_token().await
    }

    async fn list_page(
        &self,
        column_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ListingItem>, ScrapeError> {
        listing::list_page(
            self.fetcher.session(),
            &self.portal.listing_api_url(),
            column_id,
            page,
            page_size,
        )
        .await
    }

    async fn resolve(&self, item: &ListingItem) -> Result<ResolvedDetail, ScrapeError> {
        let url = self.absolute_url(&item.relative_url);
        self.resolve_url(&url).await
    }

    fn absolute_url(&self, relative_url: &str) -> String {
        absolute_url(&self.portal.base_url, relative_url)
    }
}

/// Join a listing link onto the portal base. Links that are already
/// absolute are returned unchanged.
pub fn absolute_url(base_url: &str, relative_url: &str) -> String {
    if relative_url.starts_with("http://") || relative_url.starts_with("https://") {
        return relative_url.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if relative_url.starts_with('/') {
        format!("{}{}", base, relative_url)
    } else {
        format!("{}/{}", base, relative_url)
    }
}
