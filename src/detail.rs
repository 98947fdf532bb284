//! Detail page resolution.
//!
//! Department notices usually bounce through the portal to another host,
//! so the page is fetched with redirects on and the post-redirect URL is
//! what gets dispatched and stored.

use tracing::{debug, instrument};

use crate::error::ScrapeError;
use crate::fetch::Fetcher;
use crate::traits::{ExtractorRegistry, ResolvedDetail};

/// Fetch `url`, follow redirects and run the page through `registry`.
///
/// Only transport failures are returned; extraction problems are absorbed
/// by the registry.
#[instrument(level = "debug", skip(fetcher, registry))]
pub async fn resolve(
    fetcher: &Fetcher,
    registry: &ExtractorRegistry,
    url: &str,
) -> Result<ResolvedDetail, ScrapeError> {
    let page = fetcher.fetch(url).await?;
    if page.final_url != url {
        debug!(final_url = %page.final_url, "detail redirected");
    }
    let dispatched = registry.extract(&page.final_url, &page.text, fetcher).await;
    Ok(ResolvedDetail {
        final_url: page.final_url,
        extractor: dispatched.extractor,
        content: dispatched.content,
        degraded: dispatched.degraded,
    })
}
