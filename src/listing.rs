//! Listing API client and the cutoff scanner.
//!
//! The listing endpoint is a POST with everything in the query string:
//! `oType=xs&lmid=<column>&lydw=&currentPage=<n>&length=<size>&xxflid=&_csrf=<token>`.
//! It answers `{result: "success", object: {dataList: [...]}}`; an empty
//! `dataList` marks the end of data.
//!
//! [`CutoffScanner`] walks pages and items in order and stops for good at
//! the first item published before the cutoff. Pages are assumed to be in
//! non-increasing publish-time order, so one out-of-order old item ends the
//! scan even if newer items follow it.

use serde::Deserialize;
use std::collections::VecDeque;
use tracing::debug;

use crate::error::ScrapeError;
use crate::models::ListingItem;
use crate::session::Session;
use crate::traits::ArticleSource;

#[derive(Debug, Deserialize)]
struct ListingEnvelope {
    #[serde(default)]
    result: String,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    object: Option<ListingObject>,
}

#[derive(Debug, Deserialize)]
struct ListingObject {
    #[serde(rename = "dataList", default)]
    data_list: Option<Vec<ListingItem>>,
}

/// Decode one listing response body.
pub fn parse_listing_response(body: &str) -> Result<Vec<ListingItem>, ScrapeError> {
    let envelope: ListingEnvelope = serde_json::from_str(body)
        .map_err(|e| ScrapeError::Api(format!("invalid listing JSON: {}", e)))?;
    if envelope.result != "success" {
        return Err(ScrapeError::Api(
            envelope.msg.unwrap_or_else(|| format!("result '{}'", envelope.result)),
        ));
    }
    Ok(envelope
        .object
        .and_then(|o| o.data_list)
        .unwrap_or_default())
}

/// Query parameters for one listing page.
pub fn listing_params(column_id: &str, page: u32, page_size: u32, csrf: String) -> Vec<(&'static str, String)> {
    vec![
        ("oType", "xs".to_string()),
        ("lmid", column_id.to_string()),
        ("lydw", String::new()),
        ("currentPage", page.to_string()),
        ("length", page_size.to_string()),
        ("xxflid", String::new()),
        ("_csrf", csrf),
    ]
}

/// Fetch one page of the listing.
pub async fn list_page(
    session: &Session,
    api_url: &str,
    column_id: &str,
    page: u32,
    page_size: u32,
) -> Result<Vec<ListingItem>, ScrapeError> {
    let params = listing_params(column_id, page, page_size, session.csrf_param());
    let response = session.post(api_url, &params).await?;
    let body = response
        .text()
        .await
        .map_err(|e| ScrapeError::transport(api_url, e))?;
    let items = parse_listing_response(&body)?;
    debug!(page, count = items.len(), "listing page fetched");
    Ok(items)
}

/// One step of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStep {
    Item(ListingItem),
    /// An item older than the cutoff was reached.
    StopAtCutoff,
    /// Listing ran out of items or the page limit was hit.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Scanning,
    Stopped,
}

/// Lazy page/item walk that ends at the first item below `cutoff_ms`.
///
/// Once a stop has been returned, every later call returns the same stop
/// without touching the source. A listing error is returned as-is and also
/// stops the scan.
pub struct CutoffScanner {
    cutoff_ms: i64,
    max_pages: u32,
    page_size: u32,
    column_id: String,
    next_page: u32,
    buffer: VecDeque<ListingItem>,
    state: ScanState,
    stop: Option<ScanStep>,
    pages_fetched: u32,
}

impl CutoffScanner {
    pub fn new(cutoff_ms: i64, max_pages: u32, page_size: u32, column_id: impl Into<String>) -> Self {
        Self {
            cutoff_ms,
            max_pages,
            page_size,
            column_id: column_id.into(),
            next_page: 1,
            buffer: VecDeque::new(),
            state: ScanState::Scanning,
            stop: None,
            pages_fetched: 0,
        }
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Why the scan stopped, if it has.
    pub fn stopped_at(&self) -> Option<&ScanStep> {
        self.stop.as_ref()
    }

    pub async fn next<S>(&mut self, source: &S) -> Result<ScanStep, ScrapeError>
    where
        S: ArticleSource + ?Sized,
    {
        if self.state == ScanState::Stopped {
            return Ok(self.stop.clone().unwrap_or(ScanStep::Exhausted));
        }

        while self.buffer.is_empty() {
            if self.next_page > self.max_pages {
                debug!(max_pages = self.max_pages, "page limit reached");
                return Ok(self.finish(ScanStep::Exhausted));
            }
            let page = self.next_page;
            self.next_page += 1;
            let items = match source.list_page(&self.column_id, page, self.page_size).await {
                Ok(items) => items,
                Err(e) => {
                    self.finish(ScanStep::Exhausted);
                    return Err(e);
                }
            };
            self.pages_fetched += 1;
            if items.is_empty() {
                debug!(page, "listing exhausted");
                return Ok(self.finish(ScanStep::Exhausted));
            }
            self.buffer.extend(items);
        }

        let Some(item) = self.buffer.pop_front() else {
            return Ok(self.finish(ScanStep::Exhausted));
        };
        match item.publish_time_ms {
            Some(ts) if ts < self.cutoff_ms => {
                debug!(id = %item.id, publish_time_ms = ts, cutoff_ms = self.cutoff_ms, "cutoff reached");
                Ok(self.finish(ScanStep::StopAtCutoff))
            }
            _ => Ok(ScanStep::Item(item)),
        }
    }

    fn finish(&mut self, step: ScanStep) -> ScanStep {
        self.state = ScanState::Stopped;
        self.buffer.clear();
        self.stop = Some(step.clone());
        step
    }
}
