//! Rate-limited HTTP session.
//!
//! Every outbound request of a run goes through one [`Session`], which
//! keeps the portal's cookies, the CSRF token captured at startup, and the
//! time of the previous request. Requests are spaced at least
//! `min_interval` apart; a run is sequential, so this is also the global
//! request-rate ceiling.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ORIGIN, REFERER};
use reqwest::{Client, Response, Url};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::config::PortalConfig;
use crate::error::ScrapeError;

static RE_META_CSRF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<meta\s+name=["']_csrf["']\s+content=["']([a-z0-9\-]+)"#).unwrap()
});
static RE_SCRIPT_CSRF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"_csrf\s*[:=]\s*["']([a-z0-9\-]+)"#).unwrap());

/// Cookie names that may carry the token when the page does not embed it.
const CSRF_COOKIES: [&str; 2] = ["XSRF-TOKEN", "X-CSRF-TOKEN"];

pub struct Session {
    client: Client,
    jar: Arc<Jar>,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
    csrf_token: String,
    listing_page_url: String,
    origin: String,
}

impl Session {
    /// Build a session without touching the network.
    ///
    /// Call [`acquire_csrf_token`](Session::acquire_csrf_token) before any
    /// request that needs the token.
    pub fn new(portal: &PortalConfig) -> Result<Self, ScrapeError> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(portal.user_agent.clone())
            .timeout(portal.timeout())
            .cookie_provider(jar.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(ScrapeError::Client)?;

        Ok(Self {
            client,
            jar,
            min_interval: portal.min_request_interval(),
            last_request: Mutex::new(None),
            csrf_token: String::new(),
            listing_page_url: portal.listing_page_url(),
            origin: portal.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Wait until `min_interval` has passed since the previous request,
    /// then claim the slot.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "rate limiting");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Rate-limited GET following redirects. Non-success statuses are
    /// transport errors.
    pub async fn get(&self, url: &str) -> Result<Response, ScrapeError> {
        self.acquire().await;
        let response = self
            .client
            .get(url)
            .header(REFERER, &self.listing_page_url)
            .send()
            .await
            .map_err(|e| ScrapeError::transport(url, e))?;
        response
            .error_for_status()
            .map_err(|e| ScrapeError::transport(url, e))
    }

    /// Rate-limited POST with `params` in the query string, as the portal's
    /// AJAX endpoints expect.
    pub async fn post(&self, url: &str, params: &[(&str, String)]) -> Result<Response, ScrapeError> {
        self.acquire().await;
        let response = self
            .client
            .post(url)
            .query(params)
            .header(REFERER, &self.listing_page_url)
            .header(ORIGIN, &self.origin)
            .send()
            .await
            .map_err(|e| ScrapeError::transport(url, e))?;
        response
            .error_for_status()
            .map_err(|e| ScrapeError::transport(url, e))
    }

    /// Visit the listing page once to collect cookies and the CSRF token.
    ///
    /// Sources are scanned in order: `<meta name="_csrf">`, an inline
    /// script assignment, then the token cookies. Finding nothing is not an
    /// error; the token stays empty and token-gated calls degrade.
    #[instrument(level = "info", skip(self), fields(url = %self.listing_page_url))]
    pub async fn acquire_csrf_token(&mut self) -> Result<(), ScrapeError> {
        let url = self.listing_page_url.clone();
        let response = self.get(&url).await?;
        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| ScrapeError::transport(&url, e))?;

        let cookie_header = self.cookie_header(&final_url);
        self.csrf_token =
            scan_csrf_token(&html, cookie_header.as_deref()).unwrap_or_default();

        let preview: String = self.csrf_token.chars().take(8).collect();
        info!(
            found = !self.csrf_token.is_empty(),
            token_prefix = %preview,
            "session initialized"
        );
        Ok(())
    }

    /// The captured token, or `None` when the portal did not hand one out.
    pub fn csrf_token(&self) -> Option<&str> {
        if self.csrf_token.is_empty() {
            None
        } else {
            Some(&self.csrf_token)
        }
    }

    /// Token as sent in form parameters (empty when missing).
    pub fn csrf_param(&self) -> String {
        self.csrf_token.clone()
    }

    #[cfg(test)]
    pub(crate) fn set_csrf_token(&mut self, token: &str) {
        self.csrf_token = token.to_string();
    }

    fn cookie_header(&self, url: &Url) -> Option<String> {
        self.jar
            .cookies(url)
            .and_then(|v| v.to_str().ok().map(|s| s.to_string()))
    }
}

/// Find the CSRF token in a page body, falling back to a `Cookie` header
/// value (`name=value; name2=value2`).
pub fn scan_csrf_token(html: &str, cookie_header: Option<&str>) -> Option<String> {
    if let Some(caps) = RE_META_CSRF.captures(html) {
        return Some(caps[1].to_string());
    }
    if let Some(caps) = RE_SCRIPT_CSRF.captures(html) {
        return Some(caps[1].to_string());
    }
    let header = cookie_header?;
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if CSRF_COOKIES.contains(&name.trim()) && !value.is_empty() {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}
