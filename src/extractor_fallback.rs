//! Catch-all extractor.
//!
//! Matches every page and never fails. Each use is logged at `warn` with
//! the URL so unknown layouts can be turned into dedicated extractors.

use async_trait::async_trait;
use scraper::Html;
use tracing::warn;

use crate::error::ScrapeError;
use crate::extract::{char_len, clean_body, clean_subtree, select_first, text_of, CHROME_TAGS};
use crate::fetch::Fetcher;
use crate::models::ExtractedContent;
use crate::traits::Extractor;

const TITLE_TAGS: [&str; 4] = ["h1", "h2", "h3", "title"];
const CONTENT_SELECTORS: [&str; 6] = [
    "div.content",
    "div.article",
    "div.post",
    "div.main",
    "article",
    "main",
];
const MIN_TITLE_CHARS: usize = 10;
const MIN_CONTENT_CHARS: usize = 100;

pub struct FallbackExtractor;

impl FallbackExtractor {
    /// Best-effort title and body extraction.
    pub fn extract_body(&self, url: &str, html: &str) -> ExtractedContent {
        let mut result = ExtractedContent::default();
        let doc = Html::parse_document(html);

        for tag in TITLE_TAGS {
            if let Some(el) = select_first(&doc, tag) {
                let text = text_of(el);
                if char_len(&text) > MIN_TITLE_CHARS {
                    result.title = text;
                    break;
                }
            }
        }

        for css in CONTENT_SELECTORS {
            if let Some(el) = select_first(&doc, css) {
                let text = text_of(el);
                if char_len(&text) > MIN_CONTENT_CHARS {
                    (result.html_content, result.plain_text) = clean_body(el);
                    break;
                }
            }
        }

        if result.html_content.is_empty() {
            if let Some(body) = select_first(&doc, "body") {
                (result.html_content, result.plain_text) = clean_subtree(body, &CHROME_TAGS);
            }
        }

        warn!(
            %url,
            title_found = !result.title.is_empty(),
            title_chars = char_len(&result.title),
            content_chars = char_len(&result.plain_text),
            "fallback extractor used for unknown page layout"
        );

        result
    }
}

#[async_trait]
impl Extractor for FallbackExtractor {
    fn name(&self) -> &str {
        "fallback"
    }

    fn can_handle(&self, _url: &str, _html: &str) -> bool {
        true
    }

    async fn extract(
        &self,
        url: &str,
        html: &str,
        _fetcher: &Fetcher,
    ) -> Result<ExtractedContent, ScrapeError> {
        Ok(self.extract_body(url, html))
    }
}
