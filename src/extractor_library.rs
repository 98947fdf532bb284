//! University library announcements (`lib.tsinghua.edu.cn`).
//!
//! These pages are GBK but usually labelled ISO-8859-1, so the page is
//! fetched again through the candidate-encoding decoder before parsing.

use async_trait::async_trait;
use scraper::Html;

use crate::error::ScrapeError;
use crate::extract::{clean_body, select_first, text_of};
use crate::fetch::Fetcher;
use crate::models::ExtractedContent;
use crate::traits::Extractor;

const MARKERS: [&str; 2] = ["图书馆", "v_news_content"];
const DEPARTMENT: &str = "图书馆";

pub struct LibraryExtractor;

#[async_trait]
impl Extractor for LibraryExtractor {
    fn name(&self) -> &str {
        "library"
    }

    fn can_handle(&self, url: &str, _html: &str) -> bool {
        url.contains("lib.tsinghua.edu.cn")
    }

    async fn extract(
        &self,
        url: &str,
        html: &str,
        fetcher: &Fetcher,
    ) -> Result<ExtractedContent, ScrapeError> {
        let decoded = fetcher.refetch_decoded(url, html, &MARKERS).await;
        Ok(parse_library(&decoded))
    }
}

pub fn parse_library(html: &str) -> ExtractedContent {
    let doc = Html::parse_document(html);
    let mut result = ExtractedContent {
        department: DEPARTMENT.to_string(),
        ..ExtractedContent::default()
    };

    if let Some(el) = select_first(&doc, "h2").or_else(|| select_first(&doc, "h1")) {
        result.title = text_of(el);
    }
    if let Some(el) = select_first(&doc, "div.v_news_content") {
        (result.html_content, result.plain_text) = clean_body(el);
    }
    if let Some(el) = select_first(&doc, "div.date") {
        result.publish_time = text_of(el);
    }

    result
}
