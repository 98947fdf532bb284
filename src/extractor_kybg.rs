//! Research office bulletin board (`kyybgxx.cic.tsinghua.edu.cn`).
//!
//! Old table layout exported from Word, served as GBK. The title lives in
//! `div.td1 span.style1`, the body in a `MsoNormalTable`, and the date is
//! only present in free text.

use async_trait::async_trait;
use scraper::Html;

use crate::error::ScrapeError;
use crate::extract::{
    char_len, class_contains, clean_body, document_text, find_date, select_all, select_first,
    select_within, text_of,
};
use crate::fetch::Fetcher;
use crate::models::ExtractedContent;
use crate::traits::Extractor;

const MARKERS: [&str; 3] = ["科研", "清华大学", "td1"];
const DEPARTMENT: &str = "科研院";
const NAV_WORDS: [&str; 3] = ["欢迎", "登录", "首页"];
const MIN_TITLE_CHARS: usize = 10;
const MIN_BODY_CHARS: usize = 200;

pub struct ResearchOfficeExtractor;

#[async_trait]
impl Extractor for ResearchOfficeExtractor {
    fn name(&self) -> &str {
        "research-office"
    }

    fn can_handle(&self, url: &str, _html: &str) -> bool {
        url.contains("kyybgxx.cic.tsinghua.edu.cn")
    }

    async fn extract(
        &self,
        url: &str,
        html: &str,
        fetcher: &Fetcher,
    ) -> Result<ExtractedContent, ScrapeError> {
        let decoded = fetcher.refetch_decoded(url, html, &MARKERS).await;
        Ok(parse_research_office(&decoded))
    }
}

pub fn parse_research_office(html: &str) -> ExtractedContent {
    let doc = Html::parse_document(html);
    let mut result = ExtractedContent {
        department: DEPARTMENT.to_string(),
        ..ExtractedContent::default()
    };

    result.title = select_first(&doc, "div.td1")
        .and_then(|div| select_within(div, "span.style1"))
        .map(text_of)
        .filter(|t| char_len(t) > MIN_TITLE_CHARS)
        .or_else(|| {
            select_all(&doc, "div[class]")
                .into_iter()
                .filter(|div| class_contains(*div, "td1"))
                .map(text_of)
                .find(|t| char_len(t) > MIN_TITLE_CHARS && !NAV_WORDS.contains(&t.as_str()))
        })
        .unwrap_or_default();

    let body = select_first(&doc, "table.MsoNormalTable")
        .or_else(|| {
            select_all(&doc, "div[align=center]")
                .into_iter()
                .find(|div| char_len(&text_of(*div)) > MIN_BODY_CHARS)
        })
        .or_else(|| {
            select_all(&doc, "table")
                .into_iter()
                .find(|table| char_len(&text_of(*table)) > MIN_BODY_CHARS)
        });
    if let Some(el) = body {
        (result.html_content, result.plain_text) = clean_body(el);
    }

    if let Some(date) = find_date(&document_text(&doc)) {
        result.publish_time = date;
    }

    result
}
