//! Table-layout departmental sites: the general office, the trade union,
//! logistics and the research office's announcement pages.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};

use crate::error::ScrapeError;
use crate::extract::{
    char_len, class_contains, clean_body, document_text, find_chinese_date, has_class,
    select_all, select_within, text_of,
};
use crate::fetch::Fetcher;
use crate::models::ExtractedContent;
use crate::traits::Extractor;

/// Host fragment and the department credited for pages under it.
const DOMAINS: [(&str, &str); 3] = [
    ("xxbg.cic.tsinghua.edu.cn", "党政办"),
    ("ghxt.cic.tsinghua.edu.cn", "清华大学工会"),
    ("hq.tsinghua.edu.cn", "清华大学后勤"),
];
const MIN_TITLE_CHARS: usize = 10;
const MIN_CONTENT_CHARS: usize = 50;
const MIN_PARAGRAPH_CHARS: usize = 100;

static RE_PUBLISHED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"发布时间[：:]\s*(\d{4})[-/](\d{1,2})[-/](\d{1,2})").unwrap());

pub struct SimpleTableExtractor;

#[async_trait]
impl Extractor for SimpleTableExtractor {
    fn name(&self) -> &str {
        "simple-table"
    }

    fn can_handle(&self, url: &str, _html: &str) -> bool {
        DOMAINS.iter().any(|(host, _)| url.contains(host))
    }

    async fn extract(
        &self,
        url: &str,
        html: &str,
        _fetcher: &Fetcher,
    ) -> Result<ExtractedContent, ScrapeError> {
        Ok(parse_table_page(url, html))
    }
}

pub fn parse_table_page(url: &str, html: &str) -> ExtractedContent {
    let doc = Html::parse_document(html);
    let mut result = ExtractedContent {
        title: find_title(&doc).unwrap_or_default(),
        department: DOMAINS
            .iter()
            .find(|(host, _)| url.contains(host))
            .map(|(_, dept)| dept.to_string())
            .unwrap_or_default(),
        ..ExtractedContent::default()
    };

    if let Some(el) = find_body(&doc) {
        (result.html_content, result.plain_text) = clean_body(el);
    }

    let text = document_text(&doc);
    result.publish_time = RE_PUBLISHED
        .captures(&text)
        .map(|c| format!("{}-{:0>2}-{:0>2}", &c[1], &c[2], &c[3]))
        .or_else(|| find_chinese_date(&text))
        .unwrap_or_default();

    result
}

fn long_enough(text: String) -> Option<String> {
    (char_len(&text) > MIN_TITLE_CHARS).then_some(text)
}

fn find_title(doc: &Html) -> Option<String> {
    for tag in ["h1", "h2", "h3"] {
        if let Some(title) = select_all(doc, tag).into_iter().next().map(text_of) {
            if let Some(title) = long_enough(title) {
                return Some(title);
            }
        }
    }

    let td1_div = select_all(doc, "div[class]")
        .into_iter()
        .filter(|el| class_contains(*el, "td1"))
        .find_map(|el| long_enough(text_of(el)));
    if td1_div.is_some() {
        return td1_div;
    }

    let td1_cell = select_all(doc, "td[class]")
        .into_iter()
        .filter(|el| class_contains(*el, "td1"))
        .find_map(|td| {
            let inner = select_within(td, "span")
                .or_else(|| select_within(td, "strong"))
                .unwrap_or(td);
            long_enough(text_of(inner))
        });
    if td1_cell.is_some() {
        return td1_cell;
    }

    select_all(doc, "div[align], td[align]")
        .into_iter()
        .find_map(|el| {
            ["h1", "h2", "h3", "strong"]
                .iter()
                .filter_map(|tag| select_within(el, tag))
                .find_map(|inner| long_enough(text_of(inner)))
        })
}

fn has_long_text(el: &ElementRef<'_>) -> bool {
    char_len(&text_of(*el)) > MIN_CONTENT_CHARS
}

fn find_body(doc: &Html) -> Option<ElementRef<'_>> {
    let td4 = select_all(doc, "td")
        .into_iter()
        .find(|td| has_class(*td, "td4"));
    if let Some(td) = td4.filter(has_long_text) {
        return Some(td);
    }

    let content = select_all(doc, "div")
        .into_iter()
        .find(|div| has_class(*div, "content"));
    if let Some(div) = content.filter(has_long_text) {
        return Some(div);
    }

    select_all(doc, "p")
        .into_iter()
        .find(|p| char_len(&text_of(*p)) > MIN_PARAGRAPH_CHARS)
        .map(|p| p.parent().and_then(ElementRef::wrap).unwrap_or(p))
}
