//! Student portal notices (`myhome.tsinghua.edu.cn`), an ASP.NET site with
//! fixed server-control ids.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

use crate::error::ScrapeError;
use crate::extract::{clean_body, select_first, text_of};
use crate::fetch::Fetcher;
use crate::models::ExtractedContent;
use crate::traits::Extractor;

const TITLE_SELECTOR: &str = "span#News_notice_DetailCtrl1_lblTitle";
const CONTENT_SELECTOR: &str = "span#News_notice_DetailCtrl1_lblquality_content";
const TIME_SELECTOR: &str = "span#News_notice_DetailCtrl1_lbladd_time";

// "<department> 发布于 <time>"
static RE_PUBLISHER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?)\s+发布于").unwrap());

pub struct MyhomeExtractor;

#[async_trait]
impl Extractor for MyhomeExtractor {
    fn name(&self) -> &str {
        "myhome"
    }

    fn can_handle(&self, url: &str, _html: &str) -> bool {
        url.contains("myhome.tsinghua.edu.cn")
    }

    async fn extract(
        &self,
        _url: &str,
        html: &str,
        _fetcher: &Fetcher,
    ) -> Result<ExtractedContent, ScrapeError> {
        Ok(parse_myhome(html))
    }
}

pub fn parse_myhome(html: &str) -> ExtractedContent {
    let doc = Html::parse_document(html);
    let mut result = ExtractedContent::default();

    if let Some(el) = select_first(&doc, TITLE_SELECTOR) {
        result.title = text_of(el);
    }
    if let Some(el) = select_first(&doc, CONTENT_SELECTOR) {
        (result.html_content, result.plain_text) = clean_body(el);
    }
    if let Some(el) = select_first(&doc, TIME_SELECTOR) {
        // text_of would glue "dept 发布于" together
        let time_text = el.text().collect::<String>().trim().to_string();
        if let Some(caps) = RE_PUBLISHER.captures(&time_text) {
            result.department = caps[1].trim().to_string();
        }
        result.publish_time = time_text;
    }

    result
}
