//! Career center job postings (`career.cic.tsinghua.edu.cn`).

use async_trait::async_trait;
use scraper::Html;

use crate::error::ScrapeError;
use crate::extract::{char_len, clean_body, has_class, select_all, select_first, text_of};
use crate::fetch::Fetcher;
use crate::models::ExtractedContent;
use crate::traits::Extractor;

const DEPARTMENT: &str = "学生职业发展指导中心";
/// Site chrome that shows up in headings on every page.
const CHROME_TITLES: [&str; 4] = ["用户登录", "首页", "通知公告", "清华大学学生职业发展指导中心"];
const MIN_TITLE_CHARS: usize = 10;
const MIN_CELL_CHARS: usize = 100;

pub struct CareerExtractor;

#[async_trait]
impl Extractor for CareerExtractor {
    fn name(&self) -> &str {
        "career"
    }

    fn can_handle(&self, url: &str, _html: &str) -> bool {
        url.contains("career.cic.tsinghua.edu.cn")
    }

    async fn extract(
        &self,
        _url: &str,
        html: &str,
        _fetcher: &Fetcher,
    ) -> Result<ExtractedContent, ScrapeError> {
        Ok(parse_career(html))
    }
}

pub fn parse_career(html: &str) -> ExtractedContent {
    let doc = Html::parse_document(html);
    let mut result = ExtractedContent {
        department: DEPARTMENT.to_string(),
        ..ExtractedContent::default()
    };

    for tag in ["h1", "h2", "h3"] {
        let Some(el) = select_first(&doc, tag) else {
            continue;
        };
        let text = text_of(el);
        if char_len(&text) > MIN_TITLE_CHARS && !CHROME_TITLES.contains(&text.as_str()) {
            result.title = text;
            break;
        }
    }

    let body = select_first(&doc, "div.content.teacher")
        .or_else(|| {
            select_all(&doc, "td")
                .into_iter()
                .find(|td| has_class(*td, "td4"))
        })
        .or_else(|| {
            select_all(&doc, "td[class]")
                .into_iter()
                .find(|td| char_len(&text_of(*td)) > MIN_CELL_CHARS)
        });
    if let Some(el) = body {
        (result.html_content, result.plain_text) = clean_body(el);
    }

    result
}
