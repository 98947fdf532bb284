//! Extractor for the portal's own detail pages.
//!
//! The static detail page is a shell filled in by JavaScript, so the
//! preferred path is the CSRF-gated JSON endpoint the page itself calls:
//! `POST detail?xxid=..&preview=&_csrf=..` answering
//! `{result, object: {xxDto: {bt, nr, dw, fbsj}}}` with `nr` HTML-escaped.
//! Without a token, or if the endpoint misbehaves, the static markup is
//! parsed instead.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Url;
use scraper::Html;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::PortalConfig;
use crate::error::ScrapeError;
use crate::extract::{clean_body, fragment_text, has_class, select_all, select_first, text_of};
use crate::fetch::Fetcher;
use crate::models::ExtractedContent;
use crate::traits::Extractor;

/// Portal timestamps are Beijing time.
const PORTAL_UTC_OFFSET_SECS: i32 = 8 * 3600;

pub struct InternalExtractor {
    host: String,
    detail_api_url: String,
}

impl InternalExtractor {
    pub fn new(portal: &PortalConfig) -> Self {
        let host = Url::parse(&portal.base_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_default();
        Self {
            host,
            detail_api_url: portal.detail_api_url(),
        }
    }

    async fn fetch_json(
        &self,
        url: &str,
        xxid: &str,
        fetcher: &Fetcher,
    ) -> Result<ExtractedContent, ScrapeError> {
        let session = fetcher.session();
        let token = session.csrf_token().ok_or(ScrapeError::CsrfMissing)?;
        let params = [
            ("xxid", xxid.to_string()),
            ("preview", String::new()),
            ("_csrf", token.to_string()),
        ];
        let response = session.post(&self.detail_api_url, &params).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::transport(&self.detail_api_url, e))?;
        parse_detail_json(url, &body)
    }
}

#[async_trait]
impl Extractor for InternalExtractor {
    fn name(&self) -> &str {
        "internal"
    }

    fn can_handle(&self, url: &str, _html: &str) -> bool {
        let same_host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h == self.host))
            .unwrap_or(false);
        same_host && url.contains("/template/detail")
    }

    async fn extract(
        &self,
        url: &str,
        html: &str,
        fetcher: &Fetcher,
    ) -> Result<ExtractedContent, ScrapeError> {
        if let Some(xxid) = xxid_of(url) {
            match self.fetch_json(url, &xxid, fetcher).await {
                Ok(content) => return Ok(content),
                Err(ScrapeError::CsrfMissing) => {
                    debug!(%url, "no CSRF token, parsing static detail page");
                }
                Err(e) => {
                    warn!(%url, error = %e, "detail endpoint failed, parsing static page");
                }
            }
        }
        Ok(parse_static(html))
    }
}

fn xxid_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "xxid")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
struct DetailEnvelope {
    #[serde(default)]
    result: String,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    object: Option<DetailObject>,
}

#[derive(Debug, Deserialize)]
struct DetailObject {
    #[serde(rename = "xxDto", default)]
    dto: Option<DetailDto>,
}

#[derive(Debug, Deserialize)]
struct DetailDto {
    #[serde(default)]
    bt: Option<String>,
    #[serde(default)]
    nr: Option<String>,
    #[serde(default)]
    dw: Option<String>,
    #[serde(default)]
    fbsj: Option<serde_json::Value>,
}

/// Decode the JSON detail response.
pub fn parse_detail_json(url: &str, body: &str) -> Result<ExtractedContent, ScrapeError> {
    let envelope: DetailEnvelope = serde_json::from_str(body)
        .map_err(|e| ScrapeError::extraction(url, format!("invalid detail JSON: {}", e)))?;
    if envelope.result != "success" {
        return Err(ScrapeError::Api(
            envelope.msg.unwrap_or_else(|| format!("result '{}'", envelope.result)),
        ));
    }
    let dto = envelope
        .object
        .and_then(|o| o.dto)
        .ok_or_else(|| ScrapeError::extraction(url, "detail JSON has no xxDto"))?;

    let html_content = html_escape::decode_html_entities(dto.nr.as_deref().unwrap_or(""))
        .into_owned();
    let content = ExtractedContent {
        title: dto.bt.unwrap_or_default().trim().to_string(),
        plain_text: fragment_text(&html_content),
        html_content,
        department: dto.dw.unwrap_or_default().trim().to_string(),
        publish_time: format_publish_time(dto.fbsj.as_ref()),
    };
    if content.title.is_empty() && content.html_content.is_empty() {
        return Err(ScrapeError::extraction(url, "detail JSON is empty"));
    }
    Ok(content)
}

fn format_publish_time(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .zip(FixedOffset::east_opt(PORTAL_UTC_OFFSET_SECS))
            .map(|(dt, tz)| dt.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    }
}

/// Parse the server-rendered detail page.
pub fn parse_static(html: &str) -> ExtractedContent {
    let mut result = ExtractedContent::default();
    let doc = Html::parse_document(html);

    let title = select_all(&doc, "h2")
        .into_iter()
        .find(|el| has_class(*el, "title"))
        .or_else(|| {
            select_all(&doc, "div")
                .into_iter()
                .find(|el| has_class(*el, "title"))
        });
    if let Some(el) = title {
        result.title = text_of(el);
    }

    let body = select_first(&doc, "div.jianjie.xiangqingchakan")
        .or_else(|| select_first(&doc, "div.jianjie"));
    if let Some(el) = body {
        (result.html_content, result.plain_text) = clean_body(el);
    }

    if let Some(span) = select_first(&doc, "label#fromFlag span") {
        result.department = text_of(span);
    }
    if let Some(span) = select_first(&doc, "label#timeFlag span") {
        result.publish_time = text_of(span);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    const STATIC_PAGE: &str = r#"<html><body>
        <h2 class="title main">关于2026年寒假安排的通知</h2>
        <label id="fromFlag">发布单位：<span>校长办公室</span></label>
        <label id="timeFlag">发布时间：<span>2026-01-10 09:00</span></label>
        <div class="jianjie xiangqingchakan"><p>各单位：</p><p>寒假安排如下。</p>
          <script>track()</script></div>
        </body></html>"#;

    #[test]
    fn static_page_fields() {
        let out = parse_static(STATIC_PAGE);
        assert_eq!(out.title, "关于2026年寒假安排的通知");
        assert_eq!(out.department, "校长办公室");
        assert_eq!(out.publish_time, "2026-01-10 09:00");
        assert!(out.html_content.contains("寒假安排如下"));
        assert!(!out.html_content.contains("track()"));
        assert_eq!(out.plain_text, "各单位： 寒假安排如下。");
    }

    #[test]
    fn json_content_is_unescaped() {
        let body = r#"{"result":"success","object":{"xxDto":{
            "bt":"Title A","nr":"&lt;p&gt;Hello &amp; welcome&lt;/p&gt;",
            "dw":"教务处","fbsj":1700000000000}}}"#;
        let out = parse_detail_json("u", body).unwrap();
        assert_eq!(out.title, "Title A");
        assert_eq!(out.html_content, "<p>Hello & welcome</p>");
        assert_eq!(out.plain_text, "Hello & welcome");
        assert_eq!(out.department, "教务处");
        assert_eq!(out.publish_time, "2023-11-15 06:13:20");
    }

    #[test]
    fn json_failure_result_is_api_error() {
        let err = parse_detail_json("u", r#"{"result":"error","msg":"denied"}"#).unwrap_err();
        assert!(matches!(err, ScrapeError::Api(ref m) if m == "denied"));
    }

    #[test]
    fn xxid_from_query() {
        assert_eq!(
            xxid_of("https://info.tsinghua.edu.cn/f/info/xxfb_fg/xnzx/template/detail?xxid=abc123")
                .as_deref(),
            Some("abc123")
        );
        assert_eq!(xxid_of("https://info.tsinghua.edu.cn/detail"), None);
    }

    #[test]
    fn handles_only_configured_host() {
        let ex = InternalExtractor::new(&PortalConfig::default());
        assert!(ex.can_handle(
            "https://info.tsinghua.edu.cn/f/info/xxfb_fg/xnzx/template/detail?xxid=1",
            ""
        ));
        assert!(!ex.can_handle("https://info.tsinghua.edu.cn/f/info/more", ""));
        assert!(!ex.can_handle("https://evil.example/info.tsinghua.edu.cn/template/detail", ""));
    }

    #[tokio::test]
    async fn missing_csrf_degrades_to_static_parse() {
        let portal = PortalConfig::default();
        let fetcher = Fetcher::new(Session::new(&portal).unwrap(), Vec::new());
        let ex = InternalExtractor::new(&portal);
        let url = "https://info.tsinghua.edu.cn/f/info/xxfb_fg/xnzx/template/detail?xxid=a1";
        let out = ex.extract(url, STATIC_PAGE, &fetcher).await.unwrap();
        assert_eq!(out.department, "校长办公室");
    }
}
