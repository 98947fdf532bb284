//! Shared HTML helpers for the site extractors.
//!
//! Length thresholds throughout the extractors count characters, not
//! bytes, since most pages are Chinese.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_CN_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})\s*年\s*(\d{1,2})\s*月\s*(\d{1,2})\s*日").unwrap());
static RE_ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})[-/](\d{1,2})[-/](\d{1,2})").unwrap());

/// First element matching `css`, or `None` (also for an invalid selector).
pub fn select_first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector).next()
}

/// All elements matching `css` in document order.
pub fn select_all<'a>(doc: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => doc.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// First descendant of `element` matching `css`.
pub fn select_within<'a>(element: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    element.select(&selector).next()
}

/// Text of the element with each text node trimmed and glued together.
pub fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<String>()
}

/// Space-separated text with whitespace runs collapsed.
pub fn plain_text(element: ElementRef<'_>) -> String {
    let joined = element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    collapse_whitespace(&joined)
}

/// Plain text of an HTML fragment.
pub fn fragment_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    plain_text(fragment.root_element())
}

/// All text of a document, unjoined, for free-text regex scans.
pub fn document_text(doc: &Html) -> String {
    doc.root_element().text().collect::<String>()
}

pub fn collapse_whitespace(s: &str) -> String {
    RE_WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Subtrees never kept in captured content.
pub const SCRIPT_TAGS: [&str; 2] = ["script", "style"];
/// [`SCRIPT_TAGS`] plus page chrome, for whole-`<body>` captures.
pub const CHROME_TAGS: [&str; 5] = ["script", "style", "nav", "header", "footer"];

const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Outer HTML of `element` without scripts and styles, and its plain text.
pub fn clean_body(element: ElementRef<'_>) -> (String, String) {
    clean_subtree(element, &SCRIPT_TAGS)
}

/// Serialize `element`, leaving out every subtree whose tag is in `skip`,
/// and collect the plain text of what remains.
///
/// Works on the parsed tree, so nested elements of a skipped tag go with
/// their outermost ancestor.
pub fn clean_subtree(element: ElementRef<'_>, skip: &[&str]) -> (String, String) {
    let mut html = String::new();
    let mut texts = Vec::new();
    write_element(element, skip, &mut html, &mut texts);
    (html, collapse_whitespace(&texts.join(" ")))
}

fn write_element(element: ElementRef<'_>, skip: &[&str], html: &mut String, texts: &mut Vec<String>) {
    let el = element.value();
    let name = el.name();
    if skip.contains(&name) {
        return;
    }

    html.push('<');
    html.push_str(name);
    for (key, value) in el.attrs() {
        html.push_str(&format!(
            " {}=\"{}\"",
            key,
            html_escape::encode_double_quoted_attribute(value)
        ));
    }
    html.push('>');
    if VOID_TAGS.contains(&name) {
        return;
    }

    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            write_element(child_el, skip, html, texts);
        } else if let Node::Text(text) = child.value() {
            let raw: &str = text;
            html.push_str(&html_escape::encode_text(raw));
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                texts.push(trimmed.to_string());
            }
        }
    }

    html.push_str("</");
    html.push_str(name);
    html.push('>');
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Whether the element's `class` attribute has `name` as a whole token.
pub fn has_class(element: ElementRef<'_>, name: &str) -> bool {
    element
        .value()
        .attr("class")
        .map(|c| c.split_whitespace().any(|token| token == name))
        .unwrap_or(false)
}

/// Whether the raw `class` attribute contains `needle`, ignoring case.
pub fn class_contains(element: ElementRef<'_>, needle: &str) -> bool {
    element
        .value()
        .attr("class")
        .map(|c| c.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

/// First `YYYY年M月D日` date in `text`, as `YYYY-MM-DD`.
pub fn find_chinese_date(text: &str) -> Option<String> {
    RE_CN_DATE
        .captures(text)
        .map(|c| format_date(&c[1], &c[2], &c[3]))
}

/// First `YYYY-M-D` (or `YYYY/M/D`) date in `text`, as `YYYY-MM-DD`.
pub fn find_iso_date(text: &str) -> Option<String> {
    RE_ISO_DATE
        .captures(text)
        .map(|c| format_date(&c[1], &c[2], &c[3]))
}

/// Chinese form first, then the numeric form.
pub fn find_date(text: &str) -> Option<String> {
    find_chinese_date(text).or_else(|| find_iso_date(text))
}

fn format_date(year: &str, month: &str, day: &str) -> String {
    format!("{}-{:0>2}-{:0>2}", year, month, day)
}
