//! Core data models used throughout the harvester.
//!
//! [`ListingItem`] and [`ExtractedContent`] live only for one
//! fetch-and-classify cycle; [`Article`] is what gets persisted.

use serde::{Deserialize, Deserializer, Serialize};

/// One entry of a listing-API page (`object.dataList[]`).
///
/// Every field is lenient on input so a single malformed entry surfaces as
/// a validation error for that item instead of failing the whole page.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ListingItem {
    #[serde(rename = "xxid", default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(rename = "bt", default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(rename = "dwmc", default, deserialize_with = "null_as_empty")]
    pub department: String,
    #[serde(rename = "lmmc", default, deserialize_with = "null_as_empty")]
    pub category: String,
    #[serde(rename = "fbsj", default, deserialize_with = "lenient_millis")]
    pub publish_time_ms: Option<i64>,
    #[serde(rename = "url", default, deserialize_with = "null_as_empty")]
    pub relative_url: String,
}

/// Fields produced by one extractor invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedContent {
    pub title: String,
    pub html_content: String,
    pub plain_text: String,
    pub department: String,
    /// Free-form publish time as found on the page (usually `YYYY-MM-DD`).
    pub publish_time: String,
}

/// An article ready to be upserted. `unique_id` is the upsert key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub unique_id: String,
    pub title: String,
    pub content: String,
    pub department: String,
    pub category: String,
    pub publish_time_ms: i64,
    pub url: String,
}

/// An article row as read back from the store.
#[derive(Debug, Clone, Serialize)]
pub struct StoredArticle {
    pub unique_id: String,
    pub title: String,
    pub content: String,
    pub department: String,
    pub category: String,
    pub publish_time_ms: i64,
    pub url: String,
    pub content_digest: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Classification of a single upsert. Exactly one per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpsertState {
    New,
    Updated,
    Skipped,
}

impl std::fmt::Display for UpsertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpsertState::New => write!(f, "NEW"),
            UpsertState::Updated => write!(f, "UPDATED"),
            UpsertState::Skipped => write!(f, "SKIPPED"),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

/// Publish times arrive as epoch milliseconds, occasionally quoted.
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}
