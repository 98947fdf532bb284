//! Digest, validation and upsert into the article store, plus the scrape
//! cursor.
//!
//! The digest covers `title|content|department|category` only, so a
//! change of publish time or URL alone never rewrites a row. Each upsert
//! is a read-then-conditional-write inside one transaction; the store
//! assumes a single writer.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{ScrapeError, ValidationError};
use crate::models::{Article, ListingItem, UpsertState};

const LAST_SCRAPE_KEY: &str = "last_scrape_time";

const MAX_UNIQUE_ID: usize = 100;
const MAX_TITLE: usize = 1000;
const MAX_URL: usize = 2000;
const MAX_DEPARTMENT: usize = 200;
const MAX_CATEGORY: usize = 100;
/// 1 MB of text.
const MAX_CONTENT: usize = 1_000_000;

/// Stable change-detection fingerprint (hex SHA-256).
pub fn compute_digest(title: &str, content: &str, department: &str, category: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}|{}", title, content, department, category).as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn article_digest(article: &Article) -> String {
    compute_digest(
        &article.title,
        &article.content,
        &article.department,
        &article.category,
    )
}

/// The listing fields every article needs, named as the API names them.
pub fn validate_listing_item(item: &ListingItem) -> Result<(), ValidationError> {
    let mut missing = Vec::new();
    if item.id.trim().is_empty() {
        missing.push("xxid");
    }
    if item.title.trim().is_empty() {
        missing.push("bt");
    }
    if item.publish_time_ms.is_none() {
        missing.push("fbsj");
    }
    if item.relative_url.trim().is_empty() {
        missing.push("url");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingFields(missing))
    }
}

/// Length limits, counted in characters.
pub fn validate_article(article: &Article) -> Result<(), ValidationError> {
    if article.unique_id.is_empty() {
        return Err(ValidationError::MissingFields(vec!["xxid"]));
    }
    let limits: [(&'static str, &str, usize); 6] = [
        ("xxid", &article.unique_id, MAX_UNIQUE_ID),
        ("title", &article.title, MAX_TITLE),
        ("url", &article.url, MAX_URL),
        ("department", &article.department, MAX_DEPARTMENT),
        ("category", &article.category, MAX_CATEGORY),
        ("content", &article.content, MAX_CONTENT),
    ];
    for (field, value, max) in limits {
        if value.chars().count() > max {
            return Err(ValidationError::TooLong { field, max });
        }
    }
    Ok(())
}

/// Insert, update or skip `article` by `unique_id`.
pub async fn upsert_article(pool: &SqlitePool, article: &Article) -> Result<UpsertState, ScrapeError> {
    validate_article(article)?;
    let digest = article_digest(article);
    let now = chrono::Utc::now().timestamp_millis();

    let mut tx = pool.begin().await?;

    let existing: Option<String> =
        sqlx::query_scalar("SELECT content_digest FROM articles WHERE unique_id = ?")
            .bind(&article.unique_id)
            .fetch_optional(&mut *tx)
            .await?;

    let state = match existing {
        None => {
            sqlx::query(
                r#"
                INSERT INTO articles (unique_id, title, content, department, category,
                                      publish_time_ms, url, content_digest, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&article.unique_id)
            .bind(&article.title)
            .bind(&article.content)
            .bind(&article.department)
            .bind(&article.category)
            .bind(article.publish_time_ms)
            .bind(&article.url)
            .bind(&digest)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            UpsertState::New
        }
        Some(stored) if stored == digest => UpsertState::Skipped,
        Some(_) => {
            sqlx::query(
                r#"
                UPDATE articles SET
                    title = ?, content = ?, department = ?, category = ?,
                    publish_time_ms = ?, url = ?, content_digest = ?, updated_at = ?
                WHERE unique_id = ?
                "#,
            )
            .bind(&article.title)
            .bind(&article.content)
            .bind(&article.department)
            .bind(&article.category)
            .bind(article.publish_time_ms)
            .bind(&article.url)
            .bind(&digest)
            .bind(now)
            .bind(&article.unique_id)
            .execute(&mut *tx)
            .await?;
            UpsertState::Updated
        }
    };

    tx.commit().await?;
    debug!(unique_id = %article.unique_id, %state, "upserted");
    Ok(state)
}

pub async fn get_last_scrape_time(pool: &SqlitePool) -> Result<Option<i64>, ScrapeError> {
    let value: Option<i64> = sqlx::query_scalar("SELECT value FROM scrape_metadata WHERE key = ?")
        .bind(LAST_SCRAPE_KEY)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

/// Set the cursor unconditionally (operator override).
pub async fn set_last_scrape_time(pool: &SqlitePool, timestamp_ms: i64) -> Result<(), ScrapeError> {
    sqlx::query(
        r#"
        INSERT INTO scrape_metadata (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(LAST_SCRAPE_KEY)
    .bind(timestamp_ms)
    .execute(pool)
    .await?;
    Ok(())
}

/// Move the cursor forward to `timestamp_ms`; never moves it back.
/// Returns the stored value.
pub async fn advance_last_scrape_time(pool: &SqlitePool, timestamp_ms: i64) -> Result<i64, ScrapeError> {
    sqlx::query(
        r#"
        INSERT INTO scrape_metadata (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = MAX(value, excluded.value)
        "#,
    )
    .bind(LAST_SCRAPE_KEY)
    .bind(timestamp_ms)
    .execute(pool)
    .await?;
    Ok(get_last_scrape_time(pool).await?.unwrap_or(timestamp_ms))
}

pub async fn clear_last_scrape_time(pool: &SqlitePool) -> Result<(), ScrapeError> {
    sqlx::query("DELETE FROM scrape_metadata WHERE key = ?")
        .bind(LAST_SCRAPE_KEY)
        .execute(pool)
        .await?;
    Ok(())
}
