//! Article retrieval.
//!
//! The query functions take a pool and are what a feed or API layer reads
//! through; `run_get` and `run_list` are the `harvest get` / `harvest list`
//! commands.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::models::StoredArticle;

const ARTICLE_COLUMNS: &str = "unique_id, title, content, department, category, publish_time_ms, \
                               url, content_digest, created_at, updated_at";

fn from_row(row: &SqliteRow) -> StoredArticle {
    StoredArticle {
        unique_id: row.get("unique_id"),
        title: row.get("title"),
        content: row.get("content"),
        department: row.get("department"),
        category: row.get("category"),
        publish_time_ms: row.get("publish_time_ms"),
        url: row.get("url"),
        content_digest: row.get("content_digest"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn get_article(pool: &SqlitePool, unique_id: &str) -> Result<Option<StoredArticle>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM articles WHERE unique_id = ?",
        ARTICLE_COLUMNS
    ))
    .bind(unique_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(from_row))
}

/// Newest first by publish time.
pub async fn recent_articles(pool: &SqlitePool, limit: i64) -> Result<Vec<StoredArticle>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM articles ORDER BY publish_time_ms DESC, id DESC LIMIT ?",
        ARTICLE_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(from_row).collect())
}

/// Articles published at or after `timestamp_ms`, newest first.
pub async fn articles_since(pool: &SqlitePool, timestamp_ms: i64) -> Result<Vec<StoredArticle>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM articles WHERE publish_time_ms >= ? ORDER BY publish_time_ms DESC, id DESC",
        ARTICLE_COLUMNS
    ))
    .bind(timestamp_ms)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(from_row).collect())
}

pub async fn article_exists(pool: &SqlitePool, unique_id: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM articles WHERE unique_id = ?")
        .bind(unique_id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// `harvest get <unique_id>`
pub async fn run_get(config: &Config, unique_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let article = get_article(&pool, unique_id).await?;
    pool.close().await;

    let Some(article) = article else {
        bail!("article not found: {}", unique_id);
    };

    println!("--- Article ---");
    println!("unique_id:    {}", article.unique_id);
    println!("title:        {}", article.title);
    println!("department:   {}", article.department);
    println!("category:     {}", article.category);
    println!("published:    {}", format_ms_iso(article.publish_time_ms));
    println!("url:          {}", article.url);
    println!("digest:       {}", article.content_digest);
    println!("created_at:   {}", format_ms_iso(article.created_at));
    println!("updated_at:   {}", format_ms_iso(article.updated_at));
    println!();

    println!("--- Content ---");
    if article.content.is_empty() {
        println!("(listing only, no content)");
    } else {
        println!("{}", article.content);
    }

    Ok(())
}

/// `harvest list [--limit N] [--since YYYY-MM-DD]`
pub async fn run_list(config: &Config, limit: i64, since: Option<&str>) -> Result<()> {
    let pool = db::connect(config).await?;
    let articles = match since {
        Some(date) => {
            let since_ms = parse_since(date)?;
            let mut all = articles_since(&pool, since_ms).await?;
            all.truncate(limit.max(0) as usize);
            all
        }
        None => recent_articles(&pool, limit).await?,
    };
    pool.close().await;

    if articles.is_empty() {
        println!("No articles.");
        return Ok(());
    }

    for a in &articles {
        println!(
            "{}  {:<12} {:<16} {}",
            format_ms_iso(a.publish_time_ms),
            a.unique_id,
            a.department,
            a.title
        );
    }
    println!();
    println!("{} article(s)", articles.len());
    Ok(())
}

/// `YYYY-MM-DD` to epoch milliseconds at 00:00 UTC.
pub fn parse_since(date: &str) -> Result<i64> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("invalid --since date '{}', expected YYYY-MM-DD", date))?;
    let start = day
        .and_hms_opt(0, 0, 0)
        .context("invalid start of day")?
        .and_utc();
    Ok(start.timestamp_millis())
}

pub fn format_ms_iso(ts_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts_ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::upsert_article;
    use crate::migrate;
    use crate::models::Article;
    use tempfile::TempDir;

    async fn seeded() -> (TempDir, SqlitePool) {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("g.sqlite")).await.unwrap();
        migrate::apply(&pool).await.unwrap();
        for (id, ts) in [("old", 1_000), ("mid", 2_000), ("new", 3_000)] {
            let article = Article {
                unique_id: id.into(),
                title: format!("Title {}", id),
                content: String::new(),
                department: "教务处".into(),
                category: "通知".into(),
                publish_time_ms: ts,
                url: format!("https://info.tsinghua.edu.cn/x?id={}", id),
            };
            upsert_article(&pool, &article).await.unwrap();
        }
        (tmp, pool)
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let (_tmp, pool) = seeded().await;
        let ids: Vec<_> = recent_articles(&pool, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.unique_id)
            .collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn since_is_inclusive() {
        let (_tmp, pool) = seeded().await;
        let ids: Vec<_> = articles_since(&pool, 2_000)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.unique_id)
            .collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn exists_and_get() {
        let (_tmp, pool) = seeded().await;
        assert!(article_exists(&pool, "mid").await.unwrap());
        assert!(!article_exists(&pool, "nope").await.unwrap());
        assert!(get_article(&pool, "nope").await.unwrap().is_none());
        assert_eq!(get_article(&pool, "old").await.unwrap().unwrap().publish_time_ms, 1_000);
    }

    #[test]
    fn since_date_parsing() {
        assert_eq!(parse_since("1970-01-02").unwrap(), 86_400_000);
        assert!(parse_since("02/01/1970").is_err());
    }
}
