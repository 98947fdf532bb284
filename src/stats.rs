//! Store statistics.
//!
//! Article counts, a per-department breakdown and the scrape cursor, so an
//! operator can see at a glance whether scheduled runs are landing.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::ingest;

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentCount {
    pub department: String,
    pub articles: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_articles: i64,
    pub with_content: i64,
    pub newest_publish_ms: Option<i64>,
    pub last_scrape_ms: Option<i64>,
    pub departments: Vec<DepartmentCount>,
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<StoreStats> {
    let total_articles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
        .fetch_one(pool)
        .await?;

    let with_content: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE content != ''")
        .fetch_one(pool)
        .await?;

    let newest_publish_ms: Option<i64> = sqlx::query_scalar("SELECT MAX(publish_time_ms) FROM articles")
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query(
        r#"
        SELECT department, COUNT(*) AS articles
        FROM articles
        GROUP BY department
        ORDER BY articles DESC, department ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let departments = rows
        .iter()
        .map(|row| DepartmentCount {
            department: row.get("department"),
            articles: row.get("articles"),
        })
        .collect();

    Ok(StoreStats {
        total_articles,
        with_content,
        newest_publish_ms,
        last_scrape_ms: ingest::get_last_scrape_time(pool).await?,
        departments,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = collect_stats(&pool).await?;
    pool.close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Info Harvest store stats");
    println!("==========================");
    println!();
    println!("  Database:     {}", config.db.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!();
    println!("  Articles:     {}", stats.total_articles);
    println!("  With content: {}", stats.with_content);
    println!(
        "  Newest:       {}",
        stats
            .newest_publish_ms
            .map(format_ts_relative)
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "  Last scrape:  {}",
        stats
            .last_scrape_ms
            .map(format_ts_relative)
            .unwrap_or_else(|| "never".to_string())
    );

    if !stats.departments.is_empty() {
        println!();
        println!("  By department:");
        println!("  {:<32} {:>8}", "DEPARTMENT", "ARTICLES");
        println!("  {}", "-".repeat(42));
        for d in &stats.departments {
            let name = if d.department.is_empty() {
                "(none)"
            } else {
                d.department.as_str()
            };
            println!("  {:<32} {:>8}", name, d.articles);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a millisecond timestamp as a relative time string (e.g. "3 hours ago").
pub fn format_ts_relative(ts_ms: i64) -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let delta = (now - ts_ms) / 1000;

    if delta < 0 {
        return format_ts(ts_ms);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts(ts_ms)
    }
}

fn format_ts(ts_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts_ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{set_last_scrape_time, upsert_article};
    use crate::migrate;
    use crate::models::Article;
    use tempfile::TempDir;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn relative_time() {
        let now = chrono::Utc::now().timestamp_millis();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 2 * 3_600_000), "2 hours ago");
        assert_eq!(format_ts_relative(0), "1970-01-01 00:00");
    }

    #[tokio::test]
    async fn counts_by_department() {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("s.sqlite")).await.unwrap();
        migrate::apply(&pool).await.unwrap();

        for (id, dept, content) in [("a", "教务处", ""), ("b", "教务处", "<p>x</p>"), ("c", "图书馆", "")] {
            let article = Article {
                unique_id: id.into(),
                title: format!("Title {}", id),
                content: content.into(),
                department: dept.into(),
                category: String::new(),
                publish_time_ms: 5_000,
                url: format!("https://info.tsinghua.edu.cn/{}", id),
            };
            upsert_article(&pool, &article).await.unwrap();
        }
        set_last_scrape_time(&pool, 9_000).await.unwrap();

        let stats = collect_stats(&pool).await.unwrap();
        assert_eq!(stats.total_articles, 3);
        assert_eq!(stats.with_content, 1);
        assert_eq!(stats.newest_publish_ms, Some(5_000));
        assert_eq!(stats.last_scrape_ms, Some(9_000));
        assert_eq!(stats.departments[0].department, "教务处");
        assert_eq!(stats.departments[0].articles, 2);
    }
}
