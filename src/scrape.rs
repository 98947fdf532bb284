//! Scrape orchestration.
//!
//! One run is: re-run guard → session setup → cutoff scan of the listing →
//! per-item detail resolution (optional) and upsert → cursor update.
//!
//! Per-item failures (validation, an unreachable detail page) are counted
//! and skipped. A listing-level or storage failure aborts the rest of the
//! run. The cursor moves to the run's start time whenever the run finished
//! or got at least one item through; a run that aborted before any item
//! leaves it alone.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{Config, ScrapeConfig, ScrapeMode};
use crate::db;
use crate::error::ScrapeError;
use crate::ingest;
use crate::listing::{CutoffScanner, ScanStep};
use crate::models::{Article, ListingItem, UpsertState};
use crate::portal::PortalClient;
use crate::progress::{ProgressMode, ScrapeProgressEvent, ScrapeProgressReporter};
use crate::traits::{ArticleSource, ResolvedDetail};

/// Parameters of one listing walk.
#[derive(Debug, Clone)]
pub struct CycleOptions {
    pub max_pages: u32,
    pub page_size: u32,
    pub column_id: String,
    pub cutoff_ms: i64,
    pub mode: ScrapeMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeStats {
    pub new: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
    /// Items taken from the listing, whatever their outcome.
    pub processed: u64,
}

impl ScrapeStats {
    fn record(&mut self, state: UpsertState) {
        match state {
            UpsertState::New => self.new += 1,
            UpsertState::Updated => self.updated += 1,
            UpsertState::Skipped => self.skipped += 1,
        }
    }
}

/// How a listing walk ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    Cutoff,
    Exhausted,
    Aborted(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub stats: ScrapeStats,
    pub stop: StopReason,
}

/// Result of a run that got past the re-run guard.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stats: ScrapeStats,
    pub stop: StopReason,
    pub cutoff_ms: i64,
    /// Cursor value after the run, if any.
    pub cursor_ms: Option<i64>,
    pub cursor_advanced: bool,
}

impl RunReport {
    pub fn aborted(&self) -> bool {
        matches!(self.stop, StopReason::Aborted(_))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The previous run was too recent; nothing was done.
    Skipped {
        last_scrape_ms: i64,
        next_allowed_ms: i64,
    },
    Completed(RunReport),
}

/// Run-level settings, usually [`ScrapeConfig`] plus CLI overrides.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Ignore the minimum-interval guard.
    pub force: bool,
    /// Scan from the beginning of time (cutoff 0).
    pub full: bool,
    pub mode: ScrapeMode,
    pub max_pages: u32,
    pub page_size: u32,
    pub column_id: String,
    pub interval_ms: i64,
    pub min_interval_ms: i64,
}

impl RunOptions {
    pub fn from_config(scrape: &ScrapeConfig) -> Self {
        Self {
            force: false,
            full: false,
            mode: scrape.mode,
            max_pages: scrape.max_pages,
            page_size: scrape.page_size,
            column_id: scrape.column_id.clone(),
            interval_ms: scrape.interval_ms(),
            min_interval_ms: scrape.min_interval_ms(),
        }
    }
}

/// Oldest publish time still worth looking at: one scrape interval of
/// overlap before the previous run, or everything on the first run.
pub fn compute_cutoff(last_scrape_ms: Option<i64>, interval_ms: i64) -> i64 {
    match last_scrape_ms {
        Some(last) => (last - interval_ms).max(0),
        None => 0,
    }
}

/// Combine listing metadata with the extracted detail page.
pub fn merge_detail(item: &ListingItem, publish_time_ms: i64, detail: ResolvedDetail) -> Article {
    let content = detail.content;
    Article {
        unique_id: item.id.clone(),
        title: non_empty_or(content.title, &item.title),
        content: content.html_content,
        department: non_empty_or(content.department, &item.department),
        category: item.category.clone(),
        publish_time_ms,
        url: detail.final_url,
    }
}

fn non_empty_or(extracted: String, listed: &str) -> String {
    if extracted.trim().is_empty() {
        listed.to_string()
    } else {
        extracted
    }
}

async fn build_article<S>(source: &S, item: &ListingItem, mode: ScrapeMode) -> Result<Article, ScrapeError>
where
    S: ArticleSource + ?Sized,
{
    ingest::validate_listing_item(item)?;
    let publish_time_ms = item.publish_time_ms.unwrap_or_default();
    match mode {
        ScrapeMode::Listing => Ok(Article {
            unique_id: item.id.clone(),
            title: item.title.clone(),
            content: String::new(),
            department: item.department.clone(),
            category: item.category.clone(),
            publish_time_ms,
            url: source.absolute_url(&item.relative_url),
        }),
        ScrapeMode::Detail => {
            let detail = source.resolve(item).await?;
            Ok(merge_detail(item, publish_time_ms, detail))
        }
    }
}

/// Walk the listing down to `cutoff_ms` and upsert every item.
///
/// Never returns an error: listing and storage failures end the walk with
/// [`StopReason::Aborted`] and the counts so far.
pub async fn run_scrape_cycle<S>(
    pool: &SqlitePool,
    source: &S,
    opts: &CycleOptions,
    progress: &dyn ScrapeProgressReporter,
) -> CycleReport
where
    S: ArticleSource + ?Sized,
{
    let mut stats = ScrapeStats::default();
    let mut scanner = CutoffScanner::new(opts.cutoff_ms, opts.max_pages, opts.page_size, opts.column_id.clone());
    let mut pages_reported = 0;

    let stop = loop {
        let step = scanner.next(source).await;
        while pages_reported < scanner.pages_fetched() {
            pages_reported += 1;
            progress.report(ScrapeProgressEvent::Page { page: pages_reported });
        }

        let item = match step {
            Ok(ScanStep::Item(item)) => item,
            Ok(ScanStep::StopAtCutoff) => break StopReason::Cutoff,
            Ok(ScanStep::Exhausted) => break StopReason::Exhausted,
            Err(e) => {
                error!(error = %e, "listing failed, aborting run");
                stats.errors += 1;
                break StopReason::Aborted(e.to_string());
            }
        };
        stats.processed += 1;

        let result = match build_article(source, &item, opts.mode).await {
            Ok(article) => ingest::upsert_article(pool, &article).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(state) => {
                stats.record(state);
                progress.report(ScrapeProgressEvent::Item {
                    n: stats.processed,
                    unique_id: item.id.clone(),
                    state,
                });
            }
            Err(ScrapeError::Storage(e)) => {
                error!(unique_id = %item.id, error = %e, "storage failed, aborting run");
                stats.errors += 1;
                break StopReason::Aborted(format!("storage error: {}", e));
            }
            Err(e) => {
                warn!(unique_id = %item.id, error = %e, "item skipped");
                stats.errors += 1;
                progress.report(ScrapeProgressEvent::ItemFailed {
                    n: stats.processed,
                    unique_id: item.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    };

    info!(
        new = stats.new,
        updated = stats.updated,
        skipped = stats.skipped,
        errors = stats.errors,
        pages = scanner.pages_fetched(),
        stop = ?stop,
        "scrape cycle finished"
    );
    CycleReport { stats, stop }
}

/// One guarded run against `source`, timed at `now_ms`.
pub async fn run<S>(
    pool: &SqlitePool,
    source: &mut S,
    opts: &RunOptions,
    now_ms: i64,
    progress: &dyn ScrapeProgressReporter,
) -> Result<RunOutcome, ScrapeError>
where
    S: ArticleSource + ?Sized,
{
    let last = ingest::get_last_scrape_time(pool).await?;

    if let Some(last_ms) = last {
        if !opts.force && now_ms - last_ms < opts.min_interval_ms {
            let next_allowed_ms = last_ms + opts.min_interval_ms;
            info!(last_scrape_ms = last_ms, next_allowed_ms, "previous run too recent, skipping");
            return Ok(RunOutcome::Skipped {
                last_scrape_ms: last_ms,
                next_allowed_ms,
            });
        }
    }

    let cutoff_ms = if opts.full {
        0
    } else {
        compute_cutoff(last, opts.interval_ms)
    };

    if let Err(e) = source.prepare().await {
        error!(error = %e, "session setup failed");
        return Ok(RunOutcome::Completed(RunReport {
            stats: ScrapeStats {
                errors: 1,
                ..ScrapeStats::default()
            },
            stop: StopReason::Aborted(e.to_string()),
            cutoff_ms,
            cursor_ms: last,
            cursor_advanced: false,
        }));
    }

    let cycle = CycleOptions {
        max_pages: opts.max_pages,
        page_size: opts.page_size,
        column_id: opts.column_id.clone(),
        cutoff_ms,
        mode: opts.mode,
    };
    let report = run_scrape_cycle(pool, &*source, &cycle, progress).await;

    let aborted = matches!(report.stop, StopReason::Aborted(_));
    let (cursor_ms, cursor_advanced) = if !aborted || report.stats.processed > 0 {
        let stored = ingest::advance_last_scrape_time(pool, now_ms).await?;
        (Some(stored), true)
    } else {
        warn!("run aborted before any item, cursor unchanged");
        (last, false)
    };

    Ok(RunOutcome::Completed(RunReport {
        stats: report.stats,
        stop: report.stop,
        cutoff_ms,
        cursor_ms,
        cursor_advanced,
    }))
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// CLI overrides for `harvest scrape`.
#[derive(Debug, Clone, Default)]
pub struct ScrapeArgs {
    pub force: bool,
    pub full: bool,
    pub listing_only: bool,
    pub max_pages: Option<u32>,
    pub page_size: Option<u32>,
    pub json: bool,
}

impl ScrapeArgs {
    pub fn apply(&self, scrape: &ScrapeConfig) -> RunOptions {
        let mut opts = RunOptions::from_config(scrape);
        opts.force = self.force;
        opts.full = self.full;
        if self.listing_only {
            opts.mode = ScrapeMode::Listing;
        }
        if let Some(n) = self.max_pages {
            opts.max_pages = n.max(1);
        }
        if let Some(n) = self.page_size {
            opts.page_size = n.max(1);
        }
        opts
    }
}

fn progress_mode(json: bool) -> ProgressMode {
    if json {
        ProgressMode::Json
    } else {
        ProgressMode::default_for_tty()
    }
}

/// `harvest scrape`
pub async fn run_scrape(config: &Config, args: &ScrapeArgs) -> Result<()> {
    let pool = db::connect(config).await?;
    let mut client = PortalClient::new(config)?;
    let opts = args.apply(&config.scrape);
    let reporter = progress_mode(args.json).reporter();

    let outcome = run(&pool, &mut client, &opts, now_ms(), reporter.as_ref()).await?;
    pool.close().await;

    print_outcome(&outcome, &opts);
    Ok(())
}

fn print_outcome(outcome: &RunOutcome, opts: &RunOptions) {
    match outcome {
        RunOutcome::Skipped {
            last_scrape_ms,
            next_allowed_ms,
        } => {
            println!("scrape skipped");
            println!("  last run:     {}", crate::get::format_ms_iso(*last_scrape_ms));
            println!("  next allowed: {}", crate::get::format_ms_iso(*next_allowed_ms));
            println!("  (use --force to run anyway)");
        }
        RunOutcome::Completed(report) => {
            let mode = match opts.mode {
                ScrapeMode::Detail => "detail",
                ScrapeMode::Listing => "listing",
            };
            println!("scrape ({})", mode);
            println!("  cutoff:    {}", crate::get::format_ms_iso(report.cutoff_ms));
            println!("  processed: {}", report.stats.processed);
            println!("  new:       {}", report.stats.new);
            println!("  updated:   {}", report.stats.updated);
            println!("  skipped:   {}", report.stats.skipped);
            println!("  errors:    {}", report.stats.errors);
            match &report.stop {
                StopReason::Cutoff => println!("  stopped:   cutoff reached"),
                StopReason::Exhausted => println!("  stopped:   listing exhausted"),
                StopReason::Aborted(reason) => println!("  aborted:   {}", reason),
            }
            match (report.cursor_advanced, report.cursor_ms) {
                (true, Some(ms)) => println!("  cursor:    {}", crate::get::format_ms_iso(ms)),
                _ => println!("  cursor:    unchanged"),
            }
            if report.aborted() {
                println!("partial");
            } else {
                println!("ok");
            }
        }
    }
}

/// `harvest watch`: scrape every `scrape.interval_secs` until Ctrl-C.
pub async fn run_watch(config: &Config, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let opts = RunOptions::from_config(&config.scrape);
    let reporter = progress_mode(json).reporter();
    let mut ticker = tokio::time::interval(Duration::from_secs(config.scrape.interval_secs.max(1)));

    info!(interval_secs = config.scrape.interval_secs, "watch started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping watch");
                break;
            }
        }

        // Fresh session per run so a stale CSRF token never carries over.
        let mut client = match PortalClient::new(config) {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "could not build portal client");
                continue;
            }
        };
        match run(&pool, &mut client, &opts, now_ms(), reporter.as_ref()).await {
            Ok(outcome) => print_outcome(&outcome, &opts),
            Err(e) => error!(error = %e, "scrape run failed"),
        }
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::get;
    use crate::migrate;
    use crate::models::ExtractedContent;
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const CUTOFF: i64 = 1_700_000_000_000;
    const MIN: i64 = 600_000;
    const INTERVAL: i64 = 900_000;

    #[derive(Default)]
    struct FakePortal {
        pages: Vec<Vec<ListingItem>>,
        fail_listing_on: Option<u32>,
        fail_prepare: bool,
        broken_details: HashSet<String>,
        requested_pages: Mutex<Vec<u32>>,
        resolved: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ArticleSource for FakePortal {
        async fn prepare(&mut self) -> Result<(), ScrapeError> {
            if self.fail_prepare {
                Err(ScrapeError::Api("portal down".into()))
            } else {
                Ok(())
            }
        }

        async fn list_page(&self, _c: &str, page: u32, _s: u32) -> Result<Vec<ListingItem>, ScrapeError> {
            self.requested_pages.lock().unwrap().push(page);
            if self.fail_listing_on == Some(page) {
                return Err(ScrapeError::Api("listing unavailable".into()));
            }
            Ok(self.pages.get(page as usize - 1).cloned().unwrap_or_default())
        }

        async fn resolve(&self, item: &ListingItem) -> Result<ResolvedDetail, ScrapeError> {
            self.resolved.lock().unwrap().push(item.id.clone());
            if self.broken_details.contains(&item.id) {
                return Err(ScrapeError::Api(format!("detail {} gone", item.id)));
            }
            Ok(ResolvedDetail {
                final_url: format!("https://dept.example/{}", item.id),
                extractor: "fake".into(),
                content: ExtractedContent {
                    title: String::new(),
                    html_content: format!("<p>body {}</p>", item.id),
                    plain_text: format!("body {}", item.id),
                    department: "提取部门".into(),
                    publish_time: String::new(),
                },
                degraded: false,
            })
        }

        fn absolute_url(&self, relative_url: &str) -> String {
            format!("https://info.tsinghua.edu.cn{}", relative_url)
        }
    }

    fn item(id: &str, ts: i64) -> ListingItem {
        ListingItem {
            id: id.into(),
            title: format!("Title {}", id),
            department: "教务处".into(),
            category: "通知".into(),
            publish_time_ms: Some(ts),
            relative_url: format!("/x?id={}", id),
        }
    }

    async fn pool() -> (TempDir, SqlitePool) {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("s.sqlite")).await.unwrap();
        migrate::apply(&pool).await.unwrap();
        (tmp, pool)
    }

    fn opts(mode: ScrapeMode) -> RunOptions {
        RunOptions {
            force: false,
            full: false,
            mode,
            max_pages: 10,
            page_size: 30,
            column_id: "all".into(),
            interval_ms: INTERVAL,
            min_interval_ms: MIN,
        }
    }

    fn completed(outcome: RunOutcome) -> RunReport {
        match outcome {
            RunOutcome::Completed(r) => r,
            RunOutcome::Skipped { .. } => panic!("run was skipped"),
        }
    }

    #[test]
    fn cutoff_from_cursor() {
        assert_eq!(compute_cutoff(None, INTERVAL), 0);
        assert_eq!(compute_cutoff(Some(CUTOFF + INTERVAL), INTERVAL), CUTOFF);
        assert_eq!(compute_cutoff(Some(10), INTERVAL), 0);
    }

    #[tokio::test]
    async fn halts_at_first_old_item_and_never_reads_later_pages() {
        let (_tmp, pool) = pool().await;
        let source = FakePortal {
            pages: vec![
                vec![item("p1a", CUTOFF + 500), item("p1b", CUTOFF + 400)],
                vec![item("p2a", CUTOFF + 300), item("p2b", CUTOFF - 1), item("p2c", CUTOFF + 200)],
                vec![item("p3a", CUTOFF + 9_999)],
            ],
            ..FakePortal::default()
        };
        let cycle = CycleOptions {
            max_pages: 10,
            page_size: 30,
            column_id: "all".into(),
            cutoff_ms: CUTOFF,
            mode: ScrapeMode::Listing,
        };
        let report = run_scrape_cycle(&pool, &source, &cycle, &NoProgress).await;
        assert_eq!(report.stop, StopReason::Cutoff);
        assert_eq!(report.stats.new, 3);
        assert_eq!(report.stats.processed, 3);
        assert_eq!(*source.requested_pages.lock().unwrap(), vec![1, 2]);
        assert!(!get::article_exists(&pool, "p2b").await.unwrap());
        assert!(!get::article_exists(&pool, "p2c").await.unwrap());
        assert!(!get::article_exists(&pool, "p3a").await.unwrap());
    }

    #[tokio::test]
    async fn listing_mode_stores_metadata_only() {
        let (_tmp, pool) = pool().await;
        let mut source = FakePortal {
            pages: vec![vec![item("a1", CUTOFF)]],
            ..FakePortal::default()
        };
        completed(run(&pool, &mut source, &opts(ScrapeMode::Listing), CUTOFF, &NoProgress).await.unwrap());
        let stored = get::get_article(&pool, "a1").await.unwrap().unwrap();
        assert_eq!(stored.content, "");
        assert_eq!(stored.url, "https://info.tsinghua.edu.cn/x?id=a1");
        assert!(source.resolved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn detail_mode_merges_and_uses_final_url() {
        let (_tmp, pool) = pool().await;
        let mut source = FakePortal {
            pages: vec![vec![item("a1", CUTOFF)]],
            ..FakePortal::default()
        };
        completed(run(&pool, &mut source, &opts(ScrapeMode::Detail), CUTOFF, &NoProgress).await.unwrap());
        let stored = get::get_article(&pool, "a1").await.unwrap().unwrap();
        assert_eq!(stored.title, "Title a1");
        assert_eq!(stored.department, "提取部门");
        assert_eq!(stored.category, "通知");
        assert_eq!(stored.content, "<p>body a1</p>");
        assert_eq!(stored.url, "https://dept.example/a1");
    }

    #[tokio::test]
    async fn per_item_failures_are_counted_and_skipped() {
        let (_tmp, pool) = pool().await;
        let mut missing_url = item("bad", CUTOFF + 2);
        missing_url.relative_url.clear();
        let mut source = FakePortal {
            pages: vec![vec![item("ok1", CUTOFF + 3), missing_url, item("gone", CUTOFF + 1), item("ok2", CUTOFF)]],
            broken_details: ["gone".to_string()].into_iter().collect(),
            ..FakePortal::default()
        };
        let report = completed(run(&pool, &mut source, &opts(ScrapeMode::Detail), CUTOFF, &NoProgress).await.unwrap());
        assert_eq!(report.stats.new, 2);
        assert_eq!(report.stats.errors, 2);
        assert_eq!(report.stats.processed, 4);
        assert_eq!(report.stop, StopReason::Exhausted);
        assert!(report.cursor_advanced);
    }

    #[tokio::test]
    async fn second_run_is_idempotent() {
        let (_tmp, pool) = pool().await;
        let mut o = opts(ScrapeMode::Listing);
        o.force = true;
        let mut source = FakePortal {
            pages: vec![vec![item("a1", CUTOFF), item("a2", CUTOFF)]],
            ..FakePortal::default()
        };
        let first = completed(run(&pool, &mut source, &o, CUTOFF, &NoProgress).await.unwrap());
        let second = completed(run(&pool, &mut source, &o, CUTOFF + 1, &NoProgress).await.unwrap());
        assert_eq!(first.stats.new, 2);
        assert_eq!(second.stats.new, 0);
        assert_eq!(second.stats.skipped, 2);
    }

    #[tokio::test]
    async fn guard_skips_recent_runs_without_touching_cursor() {
        let (_tmp, pool) = pool().await;
        ingest::set_last_scrape_time(&pool, CUTOFF).await.unwrap();
        let mut source = FakePortal::default();

        let outcome = run(&pool, &mut source, &opts(ScrapeMode::Listing), CUTOFF + MIN - 1, &NoProgress)
            .await
            .unwrap();
        match outcome {
            RunOutcome::Skipped { next_allowed_ms, .. } => assert_eq!(next_allowed_ms, CUTOFF + MIN),
            other => panic!("expected skip, got {:?}", other),
        }
        assert!(source.requested_pages.lock().unwrap().is_empty());
        assert_eq!(ingest::get_last_scrape_time(&pool).await.unwrap(), Some(CUTOFF));

        let mut forced = opts(ScrapeMode::Listing);
        forced.force = true;
        let report = completed(run(&pool, &mut source, &forced, CUTOFF + MIN - 1, &NoProgress).await.unwrap());
        assert_eq!(report.cutoff_ms, CUTOFF - INTERVAL);
        assert_eq!(report.cursor_ms, Some(CUTOFF + MIN - 1));
    }

    #[tokio::test]
    async fn abort_before_any_item_keeps_cursor() {
        let (_tmp, pool) = pool().await;
        ingest::set_last_scrape_time(&pool, 1_000).await.unwrap();
        let mut source = FakePortal {
            fail_listing_on: Some(1),
            ..FakePortal::default()
        };
        let report = completed(run(&pool, &mut source, &opts(ScrapeMode::Listing), CUTOFF, &NoProgress).await.unwrap());
        assert!(report.aborted());
        assert!(!report.cursor_advanced);
        assert_eq!(report.stats.errors, 1);
        assert_eq!(ingest::get_last_scrape_time(&pool).await.unwrap(), Some(1_000));
    }

    #[tokio::test]
    async fn partial_run_advances_cursor() {
        let (_tmp, pool) = pool().await;
        let mut source = FakePortal {
            pages: vec![vec![item("a1", CUTOFF)]],
            fail_listing_on: Some(2),
            ..FakePortal::default()
        };
        let report = completed(run(&pool, &mut source, &opts(ScrapeMode::Listing), CUTOFF, &NoProgress).await.unwrap());
        assert!(report.aborted());
        assert_eq!(report.stats.new, 1);
        assert!(report.cursor_advanced);
        assert_eq!(ingest::get_last_scrape_time(&pool).await.unwrap(), Some(CUTOFF));
    }

    #[tokio::test]
    async fn prepare_failure_aborts_cleanly() {
        let (_tmp, pool) = pool().await;
        let mut source = FakePortal {
            fail_prepare: true,
            ..FakePortal::default()
        };
        let report = completed(run(&pool, &mut source, &opts(ScrapeMode::Detail), CUTOFF, &NoProgress).await.unwrap());
        assert!(report.aborted());
        assert_eq!(report.stats.errors, 1);
        assert_eq!(ingest::get_last_scrape_time(&pool).await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_listing_still_advances_cursor() {
        let (_tmp, pool) = pool().await;
        let mut source = FakePortal::default();
        let report = completed(run(&pool, &mut source, &opts(ScrapeMode::Listing), CUTOFF, &NoProgress).await.unwrap());
        assert_eq!(report.stop, StopReason::Exhausted);
        assert!(report.cursor_advanced);
    }

    #[test]
    fn cli_overrides() {
        let args = ScrapeArgs {
            listing_only: true,
            max_pages: Some(0),
            page_size: Some(5),
            ..ScrapeArgs::default()
        };
        let o = args.apply(&ScrapeConfig::default());
        assert_eq!(o.mode, ScrapeMode::Listing);
        assert_eq!(o.max_pages, 1);
        assert_eq!(o.page_size, 5);
    }
}
