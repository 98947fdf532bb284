//! End-to-end tests against an in-process fake portal.

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use info_harvest::config::Config;
use info_harvest::models::ListingItem;
use info_harvest::portal::PortalClient;
use info_harvest::progress::NoProgress;
use info_harvest::scrape::{self, RunOptions, RunOutcome, StopReason};
use info_harvest::session::Session;
use info_harvest::traits::ArticleSource;
use info_harvest::{db, get as store, ingest, migrate};

const TOKEN: &str = "3f2a9c1e-77b0-4d1a-9e55-0c2b7d9f1a10";
const PUBLISHED: i64 = 1_700_000_000_000;

#[derive(Default)]
struct Recorded {
    listing_queries: Vec<HashMap<String, String>>,
    listing_origins: Vec<String>,
    detail_queries: Vec<HashMap<String, String>>,
}

type Shared = Arc<Mutex<Recorded>>;

async fn listing_page() -> impl IntoResponse {
    Html(format!(
        r#"<html><head><meta name="_csrf" content="{}"/></head><body>portal</body></html>"#,
        TOKEN
    ))
}

async fn cookie_only_page() -> Response {
    (
        [(header::SET_COOKIE, "XSRF-TOKEN=cookie-token-1; Path=/")],
        Html("<html><body>no token in markup</body></html>"),
    )
        .into_response()
}

async fn listing_api(
    State(rec): State<Shared>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let page = q.get("currentPage").cloned().unwrap_or_default();
    let csrf_ok = q.get("_csrf").map(String::as_str) == Some(TOKEN);
    {
        let mut rec = rec.lock().unwrap();
        rec.listing_queries.push(q);
        rec.listing_origins.push(origin);
    }
    if !csrf_ok {
        return Json(serde_json::json!({"result": "error", "msg": "csrf"})).into_response();
    }

    let items = match page.as_str() {
        "1" => serde_json::json!([
            {
                "xxid": "a1", "bt": "Listing title a1", "dwmc": "教务处", "lmmc": "通知",
                "fbsj": PUBLISHED + 2, "url": "/f/info/xxfb_fg/xnzx/template/detail?xxid=a1"
            },
            {
                "xxid": "a2", "bt": "Listing title a2", "dwmc": "后勤", "lmmc": "公告",
                "fbsj": PUBLISHED + 1, "url": "/go/a2"
            }
        ]),
        _ => serde_json::json!([]),
    };
    Json(serde_json::json!({"result": "success", "object": {"dataList": items}})).into_response()
}

async fn static_detail() -> impl IntoResponse {
    Html(
        r#"<html><body><h2 class="title">Static title</h2>
        <div class="jianjie">static body</div></body></html>"#,
    )
}

async fn detail_api(State(rec): State<Shared>, Query(q): Query<HashMap<String, String>>) -> Response {
    let xxid = q.get("xxid").cloned().unwrap_or_default();
    let csrf_ok = q.get("_csrf").map(String::as_str) == Some(TOKEN);
    rec.lock().unwrap().detail_queries.push(q);
    if !csrf_ok {
        return StatusCode::FORBIDDEN.into_response();
    }
    Json(serde_json::json!({
        "result": "success",
        "object": {"xxDto": {
            "bt": format!("JSON title {}", xxid),
            "nr": "&lt;p&gt;正文 &amp; 附件&lt;/p&gt;",
            "dw": "教务处",
            "fbsj": PUBLISHED
        }}
    }))
    .into_response()
}

async fn redirect_out(AxumPath(id): AxumPath<String>) -> Redirect {
    Redirect::temporary(&format!("/dept/{}", id))
}

async fn department_page(AxumPath(id): AxumPath<String>) -> impl IntoResponse {
    let body = "后勤服务中心通知正文内容。".repeat(12);
    Html(format!(
        r#"<html><body><nav>menu</nav><h1>Department notice {} with a long title</h1>
        <div class="content"><p>{}</p></div></body></html>"#,
        id, body
    ))
}

async fn spawn_portal() -> (SocketAddr, Shared) {
    let rec: Shared = Arc::new(Mutex::new(Recorded::default()));
    let app = Router::new()
        .route("/f/info/xxfb_fg/xnzx/template/more", get(listing_page))
        .route("/cookie-only", get(cookie_only_page))
        .route("/b/info/xxfb_fg/xnzx/template/more", post(listing_api))
        .route("/f/info/xxfb_fg/xnzx/template/detail", get(static_detail))
        .route("/b/info/xxfb_fg/xnzx/template/detail", post(detail_api))
        .route("/go/{id}", get(redirect_out))
        .route("/dept/{id}", get(department_page))
        .with_state(rec.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, rec)
}

fn config_for(addr: SocketAddr, tmp: &TempDir) -> Config {
    let mut config = Config::minimal();
    config.db.path = tmp.path().join("portal.sqlite");
    config.portal.base_url = format!("http://{}", addr);
    config.portal.requests_per_second = 100.0;
    config.portal.timeout_secs = 5;
    config
}

#[tokio::test]
async fn csrf_token_from_meta_tag() {
    let (addr, _) = spawn_portal().await;
    let tmp = TempDir::new().unwrap();
    let config = config_for(addr, &tmp);

    let mut session = Session::new(&config.portal).unwrap();
    assert_eq!(session.csrf_token(), None);
    session.acquire_csrf_token().await.unwrap();
    assert_eq!(session.csrf_token(), Some(TOKEN));
}

#[tokio::test]
async fn csrf_token_from_cookie() {
    let (addr, _) = spawn_portal().await;
    let tmp = TempDir::new().unwrap();
    let mut config = config_for(addr, &tmp);
    config.portal.listing_page_path = "/cookie-only".into();

    let mut session = Session::new(&config.portal).unwrap();
    session.acquire_csrf_token().await.unwrap();
    assert_eq!(session.csrf_token(), Some("cookie-token-1"));
}

#[tokio::test]
async fn listing_request_carries_portal_form() {
    let (addr, rec) = spawn_portal().await;
    let tmp = TempDir::new().unwrap();
    let config = config_for(addr, &tmp);

    let mut client = PortalClient::new(&config).unwrap();
    client.prepare().await.unwrap();
    let items = client.list_page("all", 1, 30).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "a1");

    let rec = rec.lock().unwrap();
    let q = &rec.listing_queries[0];
    assert_eq!(q["oType"], "xs");
    assert_eq!(q["lmid"], "all");
    assert_eq!(q["lydw"], "");
    assert_eq!(q["currentPage"], "1");
    assert_eq!(q["length"], "30");
    assert_eq!(q["xxflid"], "");
    assert_eq!(q["_csrf"], TOKEN);
    assert_eq!(rec.listing_origins[0], format!("http://{}", addr));
}

#[tokio::test]
async fn listing_without_token_is_an_api_error() {
    let (addr, _) = spawn_portal().await;
    let tmp = TempDir::new().unwrap();
    let config = config_for(addr, &tmp);

    let client = PortalClient::new(&config).unwrap();
    let err = client.list_page("all", 1, 30).await.unwrap_err();
    assert!(err.is_transport());
    assert!(err.to_string().contains("csrf"));
}

#[tokio::test]
async fn redirected_detail_records_final_url() {
    let (addr, _) = spawn_portal().await;
    let tmp = TempDir::new().unwrap();
    let config = config_for(addr, &tmp);

    let client = PortalClient::new(&config).unwrap();
    let resolved = client.resolve_url(&format!("http://{}/go/77", addr)).await.unwrap();
    assert_eq!(resolved.final_url, format!("http://{}/dept/77", addr));
    assert_eq!(resolved.extractor, "fallback");
    assert_eq!(resolved.content.title, "Department notice 77 with a long title");
    assert!(!resolved.content.plain_text.contains("menu"));
}

#[tokio::test]
async fn internal_detail_uses_json_endpoint_with_token() {
    let (addr, rec) = spawn_portal().await;
    let tmp = TempDir::new().unwrap();
    let config = config_for(addr, &tmp);

    let mut client = PortalClient::new(&config).unwrap();
    client.prepare().await.unwrap();
    let item = ListingItem {
        id: "a1".into(),
        relative_url: "/f/info/xxfb_fg/xnzx/template/detail?xxid=a1".into(),
        ..ListingItem::default()
    };
    let resolved = client.resolve(&item).await.unwrap();
    assert_eq!(resolved.extractor, "internal");
    assert!(!resolved.degraded);
    assert_eq!(resolved.content.title, "JSON title a1");
    assert_eq!(resolved.content.html_content, "<p>正文 & 附件</p>");

    let rec = rec.lock().unwrap();
    assert_eq!(rec.detail_queries[0]["xxid"], "a1");
    assert_eq!(rec.detail_queries[0]["preview"], "");
}

#[tokio::test]
async fn internal_detail_without_token_parses_static_page() {
    let (addr, rec) = spawn_portal().await;
    let tmp = TempDir::new().unwrap();
    let config = config_for(addr, &tmp);

    let client = PortalClient::new(&config).unwrap();
    let resolved = client
        .resolve_url(&format!(
            "http://{}/f/info/xxfb_fg/xnzx/template/detail?xxid=a1",
            addr
        ))
        .await
        .unwrap();
    assert_eq!(resolved.extractor, "internal");
    assert_eq!(resolved.content.title, "Static title");
    assert!(rec.lock().unwrap().detail_queries.is_empty());
}

#[tokio::test]
async fn full_run_stores_merged_articles_and_advances_cursor() {
    let (addr, _) = spawn_portal().await;
    let tmp = TempDir::new().unwrap();
    let config = config_for(addr, &tmp);

    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();

    let opts = RunOptions::from_config(&config.scrape);
    let now = PUBLISHED + 10_000;

    let mut client = PortalClient::new(&config).unwrap();
    let outcome = scrape::run(&pool, &mut client, &opts, now, &NoProgress).await.unwrap();
    let report = match outcome {
        RunOutcome::Completed(r) => r,
        other => panic!("unexpected outcome: {:?}", other),
    };
    assert_eq!(report.stop, StopReason::Exhausted);
    assert_eq!(report.stats.new, 2);
    assert_eq!(report.stats.errors, 0);
    assert!(report.cursor_advanced);
    assert_eq!(ingest::get_last_scrape_time(&pool).await.unwrap(), Some(now));

    let a1 = store::get_article(&pool, "a1").await.unwrap().unwrap();
    assert_eq!(a1.title, "JSON title a1");
    assert_eq!(a1.category, "通知");
    assert_eq!(a1.publish_time_ms, PUBLISHED + 2);
    assert!(a1.content.contains("正文 & 附件"));

    let a2 = store::get_article(&pool, "a2").await.unwrap().unwrap();
    assert_eq!(a2.url, format!("http://{}/dept/a2", addr));
    assert_eq!(a2.department, "后勤");
    assert!(a2.content.contains("后勤服务中心通知正文内容"));

    // An immediate rerun is held back by the guard.
    let mut client = PortalClient::new(&config).unwrap();
    let outcome = scrape::run(&pool, &mut client, &opts, now + 1, &NoProgress).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Skipped { .. }));

    // Forced rerun sees identical content.
    let mut forced = opts.clone();
    forced.force = true;
    let mut client = PortalClient::new(&config).unwrap();
    let outcome = scrape::run(&pool, &mut client, &forced, now + 2, &NoProgress).await.unwrap();
    match outcome {
        RunOutcome::Completed(r) => {
            assert_eq!(r.stats.skipped, 2);
            assert_eq!(r.stats.new, 0);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}
