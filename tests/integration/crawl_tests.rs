//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use std::collections::HashSet;
use std::time::Duration;
use sumi_harvest::config::{load_config, HttpConfig};
use sumi_harvest::crawler::{FieldKind, SpiderBuilder, SpiderState};
use sumi_harvest::output::SqliteSink;
use sumi_harvest::HarvestError;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

fn item_links(range: std::ops::RangeInclusive<usize>) -> String {
    range
        .map(|i| format!(r#"<div class="item"><a href="/item/{i}">Item {i}</a></div>"#))
        .collect()
}

async fn mount_page(server: &MockServer, page: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Mounts `/list` linking to `count` item pages, each with a title and price
async fn mount_catalog(server: &MockServer, count: usize) {
    mount_page(
        server,
        "/list",
        &format!(r#"<h1 class="t">Catalog</h1>{}"#, item_links(1..=count)),
    )
    .await;

    for i in 1..=count {
        mount_page(
            server,
            &format!("/item/{}", i),
            &format!(
                r#"<h1 class="t">Item {i}</h1><span class="price">{i}.50</span><img class="photo" src="/img/{i}.png">"#
            ),
        )
        .await;
    }
}

async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.path().to_string())
        .collect()
}

fn catalog_spider(server: &MockServer) -> SpiderBuilder {
    SpiderBuilder::new(format!("{}/list", server.uri()))
        .follow(".item a")
        .field("title", ".t", FieldKind::Text)
}

#[tokio::test]
async fn test_limit_with_single_worker() {
    let server = MockServer::start().await;
    mount_catalog(&server, 5).await;

    let spider = catalog_spider(&server).limit(3).build().unwrap();
    let mut records = spider.subscribe();

    let stats = spider.run(1).await.unwrap();

    let paths = requested_paths(&server).await;
    assert_eq!(paths.len(), 3);
    let distinct: HashSet<&String> = paths.iter().collect();
    assert_eq!(distinct.len(), 3);
    assert_eq!(stats.pages_visited, 3);
    assert_eq!(spider.visited_count(), 3);

    let mut published = Vec::new();
    while let Some(record) = records.recv().await {
        published.push(record);
    }
    assert!(published.len() <= 3);
    assert_eq!(published.len() as u64, stats.records_published);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_limit_with_concurrent_workers() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/list",
        &format!(r#"<h1 class="t">Catalog</h1>{}"#, item_links(1..=20)),
    )
    .await;
    Mock::given(method("GET"))
        .respond_with(html(r#"<h1 class="t">Item</h1>"#).set_delay(Duration::from_millis(30)))
        .mount(&server)
        .await;

    let spider = catalog_spider(&server).limit(5).build().unwrap();
    let stats = spider.run(8).await.unwrap();

    let paths = requested_paths(&server).await;
    assert_eq!(paths.len(), 5);
    let distinct: HashSet<&String> = paths.iter().collect();
    assert_eq!(distinct.len(), 5);
    assert_eq!(stats.pages_visited, 5);
}

#[tokio::test]
async fn test_full_crawl_extracts_typed_fields() {
    let server = MockServer::start().await;
    mount_catalog(&server, 2).await;

    let spider = SpiderBuilder::new(format!("{}/list", server.uri()))
        .follow(".item a")
        .field("title", ".t", FieldKind::Text)
        .field("price", ".price", FieldKind::Number)
        .field("photo", ".photo", FieldKind::Image)
        .build()
        .unwrap();
    let mut records = spider.subscribe();

    let stats = spider.run(2).await.unwrap();

    assert_eq!(spider.state(), SpiderState::Completed);
    assert_eq!(stats.pages_visited, 3);
    // The listing has no price, so it yields no record
    assert_eq!(stats.extraction_failures, 1);
    assert_eq!(stats.records_published, 2);

    let mut items = Vec::new();
    while let Some(record) = records.recv().await {
        items.push(record);
    }
    items.sort_by(|a, b| a.url.cmp(&b.url));

    assert_eq!(items[0].url, format!("{}/item/1", server.uri()));
    assert_eq!(items[0].fields["title"], "Item 1");
    assert_eq!(items[0].fields["price"], 1.5);
    assert_eq!(
        items[0].fields["photo"],
        format!("{}/img/1.png", server.uri()).as_str()
    );
}

#[tokio::test]
async fn test_pagination_before_follow_links() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/list",
        &format!(r#"{}<a class="next" href="/list/2">Next</a>"#, item_links(1..=2)),
    )
    .await;
    mount_page(&server, "/list/2", &item_links(3..=3)).await;
    for i in 1..=3 {
        mount_page(&server, &format!("/item/{}", i), r#"<h1 class="t">Item</h1>"#).await;
    }

    let spider = SpiderBuilder::new(format!("{}/list", server.uri()))
        .paginate(".item a", "a.next")
        .build()
        .unwrap();

    spider.run(1).await.unwrap();

    assert_eq!(
        requested_paths(&server).await,
        vec!["/list", "/list/2", "/item/1", "/item/2", "/item/3"]
    );
}

#[tokio::test]
async fn test_blacklisted_links_never_fetched() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/list",
        r#"<a class="x" href="/admin/users">Admin</a><a class="x" href="/item/1">Item</a>"#,
    )
    .await;
    mount_page(&server, "/item/1", r#"<h1 class="t">Item</h1>"#).await;
    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .respond_with(html("secret"))
        .expect(0)
        .mount(&server)
        .await;

    let spider = SpiderBuilder::new(format!("{}/list", server.uri()))
        .follow("a.x")
        .ignore_urls([format!("{}/admin*", server.uri())])
        .build()
        .unwrap();

    let stats = spider.run(2).await.unwrap();

    assert_eq!(stats.links_blacklisted, 1);
    assert_eq!(requested_paths(&server).await.len(), 2);
}

#[tokio::test]
async fn test_error_status_is_dropped_and_crawl_continues() {
    let server = MockServer::start().await;
    mount_page(&server, "/list", &item_links(1..=2)).await;
    Mock::given(method("GET"))
        .and(path("/item/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_page(&server, "/item/2", r#"<h1 class="t">Item 2</h1>"#).await;

    let spider = catalog_spider(&server).build().unwrap();
    let stats = spider.run(1).await.unwrap();

    assert_eq!(stats.pages_visited, 3);
    assert_eq!(stats.fetch_failures, 1);
    assert_eq!(stats.records_published, 1);
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/list", r#"<h1 class="t">Catalog</h1>"#).await;

    let spider = catalog_spider(&server)
        .http(HttpConfig {
            retries: 2,
            retry_delay_ms: 10,
            ..HttpConfig::default()
        })
        .build()
        .unwrap();
    let stats = spider.run(1).await.unwrap();

    assert_eq!(stats.fetch_failures, 0);
    assert_eq!(stats.records_published, 1);
    assert_eq!(requested_paths(&server).await.len(), 2);
}

#[tokio::test]
async fn test_cookies_sent_with_every_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(header("cookie", "session=abc; lang=en"))
        .respond_with(html(&item_links(1..=1)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/item/1"))
        .and(header("cookie", "session=abc; lang=en"))
        .respond_with(html(r#"<h1 class="t">Item</h1>"#))
        .expect(1)
        .mount(&server)
        .await;

    let spider = catalog_spider(&server)
        .with_cookie("session", "abc")
        .with_cookie("lang", "en")
        .build()
        .unwrap();
    let stats = spider.run(1).await.unwrap();

    assert_eq!(stats.fetch_failures, 0);
    server.verify().await;
}

#[tokio::test]
async fn test_stop_is_idempotent_during_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(&item_links(1..=20)).set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;

    let spider = catalog_spider(&server).build().unwrap();
    let running = {
        let spider = spider.clone();
        tokio::spawn(async move { spider.run(2).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(matches!(
        spider.run(1).await,
        Err(HarvestError::InvalidState {
            state: SpiderState::Running
        })
    ));

    tokio::time::timeout(Duration::from_secs(5), async {
        spider.stop().await;
        spider.stop().await;
    })
    .await
    .unwrap();

    let stats = running.await.unwrap().unwrap();
    assert_eq!(spider.state(), SpiderState::Stopped);
    assert!(stats.pages_visited < 21);
}

#[tokio::test]
async fn test_records_written_to_file_sinks() {
    let server = MockServer::start().await;
    mount_catalog(&server, 3).await;
    let dir = TempDir::new().unwrap();
    let json_path = dir.path().join("records.jsonl");
    let db_path = dir.path().join("records.db");

    let spider = catalog_spider(&server)
        .write_to_json_file(&json_path)
        .write_to_database(&db_path)
        .build()
        .unwrap();
    let stats = spider.run(2).await.unwrap();
    assert_eq!(stats.records_published, 4);
    assert_eq!(stats.sink_failures, 0);

    let content = std::fs::read_to_string(&json_path).unwrap();
    let urls: HashSet<String> = content
        .lines()
        .map(|line| {
            let record: serde_json::Value = serde_json::from_str(line).unwrap();
            record["url"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(urls.len(), 4);
    assert!(urls.contains(&format!("{}/item/3", server.uri())));

    let database = SqliteSink::open(&db_path).unwrap();
    assert_eq!(database.count_records().unwrap(), 4);
}

#[tokio::test]
async fn test_crawl_from_config_file() {
    let server = MockServer::start().await;
    mount_catalog(&server, 2).await;
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("harvest.toml");
    let json_path = dir.path().join("out.jsonl");

    std::fs::write(
        &config_path,
        format!(
            r#"
            [crawl]
            start-url = "{}/list"
            workers = 2

            [[follow]]
            selector = ".item a"

            [[field]]
            name = "title"
            selector = ".t"

            [output]
            json-path = "{}"
            "#,
            server.uri(),
            json_path.display()
        ),
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    let spider = SpiderBuilder::from_config(&config).build().unwrap();
    let stats = spider.run(spider.config().workers()).await.unwrap();

    assert_eq!(stats.records_published, 3);
    let content = std::fs::read_to_string(&json_path).unwrap();
    assert_eq!(content.lines().count(), 3);
}
