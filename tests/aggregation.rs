//! End-to-end tests for the aggregation loop: a mock HTTP server serves
//! RSS documents and each test runs against its own in-memory database.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use feedrake::agg::{AggError, Aggregator};
use feedrake::feed::FetchError;
use feedrake::storage::Database;

const MIXED_DATES_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Mixed</title>
  <link>https://example.com</link>
  <description>dates in all shapes</description>
  <item>
    <title>Dated</title>
    <link>https://example.com/dated</link>
    <description>has a date</description>
    <pubDate>Mon, 02 Jan 2006 15:04:05 +0000</pubDate>
  </item>
  <item>
    <title>Undated</title>
    <link>https://example.com/undated</link>
    <description>no date</description>
    <pubDate></pubDate>
  </item>
</channel></rss>"#;

const BAD_DATE_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Broken</title>
  <item>
    <title>Bad date</title>
    <link>https://example.com/bad</link>
    <pubDate>02 January 2006 15:04:05 +0000</pubDate>
  </item>
</channel></rss>"#;

const EMPTY_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Empty</title></channel></rss>"#;

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

/// One user owning and following one feed at `url`.
async fn seed_feed(db: &Database, url: &str) -> (i64, i64) {
    let user = db.create_user("tester").await.unwrap();
    let feed = db.create_feed("Test Feed", url, user.id).await.unwrap();
    db.create_follow(user.id, feed.id).await.unwrap();
    (user.id, feed.id)
}

async fn mock_feed_server(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("Content-Type", "application/rss+xml"),
        )
        .mount(&server)
        .await;
    server
}

fn aggregator(db: &Database, interval: Duration) -> Aggregator {
    Aggregator::new(db.clone(), reqwest::Client::new(), interval)
}

// ============================================================================
// Claim ordering
// ============================================================================

#[tokio::test]
async fn claim_prefers_never_fetched_then_oldest() {
    let db = test_db().await;
    let user = db.create_user("u").await.unwrap();
    let a = db
        .create_feed("A", "https://a.example/feed", user.id)
        .await
        .unwrap();
    let b = db
        .create_feed("B", "https://b.example/feed", user.id)
        .await
        .unwrap();
    let c = db
        .create_feed("C", "https://c.example/feed", user.id)
        .await
        .unwrap();

    assert_eq!(db.claim_next_feed(100).await.unwrap().unwrap().id, a.id);
    // B and C have never been fetched; they outrank A's non-null stamp
    assert_eq!(db.claim_next_feed(200).await.unwrap().unwrap().id, b.id);
    assert_eq!(db.claim_next_feed(300).await.unwrap().unwrap().id, c.id);
    // Everything stamped now; the oldest stamp wins again
    assert_eq!(db.claim_next_feed(400).await.unwrap().unwrap().id, a.id);
    assert_eq!(db.claim_next_feed(500).await.unwrap().unwrap().id, b.id);
}

#[tokio::test]
async fn claim_stamps_last_fetched_at() {
    let db = test_db().await;
    let user = db.create_user("u").await.unwrap();
    db.create_feed("A", "https://a.example/feed", user.id)
        .await
        .unwrap();

    let claimed = db.claim_next_feed(12345).await.unwrap().unwrap();
    assert_eq!(claimed.last_fetched_at, Some(12345));
}

#[tokio::test]
async fn claim_on_empty_store_returns_none() {
    let db = test_db().await;
    assert!(db.claim_next_feed(100).await.unwrap().is_none());
}

// ============================================================================
// Single cycle behavior
// ============================================================================

#[tokio::test]
async fn cycle_stores_posts_with_ingestion_time_fallback() {
    let server = mock_feed_server(MIXED_DATES_RSS).await;
    let db = test_db().await;
    let (_, feed_id) = seed_feed(&db, &format!("{}/feed", server.uri())).await;

    let before = chrono::Utc::now().timestamp();
    aggregator(&db, Duration::from_secs(60))
        .run_once(&CancellationToken::new())
        .await
        .unwrap();
    let after = chrono::Utc::now().timestamp();

    let posts = db.posts_for_feed(feed_id).await.unwrap();
    assert_eq!(posts.len(), 2);

    let dated = posts.iter().find(|p| p.title == "Dated").unwrap();
    // Mon, 02 Jan 2006 15:04:05 +0000
    assert_eq!(dated.published_at, 1_136_214_245);
    assert_eq!(dated.description.as_deref(), Some("has a date"));

    // Empty pubDate falls back to the ingestion wall clock
    let undated = posts.iter().find(|p| p.title == "Undated").unwrap();
    assert!(undated.published_at >= before && undated.published_at <= after);
}

#[tokio::test]
async fn reingesting_the_same_document_inserts_nothing() {
    let server = mock_feed_server(MIXED_DATES_RSS).await;
    let db = test_db().await;
    let (_, feed_id) = seed_feed(&db, &format!("{}/feed", server.uri())).await;

    let agg = aggregator(&db, Duration::from_secs(60));
    let cancel = CancellationToken::new();
    agg.run_once(&cancel).await.unwrap();
    let first_run: Vec<_> = db
        .posts_for_feed(feed_id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| (p.id, p.url))
        .collect();

    // Second cycle re-claims the same feed and sees the same items;
    // every duplicate link is swallowed, not errored
    agg.run_once(&cancel).await.unwrap();
    let second_run: Vec<_> = db
        .posts_for_feed(feed_id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| (p.id, p.url))
        .collect();

    assert_eq!(first_run, second_run);
}

#[tokio::test]
async fn malformed_pub_date_aborts_the_cycle() {
    let server = mock_feed_server(BAD_DATE_RSS).await;
    let db = test_db().await;
    seed_feed(&db, &format!("{}/feed", server.uri())).await;

    let result = aggregator(&db, Duration::from_secs(60))
        .run_once(&CancellationToken::new())
        .await;

    assert!(matches!(result, Err(AggError::PubDate { .. })));
}

#[tokio::test]
async fn unparseable_body_aborts_the_cycle() {
    let server = mock_feed_server("<html>definitely not rss</html>").await;
    let db = test_db().await;
    let (_, feed_id) = seed_feed(&db, &format!("{}/feed", server.uri())).await;

    let result = aggregator(&db, Duration::from_secs(60))
        .run_once(&CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(AggError::Fetch {
            source: FetchError::Parse(_),
            ..
        })
    ));
    assert!(db.posts_for_feed(feed_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_store_fails_the_cycle() {
    let db = test_db().await;
    let result = aggregator(&db, Duration::from_secs(60))
        .run_once(&CancellationToken::new())
        .await;
    assert!(matches!(result, Err(AggError::NoFeeds)));
}

#[tokio::test]
async fn empty_channel_completes_with_no_posts() {
    let server = mock_feed_server(EMPTY_RSS).await;
    let db = test_db().await;
    let (_, feed_id) = seed_feed(&db, &format!("{}/feed", server.uri())).await;

    aggregator(&db, Duration::from_secs(60))
        .run_once(&CancellationToken::new())
        .await
        .unwrap();

    assert!(db.posts_for_feed(feed_id).await.unwrap().is_empty());
}

// ============================================================================
// The loop itself
// ============================================================================

#[tokio::test]
async fn interval_drives_repeated_fetches() {
    let server = mock_feed_server(EMPTY_RSS).await;
    let db = test_db().await;
    seed_feed(&db, &format!("{}/feed", server.uri())).await;

    let agg = aggregator(&db, Duration::from_millis(10));
    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { agg.run(cancel).await })
    };

    // Immediate first cycle plus at least two ticks
    tokio::time::sleep(Duration::from_millis(45)).await;
    cancel.cancel();

    match handle.await.unwrap() {
        Ok(()) => {}
        // The token may land while a fetch is in flight
        Err(AggError::Fetch {
            source: FetchError::Cancelled,
            ..
        }) => {}
        Err(e) => panic!("unexpected loop error: {e}"),
    }

    let requests = server.received_requests().await.unwrap();
    assert!(
        requests.len() >= 3,
        "expected at least 3 fetches, saw {}",
        requests.len()
    );
}

#[tokio::test]
async fn failing_fetch_stops_the_loop() {
    // Nothing mounted: wiremock answers 404 with an empty body, which
    // fails RSS parsing and must terminate the loop rather than tick on
    let server = MockServer::start().await;
    let db = test_db().await;
    seed_feed(&db, &format!("{}/feed", server.uri())).await;

    let agg = aggregator(&db, Duration::from_millis(10));
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        agg.run(CancellationToken::new()),
    )
    .await
    .expect("loop should stop on the first failed cycle");

    assert!(matches!(result, Err(AggError::Fetch { .. })));
}
