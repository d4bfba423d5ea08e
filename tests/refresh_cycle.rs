//! End-to-end refresh cycle: mock HTTP feeds through download, parse, and
//! reconciliation into SQLite.
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rookery::config::Config;
use rookery::feed::refresh::{refresh_all, refresh_feed};
use rookery::storage::Database;

const FEED_V1: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Corvid Weekly</title>
    <description>All about corvids</description>
    <item>
        <title>Magpies</title>
        <link>https://corvid.example/posts/magpies</link>
        <description>On magpies</description>
        <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
    </item>
    <item>
        <title>Ravens</title>
        <link>https://corvid.example/posts/ravens</link>
        <pubDate>Tue, 02 Jan 2024 00:00:00 GMT</pubDate>
    </item>
</channel></rss>"#;

const FEED_V2: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Corvid Weekly</title>
    <description>All about corvids</description>
    <item>
        <title>Magpies, Revised</title>
        <link>https://corvid.example/posts/magpies</link>
        <description>On magpies, corrected</description>
        <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
    </item>
    <item>
        <title>Ravens</title>
        <link>https://corvid.example/posts/ravens</link>
        <pubDate>Tue, 02 Jan 2024 00:00:00 GMT</pubDate>
    </item>
    <item>
        <title>Jackdaws</title>
        <link>https://corvid.example/posts/jackdaws</link>
        <pubDate>Wed, 03 Jan 2024 00:00:00 GMT</pubDate>
    </item>
</channel></rss>"#;

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

#[tokio::test]
async fn test_cycle_fills_feed_and_metadata() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED_V1))
        .mount(&mock_server)
        .await;

    let db = test_db().await;
    let feed = db
        .find_or_create_feed(&format!("{}/feed", mock_server.uri()))
        .await
        .unwrap();
    let client = reqwest::Client::new();
    let config = Config::default();

    let outcomes = refresh_all(&db, &client, &config).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].result.as_ref().unwrap().created, 2);

    let feed = db.feed_by_id(feed.id).await.unwrap().unwrap();
    assert_eq!(feed.title.as_deref(), Some("Corvid Weekly"));
    assert_eq!(feed.summary.as_deref(), Some("All about corvids"));
    assert!(feed.last_refreshed.is_some());

    let articles = db.recent_articles(feed.id, 10).await.unwrap();
    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].title.as_deref(), Some("Ravens"), "newest first");
}

#[tokio::test]
async fn test_second_cycle_updates_in_place() {
    let mock_server = MockServer::start().await;
    // First cycle sees v1, every cycle after that sees v2
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED_V1))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED_V2))
        .mount(&mock_server)
        .await;

    let db = test_db().await;
    let feed = db
        .find_or_create_feed(&format!("{}/feed", mock_server.uri()))
        .await
        .unwrap();
    let client = reqwest::Client::new();
    let config = Config::default();

    let first = refresh_feed(&db, &client, &config, &feed).await;
    assert_eq!(first.result.unwrap().created, 2);

    let second = refresh_feed(&db, &client, &config, &feed).await;
    let stats = second.result.unwrap();
    assert_eq!(stats.created, 1, "only the new item is created");
    assert_eq!(stats.updated, 2, "existing items update in place");

    let articles = db.recent_articles(feed.id, 10).await.unwrap();
    assert_eq!(articles.len(), 3, "no duplicates across cycles");

    let magpies = db
        .article_by_url("https://corvid.example/posts/magpies")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(magpies.title.as_deref(), Some("Magpies, Revised"));
    assert_eq!(
        magpies.published, 1704067200,
        "publish time survives the rewrite"
    );
}

#[tokio::test]
async fn test_cross_feed_url_migrates_to_latest_observer() {
    let shared = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Mirror</title>
    <item>
        <title>Magpies</title>
        <link>https://corvid.example/posts/magpies</link>
        <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
    </item>
</channel></rss>"#;

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/original"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED_V1))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mirror"))
        .respond_with(ResponseTemplate::new(200).set_body_string(shared))
        .mount(&mock_server)
        .await;

    let db = test_db().await;
    let original = db
        .find_or_create_feed(&format!("{}/original", mock_server.uri()))
        .await
        .unwrap();
    let mirror = db
        .find_or_create_feed(&format!("{}/mirror", mock_server.uri()))
        .await
        .unwrap();
    let client = reqwest::Client::new();
    let config = Config::default();

    refresh_feed(&db, &client, &config, &original).await;
    let outcome = refresh_feed(&db, &client, &config, &mirror).await;
    assert_eq!(outcome.result.unwrap().adopted, 1);

    let article = db
        .article_by_url("https://corvid.example/posts/magpies")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(article.feed_id, mirror.id, "last observing feed owns it");
}

#[tokio::test]
async fn test_unreachable_feed_never_blocks_the_cycle() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/good"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED_V1))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&mock_server)
        .await;

    let db = test_db().await;
    let good = db
        .find_or_create_feed(&format!("{}/good", mock_server.uri()))
        .await
        .unwrap();
    let gone = db
        .find_or_create_feed(&format!("{}/gone", mock_server.uri()))
        .await
        .unwrap();
    let client = reqwest::Client::new();
    let config = Config::default();

    let outcomes = refresh_all(&db, &client, &config).await.unwrap();
    assert_eq!(outcomes.len(), 2);

    let good_outcome = outcomes.iter().find(|o| o.feed_id == good.id).unwrap();
    assert!(good_outcome.result.is_ok());
    let gone_outcome = outcomes.iter().find(|o| o.feed_id == gone.id).unwrap();
    assert!(gone_outcome.result.is_err());

    assert_eq!(db.recent_articles(good.id, 10).await.unwrap().len(), 2);
    let gone = db.feed_by_id(gone.id).await.unwrap().unwrap();
    assert!(gone.last_refreshed.is_none());
}
