use std::time::Duration;

use dropskeet_cli::{BookmarkSource, RaindropClient, RaindropError, TagRemoval};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> RaindropClient {
    let api = Url::parse(&format!("{}/rest/v1", server.uri())).unwrap();
    RaindropClient::new(api, "secret-token", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_latest_tagged_returns_first_item() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/raindrops/0"))
        .and(header("authorization", "Bearer secret-token"))
        .and(query_param("search", r#"[{"key":"tag","val":"toskeet"}]"#))
        .and(query_param("sort", "-created"))
        .and(query_param("perpage", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": true,
            "items": [{
                "_id": 123,
                "title": "Interesting article",
                "link": "https://example.com/article",
                "note": "[skeet_content: read this]",
                "cover": "https://example.com/cover.jpg",
                "excerpt": "An excerpt",
                "tags": ["toskeet", "rust"],
                "type": "link",
            }],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = client(&server)
        .latest_tagged("toskeet")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.id, 123);
    assert_eq!(record.title, "Interesting article");
    assert_eq!(record.cover_url(), Some("https://example.com/cover.jpg"));
    assert!(record.has_tag("rust"));
}

#[tokio::test]
async fn test_latest_tagged_nothing_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/raindrops/0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true, "items": [] })))
        .mount(&server)
        .await;

    assert!(client(&server).latest_tagged("toskeet").await.unwrap().is_none());
}

#[tokio::test]
async fn test_latest_tagged_item_without_id_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/raindrops/0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "title": "no id", "link": "https://e.co" }],
        })))
        .mount(&server)
        .await;

    assert!(client(&server).latest_tagged("toskeet").await.unwrap().is_none());
}

#[tokio::test]
async fn test_latest_tagged_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let err = client(&server).latest_tagged("toskeet").await.unwrap_err();
    match err {
        RaindropError::Status { status, body, .. } => {
            assert_eq!(status, 401);
            assert_eq!(body, "unauthorized");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_clear_tag_keeps_other_tags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/raindrop/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "item": { "_id": 42, "tags": ["rust", "toskeet", "later"] },
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/rest/v1/raindrop/42"))
        .and(body_json(json!({ "tags": ["rust", "later"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": true,
            "item": { "_id": 42, "tags": ["rust", "later"] },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let removal = client(&server).clear_tag(42, "toskeet").await.unwrap();
    assert_eq!(removal, TagRemoval::Removed);
}

#[tokio::test]
async fn test_clear_tag_twice_is_idempotent() {
    let server = MockServer::start().await;
    // first read still sees the tag, later reads do not
    Mock::given(method("GET"))
        .and(path("/rest/v1/raindrop/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "item": { "tags": ["toskeet"] },
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/raindrop/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "item": { "tags": [] },
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/rest/v1/raindrop/42"))
        .and(body_json(json!({ "tags": [] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(
        client.clear_tag(42, "toskeet").await.unwrap(),
        TagRemoval::Removed
    );
    assert_eq!(
        client.clear_tag(42, "toskeet").await.unwrap(),
        TagRemoval::AlreadyAbsent
    );
}

#[tokio::test]
async fn test_clear_tag_rejected_update() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/raindrop/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "item": { "tags": ["toskeet"] },
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/rest/v1/raindrop/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": false })))
        .mount(&server)
        .await;

    let err = client(&server).clear_tag(7, "toskeet").await.unwrap_err();
    assert!(matches!(err, RaindropError::UpdateRejected { id: 7, .. }));
}
