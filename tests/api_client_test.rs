//! HTTP behaviour of the API client against a mock backend.

use feedtui::controllers::login;
use feedtui::models::{ApiClient, Config, Session, SessionStore};
use feedtui::FeedError;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, token: Option<&str>) -> ApiClient {
    ApiClient::with_base(&server.uri(), token).expect("Failed to build client")
}

#[tokio::test]
async fn test_bearer_token_is_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", "Bearer tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3, "name": "Ana", "role": "admin", "avatarUrl": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let me = client_for(&server, Some("tok123")).me().await.expect("me failed");
    assert_eq!(me.id, 3);
    assert!(me.is_admin());
}

#[tokio::test]
async fn test_error_payload_becomes_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/posts/9/toggle-pin"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "error": "Admin access required" })))
        .mount(&server)
        .await;

    let err = client_for(&server, Some("t")).toggle_pin(9).await.unwrap_err();
    assert_eq!(err, FeedError::api(403, "Admin access required"));
    assert!(err.is_rejection());
    assert!(!err.is_auth());
}

#[tokio::test]
async fn test_missing_token_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "msg": "Missing Authorization Header" })))
        .mount(&server)
        .await;

    let err = client_for(&server, None).posts().await.unwrap_err();
    assert!(err.is_auth());
    assert!(err.user_message().contains("Missing Authorization Header"));
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let client = ApiClient::with_base("http://127.0.0.1:1", None).unwrap();
    let err = client.polls().await.unwrap_err();
    assert!(matches!(err, FeedError::Network(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_login_persists_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_json(json!({ "login_id": "ana", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "fresh",
            "user": { "id": 1, "name": "Ana" }
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = SessionStore::new(dir.path().join("session.json"));
    let mut client = client_for(&server, None);

    let session = login::login(&mut client, &store, "ana", "pw").await.expect("login failed");
    assert_eq!(session.bearer(), Some("fresh"));
    assert!(client.has_token());
    assert_eq!(store.load().unwrap(), session);

    let cleared = login::logout(&mut client, &store).unwrap();
    assert!(!cleared.is_authenticated());
    assert!(!client.has_token());
    assert!(!store.load().unwrap().is_authenticated());
}

#[tokio::test]
async fn test_replies_are_unwrapped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts/5/replies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "replies": [
                { "id": 1, "content": "first", "likeCount": 2, "user": { "id": 4, "name": "Bo" } },
                { "id": 2, "content": "second", "gifUrl": "https://g.example/x.gif" }
            ],
            "total_replies": 2
        })))
        .mount(&server)
        .await;

    let replies = client_for(&server, Some("t")).replies(5).await.unwrap();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].like_count, 2);
    assert_eq!(replies[1].gif_url.as_deref(), Some("https://g.example/x.gif"));
}

#[tokio::test]
async fn test_non_array_notifications_are_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "notifications": null })))
        .mount(&server)
        .await;

    let items = client_for(&server, Some("t")).notifications().await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_login_is_prefixed_but_feed_is_at_root() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "fresh",
            "user": { "id": 1, "name": "Ana" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1, "content": "hi" }])))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config { api_url: server.uri(), ..Config::default() };
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = SessionStore::new(dir.path().join("session.json"));
    let mut client = ApiClient::new(&config, &Session::default()).unwrap();

    login::login(&mut client, &store, "ana", "pw").await.expect("login failed");
    let posts = client.posts().await.expect("posts failed");
    assert_eq!(posts.len(), 1);
}
