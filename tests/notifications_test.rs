use feedtui::controllers::notifications::NotificationList;
use feedtui::controllers::router::{Highlight, Route};
use feedtui::models::ApiClient;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::with_base(&server.uri(), Some("tok")).expect("Failed to build client")
}

async fn loaded_list(server: &MockServer) -> NotificationList {
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "actor": { "name": "Ana" }, "action_type": "tagged", "post_id": 42,
              "is_read": false, "created_at": "2024-05-01T08:00:00" },
            { "id": 2, "actor": null, "message": "Maintenance tonight", "action_type": "system",
              "is_read": true },
            { "id": 3, "actor": { "name": "Bo" }, "action_type": "new_poll", "pollId": 9, "isRead": false }
        ])))
        .mount(server)
        .await;

    let mut list = NotificationList::new();
    list.load(&client_for(server)).await.expect("load failed");
    list
}

#[tokio::test]
async fn test_click_marks_read_then_navigates() {
    let server = MockServer::start().await;
    let mut list = loaded_list(&server).await;
    assert_eq!(list.unread(), 2);
    Mock::given(method("POST"))
        .and(path("/notifications/1/read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = list.click(&client_for(&server), 1).await.expect("unknown notification");
    assert_eq!(outcome.mark_read_error, None);
    assert_eq!(outcome.path.as_deref(), Some("/posts/42"));
    assert_eq!(
        Route::parse("/posts/42"),
        Route::Home { highlight: Some(Highlight::Post(42)) }
    );
    assert!(list.get(1).unwrap().is_read);
    assert_eq!(list.unread(), 1);
}

#[tokio::test]
async fn test_failed_mark_read_still_navigates() {
    let server = MockServer::start().await;
    let mut list = loaded_list(&server).await;
    Mock::given(method("POST"))
        .and(path("/notifications/3/read"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "db down" })))
        .mount(&server)
        .await;

    let outcome = list.click(&client_for(&server), 3).await.expect("unknown notification");
    assert_eq!(outcome.path.as_deref(), Some("/polls/9"));
    assert!(outcome.mark_read_error.is_some());
    assert!(!list.get(3).unwrap().is_read);
}

#[tokio::test]
async fn test_system_notification_has_no_target() {
    let server = MockServer::start().await;
    let mut list = loaded_list(&server).await;
    Mock::given(method("POST"))
        .and(path("/notifications/2/read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let system = list.get(2).unwrap();
    assert_eq!(system.actor_name, "System");
    assert_eq!(system.action_text(), "did something");

    let outcome = list.click(&client_for(&server), 2).await.unwrap();
    assert_eq!(outcome.path, None);
    assert!(list.click(&client_for(&server), 99).await.is_none());
}

#[tokio::test]
async fn test_clear_all_empties_the_list() {
    let server = MockServer::start().await;
    let mut list = loaded_list(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/notifications/clear"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "cleared" })))
        .expect(1)
        .mount(&server)
        .await;

    list.clear_all(&client_for(&server)).await.expect("clear failed");
    assert!(list.items.is_empty());
    assert_eq!(list.unread(), 0);
}
