use feedtui::controllers::replies::ReplyThread;
use feedtui::models::ApiClient;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::with_base(&server.uri(), Some("tok")).expect("Failed to build client")
}

async fn loaded_thread(server: &MockServer) -> ReplyThread {
    Mock::given(method("GET"))
        .and(path("/posts/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 5, "content": "root", "replyCount": 2, "user": { "id": 1, "name": "Ana" }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts/5/replies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "replies": [
                { "id": 20, "content": "mine", "likeCount": 0, "user": { "id": 7, "name": "Me" } },
                { "id": 21, "content": "theirs", "likeCount": 4, "user": { "id": 1, "name": "Ana" } }
            ],
            "totalReplies": 2
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 7, "name": "Me" })))
        .mount(server)
        .await;

    let mut thread = ReplyThread::new(5);
    thread.load(&client_for(server)).await.expect("load failed");
    thread
}

#[tokio::test]
async fn test_create_reply_appends_and_counts() {
    let server = MockServer::start().await;
    let mut thread = loaded_thread(&server).await;
    Mock::given(method("POST"))
        .and(path("/replies"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 22, "content": "third", "user": { "id": 7, "name": "Me" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    thread.composer.set_content("third");
    thread.create_reply(&client_for(&server)).await.expect("reply failed");
    assert_eq!(thread.replies.last().map(|r| r.id), Some(22));
    assert_eq!(thread.post.as_ref().unwrap().reply_count, 3);
    assert_eq!(thread.composer.content(), "");
}

#[tokio::test]
async fn test_edit_keeps_author_when_response_omits_it() {
    let server = MockServer::start().await;
    let mut thread = loaded_thread(&server).await;
    Mock::given(method("PUT"))
        .and(path("/replies/20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 20, "content": "edited" })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(thread.start_editing(21).is_err());
    thread.start_editing(20).unwrap();
    thread.editing_mut().unwrap().set_content("edited");
    thread.save_edit(&client_for(&server)).await.expect("edit failed");

    let reply = thread.reply(20).unwrap();
    assert_eq!(reply.content, "edited");
    assert_eq!(reply.user.as_ref().map(|u| u.id), Some(7));
    assert!(thread.editing().is_none());
}

#[tokio::test]
async fn test_like_and_delete_reply() {
    let server = MockServer::start().await;
    let mut thread = loaded_thread(&server).await;
    Mock::given(method("POST"))
        .and(path("/replies/21/like"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "likeCount": 5 })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/replies/20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "deleted" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    thread.toggle_like(&client, 21).await.expect("like failed");
    assert_eq!(thread.reply(21).unwrap().like_count, 5);

    thread.request_delete(20);
    assert_eq!(thread.confirm_delete(&client).await.unwrap(), Some(20));
    assert!(thread.reply(20).is_none());
    assert_eq!(thread.post.as_ref().unwrap().reply_count, 1);
}
