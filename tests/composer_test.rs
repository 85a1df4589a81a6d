//! Multipart bodies produced by the composer, as the backend receives them.

use feedtui::controllers::composer::{Composer, ComposerMode, Preview, Submitted};
use feedtui::models::{ApiClient, ImageFile, Post};
use feedtui::FeedError;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::with_base(&server.uri(), Some("tok")).expect("Failed to build client")
}

async fn last_body(server: &MockServer) -> String {
    let requests = server.received_requests().await.unwrap();
    let last = requests.last().expect("no request received");
    String::from_utf8_lossy(&last.body).to_string()
}

#[tokio::test]
async fn test_clearing_persisted_image_sends_delete_flag() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/posts/7"))
        .and(body_string_contains("delete_image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 7, "content": "caption" })))
        .expect(1)
        .mount(&server)
        .await;

    let post = Post {
        id: 7,
        content: "caption".into(),
        image_url: Some("/uploads/cat.png".into()),
        ..Default::default()
    };
    let mut composer = Composer::edit_post(&post);
    composer.remove_image();
    assert_eq!(composer.preview(), Preview::None);

    let submitted = composer.submit(&client_for(&server)).await.expect("submit failed");
    assert!(matches!(submitted, Submitted::Post(p) if p.id == 7));

    let body = last_body(&server).await;
    assert!(body.contains("name=\"delete_image\""));
    assert!(!body.contains("name=\"image\""));
    assert!(!body.contains("delete_gif"));
}

#[tokio::test]
async fn test_empty_post_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let mut composer = Composer::new(ComposerMode::CreatePost);
    composer.set_content("   ");
    let err = composer.submit(&client_for(&server)).await.unwrap_err();
    assert!(matches!(err, FeedError::Validation(_)));
}

#[tokio::test]
async fn test_image_only_post_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/posts"))
        .and(body_string_contains("filename=\"cat.png\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 12, "content": "", "image_url": "/uploads/cat.png"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut composer = Composer::new(ComposerMode::CreatePost);
    composer.choose_image(ImageFile::from_bytes("cat.png", vec![0x89, b'P', b'N', b'G']));
    let submitted = composer.submit(&client_for(&server)).await.expect("submit failed");
    let Submitted::Post(post) = submitted else { panic!("expected a post") };
    assert_eq!(post.image_url.as_deref(), Some("/uploads/cat.png"));
    // composer resets after a successful submit
    assert_eq!(composer.content(), "");
    assert!(!composer.has_image());
}

#[tokio::test]
async fn test_reply_carries_post_id_and_gif() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/replies"))
        .and(body_string_contains("name=\"post_id\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 3, "postId": 5, "content": "nice", "gifUrl": "https://g.example/x.gif"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut composer = Composer::new(ComposerMode::CreateReply(5));
    composer.set_content("nice");
    composer.choose_gif("https://g.example/x.gif").unwrap();
    composer.submit(&client_for(&server)).await.expect("submit failed");

    let body = last_body(&server).await;
    assert!(body.contains("https://g.example/x.gif"));
    assert!(body.contains("name=\"gif\""));
}

#[tokio::test]
async fn test_upload_preview_keeps_file_for_submit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "url": "/uploads/tmp/dog.jpg" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut composer = Composer::new(ComposerMode::CreatePost);
    composer.choose_image(ImageFile::from_bytes("dog.jpg", vec![0xff, 0xd8]));
    composer.upload_preview(&client_for(&server)).await.expect("upload failed");

    assert_eq!(
        composer.preview(),
        Preview::NewImage { file_name: "dog.jpg".into(), url: Some("/uploads/tmp/dog.jpg".into()) }
    );
    assert!(composer.image_edit().is_replace());
}
