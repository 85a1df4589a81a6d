use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FeedError;
use crate::models::config::Config;
use crate::models::media::{FormFields, ImageFile};
use crate::models::notification::{self, Notification, RawNotification};
use crate::models::poll::{NewPoll, Poll, PollUpdate, VoteRequest};
use crate::models::post::{LikeResponse, PinResponse, Post, RepliesPage, Reply};
use crate::models::session::Session;
use crate::models::user::User;

#[derive(Serialize, Debug)]
struct LoginRequest<'a> {
    login_id: &'a str,
    password: &'a str,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Deserialize, Debug)]
struct UploadResponse {
    url: Option<String>,
}

/// Every request to the backend goes through here.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    login_path: String,
    default_avatar: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &Config, session: &Session) -> Result<Self, FeedError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(ApiClient {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            login_path: config.login_path.clone(),
            default_avatar: config.default_avatar.clone(),
            token: session.bearer().map(str::to_string),
        })
    }

    pub fn with_base(base_url: &str, token: Option<&str>) -> Result<Self, FeedError> {
        let config = Config { api_url: base_url.to_string(), ..Config::default() };
        let session = Session { token: token.map(str::to_string), user: None };
        Self::new(&config, &session)
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token.filter(|t| !t.trim().is_empty());
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response, FeedError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                ["error", "message", "msg"]
                    .iter()
                    .find_map(|key| v.get(key).and_then(|m| m.as_str()).map(str::to_string))
            })
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        warn!(status = status.as_u16(), %message, "request rejected");
        Err(FeedError::api(status.as_u16(), message))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, FeedError> {
        let response = Self::check(builder.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_unit(&self, builder: RequestBuilder) -> Result<(), FeedError> {
        Self::check(builder.send().await?).await?;
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FeedError> {
        debug!(path, "GET");
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, FeedError> {
        debug!(path, "POST");
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, FeedError> {
        debug!(path, "PUT");
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    /// POST with an empty JSON object, for toggle-style endpoints.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, FeedError> {
        self.post_json(path, &serde_json::json!({})).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), FeedError> {
        debug!(path, "DELETE");
        self.send_unit(self.request(Method::DELETE, path)).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: FormFields,
    ) -> Result<T, FeedError> {
        debug!(path, fields = ?form.names(), "POST multipart");
        let form = form.into_multipart()?;
        self.send(self.request(Method::POST, path).multipart(form)).await
    }

    pub async fn put_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: FormFields,
    ) -> Result<T, FeedError> {
        debug!(path, fields = ?form.names(), "PUT multipart");
        let form = form.into_multipart()?;
        self.send(self.request(Method::PUT, path).multipart(form)).await
    }

    // auth and users

    pub async fn login(&self, login_id: &str, password: &str) -> Result<LoginResponse, FeedError> {
        self.post_json(&self.login_path, &LoginRequest { login_id, password }).await
    }

    pub async fn me(&self) -> Result<User, FeedError> {
        self.get("users/me").await
    }

    pub async fn users(&self) -> Result<Vec<User>, FeedError> {
        self.get("users").await
    }

    pub async fn upload(&self, image: &ImageFile) -> Result<String, FeedError> {
        let form = FormFields::new().file("image", image.clone());
        let response: UploadResponse = self.post_multipart("upload", form).await?;
        response
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| FeedError::api(500, "Upload returned no URL"))
    }

    // posts

    pub async fn posts(&self) -> Result<Vec<Post>, FeedError> {
        self.get("posts").await
    }

    pub async fn post(&self, post_id: i64) -> Result<Post, FeedError> {
        self.get(&format!("posts/{}", post_id)).await
    }

    pub async fn create_post(&self, form: FormFields) -> Result<Post, FeedError> {
        self.post_multipart("posts", form).await
    }

    pub async fn update_post(&self, post_id: i64, form: FormFields) -> Result<Post, FeedError> {
        self.put_multipart(&format!("posts/{}", post_id), form).await
    }

    pub async fn delete_post(&self, post_id: i64) -> Result<(), FeedError> {
        self.delete(&format!("posts/{}", post_id)).await
    }

    pub async fn like_post(&self, post_id: i64) -> Result<LikeResponse, FeedError> {
        self.post_empty(&format!("posts/{}/like", post_id)).await
    }

    pub async fn toggle_pin(&self, post_id: i64) -> Result<PinResponse, FeedError> {
        self.post_empty(&format!("posts/{}/toggle-pin", post_id)).await
    }

    // replies

    pub async fn replies(&self, post_id: i64) -> Result<Vec<Reply>, FeedError> {
        let page: RepliesPage = self.get(&format!("posts/{}/replies", post_id)).await?;
        Ok(page.replies)
    }

    pub async fn create_reply(&self, form: FormFields) -> Result<Reply, FeedError> {
        self.post_multipart("replies", form).await
    }

    pub async fn update_reply(&self, reply_id: i64, form: FormFields) -> Result<Reply, FeedError> {
        self.put_multipart(&format!("replies/{}", reply_id), form).await
    }

    pub async fn delete_reply(&self, reply_id: i64) -> Result<(), FeedError> {
        self.delete(&format!("replies/{}", reply_id)).await
    }

    pub async fn like_reply(&self, reply_id: i64) -> Result<LikeResponse, FeedError> {
        self.post_empty(&format!("replies/{}/like", reply_id)).await
    }

    // polls

    pub async fn polls(&self) -> Result<Vec<Poll>, FeedError> {
        self.get("polls").await
    }

    pub async fn poll(&self, poll_id: i64) -> Result<Poll, FeedError> {
        self.get(&format!("polls/{}", poll_id)).await
    }

    pub async fn create_poll(&self, poll: &NewPoll) -> Result<Poll, FeedError> {
        self.post_json("polls", poll).await
    }

    pub async fn update_poll(&self, poll_id: i64, update: &PollUpdate) -> Result<Poll, FeedError> {
        self.put_json(&format!("polls/{}", poll_id), update).await
    }

    pub async fn delete_poll(&self, poll_id: i64) -> Result<(), FeedError> {
        self.delete(&format!("polls/{}", poll_id)).await
    }

    pub async fn vote(&self, poll_id: i64, option_id: i64) -> Result<Poll, FeedError> {
        self.post_json(&format!("polls/{}/vote", poll_id), &VoteRequest { option_id }).await
    }

    // notifications

    /// Anything other than a JSON array is treated as an empty list.
    pub async fn notifications(&self) -> Result<Vec<Notification>, FeedError> {
        let value: serde_json::Value = self.get("notifications").await?;
        let raw: Vec<RawNotification> = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value)?,
            _ => Vec::new(),
        };
        Ok(notification::normalize(raw, &self.default_avatar))
    }

    pub async fn mark_read(&self, notification_id: i64) -> Result<(), FeedError> {
        self.send_unit(
            self.request(Method::POST, &format!("notifications/{}/read", notification_id))
                .json(&serde_json::json!({})),
        )
        .await
    }

    pub async fn clear_notifications(&self) -> Result<(), FeedError> {
        self.delete("notifications/clear").await
    }
}
