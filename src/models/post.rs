use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::timestamp;
use crate::models::user::User;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub content: String,
    #[serde(default, rename = "image_url", alias = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(default, rename = "gif_url", alias = "gifUrl")]
    pub gif_url: Option<String>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub user_liked: bool,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: i64,
    #[serde(default, alias = "post_id")]
    pub post_id: Option<i64>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "image_url")]
    pub image_url: Option<String>,
    #[serde(default, alias = "gif_url")]
    pub gif_url: Option<String>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub created_at: Option<DateTime<Utc>>,
}

/// `GET /posts/:id/replies` wraps the list in an object.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RepliesPage {
    #[serde(default)]
    pub replies: Vec<Reply>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub like_count: u64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PinResponse {
    pub pinned: bool,
}

/// What an item currently shows as its attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    None,
    Image(String),
    Gif(String),
}

fn attachment_of(image: &Option<String>, gif: &Option<String>) -> Attachment {
    let non_empty = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();
    match (non_empty(image), non_empty(gif)) {
        (Some(url), _) => Attachment::Image(url),
        (None, Some(url)) => Attachment::Gif(url),
        (None, None) => Attachment::None,
    }
}

impl Post {
    pub fn author_name(&self) -> &str {
        self.user.as_ref().map(User::display_name).unwrap_or("Unknown")
    }

    pub fn attachment(&self) -> Attachment {
        attachment_of(&self.image_url, &self.gif_url)
    }
}

impl Reply {
    pub fn author_name(&self) -> &str {
        self.user.as_ref().map(User::display_name).unwrap_or("Unknown User")
    }

    pub fn attachment(&self) -> Attachment {
        attachment_of(&self.image_url, &self.gif_url)
    }
}

/// Server ordering for the feed: pinned first, then newest first.
pub fn sort_feed(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        b.pinned
            .cmp(&a.pinned)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_accepts_mixed_case_wire_names() {
        let post: Post = serde_json::from_str(
            r#"{
                "id": 3,
                "authorId": 1,
                "content": "hello",
                "createdAt": "2024-01-02T03:04:05",
                "user": {"id": 1, "name": "Ana", "role": "admin"},
                "likeCount": 4,
                "userLiked": true,
                "replyCount": 2,
                "image_url": null,
                "gif_url": "https://media.example/g.gif"
            }"#,
        ).unwrap();
        assert_eq!(post.like_count, 4);
        assert!(post.user_liked);
        assert!(!post.pinned);
        assert!(post.created_at.is_some());
        assert_eq!(post.attachment(), Attachment::Gif("https://media.example/g.gif".into()));
        assert_eq!(post.author_name(), "Ana");
    }

    #[test]
    fn reply_accepts_camel_case_media() {
        let reply: Reply = serde_json::from_str(
            r#"{"id": 9, "postId": 3, "content": "", "imageUrl": "https://img/x.png", "likeCount": 1}"#,
        ).unwrap();
        assert_eq!(reply.post_id, Some(3));
        assert_eq!(reply.attachment(), Attachment::Image("https://img/x.png".into()));
        assert_eq!(reply.author_name(), "Unknown User");
    }

    #[test]
    fn feed_sorts_pinned_then_newest() {
        let at = |s: &str| timestamp::parse(s);
        let mut posts = vec![
            Post { id: 1, created_at: at("2024-01-01T00:00:00"), ..Default::default() },
            Post { id: 2, created_at: at("2024-01-03T00:00:00"), ..Default::default() },
            Post { id: 3, created_at: at("2023-12-01T00:00:00"), pinned: true, ..Default::default() },
        ];
        sort_feed(&mut posts);
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }
}
