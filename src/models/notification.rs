use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::timestamp;

pub const SYSTEM_ACTOR: &str = "System";
pub const DEFAULT_AVATAR: &str = "/default-avatar.png";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Tagged,
    NewPost,
    NewPoll,
    System,
    #[serde(other)]
    Other,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "avatar_url")]
    pub avatar_url: Option<String>,
}

/// A notification exactly as the backend sends it.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct RawNotification {
    pub id: i64,
    #[serde(default)]
    pub actor: Option<Actor>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub action_type: Option<ActionType>,
    #[serde(default, alias = "postId")]
    pub post_id: Option<i64>,
    #[serde(default, alias = "pollId")]
    pub poll_id: Option<i64>,
    #[serde(default, alias = "isRead")]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, rename = "createdAt")]
    pub created_at_camel: Option<String>,
    #[serde(default)]
    pub created_at_iso: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTarget {
    Post(i64),
    Poll(i64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub actor_name: String,
    pub actor_avatar: String,
    pub message: String,
    pub action: ActionType,
    pub post_id: Option<i64>,
    pub poll_id: Option<i64>,
    pub is_read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<RawNotification> for Notification {
    fn from(raw: RawNotification) -> Self {
        Notification::from_raw(raw, DEFAULT_AVATAR)
    }
}

impl Notification {
    /// Fills the gaps the backend leaves: no actor means a system message.
    pub fn from_raw(raw: RawNotification, default_avatar: &str) -> Self {
        let actor = raw.actor.unwrap_or_default();
        let created = raw
            .created_at
            .or(raw.created_at_camel)
            .or(raw.created_at_iso);
        Notification {
            id: raw.id,
            actor_name: actor
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| SYSTEM_ACTOR.to_string()),
            actor_avatar: actor
                .avatar_url
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| default_avatar.to_string()),
            message: raw.message.unwrap_or_default(),
            action: raw.action_type.unwrap_or(ActionType::Other),
            post_id: raw.post_id,
            poll_id: raw.poll_id,
            is_read: raw.is_read,
            created_at: created.as_deref().and_then(timestamp::parse),
        }
    }
}

impl Notification {
    pub fn action_text(&self) -> &str {
        match self.action {
            ActionType::Tagged => "tagged you in a post",
            ActionType::NewPost => "posted a new post",
            ActionType::NewPoll => "created a new poll",
            ActionType::System => "did something",
            ActionType::Other => &self.message,
        }
    }

    /// Post references win over poll references.
    pub fn target(&self) -> Option<NotificationTarget> {
        self.post_id
            .map(NotificationTarget::Post)
            .or(self.poll_id.map(NotificationTarget::Poll))
    }
}

pub fn normalize(raw: Vec<RawNotification>, default_avatar: &str) -> Vec<Notification> {
    raw.into_iter().map(|n| Notification::from_raw(n, default_avatar)).collect()
}
