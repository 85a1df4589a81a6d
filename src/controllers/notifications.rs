use tracing::{info, warn};

use crate::controllers::router::Route;
use crate::error::FeedError;
use crate::models::{ApiClient, Notification};

#[derive(Debug, Clone, PartialEq)]
pub struct ClickOutcome {
    /// Route path to open, when the notification references something.
    pub path: Option<String>,
    pub mark_read_error: Option<FeedError>,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationList {
    pub items: Vec<Notification>,
    pub loaded: bool,
}

impl NotificationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&mut self, client: &ApiClient) -> Result<(), FeedError> {
        self.items = client.notifications().await?;
        self.loaded = true;
        info!(count = self.items.len(), unread = self.unread(), "notifications loaded");
        Ok(())
    }

    pub fn unread(&self) -> usize {
        self.items.iter().filter(|n| !n.is_read).count()
    }

    pub fn get(&self, notification_id: i64) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == notification_id)
    }

    /// Marks the notification read, then reports where it points. A failed
    /// mark-read is carried back for a toast; navigation goes ahead regardless.
    pub async fn click(&mut self, client: &ApiClient, notification_id: i64) -> Option<ClickOutcome> {
        let target = self.get(notification_id)?.target();

        let mark_read_error = match client.mark_read(notification_id).await {
            Ok(()) => {
                if let Some(n) = self.items.iter_mut().find(|n| n.id == notification_id) {
                    n.is_read = true;
                }
                None
            }
            Err(err) => {
                warn!(notification_id, error = %err, "mark read failed");
                Some(err)
            }
        };

        Some(ClickOutcome {
            path: target.map(Route::target_path),
            mark_read_error,
        })
    }

    pub async fn clear_all(&mut self, client: &ApiClient) -> Result<(), FeedError> {
        client.clear_notifications().await?;
        self.items.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::ActionType;

    fn note(id: i64, read: bool) -> Notification {
        Notification {
            id,
            actor_name: "Ana".into(),
            actor_avatar: String::new(),
            message: String::new(),
            action: ActionType::Tagged,
            post_id: Some(42),
            poll_id: None,
            is_read: read,
            created_at: None,
        }
    }

    #[test]
    fn unread_counts_only_unread() {
        let list = NotificationList { items: vec![note(1, false), note(2, true), note(3, false)], loaded: true };
        assert_eq!(list.unread(), 2);
        assert!(list.get(2).is_some());
        assert!(list.get(9).is_none());
    }
}
