use tracing::info;

use crate::controllers::composer::{Composer, ComposerMode, Submitted};
use crate::error::FeedError;
use crate::models::{ApiClient, Post, Reply, User};

/// One post and its replies, with a composer for new replies and an
/// optional second composer for the reply being edited.
#[derive(Debug, Clone)]
pub struct ReplyThread {
    pub post_id: i64,
    pub post: Option<Post>,
    pub replies: Vec<Reply>,
    pub current_user: Option<User>,
    pub composer: Composer,
    editing: Option<Composer>,
    pending_delete: Option<i64>,
}

impl ReplyThread {
    pub fn new(post_id: i64) -> Self {
        ReplyThread {
            post_id,
            post: None,
            replies: Vec::new(),
            current_user: None,
            composer: Composer::new(ComposerMode::CreateReply(post_id)),
            editing: None,
            pending_delete: None,
        }
    }

    pub async fn load(&mut self, client: &ApiClient) -> Result<(), FeedError> {
        let (post, replies, me) = tokio::try_join!(
            client.post(self.post_id),
            client.replies(self.post_id),
            client.me()
        )?;
        info!(post_id = self.post_id, replies = replies.len(), "thread loaded");
        self.post = Some(post);
        self.replies = replies;
        self.current_user = Some(me);
        Ok(())
    }

    pub fn reply(&self, reply_id: i64) -> Option<&Reply> {
        self.replies.iter().find(|r| r.id == reply_id)
    }

    pub fn can_edit(&self, reply: &Reply) -> bool {
        self.current_user
            .as_ref()
            .map(|me| me.owns(reply.user.as_ref()))
            .unwrap_or(false)
    }

    pub fn can_delete(&self, reply: &Reply) -> bool {
        self.current_user
            .as_ref()
            .map(|me| me.can_delete(reply.user.as_ref()))
            .unwrap_or(false)
    }

    /// Appends the server's reply and resets the create composer.
    pub async fn create_reply(&mut self, client: &ApiClient) -> Result<(), FeedError> {
        match self.composer.submit(client).await? {
            Submitted::Reply(reply) => {
                self.replies.push(reply);
                if let Some(post) = self.post.as_mut() {
                    post.reply_count += 1;
                }
                Ok(())
            }
            Submitted::Post(_) => Err(FeedError::validation("Reply composer produced a post")),
        }
    }

    pub fn start_editing(&mut self, reply_id: i64) -> Result<(), FeedError> {
        let reply = self
            .reply(reply_id)
            .ok_or_else(|| FeedError::validation("Reply not found"))?;
        if !self.can_edit(reply) {
            return Err(FeedError::validation("Only the reply author can edit this reply"));
        }
        self.editing = Some(Composer::edit_reply(reply));
        Ok(())
    }

    pub fn editing(&self) -> Option<&Composer> {
        self.editing.as_ref()
    }

    pub fn editing_mut(&mut self) -> Option<&mut Composer> {
        self.editing.as_mut()
    }

    pub fn editing_id(&self) -> Option<i64> {
        match self.editing.as_ref().map(Composer::mode) {
            Some(ComposerMode::EditReply(id)) => Some(id),
            _ => None,
        }
    }

    pub fn cancel_editing(&mut self) {
        self.editing = None;
    }

    /// Saves the edit and swaps the returned reply in by id.
    pub async fn save_edit(&mut self, client: &ApiClient) -> Result<(), FeedError> {
        let Some(composer) = self.editing.as_mut() else {
            return Ok(());
        };
        match composer.submit(client).await? {
            Submitted::Reply(updated) => {
                if let Some(slot) = self.replies.iter_mut().find(|r| r.id == updated.id) {
                    // keep the author if the response leaves it out
                    let user = slot.user.take();
                    *slot = Reply { user: updated.user.clone().or(user), ..updated };
                }
                self.editing = None;
                Ok(())
            }
            Submitted::Post(_) => Err(FeedError::validation("Reply composer produced a post")),
        }
    }

    pub async fn toggle_like(&mut self, client: &ApiClient, reply_id: i64) -> Result<(), FeedError> {
        let response = client.like_reply(reply_id).await?;
        if let Some(reply) = self.replies.iter_mut().find(|r| r.id == reply_id) {
            reply.like_count = response.like_count;
        }
        Ok(())
    }

    pub fn request_delete(&mut self, reply_id: i64) {
        self.pending_delete = Some(reply_id);
    }

    pub fn pending_delete(&self) -> Option<i64> {
        self.pending_delete
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub async fn confirm_delete(&mut self, client: &ApiClient) -> Result<Option<i64>, FeedError> {
        let Some(reply_id) = self.pending_delete.take() else {
            return Ok(None);
        };
        client.delete_reply(reply_id).await?;
        self.replies.retain(|r| r.id != reply_id);
        if let Some(post) = self.post.as_mut() {
            post.reply_count = post.reply_count.saturating_sub(1);
        }
        Ok(Some(reply_id))
    }
}
