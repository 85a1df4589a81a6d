use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::controllers::poll_widget::PollVoteWidget;
use crate::controllers::router::Highlight;
use crate::error::FeedError;
use crate::models::post::sort_feed;
use crate::models::{ApiClient, Poll, Post, User};

pub const DEFAULT_HIGHLIGHT: Duration = Duration::from_secs(3);

/// Something waiting on a yes/no before it is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingDelete {
    Post(i64),
    Poll(i64),
}

impl PendingDelete {
    pub fn prompt(&self) -> &'static str {
        match self {
            PendingDelete::Post(_) => "Delete this post?",
            PendingDelete::Poll(_) => "Delete this poll?",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveHighlight {
    pub target: Highlight,
    pub until: Instant,
}

/// Why a vote did not go through.
#[derive(Debug, Clone, PartialEq)]
pub enum VoteFailure {
    /// The server refused it (already voted, expired, bad option).
    Rejected(String),
    /// The request never got an answer.
    Unreachable(String),
    /// The vote failed and so did the refetch, so the poll on screen may be
    /// out of date.
    Stale { reason: String, refetch: String },
}

impl VoteFailure {
    pub fn message(&self) -> String {
        match self {
            VoteFailure::Rejected(msg) if msg.is_empty() => "You already voted".to_string(),
            VoteFailure::Rejected(msg) => msg.clone(),
            VoteFailure::Unreachable(msg) => format!("Vote not sent: {}", msg),
            VoteFailure::Stale { reason, refetch } => {
                format!("{}; polls could not be refreshed ({})", reason, refetch)
            }
        }
    }
}

/// Home view state: polls, posts, the selected poll and its voting widget.
#[derive(Debug, Clone, Default)]
pub struct FeedViewModel {
    pub polls: Vec<Poll>,
    pub posts: Vec<Post>,
    pub current_user: Option<User>,
    pub loaded: bool,
    selected_poll: Option<i64>,
    widget: Option<PollVoteWidget>,
    pending_delete: Option<PendingDelete>,
    highlight: Option<ActiveHighlight>,
}

impl FeedViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_admin(&self) -> bool {
        self.current_user.as_ref().map(User::is_admin).unwrap_or(false)
    }

    /// Polls, posts and the current user, fetched concurrently.
    pub async fn load_feed(&mut self, client: &ApiClient) -> Result<(), FeedError> {
        let (polls, posts, me) = tokio::try_join!(client.polls(), client.posts(), client.me())?;
        info!(polls = polls.len(), posts = posts.len(), "feed loaded");
        self.current_user = Some(me);
        self.posts = posts;
        self.set_polls(polls);
        self.loaded = true;
        Ok(())
    }

    fn set_polls(&mut self, polls: Vec<Poll>) {
        self.polls = polls;
        let keep = self
            .selected_poll
            .filter(|id| self.polls.iter().any(|p| p.id == *id));
        match keep.or_else(|| self.polls.first().map(|p| p.id)) {
            Some(id) => {
                self.select_poll(id);
            }
            None => {
                self.selected_poll = None;
                self.widget = None;
            }
        }
    }

    pub fn poll(&self, poll_id: i64) -> Option<&Poll> {
        self.polls.iter().find(|p| p.id == poll_id)
    }

    pub fn post(&self, post_id: i64) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == post_id)
    }

    pub fn selected_poll(&self) -> Option<&Poll> {
        self.selected_poll.and_then(|id| self.poll(id))
    }

    pub fn widget(&self) -> Option<&PollVoteWidget> {
        self.widget.as_ref()
    }

    /// Local only. Keeps the widget when the same poll is re-selected.
    pub fn select_poll(&mut self, poll_id: i64) -> bool {
        let Some(poll) = self.polls.iter().find(|p| p.id == poll_id) else {
            return false;
        };
        match self.widget.as_mut() {
            Some(widget) if widget.poll_id() == poll_id => widget.sync(poll),
            _ => self.widget = Some(PollVoteWidget::for_poll(poll)),
        }
        self.selected_poll = Some(poll_id);
        true
    }

    pub fn choose_option(&mut self, option_id: i64) -> bool {
        let Some(poll_id) = self.selected_poll else { return false };
        let Some(poll) = self.polls.iter().find(|p| p.id == poll_id) else { return false };
        match self.widget.as_mut() {
            Some(widget) => widget.select(poll, option_id),
            None => false,
        }
    }

    fn replace_poll(&mut self, poll: Poll) {
        match self.polls.iter_mut().find(|p| p.id == poll.id) {
            Some(slot) => *slot = poll.clone(),
            None => self.polls.push(poll.clone()),
        }
        if let Some(widget) = self.widget.as_mut() {
            if widget.poll_id() == poll.id {
                widget.sync(&poll);
            }
        }
    }

    /// Sends the selected option. Counts come only from the server: the
    /// updated poll replaces the local one on success; on failure the poll
    /// list is refetched so the view converges anyway.
    pub async fn submit_vote(&mut self, client: &ApiClient) -> Result<(), VoteFailure> {
        let Some(widget) = self.widget.as_ref() else {
            return Err(VoteFailure::Rejected("No poll selected".to_string()));
        };
        if widget.has_voted() {
            return Err(VoteFailure::Rejected("You already voted".to_string()));
        }
        let Some(option_id) = widget.selected() else {
            return Err(VoteFailure::Rejected("Choose an option first".to_string()));
        };
        let poll_id = widget.poll_id();

        match client.vote(poll_id, option_id).await {
            Ok(poll) => {
                info!(poll_id, option_id, "vote recorded");
                let mut poll = poll;
                // Older backends omit the caller's choice in the vote response.
                if poll.user_vote_option_id.is_none() {
                    poll.user_vote_option_id = Some(option_id);
                }
                if poll.options.is_empty() {
                    if let Some(local) = self.poll(poll_id) {
                        poll.options = local.options.clone();
                    }
                }
                self.replace_poll(poll);
                Ok(())
            }
            Err(err) => {
                warn!(poll_id, error = %err, "vote failed, refetching polls");
                let failure = match err {
                    FeedError::Api { message, .. } => VoteFailure::Rejected(message),
                    other => VoteFailure::Unreachable(other.user_message()),
                };
                match client.polls().await {
                    Ok(polls) => {
                        self.set_polls(polls);
                        Err(failure)
                    }
                    Err(refetch) => {
                        warn!(poll_id, error = %refetch, "poll refetch after failed vote also failed");
                        Err(VoteFailure::Stale { reason: failure.message(), refetch: refetch.user_message() })
                    }
                }
            }
        }
    }

    /// Patches the like count from the response; nothing else is refetched.
    pub async fn toggle_like(&mut self, client: &ApiClient, post_id: i64) -> Result<(), FeedError> {
        let response = client.like_post(post_id).await?;
        if let Some(post) = self.posts.iter_mut().find(|p| p.id == post_id) {
            post.like_count = response.like_count;
            post.user_liked = !post.user_liked;
        }
        Ok(())
    }

    /// Applies the returned pin state locally and re-sorts.
    pub async fn toggle_pin(&mut self, client: &ApiClient, post_id: i64) -> Result<(), FeedError> {
        if !self.is_admin() {
            return Err(FeedError::validation("Only admins can pin posts"));
        }
        let response = client.toggle_pin(post_id).await?;
        if let Some(post) = self.posts.iter_mut().find(|p| p.id == post_id) {
            post.pinned = response.pinned;
        }
        sort_feed(&mut self.posts);
        Ok(())
    }

    pub fn request_delete(&mut self, target: PendingDelete) {
        self.pending_delete = Some(target);
    }

    pub fn pending_delete(&self) -> Option<PendingDelete> {
        self.pending_delete
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Runs the confirmed deletion; the item leaves the list only after the
    /// server agrees.
    pub async fn confirm_delete(&mut self, client: &ApiClient) -> Result<Option<PendingDelete>, FeedError> {
        let Some(target) = self.pending_delete.take() else {
            return Ok(None);
        };
        match target {
            PendingDelete::Post(id) => {
                client.delete_post(id).await?;
                self.posts.retain(|p| p.id != id);
            }
            PendingDelete::Poll(id) => {
                client.delete_poll(id).await?;
                let polls = std::mem::take(&mut self.polls)
                    .into_iter()
                    .filter(|p| p.id != id)
                    .collect();
                if self.selected_poll == Some(id) {
                    self.selected_poll = None;
                    self.widget = None;
                }
                self.set_polls(polls);
            }
        }
        info!(?target, "deleted");
        Ok(Some(target))
    }

    /// Points the view at a deep-linked item. Returns its list index (polls
    /// and posts are indexed separately) when it exists.
    pub fn apply_highlight(&mut self, target: Highlight, duration: Duration, now: Instant) -> Option<usize> {
        let index = match target {
            Highlight::Post(id) => self.posts.iter().position(|p| p.id == id),
            Highlight::Poll(id) => {
                let idx = self.polls.iter().position(|p| p.id == id);
                if idx.is_some() {
                    self.select_poll(id);
                }
                idx
            }
        };
        if index.is_some() {
            self.highlight = Some(ActiveHighlight { target, until: now + duration });
        }
        index
    }

    pub fn is_highlighted(&self, target: Highlight, now: Instant) -> bool {
        self.highlight
            .map(|h| h.target == target && now < h.until)
            .unwrap_or(false)
    }

    pub fn expire_highlight(&mut self, now: Instant) {
        if self.highlight.map(|h| now >= h.until).unwrap_or(false) {
            self.highlight = None;
        }
    }
}
