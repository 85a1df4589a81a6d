use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::FeedError;
use crate::models::poll::{NewPoll, PollUpdate};
use crate::models::timestamp;
use crate::models::{ApiClient, Poll};

pub const MIN_OPTIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollFormMode {
    Create,
    Edit(i64),
}

/// Which input has focus; the TUI cycles through these with Tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollField {
    Title,
    Description,
    EndAt,
    Option(usize),
}

/// Admin form for creating a poll, or changing an existing poll's title,
/// description and end time. Options are fixed once a poll exists.
#[derive(Debug, Clone, PartialEq)]
pub struct PollForm {
    mode: PollFormMode,
    pub title: String,
    pub description: String,
    /// `YYYY-MM-DDTHH:MM`, read as UTC.
    pub end_at: String,
    options: Vec<String>,
    focus: PollField,
}

impl PollForm {
    pub fn create() -> Self {
        PollForm {
            mode: PollFormMode::Create,
            title: String::new(),
            description: String::new(),
            end_at: String::new(),
            options: vec![String::new(); MIN_OPTIONS],
            focus: PollField::Title,
        }
    }

    pub fn edit(poll: &Poll) -> Self {
        PollForm {
            mode: PollFormMode::Edit(poll.id),
            title: poll.title.clone(),
            description: poll.description.clone().unwrap_or_default(),
            end_at: poll.end_at.map(timestamp::to_form_value).unwrap_or_default(),
            options: poll.options.iter().map(|o| o.text.clone()).collect(),
            focus: PollField::Title,
        }
    }

    pub fn mode(&self) -> PollFormMode {
        self.mode
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn focus(&self) -> PollField {
        self.focus
    }

    fn fields(&self) -> Vec<PollField> {
        let mut fields = vec![PollField::Title, PollField::Description, PollField::EndAt];
        if self.mode == PollFormMode::Create {
            fields.extend((0..self.options.len()).map(PollField::Option));
        }
        fields
    }

    pub fn focus_next(&mut self) {
        let fields = self.fields();
        let idx = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = fields[(idx + 1) % fields.len()];
    }

    pub fn focus_prev(&mut self) {
        let fields = self.fields();
        let idx = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = fields[(idx + fields.len() - 1) % fields.len()];
    }

    fn focused_text(&mut self) -> Option<&mut String> {
        match self.focus {
            PollField::Title => Some(&mut self.title),
            PollField::Description => Some(&mut self.description),
            PollField::EndAt => Some(&mut self.end_at),
            PollField::Option(i) => self.options.get_mut(i),
        }
    }

    pub fn insert_char(&mut self, c: char) {
        if let Some(text) = self.focused_text() {
            text.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(text) = self.focused_text() {
            text.pop();
        }
    }

    pub fn set_option(&mut self, index: usize, text: &str) {
        if let Some(slot) = self.options.get_mut(index) {
            *slot = text.to_string();
        }
    }

    pub fn add_option(&mut self) {
        if self.mode == PollFormMode::Create {
            self.options.push(String::new());
            self.focus = PollField::Option(self.options.len() - 1);
        }
    }

    pub fn remove_option(&mut self, index: usize) -> Result<(), FeedError> {
        if self.mode != PollFormMode::Create {
            return Err(FeedError::validation("Options cannot be changed after creation"));
        }
        if self.options.len() <= MIN_OPTIONS {
            return Err(FeedError::validation("At least 2 options are required"));
        }
        if index >= self.options.len() {
            return Ok(());
        }
        self.options.remove(index);
        if let PollField::Option(i) = self.focus {
            self.focus = PollField::Option(i.min(self.options.len() - 1));
        }
        Ok(())
    }

    fn end_time(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, FeedError> {
        if self.end_at.trim().is_empty() {
            return Err(FeedError::validation("End time is required"));
        }
        let end = timestamp::parse(&self.end_at)
            .ok_or_else(|| FeedError::validation("End time must look like YYYY-MM-DDTHH:MM"))?;
        if timestamp::is_past(end, now) {
            return Err(FeedError::validation("End time must be in the future"));
        }
        Ok(end)
    }

    fn clean_options(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), FeedError> {
        if self.title.trim().is_empty() {
            return Err(FeedError::validation("Title is required"));
        }
        self.end_time(now)?;
        if self.mode == PollFormMode::Create && self.clean_options().len() < MIN_OPTIONS {
            return Err(FeedError::validation("At least 2 options are required"));
        }
        Ok(())
    }

    pub fn new_poll(&self, now: DateTime<Utc>) -> Result<NewPoll, FeedError> {
        self.validate(now)?;
        Ok(NewPoll {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            end_at: timestamp::to_form_value(self.end_time(now)?),
            options: self.clean_options(),
        })
    }

    pub fn update(&self, now: DateTime<Utc>) -> Result<PollUpdate, FeedError> {
        self.validate(now)?;
        Ok(PollUpdate {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            end_at: timestamp::to_form_value(self.end_time(now)?),
        })
    }

    pub async fn submit(&self, client: &ApiClient) -> Result<Poll, FeedError> {
        let now = Utc::now();
        let poll = match self.mode {
            PollFormMode::Create => client.create_poll(&self.new_poll(now)?).await?,
            PollFormMode::Edit(id) => client.update_poll(id, &self.update(now)?).await?,
        };
        info!(poll_id = poll.id, mode = ?self.mode, "poll saved");
        Ok(poll)
    }
}
