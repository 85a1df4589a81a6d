use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ratatui::widgets::ListState;

/// Rows skipped by PageUp/PageDown.
pub const PAGE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMove {
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
}

/// Selection over a list whose items live in a view-model.
#[derive(Debug, Default, Clone)]
pub struct ListCursor {
    pub state: ListState,
}

impl ListCursor {
    pub fn new(len: usize) -> ListCursor {
        let mut cursor = ListCursor::default();
        // Start with the first item selected
        if len > 0 {
            cursor.state.select(Some(0));
        }
        cursor
    }

    pub fn selected(&self) -> Option<usize> {
        self.state.selected()
    }

    pub fn select(&mut self, index: Option<usize>) {
        self.state.select(index);
    }

    /// Keeps the selection inside `0..len` after the list changed.
    pub fn clamp(&mut self, len: usize) {
        let i = match (self.state.selected(), len) {
            (_, 0) => None,
            (Some(i), len) => Some(i.min(len - 1)),
            (None, _) => Some(0),
        };
        self.state.select(i);
    }

    pub fn next(&mut self, len: usize) {
        if len == 0 {
            self.state.select(None);
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 >= len => len - 1,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self, len: usize) {
        if len == 0 {
            self.state.select(None);
            return;
        }
        let i = match self.state.selected() {
            Some(i) => i.saturating_sub(1).min(len - 1),
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn first(&mut self, len: usize) {
        self.state.select(if len == 0 { None } else { Some(0) });
    }

    pub fn last(&mut self, len: usize) {
        self.state.select(len.checked_sub(1));
    }

    pub fn jump_up(&mut self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        let i = self.state.selected().unwrap_or(0).saturating_sub(offset);
        self.state.select(Some(i));
    }

    pub fn jump_down(&mut self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        let i = self.state.selected().unwrap_or(0).saturating_add(offset);
        self.state.select(Some(i.min(len - 1)));
    }

    pub fn apply(&mut self, mv: CursorMove, len: usize) {
        match mv {
            CursorMove::Up => self.previous(len),
            CursorMove::Down => self.next(len),
            CursorMove::PageUp => self.jump_up(PAGE, len),
            CursorMove::PageDown => self.jump_down(PAGE, len),
            CursorMove::Top => self.first(len),
            CursorMove::Bottom => self.last(len),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub text: String,
    pub until: Instant,
}

/// Short-lived messages shown over the current view, oldest first.
#[derive(Debug, Clone)]
pub struct Toasts {
    items: VecDeque<Toast>,
    ttl: Duration,
}

const MAX_TOASTS: usize = 3;

impl Toasts {
    pub fn new(ttl: Duration) -> Self {
        Toasts { items: VecDeque::new(), ttl }
    }

    pub fn push(&mut self, kind: ToastKind, text: impl Into<String>, now: Instant) {
        if self.items.len() == MAX_TOASTS {
            self.items.pop_front();
        }
        self.items.push_back(Toast { kind, text: text.into(), until: now + self.ttl });
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push(ToastKind::Info, text, Instant::now());
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push(ToastKind::Error, text, Instant::now());
    }

    pub fn expire(&mut self, now: Instant) {
        self.items.retain(|t| now < t.until);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_stays_in_bounds() {
        let mut c = ListCursor::new(3);
        c.next(3);
        c.next(3);
        c.next(3);
        assert_eq!(c.selected(), Some(2));
        c.apply(CursorMove::PageUp, 3);
        assert_eq!(c.selected(), Some(0));
        c.previous(3);
        assert_eq!(c.selected(), Some(0));
        c.apply(CursorMove::PageDown, 3);
        assert_eq!(c.selected(), Some(2));
        c.clamp(1);
        assert_eq!(c.selected(), Some(0));
    }

    #[test]
    fn paging_moves_by_a_page() {
        let mut c = ListCursor::new(25);
        c.apply(CursorMove::PageDown, 25);
        assert_eq!(c.selected(), Some(PAGE));
        c.apply(CursorMove::Bottom, 25);
        assert_eq!(c.selected(), Some(24));
        c.apply(CursorMove::PageUp, 25);
        assert_eq!(c.selected(), Some(24 - PAGE));
        c.apply(CursorMove::Top, 25);
        assert_eq!(c.selected(), Some(0));
    }

    #[test]
    fn empty_list_has_no_selection() {
        let mut c = ListCursor::new(0);
        assert_eq!(c.selected(), None);
        c.next(0);
        c.last(0);
        c.apply(CursorMove::PageDown, 0);
        c.apply(CursorMove::Top, 0);
        assert_eq!(c.selected(), None);
    }

    #[test]
    fn toasts_expire_and_cap() {
        let now = Instant::now();
        let mut toasts = Toasts::new(Duration::from_secs(4));
        for i in 0..5 {
            toasts.push(ToastKind::Info, format!("t{}", i), now);
        }
        assert_eq!(toasts.iter().count(), MAX_TOASTS);
        assert_eq!(toasts.iter().next().map(|t| t.text.as_str()), Some("t2"));
        toasts.expire(now + Duration::from_secs(5));
        assert!(toasts.is_empty());
    }
}
