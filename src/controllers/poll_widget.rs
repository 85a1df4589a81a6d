use crate::models::Poll;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    Unselected,
    Selected(i64),
    /// Terminal. Set from server data only.
    Voted(i64),
}

/// Single-choice voting over one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PollVoteWidget {
    poll_id: i64,
    state: VoteState,
}

impl PollVoteWidget {
    pub fn for_poll(poll: &Poll) -> Self {
        let state = match poll.user_vote_option_id {
            Some(option_id) => VoteState::Voted(option_id),
            None => VoteState::Unselected,
        };
        PollVoteWidget { poll_id: poll.id, state }
    }

    pub fn poll_id(&self) -> i64 {
        self.poll_id
    }

    pub fn state(&self) -> VoteState {
        self.state
    }

    pub fn has_voted(&self) -> bool {
        matches!(self.state, VoteState::Voted(_))
    }

    pub fn selected(&self) -> Option<i64> {
        match self.state {
            VoteState::Selected(id) => Some(id),
            _ => None,
        }
    }

    /// Picks an option. Replaces any previous pick; ignored once voted or
    /// for options the poll does not have.
    pub fn select(&mut self, poll: &Poll, option_id: i64) -> bool {
        if self.has_voted() || poll.id != self.poll_id || poll.option(option_id).is_none() {
            return false;
        }
        self.state = VoteState::Selected(option_id);
        true
    }

    /// Whether the submit control is shown at all.
    pub fn shows_submit(&self) -> bool {
        !self.has_voted()
    }

    pub fn can_submit(&self) -> bool {
        matches!(self.state, VoteState::Selected(_))
    }

    /// Percentages are revealed only after voting.
    pub fn shows_results(&self) -> bool {
        self.has_voted()
    }

    /// Follows fresh server data for the same poll. Never leaves `Voted`.
    pub fn sync(&mut self, poll: &Poll) {
        if poll.id != self.poll_id {
            *self = Self::for_poll(poll);
            return;
        }
        match (self.state, poll.user_vote_option_id) {
            (VoteState::Voted(_), _) => {}
            (_, Some(option_id)) => self.state = VoteState::Voted(option_id),
            (VoteState::Selected(id), None) if poll.option(id).is_none() => {
                self.state = VoteState::Unselected;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PollOption;

    fn poll(voted: Option<i64>) -> Poll {
        Poll {
            id: 10,
            title: "Best Color".into(),
            options: vec![
                PollOption { id: 1, text: "Red".into(), vote_count: 3 },
                PollOption { id: 2, text: "Blue".into(), vote_count: 1 },
            ],
            user_vote_option_id: voted,
            ..Default::default()
        }
    }

    #[test]
    fn single_selection() {
        let p = poll(None);
        let mut w = PollVoteWidget::for_poll(&p);
        assert_eq!(w.state(), VoteState::Unselected);
        assert!(!w.can_submit());
        assert!(w.select(&p, 1));
        assert!(w.select(&p, 2));
        assert_eq!(w.selected(), Some(2));
        assert!(w.can_submit());
        assert!(!w.select(&p, 99));
        assert_eq!(w.selected(), Some(2));
    }

    #[test]
    fn voted_is_terminal() {
        let p = poll(Some(1));
        let mut w = PollVoteWidget::for_poll(&p);
        assert!(w.has_voted());
        assert!(!w.select(&p, 2));
        assert!(!w.shows_submit());
        assert!(!w.can_submit());
        assert!(w.shows_results());

        // stale data without the vote does not reopen voting
        w.sync(&poll(None));
        assert_eq!(w.state(), VoteState::Voted(1));
        assert_eq!(p.option(1).map(|o| o.vote_count), Some(3));
    }

    #[test]
    fn sync_moves_to_voted_from_server() {
        let mut w = PollVoteWidget::for_poll(&poll(None));
        w.select(&poll(None), 2);
        w.sync(&poll(Some(2)));
        assert_eq!(w.state(), VoteState::Voted(2));
    }

    #[test]
    fn sync_with_other_poll_rebuilds() {
        let mut w = PollVoteWidget::for_poll(&poll(None));
        let other = Poll { id: 11, user_vote_option_id: Some(5), ..Default::default() };
        w.sync(&other);
        assert_eq!(w.poll_id(), 11);
        assert_eq!(w.state(), VoteState::Voted(5));
    }
}
