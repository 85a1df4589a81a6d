use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::timestamp;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub vote_count: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub options: Vec<PollOption>,
    #[serde(default)]
    pub user_vote_option_id: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub has_expired: Option<bool>,
}

impl Poll {
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.vote_count).sum()
    }

    pub fn has_voted(&self) -> bool {
        self.user_vote_option_id.is_some()
    }

    pub fn option(&self, option_id: i64) -> Option<&PollOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    /// Whole-number share of the vote; every option reads 0 when nobody voted.
    pub fn percent(&self, option_id: i64) -> u32 {
        let total = self.total_votes();
        match self.option(option_id) {
            Some(opt) if total > 0 => percent_of(opt.vote_count, total),
            _ => 0,
        }
    }
}

pub fn percent_of(votes: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((votes as f64 / total as f64) * 100.0).round() as u32
}

/// Body of `POST /polls`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewPoll {
    pub title: String,
    pub description: String,
    pub end_at: String,
    pub options: Vec<String>,
}

/// Body of `PUT /polls/:id`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PollUpdate {
    pub title: String,
    pub description: String,
    pub end_at: String,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct VoteRequest {
    pub option_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll(counts: &[(i64, &str, u64)]) -> Poll {
        Poll {
            id: 1,
            title: "Best Color".into(),
            options: counts
                .iter()
                .map(|(id, text, votes)| PollOption { id: *id, text: text.to_string(), vote_count: *votes })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn best_color_split() {
        let p = poll(&[(1, "Red", 3), (2, "Blue", 1)]);
        assert_eq!(p.total_votes(), 4);
        assert_eq!(p.percent(1), 75);
        assert_eq!(p.percent(2), 25);
    }

    #[test]
    fn zero_votes_is_zero_percent_everywhere() {
        let p = poll(&[(1, "A", 0), (2, "B", 0), (3, "C", 0)]);
        for opt in &p.options {
            assert_eq!(p.percent(opt.id), 0);
        }
        assert_eq!(p.percent(99), 0);
    }

    #[test]
    fn percentages_round_half_up() {
        let p = poll(&[(1, "A", 1), (2, "B", 2)]);
        assert_eq!(p.percent(1), 33);
        assert_eq!(p.percent(2), 67);
        assert_eq!(percent_of(1, 8), 13);
    }

    #[test]
    fn decodes_server_poll() {
        let p: Poll = serde_json::from_str(
            r#"{"id": 5, "title": "Lunch", "description": null, "endAt": "2030-01-01T10:00:00",
                "options": [{"id": 1, "pollId": 5, "text": "Pizza", "voteCount": 2}],
                "userVoteOptionId": 1, "isActive": true, "hasExpired": false}"#,
        ).unwrap();
        assert!(p.has_voted());
        assert_eq!(p.options[0].text, "Pizza");
        assert!(p.end_at.is_some());
    }
}
