use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "avatar_url")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, alias = "login_id")]
    pub login_id: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role
            .as_deref()
            .map(|r| r.trim().eq_ignore_ascii_case("admin"))
            .unwrap_or(false)
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { "Unknown" } else { &self.name }
    }

    /// Owner-only actions (editing).
    pub fn owns(&self, author: Option<&User>) -> bool {
        author.map(|a| a.id == self.id).unwrap_or(false)
    }

    /// Owner-or-admin actions (deleting).
    pub fn can_delete(&self, author: Option<&User>) -> bool {
        self.is_admin() || self.owns(author)
    }
}
