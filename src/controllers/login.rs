use tracing::info;

use crate::error::FeedError;
use crate::models::{ApiClient, Session, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    LoginId,
    Password,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginForm {
    pub login_id: String,
    pub password: String,
    pub focus: LoginField,
}

impl LoginForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            LoginField::LoginId => LoginField::Password,
            LoginField::Password => LoginField::LoginId,
        };
    }

    fn focused(&mut self) -> &mut String {
        match self.focus {
            LoginField::LoginId => &mut self.login_id,
            LoginField::Password => &mut self.password,
        }
    }

    pub fn insert_char(&mut self, c: char) {
        self.focused().push(c);
    }

    pub fn backspace(&mut self) {
        self.focused().pop();
    }

    /// Password rendered for display.
    pub fn masked_password(&self) -> String {
        "*".repeat(self.password.chars().count())
    }

    pub fn validate(&self) -> Result<(), FeedError> {
        if self.login_id.trim().is_empty() || self.password.is_empty() {
            return Err(FeedError::validation("Login ID and password are required"));
        }
        Ok(())
    }

    /// Logs in, persists the session and points the client at the new token.
    pub async fn submit(&mut self, client: &mut ApiClient, store: &SessionStore) -> Result<Session, FeedError> {
        self.validate()?;
        let session = login(client, store, self.login_id.trim(), &self.password).await?;
        self.password.clear();
        Ok(session)
    }
}

pub async fn login(
    client: &mut ApiClient,
    store: &SessionStore,
    login_id: &str,
    password: &str,
) -> Result<Session, FeedError> {
    let response = client.login(login_id, password).await?;
    let session = Session::new(response.token, response.user);
    store.save(&session)?;
    client.set_token(session.token.clone());
    info!(login_id, "logged in");
    Ok(session)
}

/// Drops the stored credential and cached profile together.
pub fn logout(client: &mut ApiClient, store: &SessionStore) -> Result<Session, FeedError> {
    store.clear()?;
    client.set_token(None);
    info!("logged out");
    Ok(Session::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_fields_required() {
        let mut form = LoginForm::new();
        assert!(form.validate().is_err());
        for c in "ana".chars() {
            form.insert_char(c);
        }
        assert!(form.validate().is_err());
        form.toggle_focus();
        form.insert_char('p');
        form.insert_char('w');
        form.backspace();
        assert_eq!(form.login_id, "ana");
        assert_eq!(form.masked_password(), "*");
        assert!(form.validate().is_ok());
    }
}
