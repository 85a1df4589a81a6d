use std::fmt;

use url::Url;

use crate::models::{NotificationTarget, Session};

/// Item on the home view to scroll to and pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Post(i64),
    Poll(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Home { highlight: Option<Highlight> },
    CreatePost,
    EditPost(i64),
    Notifications,
    Replies(i64),
    CreatePoll,
    EditPoll(i64),
}

const APP_ORIGIN: &str = "feedtui://app/";

/// Percent-decoded query value.
fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

impl Route {
    pub fn home() -> Self {
        Route::Home { highlight: None }
    }

    /// Resolves a path. Legacy `/posts/:id` and `/polls/:id` forward to the
    /// home view with a highlight; anything unknown goes home.
    pub fn parse(path: &str) -> Route {
        let Ok(url) = Url::parse(APP_ORIGIN).and_then(|base| base.join(path.trim())) else {
            return Route::home();
        };
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let id = |raw: &str| raw.parse::<i64>().ok();

        match segments.as_slice() {
            [] => {
                let highlight = query_param(&url, "postId")
                    .and_then(|v| id(&v))
                    .map(Highlight::Post)
                    .or_else(|| query_param(&url, "pollId").and_then(|v| id(&v)).map(Highlight::Poll));
                Route::Home { highlight }
            }
            ["login"] => Route::Login,
            ["create-post"] => Route::CreatePost,
            ["notifications"] => Route::Notifications,
            ["create-poll"] => Route::CreatePoll,
            ["edit-post", raw] => id(*raw).map(Route::EditPost).unwrap_or_else(Route::home),
            ["edit-poll", raw] => id(*raw).map(Route::EditPoll).unwrap_or_else(Route::home),
            ["post", raw, "replies"] => id(*raw).map(Route::Replies).unwrap_or_else(Route::home),
            ["posts", raw] => Route::Home { highlight: id(*raw).map(Highlight::Post) },
            ["polls", raw] => Route::Home { highlight: id(*raw).map(Highlight::Poll) },
            _ => Route::home(),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Home { highlight: None } => "/".to_string(),
            Route::Home { highlight: Some(Highlight::Post(id)) } => format!("/?postId={}", id),
            Route::Home { highlight: Some(Highlight::Poll(id)) } => format!("/?pollId={}", id),
            Route::CreatePost => "/create-post".to_string(),
            Route::EditPost(id) => format!("/edit-post/{}", id),
            Route::Notifications => "/notifications".to_string(),
            Route::Replies(id) => format!("/post/{}/replies", id),
            Route::CreatePoll => "/create-poll".to_string(),
            Route::EditPoll(id) => format!("/edit-poll/{}", id),
        }
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, Route::Login)
    }

    /// The path a notification click navigates to.
    pub fn target_path(target: NotificationTarget) -> String {
        match target {
            NotificationTarget::Post(id) => format!("/posts/{}", id),
            NotificationTarget::Poll(id) => format!("/polls/{}", id),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Protected routes render only with a stored credential.
pub fn guard(route: Route, session: &Session) -> Route {
    if route.requires_auth() && !session.is_authenticated() {
        tracing::info!(requested = %route, "no credential, redirecting to login");
        Route::Login
    } else {
        route
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    current: Route,
    history: Vec<Route>,
}

impl Router {
    pub fn start(path: &str, session: &Session) -> Self {
        Router { current: guard(Route::parse(path), session), history: Vec::new() }
    }

    pub fn current(&self) -> &Route {
        &self.current
    }

    pub fn navigate(&mut self, route: Route, session: &Session) -> &Route {
        let next = guard(route, session);
        if next != self.current {
            let previous = std::mem::replace(&mut self.current, next);
            if previous != Route::Login {
                self.history.push(previous);
            }
        }
        &self.current
    }

    pub fn navigate_path(&mut self, path: &str, session: &Session) -> &Route {
        self.navigate(Route::parse(path), session)
    }

    /// Replaces the current entry without growing history (login, logout).
    pub fn replace(&mut self, route: Route, session: &Session) -> &Route {
        self.current = guard(route, session);
        if self.current == Route::Login {
            self.history.clear();
        }
        &self.current
    }

    pub fn back(&mut self, session: &Session) -> &Route {
        let previous = self.history.pop().unwrap_or_else(Route::home);
        self.current = guard(previous, session);
        &self.current
    }
}
