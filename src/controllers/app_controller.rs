use std::future::Future;
use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::{Stream, StreamExt};
use ratatui::backend::Backend;
use ratatui::Terminal;
use tracing::{error, info, warn};

use crate::controllers::composer::{self, Composer, ComposerMode, Submitted};
use crate::controllers::feed::{FeedViewModel, PendingDelete};
use crate::controllers::login::{self, LoginForm};
use crate::controllers::notifications::NotificationList;
use crate::controllers::poll_form::{PollField, PollForm};
use crate::controllers::replies::ReplyThread;
use crate::controllers::router::{Highlight, Route, Router};
use crate::controllers::scope::ViewScope;
use crate::error::FeedError;
use crate::models::{ApiClient, Config, ImageFile, Session, SessionStore, User};
use crate::views::{tui, CursorMove, ListCursor, Toasts};

const TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeFocus {
    Polls,
    Posts,
}

#[derive(Debug)]
pub struct HomeScreen {
    pub feed: FeedViewModel,
    pub focus: HomeFocus,
    pub polls: ListCursor,
    pub posts: ListCursor,
    pub options: ListCursor,
    pending_highlight: Option<Highlight>,
}

impl HomeScreen {
    fn new(highlight: Option<Highlight>) -> Self {
        HomeScreen {
            feed: FeedViewModel::new(),
            focus: HomeFocus::Posts,
            polls: ListCursor::default(),
            posts: ListCursor::default(),
            options: ListCursor::default(),
            pending_highlight: highlight,
        }
    }

    fn after_load(&mut self, highlight_for: Duration, now: Instant) {
        self.posts.clamp(self.feed.posts.len());
        self.polls.clamp(self.feed.polls.len());
        if let Some(target) = self.pending_highlight.take() {
            match (target, self.feed.apply_highlight(target, highlight_for, now)) {
                (Highlight::Post(_), Some(idx)) => {
                    self.focus = HomeFocus::Posts;
                    self.posts.select(Some(idx));
                }
                (Highlight::Poll(_), Some(idx)) => {
                    self.focus = HomeFocus::Polls;
                    self.polls.select(Some(idx));
                }
                (_, None) => warn!(?target, "linked item not in feed"),
            }
        }
        self.sync_poll_cursor();
    }

    fn sync_poll_cursor(&mut self) {
        let selected = self.feed.selected_poll().map(|p| p.id);
        if let Some(idx) = selected.and_then(|id| self.feed.polls.iter().position(|p| p.id == id)) {
            self.polls.select(Some(idx));
        }
        let options = self.feed.selected_poll().map(|p| p.options.len()).unwrap_or(0);
        self.options.clamp(options);
    }

    fn cursor_post_id(&self) -> Option<i64> {
        self.posts.selected().and_then(|i| self.feed.posts.get(i)).map(|p| p.id)
    }

    fn cursor_poll_id(&self) -> Option<i64> {
        self.polls.selected().and_then(|i| self.feed.polls.get(i)).map(|p| p.id)
    }

    fn move_cursor(&mut self, mv: CursorMove) {
        match self.focus {
            HomeFocus::Posts => self.posts.apply(mv, self.feed.posts.len()),
            HomeFocus::Polls => {
                self.polls.apply(mv, self.feed.polls.len());
                if let Some(id) = self.cursor_poll_id() {
                    self.feed.select_poll(id);
                    self.options = ListCursor::new(self.feed.selected_poll().map(|p| p.options.len()).unwrap_or(0));
                }
            }
        }
    }

    fn choose_option_at(&mut self, index: usize) {
        let option_id = self
            .feed
            .selected_poll()
            .and_then(|p| p.options.get(index))
            .map(|o| o.id);
        if let Some(option_id) = option_id {
            self.options.select(Some(index));
            self.feed.choose_option(option_id);
        }
    }
}

#[derive(Debug)]
pub struct ComposeScreen {
    pub composer: Composer,
    /// False until the post being edited has been fetched.
    pub loaded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFocus {
    List,
    Compose,
    Edit,
}

#[derive(Debug)]
pub struct RepliesScreen {
    pub thread: ReplyThread,
    pub cursor: ListCursor,
    pub focus: ReplyFocus,
}

#[derive(Debug)]
pub struct NotificationsScreen {
    pub list: NotificationList,
    pub cursor: ListCursor,
}

#[derive(Debug)]
pub struct PollFormScreen {
    pub form: PollForm,
    pub poll_id: Option<i64>,
    pub loaded: bool,
}

#[derive(Debug)]
pub enum Screen {
    Login(LoginForm),
    Home(HomeScreen),
    Compose(ComposeScreen),
    Notifications(NotificationsScreen),
    Replies(RepliesScreen),
    PollForm(PollFormScreen),
}

impl Screen {
    /// Fresh view state for a route, and whether it has data to fetch.
    fn for_route(route: &Route) -> (Screen, bool) {
        match route {
            Route::Login => (Screen::Login(LoginForm::new()), false),
            Route::Home { highlight } => (Screen::Home(HomeScreen::new(*highlight)), true),
            Route::CreatePost => (
                Screen::Compose(ComposeScreen { composer: Composer::new(ComposerMode::CreatePost), loaded: true }),
                false,
            ),
            Route::EditPost(id) => (
                Screen::Compose(ComposeScreen { composer: Composer::new(ComposerMode::EditPost(*id)), loaded: false }),
                true,
            ),
            Route::Notifications => (
                Screen::Notifications(NotificationsScreen { list: NotificationList::new(), cursor: ListCursor::default() }),
                true,
            ),
            Route::Replies(id) => (
                Screen::Replies(RepliesScreen {
                    thread: ReplyThread::new(*id),
                    cursor: ListCursor::default(),
                    focus: ReplyFocus::List,
                }),
                true,
            ),
            Route::CreatePoll => (
                Screen::PollForm(PollFormScreen { form: PollForm::create(), poll_id: None, loaded: false }),
                true,
            ),
            Route::EditPoll(id) => (
                Screen::PollForm(PollFormScreen { form: PollForm::create(), poll_id: Some(*id), loaded: false }),
                true,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    FeedDelete,
    ReplyDelete,
    ClearNotifications,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    ImagePath,
    GifUrl,
}

impl InputKind {
    pub fn title(&self) -> &'static str {
        match self {
            InputKind::ImagePath => "Image file path",
            InputKind::GifUrl => "GIF URL",
        }
    }
}

/// Modal overlay that takes keys before the screen does.
#[derive(Debug)]
pub enum Prompt {
    Confirm(Confirm),
    Input { kind: InputKind, value: String },
    Mentions { users: Vec<User>, cursor: ListCursor },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Load,
    Navigate(Route),
    Back,
    Quit,
    SubmitLogin,
    Logout,
    SubmitVote,
    LikePost(i64),
    PinPost(i64),
    Confirmed(Confirm),
    SubmitComposer,
    UploadPreview,
    OpenEditor,
    OpenMentions,
    OpenNotification(i64),
    LikeReply(i64),
    SubmitPollForm,
}

impl Action {
    fn busy_label(&self) -> Option<&'static str> {
        match self {
            Action::Load => Some("Loading..."),
            Action::SubmitLogin => Some("Logging in..."),
            Action::SubmitVote => Some("Submitting vote..."),
            Action::SubmitComposer | Action::SubmitPollForm => Some("Saving..."),
            Action::UploadPreview => Some("Uploading image..."),
            Action::OpenMentions => Some("Fetching users..."),
            Action::Confirmed(_) => Some("Deleting..."),
            Action::LikePost(_) | Action::PinPost(_) | Action::LikeReply(_) | Action::OpenNotification(_) => {
                Some("Working...")
            }
            _ => None,
        }
    }
}

/// Races one request against the keyboard: Esc (or Ctrl-C) cancels the
/// view scope and the request is dropped.
async fn in_flight<S, F, T>(events: &mut S, scope: &ViewScope, fut: F) -> Result<T, FeedError>
where
    S: Stream<Item = io::Result<Event>> + Unpin,
    F: Future<Output = Result<T, FeedError>>,
{
    let token = scope.token();
    let work = scope.run(fut);
    tokio::pin!(work);
    loop {
        tokio::select! {
            out = &mut work => return out,
            Some(Ok(Event::Key(key))) = events.next() => {
                if key.kind == KeyEventKind::Press && is_cancel(&key) {
                    token.cancel();
                }
            }
        }
    }
}

fn is_cancel(key: &KeyEvent) -> bool {
    key.code == KeyCode::Esc || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

/// List navigation keys shared by every list view.
fn cursor_move(key: &KeyEvent) -> Option<CursorMove> {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => Some(CursorMove::Down),
        KeyCode::Up | KeyCode::Char('k') => Some(CursorMove::Up),
        KeyCode::PageDown => Some(CursorMove::PageDown),
        KeyCode::PageUp => Some(CursorMove::PageUp),
        KeyCode::Home => Some(CursorMove::Top),
        KeyCode::End => Some(CursorMove::Bottom),
        _ => None,
    }
}

fn ctrl(key: &KeyEvent, c: char) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char(c)
}

/// Keys shared by every composer. Returns an action for anything that
/// needs the network, the terminal or a prompt.
fn composer_key(composer: &mut Composer, key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('s') => Some(Action::SubmitComposer),
            KeyCode::Char('e') => Some(Action::OpenEditor),
            KeyCode::Char('t') => Some(Action::OpenMentions),
            KeyCode::Char('x') => {
                if composer.has_image() {
                    composer.remove_image();
                } else if composer.has_gif() {
                    composer.remove_gif();
                }
                None
            }
            _ => None,
        };
    }
    match key.code {
        KeyCode::Char(c) => composer.insert_char(c),
        KeyCode::Enter => composer.insert_char('\n'),
        KeyCode::Backspace => composer.backspace(),
        KeyCode::Delete => composer.delete(),
        KeyCode::Left => composer.caret_left(),
        KeyCode::Right => composer.caret_right(),
        KeyCode::Home => composer.caret_home(),
        KeyCode::End => composer.caret_end(),
        _ => {}
    }
    None
}

pub struct App {
    pub config: Config,
    pub client: ApiClient,
    pub store: SessionStore,
    pub session: Session,
    pub router: Router,
    pub scope: ViewScope,
    pub screen: Screen,
    pub prompt: Option<Prompt>,
    pub toasts: Toasts,
    pub busy: Option<&'static str>,
    pub should_quit: bool,
}

impl App {
    /// Builds the app at `start_path` (guarded). Returns the initial load,
    /// if the first view has one.
    pub fn new(config: Config, client: ApiClient, store: SessionStore, session: Session, start_path: &str) -> (App, Option<Action>) {
        let router = Router::start(start_path, &session);
        let (screen, load) = Screen::for_route(router.current());
        let toasts = Toasts::new(config.toast());
        let app = App {
            config,
            client,
            store,
            session,
            router,
            scope: ViewScope::new(),
            screen,
            prompt: None,
            toasts,
            busy: None,
            should_quit: false,
        };
        (app, load.then_some(Action::Load))
    }

    pub fn is_admin(&self) -> bool {
        self.session.user.as_ref().map(User::is_admin).unwrap_or(false)
    }

    fn mount(&mut self, route: Route) -> Option<Action> {
        self.scope.remount();
        self.prompt = None;
        let (screen, load) = Screen::for_route(&route);
        self.screen = screen;
        info!(route = %route, "view mounted");
        load.then_some(Action::Load)
    }

    fn report(&mut self, err: FeedError) {
        match err {
            FeedError::Cancelled => {
                self.scope.remount();
                self.toasts.info("Cancelled");
            }
            err => {
                warn!(error = %err, "action failed");
                self.toasts.error(err.user_message());
            }
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.toasts.expire(now);
        if let Screen::Home(home) = &mut self.screen {
            home.feed.expire_highlight(now);
        }
    }

    /// The composer that typing goes to, if any.
    fn active_composer(&mut self) -> Option<&mut Composer> {
        match &mut self.screen {
            Screen::Compose(c) if c.loaded => Some(&mut c.composer),
            Screen::Replies(r) => match r.focus {
                ReplyFocus::Compose => Some(&mut r.thread.composer),
                ReplyFocus::Edit => r.thread.editing_mut(),
                ReplyFocus::List => None,
            },
            _ => None,
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if ctrl(&key, 'c') {
            return Some(Action::Quit);
        }
        if let Some(prompt) = self.prompt.take() {
            return self.on_prompt_key(prompt, key);
        }
        match &self.screen {
            Screen::Login(_) => self.on_login_key(key),
            Screen::Home(_) => self.on_home_key(key),
            Screen::Compose(_) => self.on_compose_key(key),
            Screen::Notifications(_) => self.on_notifications_key(key),
            Screen::Replies(_) => self.on_replies_key(key),
            Screen::PollForm(_) => self.on_poll_form_key(key),
        }
    }

    fn on_prompt_key(&mut self, prompt: Prompt, key: KeyEvent) -> Option<Action> {
        match prompt {
            Prompt::Confirm(kind) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(Action::Confirmed(kind)),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    match &mut self.screen {
                        Screen::Home(home) => home.feed.cancel_delete(),
                        Screen::Replies(r) => r.thread.cancel_delete(),
                        _ => {}
                    }
                    None
                }
                _ => {
                    self.prompt = Some(Prompt::Confirm(kind));
                    None
                }
            },
            Prompt::Input { kind, mut value } => match key.code {
                KeyCode::Esc => None,
                KeyCode::Enter => self.apply_input(kind, value.trim()),
                KeyCode::Backspace => {
                    value.pop();
                    self.prompt = Some(Prompt::Input { kind, value });
                    None
                }
                KeyCode::Char(c) => {
                    value.push(c);
                    self.prompt = Some(Prompt::Input { kind, value });
                    None
                }
                _ => {
                    self.prompt = Some(Prompt::Input { kind, value });
                    None
                }
            },
            Prompt::Mentions { users, mut cursor } => match key.code {
                KeyCode::Esc => None,
                KeyCode::Enter => {
                    let name = cursor.selected().and_then(|i| users.get(i)).map(|u| u.name.clone());
                    if let (Some(name), Some(composer)) = (name, self.active_composer()) {
                        composer.insert_mention(&name);
                    }
                    None
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    cursor.next(users.len());
                    self.prompt = Some(Prompt::Mentions { users, cursor });
                    None
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    cursor.previous(users.len());
                    self.prompt = Some(Prompt::Mentions { users, cursor });
                    None
                }
                _ => {
                    self.prompt = Some(Prompt::Mentions { users, cursor });
                    None
                }
            },
        }
    }

    fn apply_input(&mut self, kind: InputKind, value: &str) -> Option<Action> {
        if value.is_empty() {
            return None;
        }
        let outcome = match kind {
            InputKind::ImagePath => ImageFile::load(value).map(|file| {
                if let Some(composer) = self.active_composer() {
                    composer.choose_image(file);
                }
                Some(Action::UploadPreview)
            }),
            InputKind::GifUrl => match self.active_composer() {
                Some(composer) => composer.choose_gif(value).map(|_| None),
                None => Ok(None),
            },
        };
        outcome.unwrap_or_else(|err| {
            self.report(err);
            None
        })
    }

    fn on_login_key(&mut self, key: KeyEvent) -> Option<Action> {
        let Screen::Login(form) = &mut self.screen else { return None };
        match key.code {
            KeyCode::Esc => return Some(Action::Quit),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => form.toggle_focus(),
            KeyCode::Enter => match form.focus {
                login::LoginField::LoginId => form.toggle_focus(),
                login::LoginField::Password => return Some(Action::SubmitLogin),
            },
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(c) => form.insert_char(c),
            _ => {}
        }
        None
    }

    fn on_home_key(&mut self, key: KeyEvent) -> Option<Action> {
        let is_admin = self.is_admin();
        let Screen::Home(home) = &mut self.screen else { return None };
        if let Some(mv) = cursor_move(&key) {
            home.move_cursor(mv);
            return None;
        }
        match key.code {
            KeyCode::Char('q') => return Some(Action::Quit),
            KeyCode::Tab => {
                home.focus = match home.focus {
                    HomeFocus::Polls => HomeFocus::Posts,
                    HomeFocus::Posts => HomeFocus::Polls,
                };
            }
            KeyCode::Char('g') => return Some(Action::Load),
            KeyCode::Char('n') => return Some(Action::Navigate(Route::CreatePost)),
            KeyCode::Char('N') => return Some(Action::Navigate(Route::Notifications)),
            KeyCode::Char('L') => return Some(Action::Logout),
            KeyCode::Char('P') if is_admin => return Some(Action::Navigate(Route::CreatePoll)),
            _ => {}
        }
        match home.focus {
            HomeFocus::Polls => {
                let poll_id = home.cursor_poll_id()?;
                match key.code {
                    KeyCode::Left | KeyCode::Char('h') => {
                        let len = home.feed.selected_poll().map(|p| p.options.len()).unwrap_or(0);
                        home.options.previous(len);
                        let idx = home.options.selected().unwrap_or(0);
                        home.choose_option_at(idx);
                    }
                    KeyCode::Right | KeyCode::Char('l') => {
                        let len = home.feed.selected_poll().map(|p| p.options.len()).unwrap_or(0);
                        home.options.next(len);
                        let idx = home.options.selected().unwrap_or(0);
                        home.choose_option_at(idx);
                    }
                    KeyCode::Char(c @ '1'..='9') => {
                        let idx = c.to_digit(10).map(|d| d as usize - 1).unwrap_or(0);
                        home.choose_option_at(idx);
                    }
                    KeyCode::Enter | KeyCode::Char('v') => return Some(Action::SubmitVote),
                    KeyCode::Char('e') if is_admin => return Some(Action::Navigate(Route::EditPoll(poll_id))),
                    KeyCode::Char('d') if is_admin => {
                        home.feed.request_delete(PendingDelete::Poll(poll_id));
                        self.prompt = Some(Prompt::Confirm(Confirm::FeedDelete));
                    }
                    _ => {}
                }
            }
            HomeFocus::Posts => {
                let post_id = home.cursor_post_id()?;
                let author = home.feed.post(post_id).and_then(|p| p.user.clone());
                let me = home.feed.current_user.clone();
                match key.code {
                    KeyCode::Enter | KeyCode::Char('r') => return Some(Action::Navigate(Route::Replies(post_id))),
                    KeyCode::Char('l') => return Some(Action::LikePost(post_id)),
                    KeyCode::Char('p') if home.feed.is_admin() => return Some(Action::PinPost(post_id)),
                    KeyCode::Char('e') => {
                        if me.map(|me| me.owns(author.as_ref())).unwrap_or(false) {
                            return Some(Action::Navigate(Route::EditPost(post_id)));
                        }
                        self.toasts.error("Only the author can edit this post");
                    }
                    KeyCode::Char('d') => {
                        if me.map(|me| me.can_delete(author.as_ref())).unwrap_or(false) {
                            home.feed.request_delete(PendingDelete::Post(post_id));
                            self.prompt = Some(Prompt::Confirm(Confirm::FeedDelete));
                        } else {
                            self.toasts.error("You can only delete your own posts");
                        }
                    }
                    _ => {}
                }
            }
        }
        None
    }

    fn on_compose_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.code == KeyCode::Esc {
            return Some(Action::Back);
        }
        if ctrl(&key, 'o') {
            self.prompt = Some(Prompt::Input { kind: InputKind::ImagePath, value: String::new() });
            return None;
        }
        if ctrl(&key, 'g') {
            self.prompt = Some(Prompt::Input { kind: InputKind::GifUrl, value: String::new() });
            return None;
        }
        let composer = self.active_composer()?;
        composer_key(composer, key)
    }

    fn on_notifications_key(&mut self, key: KeyEvent) -> Option<Action> {
        let Screen::Notifications(screen) = &mut self.screen else { return None };
        let len = screen.list.items.len();
        if let Some(mv) = cursor_move(&key) {
            screen.cursor.apply(mv, len);
            return None;
        }
        match key.code {
            KeyCode::Esc => return Some(Action::Back),
            KeyCode::Char('q') => return Some(Action::Quit),
            KeyCode::Char('g') => return Some(Action::Load),
            KeyCode::Char('C') if len > 0 => {
                self.prompt = Some(Prompt::Confirm(Confirm::ClearNotifications));
            }
            KeyCode::Enter => {
                let id = screen.cursor.selected().and_then(|i| screen.list.items.get(i)).map(|n| n.id)?;
                return Some(Action::OpenNotification(id));
            }
            _ => {}
        }
        None
    }

    fn on_replies_key(&mut self, key: KeyEvent) -> Option<Action> {
        let Screen::Replies(screen) = &mut self.screen else { return None };
        if screen.focus != ReplyFocus::List {
            if key.code == KeyCode::Esc {
                if screen.focus == ReplyFocus::Edit {
                    screen.thread.cancel_editing();
                }
                screen.focus = ReplyFocus::List;
                return None;
            }
            return self.on_compose_key(key);
        }

        let len = screen.thread.replies.len();
        let reply_id = screen.cursor.selected().and_then(|i| screen.thread.replies.get(i)).map(|r| r.id);
        if let Some(mv) = cursor_move(&key) {
            screen.cursor.apply(mv, len);
            return None;
        }
        match key.code {
            KeyCode::Esc => return Some(Action::Back),
            KeyCode::Char('g') => return Some(Action::Load),
            KeyCode::Char('c') | KeyCode::Enter => screen.focus = ReplyFocus::Compose,
            KeyCode::Char('l') => return reply_id.map(Action::LikeReply),
            KeyCode::Char('e') => {
                let id = reply_id?;
                match screen.thread.start_editing(id) {
                    Ok(()) => screen.focus = ReplyFocus::Edit,
                    Err(err) => self.toasts.error(err.user_message()),
                }
            }
            KeyCode::Char('d') => {
                let id = reply_id?;
                let allowed = screen.thread.reply(id).map(|r| screen.thread.can_delete(r)).unwrap_or(false);
                if allowed {
                    screen.thread.request_delete(id);
                    self.prompt = Some(Prompt::Confirm(Confirm::ReplyDelete));
                } else {
                    self.toasts.error("You can only delete your own replies");
                }
            }
            _ => {}
        }
        None
    }

    fn on_poll_form_key(&mut self, key: KeyEvent) -> Option<Action> {
        let Screen::PollForm(screen) = &mut self.screen else { return None };
        if key.code == KeyCode::Esc {
            return Some(Action::Back);
        }
        if !screen.loaded {
            return None;
        }
        let form = &mut screen.form;
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('s') => return Some(Action::SubmitPollForm),
                KeyCode::Char('a') => form.add_option(),
                KeyCode::Char('d') => {
                    if let PollField::Option(i) = form.focus() {
                        if let Err(err) = form.remove_option(i) {
                            self.toasts.error(err.user_message());
                        }
                    }
                }
                _ => {}
            }
            return None;
        }
        match key.code {
            KeyCode::Tab | KeyCode::Down => form.focus_next(),
            KeyCode::BackTab | KeyCode::Up => form.focus_prev(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(c) => form.insert_char(c),
            _ => {}
        }
        None
    }

    /// Runs an action and whatever it leads to, redrawing with a busy
    /// banner before each network call.
    pub async fn dispatch<B, S>(&mut self, terminal: &mut Terminal<B>, events: &mut S, action: Action) -> io::Result<()>
    where
        B: Backend,
        S: Stream<Item = io::Result<Event>> + Unpin,
    {
        let mut next = Some(action);
        while let Some(action) = next.take() {
            if let Some(label) = action.busy_label() {
                self.busy = Some(label);
                terminal.draw(|f| tui::render_app(f, self))?;
            }
            next = self.perform(terminal, events, action).await?;
            self.busy = None;
        }
        Ok(())
    }

    async fn perform<B, S>(&mut self, terminal: &mut Terminal<B>, events: &mut S, action: Action) -> io::Result<Option<Action>>
    where
        B: Backend,
        S: Stream<Item = io::Result<Event>> + Unpin,
    {
        let result = match action {
            Action::Quit => {
                self.should_quit = true;
                Ok(None)
            }
            Action::Navigate(route) => {
                let route = self.router.navigate(route, &self.session).clone();
                Ok(self.mount(route))
            }
            Action::Back => {
                let route = self.router.back(&self.session).clone();
                Ok(self.mount(route))
            }
            Action::Load => self.load(events).await.map(|_| None),
            Action::SubmitLogin => {
                let Screen::Login(form) = &mut self.screen else { return Ok(None) };
                let out = in_flight(events, &self.scope, form.submit(&mut self.client, &self.store)).await;
                match out {
                    Ok(session) => {
                        self.session = session;
                        let route = self.router.replace(Route::home(), &self.session).clone();
                        Ok(self.mount(route))
                    }
                    Err(err) => Err(err),
                }
            }
            Action::Logout => match login::logout(&mut self.client, &self.store) {
                Ok(session) => {
                    self.session = session;
                    let route = self.router.replace(Route::Login, &self.session).clone();
                    Ok(self.mount(route))
                }
                Err(err) => Err(err),
            },
            Action::SubmitVote => {
                let client = &self.client;
                let Screen::Home(home) = &mut self.screen else { return Ok(None) };
                let out = in_flight(events, &self.scope, async { Ok(home.feed.submit_vote(client).await) }).await;
                home.sync_poll_cursor();
                match out {
                    Ok(Ok(())) => {
                        self.toasts.info("Vote recorded");
                        Ok(None)
                    }
                    Ok(Err(failure)) => {
                        self.toasts.error(failure.message());
                        Ok(None)
                    }
                    Err(err) => Err(err),
                }
            }
            Action::LikePost(post_id) => {
                let client = &self.client;
                let Screen::Home(home) = &mut self.screen else { return Ok(None) };
                in_flight(events, &self.scope, home.feed.toggle_like(client, post_id)).await.map(|_| None)
            }
            Action::PinPost(post_id) => {
                let client = &self.client;
                let Screen::Home(home) = &mut self.screen else { return Ok(None) };
                let out = in_flight(events, &self.scope, home.feed.toggle_pin(client, post_id)).await;
                if let Some(idx) = home.feed.posts.iter().position(|p| p.id == post_id) {
                    home.posts.select(Some(idx));
                }
                out.map(|_| None)
            }
            Action::Confirmed(kind) => self.confirm(events, kind).await,
            Action::SubmitComposer => self.submit_composer(events).await,
            Action::UploadPreview => {
                let client = &self.client;
                let composer = match &mut self.screen {
                    Screen::Compose(c) => Some(&mut c.composer),
                    Screen::Replies(r) if r.focus == ReplyFocus::Edit => r.thread.editing_mut(),
                    Screen::Replies(r) => Some(&mut r.thread.composer),
                    _ => None,
                };
                match composer {
                    // the chosen file is still submitted on save when the preview fails
                    Some(composer) => in_flight(events, &self.scope, composer.upload_preview(client)).await.map(|_| None),
                    None => Ok(None),
                }
            }
            Action::OpenEditor => {
                let Some(initial) = self.active_composer().map(|c| c.content().to_string()) else {
                    return Ok(None);
                };
                tui::suspend()?;
                let edited = composer::compose_in_editor(&initial);
                tui::resume()?;
                terminal.clear()?;
                match edited {
                    Ok(text) => {
                        if let Some(composer) = self.active_composer() {
                            composer.set_content(text.trim_end());
                        }
                        Ok(None)
                    }
                    Err(err) => Err(err),
                }
            }
            Action::OpenMentions => {
                let out = in_flight(events, &self.scope, self.client.users()).await;
                out.map(|users| {
                    let cursor = ListCursor::new(users.len());
                    self.prompt = Some(Prompt::Mentions { users, cursor });
                    None
                })
            }
            Action::OpenNotification(id) => {
                let client = &self.client;
                let Screen::Notifications(screen) = &mut self.screen else { return Ok(None) };
                let out = in_flight(events, &self.scope, async { Ok(screen.list.click(client, id).await) }).await;
                match out {
                    Ok(Some(outcome)) => {
                        if let Some(err) = outcome.mark_read_error {
                            self.toasts.error(format!("Could not mark as read: {}", err.user_message()));
                        }
                        Ok(outcome.path.map(|path| Action::Navigate(Route::parse(&path))))
                    }
                    Ok(None) => Ok(None),
                    Err(err) => Err(err),
                }
            }
            Action::LikeReply(reply_id) => {
                let client = &self.client;
                let Screen::Replies(screen) = &mut self.screen else { return Ok(None) };
                in_flight(events, &self.scope, screen.thread.toggle_like(client, reply_id)).await.map(|_| None)
            }
            Action::SubmitPollForm => {
                let client = &self.client;
                let Screen::PollForm(screen) = &mut self.screen else { return Ok(None) };
                let out = in_flight(events, &self.scope, screen.form.submit(client)).await;
                match out {
                    Ok(poll) => {
                        self.toasts.info("Poll saved");
                        Ok(Some(Action::Navigate(Route::Home { highlight: Some(Highlight::Poll(poll.id)) })))
                    }
                    Err(err) => Err(err),
                }
            }
        };

        Ok(result.unwrap_or_else(|err| {
            self.report(err);
            None
        }))
    }

    async fn load<S>(&mut self, events: &mut S) -> Result<(), FeedError>
    where
        S: Stream<Item = io::Result<Event>> + Unpin,
    {
        let client = &self.client;
        let scope = &self.scope;
        let me = self.session.user.clone();
        let is_admin = me.as_ref().map(User::is_admin).unwrap_or(false);

        match &mut self.screen {
            Screen::Login(_) => Ok(()),
            Screen::Home(home) => {
                in_flight(events, scope, home.feed.load_feed(client)).await?;
                home.after_load(self.config.highlight(), Instant::now());
                Ok(())
            }
            Screen::Compose(screen) => {
                let ComposerMode::EditPost(post_id) = screen.composer.mode() else { return Ok(()) };
                let post = in_flight(events, scope, client.post(post_id)).await?;
                if !me.map(|me| me.owns(post.user.as_ref())).unwrap_or(false) {
                    return Err(FeedError::validation("Only the author can edit this post"));
                }
                screen.composer = Composer::edit_post(&post);
                screen.loaded = true;
                Ok(())
            }
            Screen::Notifications(screen) => {
                in_flight(events, scope, screen.list.load(client)).await?;
                screen.cursor.clamp(screen.list.items.len());
                Ok(())
            }
            Screen::Replies(screen) => {
                in_flight(events, scope, screen.thread.load(client)).await?;
                screen.cursor.clamp(screen.thread.replies.len());
                Ok(())
            }
            Screen::PollForm(screen) => {
                if !is_admin {
                    return Err(FeedError::validation("Only admins can manage polls"));
                }
                if let Some(poll_id) = screen.poll_id {
                    let poll = in_flight(events, scope, client.poll(poll_id)).await?;
                    screen.form = PollForm::edit(&poll);
                }
                screen.loaded = true;
                Ok(())
            }
        }
    }

    async fn confirm<S>(&mut self, events: &mut S, kind: Confirm) -> Result<Option<Action>, FeedError>
    where
        S: Stream<Item = io::Result<Event>> + Unpin,
    {
        let client = &self.client;
        match (kind, &mut self.screen) {
            (Confirm::FeedDelete, Screen::Home(home)) => {
                let deleted = in_flight(events, &self.scope, home.feed.confirm_delete(client)).await?;
                home.posts.clamp(home.feed.posts.len());
                home.polls.clamp(home.feed.polls.len());
                home.sync_poll_cursor();
                match deleted {
                    Some(PendingDelete::Post(_)) => self.toasts.info("Post deleted"),
                    Some(PendingDelete::Poll(_)) => self.toasts.info("Poll deleted"),
                    None => {}
                }
                Ok(None)
            }
            (Confirm::ReplyDelete, Screen::Replies(screen)) => {
                let deleted = in_flight(events, &self.scope, screen.thread.confirm_delete(client)).await?;
                screen.cursor.clamp(screen.thread.replies.len());
                if deleted.is_some() {
                    self.toasts.info("Reply deleted");
                }
                Ok(None)
            }
            (Confirm::ClearNotifications, Screen::Notifications(screen)) => {
                in_flight(events, &self.scope, screen.list.clear_all(client)).await?;
                screen.cursor.clamp(0);
                self.toasts.info("Notifications cleared");
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    async fn submit_composer<S>(&mut self, events: &mut S) -> Result<Option<Action>, FeedError>
    where
        S: Stream<Item = io::Result<Event>> + Unpin,
    {
        let client = &self.client;
        match &mut self.screen {
            Screen::Compose(screen) if screen.loaded => {
                let submitted = in_flight(events, &self.scope, screen.composer.submit(client)).await?;
                match submitted {
                    Submitted::Post(post) if screen.composer.mode() == ComposerMode::CreatePost => {
                        self.toasts.info("Post published");
                        Ok(Some(Action::Navigate(Route::Home { highlight: Some(Highlight::Post(post.id)) })))
                    }
                    _ => {
                        self.toasts.info("Post updated");
                        Ok(Some(Action::Back))
                    }
                }
            }
            Screen::Replies(screen) => {
                match screen.focus {
                    ReplyFocus::Edit => {
                        in_flight(events, &self.scope, screen.thread.save_edit(client)).await?;
                        self.toasts.info("Reply updated");
                    }
                    ReplyFocus::Compose => {
                        in_flight(events, &self.scope, screen.thread.create_reply(client)).await?;
                        screen.cursor.last(screen.thread.replies.len());
                        self.toasts.info("Reply posted");
                    }
                    ReplyFocus::List => return Ok(None),
                }
                screen.focus = ReplyFocus::List;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Event loop: terminal input and a tick for toasts and highlights, with
    /// requests awaited in `dispatch`.
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>, first: Option<Action>) -> io::Result<()> {
        let mut events = EventStream::new();
        let mut ticker = tokio::time::interval(TICK);

        if let Some(action) = first {
            self.dispatch(terminal, &mut events, action).await?;
        }

        while !self.should_quit {
            terminal.draw(|f| tui::render_app(f, self))?;

            tokio::select! {
                _ = ticker.tick() => self.on_tick(Instant::now()),
                maybe = events.next() => match maybe {
                    Some(Ok(Event::Key(key))) => {
                        if let Some(action) = self.on_key(key) {
                            self.dispatch(terminal, &mut events, action).await?;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err),
                    None => self.should_quit = true,
                },
            }
        }
        Ok(())
    }
}

pub async fn start_app(config: Config, store: SessionStore, start_path: &str) -> Result<(), FeedError> {
    let session = store.load()?;
    let client = ApiClient::new(&config, &session)?;
    let (mut app, first) = App::new(config, client, store, session, start_path);

    // Setup terminal
    let mut terminal = tui::setup_terminal()?;

    let res = app.run(&mut terminal, first).await;

    // Restore terminal
    tui::restore_terminal(&mut terminal)?;

    if let Err(err) = res {
        error!(error = %err, "terminal loop failed");
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(path: &str, session: Session) -> (App, Option<Action>) {
        let dir = std::env::temp_dir().join("feedtui-app-test");
        let client = ApiClient::with_base("http://127.0.0.1:9", session.bearer()).unwrap();
        App::new(Config::default(), client, SessionStore::new(dir.join("session.json")), session, path)
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn signed_in() -> Session {
        Session::new("tok", User { id: 1, name: "Ana".into(), ..Default::default() })
    }

    #[test]
    fn logged_out_start_lands_on_login() {
        let (app, first) = app("/create-post", Session::default());
        assert!(matches!(app.screen, Screen::Login(_)));
        assert_eq!(first, None);
    }

    #[test]
    fn home_start_requests_load() {
        let (app, first) = app("/?postId=42", signed_in());
        assert!(matches!(app.screen, Screen::Home(_)));
        assert_eq!(first, Some(Action::Load));
    }

    #[test]
    fn composer_keys_edit_text() {
        let (mut app, _) = app("/create-post", signed_in());
        for c in "hi".chars() {
            assert_eq!(app.on_key(press(KeyCode::Char(c))), None);
        }
        let save = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);
        assert_eq!(app.on_key(save), Some(Action::SubmitComposer));
        let Screen::Compose(screen) = &app.screen else { panic!("not composing") };
        assert_eq!(screen.composer.content(), "hi");
        assert_eq!(app.on_key(press(KeyCode::Esc)), Some(Action::Back));
    }

    #[test]
    fn gif_prompt_feeds_composer() {
        let (mut app, _) = app("/create-post", signed_in());
        app.on_key(KeyEvent::new(KeyCode::Char('g'), KeyModifiers::CONTROL));
        assert!(matches!(app.prompt, Some(Prompt::Input { kind: InputKind::GifUrl, .. })));
        for c in "https://g.example/a.gif".chars() {
            app.on_key(press(KeyCode::Char(c)));
        }
        app.on_key(press(KeyCode::Enter));
        assert!(app.prompt.is_none());
        let Screen::Compose(screen) = &app.screen else { panic!("not composing") };
        assert!(screen.composer.has_gif());
    }

    #[test]
    fn paging_keys_move_the_post_cursor() {
        let (mut app, _) = app("/", signed_in());
        let Screen::Home(home) = &mut app.screen else { panic!("not home") };
        home.feed.posts = (1..=15).map(|id| crate::models::Post { id, ..Default::default() }).collect();
        home.posts = ListCursor::new(15);

        let selected = |app: &App| match &app.screen {
            Screen::Home(home) => home.posts.selected(),
            _ => None,
        };
        app.on_key(press(KeyCode::PageDown));
        assert_eq!(selected(&app), Some(10));
        app.on_key(press(KeyCode::End));
        assert_eq!(selected(&app), Some(14));
        app.on_key(press(KeyCode::Char('k')));
        assert_eq!(selected(&app), Some(13));
        app.on_key(press(KeyCode::Home));
        assert_eq!(selected(&app), Some(0));
    }

    #[test]
    fn ctrl_c_always_quits() {
        let (mut app, _) = app("/login", Session::default());
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app.on_key(key), Some(Action::Quit));
    }
}
