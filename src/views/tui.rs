use std::io;
use std::time::Instant;

use ratatui::{
    backend::Backend,
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
    layout::{Layout, Constraint, Direction, Rect},
    style::{Style, Color, Modifier},
    Terminal, Frame,
    text::Line,
    prelude::Span,
};
use crossterm::{
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    execute,
    event::{DisableMouseCapture, EnableMouseCapture},
};

use crate::controllers::app_controller::{
    App, HomeFocus, HomeScreen, NotificationsScreen, PollFormScreen, Prompt, ReplyFocus, RepliesScreen, Screen,
    Confirm,
};
use crate::controllers::composer::{Composer, ComposerMode, Preview};
use crate::controllers::login::{LoginField, LoginForm};
use crate::controllers::poll_form::{PollField, PollFormMode};
use crate::controllers::poll_widget::VoteState;
use crate::controllers::router::Highlight;
use crate::models::timestamp::format_ago;
use crate::models::{Attachment, Poll, Post, Reply};
use crate::views::widgets::ToastKind;

pub fn setup_terminal() -> io::Result<Terminal<ratatui::backend::CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

pub fn restore_terminal(terminal: &mut Terminal<ratatui::backend::CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()
}

/// Hands the terminal to a child process such as `$EDITOR`.
pub fn suspend() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture)
}

pub fn resume() -> io::Result<()> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)
}

fn title_style() -> Style {
    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn selected_style() -> Style {
    Style::default().bg(Color::Gray).fg(Color::Black).add_modifier(Modifier::BOLD)
}

fn pulse_style() -> Style {
    Style::default().bg(Color::Yellow).fg(Color::Black)
}

pub fn render_app<B: Backend>(f: &mut Frame<B>, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(3), Constraint::Length(1)].as_ref())
        .split(f.size());

    render_header(f, chunks[0], app);

    let now = Instant::now();
    match &mut app.screen {
        Screen::Login(form) => render_login(f, chunks[1], form),
        Screen::Home(home) => render_home(f, chunks[1], home, now),
        Screen::Compose(screen) => {
            if screen.loaded {
                render_composer(f, chunks[1], &screen.composer, true);
            } else {
                render_placeholder(f, chunks[1], "Edit Post", "Loading post...");
            }
        }
        Screen::Notifications(screen) => render_notifications(f, chunks[1], screen),
        Screen::Replies(screen) => render_replies(f, chunks[1], screen),
        Screen::PollForm(screen) => render_poll_form(f, chunks[1], screen),
    }

    render_status(f, chunks[2], app);
    if app.prompt.is_some() {
        render_prompt(f, app);
    }
    render_toasts(f, app);
}

fn render_header<B: Backend>(f: &mut Frame<B>, area: Rect, app: &App) {
    let user = app
        .session
        .user
        .as_ref()
        .map(|u| format!("  {}", u.display_name()))
        .unwrap_or_default();
    let line = Line::from(vec![
        Span::styled("feedtui", title_style()),
        Span::styled(format!("  {}", app.router.current()), dim()),
        Span::raw(user),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn help_text(app: &App) -> &'static str {
    match &app.screen {
        Screen::Login(_) => "Tab switch field  Enter log in  Esc quit",
        Screen::Home(home) => match home.focus {
            HomeFocus::Posts => "j/k move  Tab polls  Enter replies  l like  e edit  d delete  p pin  n new  N notifications  L logout  q quit",
            HomeFocus::Polls => "j/k poll  h/l or 1-9 option  Enter vote  Tab posts  e edit  d delete  P new poll  q quit",
        },
        Screen::Compose(_) => "^S save  ^O image  ^G gif  ^X remove media  ^T mention  ^E editor  Esc back",
        Screen::Notifications(_) => "j/k move  Enter open  C clear all  g refresh  Esc back",
        Screen::Replies(screen) => match screen.focus {
            ReplyFocus::List => "j/k move  c reply  l like  e edit  d delete  g refresh  Esc back",
            _ => "^S send  ^O image  ^G gif  ^X remove media  ^T mention  ^E editor  Esc done",
        },
        Screen::PollForm(_) => "Tab next field  ^A add option  ^D remove option  ^S save  Esc back",
    }
}

fn render_status<B: Backend>(f: &mut Frame<B>, area: Rect, app: &App) {
    let line = match app.busy {
        Some(label) => Line::from(vec![
            Span::styled(label, Style::default().fg(Color::Yellow)),
            Span::styled("  Esc cancel", dim()),
        ]),
        None => Line::from(Span::styled(help_text(app), dim())),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn render_placeholder<B: Backend>(f: &mut Frame<B>, area: Rect, title: &str, text: &str) {
    let p = Paragraph::new(Line::from(Span::styled(text.to_string(), dim())))
        .block(Block::default().title(title.to_string()).borders(Borders::ALL));
    f.render_widget(p, area);
}

fn render_login<B: Backend>(f: &mut Frame<B>, area: Rect, form: &LoginForm) {
    let area = centered_rect(50, 9, area);
    let field = |label: &str, value: String, focused: bool| {
        let style = if focused { title_style() } else { Style::default() };
        Line::from(vec![Span::styled(format!("{:<10}", label), style), Span::raw(value)])
    };
    let lines = vec![
        Line::from(""),
        field("Login ID", form.login_id.clone(), form.focus == LoginField::LoginId),
        Line::from(""),
        field("Password", form.masked_password(), form.focus == LoginField::Password),
    ];
    let p = Paragraph::new(lines).block(Block::default().title("Log in").borders(Borders::ALL));
    f.render_widget(p, area);
}

fn post_lines(post: &Post) -> Vec<Line<'static>> {
    let mut header = vec![Span::styled(
        format!("{}  {}", post.author_name(), format_ago(post.created_at)),
        title_style(),
    )];
    if post.pinned {
        header.push(Span::styled("  [pinned]", Style::default().fg(Color::Magenta)));
    }
    let mut lines = vec![Line::from(header)];
    lines.extend(post.content.lines().map(|l| Line::from(l.to_string())));
    match post.attachment() {
        Attachment::Image(url) => lines.push(Line::from(Span::styled(format!("[image] {}", url), dim()))),
        Attachment::Gif(url) => lines.push(Line::from(Span::styled(format!("[gif] {}", url), dim()))),
        Attachment::None => {}
    }
    let likes = if post.user_liked { "liked" } else { "likes" };
    lines.push(Line::from(Span::styled(
        format!("{} {}  replies {}", likes, post.like_count, post.reply_count),
        dim(),
    )));
    lines.push(Line::from(""));
    lines
}

fn poll_line(poll: &Poll, pulsing: bool) -> Line<'static> {
    let status = match (poll.has_expired, poll.end_at) {
        (Some(true), _) => "ended".to_string(),
        (_, Some(end)) => format!("ends {}", end.format("%Y-%m-%d %H:%M")),
        _ => String::new(),
    };
    let style = if pulsing { pulse_style() } else { Style::default() };
    Line::from(vec![
        Span::styled(poll.title.clone(), style),
        Span::styled(format!("  {}", status), dim()),
    ])
}

fn render_home<B: Backend>(f: &mut Frame<B>, area: Rect, home: &mut HomeScreen, now: Instant) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)].as_ref())
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)].as_ref())
        .split(columns[0]);

    let focused = |on: bool| if on { title_style() } else { Style::default() };

    // polls
    let polls: Vec<ListItem> = home
        .feed
        .polls
        .iter()
        .map(|p| ListItem::new(poll_line(p, home.feed.is_highlighted(Highlight::Poll(p.id), now))))
        .collect();
    let polls_block = Block::default()
        .title(Span::styled("Polls", focused(home.focus == HomeFocus::Polls)))
        .borders(Borders::ALL);
    if polls.is_empty() {
        let text = if home.feed.loaded { "No active polls" } else { "Loading..." };
        f.render_widget(Paragraph::new(Span::styled(text, dim())).block(polls_block), left[0]);
    } else {
        let list = List::new(polls).block(polls_block).highlight_style(selected_style());
        f.render_stateful_widget(list, left[0], &mut home.polls.state);
    }

    render_poll_detail(f, left[1], home);

    // posts
    let posts: Vec<ListItem> = home
        .feed
        .posts
        .iter()
        .map(|p| {
            let item = ListItem::new(post_lines(p));
            if home.feed.is_highlighted(Highlight::Post(p.id), now) { item.style(pulse_style()) } else { item }
        })
        .collect();
    let posts_block = Block::default()
        .title(Span::styled("Feed", focused(home.focus == HomeFocus::Posts)))
        .borders(Borders::ALL);
    if posts.is_empty() {
        let text = if home.feed.loaded { "No posts yet" } else { "Loading..." };
        f.render_widget(Paragraph::new(Span::styled(text, dim())).block(posts_block), columns[1]);
    } else {
        let list = List::new(posts).block(posts_block).highlight_style(selected_style());
        f.render_stateful_widget(list, columns[1], &mut home.posts.state);
    }
}

fn render_poll_detail<B: Backend>(f: &mut Frame<B>, area: Rect, home: &HomeScreen) {
    let block = Block::default().title("Vote").borders(Borders::ALL);
    let (Some(poll), Some(widget)) = (home.feed.selected_poll(), home.feed.widget()) else {
        f.render_widget(block, area);
        return;
    };
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut rows: Vec<Constraint> = vec![Constraint::Length(2)];
    rows.extend(poll.options.iter().map(|_| Constraint::Length(1)));
    rows.push(Constraint::Min(0));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(rows.as_slice())
        .split(inner);

    let description = poll.description.clone().unwrap_or_default();
    f.render_widget(
        Paragraph::new(vec![
            Line::from(Span::styled(poll.title.clone(), title_style())),
            Line::from(Span::styled(description, dim())),
        ]),
        rows[0],
    );

    for (i, option) in poll.options.iter().enumerate() {
        let row = rows[i + 1];
        if widget.shows_results() {
            let percent = poll.percent(option.id);
            let mine = if widget.state() == VoteState::Voted(option.id) { " *" } else { "" };
            let gauge = Gauge::default()
                .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
                .percent(percent.min(100) as u16)
                .label(format!("{} {}% ({}){}", option.text, percent, option.vote_count, mine));
            f.render_widget(gauge, row);
        } else {
            let marker = if widget.selected() == Some(option.id) { "(x)" } else { "( )" };
            let style = if home.options.selected() == Some(i) && home.focus == HomeFocus::Polls {
                selected_style()
            } else {
                Style::default()
            };
            f.render_widget(Paragraph::new(Span::styled(format!("{} {}. {}", marker, i + 1, option.text), style)), row);
        }
    }

    if widget.shows_submit() {
        let hint = if widget.can_submit() { "Enter to vote" } else { "Choose an option" };
        f.render_widget(Paragraph::new(Span::styled(hint, dim())), rows[rows.len() - 1]);
    }
}

fn caret_position(content: &str, caret: Option<usize>) -> (u16, u16) {
    let caret = caret.unwrap_or_else(|| content.chars().count());
    let before: String = content.chars().take(caret).collect();
    let row = before.matches('\n').count();
    let col = before.rsplit('\n').next().map(|l| l.chars().count()).unwrap_or(0);
    (col as u16, row as u16)
}

fn render_composer<B: Backend>(f: &mut Frame<B>, area: Rect, composer: &Composer, focused: bool) {
    let title = match composer.mode() {
        ComposerMode::CreatePost => "New Post".to_string(),
        ComposerMode::EditPost(id) => format!("Edit Post #{}", id),
        ComposerMode::CreateReply(_) => "Reply".to_string(),
        ComposerMode::EditReply(id) => format!("Edit Reply #{}", id),
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)].as_ref())
        .split(area);

    let lines: Vec<Line> = composer.content().split('\n').map(|l| Line::from(l.to_string())).collect();
    let border = if focused { title_style() } else { Style::default() };
    let editor = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL).border_style(border));
    f.render_widget(editor, chunks[0]);

    let attachment = match composer.preview() {
        Preview::None => Span::styled("No attachment", dim()),
        Preview::NewImage { file_name, url: None } => Span::raw(format!("[image] {} (uploading preview)", file_name)),
        Preview::NewImage { file_name, url: Some(url) } => Span::raw(format!("[image] {} {}", file_name, url)),
        Preview::Image(url) => Span::raw(format!("[image] {}", url)),
        Preview::Gif(url) => Span::raw(format!("[gif] {}", url)),
    };
    f.render_widget(
        Paragraph::new(Line::from(attachment)).block(Block::default().title("Attachment").borders(Borders::ALL)),
        chunks[1],
    );

    if focused {
        let (col, row) = caret_position(composer.content(), composer.caret());
        let x = chunks[0].x + 1 + col.min(chunks[0].width.saturating_sub(3));
        let y = chunks[0].y + 1 + row.min(chunks[0].height.saturating_sub(3));
        f.set_cursor(x, y);
    }
}

fn render_notifications<B: Backend>(f: &mut Frame<B>, area: Rect, screen: &mut NotificationsScreen) {
    let block = Block::default()
        .title(format!("Notifications ({} unread)", screen.list.unread()))
        .borders(Borders::ALL);
    if screen.list.items.is_empty() {
        let text = if screen.list.loaded { "No notifications" } else { "Loading..." };
        f.render_widget(Paragraph::new(Span::styled(text, dim())).block(block), area);
        return;
    }
    let items: Vec<ListItem> = screen
        .list
        .items
        .iter()
        .map(|n| {
            let marker = if n.is_read { "  " } else { "* " };
            let style = if n.is_read { dim() } else { Style::default().add_modifier(Modifier::BOLD) };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Yellow)),
                Span::styled(format!("{} ", n.actor_name), style),
                Span::styled(n.action_text().to_string(), style),
                Span::styled(format!("  {}", format_ago(n.created_at)), dim()),
            ]))
        })
        .collect();
    let list = List::new(items).block(block).highlight_style(selected_style());
    f.render_stateful_widget(list, area, &mut screen.cursor.state);
}

fn reply_lines(reply: &Reply) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        format!("{}  {}", reply.author_name(), format_ago(reply.created_at)),
        title_style(),
    ))];
    lines.extend(reply.content.lines().map(|l| Line::from(format!("  {}", l))));
    match reply.attachment() {
        Attachment::Image(url) => lines.push(Line::from(Span::styled(format!("  [image] {}", url), dim()))),
        Attachment::Gif(url) => lines.push(Line::from(Span::styled(format!("  [gif] {}", url), dim()))),
        Attachment::None => {}
    }
    lines.push(Line::from(Span::styled(format!("  likes {}", reply.like_count), dim())));
    lines
}

fn render_replies<B: Backend>(f: &mut Frame<B>, area: Rect, screen: &mut RepliesScreen) {
    let composing = screen.focus != ReplyFocus::List;
    let constraints = if composing {
        [Constraint::Length(6), Constraint::Min(3), Constraint::Length(9)]
    } else {
        [Constraint::Length(6), Constraint::Min(3), Constraint::Length(0)]
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints.as_ref())
        .split(area);

    match &screen.thread.post {
        Some(post) => {
            let p = Paragraph::new(post_lines(post))
                .wrap(Wrap { trim: false })
                .block(Block::default().title("Post").borders(Borders::ALL));
            f.render_widget(p, chunks[0]);
        }
        None => render_placeholder(f, chunks[0], "Post", "Loading..."),
    }

    let block = Block::default()
        .title(format!("Replies ({})", screen.thread.replies.len()))
        .borders(Borders::ALL);
    if screen.thread.replies.is_empty() {
        f.render_widget(Paragraph::new(Span::styled("No replies yet", dim())).block(block), chunks[1]);
    } else {
        let editing = screen.thread.editing_id();
        let items: Vec<ListItem> = screen
            .thread
            .replies
            .iter()
            .map(|r| {
                let mut lines = reply_lines(r);
                if editing == Some(r.id) {
                    lines.push(Line::from(Span::styled("  [editing]", pulse_style())));
                }
                ListItem::new(lines)
            })
            .collect();
        let list = List::new(items).block(block).highlight_style(selected_style());
        f.render_stateful_widget(list, chunks[1], &mut screen.cursor.state);
    }

    if composing {
        let composer = match screen.focus {
            ReplyFocus::Edit => screen.thread.editing(),
            _ => Some(&screen.thread.composer),
        };
        if let Some(composer) = composer {
            render_composer(f, chunks[2], composer, true);
        }
    }
}

fn render_poll_form<B: Backend>(f: &mut Frame<B>, area: Rect, screen: &PollFormScreen) {
    let form = &screen.form;
    let title = match form.mode() {
        PollFormMode::Create => "New Poll".to_string(),
        PollFormMode::Edit(id) => format!("Edit Poll #{}", id),
    };
    if !screen.loaded {
        render_placeholder(f, area, &title, "Loading...");
        return;
    }
    let row = |label: String, value: &str, field: PollField| {
        let style = if form.focus() == field { title_style() } else { Style::default() };
        Line::from(vec![Span::styled(format!("{:<14}", label), style), Span::raw(value.to_string())])
    };
    let mut lines = vec![
        row("Title".into(), &form.title, PollField::Title),
        row("Description".into(), &form.description, PollField::Description),
        row("Ends (UTC)".into(), &form.end_at, PollField::EndAt),
        Line::from(Span::styled("              YYYY-MM-DDTHH:MM", dim())),
        Line::from(""),
    ];
    match form.mode() {
        PollFormMode::Create => {
            for (i, option) in form.options().iter().enumerate() {
                lines.push(row(format!("Option {}", i + 1), option, PollField::Option(i)));
            }
        }
        PollFormMode::Edit(_) => {
            lines.push(Line::from(Span::styled("Options cannot be changed once a poll exists", dim())));
            lines.extend(form.options().iter().map(|o| Line::from(format!("  - {}", o))));
        }
    }
    let p = Paragraph::new(lines).block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(p, area);
}

fn render_prompt<B: Backend>(f: &mut Frame<B>, app: &mut App) {
    let Some(prompt) = app.prompt.as_mut() else { return };
    match prompt {
        Prompt::Confirm(kind) => {
            let question = match (kind, &app.screen) {
                (Confirm::FeedDelete, Screen::Home(home)) => {
                    home.feed.pending_delete().map(|d| d.prompt()).unwrap_or("Delete?")
                }
                (Confirm::ReplyDelete, _) => "Delete this reply?",
                (Confirm::ClearNotifications, _) => "Clear all notifications?",
                _ => "Are you sure?",
            };
            let area = centered_rect(40, 5, f.size());
            f.render_widget(Clear, area);
            let p = Paragraph::new(vec![
                Line::from(question),
                Line::from(Span::styled("y confirm   n cancel", dim())),
            ])
            .block(Block::default().title("Confirm").borders(Borders::ALL));
            f.render_widget(p, area);
        }
        Prompt::Input { kind, value } => {
            let area = centered_rect(60, 3, f.size());
            f.render_widget(Clear, area);
            let p = Paragraph::new(Line::from(value.clone()))
                .block(Block::default().title(kind.title()).borders(Borders::ALL));
            f.render_widget(p, area);
            let col = value.chars().count() as u16;
            f.set_cursor(area.x + 1 + col.min(area.width.saturating_sub(3)), area.y + 1);
        }
        Prompt::Mentions { users, cursor } => {
            let height = (users.len() as u16 + 2).clamp(3, 12);
            let area = centered_rect(40, height, f.size());
            f.render_widget(Clear, area);
            let items: Vec<ListItem> = users
                .iter()
                .map(|u| ListItem::new(Line::from(format!("@{}", u.display_name()))))
                .collect();
            let list = List::new(items)
                .block(Block::default().title("Mention").borders(Borders::ALL))
                .highlight_style(selected_style());
            f.render_stateful_widget(list, area, &mut cursor.state);
        }
    }
}

fn render_toasts<B: Backend>(f: &mut Frame<B>, app: &App) {
    let size = f.size();
    for (i, toast) in app.toasts.iter().enumerate() {
        let width = toast_width(&toast.text, size.width);
        let y = 1 + (i as u16) * 3;
        if y + 3 > size.height {
            break;
        }
        let area = Rect::new(size.width.saturating_sub(width), y, width, 3);
        let color = match toast.kind {
            ToastKind::Info => Color::Green,
            ToastKind::Error => Color::Red,
        };
        f.render_widget(Clear, area);
        let p = Paragraph::new(Line::from(toast.text.clone()))
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(color)));
        f.render_widget(p, area);
    }
}

/// Text plus borders and padding, never wider than the screen.
fn toast_width(text: &str, max: u16) -> u16 {
    u16::try_from(text.chars().count())
        .unwrap_or(u16::MAX)
        .saturating_add(4)
        .min(max)
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let width = r.width * percent_x / 100;
    let height = height.min(r.height);
    Rect::new(
        r.x + (r.width.saturating_sub(width)) / 2,
        r.y + (r.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}
