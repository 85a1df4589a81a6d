use std::env;
use std::fs::OpenOptions;
use std::io::{self, BufRead};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use feedtui::cli::{Command, Flags};
use feedtui::controllers::composer::{compose_in_editor, Composer, ComposerMode, Submitted};
use feedtui::controllers::login;
use feedtui::controllers::start_app;
use feedtui::models::config::cache_dir;
use feedtui::models::timestamp::format_ago;
use feedtui::models::{ApiClient, Config, ImageFile, SessionStore};

/// The TUI owns the terminal, so logs go to a file in the cache directory.
fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_env("FEEDTUI_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let dir = cache_dir().context("Could not determine cache directory")?;
    std::fs::create_dir_all(&dir).context("Failed to create cache directory")?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("feedtui.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    Ok(())
}

fn read_password() -> Result<String> {
    if let Ok(password) = env::var("FEEDTUI_PASSWORD") {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn fetch(client: &ApiClient) -> Result<()> {
    let (polls, posts) = tokio::try_join!(client.polls(), client.posts())?;
    if polls.is_empty() {
        println!("No active polls");
    }
    for poll in &polls {
        println!("[poll #{}] {}", poll.id, poll.title);
        for option in &poll.options {
            let mine = if poll.user_vote_option_id == Some(option.id) { " *" } else { "" };
            if poll.has_voted() {
                println!("    {} {}% ({}){}", option.text, poll.percent(option.id), option.vote_count, mine);
            } else {
                println!("    {}", option.text);
            }
        }
    }
    println!();
    if posts.is_empty() {
        println!("No posts yet");
    }
    for post in &posts {
        let pin = if post.pinned { " [pinned]" } else { "" };
        println!("#{} {} {}{}", post.id, post.author_name(), format_ago(post.created_at), pin);
        println!("    {}", post.content.replace('\n', "\n    "));
        println!("    likes {}  replies {}", post.like_count, post.reply_count);
    }
    Ok(())
}

async fn notifications(client: &ApiClient) -> Result<()> {
    let items = client.notifications().await?;
    if items.is_empty() {
        println!("No notifications");
    }
    for n in items {
        let unread = if n.is_read { " " } else { "*" };
        println!("{} {} {}  {}", unread, n.actor_name, n.action_text(), format_ago(n.created_at));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    //Get Flags
    let flags = Flags::from_args();
    init_tracing()?;

    let mut config = Config::load().context("Failed to load config")?;
    if let Some(url) = &flags.api_url {
        config.api_url = url.clone();
        config.validate()?;
    }
    let store = SessionStore::default_location()?;
    let session = store.load()?;
    info!(api_url = %config.api_url, command = ?flags.command, "starting");

    match flags.command.clone() {
        // the app builds its own client from the stored session
        None | Some(Command::Open { .. }) => {
            start_app(config, store, flags.start_path()).await?;
        }
        Some(Command::Login { login_id }) => {
            let mut client = ApiClient::new(&config, &session)?;
            let password = read_password()?;
            let session = login::login(&mut client, &store, &login_id, &password)
                .await
                .context("Login failed")?;
            let name = session.user.as_ref().map(|u| u.display_name().to_string()).unwrap_or_default();
            println!("Logged in as {}", name);
        }
        Some(Command::Logout) => {
            let mut client = ApiClient::new(&config, &session)?;
            login::logout(&mut client, &store)?;
            println!("Logged out");
        }
        Some(command) if !session.is_authenticated() => {
            bail!("Not logged in; run `feedtui login <login_id>` before `{:?}`", command);
        }
        Some(Command::Post { text, image, gif }) => {
            let client = ApiClient::new(&config, &session)?;
            let mut composer = Composer::new(ComposerMode::CreatePost);
            let text = match text {
                Some(text) => text,
                None => compose_in_editor("")?,
            };
            composer.set_content(text.trim_end());
            if let Some(path) = image {
                composer.choose_image(ImageFile::load(&path)?);
            }
            if let Some(url) = gif {
                composer.choose_gif(&url)?;
            }
            if let Submitted::Post(post) = composer.submit(&client).await? {
                println!("Posted #{}", post.id);
            }
        }
        Some(Command::Fetch) => fetch(&ApiClient::new(&config, &session)?).await?,
        Some(Command::Notifications) => notifications(&ApiClient::new(&config, &session)?).await?,
    }
    Ok(())
}
