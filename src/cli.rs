use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Clone, PartialEq, Eq, Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session (password from FEEDTUI_PASSWORD or stdin)
    Login {
        login_id: String,
    },
    /// Forget the stored session
    Logout,
    /// Publish a post; opens $EDITOR when no text is given
    Post {
        text: Option<String>,
        #[arg(long, conflicts_with = "gif")]
        image: Option<PathBuf>,
        #[arg(long)]
        gif: Option<String>,
    },
    /// Print polls and posts
    Fetch,
    /// Print notifications
    Notifications,
    /// Start the TUI at a path such as /notifications or /posts/42
    Open {
        path: String,
    },
}

#[derive(Parser, Debug, Default)]
#[command(
    about = concat!(env!("CARGO_CRATE_NAME"), " - terminal client for the team feed"),
    version
)]
pub struct Flags {
    /// Backend API base URL (overrides the config file)
    #[arg(long, global = true, env = "FEEDTUI_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Flags {
    /// Parse from `std::env::args_os()`, [exit][clap::Error::exit] on error.
    pub fn from_args() -> Self {
        Self::parse()
    }

    pub fn start_path(&self) -> &str {
        match &self.command {
            Some(Command::Open { path }) => path,
            _ => "/",
        }
    }
}
