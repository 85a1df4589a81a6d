pub mod models;
pub mod views;
pub mod controllers;
pub mod cli;
pub mod error;

// Re-exports for convenience
pub use models::{ApiClient, Config, Poll, Post, Session, SessionStore};
pub use controllers::start_app;
pub use error::FeedError;
