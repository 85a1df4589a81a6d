pub mod client;
pub mod config;
pub mod media;
pub mod notification;
pub mod poll;
pub mod post;
pub mod session;
pub mod timestamp;
pub mod user;

// Re-export important structs for convenience
pub use client::ApiClient;
pub use config::Config;
pub use media::{FormFields, ImageFile, MediaEdit};
pub use notification::{Notification, NotificationTarget};
pub use poll::{Poll, PollOption};
pub use post::{Attachment, Post, Reply};
pub use session::{Session, SessionStore};
pub use user::User;
