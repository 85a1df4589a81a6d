pub mod app_controller;
pub mod composer;
pub mod feed;
pub mod login;
pub mod notifications;
pub mod poll_form;
pub mod poll_widget;
pub mod replies;
pub mod router;
pub mod scope;

// Re-export key types
pub use app_controller::{start_app, App};
pub use feed::FeedViewModel;
pub use router::{guard, Route, Router};
