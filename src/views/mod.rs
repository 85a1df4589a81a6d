pub mod tui;
pub mod widgets;

pub use widgets::{CursorMove, ListCursor, Toasts};
