//! Request handlers.

pub mod events;
pub mod health;
pub mod videos;

pub use events::subscribe_events;
pub use health::health;
pub use videos::{create_video, get_video, list_windows};
