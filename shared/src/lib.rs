pub mod api;
pub mod format;
pub mod models;

pub use api::{BroadcastRequest, OutgoingMessage};
pub use format::{describe_window, Heading, MessageFormatter, DEFAULT_MAX_EVENTS_PER_MESSAGE};
pub use models::{ConnpassEvent, EventSeries, SearchResponse};
