/// Free-text command handlers and shared handler state
pub mod handlers;
/// Chunked replies, resilient sends and the relay sink
pub mod messaging;

pub use handlers::AppState;
pub use messaging::TelegramSink;
