mod health;
mod websocket;

pub use health::{health_handler, health_live_handler, metrics_handler};
pub use websocket::chat_websocket_handler;
