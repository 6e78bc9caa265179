//! Notifier Adapters
//!
//! Implementations of the notifier port.
//!
//! - [`log`]: tracing output, always enabled
//! - [`discord`]: embeds and the live banner message
//! - [`telegram`]: Markdown chat messages

pub mod discord;
pub mod log;
pub mod telegram;

pub use discord::DiscordNotifier;
pub use log::LogNotifier;
pub use telegram::TelegramNotifier;
