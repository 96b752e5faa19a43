//! Centralized message management system for the aperture application.
//!
//! Every user-facing string quoted by the design (log lines, CLI prompts,
//! summaries) is a variant of [`Message`], rendered once through its
//! `Display` impl. Tests assert against the `Message` variant rather than a
//! hand-typed string, so wording cannot drift between production code and
//! the test suite.
//!
//! ## Usage
//!
//! ```rust
//! use aperture::libs::messages::{Message, success};
//! use aperture::msg_info;
//!
//! msg_info!(Message::AllAssetsDownloaded);
//! println!("{}", success(Message::ConfigSaved));
//! ```

pub mod display;
pub mod macros;
pub mod types;

pub use types::Message;

/// Prefixes a message with a green checkmark.
pub fn success(msg: Message) -> String {
    format!("✅ {}", msg)
}

/// Prefixes a message with a red X.
pub fn error(msg: Message) -> String {
    format!("❌ {}", msg)
}

/// Prefixes a message with a warning triangle.
pub fn warning(msg: Message) -> String {
    format!("⚠️  {}", msg)
}

/// Prefixes a message with an info icon.
pub fn info(msg: Message) -> String {
    format!("ℹ️  {}", msg)
}

/// Wraps a message with blank lines for emphasis.
pub fn wrap_msg(msg: Message) -> String {
    format!("\n{}\n", msg)
}
