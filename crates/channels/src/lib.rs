//! Chat channel implementations for ThreadClaw.
//!
//! A channel relays messages between a chat platform and the dispatcher.
//! Only the terminal channel ships today:
//!
//! - **CLI**: interactive terminal chat (stdin/stdout)

pub mod cli;

pub use cli::CliChannel;
