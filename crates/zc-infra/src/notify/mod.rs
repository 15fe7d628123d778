//! Shell-facing notification plumbing.

pub mod channel_notifier;

pub use channel_notifier::{ChannelNotifier, ShellEvent};
