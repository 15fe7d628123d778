//! # zc-infra
//!
//! Infrastructure adapters for ZapConecta: HTTP implementations of the
//! domain ports, the store change-feed subscriber, configuration loading
//! and the channel-backed notifier.

pub mod config;
pub mod feed;
pub mod http;
pub mod notify;

pub use config::{load_config, LoadedConfig};
pub use feed::EventStreamFeed;
pub use http::{PairingWebhookClient, StatusApiClient};
pub use notify::{ChannelNotifier, ShellEvent};
