//! HTTP adapters for the remote store and the automation-service webhooks.

pub mod pairing_webhook;
pub mod status_api;

pub use pairing_webhook::PairingWebhookClient;
pub use status_api::StatusApiClient;
