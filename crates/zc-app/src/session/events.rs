use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use zc_core::connection::SessionState;

/// Everything a shell needs to render the link flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub state: SessionState,
    pub phone_input: String,
    pub time_left: u32,
    pub is_processing: bool,
    pub linked: bool,
    pub linked_phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionDomainEvent {
    /// The session moved; `snapshot` is the full post-transition view.
    SessionChanged { snapshot: SessionSnapshot },
}

#[async_trait]
pub trait ConnectionEventPort: Send + Sync {
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<ConnectionDomainEvent>>;
}
