use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// User-facing toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Outbound surface for user feedback and shell signals.
#[async_trait]
pub trait NotifierPort: Send + Sync {
    async fn notify(&self, notice: Notice);

    /// Ask the embedding shell to refresh its cached views (the original
    /// product reloads the page here).
    async fn request_refresh(&self);
}
