use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::ids::UserId;

/// A change happened on the user's connection rows.
///
/// Carries no trusted payload: consumers must re-fetch through the status
/// store, never act on feed contents directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub user_id: UserId,
}

/// Push source of store-change notifications, filtered to one user's rows.
#[async_trait]
pub trait ChangeFeedPort: Send + Sync {
    /// Open a subscription. The receiver closes when the feed is lost and
    /// cannot be re-established; the watcher then falls back to polling.
    async fn subscribe(&self, user: &UserId) -> anyhow::Result<mpsc::Receiver<ChangeNotice>>;
}
