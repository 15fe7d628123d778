use async_trait::async_trait;

use crate::connection::ConnectionRecord;
use crate::ids::{ConnectionId, UserId};
use crate::ports::errors::StatusStoreError;

/// Read side of the remote status store.
///
/// The store is owned by the external automation service; this system only
/// ever reads the latest record per user. Writes happen indirectly through
/// the pairing webhook.
#[async_trait]
pub trait StatusStorePort: Send + Sync {
    /// Most recent connection record for the user (created_at descending),
    /// or `None` when pairing has never run for them.
    async fn latest_for_user(
        &self,
        user: &UserId,
    ) -> Result<Option<ConnectionRecord>, StatusStoreError>;

    /// Connection-record id to echo on the pairing webhook, if one exists.
    async fn find_connection_id(
        &self,
        user: &UserId,
    ) -> Result<Option<ConnectionId>, StatusStoreError>;
}
