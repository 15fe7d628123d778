//! Mock implementations of the connection ports for unit testing.
//!
//! Uses `mockall` so session and watcher tests can run without any real
//! store, webhook service or shell.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use tokio::sync::mpsc;

use crate::deps::AppDeps;
use crate::session::orchestrator::ConnectionSession;

use zc_core::connection::{ConnectionRecord, PairingPayload, SessionPolicy};
use zc_core::ids::{ConnectionId, UserId};
use zc_core::ports::{
    ChangeFeedPort, ChangeNotice, Notice, NotifierPort, PairingGatewayError, PairingGatewayPort,
    PairingTicket, StatusStoreError, StatusStorePort,
};

mock! {
    pub Store {}

    #[async_trait]
    impl StatusStorePort for Store {
        async fn latest_for_user(
            &self,
            user: &UserId,
        ) -> Result<Option<ConnectionRecord>, StatusStoreError>;
        async fn find_connection_id(
            &self,
            user: &UserId,
        ) -> Result<Option<ConnectionId>, StatusStoreError>;
    }
}

mock! {
    pub Gateway {}

    #[async_trait]
    impl PairingGatewayPort for Gateway {
        async fn begin_pairing(
            &self,
            ticket: &PairingTicket,
        ) -> Result<PairingPayload, PairingGatewayError>;
        async fn disconnect(&self, user: &UserId) -> Result<bool, PairingGatewayError>;
    }
}

mock! {
    pub Notifier {}

    #[async_trait]
    impl NotifierPort for Notifier {
        async fn notify(&self, notice: Notice);
        async fn request_refresh(&self);
    }
}

mock! {
    pub Feed {}

    #[async_trait]
    impl ChangeFeedPort for Feed {
        async fn subscribe(
            &self,
            user: &UserId,
        ) -> anyhow::Result<mpsc::Receiver<ChangeNotice>>;
    }
}

/// Session over mock ports, default policy, no change feed.
pub fn session_with(
    store: MockStore,
    gateway: MockGateway,
    notifier: MockNotifier,
) -> ConnectionSession {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let deps = AppDeps {
        store: Arc::new(store),
        gateway: Arc::new(gateway),
        notifier: Arc::new(notifier),
        change_feed: None,
    };
    ConnectionSession::new(UserId::from("user-1"), SessionPolicy::default(), &deps)
}

pub fn stored_record(id: &str, status: &str) -> ConnectionRecord {
    ConnectionRecord {
        id: ConnectionId::from(id),
        status: Some(status.to_string()),
        phone: Some("+5511946617052".to_string()),
    }
}
