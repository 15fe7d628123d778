//! # zapconecta
//!
//! Composition root: wires the HTTP adapters from `zc-infra` into the
//! session objects from `zc-app` according to the loaded configuration.
//!
//! ```no_run
//! use zapconecta::{ZapConecta, UserId};
//! use zc_infra::load_config;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let loaded = load_config(None)?;
//! let (runtime, mut shell_events) = ZapConecta::build(UserId::from("user-1"), &loaded)?;
//! runtime.start().await;
//! while let Some(event) = shell_events.recv().await {
//!     // render toasts / refresh views
//!     let _ = event;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;

use zc_app::{AppDeps, ConnectionSession, StatusWatcher};
use zc_core::connection::SessionPolicy;
use zc_core::ports::ChangeFeedPort;
use zc_core::settings::FeedStrategy;
use zc_infra::{ChannelNotifier, EventStreamFeed, LoadedConfig, PairingWebhookClient, StatusApiClient};

pub use zc_app::{ConnectionDomainEvent, ConnectionFacade, SessionSnapshot};
pub use zc_core::connection::{PairingMethod, PairingPayload, SessionState};
pub use zc_core::ids::UserId;
pub use zc_infra::ShellEvent;

/// One user's assembled connection runtime.
pub struct ZapConecta {
    session: ConnectionSession,
    watcher: Arc<StatusWatcher>,
}

impl ZapConecta {
    /// Assemble adapters, session and watcher from loaded configuration.
    ///
    /// The returned receiver carries toasts and refresh requests for
    /// whatever shell embeds this runtime.
    pub fn build(
        user_id: UserId,
        loaded: &LoadedConfig,
    ) -> anyhow::Result<(Self, mpsc::Receiver<ShellEvent>)> {
        let (notifier, shell_events) = ChannelNotifier::new(32);

        let store = Arc::new(StatusApiClient::new(&loaded.app)?);
        let gateway = Arc::new(PairingWebhookClient::new(&loaded.app, &loaded.settings.link)?);

        // The feed only exists when realtime is both configured and
        // reachable by configuration; polling needs no adapter at all.
        let feed: Option<Arc<dyn ChangeFeedPort>> = match loaded.settings.sync.feed_strategy {
            FeedStrategy::Realtime if !loaded.app.feed_url.is_empty() => {
                Some(Arc::new(EventStreamFeed::new(&loaded.app)?))
            }
            FeedStrategy::Realtime => {
                tracing::warn!("realtime feed strategy configured without a feed_url");
                None
            }
            FeedStrategy::Polling => None,
        };

        let deps = AppDeps {
            store: store.clone(),
            gateway,
            notifier: Arc::new(notifier),
            change_feed: feed.clone(),
        };

        let policy = SessionPolicy::from_settings(&loaded.settings.link);
        let session = ConnectionSession::new(user_id, policy, &deps);
        let watcher = StatusWatcher::new(
            loaded.settings.sync.clone(),
            session.clone(),
            store,
            feed,
        );

        Ok((
            Self {
                session,
                watcher: Arc::new(watcher),
            },
            shell_events,
        ))
    }

    /// Begin synchronizing against the remote store.
    pub async fn start(&self) {
        self.watcher.start().await;
    }

    /// Stop the watcher and abort every session-owned timer.
    pub async fn shutdown(&self) {
        self.watcher.stop().await;
        self.session.shutdown().await;
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }
}
