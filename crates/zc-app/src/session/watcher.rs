//! Status watcher
//!
//! Keeps the session's belief about the remote connection record current.
//! One event source at a time: with `FeedStrategy::Realtime` the store's
//! change feed drives re-fetches and polling only takes over when the feed
//! cannot be (re)established; with `FeedStrategy::Polling` the interval is
//! the sole source. Every notice triggers a full re-fetch; feed payloads
//! are never trusted directly.
//!
//! Fetches carry a monotonic sequence number: a slow response that lost the
//! race to a newer fetch is discarded instead of overwriting fresher state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::AbortHandle;

use crate::session::orchestrator::ConnectionSession;

use zc_core::ports::{ChangeFeedPort, StatusStorePort};
use zc_core::settings::{FeedStrategy, StatusSyncSettings};

/// Orders fetch results without locking: `begin` hands out a sequence
/// number before the request goes out, `try_apply` only lets the result
/// through if nothing newer has been applied meanwhile.
#[derive(Debug, Default)]
pub(crate) struct FetchSequencer {
    next: AtomicU64,
    applied: AtomicU64,
}

impl FetchSequencer {
    pub(crate) fn begin(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn try_apply(&self, seq: u64) -> bool {
        self.applied.fetch_max(seq, Ordering::SeqCst) < seq
    }
}

#[derive(Clone)]
struct WatcherCore {
    settings: StatusSyncSettings,
    session: ConnectionSession,
    store: Arc<dyn StatusStorePort>,
    feed: Option<Arc<dyn ChangeFeedPort>>,
    sequencer: Arc<FetchSequencer>,
}

impl WatcherCore {
    async fn run(self) {
        // Always establish a first belief before settling into a source.
        self.refresh().await;

        match (self.settings.feed_strategy, self.feed.clone()) {
            (FeedStrategy::Realtime, Some(feed)) => {
                match feed.subscribe(self.session.user_id()).await {
                    Ok(mut notices) => {
                        while notices.recv().await.is_some() {
                            self.refresh().await;
                        }
                        tracing::warn!("change feed closed, falling back to polling");
                        self.poll_loop().await;
                    }
                    Err(error) => {
                        tracing::warn!(
                            error = %error,
                            "change feed unavailable, falling back to polling"
                        );
                        self.poll_loop().await;
                    }
                }
            }
            (FeedStrategy::Realtime, None) => {
                tracing::warn!("realtime configured without a change feed, polling instead");
                self.poll_loop().await;
            }
            (FeedStrategy::Polling, _) => self.poll_loop().await,
        }
    }

    async fn poll_loop(&self) {
        let period = Duration::from_secs(self.settings.poll_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        // The first tick of a tokio interval fires immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.refresh().await;
        }
    }

    async fn refresh(&self) {
        let seq = self.sequencer.begin();
        match self.store.latest_for_user(self.session.user_id()).await {
            Ok(Some(record)) => {
                if !self.sequencer.try_apply(seq) {
                    tracing::debug!(seq, "stale status fetch discarded");
                    return;
                }
                if let Err(error) = self.session.record_fetched(&record).await {
                    tracing::error!(error = ?error, "status record handling failed");
                }
            }
            // Pairing never ran for this user; nothing to apply.
            Ok(None) => {}
            Err(error) => {
                // Background path: log, swallow, wait for the next tick.
                tracing::warn!(error = %error, "status fetch failed");
            }
        }
    }
}

/// Owns the background synchronization task for one session.
pub struct StatusWatcher {
    core: WatcherCore,
    task: Mutex<Option<AbortHandle>>,
}

impl StatusWatcher {
    pub fn new(
        settings: StatusSyncSettings,
        session: ConnectionSession,
        store: Arc<dyn StatusStorePort>,
        feed: Option<Arc<dyn ChangeFeedPort>>,
    ) -> Self {
        Self {
            core: WatcherCore {
                settings,
                session,
                store,
                feed,
                sequencer: Arc::new(FetchSequencer::default()),
            },
            task: Mutex::new(None),
        }
    }

    /// Start the watcher. Idempotent: a running watcher stays untouched.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }

        let core = self.core.clone();
        let handle = tokio::spawn(core.run());
        *task = Some(handle.abort_handle());
        tracing::debug!("status watcher started");
    }

    /// Stop the watcher. Idempotent.
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            handle.abort();
            tracing::debug!("status watcher stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::facade::ConnectionFacade;
    use crate::session::testing::{
        stored_record, session_with, MockFeed, MockGateway, MockNotifier, MockStore,
    };
    use tokio::sync::mpsc;
    use zc_core::ids::UserId;
    use zc_core::ports::ChangeNotice;

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn sync_settings(strategy: FeedStrategy) -> StatusSyncSettings {
        StatusSyncSettings {
            feed_strategy: strategy,
            poll_interval_secs: 5,
        }
    }

    fn notifying_session() -> ConnectionSession {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(|_| ());
        session_with(MockStore::new(), MockGateway::new(), notifier)
    }

    #[test]
    fn sequencer_applies_in_order_fetches() {
        let sequencer = FetchSequencer::default();
        let first = sequencer.begin();
        let second = sequencer.begin();
        assert!(sequencer.try_apply(first));
        assert!(sequencer.try_apply(second));
    }

    #[test]
    fn sequencer_discards_the_loser_of_a_race() {
        let sequencer = FetchSequencer::default();
        let slow = sequencer.begin();
        let fast = sequencer.begin();
        // The later fetch returns first.
        assert!(sequencer.try_apply(fast));
        assert!(!sequencer.try_apply(slow));
    }

    #[tokio::test(start_paused = true)]
    async fn polling_applies_the_latest_record_each_interval() {
        let mut store = MockStore::new();
        store
            .expect_latest_for_user()
            .times(1)
            .returning(|_| Ok(Some(stored_record("conn-1", "disconnected"))));
        store
            .expect_latest_for_user()
            .returning(|_| Ok(Some(stored_record("conn-1", "conectado"))));

        let session = notifying_session();
        let watcher = StatusWatcher::new(
            sync_settings(FeedStrategy::Polling),
            session.clone(),
            Arc::new(store),
            None,
        );

        watcher.start().await;
        settle().await;
        assert!(!session.snapshot().await.linked);

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert!(session.snapshot().await.linked);

        watcher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_errors_are_swallowed_until_the_next_tick() {
        let mut store = MockStore::new();
        store
            .expect_latest_for_user()
            .times(1)
            .returning(|_| Err(zc_core::ports::StatusStoreError::Transport("down".into())));
        store
            .expect_latest_for_user()
            .returning(|_| Ok(Some(stored_record("conn-1", "connected"))));

        let session = notifying_session();
        let watcher = StatusWatcher::new(
            sync_settings(FeedStrategy::Polling),
            session.clone(),
            Arc::new(store),
            None,
        );

        watcher.start().await;
        settle().await;
        assert!(!session.snapshot().await.linked);

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert!(session.snapshot().await.linked);

        watcher.stop().await;
    }

    #[tokio::test]
    async fn realtime_notices_trigger_refetches() {
        let (notice_tx, notice_rx) = mpsc::channel::<ChangeNotice>(4);

        let mut feed = MockFeed::new();
        let mut receiver = Some(notice_rx);
        feed.expect_subscribe()
            .times(1)
            .returning(move |_| Ok(receiver.take().expect("single subscription")));

        let mut store = MockStore::new();
        store
            .expect_latest_for_user()
            .times(1)
            .returning(|_| Ok(Some(stored_record("conn-1", "disconnected"))));
        store
            .expect_latest_for_user()
            .returning(|_| Ok(Some(stored_record("conn-1", "Connected"))));

        let session = notifying_session();
        let watcher = StatusWatcher::new(
            sync_settings(FeedStrategy::Realtime),
            session.clone(),
            Arc::new(store),
            Some(Arc::new(feed)),
        );

        watcher.start().await;
        settle().await;
        assert!(!session.snapshot().await.linked);

        notice_tx
            .send(ChangeNotice {
                user_id: UserId::from("user-1"),
            })
            .await
            .expect("watcher listening");
        settle().await;
        assert!(session.snapshot().await.linked);

        watcher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_feed_falls_back_to_polling() {
        let mut feed = MockFeed::new();
        feed.expect_subscribe()
            .returning(|_| Err(anyhow::anyhow!("feed endpoint unreachable")));

        let mut store = MockStore::new();
        store
            .expect_latest_for_user()
            .times(1)
            .returning(|_| Ok(Some(stored_record("conn-1", "disconnected"))));
        store
            .expect_latest_for_user()
            .returning(|_| Ok(Some(stored_record("conn-1", "connected"))));

        let session = notifying_session();
        let watcher = StatusWatcher::new(
            sync_settings(FeedStrategy::Realtime),
            session.clone(),
            Arc::new(store),
            Some(Arc::new(feed)),
        );

        watcher.start().await;
        settle().await;

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert!(session.snapshot().await.linked);

        watcher.stop().await;
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let mut store = MockStore::new();
        store
            .expect_latest_for_user()
            .returning(|_| Ok(None));

        let session = notifying_session();
        let watcher = StatusWatcher::new(
            sync_settings(FeedStrategy::Polling),
            session,
            Arc::new(store),
            None,
        );

        watcher.start().await;
        watcher.start().await;
        settle().await;
        watcher.stop().await;
        watcher.stop().await;
    }
}
