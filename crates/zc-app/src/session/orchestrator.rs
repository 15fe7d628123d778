//! Connection session orchestrator
//!
//! Owns the link-session state machine and connects it to the outside
//! world: webhook calls, the status store, user notices and the
//! session-owned timers.
//!
//! # Architecture
//!
//! ```text
//! Shell calls / store fetches / timer ticks
//!   ↓
//! ConnectionSession (converts to SessionEvents)
//!   ↓
//! LinkSessionMachine (pure state transitions)
//!   ↓
//! SessionActions (executed here)
//!   ↓
//! Webhook gateway / notifier / spawned timers
//! ```
//!
//! Timers are cancellable spawned tasks keyed by kind; they are started and
//! stopped by state transitions, never by shell lifecycle.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::AbortHandle;
use tracing::{info_span, Instrument};

use crate::deps::AppDeps;
use crate::session::events::{ConnectionDomainEvent, ConnectionEventPort, SessionSnapshot};
use crate::session::facade::ConnectionFacade;

use zc_core::connection::{
    ConnectionRecord, LinkSessionMachine, PairingFailure, PairingMethod, SessionAction,
    SessionEvent, SessionPolicy,
};
use zc_core::ids::{ConnectionId, SessionId, UserId};
use zc_core::ports::{
    Notice, NotifierPort, PairingGatewayError, PairingGatewayPort, PairingTicket, StatusStorePort,
};

/// Timers the session may own at any moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TimerKind {
    /// One tick per second while a QR code is pending.
    Countdown,
    /// Delayed refresh signal after a confirmed disconnect.
    Refresh,
}

/// The connection session.
///
/// One instance per signed-in user. All fields are shared handles, so the
/// session can be cloned into spawned tasks cheaply.
#[derive(Clone)]
pub struct ConnectionSession {
    session_id: SessionId,
    user_id: UserId,
    machine: Arc<Mutex<LinkSessionMachine>>,
    store: Arc<dyn StatusStorePort>,
    gateway: Arc<dyn PairingGatewayPort>,
    notifier: Arc<dyn NotifierPort>,
    timers: Arc<Mutex<HashMap<TimerKind, AbortHandle>>>,
    event_senders: Arc<Mutex<Vec<mpsc::Sender<ConnectionDomainEvent>>>>,
    connection_id: Arc<RwLock<Option<ConnectionId>>>,
}

impl ConnectionSession {
    pub fn new(user_id: UserId, policy: SessionPolicy, deps: &AppDeps) -> Self {
        Self {
            session_id: SessionId::generate(),
            user_id,
            machine: Arc::new(Mutex::new(LinkSessionMachine::with_policy(policy))),
            store: deps.store.clone(),
            gateway: deps.gateway.clone(),
            notifier: deps.notifier.clone(),
            timers: Arc::new(Mutex::new(HashMap::new())),
            event_senders: Arc::new(Mutex::new(Vec::new())),
            connection_id: Arc::new(RwLock::new(None)),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Feed the latest store record into the machine. Called by the status
    /// watcher; also caches the connection-record id for pairing calls.
    pub(crate) async fn record_fetched(&self, record: &ConnectionRecord) -> Result<()> {
        {
            let mut cached = self.connection_id.write().await;
            *cached = Some(record.id.clone());
        }
        self.apply(SessionEvent::StatusFetched {
            connected: record.is_connected(),
            phone: record.phone.clone(),
        })
        .await
    }

    /// Abort every session-owned timer. Call on teardown.
    pub async fn shutdown(&self) {
        let mut timers = self.timers.lock().await;
        for (_kind, handle) in timers.drain() {
            handle.abort();
        }
    }

    /// Run one event through the machine and execute the produced actions.
    ///
    /// The snapshot is emitted before the actions run: `CancelCountdown`
    /// may abort the very task executing this call, and the state update
    /// must not be lost with it.
    fn apply<'a>(
        &'a self,
        event: SessionEvent,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let actions = {
                let mut machine = self.machine.lock().await;
                let (_state, actions) = machine.handle_event(event);
                actions
            };

            self.emit_snapshot().await;

            for action in actions {
                self.execute_action(action).await?;
            }
            Ok(())
        })
    }

    async fn execute_action(&self, action: SessionAction) -> Result<()> {
        match action {
            SessionAction::CallPairing { phone, method } => {
                let session = self.clone();
                tokio::spawn(async move {
                    let event = session.run_pairing_call(phone, method).await;
                    if let Err(error) = session.apply(event).await {
                        tracing::error!(error = ?error, "pairing result handling failed");
                    }
                });
            }

            SessionAction::CallDisconnect => {
                let session = self.clone();
                tokio::spawn(async move {
                    let event = session.run_disconnect_call().await;
                    if let Err(error) = session.apply(event).await {
                        tracing::error!(error = ?error, "disconnect result handling failed");
                    }
                });
            }

            SessionAction::StartCountdown { seconds } => {
                let mut timers = self.timers.lock().await;
                if let Some(handle) = timers.remove(&TimerKind::Countdown) {
                    handle.abort();
                }

                let session = self.clone();
                let handle = tokio::spawn(async move {
                    let mut interval = tokio::time::interval(Duration::from_secs(1));
                    // The first tick of a tokio interval fires immediately.
                    interval.tick().await;
                    loop {
                        interval.tick().await;
                        if let Err(error) = session.apply(SessionEvent::CountdownTick).await {
                            tracing::error!(error = ?error, "countdown tick failed");
                        }
                    }
                });
                timers.insert(TimerKind::Countdown, handle.abort_handle());
                tracing::debug!(session_id = %self.session_id, seconds, "countdown started");
            }

            SessionAction::CancelCountdown => {
                let mut timers = self.timers.lock().await;
                if let Some(handle) = timers.remove(&TimerKind::Countdown) {
                    handle.abort();
                    tracing::debug!(session_id = %self.session_id, "countdown stopped");
                }
            }

            SessionAction::Notify { level, message } => {
                self.notifier.notify(Notice { level, message }).await;
            }

            SessionAction::ScheduleRefresh { delay_secs } => {
                let mut timers = self.timers.lock().await;
                if let Some(handle) = timers.remove(&TimerKind::Refresh) {
                    handle.abort();
                }

                let notifier = self.notifier.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                    notifier.request_refresh().await;
                });
                timers.insert(TimerKind::Refresh, handle.abort_handle());
            }

            SessionAction::LogTransition {
                old_state,
                event,
                new_state,
            } => {
                tracing::debug!(
                    session_id = %self.session_id,
                    %old_state,
                    %event,
                    %new_state,
                    "session transition"
                );
            }

            SessionAction::NoOp => {}
        }
        Ok(())
    }

    async fn run_pairing_call(&self, phone: String, method: PairingMethod) -> SessionEvent {
        let span = info_span!(
            "session.pairing",
            session_id = %self.session_id,
            user_id = %self.user_id
        );
        async {
            let connection_id = self.resolve_connection_id().await;
            let ticket = PairingTicket {
                phone,
                method,
                user_id: self.user_id.clone(),
                connection_id,
            };

            match self.gateway.begin_pairing(&ticket).await {
                Ok(payload) => SessionEvent::PairingIssued { payload },
                Err(error) => {
                    tracing::warn!(error = %error, "pairing webhook failed");
                    SessionEvent::PairingFailed {
                        failure: map_gateway_error(error),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_disconnect_call(&self) -> SessionEvent {
        let span = info_span!(
            "session.disconnect",
            session_id = %self.session_id,
            user_id = %self.user_id
        );
        async {
            match self.gateway.disconnect(&self.user_id).await {
                Ok(accepted) => SessionEvent::DisconnectSettled { accepted },
                Err(error) => {
                    tracing::warn!(error = %error, "disconnect webhook failed");
                    SessionEvent::DisconnectErrored
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Cached connection-record id, looked up in the store on first use.
    /// Lookup failures degrade to `None`: the webhook accepts a missing id.
    async fn resolve_connection_id(&self) -> Option<ConnectionId> {
        if let Some(id) = self.connection_id.read().await.clone() {
            return Some(id);
        }

        match self.store.find_connection_id(&self.user_id).await {
            Ok(Some(id)) => {
                let mut cached = self.connection_id.write().await;
                *cached = Some(id.clone());
                Some(id)
            }
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(error = %error, "connection id lookup failed");
                None
            }
        }
    }

    async fn current_snapshot(&self) -> SessionSnapshot {
        let machine = self.machine.lock().await;
        SessionSnapshot {
            state: machine.state().clone(),
            phone_input: machine.phone_input().as_str().to_string(),
            time_left: machine.time_left(),
            is_processing: machine.is_processing(),
            linked: machine.is_linked(),
            linked_phone: machine.linked_phone().map(str::to_string),
        }
    }

    async fn emit_snapshot(&self) {
        let snapshot = self.current_snapshot().await;
        let mut senders = self.event_senders.lock().await;
        senders.retain(|sender| !sender.is_closed());
        for sender in senders.iter() {
            let event = ConnectionDomainEvent::SessionChanged {
                snapshot: snapshot.clone(),
            };
            if sender.send(event).await.is_err() {
                tracing::debug!("session event subscriber dropped");
            }
        }
    }
}

fn map_gateway_error(error: PairingGatewayError) -> PairingFailure {
    match error {
        PairingGatewayError::Timeout => PairingFailure::TookTooLong,
        PairingGatewayError::Transport(message) => PairingFailure::Transport(message),
        PairingGatewayError::Rejected { message } => PairingFailure::Rejected { message },
        PairingGatewayError::MalformedResponse(_) => PairingFailure::MalformedPayload,
    }
}

#[async_trait]
impl ConnectionFacade for ConnectionSession {
    async fn open(&self) -> Result<()> {
        self.apply(SessionEvent::Opened).await
    }

    async fn close(&self) -> Result<()> {
        self.apply(SessionEvent::Closed).await
    }

    async fn set_phone(&self, input: &str) -> Result<()> {
        {
            let mut machine = self.machine.lock().await;
            machine.set_phone_input(input);
        }
        self.emit_snapshot().await;
        Ok(())
    }

    async fn submit_phone(&self, method: PairingMethod) -> Result<()> {
        self.apply(SessionEvent::PhoneSubmitted { method }).await
    }

    async fn change_number(&self) -> Result<()> {
        self.apply(SessionEvent::ChangeNumber).await
    }

    async fn request_disconnect(&self) -> Result<()> {
        self.apply(SessionEvent::DisconnectRequested).await
    }

    async fn snapshot(&self) -> SessionSnapshot {
        self.current_snapshot().await
    }
}

#[async_trait]
impl ConnectionEventPort for ConnectionSession {
    async fn subscribe(&self) -> Result<mpsc::Receiver<ConnectionDomainEvent>> {
        let (tx, rx) = mpsc::channel(16);
        self.event_senders.lock().await.push(tx);
        Ok(rx)
    }
}
