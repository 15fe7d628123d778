//! Link-session state machine
//!
//! Explicit state machine for the WhatsApp link flow: phone entry, pairing
//! result, success. The machine is deliberately pure so every transition can
//! be audited and tested without infrastructure.
//!
//! # Architecture
//!
//! ```text
//! Webhook/Store/Timer/User events
//!   ↓
//! ConnectionSession (zc-app, converts events)
//!   ↓
//! LinkSessionMachine (pure state transitions)
//!   ↓
//! SessionActions (executed by the session)
//!   ↓
//! Webhook calls / timers / notices
//! ```
//!
//! State transitions:
//!
//! ```text
//! Closed
//!  │ Opened
//!  ▼
//! Phone ──(PairingIssued qrcode)──► Result ──(countdown expiry)──► Result(error)
//!  ▲                                 │  │
//!  └────────(ChangeNumber)───────────┘  │ StatusFetched{connected}
//!                                       ▼
//!                                    Success   (terminal until Closed)
//! ```
//!
//! No state is reachable without passing through `Phone` first.

use serde::{Deserialize, Serialize};

use crate::connection::phone::PhoneInput;
use crate::ports::notifier::NoticeLevel;
use crate::settings::model::LinkSettings;

/// Notice shown when the pairing countdown runs out.
pub const MSG_TIMEOUT_EXPIRED: &str = "Tempo limite excedido. Tente novamente.";
/// Notice shown when the store first reports the link while a session is open.
pub const MSG_CONNECTED: &str = "WhatsApp conectado com sucesso!";
/// Notice shown when the disconnect webhook confirms.
pub const MSG_DISCONNECTED: &str = "Desconectado com sucesso!";
/// Notice shown when the disconnect webhook answers anything but `true`.
pub const MSG_DISCONNECT_REJECTED: &str = "Erro ao desconectar. Tente novamente.";
/// Notice shown when the disconnect webhook is unreachable.
pub const MSG_DISCONNECT_FAILED: &str = "Erro ao desconectar.";
/// Notice shown when the pairing webhook times out client-side.
pub const MSG_PAIRING_TOO_SLOW: &str = "A operação demorou muito. Tente novamente.";
/// Notice shown when the pairing webhook is unreachable.
pub const MSG_PAIRING_TRANSPORT: &str = "Erro de comunicação com o servidor";
/// Default pairing rejection text when the service sends no message.
pub const MSG_PAIRING_DEFAULT_ERROR: &str = "Erro ao gerar QR Code";

/// How the external service should pair the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingMethod {
    /// QR image scanned from the phone.
    QrCode,
    /// Numeric pairing code typed on the phone.
    Code,
}

/// Pending pairing material, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PairingPayload {
    /// QR image, already wrapped into a displayable data URI.
    QrCode { image_uri: String },
    /// Numeric pairing code.
    Code { value: String },
    /// In-place error the user dismisses by requesting a new code.
    Error { message: String },
}

impl PairingPayload {
    pub fn is_qrcode(&self) -> bool {
        matches!(self, PairingPayload::QrCode { .. })
    }
}

/// Why a pairing call did not produce a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingFailure {
    /// Client-side timeout on the webhook call.
    TookTooLong,
    /// Transport-level failure reaching the webhook.
    Transport(String),
    /// The service answered `success: false`.
    Rejected { message: Option<String> },
    /// The service answered `success: true` but the payload was unusable.
    MalformedPayload,
}

impl PairingFailure {
    /// User-facing notice text for this failure.
    pub fn notice_message(&self) -> String {
        match self {
            PairingFailure::TookTooLong => MSG_PAIRING_TOO_SLOW.to_string(),
            PairingFailure::Transport(_) => MSG_PAIRING_TRANSPORT.to_string(),
            PairingFailure::Rejected { message } => {
                let base = message.as_deref().unwrap_or(MSG_PAIRING_DEFAULT_ERROR);
                format!("{}. Tente novamente.", base)
            }
            PairingFailure::MalformedPayload => {
                format!("{}. Tente novamente.", MSG_PAIRING_DEFAULT_ERROR)
            }
        }
    }
}

/// Session states. `Closed` models the dismissed modal; everything else is
/// one of the visible steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SessionState {
    /// No session open.
    Closed,

    /// Phone-entry step.
    Phone,

    /// Pairing material issued (or replaced in place by an error).
    Result { payload: PairingPayload },

    /// Store confirmed the link. Terminal until the session is closed.
    Success,
}

impl SessionState {
    fn is_open(&self) -> bool {
        !matches!(self, SessionState::Closed)
    }
}

/// Events the session feeds into the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// User opened the link modal.
    Opened,

    /// User dismissed the modal.
    Closed,

    /// User submitted the phone-entry form.
    PhoneSubmitted { method: PairingMethod },

    /// Pairing webhook produced a payload.
    PairingIssued { payload: PairingPayload },

    /// Pairing webhook failed.
    PairingFailed { failure: PairingFailure },

    /// One second of the pairing countdown elapsed.
    CountdownTick,

    /// Latest connection record fetched from the store.
    StatusFetched {
        connected: bool,
        phone: Option<String>,
    },

    /// User asked to go back and enter another number.
    ChangeNumber,

    /// User confirmed the disconnect dialog.
    DisconnectRequested,

    /// Disconnect webhook answered; `accepted` is its boolean status flag.
    DisconnectSettled { accepted: bool },

    /// Disconnect webhook was unreachable.
    DisconnectErrored,
}

/// Side effects the session must execute after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Invoke the pairing webhook. `phone` is already digits-only.
    CallPairing { phone: String, method: PairingMethod },

    /// Invoke the disconnect webhook.
    CallDisconnect,

    /// (Re)start the pairing countdown.
    StartCountdown { seconds: u32 },

    /// Stop the pairing countdown if one is running.
    CancelCountdown,

    /// Surface a notice to the user.
    Notify { level: NoticeLevel, message: String },

    /// Ask the shell to refresh its cached views after a delay.
    ScheduleRefresh { delay_secs: u64 },

    /// Audit record of the transition.
    LogTransition {
        old_state: String,
        event: String,
        new_state: String,
    },

    /// No side effect.
    NoOp,
}

/// Session policy derived from [`LinkSettings`].
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Pairing countdown length in seconds.
    pub countdown_secs: u32,
    /// Minimum digits a submittable phone number must normalize to.
    pub min_phone_digits: usize,
    /// Prefix the phone field resets to.
    pub default_country_prefix: String,
    /// Delay before the post-disconnect refresh signal.
    pub refresh_delay_secs: u64,
}

impl SessionPolicy {
    pub fn from_settings(settings: &LinkSettings) -> Self {
        Self {
            countdown_secs: settings.countdown_secs.max(1),
            min_phone_digits: settings.min_phone_digits.max(1),
            default_country_prefix: settings.default_country_prefix.clone(),
            refresh_delay_secs: settings.refresh_delay_secs,
        }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from_settings(&LinkSettings::default())
    }
}

/// Mutable context carried across transitions.
#[derive(Debug, Clone)]
struct SessionContext {
    phone_input: PhoneInput,
    is_processing: bool,
    time_left: u32,
    linked: bool,
    linked_phone: Option<String>,
}

impl SessionContext {
    fn new(policy: &SessionPolicy) -> Self {
        Self {
            phone_input: PhoneInput::new(policy.default_country_prefix.clone()),
            is_processing: false,
            time_left: 0,
            linked: false,
            linked_phone: None,
        }
    }
}

/// Link-session state machine.
///
/// Maintains the session state and produces transitions and actions from
/// events. Pure: all I/O happens in the session object that drives it.
///
/// # Example
///
/// ```
/// use zc_core::connection::session_machine::{LinkSessionMachine, SessionEvent, SessionState};
///
/// let mut sm = LinkSessionMachine::new();
/// let (state, _actions) = sm.handle_event(SessionEvent::Opened);
/// assert_eq!(state, SessionState::Phone);
/// ```
#[derive(Debug, Clone)]
pub struct LinkSessionMachine {
    state: SessionState,
    context: SessionContext,
    policy: SessionPolicy,
}

impl Default for LinkSessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkSessionMachine {
    pub fn new() -> Self {
        Self::with_policy(SessionPolicy::default())
    }

    pub fn with_policy(policy: SessionPolicy) -> Self {
        let context = SessionContext::new(&policy);
        Self {
            state: SessionState::Closed,
            context,
            policy,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phone_input(&self) -> &PhoneInput {
        &self.context.phone_input
    }

    /// Replace the phone field. Plain setter: the value is only validated
    /// when the form is submitted.
    pub fn set_phone_input(&mut self, input: impl Into<PhoneInput>) {
        self.context.phone_input = input.into();
    }

    pub fn time_left(&self) -> u32 {
        self.context.time_left
    }

    pub fn is_processing(&self) -> bool {
        self.context.is_processing
    }

    /// Whether the store last reported a recognized connected status.
    pub fn is_linked(&self) -> bool {
        self.context.linked
    }

    pub fn linked_phone(&self) -> Option<&str> {
        self.context.linked_phone.as_deref()
    }

    /// Handle an event and return the new state plus the actions to run.
    ///
    /// This is the core of the machine: a pure transition with an audit
    /// action prepended so the session can trace every step.
    pub fn handle_event(&mut self, event: SessionEvent) -> (SessionState, Vec<SessionAction>) {
        let old_state = self.state.clone();
        let event_debug = format!("{:?}", event);

        let (new_state, actions) = self.transition(event);

        #[cfg(feature = "tracing")]
        tracing::trace!(
            old_state = %format!("{:?}", old_state),
            new_state = %format!("{:?}", new_state),
            "session transition"
        );

        let log_action = SessionAction::LogTransition {
            old_state: format!("{:?}", old_state),
            event: event_debug,
            new_state: format!("{:?}", new_state),
        };

        let mut all_actions = vec![log_action];
        all_actions.extend(actions);

        self.state = new_state.clone();
        (new_state, all_actions)
    }

    fn transition(&mut self, event: SessionEvent) -> (SessionState, Vec<SessionAction>) {
        match (self.state.clone(), event) {
            (SessionState::Closed, SessionEvent::Opened) => {
                self.reset_entry();
                (SessionState::Phone, vec![])
            }

            // Close always resets to the entry step for the next open.
            (state, SessionEvent::Closed) if state.is_open() => {
                self.reset_entry();
                (SessionState::Closed, vec![SessionAction::CancelCountdown])
            }

            // Submitting is legal from the entry step and, after an in-place
            // error, from the result step ("generate a new code").
            (state @ (SessionState::Phone | SessionState::Result { .. }), SessionEvent::PhoneSubmitted { method }) => {
                if self.context.is_processing {
                    return (state, vec![SessionAction::NoOp]);
                }
                if !self
                    .context
                    .phone_input
                    .is_submittable(self.policy.min_phone_digits)
                {
                    // Too few digits: strict no-op, no network call.
                    return (state, vec![SessionAction::NoOp]);
                }

                self.context.is_processing = true;
                let phone = self.context.phone_input.normalized();
                (state, vec![SessionAction::CallPairing { phone, method }])
            }

            (SessionState::Phone | SessionState::Result { .. }, SessionEvent::PairingIssued { payload }) => {
                self.context.is_processing = false;
                match &payload {
                    PairingPayload::QrCode { .. } => {
                        self.context.time_left = self.policy.countdown_secs;
                        let seconds = self.policy.countdown_secs;
                        (
                            SessionState::Result { payload },
                            vec![SessionAction::StartCountdown { seconds }],
                        )
                    }
                    // Pairing codes do not expire client-side.
                    PairingPayload::Code { .. } | PairingPayload::Error { .. } => (
                        SessionState::Result { payload },
                        vec![SessionAction::CancelCountdown],
                    ),
                }
            }

            // A failure notice is shown even if the modal was dismissed
            // while the call was in flight.
            (state, SessionEvent::PairingFailed { failure }) => {
                self.context.is_processing = false;
                (
                    state,
                    vec![SessionAction::Notify {
                        level: NoticeLevel::Error,
                        message: failure.notice_message(),
                    }],
                )
            }

            // Payload arriving after the modal closed (or after success) is
            // dropped; reopening starts over at the entry step anyway.
            (state @ (SessionState::Closed | SessionState::Success), SessionEvent::PairingIssued { .. }) => {
                self.context.is_processing = false;
                (state, vec![SessionAction::NoOp])
            }

            (SessionState::Result { payload }, SessionEvent::CountdownTick)
                if payload.is_qrcode() =>
            {
                if self.context.time_left <= 1 {
                    self.context.time_left = 0;
                    (
                        SessionState::Result {
                            payload: PairingPayload::Error {
                                message: MSG_TIMEOUT_EXPIRED.to_string(),
                            },
                        },
                        vec![SessionAction::CancelCountdown],
                    )
                } else {
                    self.context.time_left -= 1;
                    (SessionState::Result { payload }, vec![])
                }
            }

            (SessionState::Result { .. }, SessionEvent::ChangeNumber) => {
                self.reset_entry();
                (SessionState::Phone, vec![SessionAction::CancelCountdown])
            }

            (state, SessionEvent::StatusFetched { connected, phone }) => {
                self.context.linked = connected;
                self.context.linked_phone = phone;

                let at_success = matches!(state, SessionState::Success);
                if connected && state.is_open() && !at_success {
                    (
                        SessionState::Success,
                        vec![
                            SessionAction::CancelCountdown,
                            SessionAction::Notify {
                                level: NoticeLevel::Success,
                                message: MSG_CONNECTED.to_string(),
                            },
                        ],
                    )
                } else {
                    (state, vec![])
                }
            }

            (state, SessionEvent::DisconnectRequested) => {
                if self.context.is_processing {
                    return (state, vec![SessionAction::NoOp]);
                }
                self.context.is_processing = true;
                (state, vec![SessionAction::CallDisconnect])
            }

            (state, SessionEvent::DisconnectSettled { accepted }) => {
                self.context.is_processing = false;
                if accepted {
                    self.context.linked = false;
                    self.context.linked_phone = None;
                    (
                        state,
                        vec![
                            SessionAction::Notify {
                                level: NoticeLevel::Success,
                                message: MSG_DISCONNECTED.to_string(),
                            },
                            SessionAction::ScheduleRefresh {
                                delay_secs: self.policy.refresh_delay_secs,
                            },
                        ],
                    )
                } else {
                    // Anything but an explicit `true` leaves prior state intact.
                    (
                        state,
                        vec![SessionAction::Notify {
                            level: NoticeLevel::Error,
                            message: MSG_DISCONNECT_REJECTED.to_string(),
                        }],
                    )
                }
            }

            (state, SessionEvent::DisconnectErrored) => {
                self.context.is_processing = false;
                (
                    state,
                    vec![SessionAction::Notify {
                        level: NoticeLevel::Error,
                        message: MSG_DISCONNECT_FAILED.to_string(),
                    }],
                )
            }

            // Stray events (ticks after cancellation, duplicate opens, ...)
            // leave the machine untouched.
            (state, _) => (state, vec![SessionAction::NoOp]),
        }
    }

    fn reset_entry(&mut self) {
        self.context.phone_input =
            PhoneInput::new(self.policy.default_country_prefix.clone());
        self.context.time_left = 0;
    }
}
