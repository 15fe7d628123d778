//! Connection domain: remote record model, phone normalization and the
//! link-session state machine.

pub mod phone;
pub mod record;
pub mod session_machine;

pub use phone::PhoneInput;
pub use record::{ConnectionRecord, ConnectionStatus};
pub use session_machine::{
    LinkSessionMachine, PairingFailure, PairingMethod, PairingPayload, SessionAction,
    SessionEvent, SessionPolicy, SessionState,
};
