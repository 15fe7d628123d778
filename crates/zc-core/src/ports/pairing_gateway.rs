use async_trait::async_trait;

use crate::connection::{PairingMethod, PairingPayload};
use crate::ids::{ConnectionId, UserId};
use crate::ports::errors::PairingGatewayError;

/// Everything the pairing webhook needs for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingTicket {
    /// Digits-only phone number.
    pub phone: String,
    pub method: PairingMethod,
    pub user_id: UserId,
    pub connection_id: Option<ConnectionId>,
}

/// Outbound calls to the external pairing service.
///
/// The service owns the actual WhatsApp protocol work; these calls only
/// trigger it and relay its answers.
#[async_trait]
pub trait PairingGatewayPort: Send + Sync {
    /// Ask the service to start pairing. Returns the displayable payload
    /// (QR data URI or pairing code) on success.
    async fn begin_pairing(
        &self,
        ticket: &PairingTicket,
    ) -> Result<PairingPayload, PairingGatewayError>;

    /// Ask the service to tear the link down. Returns the response's
    /// boolean status flag verbatim; only `true` means the link is gone.
    async fn disconnect(&self, user: &UserId) -> Result<bool, PairingGatewayError>;
}
