use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatusStoreError {
    #[error("store request failed: {0}")]
    Transport(String),

    #[error("store answered {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("store row could not be decoded: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum PairingGatewayError {
    /// The client-side timeout elapsed before the webhook answered.
    #[error("webhook call timed out")]
    Timeout,

    #[error("webhook unreachable: {0}")]
    Transport(String),

    /// The service answered `success: false`.
    #[error("pairing rejected: {message:?}")]
    Rejected { message: Option<String> },

    /// `success: true` but the payload carried nothing displayable.
    #[error("webhook response unusable: {0}")]
    MalformedResponse(String),
}
