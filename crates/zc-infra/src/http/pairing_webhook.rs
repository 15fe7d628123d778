//! Webhook client for the external pairing service.
//!
//! The service owns all WhatsApp protocol work; these two POSTs only
//! trigger it. The pairing call carries a client-side timeout because the
//! service renders the QR synchronously and a slow answer is useless. The
//! disconnect call has no such bound, matching the original product.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use zc_core::config::AppConfig;
use zc_core::connection::{PairingMethod, PairingPayload};
use zc_core::ids::UserId;
use zc_core::ports::{PairingGatewayError, PairingGatewayPort, PairingTicket};
use zc_core::settings::LinkSettings;

#[derive(Debug, Serialize)]
struct PairingRequestBody<'a> {
    phone: &'a str,
    method: PairingMethod,
    user_id: &'a str,
    connection_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PairingResponseBody {
    success: bool,
    #[serde(default)]
    data: Option<PairingData>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PairingData {
    #[serde(default)]
    base64: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Serialize)]
struct DisconnectRequestBody<'a> {
    solicitacao: &'a str,
    id_user: &'a str,
}

#[derive(Debug, Deserialize)]
struct DisconnectResponseBody {
    status: bool,
}

#[derive(Debug, Clone)]
pub struct PairingWebhookClient {
    client: reqwest::Client,
    pairing_url: String,
    disconnect_url: String,
    pairing_timeout: Duration,
}

impl PairingWebhookClient {
    pub fn new(config: &AppConfig, settings: &LinkSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("build webhook http client")?;
        Ok(Self {
            client,
            pairing_url: config.pairing_webhook_url.clone(),
            disconnect_url: config.disconnect_webhook_url.clone(),
            pairing_timeout: Duration::from_secs(settings.pairing_timeout_secs.max(1)),
        })
    }
}

#[async_trait]
impl PairingGatewayPort for PairingWebhookClient {
    async fn begin_pairing(
        &self,
        ticket: &PairingTicket,
    ) -> Result<PairingPayload, PairingGatewayError> {
        let body = PairingRequestBody {
            phone: &ticket.phone,
            method: ticket.method,
            user_id: ticket.user_id.as_str(),
            connection_id: ticket.connection_id.as_ref().map(|id| id.as_str()),
        };

        let response = self
            .client
            .post(&self.pairing_url)
            .timeout(self.pairing_timeout)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        // The service signals failure in the body, not the HTTP status.
        let body: PairingResponseBody = response
            .json()
            .await
            .map_err(|error| PairingGatewayError::Transport(error.to_string()))?;

        if !body.success {
            return Err(PairingGatewayError::Rejected {
                message: body.message,
            });
        }

        match body.data {
            Some(PairingData {
                base64: Some(bytes),
                ..
            }) => {
                base64::engine::general_purpose::STANDARD
                    .decode(bytes.trim())
                    .map_err(|error| {
                        PairingGatewayError::MalformedResponse(format!(
                            "qr image is not valid base64: {error}"
                        ))
                    })?;
                Ok(PairingPayload::QrCode {
                    image_uri: format!("data:image/png;base64,{}", bytes.trim()),
                })
            }
            Some(PairingData {
                code: Some(value), ..
            }) => Ok(PairingPayload::Code { value }),
            _ => Err(PairingGatewayError::MalformedResponse(
                "success without base64 or code".to_string(),
            )),
        }
    }

    async fn disconnect(&self, user: &UserId) -> Result<bool, PairingGatewayError> {
        let body = DisconnectRequestBody {
            solicitacao: "desconectar",
            id_user: user.as_str(),
        };

        let response = self
            .client
            .post(&self.disconnect_url)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let body: DisconnectResponseBody = response
            .json()
            .await
            .map_err(|error| PairingGatewayError::Transport(error.to_string()))?;

        Ok(body.status)
    }
}

fn map_send_error(error: reqwest::Error) -> PairingGatewayError {
    if error.is_timeout() {
        PairingGatewayError::Timeout
    } else {
        PairingGatewayError::Transport(error.to_string())
    }
}
