//! REST client for the hosted status store.
//!
//! Speaks the store's PostgREST dialect: equality filters, descending
//! order, limit. Row-level security scopes every query to the caller's own
//! rows; the api key rides along on each request.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use zc_core::config::AppConfig;
use zc_core::connection::ConnectionRecord;
use zc_core::ids::{ConnectionId, UserId};
use zc_core::ports::{StatusStoreError, StatusStorePort};

#[derive(Debug, Deserialize)]
struct ConnectionRow {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

impl From<ConnectionRow> for ConnectionRecord {
    fn from(row: ConnectionRow) -> Self {
        ConnectionRecord {
            id: ConnectionId::from(row.id),
            status: row.status,
            phone: row.phone,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl StatusApiClient {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("build store http client")?;
        Ok(Self {
            client,
            base_url: config.store_url.trim_end_matches('/').to_string(),
            api_key: config.store_api_key.clone(),
            table: config.store_table.clone(),
        })
    }

    async fn fetch_rows(
        &self,
        select: &str,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ConnectionRow>, StatusStoreError> {
        let url = format!("{}/rest/v1/{}", self.base_url, self.table);
        let user_filter = format!("eq.{}", user);
        let limit = limit.to_string();
        let response = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .query(&[
                ("select", select),
                ("user_id", user_filter.as_str()),
                ("order", "created_at.desc"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|error| StatusStoreError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StatusStoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Vec<ConnectionRow>>()
            .await
            .map_err(|error| StatusStoreError::Decode(error.to_string()))
    }
}

#[async_trait]
impl StatusStorePort for StatusApiClient {
    async fn latest_for_user(
        &self,
        user: &UserId,
    ) -> Result<Option<ConnectionRecord>, StatusStoreError> {
        let rows = self.fetch_rows("id,status,phone", user, 1).await?;
        Ok(rows.into_iter().next().map(ConnectionRecord::from))
    }

    async fn find_connection_id(
        &self,
        user: &UserId,
    ) -> Result<Option<ConnectionId>, StatusStoreError> {
        let rows = self.fetch_rows("id", user, 1).await?;
        Ok(rows.into_iter().next().map(|row| ConnectionId::from(row.id)))
    }
}
