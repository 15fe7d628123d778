//! Event-stream subscriber for the store's change feed.
//!
//! Consumes a `text/event-stream` endpoint filtered to one user's rows and
//! turns every `data:` frame into a [`ChangeNotice`]. Frame payloads are
//! deliberately ignored: the watcher re-fetches through the REST API, the
//! feed only says "something changed".
//!
//! The initial connection happens inside `subscribe`, so a dead endpoint
//! fails fast and the watcher can fall back to polling. After that the
//! reader reconnects a bounded number of times; when the budget is spent it
//! drops the sender, which closes the receiver and again hands control to
//! the polling fallback.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use zc_core::config::AppConfig;
use zc_core::ids::UserId;
use zc_core::ports::{ChangeFeedPort, ChangeNotice};

const RECONNECT_ATTEMPTS: u32 = 3;
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct EventStreamFeed {
    client: reqwest::Client,
    feed_url: String,
    api_key: String,
    table: String,
}

impl EventStreamFeed {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("build feed http client")?;
        Ok(Self {
            client,
            feed_url: config.feed_url.clone(),
            api_key: config.store_api_key.clone(),
            table: config.store_table.clone(),
        })
    }

    async fn connect(&self, user: &UserId) -> anyhow::Result<reqwest::Response> {
        let response = self
            .client
            .get(&self.feed_url)
            .header("Accept", "text/event-stream")
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .query(&[
                ("table", self.table.as_str()),
                ("user_id", user.as_str()),
            ])
            .send()
            .await
            .context("open change feed")?;

        let response = response
            .error_for_status()
            .context("change feed refused the subscription")?;
        Ok(response)
    }

    async fn pump(
        response: reqwest::Response,
        user: &UserId,
        notices: &mpsc::Sender<ChangeNotice>,
    ) -> bool {
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk: Bytes = match chunk {
                Ok(chunk) => chunk,
                Err(error) => {
                    tracing::warn!(error = %error, "change feed stream broke");
                    return true;
                }
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim_end_matches('\r').to_string();
                buffer.drain(..=newline);

                // Comment lines (": keep-alive") and blank separators carry
                // no change information.
                if let Some(_payload) = line.strip_prefix("data:") {
                    let notice = ChangeNotice {
                        user_id: user.clone(),
                    };
                    if notices.send(notice).await.is_err() {
                        // Subscriber is gone; stop for good.
                        return false;
                    }
                }
            }
        }

        // Orderly end of stream still warrants a reconnect.
        true
    }
}

#[async_trait]
impl ChangeFeedPort for EventStreamFeed {
    async fn subscribe(&self, user: &UserId) -> anyhow::Result<mpsc::Receiver<ChangeNotice>> {
        let first = self.connect(user).await?;

        let (tx, rx) = mpsc::channel(16);
        let feed = self.clone();
        let user = user.clone();

        tokio::spawn(async move {
            let mut response = Some(first);
            let mut attempts_left = RECONNECT_ATTEMPTS;

            loop {
                let current = match response.take() {
                    Some(current) => current,
                    None => {
                        if attempts_left == 0 {
                            tracing::warn!("change feed reconnect budget spent");
                            break;
                        }
                        attempts_left -= 1;
                        tokio::time::sleep(RECONNECT_BACKOFF).await;
                        match feed.connect(&user).await {
                            Ok(reconnected) => {
                                attempts_left = RECONNECT_ATTEMPTS;
                                reconnected
                            }
                            Err(error) => {
                                tracing::warn!(error = %error, "change feed reconnect failed");
                                continue;
                            }
                        }
                    }
                };

                if !Self::pump(current, &user, &tx).await {
                    break;
                }
            }
            // Dropping `tx` closes the receiver and signals the fallback.
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pump_emits_one_notice_per_data_frame() {
        // reqwest::Response can be built from an http body for tests.
        let body = ": keep-alive\n\ndata: {\"op\":\"UPDATE\"}\n\ndata: {\"op\":\"INSERT\"}\n\n";
        let response = reqwest::Response::from(http::Response::new(body.to_string()));

        let (tx, mut rx) = mpsc::channel(8);
        let user = UserId::from("user-1");
        let reconnect = EventStreamFeed::pump(response, &user, &tx).await;
        drop(tx);

        assert!(reconnect);
        assert_eq!(rx.recv().await.map(|n| n.user_id), Some(user.clone()));
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }
}
