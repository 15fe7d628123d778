//! Channel-backed notifier.
//!
//! The session only knows the [`NotifierPort`]; whatever shell embeds it
//! (desktop window, web bridge, test harness) drains the receiver and
//! renders toasts / performs the refresh however it likes.

use async_trait::async_trait;
use tokio::sync::mpsc;

use zc_core::ports::{Notice, NotifierPort};

/// What the shell receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    /// Show a toast.
    Notice(Notice),
    /// Re-read cached views (the original product reloads the page here).
    RefreshRequested,
}

#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<ShellEvent>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ShellEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotifierPort for ChannelNotifier {
    async fn notify(&self, notice: Notice) {
        if self.tx.send(ShellEvent::Notice(notice)).await.is_err() {
            tracing::debug!("shell receiver dropped, notice discarded");
        }
    }

    async fn request_refresh(&self) {
        if self.tx.send(ShellEvent::RefreshRequested).await.is_err() {
            tracing::debug!("shell receiver dropped, refresh request discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zc_core::ports::NoticeLevel;

    #[tokio::test]
    async fn forwards_notices_and_refreshes_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new(4);

        notifier
            .notify(Notice {
                level: NoticeLevel::Success,
                message: "Desconectado com sucesso!".to_string(),
            })
            .await;
        notifier.request_refresh().await;

        assert!(matches!(
            rx.recv().await,
            Some(ShellEvent::Notice(Notice {
                level: NoticeLevel::Success,
                ..
            }))
        ));
        assert_eq!(rx.recv().await, Some(ShellEvent::RefreshRequested));
    }

    #[tokio::test]
    async fn dropped_shell_is_not_an_error() {
        let (notifier, rx) = ChannelNotifier::new(1);
        drop(rx);
        notifier.request_refresh().await;
    }
}
