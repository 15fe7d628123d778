use async_trait::async_trait;

use crate::session::events::SessionSnapshot;
use zc_core::connection::PairingMethod;

/// Shell-facing surface of the connection session.
#[async_trait]
pub trait ConnectionFacade: Send + Sync {
    async fn open(&self) -> anyhow::Result<()>;
    async fn close(&self) -> anyhow::Result<()>;
    async fn set_phone(&self, input: &str) -> anyhow::Result<()>;
    async fn submit_phone(&self, method: PairingMethod) -> anyhow::Result<()>;
    async fn change_number(&self) -> anyhow::Result<()>;
    async fn request_disconnect(&self) -> anyhow::Result<()>;
    async fn snapshot(&self) -> SessionSnapshot;
}
