//! Application dependency grouping.
//!
//! **Note**: This is NOT a Builder pattern.
//! - No build steps
//! - No default values
//! - No hidden logic
//! - Just parameter grouping

use std::sync::Arc;

use zc_core::ports::{ChangeFeedPort, NotifierPort, PairingGatewayPort, StatusStorePort};

/// Dependency grouping for session construction (non-Builder, just
/// parameter grouping). The constructor signature IS the dependency
/// manifest: all port handles are required except the change feed, which is
/// genuinely absent when polling is configured.
pub struct AppDeps {
    /// Remote status store (read side).
    pub store: Arc<dyn StatusStorePort>,

    /// Pairing/disconnect webhook gateway.
    pub gateway: Arc<dyn PairingGatewayPort>,

    /// User feedback surface.
    pub notifier: Arc<dyn NotifierPort>,

    /// Push change feed; `None` selects pure polling.
    pub change_feed: Option<Arc<dyn ChangeFeedPort>>,
}
