pub mod model;

pub use model::{FeedStrategy, LinkSettings, Settings, StatusSyncSettings};
