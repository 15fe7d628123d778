use serde::{Deserialize, Serialize};

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// How status changes reach the watcher.
///
/// `Realtime` subscribes to the store's change feed and only falls back to
/// polling when the stream cannot be (re)established; `Polling` never opens
/// the feed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStrategy {
    Realtime,
    Polling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSyncSettings {
    pub feed_strategy: FeedStrategy,

    /// Poll cadence, used as the fallback tick and for `Polling` mode.
    pub poll_interval_secs: u64,
}

impl Default for StatusSyncSettings {
    fn default() -> Self {
        Self {
            feed_strategy: FeedStrategy::Realtime,
            poll_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    /// Seconds a pending QR code stays valid client-side.
    pub countdown_secs: u32,

    /// Minimum digits a submittable phone number must normalize to.
    pub min_phone_digits: usize,

    /// Prefix the phone field resets to.
    pub default_country_prefix: String,

    /// Client-side timeout on the pairing webhook call.
    pub pairing_timeout_secs: u64,

    /// Delay before the post-disconnect refresh signal.
    pub refresh_delay_secs: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            countdown_secs: 90,
            min_phone_digits: 12,
            default_country_prefix: "+55".to_string(),
            pairing_timeout_secs: 15,
            refresh_delay_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "current_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub sync: StatusSyncSettings,

    #[serde(default)]
    pub link: LinkSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            sync: StatusSyncSettings::default(),
            link: LinkSettings::default(),
        }
    }
}

fn current_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_product_behavior() {
        let settings = Settings::default();
        assert_eq!(settings.sync.poll_interval_secs, 5);
        assert_eq!(settings.link.countdown_secs, 90);
        assert_eq!(settings.link.min_phone_digits, 12);
        assert_eq!(settings.link.default_country_prefix, "+55");
        assert_eq!(settings.link.pairing_timeout_secs, 15);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let settings: Settings =
            toml::from_str("[sync]\nfeed_strategy = \"polling\"\npoll_interval_secs = 10\n")
                .expect("parse settings");
        assert_eq!(settings.sync.feed_strategy, FeedStrategy::Polling);
        assert_eq!(settings.sync.poll_interval_secs, 10);
        assert_eq!(settings.link.countdown_secs, 90);
    }
}
