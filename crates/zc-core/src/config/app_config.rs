/// Endpoint and credential configuration DTO (pure data, no logic).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Pairing webhook endpoint.
    pub pairing_webhook_url: String,

    /// Disconnect webhook endpoint.
    pub disconnect_webhook_url: String,

    /// Base URL of the hosted status store REST API.
    pub store_url: String,

    /// API key sent on every store request (may be empty - this is a fact,
    /// not an error).
    pub store_api_key: String,

    /// Table holding connection records.
    pub store_table: String,

    /// Change-feed endpoint (may be empty when polling is configured).
    pub feed_url: String,
}

impl AppConfig {
    /// Create AppConfig from a TOML value.
    ///
    /// **Prohibited**: this method must NOT contain any validation or
    /// default value logic. Missing keys map to empty strings.
    pub fn from_toml(toml_value: &toml::Value) -> anyhow::Result<Self> {
        let webhooks = toml_value.get("webhooks");
        let store = toml_value.get("store");

        let str_at = |table: Option<&toml::Value>, key: &str| -> String {
            table
                .and_then(|t| t.get(key))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };

        Ok(Self {
            pairing_webhook_url: str_at(webhooks, "pairing_url"),
            disconnect_webhook_url: str_at(webhooks, "disconnect_url"),
            store_url: str_at(store, "url"),
            store_api_key: str_at(store, "api_key"),
            store_table: str_at(store, "table"),
            feed_url: str_at(store, "feed_url"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_all_sections() {
        let value: toml::Value = toml::from_str(
            r#"
            [webhooks]
            pairing_url = "https://hooks.example/pair"
            disconnect_url = "https://hooks.example/disconnect"

            [store]
            url = "https://store.example"
            api_key = "anon-key"
            table = "whatsapp_conections"
            feed_url = "https://store.example/feed"
            "#,
        )
        .expect("parse toml");

        let config = AppConfig::from_toml(&value).expect("map config");
        assert_eq!(config.pairing_webhook_url, "https://hooks.example/pair");
        assert_eq!(config.store_table, "whatsapp_conections");
    }

    #[test]
    fn missing_keys_become_empty_strings() {
        let value: toml::Value = toml::from_str("").expect("parse toml");
        let config = AppConfig::from_toml(&value).expect("map config");
        assert_eq!(config.pairing_webhook_url, "");
        assert_eq!(config.store_api_key, "");
    }
}
