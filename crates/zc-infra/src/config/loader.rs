//! Configuration loader.
//!
//! Layers a TOML file with `ZAPCONECTA_*` environment overrides (double
//! underscore as the section separator, e.g.
//! `ZAPCONECTA_WEBHOOKS__PAIRING_URL`). The merged tree feeds both the
//! endpoint DTO ([`AppConfig`], pure data) and the behavior settings
//! ([`Settings`], serde defaults fill the gaps).

use std::path::Path;

use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use zc_core::config::AppConfig;
use zc_core::settings::Settings;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub app: AppConfig,
    pub settings: Settings,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<LoadedConfig> {
    // An ambient .env file is optional.
    let _ = dotenvy::dotenv();

    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml));
    }
    let merged = builder
        .add_source(
            Environment::with_prefix("ZAPCONECTA")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("assemble configuration sources")?;

    let raw: toml::Value = merged
        .try_deserialize()
        .context("materialize configuration tree")?;

    let app = AppConfig::from_toml(&raw)?;
    let settings = Settings::deserialize(raw).context("parse behavior settings")?;

    Ok(LoadedConfig { app, settings })
}
