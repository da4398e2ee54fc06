//! 🔧 App Configuration: the sacred TOML-to-struct pipeline, now with fewer knobs.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." -- every developer at 3am 🦆
//!
//! Two sections, both optional:
//!
//! ```toml
//! [storage]
//! region = "us-west-1"
//! endpoint_url = "http://localhost:9000"
//! force_path_style = true
//!
//! [rule.RequireColumns]
//! columns = ["model", "year"]
//! ```
//!
//! Env vars use the `SLX_` prefix and `__` for nesting: `SLX_STORAGE__REGION=eu-west-1`.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::S3StorageConfig;
use crate::rules::RuleConfig;

pub const ENV_PREFIX: &str = "SLX_";

/// 📦 Everything the binary needs to build an `Orchestrator`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    /// ☁️ Where the bucket lives and how to reach it.
    #[serde(default)]
    pub storage: S3StorageConfig,
    /// ⚖️ Which built-in rule judges the rows.
    #[serde(default)]
    pub rule: RuleConfig,
}

/// 🚀 Load the config from env vars, plus a TOML file if one was given.
///
/// - `None` → env vars only, everything else defaulted.
/// - `Some(path)` → env vars + TOML, merged. TOML wins on conflicts.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed(ENV_PREFIX).split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables ({}*). \
             The file exists in our hearts, but apparently not in a shape serde likes.",
            path.display(),
            ENV_PREFIX
        ),
        None => format!(
            "💀 Failed to parse configuration from environment variables ({}*). \
             No file was provided, so this one's all on the environment. Classic.",
            ENV_PREFIX
        ),
    };

    config.extract().context(context_msg)
}
