use std::time::Duration;

use array_client::session::SessionConfig;
use serde::Deserialize;

/// On-disk configuration (spec §6.6). Loaded once at startup; there is no
/// hot-reload, since the session client and adapter it builds are handed
/// out by `Arc` to every in-flight call.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(flatten)]
    pub array: ArrayConfig,
    pub remote_array: Option<ArrayConfig>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArrayConfig {
    pub urls: Vec<String>,
    pub user: String,
    pub password: String,
    pub vstore: Option<String>,
    #[serde(default = "default_parallel_num")]
    pub parallel_num: usize,
    #[serde(default)]
    pub insecure_skip_verify: bool,
    #[serde(default)]
    pub supports_clone_pair: bool,
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
    /// Storage pool id to use on this array when acting as a HyperMetro or
    /// Replication remote target. Unused for the primary array.
    pub remote_pool_id: Option<String>,
    pub hypermetro_domain_id: Option<String>,
    pub remote_device_id: Option<String>,
}

fn default_parallel_num() -> usize {
    20
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

impl ArrayConfig {
    pub fn into_session_config(self) -> SessionConfig {
        SessionConfig {
            urls: self.urls,
            user: self.user,
            password: self.password,
            vstore: self.vstore,
            parallel_num: self.parallel_num,
            insecure_skip_verify: self.insecure_skip_verify,
            request_timeout: self.request_timeout,
        }
    }
}

impl Config {
    pub fn load(path: &camino::Utf8Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config file {path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing config file {path}: {e}"))
    }
}
