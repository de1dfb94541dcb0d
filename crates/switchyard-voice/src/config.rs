use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_language() -> String {
    switchyard_types::DEFAULT_LANGUAGE.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_io_timeout_secs() -> u64 {
    30
}

/// Piper (Wyoming protocol) settings.
///
/// For a single Piper instance serving every language set `endpoint`. For
/// per-language instances set `endpoints`, keyed by ISO-639-1 code; `endpoint`
/// then only serves languages missing from the map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PiperConfig {
    /// Fallback `host:port`. `tcp://` and `http://` prefixes are accepted.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
    /// Voice overrides merged over the built-in table.
    #[serde(default)]
    pub voices: HashMap<String, String>,
    /// Language whose voice is used when the requested one has none.
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound for one whole synthesize exchange.
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
}

impl Default for PiperConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            endpoints: HashMap::new(),
            voices: HashMap::new(),
            default_language: default_language(),
            connect_timeout_secs: default_connect_timeout_secs(),
            io_timeout_secs: default_io_timeout_secs(),
        }
    }
}

impl PiperConfig {
    /// Single-endpoint configuration with default voices and timeouts.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }
}
