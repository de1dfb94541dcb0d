//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use switchyard_channels::{GrpcChannelConfig, HttpChannelConfig, MqttChannelConfig};
use switchyard_interpreter::{LocalConfig, OpenAiConfig};
use switchyard_voice::PiperConfig;
use thiserror::Error;

/// Path tried when neither the command line nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "switchyard.toml";

/// Top-level server configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub channels: ChannelsConfig,

    #[serde(default)]
    pub interpreter: InterpreterConfig,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Delivery channel settings, one table per protocol.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub http: HttpChannelConfig,
    #[serde(default)]
    pub mqtt: MqttChannelConfig,
    #[serde(default)]
    pub grpc: GrpcChannelConfig,
}

impl ChannelsConfig {
    pub fn any_enabled(&self) -> bool {
        self.http.enabled || self.mqtt.enabled || self.grpc.enabled
    }
}

/// Interpreter backend selection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InterpreterConfig {
    /// `openai` or `local`.
    #[serde(default = "default_interpreter_backend")]
    pub backend: String,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub local: LocalConfig,
}

/// Speech synthesis settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Only `piper` is supported.
    #[serde(default = "default_tts_backend")]
    pub backend: String,

    #[serde(default)]
    pub piper: PiperConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "switchyard_dispatch=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_interpreter_backend() -> String {
    "openai".to_string()
}

fn default_tts_backend() -> String {
    "piper".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            backend: default_interpreter_backend(),
            openai: OpenAiConfig::default(),
            local: LocalConfig::default(),
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: default_tts_backend(),
            piper: PiperConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override held a value of the wrong shape.
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Replaces a whole-value `${VAR}` reference with the variable's value.
///
/// Anything else is returned unchanged. An unset variable resolves to an
/// empty string.
pub fn resolve_env_ref<F>(value: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match value
        .trim()
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        Some(name) if !name.is_empty() => lookup(name).unwrap_or_default(),
        _ => value.to_string(),
    }
}

fn parse_bool(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { name, value }),
    }
}

fn parse_value<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

/// Applies `SWITCHYARD_*` overrides read through `lookup`, then resolves
/// environment references in secrets.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("SWITCHYARD_HTTP_HOST") {
        config.channels.http.host = parse_value("SWITCHYARD_HTTP_HOST", host)?;
    }
    if let Some(port) = lookup("SWITCHYARD_HTTP_PORT") {
        config.channels.http.port = parse_value("SWITCHYARD_HTTP_PORT", port)?;
    }
    if let Some(backend) = lookup("SWITCHYARD_INTERPRETER_BACKEND") {
        config.interpreter.backend = backend;
    }
    if let Some(key) = lookup("SWITCHYARD_OPENAI_API_KEY") {
        config.interpreter.openai.api_key = key;
    }
    if let Some(enabled) = lookup("SWITCHYARD_TTS_ENABLED") {
        config.tts.enabled = parse_bool("SWITCHYARD_TTS_ENABLED", enabled)?;
    }
    if let Some(endpoint) = lookup("SWITCHYARD_PIPER_ENDPOINT") {
        config.tts.piper.endpoint = Some(endpoint);
    }
    if let Some(level) = lookup("SWITCHYARD_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("SWITCHYARD_LOG_JSON") {
        config.logging.json = parse_bool("SWITCHYARD_LOG_JSON", json)?;
    }

    config.interpreter.openai.api_key = resolve_env_ref(&config.interpreter.openai.api_key, &lookup);
    Ok(())
}

/// Parses a TOML document. Missing sections take their defaults.
pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(contents)?)
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `SWITCHYARD_HTTP_HOST` / `SWITCHYARD_HTTP_PORT` override `channels.http`
/// - `SWITCHYARD_INTERPRETER_BACKEND` overrides `interpreter.backend`
/// - `SWITCHYARD_OPENAI_API_KEY` overrides `interpreter.openai.api_key`
/// - `SWITCHYARD_TTS_ENABLED` overrides `tts.enabled`
/// - `SWITCHYARD_PIPER_ENDPOINT` overrides `tts.piper.endpoint`
/// - `SWITCHYARD_LOG_LEVEL` / `SWITCHYARD_LOG_JSON` override `logging`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// an override cannot be parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => parse_config(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr};
    use switchyard_interpreter::WhisperType;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.channels.http.enabled);
        assert_eq!(config.channels.http.port, 8080);
        assert!(!config.channels.mqtt.enabled);
        assert!(!config.channels.grpc.enabled);
        assert_eq!(config.interpreter.backend, "openai");
        assert!(!config.tts.enabled);
        assert_eq!(config.tts.backend, "piper");
        assert_eq!(config.tts.piper.endpoint, None);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert_eq!(parse_config("").unwrap(), config);
    }

    #[test]
    fn parses_every_section() {
        let config = parse_config(
            r#"
            [channels.http]
            host = "127.0.0.1"
            port = 9090
            request_timeout_secs = 15

            [channels.mqtt]
            enabled = true
            broker = "tcp://broker:1883"

            [interpreter]
            backend = "local"

            [interpreter.local]
            whisper_endpoint = "http://whisper:9000/asr"
            whisper_type = "asr"
            vad_filter = true

            [tts]
            enabled = true

            [tts.piper]
            endpoints = { en = "piper-en:10200", fr = "piper-fr:10200" }
            voices = { fr = "fr_FR-siwis-medium" }

            [logging]
            level = "debug"
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.channels.http.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.channels.http.port, 9090);
        assert_eq!(config.channels.http.request_timeout_secs, 15);
        assert!(config.channels.mqtt.enabled);
        assert_eq!(config.channels.mqtt.topic, "switchyard/#");
        assert_eq!(config.interpreter.backend, "local");
        assert_eq!(config.interpreter.local.whisper_type, WhisperType::Asr);
        assert!(config.interpreter.local.vad_filter);
        assert_eq!(config.interpreter.local.llm_model, "llama3");
        assert!(config.tts.enabled);
        assert_eq!(config.tts.piper.endpoints["fr"], "piper-fr:10200");
        assert_eq!(config.tts.piper.io_timeout_secs, 30);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn env_overrides_win() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("SWITCHYARD_HTTP_HOST", "127.0.0.1"),
                ("SWITCHYARD_HTTP_PORT", "7000"),
                ("SWITCHYARD_INTERPRETER_BACKEND", "local"),
                ("SWITCHYARD_TTS_ENABLED", "true"),
                ("SWITCHYARD_PIPER_ENDPOINT", "piper:10200"),
                ("SWITCHYARD_LOG_LEVEL", "warn"),
                ("SWITCHYARD_LOG_JSON", "1"),
            ]),
        )
        .unwrap();

        assert_eq!(config.channels.http.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.channels.http.port, 7000);
        assert_eq!(config.interpreter.backend, "local");
        assert!(config.tts.enabled);
        assert_eq!(config.tts.piper.endpoint.as_deref(), Some("piper:10200"));
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json);
    }

    #[test]
    fn malformed_override_is_an_error() {
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config, env(&[("SWITCHYARD_HTTP_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv { name: "SWITCHYARD_HTTP_PORT", .. }
        ));

        let err = apply_env_overrides(&mut config, env(&[("SWITCHYARD_TTS_ENABLED", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("SWITCHYARD_TTS_ENABLED"));
    }

    #[test]
    fn api_key_reference_is_resolved() {
        let mut config = parse_config(
            r#"
            [interpreter.openai]
            api_key = "${OPENAI_API_KEY}"
            "#,
        )
        .unwrap();
        apply_env_overrides(&mut config, env(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.interpreter.openai.api_key, "sk-test");
    }

    #[test]
    fn env_ref_resolution() {
        let lookup = env(&[("TOKEN", "abc")]);
        assert_eq!(resolve_env_ref("${TOKEN}", &lookup), "abc");
        assert_eq!(resolve_env_ref("${MISSING}", &lookup), "");
        assert_eq!(resolve_env_ref("plain-key", &lookup), "plain-key");
        assert_eq!(resolve_env_ref("prefix-${TOKEN}", &lookup), "prefix-${TOKEN}");
        assert_eq!(resolve_env_ref("${}", &lookup), "${}");
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let mut config = Config::default();
        config.interpreter.openai.api_key = "sk-very-secret".to_string();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
